pub mod file_io;
pub mod interval;
pub mod item_key;
pub mod time;
pub mod usermacro;

#[cfg(test)]
mod time_test;
