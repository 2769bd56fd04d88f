use serde::Deserialize;
use serde::Serialize;

use crate::constants::ValueType;

/// A value moving through preprocessing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Variant {
    /// No value: discarded, or a delta without a usable previous value
    #[default]
    None,
    Str(String),
    Dbl(f64),
    Ui64(u64),
    /// The value turned into an error; the item becomes not supported
    Error(String),
}

impl Variant {
    pub fn is_none(&self) -> bool {
        matches!(self, Variant::None)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Variant::Error(_))
    }

    pub fn type_desc(&self) -> &'static str {
        match self {
            Variant::None => "none",
            Variant::Str(_) => "str",
            Variant::Dbl(_) => "double",
            Variant::Ui64(_) => "uint64",
            Variant::Error(_) => "error",
        }
    }

    pub fn value_desc(&self) -> String {
        match self {
            Variant::None => String::new(),
            Variant::Str(s) | Variant::Error(s) => s.clone(),
            Variant::Dbl(d) => format_dbl(*d),
            Variant::Ui64(u) => u.to_string(),
        }
    }

    /// Textual form of a value; `None` for empty and error variants.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Variant::Str(s) => Some(s.clone()),
            Variant::Dbl(d) => Some(format_dbl(*d)),
            Variant::Ui64(u) => Some(u.to_string()),
            Variant::None | Variant::Error(_) => None,
        }
    }

    /// Numeric form of a value, shaped by the item value type when that type is numeric.
    pub fn to_numeric(
        &self,
        value_type: ValueType,
    ) -> Option<Variant> {
        let numeric = match self {
            Variant::Dbl(_) | Variant::Ui64(_) => self.clone(),
            Variant::Str(s) => parse_numeric(s)?,
            Variant::None | Variant::Error(_) => return None,
        };

        Some(match value_type {
            ValueType::Float => Variant::Dbl(numeric.to_f64()?),
            ValueType::Uint64 => match numeric.to_u64() {
                Some(u) => Variant::Ui64(u),
                None => numeric,
            },
            _ => numeric,
        })
    }

    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Variant::Dbl(d) => Some(*d),
            Variant::Ui64(u) => Some(*u as f64),
            Variant::Str(s) => parse_numeric(s)?.to_f64(),
            Variant::None | Variant::Error(_) => None,
        }
    }

    /// Unsigned form; doubles outside the `u64` range do not convert.
    pub fn to_u64(&self) -> Option<u64> {
        match self {
            Variant::Ui64(u) => Some(*u),
            Variant::Dbl(d) if *d >= 0.0 && *d <= u64::MAX as f64 => Some(*d as u64),
            Variant::Dbl(_) => None,
            Variant::Str(s) => parse_numeric(s)?.to_u64(),
            Variant::None | Variant::Error(_) => None,
        }
    }
}

/// Unsigned integers first, then finite floating point numbers.
fn parse_numeric(text: &str) -> Option<Variant> {
    let text = text.trim();
    if let Ok(u) = text.parse::<u64>() {
        return Some(Variant::Ui64(u));
    }
    match text.parse::<f64>() {
        Ok(d) if d.is_finite() => Some(Variant::Dbl(d)),
        _ => None,
    }
}

fn format_dbl(d: f64) -> String {
    format!("{:.6}", d)
}
