//! User macro tokens: `{$NAME}` and `{$NAME:context}` (context optionally quoted).

/// A user macro reference split into name and optional context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserMacro {
    pub name: String,
    pub context: Option<String>,
}

fn is_macro_char(c: u8) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit() || c == b'.' || c == b'_'
}

/// Parses a macro starting at `text[0] == '{'`; returns the macro and its length in bytes.
fn parse_at(text: &str) -> Option<(UserMacro, usize)> {
    let bytes = text.as_bytes();
    if !text.starts_with("{$") {
        return None;
    }

    let mut pos = 2;
    while pos < bytes.len() && is_macro_char(bytes[pos]) {
        pos += 1;
    }
    if pos == 2 || pos >= bytes.len() {
        return None;
    }
    let name = text[2..pos].to_string();

    match bytes[pos] {
        b'}' => Some((UserMacro { name, context: None }, pos + 1)),
        b':' => {
            pos += 1;
            while pos < bytes.len() && bytes[pos] == b' ' {
                pos += 1;
            }
            if pos < bytes.len() && bytes[pos] == b'"' {
                let mut context = String::new();
                pos += 1;
                loop {
                    match *bytes.get(pos)? {
                        b'\\' if bytes.get(pos + 1) == Some(&b'"') => {
                            context.push('"');
                            pos += 2;
                        }
                        b'"' => {
                            pos += 1;
                            break;
                        }
                        _ => {
                            let ch = text[pos..].chars().next()?;
                            context.push(ch);
                            pos += ch.len_utf8();
                        }
                    }
                }
                while pos < bytes.len() && bytes[pos] == b' ' {
                    pos += 1;
                }
                if bytes.get(pos) != Some(&b'}') {
                    return None;
                }
                Some((
                    UserMacro {
                        name,
                        context: Some(context),
                    },
                    pos + 1,
                ))
            } else {
                let end = text[pos..].find('}')? + pos;
                Some((
                    UserMacro {
                        name,
                        context: Some(text[pos..end].to_string()),
                    },
                    end + 1,
                ))
            }
        }
        _ => None,
    }
}

/// Parses a string that consists of exactly one user macro.
pub fn parse_user_macro(text: &str) -> Option<UserMacro> {
    match parse_at(text) {
        Some((m, len)) if len == text.len() => Some(m),
        _ => None,
    }
}

/// Replaces every resolvable user macro in `text`; unresolved macros are left as written.
pub fn expand_user_macros<F>(
    text: &str,
    mut resolve: F,
) -> String
where
    F: FnMut(&UserMacro) -> Option<String>,
{
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("{$") {
        out.push_str(&rest[..start]);
        match parse_at(&rest[start..]) {
            Some((um, len)) => {
                match resolve(&um) {
                    Some(value) => out.push_str(&value),
                    None => out.push_str(&rest[start..start + len]),
                }
                rest = &rest[start + len..];
            }
            None => {
                out.push_str("{$");
                rest = &rest[start + 2..];
            }
        }
    }
    out.push_str(rest);
    out
}
