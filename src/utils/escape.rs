use std::str::Chars;

use thiserror::Error;

/// Escapes a string value so it can be printed back as a string literal.
///
/// Tab, carriage return, line feed, NUL, backslash and double quote are
/// escaped with a backslash; everything else is kept as is.
pub fn escape_str(value: &str) -> String {
    let mut ans = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\0' => ans.push_str("\\0"),
            '\t' => ans.push_str("\\t"),
            '\r' => ans.push_str("\\r"),
            '\n' => ans.push_str("\\n"),
            '\\' => ans.push_str("\\\\"),
            '"' => ans.push_str("\\\""),
            _ => ans.push(c),
        }
    }
    ans
}

/// Unescapes the body of a string literal (without the surrounding quotes).
pub(crate) fn unescape_str(src: &str) -> Result<String, EscapeError> {
    let mut out = String::with_capacity(src.len());
    let mut chars = src.chars();
    while let Some(c) = chars.next() {
        let c = match c {
            '\\' => match chars.clone().next() {
                Some('\n') => {
                    chars.next();
                    continue;
                }
                _ => scan_escape(&mut chars)?,
            },
            '\r' => return Err(EscapeError::BareCarriageReturn),
            _ => c,
        };
        out.push(c);
    }
    Ok(out)
}

fn scan_escape(chars: &mut Chars<'_>) -> Result<char, EscapeError> {
    // Previous character was '\\', unescape what follows.
    let res = match chars.next().ok_or(EscapeError::LoneSlash)? {
        '"' => '"',
        '\'' => '\'',
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        '\\' => '\\',
        '0' => '\0',
        'x' => {
            let hi = chars.next().ok_or(EscapeError::TooShortHexEscape)?;
            let hi = hi.to_digit(16).ok_or(EscapeError::InvalidCharInHexEscape)?;
            let lo = chars.next().ok_or(EscapeError::TooShortHexEscape)?;
            let lo = lo.to_digit(16).ok_or(EscapeError::InvalidCharInHexEscape)?;
            let value = hi * 16 + lo;
            if value > 0x7f {
                return Err(EscapeError::OutOfRangeHexEscape);
            }
            char::from_u32(value).ok_or(EscapeError::OutOfRangeHexEscape)?
        }
        'u' => scan_unicode(chars)?,
        _ => return Err(EscapeError::InvalidEscape),
    };
    Ok(res)
}

fn scan_unicode(chars: &mut Chars<'_>) -> Result<char, EscapeError> {
    // We've parsed '\u', now we have to parse '{..}'.
    if chars.next() != Some('{') {
        return Err(EscapeError::NoBraceInUnicodeEscape);
    }

    let mut n_digits = 1;
    let mut value: u32 = match chars.next().ok_or(EscapeError::UnclosedUnicodeEscape)? {
        '_' => return Err(EscapeError::LeadingUnderscoreUnicodeEscape),
        '}' => return Err(EscapeError::EmptyUnicodeEscape),
        c => c
            .to_digit(16)
            .ok_or(EscapeError::InvalidCharInUnicodeEscape)?,
    };

    loop {
        match chars.next() {
            None => return Err(EscapeError::UnclosedUnicodeEscape),
            Some('_') => continue,
            Some('}') => {
                if n_digits > 6 {
                    return Err(EscapeError::OverlongUnicodeEscape);
                }
                break char::from_u32(value).ok_or(if value > 0x10FFFF {
                    EscapeError::OutOfRangeUnicodeEscape
                } else {
                    EscapeError::LoneSurrogateUnicodeEscape
                });
            }
            Some(c) => {
                let digit = c
                    .to_digit(16)
                    .ok_or(EscapeError::InvalidCharInUnicodeEscape)?;
                n_digits += 1;
                if n_digits > 6 {
                    // Already too long, keep consuming up to the brace.
                    continue;
                }
                value = value * 16 + digit;
            }
        }
    }
}

/// Errors that can occur during string unescaping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EscapeError {
    #[error("escaped '\\' character without continuation")]
    LoneSlash,
    #[error("invalid escape character")]
    InvalidEscape,
    #[error("bare carriage return")]
    BareCarriageReturn,
    #[error("numeric character escape is too short")]
    TooShortHexEscape,
    #[error("invalid character in numeric escape")]
    InvalidCharInHexEscape,
    #[error("character code in numeric escape is non-ascii")]
    OutOfRangeHexEscape,
    #[error("'\\u' not followed by '{{'")]
    NoBraceInUnicodeEscape,
    #[error("non-hexadecimal value in unicode escape")]
    InvalidCharInUnicodeEscape,
    #[error("empty unicode escape")]
    EmptyUnicodeEscape,
    #[error("unclosed unicode escape")]
    UnclosedUnicodeEscape,
    #[error("leading underscore in unicode escape")]
    LeadingUnderscoreUnicodeEscape,
    #[error("overlong unicode escape")]
    OverlongUnicodeEscape,
    #[error("unicode escape is a lone surrogate")]
    LoneSurrogateUnicodeEscape,
    #[error("unicode escape is out of range")]
    OutOfRangeUnicodeEscape,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unescape_common() {
        assert_eq!(unescape_str(r"a\tb\n\u{48}\x41").unwrap(), "a\tb\nHA");
        assert_eq!(unescape_str(r"\q"), Err(EscapeError::InvalidEscape));
        assert_eq!(unescape_str(r"\u{}"), Err(EscapeError::EmptyUnicodeEscape));
    }

    #[test]
    fn escape_then_unescape() {
        let s = "line\n\"quoted\"\t\\";
        assert_eq!(unescape_str(&escape_str(s)).unwrap(), s);
    }
}
