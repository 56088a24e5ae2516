//! Lenient coercion for loosely typed API values
//!
//! Size fields arrive as JSON numbers, numeric strings, locale-formatted
//! strings or not at all. Every size signal goes through these helpers so
//! a malformed value degrades to a caller-supplied default instead of
//! failing the whole page.

use serde_json::Value;

/// Coerce an optional JSON value to an integer
///
/// * `null` or missing -> `default`
/// * booleans -> `0` / `1`
/// * finite numbers -> truncated toward zero; non-finite -> `default`
/// * strings -> [`lenient_int_str`]
/// * arrays and objects -> `default`
pub fn lenient_int(value: Option<&Value>, default: i64) -> i64 {
    match value {
        None | Some(Value::Null) => default,
        Some(Value::Bool(flag)) => i64::from(*flag),
        Some(Value::Number(number)) => {
            if let Some(int) = number.as_i64() {
                int
            } else if let Some(unsigned) = number.as_u64() {
                i64::try_from(unsigned).unwrap_or(i64::MAX)
            } else {
                number
                    .as_f64()
                    .map_or(default, |float| float_to_int(float, default))
            }
        }
        Some(Value::String(text)) => lenient_int_str(text, default),
        Some(_) => default,
    }
}

/// Coerce a string to an integer
///
/// Accepts whitespace or apostrophe thousands separators, either `,` or `.`
/// as the decimal mark, and falls back to the first integer embedded in the
/// text (`"abc12def"` -> `12`). `NaN` and infinities yield `default`.
pub fn lenient_int_str(raw: &str, default: i64) -> i64 {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return default;
    }

    let normalized = normalize_separators(trimmed);
    if let Ok(int) = normalized.parse::<i64>() {
        return int;
    }
    if let Ok(float) = normalized.parse::<f64>() {
        return float_to_int(float, default);
    }

    first_embedded_integer(trimmed).unwrap_or(default)
}

fn float_to_int(float: f64, default: i64) -> i64 {
    if float.is_finite() {
        float.trunc() as i64
    } else {
        default
    }
}

/// Rewrite a locale-formatted number into something `str::parse` accepts
fn normalize_separators(text: &str) -> String {
    let compact: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\'')
        .collect();

    let last_comma = compact.rfind(',');
    let last_dot = compact.rfind('.');

    match (last_comma, last_dot) {
        (Some(comma), Some(dot)) => {
            if comma > dot {
                compact.replace('.', "").replace(',', ".")
            } else {
                compact.replace(',', "")
            }
        }
        (Some(comma), None) => {
            let single = compact.matches(',').count() == 1;
            let fraction_digits = compact.len() - comma - 1;
            if single && fraction_digits != 3 {
                compact.replace(',', ".")
            } else {
                compact.replace(',', "")
            }
        }
        (None, Some(_)) if compact.matches('.').count() > 1 => compact.replace('.', ""),
        _ => compact,
    }
}

/// Coerce an optional JSON value to a flag
///
/// Accepts booleans, numbers (non-zero is `true`) and the strings
/// `true`/`false`, `yes`/`no` and `1`/`0` in any case. Anything else is
/// `None`.
pub fn lenient_bool(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(flag) => Some(*flag),
        Value::Number(_) => Some(lenient_int(value, 0) != 0),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Find the first run of ASCII digits, keeping an immediately preceding minus sign
fn first_embedded_integer(text: &str) -> Option<i64> {
    let bytes = text.as_bytes();
    let start = bytes.iter().position(u8::is_ascii_digit)?;
    let end = bytes[start..]
        .iter()
        .position(|b| !b.is_ascii_digit())
        .map_or(bytes.len(), |offset| start + offset);

    let negative = start > 0 && bytes[start - 1] == b'-';
    let digits: i64 = text[start..end].parse().ok()?;
    Some(if negative { -digits } else { digits })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_and_null_use_default() {
        assert_eq!(lenient_int(None, 7), 7);
        assert_eq!(lenient_int(Some(&Value::Null), 7), 7);
    }

    #[test]
    fn test_booleans() {
        assert_eq!(lenient_int(Some(&json!(true)), 0), 1);
        assert_eq!(lenient_int(Some(&json!(false)), 9), 0);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(lenient_int(Some(&json!(42)), 0), 42);
        assert_eq!(lenient_int(Some(&json!(42.9)), 0), 42);
        assert_eq!(lenient_int(Some(&json!(-3)), 0), -3);
    }

    #[test]
    fn test_locale_formatted_strings() {
        assert_eq!(lenient_int_str("1 234,5", 0), 1234);
        assert_eq!(lenient_int_str("1,234", 0), 1234);
        assert_eq!(lenient_int_str("1.234,56", 0), 1234);
        assert_eq!(lenient_int_str("1,234.56", 0), 1234);
        assert_eq!(lenient_int_str("1.234.567", 0), 1234567);
        assert_eq!(lenient_int_str("12,50", 0), 12);
        assert_eq!(lenient_int_str("1\u{a0}048\u{a0}576", 0), 1048576);
    }

    #[test]
    fn test_non_finite_strings_use_default() {
        assert_eq!(lenient_int_str("NaN", 5), 5);
        assert_eq!(lenient_int_str("Infinity", 5), 5);
        assert_eq!(lenient_int_str("-inf", 5), 5);
    }

    #[test]
    fn test_embedded_integer_fallback() {
        assert_eq!(lenient_int_str("abc12def", 0), 12);
        assert_eq!(lenient_int_str("size: 2048 bytes", 0), 2048);
        assert_eq!(lenient_int_str("no digits", 3), 3);
        assert_eq!(lenient_int(Some(&json!("abc12def")), 0), 12);
    }

    #[test]
    fn test_lenient_bool() {
        assert_eq!(lenient_bool(Some(&json!(true))), Some(true));
        assert_eq!(lenient_bool(Some(&json!("False"))), Some(false));
        assert_eq!(lenient_bool(Some(&json!(" yes "))), Some(true));
        assert_eq!(lenient_bool(Some(&json!(0))), Some(false));
        assert_eq!(lenient_bool(Some(&json!(2))), Some(true));
        assert_eq!(lenient_bool(Some(&json!("maybe"))), None);
        assert_eq!(lenient_bool(Some(&Value::Null)), None);
        assert_eq!(lenient_bool(None), None);
    }

    #[test]
    fn test_structured_values_use_default() {
        assert_eq!(lenient_int(Some(&json!([1, 2])), 4), 4);
        assert_eq!(lenient_int(Some(&json!({"size": 1})), 4), 4);
        assert_eq!(lenient_int_str("   ", 4), 4);
    }
}
