//! Rendering, matching and ordering of JSON field values.

use std::cmp::Ordering;

use serde_json::Value;

/// Render a scalar the way it appears in text output.
///
/// Strings are unquoted, null is empty, and mappings or lists fall back to
/// compact JSON.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Render a field value for string concatenation.
///
/// List elements are de-duplicated in first-seen order and joined with
/// `delimiter`.
pub fn value_to_text(value: &Value, delimiter: &str) -> String {
    match value {
        Value::Array(items) => {
            let mut seen: Vec<String> = Vec::with_capacity(items.len());
            for item in items {
                let text = scalar_text(item);
                if !seen.contains(&text) {
                    seen.push(text);
                }
            }
            seen.join(delimiter)
        }
        other => scalar_text(other),
    }
}

/// Equality test used by `field=value` filters.
///
/// Scalars compare by their text form; a list matches when any element does.
pub fn value_matches(value: &Value, expected: &str) -> bool {
    match value {
        Value::Null => false,
        Value::Array(items) => items.iter().any(|item| value_matches(item, expected)),
        Value::Object(_) => false,
        other => scalar_text(other) == expected,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Ordering used by `sort_by`.
///
/// Two numeric values (numbers or numeric strings) compare numerically,
/// everything else compares by rendered text.
pub fn compare_values(left: &Value, right: &Value) -> Ordering {
    if let (Some(a), Some(b)) = (as_number(left), as_number(right))
        && let Some(ordering) = a.partial_cmp(&b)
    {
        return ordering;
    }
    value_to_text(left, ",").cmp(&value_to_text(right, ","))
}

/// Parse the boolean spellings accepted in directive documents.
pub fn parse_bool_like(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_values_are_deduplicated_in_order() {
        let value = json!(["b", "a", "b", 1]);
        assert_eq!(value_to_text(&value, ";"), "b;a;1");
    }

    #[test]
    fn numeric_strings_sort_numerically() {
        assert_eq!(compare_values(&json!("10"), &json!("9")), Ordering::Greater);
        assert_eq!(compare_values(&json!("b"), &json!("a")), Ordering::Greater);
    }

    #[test]
    fn bool_like_spellings() {
        assert_eq!(parse_bool_like("True"), Some(true));
        assert_eq!(parse_bool_like(" no "), Some(false));
        assert_eq!(parse_bool_like("maybe"), None);
    }
}
