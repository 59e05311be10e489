// src/codec/data.rs
// `data` section: YAML mappings/sequences of scalars into JSON values

use serde_json::Value;

use crate::llm::types::is_empty_value;

/// Decode a YAML body. Blank, `null` and empty values (`{}`, `[]`, `''`) are absent.
pub fn decode_data_section(body: &str) -> Result<Option<Value>, String> {
    if body.trim().is_empty() {
        return Ok(None);
    }

    let value: Value = serde_yaml::from_str(body).map_err(|e| e.to_string())?;
    Ok(if is_empty_value(&value) { None } else { Some(value) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_choices_sequence() {
        let value = decode_data_section("choices:\n  - Yes\n  - No\n").unwrap();
        assert_eq!(value, Some(json!({"choices": ["Yes", "No"]})));
    }

    #[test]
    fn test_scalars_keep_types() {
        let value = decode_data_section("total: 12\nname: Ada\npaid: true").unwrap();
        assert_eq!(value, Some(json!({"total": 12, "name": "Ada", "paid": true})));
    }

    #[test]
    fn test_blank_and_null_are_absent() {
        assert_eq!(decode_data_section("  \n").unwrap(), None);
        assert_eq!(decode_data_section("~").unwrap(), None);
    }

    #[test]
    fn test_empty_collections_are_absent() {
        assert_eq!(decode_data_section("{}").unwrap(), None);
        assert_eq!(decode_data_section("[]").unwrap(), None);
        assert_eq!(decode_data_section("''").unwrap(), None);
        assert_eq!(decode_data_section("\"  \"").unwrap(), None);
    }

    #[test]
    fn test_falsy_scalars_are_kept() {
        assert_eq!(decode_data_section("0").unwrap(), Some(json!(0)));
        assert_eq!(decode_data_section("false").unwrap(), Some(json!(false)));
    }

    #[test]
    fn test_invalid_yaml_reports_error() {
        assert!(decode_data_section("key: [unclosed").is_err());
    }
}
