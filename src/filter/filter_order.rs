use serde_json::Value;

use super::error::FilterError;
use super::types::{SortDirection, SortKey};

pub struct FilterOrder;

impl FilterOrder {
    pub fn validate_and_parse(order: &Value) -> Result<Vec<SortKey>, FilterError> {
        match order {
            Value::Null => Ok(vec![]),
            Value::String(s) => Self::parse_order_string(s),
            Value::Array(arr) => {
                // ["-dateAdded", "name asc"]
                let mut out = Vec::new();
                for v in arr {
                    let s = v
                        .as_str()
                        .ok_or_else(|| FilterError::InvalidSort("array entries must be strings".to_string()))?;
                    out.extend(Self::parse_order_string(s)?);
                }
                Ok(out)
            }
            Value::Object(obj) => {
                // { "dateAdded": -1, "name": "asc" }
                let mut out = Vec::new();
                for (k, v) in obj {
                    out.push(SortKey { field: k.clone(), direction: Self::parse_direction(v)? });
                }
                Ok(out)
            }
            _ => Err(FilterError::InvalidSort(format!("unsupported sort format: {}", order))),
        }
    }

    fn parse_direction(v: &Value) -> Result<SortDirection, FilterError> {
        match v {
            Value::Number(n) if n.as_i64() == Some(1) => Ok(SortDirection::Asc),
            Value::Number(n) if n.as_i64() == Some(-1) => Ok(SortDirection::Desc),
            Value::String(s) if s.eq_ignore_ascii_case("asc") => Ok(SortDirection::Asc),
            Value::String(s) if s.eq_ignore_ascii_case("desc") => Ok(SortDirection::Desc),
            other => Err(FilterError::InvalidSort(format!("invalid direction {}", other))),
        }
    }

    fn parse_order_string(s: &str) -> Result<Vec<SortKey>, FilterError> {
        // "-dateAdded,+name" or "dateAdded desc, name"
        let mut out = Vec::new();
        for part in s.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }
            let mut it = trimmed.split_whitespace();
            let Some(token) = it.next() else { continue };

            let (field, mut direction) = if let Some(rest) = token.strip_prefix('-') {
                (rest, SortDirection::Desc)
            } else if let Some(rest) = token.strip_prefix('+') {
                (rest, SortDirection::Asc)
            } else {
                (token, SortDirection::Asc)
            };
            if let Some(dir) = it.next() {
                direction = Self::parse_direction(&Value::String(dir.to_string()))?;
            }
            if field.is_empty() {
                return Err(FilterError::InvalidSort(format!("missing field in '{}'", trimmed)));
            }
            out.push(SortKey { field: field.to_string(), direction });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_signed_fields() {
        let keys = FilterOrder::validate_and_parse(&json!("-dateAdded,+name,code")).unwrap();
        assert_eq!(keys, vec![SortKey::desc("dateAdded"), SortKey::asc("name"), SortKey::asc("code")]);
    }

    #[test]
    fn parses_worded_directions() {
        let keys = FilterOrder::validate_and_parse(&json!(["dateAdded DESC", "name"])).unwrap();
        assert_eq!(keys, vec![SortKey::desc("dateAdded"), SortKey::asc("name")]);
    }

    #[test]
    fn parses_object_form() {
        let keys = FilterOrder::validate_and_parse(&json!({"a": -1, "b": "asc"})).unwrap();
        assert_eq!(keys, vec![SortKey::desc("a"), SortKey::asc("b")]);
    }

    #[test]
    fn rejects_bad_directions() {
        assert!(FilterOrder::validate_and_parse(&json!({"a": 2})).is_err());
        assert!(FilterOrder::validate_and_parse(&json!("a sideways")).is_err());
        assert!(FilterOrder::validate_and_parse(&json!("-")).is_err());
        assert!(FilterOrder::validate_and_parse(&json!(5)).is_err());
    }
}
