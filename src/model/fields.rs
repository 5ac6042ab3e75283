use super::{EntityKind, GENDER, MARK};
use crate::core::{DataType, DbError, Record, Result, Value};
use serde_json::Map;

const GENDERS: [&str; 2] = ["m", "f"];
const MARK_RANGE: std::ops::RangeInclusive<i64> = 0..=5;

/// Merges client or snapshot JSON fields onto `record`.
///
/// Unknown fields, `null`, wrong JSON types and out-of-domain values are
/// malformed input. Empty strings leave the current value untouched.
/// Nothing is written unless every field is valid.
pub fn merge_json(record: &mut Record, kind: EntityKind, body: &Map<String, serde_json::Value>) -> Result<()> {
    let mut staged = Vec::with_capacity(body.len());

    for (name, raw) in body {
        let field = record.schema().field(name).ok_or_else(|| {
            DbError::malformed(format!("unknown field '{}' for {}", name, kind))
        })?;

        let value = match (field.data_type, raw) {
            (_, serde_json::Value::Null) => {
                return Err(DbError::malformed(format!("field '{}' is null", name)));
            }
            (DataType::Integer, serde_json::Value::Number(number)) => {
                let int = number.as_i64().ok_or_else(|| {
                    DbError::malformed(format!("field '{}' must be an integer", name))
                })?;
                Value::Integer(int)
            }
            (DataType::Text, serde_json::Value::String(text)) if text.is_empty() => continue,
            (DataType::Text, serde_json::Value::String(text)) => Value::Text(text.clone()),
            (expected, _) => {
                return Err(DbError::malformed(format!(
                    "field '{}' must be {}",
                    name,
                    expected.to_string().to_lowercase()
                )));
            }
        };

        check_domain(kind, name, &value)?;
        staged.push((name.as_str(), value));
    }

    for (name, value) in staged {
        record.set(name, value)?;
    }
    Ok(())
}

fn check_domain(kind: EntityKind, name: &str, value: &Value) -> Result<()> {
    match (kind, name) {
        (EntityKind::User, GENDER) => {
            if !value.as_str().is_some_and(|g| GENDERS.contains(&g)) {
                return Err(DbError::malformed(format!("invalid gender '{}'", value)));
            }
        }
        (EntityKind::Visit, MARK) => {
            if !value.as_i64().is_some_and(|m| MARK_RANGE.contains(&m)) {
                return Err(DbError::malformed(format!("mark {} is out of range", value)));
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn user() -> Record {
        Arc::new(EntityKind::User.schema().unwrap()).new_record()
    }

    fn object(value: serde_json::Value) -> Map<String, serde_json::Value> {
        match value {
            serde_json::Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_merge_sets_typed_fields() {
        let mut record = user();
        let body = object(json!({"id": 5, "gender": "f", "email": "x@y.z", "birth_date": -100}));
        merge_json(&mut record, EntityKind::User, &body).unwrap();
        assert_eq!(record.id().unwrap(), 5);
        assert_eq!(record.get_str("gender").unwrap(), "f");
        assert_eq!(record.get_i64("birth_date").unwrap(), -100);
    }

    #[test]
    fn test_null_field_is_malformed_and_nothing_changes() {
        let mut record = user();
        let body = object(json!({"email": "x@y.z", "first_name": null}));
        let err = merge_json(&mut record, EntityKind::User, &body);
        assert!(matches!(err, Err(DbError::Malformed(_))));
        assert_eq!(record.get_str("email").unwrap(), "");
    }

    #[test]
    fn test_wrong_types_are_malformed() {
        for body in [
            json!({"birth_date": "yesterday"}),
            json!({"birth_date": 1.5}),
            json!({"email": 12}),
            json!({"gender": "x"}),
            json!({"nickname": "bob"}),
        ] {
            let mut record = user();
            let err = merge_json(&mut record, EntityKind::User, &object(body.clone()));
            assert!(matches!(err, Err(DbError::Malformed(_))), "{body}");
        }
    }

    #[test]
    fn test_empty_string_keeps_value() {
        let mut record = user();
        record.set("first_name", "Anna").unwrap();
        merge_json(&mut record, EntityKind::User, &object(json!({"first_name": ""}))).unwrap();
        assert_eq!(record.get_str("first_name").unwrap(), "Anna");
    }

    #[test]
    fn test_mark_range() {
        let mut visit = Arc::new(EntityKind::Visit.schema().unwrap()).new_record();
        merge_json(&mut visit, EntityKind::Visit, &object(json!({"mark": 0}))).unwrap();
        let err = merge_json(&mut visit, EntityKind::Visit, &object(json!({"mark": 6})));
        assert!(matches!(err, Err(DbError::Malformed(_))));
    }
}
