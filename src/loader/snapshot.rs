use crate::core::{DbError, Result};
use serde_json::{Map, Value as JsonValue};
use std::path::{Path, PathBuf};
use tokio::fs;

pub type JsonRecord = Map<String, JsonValue>;

/// Regular files in `dir` whose name starts with `prefix`, in lexicographic
/// order.
pub async fn snapshot_files(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|err| DbError::load(dir, format!("failed to read data directory: {}", err)))?;

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|err| DbError::load(dir, format!("failed to iterate data directory: {}", err)))?
    {
        let path = entry.path();
        let file_type = entry
            .file_type()
            .await
            .map_err(|err| DbError::load(&path, format!("failed to inspect file type: {}", err)))?;
        if !file_type.is_file() {
            continue;
        }

        let matches = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(prefix));
        if matches {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Parses a snapshot as a stream of back-to-back JSON values.
///
/// Each top-level value is a record object, an array of record objects, or
/// `{"<collection>": [...]}`.
pub fn parse_records(bytes: &[u8], collection: &str, path: &Path) -> Result<Vec<JsonRecord>> {
    let mut records = Vec::new();
    let stream = serde_json::Deserializer::from_slice(bytes).into_iter::<JsonValue>();

    for value in stream {
        let value = value.map_err(|err| DbError::load(path, format!("invalid JSON: {}", err)))?;
        match value {
            JsonValue::Object(mut object) => match unwrap_wrapper(&mut object, collection) {
                Some(items) => push_objects(items, path, &mut records)?,
                None => records.push(object),
            },
            JsonValue::Array(items) => push_objects(items, path, &mut records)?,
            other => {
                return Err(DbError::load(
                    path,
                    format!("expected an object or array, found {}", kind_of(&other)),
                ));
            }
        }
    }

    Ok(records)
}

/// Takes the array out of `{"<collection>": [...]}`.
fn unwrap_wrapper(object: &mut JsonRecord, collection: &str) -> Option<Vec<JsonValue>> {
    if object.len() != 1 || !matches!(object.get(collection), Some(JsonValue::Array(_))) {
        return None;
    }
    match object.remove(collection) {
        Some(JsonValue::Array(items)) => Some(items),
        _ => None,
    }
}

fn push_objects(items: Vec<JsonValue>, path: &Path, records: &mut Vec<JsonRecord>) -> Result<()> {
    for item in items {
        match item {
            JsonValue::Object(object) => records.push(object),
            other => {
                return Err(DbError::load(
                    path,
                    format!("expected a record object, found {}", kind_of(&other)),
                ));
            }
        }
    }
    Ok(())
}

fn kind_of(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
