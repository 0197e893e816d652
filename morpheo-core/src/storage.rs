//! Key/value persistence backends and JSON slice selection

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{Map, Value};

use crate::error::StorageError;

/// A place to keep persisted state slices
pub trait Storage: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<Value>, StorageError>;
    fn save(&self, key: &str, value: &Value) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-process storage, mostly for tests and previews
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl Storage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.entries().get(key).cloned())
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        self.entries().insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries().remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{file}.json"))
    }
}

impl Storage for FileStorage {
    fn load(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    fn save(&self, key: &str, value: &Value) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        let text = serde_json::to_string_pretty(value)?;
        fs::write(self.path_for(key), text)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// Look up a dot-separated path (`"user.profile.name"`); array indices are numeric segments
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// Map each path to its current value (`null` when missing)
pub fn select_paths(value: &Value, paths: &[String]) -> Map<String, Value> {
    paths
        .iter()
        .map(|path| {
            let selected = get_path(value, path).cloned().unwrap_or(Value::Null);
            (path.clone(), selected)
        })
        .collect()
}

/// Select top-level keys of a state object
///
/// `include` wins when both filters are given; with neither, everything is kept.
pub fn pick_keys(value: &Value, include: Option<&[String]>, exclude: Option<&[String]>) -> Value {
    let Value::Object(map) = value else {
        return value.clone();
    };
    let selected: Map<String, Value> = match (include, exclude) {
        (Some(include), _) => map
            .iter()
            .filter(|(key, _)| include.iter().any(|k| k == *key))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        (None, Some(exclude)) => map
            .iter()
            .filter(|(key, _)| !exclude.iter().any(|k| k == *key))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        (None, None) => map.clone(),
    };
    Value::Object(selected)
}

/// Shallow-merge `overlay` object keys over `base`
pub fn merge_objects(base: &mut Value, overlay: &Value) {
    if let (Value::Object(base), Value::Object(overlay)) = (base, overlay) {
        for (key, value) in overlay {
            base.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_path_nested_and_indexed() {
        let value = json!({"user": {"tags": ["a", "b"], "name": "Ada"}});
        assert_eq!(get_path(&value, "user.name"), Some(&json!("Ada")));
        assert_eq!(get_path(&value, "user.tags.1"), Some(&json!("b")));
        assert_eq!(get_path(&value, "user.missing"), None);
    }

    #[test]
    fn test_pick_keys_include_wins() {
        let state = json!({"a": 1, "b": 2, "c": 3});
        let include = vec!["a".to_string()];
        let exclude = vec!["a".to_string(), "b".to_string()];

        assert_eq!(pick_keys(&state, Some(&include), Some(&exclude)), json!({"a": 1}));
        assert_eq!(pick_keys(&state, None, Some(&exclude)), json!({"c": 3}));
        assert_eq!(pick_keys(&state, None, None), state);
    }

    #[test]
    fn test_select_paths_missing_is_null() {
        let state = json!({"form": {"email": "x@y.z"}});
        let selected = select_paths(&state, &["form.email".into(), "form.name".into()]);
        assert_eq!(selected.get("form.email"), Some(&json!("x@y.z")));
        assert_eq!(selected.get("form.name"), Some(&Value::Null));
    }

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::new();
        assert!(storage.load("k").unwrap().is_none());
        storage.save("k", &json!({"v": 1})).unwrap();
        assert_eq!(storage.load("k").unwrap(), Some(json!({"v": 1})));
        storage.remove("k").unwrap();
        assert!(storage.is_empty());
    }

    #[test]
    fn test_file_storage_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("state"));

        storage.save("app/main", &json!({"count": 2})).unwrap();
        assert_eq!(storage.load("app/main").unwrap(), Some(json!({"count": 2})));

        storage.remove("app/main").unwrap();
        assert!(storage.load("app/main").unwrap().is_none());
    }
}
