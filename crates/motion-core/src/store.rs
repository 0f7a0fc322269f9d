//! Persisted-configuration store.
//!
//! Axis calibration survives restarts through a keyed store addressed by
//! hierarchical `/`-separated node paths (`"axes/theta/scale"`). The
//! store is passed into constructors explicitly; there is no ambient
//! global registry.
//!
//! Contract: a `put` always updates the in-memory tree. Persistence is a
//! separate `flush`, and a flush failure (store file removed, directory
//! gone) is reported to the caller, who logs it and keeps operating on
//! the in-memory value.

use crate::error::{MotionError, MotionResult};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};

/// Keyed configuration store with get-with-default / put / flush
/// semantics.
pub trait ConfigStore: Send + Sync {
    fn get_str(&self, key: &str, default: &str) -> String;
    fn get_i64(&self, key: &str, default: i64) -> i64;
    fn get_f64(&self, key: &str, default: f64) -> f64;
    fn get_bool(&self, key: &str, default: bool) -> bool;

    fn put_str(&self, key: &str, value: &str);
    fn put_i64(&self, key: &str, value: i64);
    fn put_f64(&self, key: &str, value: f64);
    fn put_bool(&self, key: &str, value: bool);

    /// Persist the in-memory tree to the backing file, if any.
    fn flush(&self) -> MotionResult<()>;
}

/// TOML-backed [`ConfigStore`].
///
/// Keys are `/`-separated paths into nested TOML tables. A store built
/// with [`TomlStore::in_memory`] has no backing file and `flush` is a
/// no-op, which is convenient for tests.
pub struct TomlStore {
    root: RwLock<toml::Table>,
    path: Option<PathBuf>,
}

impl TomlStore {
    /// Create an empty store with no backing file.
    pub fn in_memory() -> Self {
        Self {
            root: RwLock::new(toml::Table::new()),
            path: None,
        }
    }

    /// Open a store backed by `path`, loading it if the file exists.
    ///
    /// A missing file is not an error; the store starts empty and the
    /// file is created on the first flush. A file that exists but does
    /// not parse is a configuration error.
    pub fn open(path: impl AsRef<Path>) -> MotionResult<Self> {
        let path = path.as_ref().to_path_buf();
        let root = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            text.parse::<toml::Table>().map_err(|e| {
                MotionError::Config(format!("malformed config file {}: {e}", path.display()))
            })?
        } else {
            toml::Table::new()
        };
        tracing::debug!(path = %path.display(), "opened config store");
        Ok(Self {
            root: RwLock::new(root),
            path: Some(path),
        })
    }

    fn get(&self, key: &str) -> Option<toml::Value> {
        let root = self.root.read();
        let mut table: &toml::Table = &root;
        let mut parts = key.split('/').peekable();
        while let Some(part) = parts.next() {
            let v = table.get(part)?;
            if parts.peek().is_none() {
                return Some(v.clone());
            }
            table = v.as_table()?;
        }
        None
    }

    fn put(&self, key: &str, value: toml::Value) {
        let mut root = self.root.write();
        let mut table: &mut toml::Table = &mut root;
        let mut parts = key.split('/').peekable();
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                table.insert(part.to_string(), value);
                return;
            }
            // Replace any scalar occupying an interior node with a table.
            let entry = table
                .entry(part.to_string())
                .or_insert_with(|| toml::Value::Table(toml::Table::new()));
            if !entry.is_table() {
                *entry = toml::Value::Table(toml::Table::new());
            }
            match entry.as_table_mut() {
                Some(t) => table = t,
                None => return,
            }
        }
    }
}

impl ConfigStore for TomlStore {
    fn get_str(&self, key: &str, default: &str) -> String {
        match self.get(key) {
            Some(toml::Value::String(s)) => s,
            _ => default.to_string(),
        }
    }

    fn get_i64(&self, key: &str, default: i64) -> i64 {
        match self.get(key) {
            Some(toml::Value::Integer(i)) => i,
            _ => default,
        }
    }

    fn get_f64(&self, key: &str, default: f64) -> f64 {
        match self.get(key) {
            Some(toml::Value::Float(f)) => f,
            // Hand-edited files often hold "0" where "0.0" is meant.
            Some(toml::Value::Integer(i)) => i as f64,
            _ => default,
        }
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(toml::Value::Boolean(b)) => b,
            _ => default,
        }
    }

    fn put_str(&self, key: &str, value: &str) {
        self.put(key, toml::Value::String(value.to_string()));
    }

    fn put_i64(&self, key: &str, value: i64) {
        self.put(key, toml::Value::Integer(value));
    }

    fn put_f64(&self, key: &str, value: f64) {
        self.put(key, toml::Value::Float(value));
    }

    fn put_bool(&self, key: &str, value: bool) {
        self.put(key, toml::Value::Boolean(value));
    }

    fn flush(&self) -> MotionResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let text = {
            let root = self.root.read();
            toml::to_string_pretty(&*root)
                .map_err(|e| MotionError::Store(format!("serialize config tree: {e}")))?
        };
        std::fs::write(path, text)
            .map_err(|e| MotionError::Store(format!("write {}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_round_trip() {
        let store = TomlStore::in_memory();
        store.put_f64("axes/theta/scale", 100.0);
        store.put_str("axes/theta/units", "deg");
        store.put_i64("axes/theta/port", 400);
        store.put_bool("axes/theta/enabled", true);

        assert_eq!(store.get_f64("axes/theta/scale", 1.0), 100.0);
        assert_eq!(store.get_str("axes/theta/units", "mm"), "deg");
        assert_eq!(store.get_i64("axes/theta/port", 0), 400);
        assert!(store.get_bool("axes/theta/enabled", false));
    }

    #[test]
    fn test_missing_keys_fall_back_to_default() {
        let store = TomlStore::in_memory();
        assert_eq!(store.get_f64("axes/phi/scale", 2.5), 2.5);
        assert_eq!(store.get_str("nothing", "fallback"), "fallback");
    }

    #[test]
    fn test_integer_read_as_float() {
        let store = TomlStore::in_memory();
        store.put_i64("axes/theta/offset_raw", 500);
        assert_eq!(store.get_f64("axes/theta/offset_raw", 0.0), 500.0);
    }

    #[test]
    fn test_flush_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("axes.toml");

        let store = TomlStore::open(&path).unwrap();
        store.put_f64("axes/x/scale", -42.5);
        store.put_str("axes/x/units", "mm");
        store.flush().unwrap();

        let reloaded = TomlStore::open(&path).unwrap();
        assert_eq!(reloaded.get_f64("axes/x/scale", 0.0), -42.5);
        assert_eq!(reloaded.get_str("axes/x/units", ""), "mm");
    }

    #[test]
    fn test_flush_failure_leaves_memory_intact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone").join("axes.toml");

        let store = TomlStore::open(&path).unwrap();
        store.put_f64("axes/x/scale", 7.0);
        // Parent directory does not exist; flush fails but the value stays.
        assert!(store.flush().is_err());
        assert_eq!(store.get_f64("axes/x/scale", 0.0), 7.0);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "this is = not [ valid").unwrap();

        assert!(matches!(
            TomlStore::open(&path),
            Err(MotionError::Config(_))
        ));
    }
}
