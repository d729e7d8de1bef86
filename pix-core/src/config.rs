//! # Configuration
//!
//! A minimal string key/value store, filled once at startup and read back
//! through an immutable snapshot.
//!
//! ```rust
//! use pix_core::PixConfig;
//!
//! let mut config = PixConfig::new();
//! config.set("http.port", "8000");
//! config.set("upload.max_files", "100");
//!
//! let snapshot = config.snapshot();
//! assert_eq!(snapshot.get_u64("upload.max_files"), Some(100));
//! ```
//!
//! ## Environment overrides
//!
//! `PixConfig::load_env` copies every variable with the given prefix,
//! lower-cased, with `__` turned into `.`:
//!
//! ```bash
//! export PIX__HTTP__PORT=9000   # -> http.port
//! ```

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct PixConfig {
    values: HashMap<String, String>,
}

impl PixConfig {
    /// Create an empty config store.
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Set a configuration key to a string value.
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    /// Set a key only if it is not present yet.
    pub fn set_default<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.entry(key.into()).or_insert_with(|| value.into());
    }

    /// Get a configuration value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    /// Check whether a key is present.
    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Copy `PREFIX` + `SECTION__KEY` variables into `section.key`.
    pub fn load_env(&mut self, prefix: &str) {
        self.load_vars(prefix, std::env::vars());
    }

    /// Same as `load_env`, reading from an explicit variable list.
    pub fn load_vars<I>(&mut self, prefix: &str, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(prefix) {
                if stripped.is_empty() {
                    continue;
                }
                let normalized = stripped.to_lowercase().replace("__", ".");
                self.values.insert(normalized, value);
            }
        }
    }

    pub fn snapshot(&self) -> PixConfigSnapshot {
        PixConfigSnapshot::new(self.values.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct PixConfigSnapshot {
    map: HashMap<String, String>,
}

impl PixConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|s| s.as_str())
    }

    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get(key).and_then(|v| v.trim().parse::<usize>().ok())
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.trim().parse::<u64>().ok())
    }

    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.get(key).and_then(|v| v.trim().parse::<u32>().ok())
    }

    /// Comma-separated list, trimmed, empty entries dropped.
    pub fn get_list(&self, key: &str) -> Option<Vec<String>> {
        self.get(key).map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
    }
}
