use std::str::FromStr;

use pix_axum::middlewares::MultipartConfig;
use pix_blob::BlobConfig;
use pix_core::{PixConfig, PixConfigSnapshot};
use pix_validator::{ValidationRules, DEFAULT_MAX_DIMENSION};

struct ServerDefaults;

impl ServerDefaults {
    const HOST: &'static str = "127.0.0.1";
    const PORT: u16 = 8000;
    const ALLOWED_ORIGINS: &'static str = "*";
    const STORAGE_URL: &'static str = "file://./data/images";
    const NAMESPACE: &'static str = "images";
    const MAX_BATCH_FILES: usize = 100;
    const MAX_FILE_SIZE_MB: u64 = 50;
    const MAX_TOTAL_SIZE_MB: u64 = 500;
}

/// Plain environment variables and the config keys they fill.
const ENV_KEYS: &[(&str, &str)] = &[
    ("HTTP_HOST", "http.host"),
    ("HTTP_PORT", "http.port"),
    ("ALLOWED_ORIGINS", "cors.allowed_origins"),
    ("STORAGE_URL", "storage.url"),
    ("PIX_NAMESPACE", "storage.namespace"),
    ("PIX_MAX_BATCH_FILES", "upload.max_files"),
    ("PIX_MAX_DIMENSION", "upload.max_dimension"),
    ("PIX_MAX_FILE_SIZE_MB", "upload.max_file_mb"),
    ("PIX_MAX_TOTAL_SIZE_MB", "upload.max_total_mb"),
];

/// Prefix of the generic `PIX__SECTION__KEY` form.
const GENERIC_PREFIX: &str = "PIX__";

/// Everything the server reads at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub storage_url: String,
    pub namespace: String,
    pub max_files: usize,
    pub max_dimension: u32,
    pub max_file_bytes: u64,
    pub max_total_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_config(&PixConfig::new())
    }
}

impl ServerConfig {
    /// Read the process environment. Call `dotenvy::dotenv()` first to pick
    /// up a `.env` file.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Build from an explicit variable list. `PIX__SECTION__KEY` entries win
    /// over the plain names.
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: Vec<(String, String)> = vars.into_iter().collect();

        let mut config = PixConfig::new();
        for (name, value) in &vars {
            if let Some((_, key)) = ENV_KEYS.iter().find(|(env, _)| env == name) {
                config.set(*key, value.clone());
            }
        }
        config.load_vars(GENERIC_PREFIX, vars);

        Self::from_config(&config)
    }

    /// Typed view over a key/value config; missing or unparsable values
    /// fall back to the defaults.
    pub fn from_config(config: &PixConfig) -> Self {
        let snap = config.snapshot();

        let allowed_origins = snap
            .get_list("cors.allowed_origins")
            .filter(|list| !list.is_empty())
            .unwrap_or_else(|| vec![ServerDefaults::ALLOWED_ORIGINS.to_string()]);

        Self {
            host: non_empty_or(&snap, "http.host", ServerDefaults::HOST),
            port: parsed_or(&snap, "http.port", ServerDefaults::PORT),
            allowed_origins,
            storage_url: non_empty_or(&snap, "storage.url", ServerDefaults::STORAGE_URL),
            namespace: non_empty_or(&snap, "storage.namespace", ServerDefaults::NAMESPACE),
            max_files: parsed_or(&snap, "upload.max_files", ServerDefaults::MAX_BATCH_FILES),
            max_dimension: parsed_or(&snap, "upload.max_dimension", DEFAULT_MAX_DIMENSION),
            max_file_bytes: parsed_or(&snap, "upload.max_file_mb", ServerDefaults::MAX_FILE_SIZE_MB)
                * 1024
                * 1024,
            max_total_bytes: parsed_or(
                &snap,
                "upload.max_total_mb",
                ServerDefaults::MAX_TOTAL_SIZE_MB,
            ) * 1024
                * 1024,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validation_rules(&self) -> ValidationRules {
        ValidationRules::new().with_max_dimension(self.max_dimension)
    }

    pub fn multipart_config(&self) -> MultipartConfig {
        MultipartConfig::new()
            .max_file_size(self.max_file_bytes)
            .max_total_size(self.max_total_bytes)
            .max_files(self.max_files)
            .file_field("files")
    }

    pub fn blob_config(&self) -> BlobConfig {
        BlobConfig::new()
            .with_max_blob_bytes(self.max_file_bytes)
            .with_namespace(self.namespace.clone())
    }
}

fn non_empty_or(snap: &PixConfigSnapshot, key: &str, default: &str) -> String {
    snap.get(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}

fn parsed_or<T>(snap: &PixConfigSnapshot, key: &str, default: T) -> T
where
    T: FromStr,
{
    snap.get(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_match_the_documented_table() {
        let config = ServerConfig::from_vars(Vec::new());

        assert_eq!(config.addr(), "127.0.0.1:8000");
        assert_eq!(config.allowed_origins, vec!["*".to_string()]);
        assert_eq!(config.storage_url, "file://./data/images");
        assert_eq!(config.namespace, "images");
        assert_eq!(config.max_files, 100);
        assert_eq!(config.max_dimension, 2048);
        assert_eq!(config.max_file_bytes, 50 * 1024 * 1024);
        assert_eq!(config.max_total_bytes, 500 * 1024 * 1024);
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn plain_variables_are_read() {
        let config = ServerConfig::from_vars(vars(&[
            ("HTTP_HOST", "0.0.0.0"),
            ("HTTP_PORT", "9000"),
            ("ALLOWED_ORIGINS", "http://a.test, http://b.test"),
            ("STORAGE_URL", "memory://"),
            ("PIX_MAX_BATCH_FILES", "10"),
            ("PIX_MAX_DIMENSION", "512"),
        ]));

        assert_eq!(config.addr(), "0.0.0.0:9000");
        assert_eq!(config.allowed_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(config.storage_url, "memory://");
        assert_eq!(config.max_files, 10);
        assert_eq!(config.validation_rules().max_width, 512);
        assert_eq!(config.multipart_config().max_files, Some(10));
    }

    #[test]
    fn generic_form_wins_and_bad_numbers_fall_back() {
        let config = ServerConfig::from_vars(vars(&[
            ("HTTP_PORT", "9000"),
            ("PIX__HTTP__PORT", "9100"),
            ("PIX_MAX_FILE_SIZE_MB", "lots"),
            ("PIX__STORAGE__NAMESPACE", "avatars"),
        ]));

        assert_eq!(config.port, 9100);
        assert_eq!(config.max_file_bytes, 50 * 1024 * 1024);
        assert_eq!(config.namespace, "avatars");
        assert_eq!(config.blob_config().namespace, "avatars");
    }

    #[test]
    fn blank_origin_list_means_any() {
        let config = ServerConfig::from_vars(vars(&[("ALLOWED_ORIGINS", " , ")]));
        assert_eq!(config.allowed_origins, vec!["*".to_string()]);
    }
}
