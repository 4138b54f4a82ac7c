//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BACKEND_URL` - Base URL of the hosted auth/data backend
//! - `BACKEND_ANON_KEY` - Public anon key of the backend project (min 20 chars, high entropy)
//!
//! ## Optional
//! - `STOREFRONT_DATA_DIR` - Directory for persisted session state (default: .farmacia)
//! - `STOREFRONT_CATALOG_PATH` - JSON product catalog (default: empty catalog)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate between 0 and 1 (default: 1.0)

use std::collections::HashMap;
use std::path::PathBuf;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ANON_KEY_LENGTH: usize = 20;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_DATA_DIR: &str = ".farmacia";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Hosted backend connection
    pub backend: BackendConfig,
    /// Directory holding persisted cart, profile and session state
    pub data_dir: PathBuf,
    /// Product catalog file, if any
    pub catalog_path: Option<PathBuf>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
}

/// Hosted backend configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct BackendConfig {
    /// Project base URL (e.g., <https://abc.supabase.co>)
    pub url: Url,
    /// Project anon key, sent as the `apikey` header
    pub anon_key: SecretString,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("url", &self.url.as_str())
            .field("anon_key", &"[REDACTED]")
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the anon key fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build configuration from any variable source.
    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let backend = BackendConfig::from_vars(&var)?;

        let data_dir = PathBuf::from(
            var("STOREFRONT_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
        );
        let catalog_path = var("STOREFRONT_CATALOG_PATH").map(PathBuf::from);

        let sentry_sample_rate = match var("SENTRY_SAMPLE_RATE") {
            Some(raw) => parse_sample_rate(&raw)?,
            None => 1.0,
        };

        Ok(Self {
            backend,
            data_dir,
            catalog_path,
            sentry_dsn: var("SENTRY_DSN"),
            sentry_environment: var("SENTRY_ENVIRONMENT"),
            sentry_sample_rate,
        })
    }
}

impl BackendConfig {
    fn from_vars(var: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_url =
            var("BACKEND_URL").ok_or_else(|| ConfigError::MissingEnvVar("BACKEND_URL".to_string()))?;
        let url = parse_backend_url(&raw_url)?;

        let anon_key = var("BACKEND_ANON_KEY")
            .ok_or_else(|| ConfigError::MissingEnvVar("BACKEND_ANON_KEY".to_string()))?;
        validate_anon_key(&anon_key, "BACKEND_ANON_KEY")?;

        Ok(Self {
            url,
            anon_key: SecretString::from(anon_key),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse the backend URL, accepting only http(s).
fn parse_backend_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar("BACKEND_URL".to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "BACKEND_URL".to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

fn parse_sample_rate(raw: &str) -> Result<f32, ConfigError> {
    let rate = raw.trim().parse::<f32>().map_err(|e| {
        ConfigError::InvalidEnvVar("SENTRY_SAMPLE_RATE".to_string(), e.to_string())
    })?;
    if !(0.0..=1.0).contains(&rate) {
        return Err(ConfigError::InvalidEnvVar(
            "SENTRY_SAMPLE_RATE".to_string(),
            format!("must be between 0 and 1 (got {rate})"),
        ));
    }
    Ok(rate)
}

/// Validate the anon key: minimum length, then placeholder and entropy checks.
fn validate_anon_key(key: &str, var_name: &str) -> Result<(), ConfigError> {
    if key.len() < MIN_ANON_KEY_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_ANON_KEY_LENGTH,
                key.len()
            ),
        ));
    }
    validate_secret_strength(key, var_name)
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Real anon keys are JWTs with high entropy
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Copy the key from the backend dashboard."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const GOOD_KEY: &str = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.aB3xY9mK2nL5pQ7rT0uW4zC6";

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        // "ab" has entropy of 1 bit per char (50% a, 50% b)
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_anon_key_placeholder() {
        let result = validate_anon_key("your-anon-key-goes-right-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_anon_key_too_short() {
        let result = validate_anon_key("aB3$xY9!", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, ref msg)) if msg.contains("at least 20")));
    }

    #[test]
    fn test_validate_anon_key_low_entropy() {
        let result = validate_anon_key("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_anon_key_valid() {
        assert!(validate_anon_key(GOOD_KEY, "TEST_VAR").is_ok());
    }

    #[test]
    fn test_from_vars_defaults() {
        let config = StorefrontConfig::from_vars(vars(&[
            ("BACKEND_URL", "https://abc.supabase.co"),
            ("BACKEND_ANON_KEY", GOOD_KEY),
        ]))
        .unwrap();

        assert_eq!(config.backend.url.as_str(), "https://abc.supabase.co/");
        assert_eq!(config.data_dir, PathBuf::from(".farmacia"));
        assert!(config.catalog_path.is_none());
        assert!(config.sentry_dsn.is_none());
        assert!((config.sentry_sample_rate - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_from_vars_missing_key() {
        let result = StorefrontConfig::from_vars(vars(&[("BACKEND_URL", "https://abc.supabase.co")]));
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(ref k)) if k == "BACKEND_ANON_KEY"));
    }

    #[test]
    fn test_from_vars_rejects_bad_url_and_rate() {
        let bad_scheme = StorefrontConfig::from_vars(vars(&[
            ("BACKEND_URL", "ftp://abc.supabase.co"),
            ("BACKEND_ANON_KEY", GOOD_KEY),
        ]));
        assert!(matches!(bad_scheme, Err(ConfigError::InvalidEnvVar(_, _))));

        let bad_rate = StorefrontConfig::from_vars(vars(&[
            ("BACKEND_URL", "https://abc.supabase.co"),
            ("BACKEND_ANON_KEY", GOOD_KEY),
            ("SENTRY_SAMPLE_RATE", "1.5"),
        ]));
        assert!(matches!(bad_rate, Err(ConfigError::InvalidEnvVar(ref k, _)) if k == "SENTRY_SAMPLE_RATE"));
    }

    #[test]
    fn test_backend_config_debug_redacts_key() {
        let config = BackendConfig {
            url: Url::parse("https://abc.supabase.co").unwrap(),
            anon_key: SecretString::from("super_secret_anon_key"),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("abc.supabase.co"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_anon_key"));
    }
}
