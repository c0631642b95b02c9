//! Settings file and environment credentials

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{fmt, fs, io};

use crate::shared::errors::ConfigError;

/// PA-API allows at most ten ItemIds per GetItems call.
pub const MAX_BATCH_SIZE: usize = 10;

pub const DEFAULT_SETTINGS_PATH: &str = "Tracker.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketplaceCfg {
    pub host: String,
    pub region: String,
    pub marketplace: String,
    pub batch_size: usize,
    pub batch_interval_ms: u64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub timeout_secs: u64,
}

impl Default for MarketplaceCfg {
    fn default() -> Self {
        Self {
            host: "webservices.amazon.co.jp".to_string(),
            region: "us-west-2".to_string(),
            marketplace: "www.amazon.co.jp".to_string(),
            batch_size: MAX_BATCH_SIZE,
            batch_interval_ms: 3000,
            max_attempts: 3,
            backoff_base_ms: 1000,
            timeout_secs: 30,
        }
    }
}

impl MarketplaceCfg {
    pub fn batch_interval(&self) -> Duration {
        Duration::from_millis(self.batch_interval_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatchCfg {
    pub max_posts_per_run: usize,
    pub post_interval_ms: u64,
    pub hashtags: Vec<String>,
}

impl Default for DispatchCfg {
    fn default() -> Self {
        Self {
            max_posts_per_run: 5,
            post_interval_ms: 5000,
            hashtags: vec!["#Amazon".to_string(), "#PR".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThreadsCfg {
    pub api_base: String,
    pub token_url: String,
}

impl Default for ThreadsCfg {
    fn default() -> Self {
        Self {
            api_base: "https://graph.threads.net/v1.0".to_string(),
            token_url: "https://graph.facebook.com/v18.0/oauth/access_token".to_string(),
        }
    }
}

/// Settings file. Every field has a default, so the file itself is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub catalog_path: PathBuf,
    pub state_path: PathBuf,
    pub marketplace: MarketplaceCfg,
    pub dispatch: DispatchCfg,
    pub threads: ThreadsCfg,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("tracking_asins.json"),
            state_path: PathBuf::from("asin_results.json"),
            marketplace: MarketplaceCfg::default(),
            dispatch: DispatchCfg::default(),
            threads: ThreadsCfg::default(),
        }
    }
}

impl Settings {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let s = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&s, path)
    }

    fn from_toml(s: &str, path: &Path) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(s).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load an explicitly requested file, or the default file when it exists.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match fs::read_to_string(DEFAULT_SETTINGS_PATH) {
                Ok(s) => Self::from_toml(&s, Path::new(DEFAULT_SETTINGS_PATH)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
                Err(source) => Err(ConfigError::Io {
                    path: DEFAULT_SETTINGS_PATH.to_string(),
                    source,
                }),
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.marketplace;
        if m.batch_size == 0 || m.batch_size > MAX_BATCH_SIZE {
            return Err(ConfigError::Invalid(format!(
                "marketplace.batch_size must be between 1 and {}, got {}",
                MAX_BATCH_SIZE, m.batch_size
            )));
        }
        if m.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "marketplace.max_attempts must be at least 1".to_string(),
            ));
        }
        if m.host.is_empty() || m.marketplace.is_empty() {
            return Err(ConfigError::Invalid(
                "marketplace.host and marketplace.marketplace must be set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Secrets provided through the environment (optionally a `.env` file)
#[derive(Clone, Default, Deserialize)]
pub struct Credentials {
    pub pa_api_key: Option<String>,
    pub pa_api_secret: Option<String>,
    pub partner_tag: Option<String>,
    pub threads_account_id: Option<String>,
    pub threads_long_lived_token: Option<String>,
    pub threads_app_id: Option<String>,
    pub threads_app_secret: Option<String>,
    pub webhook_url: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn present(v: &Option<String>) -> &'static str {
            if v.as_deref().is_some_and(|s| !s.is_empty()) {
                "<redacted>"
            } else {
                "<unset>"
            }
        }
        f.debug_struct("Credentials")
            .field("pa_api_key", &present(&self.pa_api_key))
            .field("pa_api_secret", &present(&self.pa_api_secret))
            .field("partner_tag", &present(&self.partner_tag))
            .field("threads_account_id", &present(&self.threads_account_id))
            .field("threads_long_lived_token", &present(&self.threads_long_lived_token))
            .field("threads_app_id", &present(&self.threads_app_id))
            .field("threads_app_secret", &present(&self.threads_app_secret))
            .field("webhook_url", &present(&self.webhook_url))
            .finish()
    }
}

fn non_empty(v: &Option<String>) -> Option<String> {
    v.as_ref().filter(|s| !s.trim().is_empty()).cloned()
}

impl Credentials {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        envy::from_env::<Self>().map_err(|e| ConfigError::Invalid(format!("environment: {}", e)))
    }

    /// Marketplace credentials are required for every mode.
    pub fn marketplace(&self) -> Result<MarketplaceCredentials, ConfigError> {
        Ok(MarketplaceCredentials {
            access_key: non_empty(&self.pa_api_key).ok_or(ConfigError::MissingCredential("PA_API_KEY"))?,
            secret_key: non_empty(&self.pa_api_secret)
                .ok_or(ConfigError::MissingCredential("PA_API_SECRET"))?,
            partner_tag: non_empty(&self.partner_tag).ok_or(ConfigError::MissingCredential("PARTNER_TAG"))?,
        })
    }

    pub fn threads_account_id(&self) -> Option<String> {
        non_empty(&self.threads_account_id)
    }

    pub fn threads_long_lived_token(&self) -> Option<String> {
        non_empty(&self.threads_long_lived_token)
    }

    pub fn threads_app(&self) -> Option<(String, String)> {
        Some((non_empty(&self.threads_app_id)?, non_empty(&self.threads_app_secret)?))
    }

    pub fn webhook_url(&self) -> Option<String> {
        non_empty(&self.webhook_url)
    }
}

#[derive(Clone)]
pub struct MarketplaceCredentials {
    pub access_key: String,
    pub secret_key: String,
    pub partner_tag: String,
}

impl fmt::Debug for MarketplaceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarketplaceCredentials")
            .field("access_key", &"<redacted>")
            .field("secret_key", &"<redacted>")
            .field("partner_tag", &self.partner_tag)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.marketplace.batch_size, 10);
        assert_eq!(settings.dispatch.max_posts_per_run, 5);
        assert_eq!(settings.state_path, PathBuf::from("asin_results.json"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
state_path = "state/baseline.json"

[marketplace]
batch_size = 5
max_attempts = 4

[dispatch]
post_interval_ms = 0
"#
        )
        .unwrap();

        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.state_path, PathBuf::from("state/baseline.json"));
        assert_eq!(settings.catalog_path, PathBuf::from("tracking_asins.json"));
        assert_eq!(settings.marketplace.batch_size, 5);
        assert_eq!(settings.marketplace.max_attempts, 4);
        assert_eq!(settings.marketplace.region, "us-west-2");
        assert_eq!(settings.dispatch.post_interval_ms, 0);
        assert_eq!(settings.dispatch.max_posts_per_run, 5);
    }

    #[test]
    fn test_batch_size_is_bounded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[marketplace]\nbatch_size = 11").unwrap();
        assert!(matches!(
            Settings::from_file(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = Settings::load(Some(Path::new("/nonexistent/Tracker.toml")));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_marketplace_credentials_required() {
        let creds = Credentials {
            pa_api_key: Some("key".to_string()),
            pa_api_secret: Some("  ".to_string()),
            partner_tag: Some("tag-22".to_string()),
            ..Credentials::default()
        };
        assert!(matches!(
            creds.marketplace(),
            Err(ConfigError::MissingCredential("PA_API_SECRET"))
        ));
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let creds = Credentials {
            pa_api_key: Some("AKIASECRETVALUE".to_string()),
            webhook_url: Some("https://hooks.example.com/abc".to_string()),
            ..Credentials::default()
        };
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("AKIASECRETVALUE"));
        assert!(!debug.contains("hooks.example.com"));
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("<unset>"));
    }
}
