// Configuration module: the settings that used to be edited at the top of
// a script now live in a JSON file that is loaded once at startup and then
// passed down explicitly to the client and the migration driver.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading or validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Credentials for the password grant against the blog's token endpoint.
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct AuthConfig {
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Options that shape each created post.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PostOptions {
    /// Tag id attached to every post, e.g. `5c4741605b294600015a2283`.
    #[serde(default)]
    pub tag_id: Option<String>,
    /// Custom theme template, e.g. `custom-template`.
    #[serde(default)]
    pub custom_template: Option<String>,
    /// Put the location and a map link into the post body.
    #[serde(default = "default_true")]
    pub add_location_to_post: bool,
    /// Use the caption as the post title.
    #[serde(default = "default_true")]
    pub set_caption_as_title: bool,
}

impl Default for PostOptions {
    fn default() -> Self {
        PostOptions {
            tag_id: None,
            custom_template: None,
            add_location_to_post: true,
            set_caption_as_title: true,
        }
    }
}

/// Whole-run configuration.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default = "default_blog_url")]
    pub blog_url: String,
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
    /// Defaults to `<export_dir>/media.json`.
    #[serde(default)]
    pub manifest: Option<PathBuf>,
    #[serde(default)]
    pub log_errors: bool,
    #[serde(flatten)]
    pub post: PostOptions,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Zero disables the timeout.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_client_id() -> String {
    "ghost-admin".into()
}

fn default_true() -> bool {
    true
}

fn default_blog_url() -> String {
    "http://localhost:2368".into()
}

fn default_api_prefix() -> String {
    "/ghost/api/v0.1".into()
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("./instagram/")
}

fn default_concurrency() -> usize {
    1
}

fn default_timeout_secs() -> u64 {
    60
}

impl Config {
    /// Build a config with defaults for everything but the credentials.
    pub fn new(auth: AuthConfig) -> Self {
        Config {
            auth,
            blog_url: default_blog_url(),
            api_prefix: default_api_prefix(),
            export_dir: default_export_dir(),
            manifest: None,
            log_errors: false,
            post: PostOptions::default(),
            concurrency: default_concurrency(),
            request_timeout_secs: default_timeout_secs(),
        }
    }

    /// Read and parse a JSON config file. Environment overrides are not
    /// applied here, see [`Config::apply_env`].
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Override settings from `GHOST_*` environment variables.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("GHOST_BLOG_URL") {
            self.blog_url = v;
        }
        if let Some(v) = lookup("GHOST_USERNAME") {
            self.auth.username = v;
        }
        if let Some(v) = lookup("GHOST_PASSWORD") {
            self.auth.password = v;
        }
        if let Some(v) = lookup("GHOST_CLIENT_ID") {
            self.auth.client_id = v;
        }
        if let Some(v) = lookup("GHOST_CLIENT_SECRET") {
            self.auth.client_secret = v;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.blog_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "blog_url must start with http:// or https://, got {:?}",
                self.blog_url
            )));
        }
        if self.auth.username.trim().is_empty() {
            return Err(ConfigError::Invalid("auth.username is empty".into()));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".into()));
        }
        Ok(())
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.manifest
            .clone()
            .unwrap_or_else(|| self.export_dir.join("media.json"))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        match self.request_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Where to look for the config file when none is given on the command
    /// line: `$INSTAGHOST_CONFIG`, then the user's config dir, then `./config.json`.
    pub fn default_path() -> PathBuf {
        if let Ok(p) = std::env::var("INSTAGHOST_CONFIG") {
            return PathBuf::from(p);
        }
        match dirs::config_dir() {
            Some(dir) if dir.join("instaghost").join("config.json").exists() => {
                dir.join("instaghost").join("config.json")
            }
            _ => PathBuf::from("config.json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg = Config::from_json(r#"{"auth": {"username": "me@example.com"}}"#).unwrap();
        assert_eq!(cfg.blog_url, "http://localhost:2368");
        assert_eq!(cfg.api_prefix, "/ghost/api/v0.1");
        assert_eq!(cfg.auth.client_id, "ghost-admin");
        assert!(cfg.post.add_location_to_post);
        assert!(cfg.post.set_caption_as_title);
        assert_eq!(cfg.post.tag_id, None);
        assert!(!cfg.log_errors);
        assert_eq!(cfg.concurrency, 1);
        assert_eq!(cfg.manifest_path(), PathBuf::from("./instagram/media.json"));
        assert_eq!(cfg.request_timeout(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn post_options_are_read_from_top_level() {
        let cfg = Config::from_json(
            r#"{
                "auth": {"username": "u", "password": "p", "client_secret": "s"},
                "tag_id": "5c4741605b294600015a2283",
                "custom_template": "custom-template",
                "set_caption_as_title": false,
                "manifest": "/tmp/export/media.json",
                "request_timeout_secs": 0
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.post.tag_id.as_deref(), Some("5c4741605b294600015a2283"));
        assert_eq!(cfg.post.custom_template.as_deref(), Some("custom-template"));
        assert!(!cfg.post.set_caption_as_title);
        assert_eq!(cfg.manifest_path(), PathBuf::from("/tmp/export/media.json"));
        assert_eq!(cfg.request_timeout(), None);
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let mut cfg = Config::new(AuthConfig {
            username: "file-user".into(),
            ..Default::default()
        });
        let env: HashMap<&str, &str> = [
            ("GHOST_PASSWORD", "from-env"),
            ("GHOST_BLOG_URL", "https://blog.example.com"),
        ]
        .into_iter()
        .collect();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.auth.username, "file-user");
        assert_eq!(cfg.auth.password, "from-env");
        assert_eq!(cfg.blog_url, "https://blog.example.com");
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut cfg = Config::new(AuthConfig {
            username: "u".into(),
            ..Default::default()
        });
        assert!(cfg.validate().is_ok());

        cfg.concurrency = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));

        cfg.concurrency = 2;
        cfg.blog_url = "localhost:2368".into();
        assert!(cfg.validate().is_err());

        cfg.blog_url = "http://localhost:2368".into();
        cfg.auth.username = " ".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn debug_output_hides_secrets() {
        let auth = AuthConfig {
            username: "u".into(),
            password: "hunter2".into(),
            client_id: "ghost-admin".into(),
            client_secret: "s3cret".into(),
        };
        let out = format!("{:?}", auth);
        assert!(!out.contains("hunter2"));
        assert!(!out.contains("s3cret"));
    }
}
