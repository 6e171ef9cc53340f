// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::debug;
use url::Url;

#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BlogConfig {
    pub listen_address: SocketAddr,
    pub metrics_address: SocketAddr,
    /// Origin of the single-page frontend. Used for CORS and for the links sent by email.
    pub frontend_url: Url,
    /// Mark the session cookie `Secure`.
    #[serde(default)]
    pub secure_cookies: bool,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_token_ttl")]
    pub token_ttl: Duration,
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
    /// Where multipart uploads are spooled before they reach media storage.
    #[serde(default = "std::env::temp_dir")]
    pub upload_dir: PathBuf,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default = "default_avatar_url")]
    pub default_avatar_url: String,
    #[serde(default)]
    pub media: MediaConfig,
    pub mail: Option<MailConfig>,
    pub summary: Option<SummaryConfig>,
    /// OAuth client id that Google ID tokens must be issued for.
    pub google_client_id: Option<String>,
    pub support_email: String,
    /// Upper bound on any single call to media storage, mail, AI or OAuth services.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_external_timeout")]
    pub external_timeout: Duration,
    #[serde(default)]
    pub rate_limits: RateLimitConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct MediaConfig {
    #[serde(default)]
    pub backend: MediaBackend,
    /// Objects are served from `<public-url>/<key>`.
    pub public_url: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum MediaBackend {
    #[default]
    Memory,
    Local {
        root: PathBuf,
    },
    S3 {
        bucket: String,
        region: String,
        endpoint: Option<String>,
    },
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct MailConfig {
    /// HTTP endpoint of the transactional mail service.
    pub endpoint: Url,
    pub from: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SummaryConfig {
    /// Base URL of the generative-language API.
    pub endpoint: Url,
    pub model: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RateLimitConfig {
    pub enabled: bool,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            backend: MediaBackend::Memory,
            public_url: "http://localhost:8080/media".to_owned(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl BlogConfig {
    /// A configuration suitable for tests: in-memory media, no mail or AI endpoints, cheap
    /// password hashing.
    pub fn for_testing() -> Self {
        Self {
            listen_address: SocketAddr::from(([127, 0, 0, 1], 0)),
            metrics_address: SocketAddr::from(([127, 0, 0, 1], 0)),
            frontend_url: Url::parse("http://localhost:5173").expect("static url"),
            secure_cookies: false,
            token_ttl: default_token_ttl(),
            bcrypt_cost: 4,
            upload_dir: std::env::temp_dir(),
            max_upload_bytes: default_max_upload_bytes(),
            default_avatar_url: default_avatar_url(),
            media: MediaConfig::default(),
            mail: None,
            summary: None,
            google_client_id: Some("test-client-id".to_owned()),
            support_email: "support@example.com".to_owned(),
            external_timeout: default_external_timeout(),
            rate_limits: RateLimitConfig { enabled: false },
        }
    }

    fn validate(&self) -> Result<()> {
        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(anyhow!(
                "bcrypt-cost must be between 4 and 31, got {}",
                self.bcrypt_cost
            ));
        }
        if self.token_ttl.is_zero() {
            return Err(anyhow!("token-ttl must be positive"));
        }
        if self.frontend_url.host_str().is_none() {
            return Err(anyhow!(
                "URL '{}' does not contain a valid host",
                self.frontend_url
            ));
        }
        Ok(())
    }
}

fn default_token_ttl() -> Duration {
    Duration::from_secs(2 * 24 * 60 * 60)
}

fn default_bcrypt_cost() -> u32 {
    10
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_avatar_url() -> String {
    "https://res.cloudinary.com/dkqfd5xzc/image/upload/v1/default-avatar.png".to_owned()
}

fn default_external_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Load and validate configuration
pub fn load<P: AsRef<Path>>(path: P) -> Result<BlogConfig> {
    let path = path.as_ref();
    debug!("Reading config from {:?}", path);
    let config: BlogConfig = serde_yaml::from_reader(
        std::fs::File::open(path).context(format!("cannot open {:?}", path))?,
    )?;

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TEMPLATE: &str = include_str!("./data/config.yaml");

    #[test]
    fn config_load() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TEMPLATE.as_bytes()).unwrap();

        let config = load(file.path()).unwrap();
        assert_eq!(config.token_ttl, Duration::from_secs(172_800));
        assert_eq!(config.bcrypt_cost, 10);
        assert!(config.rate_limits.enabled);
        assert!(matches!(
            config.media.backend,
            MediaBackend::S3 { ref bucket, .. } if bucket == "alcodemy-media"
        ));
    }

    #[test]
    fn defaults_fill_optional_fields() {
        let config: BlogConfig = serde_yaml::from_str(
            "listen-address: 0.0.0.0:8080\n\
             metrics-address: 0.0.0.0:9184\n\
             frontend-url: http://localhost:5173\n\
             support-email: support@example.com\n",
        )
        .unwrap();

        assert!(!config.secure_cookies);
        assert_eq!(config.external_timeout, Duration::from_secs(10));
        assert!(matches!(config.media.backend, MediaBackend::Memory));
        assert!(config.mail.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn rejects_out_of_range_cost() {
        let mut config = BlogConfig::for_testing();
        config.bcrypt_cost = 2;
        assert!(config.validate().is_err());
    }
}
