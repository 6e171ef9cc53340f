// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

const GOOGLE_TOKEN_INFO: &str = "https://oauth2.googleapis.com/tokeninfo";

#[derive(thiserror::Error, Debug)]
pub enum OAuthError {
    #[error("Google credential was rejected: {0}")]
    Rejected(String),

    #[error("Google sign-in is not configured")]
    NotConfigured,

    #[error("Google token check failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// What the identity provider vouches for about the signed-in person.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
    pub email: String,
    pub email_verified: bool,
    pub given_name: String,
    pub family_name: String,
    pub picture: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    /// Check an ID token minted for this application and return who it identifies.
    async fn verify(&self, credential: &str) -> Result<Identity, OAuthError>;
}

/// Verifies Google ID tokens with Google's tokeninfo endpoint.
pub struct GoogleTokenInfo {
    client: reqwest::Client,
    endpoint: Url,
    client_id: Option<String>,
}

#[derive(Deserialize)]
struct TokenInfo {
    aud: String,
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<String>,
    #[serde(default)]
    given_name: Option<String>,
    #[serde(default)]
    family_name: Option<String>,
    picture: Option<String>,
}

impl GoogleTokenInfo {
    pub fn new(client_id: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            endpoint: Url::parse(GOOGLE_TOKEN_INFO)?,
            client_id,
        })
    }
}

#[async_trait]
impl IdentityProvider for GoogleTokenInfo {
    async fn verify(&self, credential: &str) -> Result<Identity, OAuthError> {
        let client_id = self.client_id.as_deref().ok_or(OAuthError::NotConfigured)?;

        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[("id_token", credential)])
            .send()
            .await?;
        if response.status().is_client_error() {
            return Err(OAuthError::Rejected(format!(
                "tokeninfo answered {}",
                response.status()
            )));
        }

        let info: TokenInfo = response.error_for_status()?.json().await?;
        if info.aud != client_id {
            return Err(OAuthError::Rejected("token was issued for another client".into()));
        }
        let email = info
            .email
            .ok_or_else(|| OAuthError::Rejected("token carries no email".into()))?;

        Ok(Identity {
            subject: info.sub,
            email,
            email_verified: info.email_verified.as_deref() == Some("true"),
            given_name: info.given_name.unwrap_or_default(),
            family_name: info.family_name.unwrap_or_default(),
            picture: info.picture,
        })
    }
}

/// Resolves a fixed set of credentials. Anything else is rejected.
#[derive(Default)]
pub struct FixedIdentities(HashMap<String, Identity>);

impl FixedIdentities {
    pub fn with(mut self, credential: &str, identity: Identity) -> Self {
        self.0.insert(credential.to_owned(), identity);
        self
    }
}

#[async_trait]
impl IdentityProvider for FixedIdentities {
    async fn verify(&self, credential: &str) -> Result<Identity, OAuthError> {
        self.0
            .get(credential)
            .cloned()
            .ok_or_else(|| OAuthError::Rejected("unknown credential".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_google_sign_in() {
        let google = GoogleTokenInfo::new(None, Duration::from_secs(1)).unwrap();
        assert!(matches!(
            google.verify("whatever").await,
            Err(OAuthError::NotConfigured)
        ));
    }

    #[test]
    fn token_info_parses_string_flags() {
        let info: TokenInfo = serde_json::from_str(
            r#"{"aud":"app","sub":"42","email":"a@b.co","email_verified":"true","exp":"1"}"#,
        )
        .unwrap();
        assert_eq!(info.email_verified.as_deref(), Some("true"));
        assert_eq!(info.given_name, None);
    }
}
