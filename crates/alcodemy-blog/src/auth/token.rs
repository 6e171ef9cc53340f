// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{Role, User};

#[derive(thiserror::Error, Debug)]
pub enum TokenError {
    #[error("Session token has expired")]
    Expired,

    #[error("Session token is invalid: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),

    #[error("Failed to sign session token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// The claims carried by a session token. The status flags are a snapshot taken at issue time;
/// access decisions always use the live account record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
    pub is_blocked: bool,
    pub is_verified: bool,
    pub is_closed: bool,
    pub iat: i64,
    pub exp: i64,
}

/// Mints and verifies HS256 session tokens.
#[derive(Clone)]
pub struct Sessions {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl Sessions {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, user: &User) -> Result<String, TokenError> {
        self.issue_at(user, Utc::now())
    }

    pub fn issue_at(&self, user: &User, now: DateTime<Utc>) -> Result<String, TokenError> {
        let iat = now.timestamp();
        let claims = Claims {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
            is_blocked: user.is_blocked,
            is_verified: user.is_verified,
            is_closed: user.is_closed,
            iat,
            exp: iat + self.ttl.as_secs() as i64,
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(TokenError::Signing)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e),
            })
    }
}

impl fmt::Debug for Sessions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sessions").field("ttl", &self.ttl).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Avatar;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            username: "writer01".to_owned(),
            email: "writer01@example.com".to_owned(),
            password_hash: String::new(),
            first_name: "Ada".to_owned(),
            last_name: "Writer".to_owned(),
            bio: String::new(),
            avatar: Avatar {
                public_id: String::new(),
                secure_url: String::new(),
            },
            role: Role::Admin,
            is_blocked: false,
            is_verified: true,
            is_closed: false,
            followers: 0,
            reset_token: None,
            reset_token_expiry: None,
            verify_token: None,
            verify_token_expiry: None,
            created_at: now,
            updated_at: now,
        }
    }

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    #[test]
    fn issued_tokens_verify() {
        let sessions = Sessions::new(b"secret", 2 * DAY);
        let user = user();
        let token = sessions.issue(&user).unwrap();

        let claims = sessions.verify(&token).unwrap();
        assert_eq!(claims.id, user.id);
        assert_eq!(claims.role, Role::Admin);
        assert!(claims.is_verified);
        assert_eq!(claims.exp - claims.iat, 2 * 24 * 60 * 60);
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let sessions = Sessions::new(b"secret", DAY);
        let issued = Utc::now() - chrono::Duration::days(2);
        let token = sessions.issue_at(&user(), issued).unwrap();

        assert!(matches!(sessions.verify(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn foreign_or_mangled_tokens_are_rejected() {
        let ours = Sessions::new(b"secret", DAY);
        let theirs = Sessions::new(b"another secret", DAY);
        let token = theirs.issue(&user()).unwrap();

        assert!(matches!(ours.verify(&token), Err(TokenError::Invalid(_))));
        assert!(matches!(
            ours.verify("not.a.token"),
            Err(TokenError::Invalid(_))
        ));
    }
}
