// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::store::TokenDigest;

/// How long an emailed reset or verification token stays usable.
pub const ONE_TIME_TOKEN_TTL_MINUTES: i64 = 15;

/// Hashes and checks account passwords. bcrypt is CPU bound, so both directions run on the
/// blocking pool.
#[derive(Clone, Copy, Debug)]
pub struct Credentials {
    cost: u32,
}

impl Credentials {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub async fn hash(&self, password: &str) -> anyhow::Result<String> {
        let password = password.to_owned();
        let cost = self.cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .context("Password hashing task failed")?
            .context("Failed to hash password")
    }

    /// A hash that is not valid bcrypt never matches.
    pub async fn verify(&self, password: &str, hash: &str) -> anyhow::Result<bool> {
        let password = password.to_owned();
        let hash = hash.to_owned();
        let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .context("Password verification task failed")?;

        Ok(verified.unwrap_or_else(|e| {
            warn!("Stored password hash is unusable: {e}");
            false
        }))
    }
}

/// A single-use secret handed to the user by email. Only `hash` is persisted.
#[derive(Clone, Debug)]
pub struct OneTimeToken {
    pub plaintext: String,
    pub hash: String,
    pub expires_at: DateTime<Utc>,
}

impl OneTimeToken {
    pub fn generate(now: DateTime<Utc>) -> Self {
        let mut bytes = [0u8; 20];
        rand::thread_rng().fill_bytes(&mut bytes);
        let plaintext = hex::encode(bytes);

        Self {
            hash: hash_token(&plaintext),
            plaintext,
            expires_at: now + Duration::minutes(ONE_TIME_TOKEN_TTL_MINUTES),
        }
    }

    /// What gets persisted for this token.
    pub fn digest(&self) -> TokenDigest {
        TokenDigest {
            hash: self.hash.clone(),
            expires_at: self.expires_at,
        }
    }
}

pub fn hash_token(plaintext: &str) -> String {
    hex::encode(Sha256::digest(plaintext.as_bytes()))
}
