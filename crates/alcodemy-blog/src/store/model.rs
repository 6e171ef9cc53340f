// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(anyhow::anyhow!("Unknown role {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Avatar {
    pub public_id: String,
    pub secure_url: String,
}

/// An account. Deliberately not `Serialize`: responses go through the views in `types`, which
/// never carry the password or token hashes.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub avatar: Avatar,
    pub role: Role,
    pub is_blocked: bool,
    pub is_verified: bool,
    pub is_closed: bool,
    pub followers: i64,
    pub reset_token: Option<String>,
    pub reset_token_expiry: Option<DateTime<Utc>>,
    pub verify_token: Option<String>,
    pub verify_token_expiry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Neither blocked nor closed.
    pub fn is_active(&self) -> bool {
        !self.is_blocked && !self.is_closed
    }
}

/// The stored digest of a single-use token and when it stops being accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDigest {
    pub hash: String,
    pub expires_at: DateTime<Utc>,
}

/// The account columns one operation writes. Unset fields keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub avatar: Option<Avatar>,
    pub role: Option<Role>,
    pub is_blocked: Option<bool>,
    pub is_verified: Option<bool>,
    pub is_closed: Option<bool>,
    /// `Some(None)` clears the token.
    pub reset_token: Option<Option<TokenDigest>>,
    /// `Some(None)` clears the token.
    pub verify_token: Option<Option<TokenDigest>>,
}

impl UserPatch {
    pub fn blocked(blocked: bool) -> Self {
        Self {
            is_blocked: Some(blocked),
            ..Self::default()
        }
    }

    pub fn closed(closed: bool) -> Self {
        Self {
            is_closed: Some(closed),
            ..Self::default()
        }
    }

    pub fn reset_token(token: Option<TokenDigest>) -> Self {
        Self {
            reset_token: Some(token),
            ..Self::default()
        }
    }

    pub fn verify_token(token: Option<TokenDigest>) -> Self {
        Self {
            verify_token: Some(token),
            ..Self::default()
        }
    }

    pub(crate) fn apply(self, user: &mut User, now: DateTime<Utc>) {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }

        set(&mut user.username, self.username);
        set(&mut user.password_hash, self.password_hash);
        set(&mut user.first_name, self.first_name);
        set(&mut user.last_name, self.last_name);
        set(&mut user.bio, self.bio);
        set(&mut user.avatar, self.avatar);
        set(&mut user.role, self.role);
        set(&mut user.is_blocked, self.is_blocked);
        set(&mut user.is_verified, self.is_verified);
        set(&mut user.is_closed, self.is_closed);
        if let Some(token) = self.reset_token {
            user.reset_token_expiry = token.as_ref().map(|t| t.expires_at);
            user.reset_token = token.map(|t| t.hash);
        }
        if let Some(token) = self.verify_token {
            user.verify_token_expiry = token.as_ref().map(|t| t.expires_at);
            user.verify_token = token.map(|t| t.hash);
        }
        user.updated_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub resource_id: String,
    pub resource_url: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub content: serde_json::Value,
    pub author_id: Uuid,
    pub is_published: bool,
    pub tags: Vec<String>,
    pub seo_keywords: String,
    pub meta_description: String,
    pub image: Option<Image>,
    pub likes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The post columns one operation writes. Unset fields keep their stored value.
#[derive(Debug, Clone, Default)]
pub struct PostPatch {
    pub title: Option<String>,
    pub content: Option<serde_json::Value>,
    pub tags: Option<Vec<String>>,
    pub seo_keywords: Option<String>,
    pub meta_description: Option<String>,
    pub image: Option<Image>,
    pub is_published: Option<bool>,
}

impl PostPatch {
    pub fn published(published: bool) -> Self {
        Self {
            is_published: Some(published),
            ..Self::default()
        }
    }

    pub(crate) fn apply(self, post: &mut Post, now: DateTime<Utc>) {
        if let Some(title) = self.title {
            post.title = title;
        }
        if let Some(content) = self.content {
            post.content = content;
        }
        if let Some(tags) = self.tags {
            post.tags = tags;
        }
        if let Some(seo_keywords) = self.seo_keywords {
            post.seo_keywords = seo_keywords;
        }
        if let Some(meta_description) = self.meta_description {
            post.meta_description = meta_description;
        }
        if let Some(image) = self.image {
            post.image = Some(image);
        }
        if let Some(is_published) = self.is_published {
            post.is_published = is_published;
        }
        post.updated_at = now;
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub content: String,
    pub author_id: Uuid,
    pub blog_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A comment together with the names of the account that wrote it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: Comment,
    pub author_username: String,
    pub author_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Follow {
    pub id: Uuid,
    pub follower_id: Uuid,
    pub author_id: Uuid,
    pub blog_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Like {
    pub id: Uuid,
    pub user_id: Uuid,
    pub blog_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub blog_id: Option<Uuid>,
    pub resource_id: String,
    pub resource_url: String,
    pub created_at: DateTime<Utc>,
}

/// One row of an author's follower listing.
#[derive(Debug, Clone)]
pub struct FollowerEntry {
    pub follow: Follow,
    pub follower: User,
}

/// What a post deletion removed alongside the post row.
#[derive(Debug, Clone)]
pub struct PostCascade {
    pub post: Post,
    pub comments: u64,
    pub likes: u64,
    /// Object keys that still need to be removed from media storage.
    pub assets: Vec<String>,
}

/// What an account deletion removed alongside the user row.
#[derive(Debug, Clone)]
pub struct AccountCascade {
    pub user: User,
    pub posts: u64,
    pub assets: Vec<String>,
}
