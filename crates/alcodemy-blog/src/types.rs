// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Request bodies and response views. Responses share the `{success: true, message, ...}` shape.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::store::{Avatar, CommentThread, FollowerEntry, Post, Role, User};

/// A successful response: `{success: true, message, ...data}`.
pub struct Reply<T> {
    status: StatusCode,
    message: String,
    data: T,
}

#[derive(Serialize)]
struct Envelope<'a, T> {
    success: bool,
    message: &'a str,
    #[serde(flatten)]
    data: &'a T,
}

#[derive(Serialize)]
pub struct NoData {}

impl Reply<NoData> {
    pub fn message(message: impl Into<String>) -> Self {
        Self::ok(message, NoData {})
    }
}

impl<T: Serialize> Reply<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::OK,
            message: message.into(),
            data,
        }
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            message: message.into(),
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for Reply<T> {
    fn into_response(self) -> Response {
        let body = Envelope {
            success: true,
            message: &self.message,
            data: &self.data,
        };
        (self.status, Json(body)).into_response()
    }
}

/// An account as its owner, an admin, or another member sees it. Hashes and tokens are never
/// part of it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub avatar: Avatar,
    pub role: Role,
    pub is_blocked: bool,
    pub is_verified: bool,
    pub is_closed: bool,
    pub followers: i64,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            bio: user.bio.clone(),
            avatar: user.avatar.clone(),
            role: user.role,
            is_blocked: user.is_blocked,
            is_verified: user.is_verified,
            is_closed: user.is_closed,
            followers: user.followers,
            created_at: user.created_at,
        }
    }
}

/// The public face of an author, shown next to their posts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSummary {
    pub id: Uuid,
    pub username: String,
    pub full_name: String,
    pub bio: String,
    pub avatar: Avatar,
    pub followers: i64,
}

impl From<&User> for AuthorSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            full_name: user.full_name(),
            bio: user.bio.clone(),
            avatar: user.avatar.clone(),
            followers: user.followers,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDetail {
    #[serde(flatten)]
    pub post: Post,
    pub author: AuthorSummary,
    pub comments: Vec<CommentThread>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowerView {
    pub follow_id: Uuid,
    pub followed_at: DateTime<Utc>,
    pub follower: AuthorSummary,
}

impl From<&FollowerEntry> for FollowerView {
    fn from(entry: &FollowerEntry) -> Self {
        Self {
            follow_id: entry.follow.id,
            followed_at: entry.follow.created_at,
            follower: AuthorSummary::from(&entry.follower),
        }
    }
}

/// Splits a `limit + 1` fetch into the page and whether there is more.
pub fn paginate<T>(mut rows: Vec<T>, limit: usize) -> (Vec<T>, bool) {
    let has_more = rows.len() > limit;
    rows.truncate(limit);
    (rows, has_more)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordRequest {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct UsernameRequest {
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GoogleAuthRequest {
    #[serde(default)]
    pub credential: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "de::content")]
    pub content: Option<Value>,
    #[serde(default, deserialize_with = "de::tags")]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub seo_keywords: String,
    #[serde(default)]
    pub meta_description: String,
    #[serde(default, deserialize_with = "de::flag")]
    pub is_published: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "de::content")]
    pub content: Option<Value>,
    #[serde(default, deserialize_with = "de::tags")]
    pub tags: Option<Vec<String>>,
    pub seo_keywords: Option<String>,
    pub meta_description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default)]
    pub tagsearch: String,
    #[serde(default)]
    pub skip: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCommentRequest {
    pub blog_id: Option<Uuid>,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub struct EditCommentRequest {
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowRequest {
    pub author_id: Option<Uuid>,
    #[serde(default, deserialize_with = "de::optional_id")]
    pub blog_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequest {
    #[serde(default, deserialize_with = "de::optional_id")]
    pub blog_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ContactRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowersQuery {
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub skip: i64,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub skip: i64,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
}

/// Lenient deserializers for fields that arrive either as JSON values or, from multipart forms,
/// as strings.
mod de {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;
    use uuid::Uuid;

    pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        match Value::deserialize(d)? {
            Value::Null => Ok(None),
            Value::Bool(b) => Ok(Some(b)),
            Value::String(s) => match s.trim() {
                "" => Ok(None),
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                other => Err(D::Error::custom(format!("invalid flag {other:?}"))),
            },
            other => Err(D::Error::custom(format!("invalid flag {other}"))),
        }
    }

    pub fn tags<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<String>>, D::Error> {
        let value = match Value::deserialize(d)? {
            Value::Null => return Ok(None),
            Value::String(s) => serde_json::from_str(&s)
                .map_err(|_| D::Error::custom("Tags must be a JSON array of strings"))?,
            other => other,
        };
        serde_json::from_value(value)
            .map(Some)
            .map_err(|_| D::Error::custom("Tags must be a JSON array of strings"))
    }

    /// Rich content sent as a string is parsed as JSON when it is JSON, and kept as text
    /// otherwise.
    pub fn content<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Value>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Null => None,
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(serde_json::from_str(&s).unwrap_or(Value::String(s))),
            other => Some(other),
        })
    }

    pub fn optional_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Uuid>, D::Error> {
        match Option::<String>::deserialize(d)?.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => s.parse().map(Some).map_err(D::Error::custom),
        }
    }
}
