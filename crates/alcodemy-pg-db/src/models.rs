// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::{blogs, comments, follows, likes, resources, users};

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = users)]
pub struct StoredUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub avatar_public_id: String,
    pub avatar_url: String,
    pub role: String,
    pub is_blocked: bool,
    pub is_verified: bool,
    pub is_closed: bool,
    /// Maintained by the follow/unfollow transactions only.
    pub followers: i64,
    pub reset_token: Option<String>,
    pub reset_token_expiry: Option<DateTime<Utc>>,
    pub verify_token: Option<String>,
    pub verify_token_expiry: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A targeted update of `users`. `None` leaves a column as it is; `Some(None)` on a token
/// column writes NULL. The `followers` counter is not part of it.
#[derive(AsChangeset, Debug, Clone)]
#[diesel(table_name = users)]
pub struct UserChanges {
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_public_id: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Option<String>,
    pub is_blocked: Option<bool>,
    pub is_verified: Option<bool>,
    pub is_closed: Option<bool>,
    pub reset_token: Option<Option<String>>,
    pub reset_token_expiry: Option<Option<DateTime<Utc>>>,
    pub verify_token: Option<Option<String>>,
    pub verify_token_expiry: Option<Option<DateTime<Utc>>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = blogs)]
pub struct StoredBlog {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    /// Rich editor document, stored verbatim.
    pub content: serde_json::Value,
    pub author_id: Uuid,
    pub is_published: bool,
    pub tags: Vec<String>,
    pub seo_keywords: String,
    pub meta_description: String,
    pub image_resource_id: Option<String>,
    pub image_url: Option<String>,
    /// Maintained by the like/unlike transactions only.
    pub likes: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A targeted update of `blogs`. `None` leaves a column as it is. The `likes` counter is not
/// part of it.
#[derive(AsChangeset, Debug, Clone)]
#[diesel(table_name = blogs)]
pub struct BlogChanges {
    pub title: Option<String>,
    pub content: Option<serde_json::Value>,
    pub is_published: Option<bool>,
    pub tags: Option<Vec<String>>,
    pub seo_keywords: Option<String>,
    pub meta_description: Option<String>,
    pub image_resource_id: Option<String>,
    pub image_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = comments)]
pub struct StoredComment {
    pub id: Uuid,
    pub content: String,
    pub author_id: Uuid,
    pub blog_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = follows)]
pub struct StoredFollow {
    pub id: Uuid,
    pub follower_id: Uuid,
    pub author_id: Uuid,
    pub blog_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = likes)]
pub struct StoredLike {
    pub id: Uuid,
    pub user_id: Uuid,
    pub blog_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = resources)]
pub struct StoredResource {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub blog_id: Option<Uuid>,
    pub resource_id: String,
    pub resource_url: String,
    pub created_at: DateTime<Utc>,
}
