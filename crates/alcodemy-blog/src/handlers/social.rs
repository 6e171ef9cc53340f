// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Follows between accounts and likes on posts. The store applies each relation change together
//! with its counter; these handlers decide whether the change is allowed.

use axum::extract::State;
use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::page_size;
use crate::auth::{ActiveUser, Session};
use crate::error::{ApiError, Result, UNAUTHORIZED};
use crate::extract::{Json, Path, Query};
use crate::store::{Follow, Like, Post, DUPLICATE_FOLLOW, DUPLICATE_LIKE};
use crate::types::{paginate, FollowRequest, FollowerView, FollowersQuery, NoData, Reply};
use crate::BlogService;

#[derive(Serialize)]
pub(super) struct FollowData {
    follow: Follow,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct FollowerPage {
    followers: Vec<FollowerView>,
    total_followers: i64,
    has_more: bool,
}

#[derive(Serialize)]
pub(super) struct Likes {
    likes: i64,
}

#[derive(Serialize)]
pub(super) struct LikeStatus {
    liked: bool,
    likes: i64,
}

async fn published_post(state: &BlogService, id: Uuid) -> Result<Post> {
    state
        .store
        .post(id)
        .await?
        .filter(|post| post.is_published)
        .ok_or_else(|| ApiError::not_found("Post not found"))
}

pub(super) async fn follow(
    State(state): State<BlogService>,
    ActiveUser(follower): ActiveUser,
    Json(body): Json<FollowRequest>,
) -> Result<Reply<FollowData>> {
    let author_id = body
        .author_id
        .ok_or_else(|| ApiError::validation("Author id is required"))?;
    if author_id == follower.id {
        return Err(ApiError::validation("You can not follow yourself"));
    }

    let author = state
        .store
        .user(author_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Author not found"))?;
    if !author.is_active() {
        return Err(ApiError::forbidden("This author is not available"));
    }
    if state
        .store
        .follow_between(follower.id, author_id)
        .await?
        .is_some()
    {
        return Err(ApiError::conflict(DUPLICATE_FOLLOW));
    }
    if let Some(blog_id) = body.blog_id {
        if state.store.post(blog_id).await?.is_none() {
            return Err(ApiError::not_found("Post not found"));
        }
    }

    let follow = state
        .store
        .follow(Follow {
            id: Uuid::new_v4(),
            follower_id: follower.id,
            author_id,
            blog_id: body.blog_id,
            created_at: Utc::now(),
        })
        .await?;

    info!(follower_id = %follower.id, author_id = %author_id, "Followed author");
    Ok(Reply::ok("Author followed successfully", FollowData { follow }))
}

pub(super) async fn unfollow(
    State(state): State<BlogService>,
    Session(caller): Session,
    Path(id): Path<Uuid>,
) -> Result<Reply<NoData>> {
    let follow = state
        .store
        .follow_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Follow relation not found"))?;
    if follow.follower_id != caller.id {
        return Err(ApiError::unauthenticated(UNAUTHORIZED));
    }

    state.store.unfollow(id).await?;
    info!(follower_id = %caller.id, author_id = %follow.author_id, "Unfollowed author");
    Ok(Reply::message("Author unfollowed successfully"))
}

pub(super) async fn followers(
    State(state): State<BlogService>,
    _: Session,
    Query(query): Query<FollowersQuery>,
) -> Result<Reply<FollowerPage>> {
    let user_id = query
        .user_id
        .ok_or_else(|| ApiError::validation("userId is required"))?;
    let author = state
        .store
        .user(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let limit = page_size(query.limit);
    let rows = state
        .store
        .followers(author.id, query.skip.max(0), limit + 1)
        .await?;
    let (rows, has_more) = paginate(rows, limit as usize);

    Ok(Reply::ok(
        "Followers fetched successfully",
        FollowerPage {
            followers: rows.iter().map(FollowerView::from).collect(),
            total_followers: author.followers,
            has_more,
        },
    ))
}

pub(super) async fn like(
    State(state): State<BlogService>,
    ActiveUser(user): ActiveUser,
    Path(post_id): Path<Uuid>,
) -> Result<Reply<Likes>> {
    published_post(&state, post_id).await?;
    if state.store.has_liked(user.id, post_id).await? {
        return Err(ApiError::conflict(DUPLICATE_LIKE));
    }

    let likes = state
        .store
        .like(Like {
            id: Uuid::new_v4(),
            user_id: user.id,
            blog_id: post_id,
            created_at: Utc::now(),
        })
        .await?;
    Ok(Reply::ok("Post liked successfully", Likes { likes }))
}

pub(super) async fn unlike(
    State(state): State<BlogService>,
    ActiveUser(user): ActiveUser,
    Path(post_id): Path<Uuid>,
) -> Result<Reply<Likes>> {
    let likes = state.store.unlike(user.id, post_id).await?;
    Ok(Reply::ok("Post unliked successfully", Likes { likes }))
}

pub(super) async fn like_status(
    State(state): State<BlogService>,
    Session(user): Session,
    Path(post_id): Path<Uuid>,
) -> Result<Reply<LikeStatus>> {
    let post = published_post(&state, post_id).await?;
    let liked = state.store.has_liked(user.id, post_id).await?;
    Ok(Reply::ok(
        "Like status fetched successfully",
        LikeStatus {
            liked,
            likes: post.likes,
        },
    ))
}
