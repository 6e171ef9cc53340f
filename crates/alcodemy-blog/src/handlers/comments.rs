// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use axum::extract::State;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::{ActiveUser, VerifiedUser};
use crate::error::{ApiError, Result};
use crate::extract::{Json, Path};
use crate::store::{Comment, User};
use crate::types::{EditCommentRequest, NewCommentRequest, NoData, Reply};
use crate::BlogService;

#[derive(Serialize)]
pub(super) struct CommentData {
    comment: Comment,
}

/// Loads a comment written by `caller`.
async fn own_comment(state: &BlogService, caller: &User, id: Uuid, denied: &str) -> Result<Comment> {
    let comment = state
        .store
        .comment(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;
    if comment.author_id != caller.id {
        return Err(ApiError::forbidden(denied));
    }
    Ok(comment)
}

pub(super) async fn create(
    State(state): State<BlogService>,
    VerifiedUser(author): VerifiedUser,
    Json(body): Json<NewCommentRequest>,
) -> Result<Reply<CommentData>> {
    let content = body.comment.trim();
    let Some(blog_id) = body.blog_id.filter(|_| !content.is_empty()) else {
        return Err(ApiError::validation("Comment and BlogId is required"));
    };
    let published = state.store.post(blog_id).await?.is_some_and(|p| p.is_published);
    if !published {
        return Err(ApiError::not_found("BlogId is invalid"));
    }

    let now = Utc::now();
    let comment = state
        .store
        .insert_comment(Comment {
            id: Uuid::new_v4(),
            content: content.to_owned(),
            author_id: author.id,
            blog_id,
            created_at: now,
            updated_at: now,
        })
        .await?;

    Ok(Reply::created("Commented Successfully", CommentData { comment }))
}

pub(super) async fn edit(
    State(state): State<BlogService>,
    ActiveUser(caller): ActiveUser,
    Path(id): Path<Uuid>,
    Json(body): Json<EditCommentRequest>,
) -> Result<Reply<CommentData>> {
    let content = body.comment.trim();
    if content.is_empty() {
        return Err(ApiError::validation("Comment is missing"));
    }

    let mut comment = own_comment(&state, &caller, id, "Not Authorized").await?;
    comment.content = content.to_owned();
    let comment = state.store.update_comment(&comment).await?;

    Ok(Reply::ok("Comment Updated", CommentData { comment }))
}

pub(super) async fn remove(
    State(state): State<BlogService>,
    ActiveUser(caller): ActiveUser,
    Path(id): Path<Uuid>,
) -> Result<Reply<NoData>> {
    own_comment(
        &state,
        &caller,
        id,
        "You are not authorized to delete this comment",
    )
    .await?;
    state.store.delete_comment(id).await?;

    Ok(Reply::message("Comment deleted successfully"))
}
