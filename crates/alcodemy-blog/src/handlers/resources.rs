// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use axum::extract::State;
use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::gate::ensure_author_or_admin;
use crate::auth::{ActiveUser, Session};
use crate::error::{ApiError, Result};
use crate::extract::{Path, Payload};
use crate::store::Resource;
use crate::types::{NoData, Reply, ResourceRequest};
use crate::BlogService;

const RESOURCE_FOLDER: &str = "blog/resource";

#[derive(Serialize)]
pub(super) struct ResourceData {
    #[serde(flatten)]
    resource: Resource,
}

pub(super) async fn upload(
    State(state): State<BlogService>,
    ActiveUser(owner): ActiveUser,
    Payload { body, file }: Payload<ResourceRequest>,
) -> Result<Reply<ResourceData>> {
    let file = file.ok_or_else(|| ApiError::validation("No file uploaded"))?;
    if let Some(blog_id) = body.blog_id {
        let post = state
            .store
            .post(blog_id)
            .await?
            .ok_or_else(|| ApiError::not_found("Post not found"))?;
        ensure_author_or_admin(&owner, post.author_id)?;
    }

    let folder = format!("{RESOURCE_FOLDER}/{}", owner.username);
    let stored = state.media.upload(&folder, &file).await?;

    let resource = Resource {
        id: Uuid::new_v4(),
        owner_id: owner.id,
        blog_id: body.blog_id,
        resource_id: stored.resource_id,
        resource_url: stored.resource_url,
        created_at: Utc::now(),
    };
    let resource = match state.store.insert_resource(resource.clone()).await {
        Ok(resource) => resource,
        Err(e) => {
            state.media.delete_all(&[resource.resource_id]).await;
            return Err(e.into());
        }
    };

    info!(resource_id = %resource.id, owner_id = %owner.id, "Uploaded resource");
    Ok(Reply::created(
        "File Uploaded successfully",
        ResourceData { resource },
    ))
}

pub(super) async fn remove(
    State(state): State<BlogService>,
    Session(caller): Session,
    Path(id): Path<Uuid>,
) -> Result<Reply<NoData>> {
    let resource = state
        .store
        .resource(id)
        .await?
        .filter(|resource| resource.owner_id == caller.id)
        .ok_or_else(|| ApiError::not_found("No resource found"))?;

    state
        .media
        .delete(&resource.resource_id)
        .await
        .map_err(|e| ApiError::upstream("File could not be deleted, please try again", e))?;
    state.store.delete_resource(resource.id).await?;

    info!(resource_id = %resource.id, owner_id = %caller.id, "Deleted resource");
    Ok(Reply::message("File deleted successfully"))
}
