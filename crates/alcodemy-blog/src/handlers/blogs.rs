// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use axum::extract::State;
use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::ensure_image;
use crate::auth::gate::ensure_author_or_admin;
use crate::auth::{ActiveUser, VerifiedUser};
use crate::error::{ApiError, Result};
use crate::extract::{Json, Path, Payload};
use crate::store::{Image, Post, PostPatch, User};
use crate::types::{
    paginate, AuthorSummary, CreatePostRequest, PostDetail, Reply, SearchRequest,
    UpdatePostRequest,
};
use crate::BlogService;

const MAX_TAGS: usize = 10;
const MAX_TAG_CHARS: usize = 40;
const TRENDING: i64 = 6;
const POPULAR_AUTHORS: i64 = 20;
const POPULAR_AUTHOR_POSTS: i64 = 20;
const SEARCH_PAGE: i64 = 10;
const IMAGE_FOLDER: &str = "blog/post";

const POST_NOT_FOUND: &str = "Post not found";

#[derive(Serialize)]
pub(super) struct PostData {
    post: Post,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct Feed {
    trending_posts: Vec<Post>,
    popular_author_posts: Vec<Post>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SearchResults {
    posts: Vec<Post>,
    has_more: bool,
}

#[derive(Serialize)]
pub(super) struct SummaryData {
    summary: String,
    generated: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct Removed {
    comments: u64,
    likes: u64,
    orphaned_assets: Vec<String>,
}

/// Trims tags and checks the limits on their number and length.
fn clean_tags(tags: Vec<String>) -> Result<Vec<String>> {
    if tags.len() > MAX_TAGS {
        return Err(ApiError::validation(format!(
            "A post can have at most {MAX_TAGS} tags"
        )));
    }
    tags.into_iter()
        .map(|tag| {
            let tag = tag.trim().to_owned();
            if tag.is_empty() || tag.chars().count() > MAX_TAG_CHARS {
                return Err(ApiError::validation(format!(
                    "Tags must be between 1 and {MAX_TAG_CHARS} characters"
                )));
            }
            Ok(tag)
        })
        .collect()
}

/// The title reduced to lowercase words joined by dashes, suffixed with part of the post id.
fn slug(title: &str, id: Uuid) -> String {
    let mut slug = String::with_capacity(title.len() + 9);
    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    if !slug.is_empty() && !slug.ends_with('-') {
        slug.push('-');
    }
    slug.push_str(&id.simple().to_string()[..8]);
    slug
}

/// Loads a post the caller may modify.
async fn owned_post(state: &BlogService, caller: &User, id: Uuid) -> Result<Post> {
    let post = state
        .store
        .post(id)
        .await?
        .ok_or_else(|| ApiError::not_found(POST_NOT_FOUND))?;
    ensure_author_or_admin(caller, post.author_id)?;
    Ok(post)
}

pub(super) async fn create(
    State(state): State<BlogService>,
    VerifiedUser(author): VerifiedUser,
    Payload { body, file }: Payload<CreatePostRequest>,
) -> Result<Reply<PostData>> {
    let title = body.title.trim().to_owned();
    let seo_keywords = body.seo_keywords.trim().to_owned();
    let meta_description = body.meta_description.trim().to_owned();
    let (Some(content), Some(tags)) = (body.content, body.tags) else {
        return Err(ApiError::validation("All fields are mandatory"));
    };
    if title.is_empty() || seo_keywords.is_empty() || meta_description.is_empty() {
        return Err(ApiError::validation("All fields are mandatory"));
    }
    let tags = clean_tags(tags)?;
    ensure_image(file.as_ref())?;

    let image = match &file {
        Some(file) => Some(state.media.upload(IMAGE_FOLDER, file).await?),
        None => None,
    };

    let id = Uuid::new_v4();
    let now = Utc::now();
    let post = Post {
        id,
        slug: slug(&title, id),
        title,
        content,
        author_id: author.id,
        is_published: body.is_published.unwrap_or(false),
        tags,
        seo_keywords,
        meta_description,
        image,
        likes: 0,
        created_at: now,
        updated_at: now,
    };

    let post = match state.store.insert_post(post.clone()).await {
        Ok(post) => post,
        Err(e) => {
            if let Some(image) = post.image {
                state.media.delete_all(&[image.resource_id]).await;
            }
            return Err(e.into());
        }
    };

    info!(post_id = %post.id, author_id = %author.id, "Created post");
    Ok(Reply::created(
        "Blog Post Created successfully",
        PostData { post },
    ))
}

pub(super) async fn feed(State(state): State<BlogService>) -> Result<Reply<Feed>> {
    let trending_posts = state.store.trending_posts(TRENDING).await?;

    let authors: Vec<Uuid> = state
        .store
        .popular_authors(POPULAR_AUTHORS)
        .await?
        .iter()
        .map(|author| author.id)
        .collect();
    let popular_author_posts = state
        .store
        .published_posts_by_authors(&authors, POPULAR_AUTHOR_POSTS)
        .await?;

    Ok(Reply::ok(
        "Posts fetched successfully",
        Feed {
            trending_posts,
            popular_author_posts,
        },
    ))
}

pub(super) async fn search(
    State(state): State<BlogService>,
    Json(body): Json<SearchRequest>,
) -> Result<Reply<SearchResults>> {
    let query = body.tagsearch.trim();
    if query.is_empty() {
        return Err(ApiError::validation("Tag is required to search post"));
    }

    let rows = state
        .store
        .search_posts(query, body.skip.max(0), SEARCH_PAGE + 1)
        .await?;
    if rows.is_empty() {
        return Err(ApiError::not_found("Post not found with related search"));
    }
    let (posts, has_more) = paginate(rows, SEARCH_PAGE as usize);

    Ok(Reply::ok(
        "Searched posts fetched successfully",
        SearchResults { posts, has_more },
    ))
}

pub(super) async fn read(
    State(state): State<BlogService>,
    Path(id): Path<Uuid>,
) -> Result<Reply<PostDetail>> {
    let post = state
        .store
        .post(id)
        .await?
        .filter(|post| post.is_published)
        .ok_or_else(|| ApiError::not_found(POST_NOT_FOUND))?;
    let author = state
        .store
        .user(post.author_id)
        .await?
        .filter(|author| author.is_active())
        .ok_or_else(|| ApiError::not_found(POST_NOT_FOUND))?;
    let comments = state.store.comments_for_post(post.id).await?;

    Ok(Reply::ok(
        "Post fetched successfully",
        PostDetail {
            post,
            author: AuthorSummary::from(&author),
            comments,
        },
    ))
}

pub(super) async fn summary(
    State(state): State<BlogService>,
    Path(id): Path<Uuid>,
) -> Result<Reply<SummaryData>> {
    let post = state
        .store
        .post(id)
        .await?
        .filter(|post| post.is_published)
        .ok_or_else(|| ApiError::not_found("Blog post not found"))?;

    let summary = state.summarizer.summarize(&post).await;
    let message = if summary.generated {
        "Summary generated successfully"
    } else {
        "AI service unavailable, showing a basic summary"
    };
    Ok(Reply::ok(
        message,
        SummaryData {
            summary: summary.text,
            generated: summary.generated,
        },
    ))
}

pub(super) async fn update(
    State(state): State<BlogService>,
    ActiveUser(caller): ActiveUser,
    Path(id): Path<Uuid>,
    Payload { body, file }: Payload<UpdatePostRequest>,
) -> Result<Reply<PostData>> {
    let post = owned_post(&state, &caller, id).await?;

    let UpdatePostRequest {
        title,
        content,
        tags,
        seo_keywords,
        meta_description,
    } = body;
    let title = title.map(|t| t.trim().to_owned()).filter(|t| !t.is_empty());
    let seo_keywords = seo_keywords
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty());
    let meta_description = meta_description
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty());

    if title.is_none()
        && content.is_none()
        && tags.is_none()
        && seo_keywords.is_none()
        && meta_description.is_none()
        && file.is_none()
    {
        return Err(ApiError::validation(
            "At least one field is required for update.",
        ));
    }
    let tags = tags.map(clean_tags).transpose()?;
    ensure_image(file.as_ref())?;

    let mut patch = PostPatch {
        title,
        content,
        tags,
        seo_keywords,
        meta_description,
        ..PostPatch::default()
    };

    let mut replaced: Option<Image> = None;
    let mut uploaded: Option<String> = None;
    if let Some(file) = &file {
        let image = state.media.upload(IMAGE_FOLDER, file).await?;
        uploaded = Some(image.resource_id.clone());
        replaced = post.image.clone();
        patch.image = Some(image);
    }

    let updated = match state.store.update_post(post.id, patch).await {
        Ok(updated) => updated,
        Err(e) => {
            if let Some(key) = uploaded {
                state.media.delete_all(&[key]).await;
            }
            return Err(e.into());
        }
    };
    if let Some(old) = replaced {
        state.media.delete_all(&[old.resource_id]).await;
    }

    info!(post_id = %updated.id, editor_id = %caller.id, "Updated post");
    Ok(Reply::ok(
        "Post updated successfully",
        PostData { post: updated },
    ))
}

async fn set_published(
    state: &BlogService,
    caller: &User,
    id: Uuid,
    published: bool,
) -> Result<Post> {
    let post = owned_post(state, caller, id).await?;
    Ok(state
        .store
        .update_post(post.id, PostPatch::published(published))
        .await?)
}

pub(super) async fn publish(
    State(state): State<BlogService>,
    ActiveUser(caller): ActiveUser,
    Path(id): Path<Uuid>,
) -> Result<Reply<PostData>> {
    let post = set_published(&state, &caller, id, true).await?;
    Ok(Reply::ok("Post published successfully", PostData { post }))
}

pub(super) async fn unpublish(
    State(state): State<BlogService>,
    ActiveUser(caller): ActiveUser,
    Path(id): Path<Uuid>,
) -> Result<Reply<PostData>> {
    let post = set_published(&state, &caller, id, false).await?;
    Ok(Reply::ok("Post unpublished successfully", PostData { post }))
}

pub(super) async fn remove(
    State(state): State<BlogService>,
    ActiveUser(caller): ActiveUser,
    Path(id): Path<Uuid>,
) -> Result<Reply<Removed>> {
    owned_post(&state, &caller, id).await?;

    let cascade = state.store.delete_post(id).await?;
    let orphaned_assets = state.media.delete_all(&cascade.assets).await;
    info!(
        post_id = %id,
        deleted_by = %caller.id,
        comments = cascade.comments,
        likes = cascade.likes,
        orphaned = orphaned_assets.len(),
        "Deleted post"
    );

    Ok(Reply::ok(
        "Post deleted successfully",
        Removed {
            comments: cascade.comments,
            likes: cascade.likes,
            orphaned_assets,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs() {
        let id = Uuid::parse_str("0123456789abcdef0123456789abcdef").unwrap();
        assert_eq!(slug("Hello, World!", id), "hello-world-01234567");
        assert_eq!(slug("  Rust  &  Async ", id), "rust-async-01234567");
        assert_eq!(slug("!!!", id), "01234567");
    }

    #[test]
    fn tag_limits() {
        let tags = clean_tags(vec![" rust ".to_owned(), "async".to_owned()]).unwrap();
        assert_eq!(tags, ["rust", "async"]);

        let eleven = (0..11).map(|i| format!("tag{i}")).collect();
        assert!(clean_tags(eleven).is_err());
        assert!(clean_tags(vec!["   ".to_owned()]).is_err());
        assert!(clean_tags(vec!["x".repeat(41)]).is_err());
    }
}
