// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use alcodemy_pg_db::models::{
    BlogChanges, StoredBlog, StoredComment, StoredFollow, StoredLike, StoredResource, StoredUser,
    UserChanges,
};
use alcodemy_pg_db::schema::{blogs, comments, follows, likes, resources, users};
use alcodemy_pg_db::Db;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::dsl::sql;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::{Bool, Text};
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use uuid::Uuid;

use super::{
    like_pattern, AccountCascade, Avatar, BlogStore, Comment, CommentThread, Follow,
    FollowerEntry, Image, Like, Post, PostCascade, PostPatch, Resource, Result, StoreError,
    TokenDigest, User, UserPatch, DUPLICATE_EMAIL, DUPLICATE_FOLLOW, DUPLICATE_LIKE,
    DUPLICATE_USERNAME,
};

/// [BlogStore] over Postgres. Multi-step operations each run in one transaction.
#[derive(Clone)]
pub struct PgStore(Db);

impl PgStore {
    pub fn new(db: Db) -> Self {
        Self(db)
    }
}

impl From<DieselError> for StoreError {
    fn from(value: DieselError) -> Self {
        match value {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                let message = match info.constraint_name() {
                    Some("users_username_key") => DUPLICATE_USERNAME,
                    Some("users_email_key") => DUPLICATE_EMAIL,
                    Some("follows_follower_id_author_id_key") => DUPLICATE_FOLLOW,
                    Some("likes_user_id_blog_id_key") => DUPLICATE_LIKE,
                    _ => return StoreError::Conflict(info.message().to_owned()),
                };
                StoreError::Conflict(message.to_owned())
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                StoreError::NotFound("Referenced record")
            }
            DieselError::NotFound => StoreError::NotFound("Record"),
            e => StoreError::Internal(e.into()),
        }
    }
}

impl TryFrom<StoredUser> for User {
    type Error = anyhow::Error;

    fn try_from(stored: StoredUser) -> anyhow::Result<Self> {
        Ok(Self {
            id: stored.id,
            username: stored.username,
            email: stored.email,
            password_hash: stored.password_hash,
            first_name: stored.first_name,
            last_name: stored.last_name,
            bio: stored.bio,
            avatar: Avatar {
                public_id: stored.avatar_public_id,
                secure_url: stored.avatar_url,
            },
            role: stored.role.parse()?,
            is_blocked: stored.is_blocked,
            is_verified: stored.is_verified,
            is_closed: stored.is_closed,
            followers: stored.followers,
            reset_token: stored.reset_token,
            reset_token_expiry: stored.reset_token_expiry,
            verify_token: stored.verify_token,
            verify_token_expiry: stored.verify_token_expiry,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        })
    }
}

impl From<&User> for StoredUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            bio: user.bio.clone(),
            avatar_public_id: user.avatar.public_id.clone(),
            avatar_url: user.avatar.secure_url.clone(),
            role: user.role.as_str().to_owned(),
            is_blocked: user.is_blocked,
            is_verified: user.is_verified,
            is_closed: user.is_closed,
            followers: user.followers,
            reset_token: user.reset_token.clone(),
            reset_token_expiry: user.reset_token_expiry,
            verify_token: user.verify_token.clone(),
            verify_token_expiry: user.verify_token_expiry,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

fn user_changes(patch: UserPatch, now: DateTime<Utc>) -> UserChanges {
    let (avatar_public_id, avatar_url) = match patch.avatar {
        Some(avatar) => (Some(avatar.public_id), Some(avatar.secure_url)),
        None => (None, None),
    };
    let (reset_token, reset_token_expiry) = token_columns(patch.reset_token);
    let (verify_token, verify_token_expiry) = token_columns(patch.verify_token);

    UserChanges {
        username: patch.username,
        password_hash: patch.password_hash,
        first_name: patch.first_name,
        last_name: patch.last_name,
        bio: patch.bio,
        avatar_public_id,
        avatar_url,
        role: patch.role.map(|role| role.as_str().to_owned()),
        is_blocked: patch.is_blocked,
        is_verified: patch.is_verified,
        is_closed: patch.is_closed,
        reset_token,
        reset_token_expiry,
        verify_token,
        verify_token_expiry,
        updated_at: now,
    }
}

/// Splits a token change into its hash and expiry column changes.
fn token_columns(
    token: Option<Option<TokenDigest>>,
) -> (Option<Option<String>>, Option<Option<DateTime<Utc>>>) {
    match token {
        None => (None, None),
        Some(None) => (Some(None), Some(None)),
        Some(Some(token)) => (Some(Some(token.hash)), Some(Some(token.expires_at))),
    }
}

impl From<StoredBlog> for Post {
    fn from(stored: StoredBlog) -> Self {
        let image = match (stored.image_resource_id, stored.image_url) {
            (Some(resource_id), Some(resource_url)) => Some(Image {
                resource_id,
                resource_url,
            }),
            _ => None,
        };

        Self {
            id: stored.id,
            slug: stored.slug,
            title: stored.title,
            content: stored.content,
            author_id: stored.author_id,
            is_published: stored.is_published,
            tags: stored.tags,
            seo_keywords: stored.seo_keywords,
            meta_description: stored.meta_description,
            image,
            likes: stored.likes,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        }
    }
}

impl From<&Post> for StoredBlog {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id,
            slug: post.slug.clone(),
            title: post.title.clone(),
            content: post.content.clone(),
            author_id: post.author_id,
            is_published: post.is_published,
            tags: post.tags.clone(),
            seo_keywords: post.seo_keywords.clone(),
            meta_description: post.meta_description.clone(),
            image_resource_id: post.image.as_ref().map(|i| i.resource_id.clone()),
            image_url: post.image.as_ref().map(|i| i.resource_url.clone()),
            likes: post.likes,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

fn blog_changes(patch: PostPatch, now: DateTime<Utc>) -> BlogChanges {
    let (image_resource_id, image_url) = match patch.image {
        Some(image) => (Some(image.resource_id), Some(image.resource_url)),
        None => (None, None),
    };

    BlogChanges {
        title: patch.title,
        content: patch.content,
        is_published: patch.is_published,
        tags: patch.tags,
        seo_keywords: patch.seo_keywords,
        meta_description: patch.meta_description,
        image_resource_id,
        image_url,
        updated_at: now,
    }
}

impl From<StoredComment> for Comment {
    fn from(stored: StoredComment) -> Self {
        Self {
            id: stored.id,
            content: stored.content,
            author_id: stored.author_id,
            blog_id: stored.blog_id,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        }
    }
}

impl From<&Comment> for StoredComment {
    fn from(comment: &Comment) -> Self {
        Self {
            id: comment.id,
            content: comment.content.clone(),
            author_id: comment.author_id,
            blog_id: comment.blog_id,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

impl From<StoredFollow> for Follow {
    fn from(stored: StoredFollow) -> Self {
        Self {
            id: stored.id,
            follower_id: stored.follower_id,
            author_id: stored.author_id,
            blog_id: stored.blog_id,
            created_at: stored.created_at,
        }
    }
}

impl From<StoredResource> for Resource {
    fn from(stored: StoredResource) -> Self {
        Self {
            id: stored.id,
            owner_id: stored.owner_id,
            blog_id: stored.blog_id,
            resource_id: stored.resource_id,
            resource_url: stored.resource_url,
            created_at: stored.created_at,
        }
    }
}

fn users_from(rows: Vec<StoredUser>) -> Result<Vec<User>> {
    Ok(rows
        .into_iter()
        .map(User::try_from)
        .collect::<anyhow::Result<_>>()?)
}

fn posts_from(rows: Vec<StoredBlog>) -> Vec<Post> {
    rows.into_iter().map(Post::from).collect()
}

#[async_trait]
impl BlogStore for PgStore {
    async fn insert_user(&self, user: User) -> Result<User> {
        let mut conn = self.0.connect().await?;
        let stored: StoredUser = diesel::insert_into(users::table)
            .values(StoredUser::from(&user))
            .returning(StoredUser::as_returning())
            .get_result(&mut conn)
            .await?;
        Ok(stored.try_into()?)
    }

    async fn user(&self, id: Uuid) -> Result<Option<User>> {
        let mut conn = self.0.connect().await?;
        let stored: Option<StoredUser> = users::table
            .find(id)
            .select(StoredUser::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(stored.map(User::try_from).transpose()?)
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        let mut conn = self.0.connect().await?;
        let stored: Option<StoredUser> = users::table
            .filter(users::username.eq(username))
            .select(StoredUser::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(stored.map(User::try_from).transpose()?)
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let mut conn = self.0.connect().await?;
        let stored: Option<StoredUser> = users::table
            .filter(users::email.eq(email))
            .select(StoredUser::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(stored.map(User::try_from).transpose()?)
    }

    async fn user_by_reset_token(&self, hash: &str, now: DateTime<Utc>) -> Result<Option<User>> {
        let mut conn = self.0.connect().await?;
        let stored: Option<StoredUser> = users::table
            .filter(users::reset_token.eq(hash))
            .filter(users::reset_token_expiry.gt(now))
            .select(StoredUser::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(stored.map(User::try_from).transpose()?)
    }

    async fn user_by_verify_token(
        &self,
        hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>> {
        let mut conn = self.0.connect().await?;
        let stored: Option<StoredUser> = users::table
            .filter(users::verify_token.eq(hash))
            .filter(users::verify_token_expiry.gt(now))
            .select(StoredUser::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(stored.map(User::try_from).transpose()?)
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> Result<User> {
        let mut conn = self.0.connect().await?;
        let stored: StoredUser = diesel::update(users::table.find(id))
            .set(user_changes(patch, Utc::now()))
            .returning(StoredUser::as_returning())
            .get_result(&mut conn)
            .await
            .optional()?
            .ok_or(StoreError::NotFound("User"))?;
        Ok(stored.try_into()?)
    }

    async fn list_users(&self, skip: i64, limit: i64) -> Result<Vec<User>> {
        let mut conn = self.0.connect().await?;
        let rows: Vec<StoredUser> = users::table
            .order((users::created_at.desc(), users::id))
            .offset(skip)
            .limit(limit)
            .select(StoredUser::as_select())
            .load(&mut conn)
            .await?;
        users_from(rows)
    }

    async fn search_users(&self, query: &str, limit: i64) -> Result<Vec<User>> {
        let mut conn = self.0.connect().await?;
        let pattern = like_pattern(query);
        let rows: Vec<StoredUser> = users::table
            .filter(
                users::username
                    .ilike(pattern.clone())
                    .or(users::email.ilike(pattern)),
            )
            .order(users::created_at.desc())
            .limit(limit)
            .select(StoredUser::as_select())
            .load(&mut conn)
            .await?;
        users_from(rows)
    }

    async fn popular_authors(&self, limit: i64) -> Result<Vec<User>> {
        let mut conn = self.0.connect().await?;
        let rows: Vec<StoredUser> = users::table
            .filter(users::is_blocked.eq(false))
            .filter(users::is_closed.eq(false))
            .order((users::followers.desc(), users::created_at))
            .limit(limit)
            .select(StoredUser::as_select())
            .load(&mut conn)
            .await?;
        users_from(rows)
    }

    async fn delete_user(&self, id: Uuid) -> Result<AccountCascade> {
        let mut conn = self.0.connect().await?;
        AsyncConnection::transaction::<_, StoreError, _>(&mut conn, |conn| {
            async move {
                let user: StoredUser = users::table
                    .find(id)
                    .select(StoredUser::as_select())
                    .first(conn)
                    .await
                    .optional()?
                    .ok_or(StoreError::NotFound("User"))?;

                let owned: Vec<Uuid> = blogs::table
                    .filter(blogs::author_id.eq(id))
                    .select(blogs::id)
                    .load(conn)
                    .await?;

                diesel::delete(likes::table.filter(likes::blog_id.eq_any(&owned)))
                    .execute(conn)
                    .await?;

                diesel::delete(
                    comments::table.filter(
                        comments::blog_id
                            .eq_any(&owned)
                            .or(comments::author_id.eq(id)),
                    ),
                )
                .execute(conn)
                .await?;

                let mut assets: Vec<String> = diesel::delete(
                    resources::table.filter(
                        resources::owner_id
                            .eq(id)
                            .or(resources::blog_id.assume_not_null().eq_any(&owned)),
                    ),
                )
                .returning(resources::resource_id)
                .get_results(conn)
                .await?;

                let images: Vec<Option<String>> =
                    diesel::delete(blogs::table.filter(blogs::author_id.eq(id)))
                        .returning(blogs::image_resource_id)
                        .get_results(conn)
                        .await?;
                assets.extend(images.into_iter().flatten());

                // One like per (user, post), so each liked post loses exactly one.
                let liked: Vec<Uuid> = diesel::delete(likes::table.filter(likes::user_id.eq(id)))
                    .returning(likes::blog_id)
                    .get_results(conn)
                    .await?;
                diesel::update(blogs::table.filter(blogs::id.eq_any(&liked)))
                    .set(blogs::likes.eq(blogs::likes - 1))
                    .execute(conn)
                    .await?;

                let followed: Vec<Uuid> =
                    diesel::delete(follows::table.filter(follows::follower_id.eq(id)))
                        .returning(follows::author_id)
                        .get_results(conn)
                        .await?;
                diesel::update(users::table.filter(users::id.eq_any(&followed)))
                    .set(users::followers.eq(users::followers - 1))
                    .execute(conn)
                    .await?;

                diesel::delete(follows::table.filter(follows::author_id.eq(id)))
                    .execute(conn)
                    .await?;

                diesel::delete(users::table.find(id)).execute(conn).await?;

                let user = User::try_from(user)?;
                if !user.avatar.public_id.is_empty() {
                    assets.push(user.avatar.public_id.clone());
                }

                Ok(AccountCascade {
                    user,
                    posts: owned.len() as u64,
                    assets,
                })
            }
            .scope_boxed()
        })
        .await
    }

    async fn insert_post(&self, post: Post) -> Result<Post> {
        let mut conn = self.0.connect().await?;
        let stored: StoredBlog = diesel::insert_into(blogs::table)
            .values(StoredBlog::from(&post))
            .returning(StoredBlog::as_returning())
            .get_result(&mut conn)
            .await?;
        Ok(stored.into())
    }

    async fn post(&self, id: Uuid) -> Result<Option<Post>> {
        let mut conn = self.0.connect().await?;
        let stored: Option<StoredBlog> = blogs::table
            .find(id)
            .select(StoredBlog::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(stored.map(Post::from))
    }

    async fn update_post(&self, id: Uuid, patch: PostPatch) -> Result<Post> {
        let mut conn = self.0.connect().await?;
        let stored: StoredBlog = diesel::update(blogs::table.find(id))
            .set(blog_changes(patch, Utc::now()))
            .returning(StoredBlog::as_returning())
            .get_result(&mut conn)
            .await
            .optional()?
            .ok_or(StoreError::NotFound("Post"))?;
        Ok(stored.into())
    }

    async fn posts_by_author(
        &self,
        author: Uuid,
        include_drafts: bool,
        limit: i64,
    ) -> Result<Vec<Post>> {
        let mut conn = self.0.connect().await?;
        let mut query = blogs::table
            .filter(blogs::author_id.eq(author))
            .into_boxed();
        if !include_drafts {
            query = query.filter(blogs::is_published.eq(true));
        }

        let rows: Vec<StoredBlog> = query
            .order(blogs::created_at.desc())
            .limit(limit)
            .select(StoredBlog::as_select())
            .load(&mut conn)
            .await?;
        Ok(posts_from(rows))
    }

    async fn count_posts_by_author(&self, author: Uuid, include_drafts: bool) -> Result<i64> {
        let mut conn = self.0.connect().await?;
        let mut query = blogs::table
            .filter(blogs::author_id.eq(author))
            .into_boxed();
        if !include_drafts {
            query = query.filter(blogs::is_published.eq(true));
        }

        Ok(query.count().get_result(&mut conn).await?)
    }

    async fn trending_posts(&self, limit: i64) -> Result<Vec<Post>> {
        let mut conn = self.0.connect().await?;
        let rows: Vec<StoredBlog> = blogs::table
            .inner_join(users::table)
            .filter(blogs::is_published.eq(true))
            .filter(users::is_blocked.eq(false))
            .filter(users::is_closed.eq(false))
            .order((blogs::likes.desc(), blogs::created_at.desc()))
            .limit(limit)
            .select(StoredBlog::as_select())
            .load(&mut conn)
            .await?;
        Ok(posts_from(rows))
    }

    async fn published_posts_by_authors(&self, authors: &[Uuid], limit: i64) -> Result<Vec<Post>> {
        let mut conn = self.0.connect().await?;
        let rows: Vec<StoredBlog> = blogs::table
            .inner_join(users::table)
            .filter(blogs::author_id.eq_any(authors))
            .filter(blogs::is_published.eq(true))
            .filter(users::is_blocked.eq(false))
            .filter(users::is_closed.eq(false))
            .order(blogs::created_at.desc())
            .limit(limit)
            .select(StoredBlog::as_select())
            .load(&mut conn)
            .await?;
        Ok(posts_from(rows))
    }

    async fn search_posts(&self, query: &str, skip: i64, limit: i64) -> Result<Vec<Post>> {
        let mut conn = self.0.connect().await?;
        let pattern = like_pattern(query);
        let tag_matches =
            sql::<Bool>("EXISTS (SELECT 1 FROM unnest(blogs.tags) AS tag WHERE tag ILIKE ")
                .bind::<Text, _>(pattern.clone())
                .sql(")");

        let rows: Vec<StoredBlog> = blogs::table
            .inner_join(users::table)
            .filter(blogs::is_published.eq(true))
            .filter(users::is_blocked.eq(false))
            .filter(users::is_closed.eq(false))
            .filter(blogs::title.ilike(pattern).or(tag_matches))
            .order(blogs::created_at.desc())
            .offset(skip)
            .limit(limit)
            .select(StoredBlog::as_select())
            .load(&mut conn)
            .await?;
        Ok(posts_from(rows))
    }

    async fn delete_post(&self, id: Uuid) -> Result<PostCascade> {
        let mut conn = self.0.connect().await?;
        AsyncConnection::transaction::<_, StoreError, _>(&mut conn, |conn| {
            async move {
                let likes = diesel::delete(likes::table.filter(likes::blog_id.eq(id)))
                    .execute(conn)
                    .await?;

                let comments = diesel::delete(comments::table.filter(comments::blog_id.eq(id)))
                    .execute(conn)
                    .await?;

                let mut assets: Vec<String> =
                    diesel::delete(resources::table.filter(resources::blog_id.eq(id)))
                        .returning(resources::resource_id)
                        .get_results(conn)
                        .await?;

                let stored: StoredBlog = diesel::delete(blogs::table.find(id))
                    .returning(StoredBlog::as_returning())
                    .get_result(conn)
                    .await
                    .optional()?
                    .ok_or(StoreError::NotFound("Post"))?;

                let post = Post::from(stored);
                if let Some(image) = &post.image {
                    assets.push(image.resource_id.clone());
                }

                Ok(PostCascade {
                    post,
                    comments: comments as u64,
                    likes: likes as u64,
                    assets,
                })
            }
            .scope_boxed()
        })
        .await
    }

    async fn insert_comment(&self, comment: Comment) -> Result<Comment> {
        let mut conn = self.0.connect().await?;
        let stored: StoredComment = diesel::insert_into(comments::table)
            .values(StoredComment::from(&comment))
            .returning(StoredComment::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(|e| match StoreError::from(e) {
                StoreError::NotFound(_) => StoreError::NotFound("Post"),
                e => e,
            })?;
        Ok(stored.into())
    }

    async fn comment(&self, id: Uuid) -> Result<Option<Comment>> {
        let mut conn = self.0.connect().await?;
        let stored: Option<StoredComment> = comments::table
            .find(id)
            .select(StoredComment::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(stored.map(Comment::from))
    }

    async fn update_comment(&self, comment: &Comment) -> Result<Comment> {
        let mut conn = self.0.connect().await?;
        let stored: StoredComment = diesel::update(comments::table.find(comment.id))
            .set((
                comments::content.eq(&comment.content),
                comments::updated_at.eq(comment.updated_at),
            ))
            .returning(StoredComment::as_returning())
            .get_result(&mut conn)
            .await
            .optional()?
            .ok_or(StoreError::NotFound("Comment"))?;
        Ok(stored.into())
    }

    async fn delete_comment(&self, id: Uuid) -> Result<()> {
        let mut conn = self.0.connect().await?;
        let deleted = diesel::delete(comments::table.find(id))
            .execute(&mut conn)
            .await?;
        if deleted == 0 {
            return Err(StoreError::NotFound("Comment"));
        }
        Ok(())
    }

    async fn comments_for_post(&self, blog: Uuid) -> Result<Vec<CommentThread>> {
        let mut conn = self.0.connect().await?;
        let rows: Vec<(StoredComment, StoredUser)> = comments::table
            .inner_join(users::table)
            .filter(comments::blog_id.eq(blog))
            .order(comments::created_at)
            .select((StoredComment::as_select(), StoredUser::as_select()))
            .load(&mut conn)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(comment, author)| CommentThread {
                comment: comment.into(),
                author_name: format!("{} {}", author.first_name, author.last_name),
                author_username: author.username,
            })
            .collect())
    }

    async fn follow(&self, follow: Follow) -> Result<Follow> {
        let mut conn = self.0.connect().await?;
        AsyncConnection::transaction::<_, StoreError, _>(&mut conn, |conn| {
            async move {
                let stored: StoredFollow = diesel::insert_into(follows::table)
                    .values(StoredFollow {
                        id: follow.id,
                        follower_id: follow.follower_id,
                        author_id: follow.author_id,
                        blog_id: follow.blog_id,
                        created_at: follow.created_at,
                    })
                    .returning(StoredFollow::as_returning())
                    .get_result(conn)
                    .await?;

                let updated = diesel::update(users::table.find(follow.author_id))
                    .set(users::followers.eq(users::followers + 1))
                    .execute(conn)
                    .await?;
                if updated == 0 {
                    return Err(StoreError::NotFound("Author"));
                }

                Ok(stored.into())
            }
            .scope_boxed()
        })
        .await
    }

    async fn follow_by_id(&self, id: Uuid) -> Result<Option<Follow>> {
        let mut conn = self.0.connect().await?;
        let stored: Option<StoredFollow> = follows::table
            .find(id)
            .select(StoredFollow::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(stored.map(Follow::from))
    }

    async fn follow_between(&self, follower: Uuid, author: Uuid) -> Result<Option<Follow>> {
        let mut conn = self.0.connect().await?;
        let stored: Option<StoredFollow> = follows::table
            .filter(follows::follower_id.eq(follower))
            .filter(follows::author_id.eq(author))
            .select(StoredFollow::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(stored.map(Follow::from))
    }

    async fn unfollow(&self, id: Uuid) -> Result<()> {
        let mut conn = self.0.connect().await?;
        AsyncConnection::transaction::<_, StoreError, _>(&mut conn, |conn| {
            async move {
                let author: Uuid = diesel::delete(follows::table.find(id))
                    .returning(follows::author_id)
                    .get_result(conn)
                    .await
                    .optional()?
                    .ok_or(StoreError::NotFound("Follow"))?;

                diesel::update(users::table.find(author))
                    .set(users::followers.eq(users::followers - 1))
                    .execute(conn)
                    .await?;

                Ok(())
            }
            .scope_boxed()
        })
        .await
    }

    async fn followers(&self, author: Uuid, skip: i64, limit: i64) -> Result<Vec<FollowerEntry>> {
        let mut conn = self.0.connect().await?;
        let rows: Vec<(StoredFollow, StoredUser)> = follows::table
            .inner_join(users::table.on(users::id.eq(follows::follower_id)))
            .filter(follows::author_id.eq(author))
            .order((follows::created_at.desc(), follows::id))
            .offset(skip)
            .limit(limit)
            .select((StoredFollow::as_select(), StoredUser::as_select()))
            .load(&mut conn)
            .await?;

        rows.into_iter()
            .map(|(follow, follower)| -> Result<FollowerEntry> {
                Ok(FollowerEntry {
                    follow: follow.into(),
                    follower: follower.try_into()?,
                })
            })
            .collect()
    }

    async fn like(&self, like: Like) -> Result<i64> {
        let mut conn = self.0.connect().await?;
        AsyncConnection::transaction::<_, StoreError, _>(&mut conn, |conn| {
            async move {
                diesel::insert_into(likes::table)
                    .values(StoredLike {
                        id: like.id,
                        user_id: like.user_id,
                        blog_id: like.blog_id,
                        created_at: like.created_at,
                    })
                    .execute(conn)
                    .await
                    .map_err(|e| match StoreError::from(e) {
                        StoreError::NotFound(_) => StoreError::NotFound("Post"),
                        e => e,
                    })?;

                let likes: i64 = diesel::update(blogs::table.find(like.blog_id))
                    .set(blogs::likes.eq(blogs::likes + 1))
                    .returning(blogs::likes)
                    .get_result(conn)
                    .await?;

                Ok(likes)
            }
            .scope_boxed()
        })
        .await
    }

    async fn unlike(&self, user: Uuid, blog: Uuid) -> Result<i64> {
        let mut conn = self.0.connect().await?;
        AsyncConnection::transaction::<_, StoreError, _>(&mut conn, |conn| {
            async move {
                let deleted = diesel::delete(
                    likes::table
                        .filter(likes::user_id.eq(user))
                        .filter(likes::blog_id.eq(blog)),
                )
                .execute(conn)
                .await?;
                if deleted == 0 {
                    return Err(StoreError::NotFound("Like"));
                }

                let likes: i64 = diesel::update(blogs::table.find(blog))
                    .set(blogs::likes.eq(blogs::likes - 1))
                    .returning(blogs::likes)
                    .get_result(conn)
                    .await?;

                Ok(likes)
            }
            .scope_boxed()
        })
        .await
    }

    async fn has_liked(&self, user: Uuid, blog: Uuid) -> Result<bool> {
        let mut conn = self.0.connect().await?;
        let liked: i64 = likes::table
            .filter(likes::user_id.eq(user))
            .filter(likes::blog_id.eq(blog))
            .count()
            .get_result(&mut conn)
            .await?;
        Ok(liked > 0)
    }

    async fn insert_resource(&self, resource: Resource) -> Result<Resource> {
        let mut conn = self.0.connect().await?;
        let stored: StoredResource = diesel::insert_into(resources::table)
            .values(StoredResource {
                id: resource.id,
                owner_id: resource.owner_id,
                blog_id: resource.blog_id,
                resource_id: resource.resource_id,
                resource_url: resource.resource_url,
                created_at: resource.created_at,
            })
            .returning(StoredResource::as_returning())
            .get_result(&mut conn)
            .await?;
        Ok(stored.into())
    }

    async fn resource(&self, id: Uuid) -> Result<Option<Resource>> {
        let mut conn = self.0.connect().await?;
        let stored: Option<StoredResource> = resources::table
            .find(id)
            .select(StoredResource::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(stored.map(Resource::from))
    }

    async fn delete_resource(&self, id: Uuid) -> Result<()> {
        let mut conn = self.0.connect().await?;
        let deleted = diesel::delete(resources::table.find(id))
            .execute(&mut conn)
            .await?;
        if deleted == 0 {
            return Err(StoreError::NotFound("Resource"));
        }
        Ok(())
    }
}

#[cfg(all(test, feature = "pg_integration"))]
mod tests {
    use alcodemy_pg_db::temp::TempDb;
    use alcodemy_pg_db::DbArgs;

    use super::*;
    use crate::store::testing;

    /// A migrated store over its own temporary database, which lives as long as the returned
    /// [TempDb].
    async fn setup() -> (TempDb, PgStore) {
        let temp_db = TempDb::new().unwrap();
        let url = temp_db.database().url().clone();
        let db = Db::new(url, DbArgs::default()).await.unwrap();
        db.run_migrations().await.unwrap();
        (temp_db, PgStore::new(db))
    }

    #[tokio::test]
    async fn duplicate_username_or_email_is_a_conflict() {
        let (_temp_db, store) = setup().await;
        testing::duplicate_username_or_email_is_a_conflict(&store).await;
    }

    #[tokio::test]
    async fn follow_counter_tracks_relations() {
        let (_temp_db, store) = setup().await;
        testing::follow_counter_tracks_relations(&store).await;
    }

    #[tokio::test]
    async fn profile_edit_keeps_a_concurrent_block() {
        let (_temp_db, store) = setup().await;
        testing::profile_edit_keeps_a_concurrent_block(&store).await;
    }

    #[tokio::test]
    async fn post_edit_keeps_a_concurrent_unpublish() {
        let (_temp_db, store) = setup().await;
        testing::post_edit_keeps_a_concurrent_unpublish(&store).await;
    }

    #[tokio::test]
    async fn taken_username_is_rejected_on_update() {
        let (_temp_db, store) = setup().await;
        testing::taken_username_is_rejected_on_update(&store).await;
    }

    #[tokio::test]
    async fn like_counter_tracks_relations() {
        let (_temp_db, store) = setup().await;
        testing::like_counter_tracks_relations(&store).await;
    }

    #[tokio::test]
    async fn search_ignores_case_and_inactive_authors() {
        let (_temp_db, store) = setup().await;
        testing::search_ignores_case_and_inactive_authors(&store).await;
    }

    #[tokio::test]
    async fn deleting_an_account_restores_counters() {
        let (_temp_db, store) = setup().await;
        testing::deleting_an_account_restores_counters(&store).await;
    }

    #[tokio::test]
    async fn unknown_user_update_is_not_found() {
        let (_temp_db, store) = setup().await;
        let err = store
            .update_user(Uuid::new_v4(), UserPatch::blocked(true))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound("User")));
    }

    #[tokio::test]
    async fn clearing_a_token_nulls_both_columns() {
        let (_temp_db, store) = setup().await;
        let user = testing::user("tokened");
        let user = store.insert_user(user).await.unwrap();

        let digest = TokenDigest {
            hash: "abc".to_owned(),
            expires_at: Utc::now() + chrono::Duration::minutes(10),
        };
        let stored = store
            .update_user(user.id, UserPatch::reset_token(Some(digest)))
            .await
            .unwrap();
        assert_eq!(stored.reset_token.as_deref(), Some("abc"));
        assert!(store
            .user_by_reset_token("abc", Utc::now())
            .await
            .unwrap()
            .is_some());

        let cleared = store
            .update_user(user.id, UserPatch::reset_token(None))
            .await
            .unwrap();
        assert_eq!(cleared.reset_token, None);
        assert_eq!(cleared.reset_token_expiry, None);
    }
}
