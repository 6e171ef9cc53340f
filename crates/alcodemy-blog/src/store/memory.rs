// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! A [BlogStore] kept entirely in process memory. Every operation runs under a single lock, so
//! multi-step operations are all-or-nothing just like their database transactions. Rows are kept
//! in insertion order, which breaks ties between equal timestamps.

use std::cmp::Reverse;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use super::{
    AccountCascade, BlogStore, Comment, CommentThread, Follow, FollowerEntry, Like, Post,
    PostCascade, PostPatch, Resource, Result, StoreError, User, UserPatch, DUPLICATE_EMAIL,
    DUPLICATE_FOLLOW, DUPLICATE_LIKE, DUPLICATE_USERNAME,
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    posts: Vec<Post>,
    comments: Vec<Comment>,
    follows: Vec<Follow>,
    likes: Vec<Like>,
    resources: Vec<Resource>,
}

#[derive(Clone, Default)]
pub struct InMemoryStore(Arc<Mutex<Tables>>);

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Tables {
    fn user(&self, id: Uuid) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    fn user_mut(&mut self, id: Uuid) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.id == id)
    }

    fn post_mut(&mut self, id: Uuid) -> Option<&mut Post> {
        self.posts.iter_mut().find(|p| p.id == id)
    }

    fn author_is_active(&self, post: &Post) -> bool {
        self.user(post.author_id).is_some_and(User::is_active)
    }

    fn check_unique_user(&self, user: &User) -> Result<()> {
        for other in self.users.iter().filter(|u| u.id != user.id) {
            if other.username == user.username {
                return Err(StoreError::Conflict(DUPLICATE_USERNAME.to_owned()));
            }
            if other.email == user.email {
                return Err(StoreError::Conflict(DUPLICATE_EMAIL.to_owned()));
            }
        }
        Ok(())
    }

    /// Removes a post with its likes, comments and attached resources, returning the object keys
    /// left to delete.
    fn remove_post(&mut self, id: Uuid) -> Result<PostCascade> {
        let index = self
            .posts
            .iter()
            .position(|p| p.id == id)
            .ok_or(StoreError::NotFound("Post"))?;

        let likes_before = self.likes.len();
        self.likes.retain(|l| l.blog_id != id);
        let likes = (likes_before - self.likes.len()) as u64;

        let comments_before = self.comments.len();
        self.comments.retain(|c| c.blog_id != id);
        let comments = (comments_before - self.comments.len()) as u64;

        let mut assets = vec![];
        self.resources.retain(|r| {
            if r.blog_id == Some(id) {
                assets.push(r.resource_id.clone());
                false
            } else {
                true
            }
        });

        let post = self.posts.remove(index);
        if let Some(image) = &post.image {
            assets.push(image.resource_id.clone());
        }

        Ok(PostCascade {
            post,
            comments,
            likes,
            assets,
        })
    }
}

fn newest_first<T>(rows: &mut [T], created_at: impl Fn(&T) -> DateTime<Utc>) {
    rows.reverse();
    rows.sort_by_key(|r| Reverse(created_at(r)));
}

fn page<T>(rows: Vec<T>, skip: i64, limit: i64) -> Vec<T> {
    rows.into_iter()
        .skip(skip.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[async_trait]
impl BlogStore for InMemoryStore {
    async fn insert_user(&self, user: User) -> Result<User> {
        let mut tables = self.0.lock();
        tables.check_unique_user(&user)?;
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.0.lock().user(id).cloned())
    }

    async fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        let tables = self.0.lock();
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.0.lock();
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn user_by_reset_token(&self, hash: &str, now: DateTime<Utc>) -> Result<Option<User>> {
        let tables = self.0.lock();
        Ok(tables
            .users
            .iter()
            .find(|u| {
                u.reset_token.as_deref() == Some(hash)
                    && u.reset_token_expiry.is_some_and(|expiry| expiry > now)
            })
            .cloned())
    }

    async fn user_by_verify_token(
        &self,
        hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>> {
        let tables = self.0.lock();
        Ok(tables
            .users
            .iter()
            .find(|u| {
                u.verify_token.as_deref() == Some(hash)
                    && u.verify_token_expiry.is_some_and(|expiry| expiry > now)
            })
            .cloned())
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> Result<User> {
        let mut tables = self.0.lock();
        let mut updated = tables
            .user(id)
            .cloned()
            .ok_or(StoreError::NotFound("User"))?;
        patch.apply(&mut updated, Utc::now());
        tables.check_unique_user(&updated)?;

        let stored = tables.user_mut(id).ok_or(StoreError::NotFound("User"))?;
        *stored = updated;
        Ok(stored.clone())
    }

    async fn list_users(&self, skip: i64, limit: i64) -> Result<Vec<User>> {
        let mut users = self.0.lock().users.clone();
        newest_first(&mut users, |u| u.created_at);
        Ok(page(users, skip, limit))
    }

    async fn search_users(&self, query: &str, limit: i64) -> Result<Vec<User>> {
        let query = query.to_lowercase();
        let mut users: Vec<_> = self
            .0
            .lock()
            .users
            .iter()
            .filter(|u| {
                u.username.to_lowercase().contains(&query)
                    || u.email.to_lowercase().contains(&query)
            })
            .cloned()
            .collect();
        newest_first(&mut users, |u| u.created_at);
        Ok(page(users, 0, limit))
    }

    async fn popular_authors(&self, limit: i64) -> Result<Vec<User>> {
        let mut users: Vec<_> = self
            .0
            .lock()
            .users
            .iter()
            .filter(|u| u.is_active())
            .cloned()
            .collect();
        users.sort_by_key(|u| Reverse(u.followers));
        Ok(page(users, 0, limit))
    }

    async fn delete_user(&self, id: Uuid) -> Result<AccountCascade> {
        let mut tables = self.0.lock();
        let index = tables
            .users
            .iter()
            .position(|u| u.id == id)
            .ok_or(StoreError::NotFound("User"))?;

        let mut assets = vec![];
        let owned: Vec<Uuid> = tables
            .posts
            .iter()
            .filter(|p| p.author_id == id)
            .map(|p| p.id)
            .collect();
        for post in &owned {
            assets.extend(tables.remove_post(*post)?.assets);
        }

        tables.comments.retain(|c| c.author_id != id);

        let liked: Vec<Uuid> = tables
            .likes
            .iter()
            .filter(|l| l.user_id == id)
            .map(|l| l.blog_id)
            .collect();
        tables.likes.retain(|l| l.user_id != id);
        for blog in liked {
            if let Some(post) = tables.post_mut(blog) {
                post.likes -= 1;
            }
        }

        let followed: Vec<Uuid> = tables
            .follows
            .iter()
            .filter(|f| f.follower_id == id)
            .map(|f| f.author_id)
            .collect();
        tables
            .follows
            .retain(|f| f.follower_id != id && f.author_id != id);
        for author in followed {
            if let Some(author) = tables.user_mut(author) {
                author.followers -= 1;
            }
        }

        tables.resources.retain(|r| {
            if r.owner_id == id {
                assets.push(r.resource_id.clone());
                false
            } else {
                true
            }
        });

        let user = tables.users.remove(index);
        if !user.avatar.public_id.is_empty() {
            assets.push(user.avatar.public_id.clone());
        }

        Ok(AccountCascade {
            user,
            posts: owned.len() as u64,
            assets,
        })
    }

    async fn insert_post(&self, post: Post) -> Result<Post> {
        let mut tables = self.0.lock();
        if tables.user(post.author_id).is_none() {
            return Err(StoreError::NotFound("User"));
        }
        if tables.posts.iter().any(|p| p.slug == post.slug) {
            return Err(StoreError::Conflict("A post with this slug exists".to_owned()));
        }
        tables.posts.push(post.clone());
        Ok(post)
    }

    async fn post(&self, id: Uuid) -> Result<Option<Post>> {
        let tables = self.0.lock();
        Ok(tables.posts.iter().find(|p| p.id == id).cloned())
    }

    async fn update_post(&self, id: Uuid, patch: PostPatch) -> Result<Post> {
        let mut tables = self.0.lock();
        let stored = tables.post_mut(id).ok_or(StoreError::NotFound("Post"))?;
        patch.apply(stored, Utc::now());
        Ok(stored.clone())
    }

    async fn posts_by_author(
        &self,
        author: Uuid,
        include_drafts: bool,
        limit: i64,
    ) -> Result<Vec<Post>> {
        let mut posts: Vec<_> = self
            .0
            .lock()
            .posts
            .iter()
            .filter(|p| p.author_id == author && (include_drafts || p.is_published))
            .cloned()
            .collect();
        newest_first(&mut posts, |p| p.created_at);
        Ok(page(posts, 0, limit))
    }

    async fn count_posts_by_author(&self, author: Uuid, include_drafts: bool) -> Result<i64> {
        let tables = self.0.lock();
        Ok(tables
            .posts
            .iter()
            .filter(|p| p.author_id == author && (include_drafts || p.is_published))
            .count() as i64)
    }

    async fn trending_posts(&self, limit: i64) -> Result<Vec<Post>> {
        let tables = self.0.lock();
        let mut posts: Vec<_> = tables
            .posts
            .iter()
            .filter(|p| p.is_published && tables.author_is_active(p))
            .cloned()
            .collect();
        newest_first(&mut posts, |p| p.created_at);
        posts.sort_by_key(|p| Reverse(p.likes));
        Ok(page(posts, 0, limit))
    }

    async fn published_posts_by_authors(&self, authors: &[Uuid], limit: i64) -> Result<Vec<Post>> {
        let tables = self.0.lock();
        let mut posts: Vec<_> = tables
            .posts
            .iter()
            .filter(|p| p.is_published && authors.contains(&p.author_id))
            .filter(|p| tables.author_is_active(p))
            .cloned()
            .collect();
        newest_first(&mut posts, |p| p.created_at);
        Ok(page(posts, 0, limit))
    }

    async fn search_posts(&self, query: &str, skip: i64, limit: i64) -> Result<Vec<Post>> {
        let query = query.to_lowercase();
        let tables = self.0.lock();
        let mut posts: Vec<_> = tables
            .posts
            .iter()
            .filter(|p| p.is_published && tables.author_is_active(p))
            .filter(|p| {
                p.title.to_lowercase().contains(&query)
                    || p.tags.iter().any(|t| t.to_lowercase().contains(&query))
            })
            .cloned()
            .collect();
        newest_first(&mut posts, |p| p.created_at);
        Ok(page(posts, skip, limit))
    }

    async fn delete_post(&self, id: Uuid) -> Result<PostCascade> {
        self.0.lock().remove_post(id)
    }

    async fn insert_comment(&self, comment: Comment) -> Result<Comment> {
        let mut tables = self.0.lock();
        if !tables.posts.iter().any(|p| p.id == comment.blog_id) {
            return Err(StoreError::NotFound("Post"));
        }
        tables.comments.push(comment.clone());
        Ok(comment)
    }

    async fn comment(&self, id: Uuid) -> Result<Option<Comment>> {
        let tables = self.0.lock();
        Ok(tables.comments.iter().find(|c| c.id == id).cloned())
    }

    async fn update_comment(&self, comment: &Comment) -> Result<Comment> {
        let mut tables = self.0.lock();
        let stored = tables
            .comments
            .iter_mut()
            .find(|c| c.id == comment.id)
            .ok_or(StoreError::NotFound("Comment"))?;
        *stored = comment.clone();
        Ok(stored.clone())
    }

    async fn delete_comment(&self, id: Uuid) -> Result<()> {
        let mut tables = self.0.lock();
        let index = tables
            .comments
            .iter()
            .position(|c| c.id == id)
            .ok_or(StoreError::NotFound("Comment"))?;
        tables.comments.remove(index);
        Ok(())
    }

    async fn comments_for_post(&self, blog: Uuid) -> Result<Vec<CommentThread>> {
        let tables = self.0.lock();
        Ok(tables
            .comments
            .iter()
            .filter(|c| c.blog_id == blog)
            .filter_map(|c| {
                let author = tables.user(c.author_id)?;
                Some(CommentThread {
                    comment: c.clone(),
                    author_username: author.username.clone(),
                    author_name: author.full_name(),
                })
            })
            .collect())
    }

    async fn follow(&self, follow: Follow) -> Result<Follow> {
        let mut tables = self.0.lock();
        if tables.user(follow.follower_id).is_none() {
            return Err(StoreError::NotFound("User"));
        }
        if tables
            .follows
            .iter()
            .any(|f| f.follower_id == follow.follower_id && f.author_id == follow.author_id)
        {
            return Err(StoreError::Conflict(DUPLICATE_FOLLOW.to_owned()));
        }

        let author = tables
            .user_mut(follow.author_id)
            .ok_or(StoreError::NotFound("Author"))?;
        author.followers += 1;
        tables.follows.push(follow.clone());
        Ok(follow)
    }

    async fn follow_by_id(&self, id: Uuid) -> Result<Option<Follow>> {
        let tables = self.0.lock();
        Ok(tables.follows.iter().find(|f| f.id == id).cloned())
    }

    async fn follow_between(&self, follower: Uuid, author: Uuid) -> Result<Option<Follow>> {
        let tables = self.0.lock();
        Ok(tables
            .follows
            .iter()
            .find(|f| f.follower_id == follower && f.author_id == author)
            .cloned())
    }

    async fn unfollow(&self, id: Uuid) -> Result<()> {
        let mut tables = self.0.lock();
        let index = tables
            .follows
            .iter()
            .position(|f| f.id == id)
            .ok_or(StoreError::NotFound("Follow"))?;

        let follow = tables.follows.remove(index);
        if let Some(author) = tables.user_mut(follow.author_id) {
            author.followers -= 1;
        }
        Ok(())
    }

    async fn followers(&self, author: Uuid, skip: i64, limit: i64) -> Result<Vec<FollowerEntry>> {
        let tables = self.0.lock();
        let mut entries: Vec<_> = tables
            .follows
            .iter()
            .filter(|f| f.author_id == author)
            .filter_map(|f| {
                Some(FollowerEntry {
                    follow: f.clone(),
                    follower: tables.user(f.follower_id)?.clone(),
                })
            })
            .collect();
        newest_first(&mut entries, |e| e.follow.created_at);
        Ok(page(entries, skip, limit))
    }

    async fn like(&self, like: Like) -> Result<i64> {
        let mut tables = self.0.lock();
        if tables
            .likes
            .iter()
            .any(|l| l.user_id == like.user_id && l.blog_id == like.blog_id)
        {
            return Err(StoreError::Conflict(DUPLICATE_LIKE.to_owned()));
        }

        let post = tables
            .post_mut(like.blog_id)
            .ok_or(StoreError::NotFound("Post"))?;
        post.likes += 1;
        let likes = post.likes;
        tables.likes.push(like);
        Ok(likes)
    }

    async fn unlike(&self, user: Uuid, blog: Uuid) -> Result<i64> {
        let mut tables = self.0.lock();
        let index = tables
            .likes
            .iter()
            .position(|l| l.user_id == user && l.blog_id == blog)
            .ok_or(StoreError::NotFound("Like"))?;

        let post = tables.post_mut(blog).ok_or(StoreError::NotFound("Post"))?;
        post.likes -= 1;
        let likes = post.likes;
        tables.likes.remove(index);
        Ok(likes)
    }

    async fn has_liked(&self, user: Uuid, blog: Uuid) -> Result<bool> {
        let tables = self.0.lock();
        Ok(tables
            .likes
            .iter()
            .any(|l| l.user_id == user && l.blog_id == blog))
    }

    async fn insert_resource(&self, resource: Resource) -> Result<Resource> {
        let mut tables = self.0.lock();
        if tables.user(resource.owner_id).is_none() {
            return Err(StoreError::NotFound("User"));
        }
        tables.resources.push(resource.clone());
        Ok(resource)
    }

    async fn resource(&self, id: Uuid) -> Result<Option<Resource>> {
        let tables = self.0.lock();
        Ok(tables.resources.iter().find(|r| r.id == id).cloned())
    }

    async fn delete_resource(&self, id: Uuid) -> Result<()> {
        let mut tables = self.0.lock();
        let index = tables
            .resources
            .iter()
            .position(|r| r.id == id)
            .ok_or(StoreError::NotFound("Resource"))?;
        tables.resources.remove(index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing;

    #[tokio::test]
    async fn duplicate_username_or_email_is_a_conflict() {
        testing::duplicate_username_or_email_is_a_conflict(&InMemoryStore::new()).await;
    }

    #[tokio::test]
    async fn follow_counter_tracks_relations() {
        testing::follow_counter_tracks_relations(&InMemoryStore::new()).await;
    }

    #[tokio::test]
    async fn profile_edit_keeps_a_concurrent_block() {
        testing::profile_edit_keeps_a_concurrent_block(&InMemoryStore::new()).await;
    }

    #[tokio::test]
    async fn post_edit_keeps_a_concurrent_unpublish() {
        testing::post_edit_keeps_a_concurrent_unpublish(&InMemoryStore::new()).await;
    }

    #[tokio::test]
    async fn taken_username_is_rejected_on_update() {
        testing::taken_username_is_rejected_on_update(&InMemoryStore::new()).await;
    }

    #[tokio::test]
    async fn like_counter_tracks_relations() {
        testing::like_counter_tracks_relations(&InMemoryStore::new()).await;
    }

    #[tokio::test]
    async fn search_ignores_case_and_inactive_authors() {
        testing::search_ignores_case_and_inactive_authors(&InMemoryStore::new()).await;
    }

    #[tokio::test]
    async fn deleting_an_account_restores_counters() {
        testing::deleting_an_account_restores_counters(&InMemoryStore::new()).await;
    }
}
