// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Scenarios every [BlogStore] backend must pass. Each backend's test module runs them against a
//! fresh store.

use chrono::Utc;
use uuid::Uuid;

use super::{
    Avatar, BlogStore, Follow, Image, Like, Post, PostPatch, Role, StoreError, User, UserPatch,
    DUPLICATE_EMAIL, DUPLICATE_USERNAME,
};

pub(crate) fn user(username: &str) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        username: username.to_owned(),
        email: format!("{username}@example.com"),
        password_hash: String::new(),
        first_name: "Test".to_owned(),
        last_name: "User".to_owned(),
        bio: String::new(),
        avatar: Avatar {
            public_id: String::new(),
            secure_url: String::new(),
        },
        role: Role::User,
        is_blocked: false,
        is_verified: true,
        is_closed: false,
        followers: 0,
        reset_token: None,
        reset_token_expiry: None,
        verify_token: None,
        verify_token_expiry: None,
        created_at: now,
        updated_at: now,
    }
}

fn post(author: Uuid, title: &str, tags: &[&str]) -> Post {
    let now = Utc::now();
    let id = Uuid::new_v4();
    Post {
        id,
        slug: format!("{title}-{id}"),
        title: title.to_owned(),
        content: serde_json::json!({"blocks": []}),
        author_id: author,
        is_published: true,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        seo_keywords: String::new(),
        meta_description: String::new(),
        image: None,
        likes: 0,
        created_at: now,
        updated_at: now,
    }
}

fn follow(follower: Uuid, author: Uuid) -> Follow {
    Follow {
        id: Uuid::new_v4(),
        follower_id: follower,
        author_id: author,
        blog_id: None,
        created_at: Utc::now(),
    }
}

fn like(user: Uuid, blog: Uuid) -> Like {
    Like {
        id: Uuid::new_v4(),
        user_id: user,
        blog_id: blog,
        created_at: Utc::now(),
    }
}

pub(crate) async fn duplicate_username_or_email_is_a_conflict(store: &impl BlogStore) {
    let alice = store.insert_user(user("alice01")).await.unwrap();

    let err = store.insert_user(user("alice01")).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(m) if m == DUPLICATE_USERNAME));

    let mut other = user("bobbyb");
    other.email = alice.email.clone();
    let err = store.insert_user(other).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(m) if m == DUPLICATE_EMAIL));
}

pub(crate) async fn follow_counter_tracks_relations(store: &impl BlogStore) {
    let author = store.insert_user(user("author1")).await.unwrap();
    let reader = store.insert_user(user("reader1")).await.unwrap();

    let relation = store.follow(follow(reader.id, author.id)).await.unwrap();
    assert_eq!(store.user(author.id).await.unwrap().unwrap().followers, 1);

    let err = store.follow(follow(reader.id, author.id)).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
    assert_eq!(store.user(author.id).await.unwrap().unwrap().followers, 1);

    store.unfollow(relation.id).await.unwrap();
    assert_eq!(store.user(author.id).await.unwrap().unwrap().followers, 0);
    assert!(matches!(
        store.unfollow(relation.id).await.unwrap_err(),
        StoreError::NotFound("Follow")
    ));
}

pub(crate) async fn profile_edit_keeps_a_concurrent_block(store: &impl BlogStore) {
    let author = store.insert_user(user("author1")).await.unwrap();
    let reader = store.insert_user(user("reader1")).await.unwrap();
    store.follow(follow(reader.id, author.id)).await.unwrap();

    // Handler reads the profile, an admin blocks, then the edit lands.
    let read = store.user(author.id).await.unwrap().unwrap();
    store
        .update_user(author.id, UserPatch::blocked(true))
        .await
        .unwrap();
    let patch = UserPatch {
        bio: Some("Writes about Rust".to_owned()),
        ..UserPatch::default()
    };
    let updated = store.update_user(read.id, patch).await.unwrap();

    assert_eq!(updated.bio, "Writes about Rust");
    assert!(updated.is_blocked);
    assert_eq!(updated.followers, 1);
}

pub(crate) async fn post_edit_keeps_a_concurrent_unpublish(store: &impl BlogStore) {
    let author = store.insert_user(user("author1")).await.unwrap();
    let reader = store.insert_user(user("reader1")).await.unwrap();
    let created = store.insert_post(post(author.id, "hello", &[])).await.unwrap();
    assert!(created.is_published);

    store
        .update_post(created.id, PostPatch::published(false))
        .await
        .unwrap();
    store.like(like(reader.id, created.id)).await.unwrap();
    let patch = PostPatch {
        title: Some("hello again".to_owned()),
        ..PostPatch::default()
    };
    let updated = store.update_post(created.id, patch).await.unwrap();

    assert_eq!(updated.title, "hello again");
    assert!(!updated.is_published);
    assert_eq!(updated.likes, 1);
}

pub(crate) async fn taken_username_is_rejected_on_update(store: &impl BlogStore) {
    store.insert_user(user("alice01")).await.unwrap();
    let bob = store.insert_user(user("bobbyb")).await.unwrap();

    let patch = UserPatch {
        username: Some("alice01".to_owned()),
        ..UserPatch::default()
    };
    let err = store.update_user(bob.id, patch).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(m) if m == DUPLICATE_USERNAME));
    assert_eq!(store.user(bob.id).await.unwrap().unwrap().username, "bobbyb");
}

pub(crate) async fn like_counter_tracks_relations(store: &impl BlogStore) {
    let author = store.insert_user(user("author1")).await.unwrap();
    let reader = store.insert_user(user("reader1")).await.unwrap();
    let post = store.insert_post(post(author.id, "hello", &[])).await.unwrap();

    assert_eq!(store.like(like(reader.id, post.id)).await.unwrap(), 1);
    assert_eq!(store.like(like(author.id, post.id)).await.unwrap(), 2);
    assert!(matches!(
        store.like(like(reader.id, post.id)).await.unwrap_err(),
        StoreError::Conflict(_)
    ));

    assert_eq!(store.unlike(reader.id, post.id).await.unwrap(), 1);
    assert!(!store.has_liked(reader.id, post.id).await.unwrap());
    assert!(store.has_liked(author.id, post.id).await.unwrap());
    assert!(matches!(
        store.unlike(reader.id, post.id).await.unwrap_err(),
        StoreError::NotFound("Like")
    ));
}

pub(crate) async fn search_ignores_case_and_inactive_authors(store: &impl BlogStore) {
    let active = store.insert_user(user("author1")).await.unwrap();
    let mut blocked = user("author2");
    blocked.is_blocked = true;
    let blocked = store.insert_user(blocked).await.unwrap();

    store
        .insert_post(post(active.id, "Learning Rust", &["systems"]))
        .await
        .unwrap();
    store
        .insert_post(post(active.id, "Gardening", &["RUSTIC"]))
        .await
        .unwrap();
    store
        .insert_post(post(blocked.id, "Rust for spammers", &[]))
        .await
        .unwrap();

    let found = store.search_posts("rust", 0, 10).await.unwrap();
    let mut titles: Vec<_> = found.iter().map(|p| p.title.as_str()).collect();
    titles.sort();
    assert_eq!(titles, ["Gardening", "Learning Rust"]);
}

pub(crate) async fn deleting_an_account_restores_counters(store: &impl BlogStore) {
    let author = store.insert_user(user("author1")).await.unwrap();
    let leaving = store.insert_user(user("leaving")).await.unwrap();

    let kept = store.insert_post(post(author.id, "kept", &[])).await.unwrap();
    let mut own = post(leaving.id, "gone", &[]);
    own.image = Some(Image {
        resource_id: "blog/gone.png".to_owned(),
        resource_url: "http://cdn/blog/gone.png".to_owned(),
    });
    let own = store.insert_post(own).await.unwrap();

    store.follow(follow(leaving.id, author.id)).await.unwrap();
    store.follow(follow(author.id, leaving.id)).await.unwrap();
    store.like(like(leaving.id, kept.id)).await.unwrap();
    store.like(like(author.id, own.id)).await.unwrap();

    let cascade = store.delete_user(leaving.id).await.unwrap();
    assert_eq!(cascade.posts, 1);
    assert_eq!(cascade.assets, ["blog/gone.png"]);

    let author = store.user(author.id).await.unwrap().unwrap();
    assert_eq!(author.followers, 0);
    assert_eq!(store.post(kept.id).await.unwrap().unwrap().likes, 0);
    assert!(store.post(own.id).await.unwrap().is_none());
    assert!(store.followers(author.id, 0, 10).await.unwrap().is_empty());
}
