// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use alcodemy_blog::store::{BlogStore, UserPatch};
use axum::http::{Method, StatusCode};
use common::{Account, TestApp};
use expect_test::expect;
use serde_json::json;

mod common;

async fn follow(app: &TestApp, follower: &Account, author: &Account) -> common::Response {
    app.call(
        Method::POST,
        "/api/v1/follower/follow",
        Some(&follower.token),
        Some(json!({ "authorId": author.id, "blogId": "" })),
    )
    .await
}

async fn followers_of(app: &TestApp, account: &Account) -> i64 {
    app.user(account.id).await.unwrap().followers
}

#[tokio::test]
async fn follow_then_unfollow_restores_the_counter() {
    let app = TestApp::new();
    let author = app.register("author01").await;
    let reader = app.register("reader01").await;

    let followed = follow(&app, &reader, &author).await;
    assert_eq!(followed.status, StatusCode::OK);
    assert_eq!(followers_of(&app, &author).await, 1);

    let again = follow(&app, &reader, &author).await;
    assert_eq!(again.status, StatusCode::CONFLICT);
    expect!["You are already following this author"].assert_eq(again.message());
    assert_eq!(followers_of(&app, &author).await, 1);

    let id = followed.body["follow"]["id"].as_str().unwrap();
    let unfollowed = app
        .call(
            Method::DELETE,
            &format!("/api/v1/follower/unfollow/{id}"),
            Some(&reader.token),
            None,
        )
        .await;
    assert_eq!(unfollowed.status, StatusCode::OK);
    assert_eq!(followers_of(&app, &author).await, 0);
}

#[tokio::test]
async fn someone_elses_follow_cannot_be_removed() {
    let app = TestApp::new();
    let author = app.register("author01").await;
    let reader = app.register("reader01").await;
    let other = app.register("other001").await;

    let followed = follow(&app, &reader, &author).await;
    let id: uuid::Uuid = followed.body["follow"]["id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();

    let response = app
        .call(
            Method::DELETE,
            &format!("/api/v1/follower/unfollow/{id}"),
            Some(&other.token),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    expect!["Unauthorized request"].assert_eq(response.message());
    assert!(app.store.follow_by_id(id).await.unwrap().is_some());
    assert_eq!(followers_of(&app, &author).await, 1);
}

#[tokio::test]
async fn follow_rules() {
    let app = TestApp::new();
    let author = app.register("author01").await;
    let reader = app.register("reader01").await;

    let yourself = follow(&app, &author, &author).await;
    assert_eq!(yourself.status, StatusCode::BAD_REQUEST);

    let no_author = app
        .call(
            Method::POST,
            "/api/v1/follower/follow",
            Some(&reader.token),
            Some(json!({})),
        )
        .await;
    assert_eq!(no_author.status, StatusCode::BAD_REQUEST);

    let unknown_post = app
        .call(
            Method::POST,
            "/api/v1/follower/follow",
            Some(&reader.token),
            Some(json!({ "authorId": author.id, "blogId": uuid::Uuid::new_v4() })),
        )
        .await;
    assert_eq!(unknown_post.status, StatusCode::NOT_FOUND);
    assert_eq!(followers_of(&app, &author).await, 0);

    app.update_user(author.id, UserPatch::closed(true)).await;
    let closed = follow(&app, &reader, &author).await;
    assert_eq!(closed.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn followers_are_paginated() {
    let app = TestApp::new();
    let author = app.register("author01").await;
    for name in ["reader01", "reader02", "reader03"] {
        let reader = app.register(name).await;
        assert_eq!(follow(&app, &reader, &author).await.status, StatusCode::OK);
    }

    let uri = format!("/api/v1/followers?userId={}&limit=2", author.id);
    let first = app.call(Method::GET, &uri, Some(&author.token), None).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["followers"].as_array().unwrap().len(), 2);
    assert_eq!(first.body["hasMore"], json!(true));
    assert_eq!(first.body["totalFollowers"], json!(3));

    let rest = app
        .call(
            Method::GET,
            &format!("{uri}&skip=2"),
            Some(&author.token),
            None,
        )
        .await;
    assert_eq!(rest.body["followers"].as_array().unwrap().len(), 1);
    assert_eq!(rest.body["hasMore"], json!(false));

    let missing = app
        .call(Method::GET, "/api/v1/followers", Some(&author.token), None)
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn like_and_unlike_move_the_counter_by_one() {
    let app = TestApp::new();
    let author = app.verified("author01").await;
    let reader = app.register("reader01").await;
    let post = app.publish(&author, "Likeable").await;
    let like_uri = format!("/api/v1/like/{post}");
    let unlike_uri = format!("/api/v1/dislike/{post}");

    let liked = app
        .call(Method::POST, &like_uri, Some(&reader.token), None)
        .await;
    assert_eq!(liked.status, StatusCode::OK);
    assert_eq!(liked.body["likes"], json!(1));

    let twice = app
        .call(Method::POST, &like_uri, Some(&reader.token), None)
        .await;
    assert_eq!(twice.status, StatusCode::CONFLICT);
    expect!["You have already liked this post"].assert_eq(twice.message());
    assert_eq!(app.store.post(post).await.unwrap().unwrap().likes, 1);

    let status = app
        .call(Method::GET, &like_uri, Some(&reader.token), None)
        .await;
    assert_eq!(status.body["liked"], json!(true));
    assert_eq!(status.body["likes"], json!(1));

    let unliked = app
        .call(Method::DELETE, &unlike_uri, Some(&reader.token), None)
        .await;
    assert_eq!(unliked.status, StatusCode::OK);
    assert_eq!(unliked.body["likes"], json!(0));

    let not_liked = app
        .call(Method::DELETE, &unlike_uri, Some(&reader.token), None)
        .await;
    assert_eq!(not_liked.status, StatusCode::NOT_FOUND);
    assert_eq!(app.store.post(post).await.unwrap().unwrap().likes, 0);
}

#[tokio::test]
async fn drafts_cannot_be_liked() {
    let app = TestApp::new();
    let author = app.verified("author01").await;
    let reader = app.register("reader01").await;
    let post = app.publish(&author, "Soon").await;

    let unpublished = app
        .call(
            Method::PATCH,
            &format!("/api/v1/blogs/unpublish/{post}"),
            Some(&author.token),
            None,
        )
        .await;
    assert_eq!(unpublished.status, StatusCode::OK);

    let response = app
        .call(
            Method::POST,
            &format!("/api/v1/like/{post}"),
            Some(&reader.token),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn drafts_cannot_be_commented_on() {
    let app = TestApp::new();
    let author = app.verified("author01").await;
    let reader = app.verified("reader01").await;
    let post = app.publish(&author, "Soon").await;

    let unpublished = app
        .call(
            Method::PATCH,
            &format!("/api/v1/blogs/unpublish/{post}"),
            Some(&author.token),
            None,
        )
        .await;
    assert_eq!(unpublished.status, StatusCode::OK);

    let response = app
        .call(
            Method::POST,
            "/api/v1/comments",
            Some(&reader.token),
            Some(json!({ "blogId": post, "comment": "first!" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    expect!["BlogId is invalid"].assert_eq(response.message());
    assert!(app.store.comments_for_post(post).await.unwrap().is_empty());
}
