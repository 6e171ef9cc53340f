// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use alcodemy_blog::auth::Sessions;
use alcodemy_blog::config::BlogConfig;
use alcodemy_blog::store::{BlogStore, Role};
use axum::http::{Method, StatusCode};
use common::{TestApp, GOOGLE_CREDENTIAL, PASSWORD};
use expect_test::expect;
use serde_json::json;

mod common;

/// The hex token following `marker` in an email body.
fn token_after<'a>(html: &'a str, marker: &str) -> &'a str {
    let start = html.find(marker).expect("marker in email") + marker.len();
    let rest = &html[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_hexdigit())
        .unwrap_or(rest.len());
    &rest[..end]
}

#[tokio::test]
async fn duplicate_email_is_rejected_without_creating_an_account() {
    let app = TestApp::new();
    app.register("alice01").await;

    let response = app
        .call(
            Method::POST,
            "/api/v1/user/register",
            None,
            Some(json!({
                "username": "alice02",
                "email": "ALICE01@example.com",
                "firstName": "Alice",
                "lastName": "Again",
                "password": PASSWORD,
            })),
        )
        .await;

    assert_eq!(response.status, StatusCode::CONFLICT);
    expect!["Email already registered"].assert_eq(response.message());
    assert!(app.store.user_by_username("alice02").await.unwrap().is_none());
}

#[tokio::test]
async fn registration_validates_fields_before_anything_else() {
    let app = TestApp::new();

    let missing = app
        .call(
            Method::POST,
            "/api/v1/user/register",
            None,
            Some(json!({ "username": "alice01" })),
        )
        .await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    expect!["All fields are mandatory."].assert_eq(missing.message());

    let short = app
        .call(
            Method::POST,
            "/api/v1/user/register",
            None,
            Some(json!({
                "username": "alice01",
                "email": "alice@example.com",
                "firstName": "Alice",
                "lastName": "Liddell",
                "password": "short",
            })),
        )
        .await;
    assert_eq!(short.status, StatusCode::BAD_REQUEST);
    expect!["Password must be at least 8 characters"].assert_eq(short.message());
}

#[tokio::test]
async fn login_sets_a_cookie_only_for_the_right_password() {
    let app = TestApp::new();
    let alice = app.register("alice01").await;

    let wrong = app
        .call(
            Method::POST,
            "/api/v1/user/login",
            None,
            Some(json!({ "username": "alice01", "password": "not-the-password" })),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert!(wrong.session_cookie().is_none());
    expect!["Email or Password do not match or user does not exist"].assert_eq(wrong.message());

    let right = app
        .call(
            Method::POST,
            "/api/v1/user/login",
            None,
            Some(json!({ "username": "Alice01", "password": PASSWORD })),
        )
        .await;
    assert_eq!(right.status, StatusCode::OK);
    assert!(right.session_cookie().unwrap().contains("HttpOnly"));

    let token = right.body["token"].as_str().unwrap();
    let sessions = Sessions::new(b"integration-secret", BlogConfig::for_testing().token_ttl);
    let claims = sessions.verify(token).unwrap();
    assert_eq!(claims.id, alice.id);
    assert_eq!(claims.role, Role::User);
}

#[tokio::test]
async fn missing_or_forged_tokens_are_unauthenticated() {
    let app = TestApp::new();

    let anonymous = app.call(Method::POST, "/api/v1/user/verify", None, None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    expect![[r#"{"success":false,"message":"Unauthorized request"}"#]]
        .assert_eq(&anonymous.body.to_string());

    let forged = app
        .call(Method::POST, "/api/v1/user/verify", Some("not.a.jwt"), None)
        .await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_clears_the_cookie() {
    let app = TestApp::new();
    let alice = app.register("alice01").await;

    let response = app
        .call(Method::POST, "/api/v1/user/logout", Some(&alice.token), None)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    expect!["User logged Out successfully"].assert_eq(response.message());
    assert!(response.session_cookie().unwrap().contains("Max-Age=0"));
}

#[tokio::test]
async fn reset_token_works_exactly_once() {
    let app = TestApp::new();
    let alice = app.register("alice01").await;

    let response = app
        .call(
            Method::POST,
            "/api/v1/user/forgot-password",
            None,
            Some(json!({ "email": "alice01@example.com" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let mail = app
        .mailer
        .sent()
        .into_iter()
        .find(|m| m.subject == "Reset Password")
        .unwrap();
    let token = token_after(&mail.html, "reset-password/").to_owned();
    assert_eq!(token.len(), 40);

    let stored = app.user(alice.id).await.unwrap();
    assert_ne!(stored.reset_token.as_deref(), Some(token.as_str()));

    let uri = format!("/api/v1/user/reset/{token}");
    let reset = app
        .call(
            Method::POST,
            &uri,
            None,
            Some(json!({ "password": "brand-new-password" })),
        )
        .await;
    assert_eq!(reset.status, StatusCode::OK);
    expect!["Password changed successfully"].assert_eq(reset.message());

    let reused = app
        .call(
            Method::POST,
            &uri,
            None,
            Some(json!({ "password": "another-password" })),
        )
        .await;
    assert_eq!(reused.status, StatusCode::BAD_REQUEST);
    expect!["Token is invalid or expired, please try again"].assert_eq(reused.message());

    let login = app
        .call(
            Method::POST,
            "/api/v1/user/login",
            None,
            Some(json!({ "username": "alice01", "password": "brand-new-password" })),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
}

#[tokio::test]
async fn failed_reset_email_leaves_no_token_behind() {
    let app = TestApp::new();
    let alice = app.register("alice01").await;
    app.mailer.set_failing(true);

    let response = app
        .call(
            Method::POST,
            "/api/v1/user/forgot-password",
            None,
            Some(json!({ "email": "alice01@example.com" })),
        )
        .await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(app.user(alice.id).await.unwrap().reset_token.is_none());
}

#[tokio::test]
async fn email_verification_round_trip() {
    let app = TestApp::new();
    let alice = app.register("alice01").await;

    let response = app
        .call(Method::POST, "/api/v1/user/verify", Some(&alice.token), None)
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let mail = app
        .mailer
        .sent()
        .into_iter()
        .find(|m| m.subject == "Verify account in Alcodemy Blog")
        .unwrap();
    let token = token_after(&mail.html, "verify/alice01/").to_owned();

    let wrong_user = app
        .call(
            Method::PATCH,
            &format!("/api/v1/user/profile/someoneelse/verify/{token}"),
            None,
            None,
        )
        .await;
    assert_eq!(wrong_user.status, StatusCode::BAD_REQUEST);

    let verified = app
        .call(
            Method::PATCH,
            &format!("/api/v1/user/profile/alice01/verify/{token}"),
            None,
            None,
        )
        .await;
    assert_eq!(verified.status, StatusCode::OK);
    expect!["Account Verified Successfully"].assert_eq(verified.message());
    assert!(app.user(alice.id).await.unwrap().is_verified);

    let again = app
        .call(Method::POST, "/api/v1/user/verify", Some(&alice.token), None)
        .await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn change_password_rules() {
    let app = TestApp::new();
    let alice = app.verified("alice01").await;

    let same = app
        .call(
            Method::POST,
            "/api/v1/user/change-password",
            Some(&alice.token),
            Some(json!({ "oldPassword": PASSWORD, "newPassword": PASSWORD })),
        )
        .await;
    assert_eq!(same.status, StatusCode::BAD_REQUEST);
    expect!["New Password can not be the same as Old Password"].assert_eq(same.message());

    let wrong = app
        .call(
            Method::POST,
            "/api/v1/user/change-password",
            Some(&alice.token),
            Some(json!({ "oldPassword": "not-it-at-all", "newPassword": "next-password" })),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::BAD_REQUEST);
    expect!["Invalid old password"].assert_eq(wrong.message());

    let changed = app
        .call(
            Method::POST,
            "/api/v1/user/change-password",
            Some(&alice.token),
            Some(json!({ "oldPassword": PASSWORD, "newPassword": "next-password" })),
        )
        .await;
    assert_eq!(changed.status, StatusCode::OK);
}

#[tokio::test]
async fn google_sign_in_creates_then_reuses_a_verified_account() {
    let app = TestApp::new();

    let first = app
        .call(
            Method::POST,
            "/api/v1/user/google/auth",
            None,
            Some(json!({ "credential": GOOGLE_CREDENTIAL })),
        )
        .await;
    assert_eq!(first.status, StatusCode::CREATED, "{:?}", first.body);
    assert_eq!(first.body["user"]["isVerified"], json!(true));
    assert!(first.session_cookie().is_some());

    let second = app
        .call(
            Method::POST,
            "/api/v1/user/google/auth",
            None,
            Some(json!({ "credential": GOOGLE_CREDENTIAL })),
        )
        .await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(first.body["user"]["id"], second.body["user"]["id"]);

    let rejected = app
        .call(
            Method::POST,
            "/api/v1/user/google/auth",
            None,
            Some(json!({ "credential": "forged" })),
        )
        .await;
    assert_eq!(rejected.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn quotas_are_enforced_per_route() {
    let mut config = BlogConfig::for_testing();
    config.rate_limits.enabled = true;
    let app = TestApp::with_config(config);

    for _ in 0..10 {
        let response = app
            .call(Method::POST, "/api/v1/user/login", None, Some(json!({})))
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
    }

    let limited = app
        .call(Method::POST, "/api/v1/user/login", None, Some(json!({})))
        .await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    expect![[r#"{"success":false,"message":"Max request exceeded. Please try again after 10 minutes"}"#]]
        .assert_eq(&limited.body.to_string());

    let elsewhere = app
        .call(
            Method::POST,
            "/api/v1/user/forgot-password",
            None,
            Some(json!({})),
        )
        .await;
    assert_eq!(elsewhere.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn ping_and_unknown_routes() {
    let app = TestApp::new();

    let pong = app.call(Method::GET, "/ping", None, None).await;
    assert_eq!(pong.status, StatusCode::OK);
    assert_eq!(pong.body, json!("Pong"));

    let missing = app.call(Method::GET, "/api/v1/nowhere", None, None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    expect!["Route not found"].assert_eq(missing.message());
}
