// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use alcodemy_blog::config::BlogConfig;
use alcodemy_blog::mailer::MemoryMailer;
use alcodemy_blog::media::Media;
use alcodemy_blog::oauth::{FixedIdentities, Identity};
use alcodemy_blog::store::{BlogStore, InMemoryStore, Role, User, UserPatch};
use alcodemy_blog::{telemetry, BlogService};
use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use object_store::memory::InMemory;
use object_store::ObjectStore;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "correct-horse";
pub const GOOGLE_CREDENTIAL: &str = "google-id-token";
pub const BOUNDARY: &str = "alcodemy-test-boundary";

pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl Response {
    pub fn message(&self) -> &str {
        self.body["message"].as_str().unwrap_or_default()
    }

    /// The `Set-Cookie` header for the session cookie, if any.
    pub fn session_cookie(&self) -> Option<&str> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with("token="))
    }
}

/// A signed-in account.
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub token: String,
}

/// The full router over in-memory storage, media and mail.
pub struct TestApp {
    pub store: InMemoryStore,
    pub objects: Arc<InMemory>,
    pub mailer: Arc<MemoryMailer>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(BlogConfig::for_testing())
    }

    pub fn with_config(config: BlogConfig) -> Self {
        telemetry::init_for_testing();

        let store = InMemoryStore::new();
        let objects = Arc::new(InMemory::new());
        let mailer = Arc::new(MemoryMailer::new());
        let media = Media::new(objects.clone(), "http://media.test", Duration::from_secs(5));

        let identities = FixedIdentities::default().with(
            GOOGLE_CREDENTIAL,
            Identity {
                subject: "1234567890".to_owned(),
                email: "grace.hopper@example.com".to_owned(),
                email_verified: true,
                given_name: "Grace".to_owned(),
                family_name: "Hopper".to_owned(),
                picture: Some("https://example.com/grace.png".to_owned()),
            },
        );

        let mut service =
            BlogService::new(config, Arc::new(store.clone()), media, b"integration-secret");
        service.with_mailer(mailer.clone());
        service.with_identity_provider(Arc::new(identities));

        Self {
            store,
            objects,
            mailer,
            router: service.into_router(),
        }
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::COOKIE, format!("token={token}"));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        self.send(request).await
    }

    /// Sends a multipart form with one file part.
    pub async fn upload(
        &self,
        method: Method,
        uri: &str,
        token: &str,
        fields: &[(&str, &str)],
        file: (&str, &str, &str, &[u8]),
    ) -> Response {
        let (field, file_name, content_type, contents) = file;
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n\
                     {value}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; \
                 filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(contents);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::COOKIE, format!("token={token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();

        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> Response {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        Response {
            status,
            headers,
            body,
        }
    }

    pub async fn register(&self, username: &str) -> Account {
        let response = self
            .call(
                Method::POST,
                "/api/v1/user/register",
                None,
                Some(json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "firstName": "Test",
                    "lastName": "User",
                    "password": PASSWORD,
                })),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);

        Account {
            id: response.body["user"]["id"].as_str().unwrap().parse().unwrap(),
            username: username.to_owned(),
            token: response.body["token"].as_str().unwrap().to_owned(),
        }
    }

    /// Registers an account whose email address is already verified.
    pub async fn verified(&self, username: &str) -> Account {
        let account = self.register(username).await;
        let patch = UserPatch {
            is_verified: Some(true),
            ..UserPatch::default()
        };
        self.update_user(account.id, patch).await;
        account
    }

    pub async fn admin(&self, username: &str) -> Account {
        let account = self.register(username).await;
        let patch = UserPatch {
            is_verified: Some(true),
            role: Some(Role::Admin),
            ..UserPatch::default()
        };
        self.update_user(account.id, patch).await;
        account
    }

    pub async fn user(&self, id: Uuid) -> Option<User> {
        self.store.user(id).await.unwrap()
    }

    pub async fn update_user(&self, id: Uuid, patch: UserPatch) {
        self.store.update_user(id, patch).await.unwrap();
    }

    /// Creates a published post and returns its id.
    pub async fn publish(&self, author: &Account, title: &str) -> Uuid {
        let response = self
            .call(
                Method::POST,
                "/api/v1/blogs/create",
                Some(&author.token),
                Some(json!({
                    "title": title,
                    "content": "Some words about the topic.",
                    "tags": ["rust", "web"],
                    "seoKeywords": "rust",
                    "metaDescription": "A post",
                    "isPublished": true,
                })),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
        response.body["post"]["id"].as_str().unwrap().parse().unwrap()
    }

    pub async fn object_count(&self) -> usize {
        use futures::TryStreamExt;
        self.objects
            .list(None)
            .try_collect::<Vec<_>>()
            .await
            .unwrap()
            .len()
    }
}
