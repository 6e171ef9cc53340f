// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use axum_extra::extract::cookie::{Cookie, SameSite};

use crate::auth::SESSION_COOKIE;
use crate::config::BlogConfig;
use crate::error::ApiError;
use crate::media::TempUpload;
use crate::rate_limit::{RateLimits, RouteQuota};
use crate::BlogService;

mod blogs;
mod comments;
mod misc;
mod resources;
mod social;
mod users;

pub(crate) use misc::ping;

/// Pages of listings are clamped to this many rows.
const MAX_PAGE: i64 = 50;
const DEFAULT_PAGE: i64 = 10;

/// Every route of the API, relative to `/api/v1`.
pub(crate) fn router(limits: RateLimits) -> Router<BlogService> {
    let q = RouteQuota::new;

    let feed = limits.apply(q(1, 120), get(blogs::feed));
    let new_comment = limits.apply(q(15, 60), post(comments::create));
    let upload = limits.apply(q(60, 30), post(resources::upload));

    Router::new()
        .route("/user/register", limits.apply(q(15, 5), post(users::register)))
        .route("/user/login", limits.apply(q(10, 10), post(users::login)))
        .route("/user/logout", limits.apply(q(10, 10), post(users::logout)))
        .route(
            "/user/refresh-token",
            limits.apply(q(15, 10), post(users::refresh_token)),
        )
        .route(
            "/user/forgot-password",
            limits.apply(q(60, 5), post(users::forgot_password)),
        )
        .route(
            "/user/reset/:reset_token",
            limits.apply(q(60, 5), post(users::reset_password)),
        )
        .route(
            "/user/change-password",
            limits.apply(q(60, 5), post(users::change_password)),
        )
        .route(
            "/user/verify",
            limits.apply(q(60, 5), post(users::send_verification)),
        )
        .route(
            "/user/profile/:username/verify/:token",
            limits.apply(q(60, 5), patch(users::verify_account)),
        )
        .route(
            "/user/profile",
            limits
                .apply(q(5, 25), get(users::list_users))
                .merge(limits.apply(q(60, 8), patch(users::update_profile))),
        )
        .route(
            "/user/profile/search",
            limits.apply(q(60, 40), get(users::search_users)),
        )
        .route(
            "/user/profile/close",
            limits.apply(q(60, 5), patch(users::close_account)),
        )
        .route(
            "/user/profile/:username",
            limits
                .apply(q(15, 30), get(users::profile).post(users::profile))
                .merge(limits.apply(q(60, 15), delete(users::delete_account))),
        )
        .route(
            "/user/profile/:username/block",
            limits.apply(q(60, 30), patch(users::block)),
        )
        .route(
            "/user/profile/:username/unblock",
            limits.apply(q(60, 30), patch(users::unblock)),
        )
        .route(
            "/user/google/auth",
            limits.apply(q(10, 10), post(users::google_auth)),
        )
        .route("/blogs", feed.clone())
        .route("/blogs/", feed)
        .route("/blogs/create", limits.apply(q(60, 30), post(blogs::create)))
        .route("/blogs/tag", limits.apply(q(1, 120), post(blogs::search)))
        .route(
            "/blogs/publish/:id",
            limits.apply(q(60, 60), patch(blogs::publish)),
        )
        .route(
            "/blogs/unpublish/:id",
            limits.apply(q(60, 60), patch(blogs::unpublish)),
        )
        .route(
            "/blogs/:id",
            limits
                .apply(q(1, 120), get(blogs::read))
                .merge(limits.apply(q(60, 60), put(blogs::update).delete(blogs::remove))),
        )
        .route(
            "/blogs/:id/summary",
            limits.apply(q(60, 20), get(blogs::summary)),
        )
        .route("/comments", new_comment.clone())
        .route("/comments/", new_comment)
        .route(
            "/comments/:comment_id",
            limits.apply(q(15, 60), put(comments::edit).delete(comments::remove)),
        )
        .route(
            "/follower/follow",
            limits.apply(q(15, 60), post(social::follow)),
        )
        .route(
            "/follower/unfollow/:follow_id",
            limits.apply(q(15, 60), delete(social::unfollow)),
        )
        .route("/followers", limits.apply(q(15, 60), get(social::followers)))
        .route(
            "/like/:post_id",
            limits.apply(q(15, 120), get(social::like_status).post(social::like)),
        )
        .route(
            "/dislike/:post_id",
            limits.apply(q(15, 120), delete(social::unlike)),
        )
        .route("/resource", upload.clone())
        .route("/resource/", upload)
        .route(
            "/resource/:id",
            limits.apply(q(60, 30), delete(resources::remove)),
        )
        .route("/contact", limits.apply(q(60, 5), post(misc::contact)))
}

fn session_cookie(config: &BlogConfig, token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.secure_cookies)
        .max_age(time::Duration::seconds(config.token_ttl.as_secs() as i64))
        .build()
}

fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}

/// Clamps a requested page size, defaulting when absent.
fn page_size(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE)
}

fn ensure_image(upload: Option<&TempUpload>) -> Result<(), ApiError> {
    match upload {
        Some(file) if !file.is_image() => Err(ApiError::validation("Only image files are allowed")),
        _ => Ok(()),
    }
}

/// A link into the frontend application.
fn frontend_link(config: &BlogConfig, path: &str) -> String {
    format!(
        "{}/{}",
        config.frontend_url.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
