// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Request extractors that authenticate the caller and enforce account state. A handler declares
//! what it needs by taking one of [Session], [ActiveUser], [VerifiedUser] or [AdminUser].
//!
//! The token only identifies the caller: the account is re-read on every request and all status
//! checks use the stored flags, so blocking or closing an account takes effect immediately.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum_extra::extract::CookieJar;
use tracing::debug;
use uuid::Uuid;

use crate::error::{ApiError, UNAUTHORIZED};
use crate::store::User;
use crate::BlogService;

pub const SESSION_COOKIE: &str = "token";

pub const BLOCKED: &str = "Your account has been blocked. Please contact support";
pub const CLOSED: &str = "This account has been closed.";
pub const UNVERIFIED: &str = "Please verify your account to continue";
pub const NOT_ADMIN: &str = "You don't have permission to view this route";
pub const NOT_OWNER: &str = "You don't have permission to perform this action.";

/// Any authenticated caller, whatever the state of their account.
#[derive(Debug, Clone)]
pub struct Session(pub User);

/// An authenticated caller whose account is neither blocked nor closed.
#[derive(Debug, Clone)]
pub struct ActiveUser(pub User);

/// An active caller who has verified their email address.
#[derive(Debug, Clone)]
pub struct VerifiedUser(pub User);

/// An active administrator.
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

/// The session token, from the `token` cookie or else an `Authorization: Bearer` header.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE).filter(|c| !c.value().is_empty()) {
        return Some(cookie.value().to_owned());
    }

    let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
}

pub fn ensure_active(user: &User) -> Result<(), ApiError> {
    if user.is_blocked {
        return Err(ApiError::forbidden(BLOCKED));
    }
    if user.is_closed {
        return Err(ApiError::forbidden(CLOSED));
    }
    Ok(())
}

pub fn ensure_verified(user: &User) -> Result<(), ApiError> {
    ensure_active(user)?;
    if !user.is_verified {
        return Err(ApiError::forbidden(UNVERIFIED));
    }
    Ok(())
}

pub fn ensure_admin(user: &User) -> Result<(), ApiError> {
    ensure_active(user)?;
    if !user.is_admin() {
        return Err(ApiError::forbidden(NOT_ADMIN));
    }
    Ok(())
}

pub fn ensure_author_or_admin(caller: &User, owner: Uuid) -> Result<(), ApiError> {
    if caller.id == owner || caller.is_admin() {
        Ok(())
    } else {
        Err(ApiError::forbidden(NOT_OWNER))
    }
}

#[async_trait]
impl FromRequestParts<BlogService> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &BlogService,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers)
            .ok_or_else(|| ApiError::unauthenticated(UNAUTHORIZED))?;

        let claims = state.sessions.verify(&token).map_err(|e| {
            debug!("Rejected session token: {e}");
            ApiError::from(e)
        })?;

        let user = state
            .store
            .user(claims.id)
            .await?
            .ok_or_else(|| ApiError::unauthenticated(UNAUTHORIZED))?;

        Ok(Session(user))
    }
}

#[async_trait]
impl FromRequestParts<BlogService> for ActiveUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &BlogService,
    ) -> Result<Self, Self::Rejection> {
        let Session(user) = Session::from_request_parts(parts, state).await?;
        ensure_active(&user)?;
        Ok(ActiveUser(user))
    }
}

#[async_trait]
impl FromRequestParts<BlogService> for VerifiedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &BlogService,
    ) -> Result<Self, Self::Rejection> {
        let Session(user) = Session::from_request_parts(parts, state).await?;
        ensure_verified(&user)?;
        Ok(VerifiedUser(user))
    }
}

#[async_trait]
impl FromRequestParts<BlogService> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &BlogService,
    ) -> Result<Self, Self::Rejection> {
        let Session(user) = Session::from_request_parts(parts, state).await?;
        ensure_admin(&user)?;
        Ok(AdminUser(user))
    }
}
