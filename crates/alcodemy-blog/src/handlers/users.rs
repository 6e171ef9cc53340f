// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use axum::extract::State;
use axum::http::StatusCode;
use axum_extra::extract::CookieJar;
use chrono::Utc;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::{ensure_image, frontend_link, page_size, removal_cookie, session_cookie};
use crate::auth::gate::{ensure_author_or_admin, BLOCKED, NOT_OWNER};
use crate::auth::password::hash_token;
use crate::auth::{ActiveUser, AdminUser, OneTimeToken, Session, VerifiedUser};
use crate::error::{ApiError, Result};
use crate::extract::{Json, Path, Payload, Query};
use crate::mailer;
use crate::store::{Avatar, Post, Role, User, UserPatch, DUPLICATE_EMAIL, DUPLICATE_USERNAME};
use crate::types::{
    paginate, ChangePasswordRequest, EmailRequest, GoogleAuthRequest, ListQuery, LoginRequest,
    NoData, PasswordRequest, ProfileUpdate, RegisterRequest, Reply, SearchQuery, UserView,
    UsernameRequest,
};
use crate::BlogService;

const MIN_USERNAME: usize = 6;
const MIN_PASSWORD: usize = 8;
const PROFILE_POSTS: i64 = 20;
const SEARCH_LIMIT: i64 = 20;
const AVATAR_FOLDER: &str = "blog/user/avatar";

pub(super) static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}$").expect("static email pattern")
});

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SessionData {
    user: UserView,
    token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_info: Option<&'static str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct UserData {
    user: UserView,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ProfileData {
    is_author: bool,
    user: UserView,
    total_followers: i64,
    total_posts: i64,
    posts: Vec<Post>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct UserList {
    users: Vec<UserView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    has_more: Option<bool>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct Deleted {
    orphaned_assets: Vec<String>,
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

fn validate_username(username: &str) -> Result<()> {
    if username.chars().count() < MIN_USERNAME {
        return Err(ApiError::validation(format!(
            "Username must be at least {MIN_USERNAME} characters"
        )));
    }
    if username.chars().any(char::is_whitespace) {
        return Err(ApiError::validation("Username can not contain spaces"));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD {
        return Err(ApiError::validation(format!(
            "Password must be at least {MIN_PASSWORD} characters"
        )));
    }
    Ok(())
}

/// Issues a session for `user`, setting the cookie and returning the token in the body too.
fn sign_in(
    state: &BlogService,
    jar: CookieJar,
    user: &User,
    status: StatusCode,
    message: &str,
    user_info: Option<&'static str>,
) -> Result<(CookieJar, Reply<SessionData>)> {
    let token = state.sessions.issue(user)?;
    let jar = jar.add(session_cookie(&state.config, token.clone()));
    let data = SessionData {
        user: UserView::from(user),
        token,
        user_info,
    };
    let reply = if status == StatusCode::CREATED {
        Reply::created(message, data)
    } else {
        Reply::ok(message, data)
    };
    Ok((jar, reply))
}

/// Mail that should not hold up or fail the request.
fn send_in_background(state: &BlogService, email: mailer::Email) {
    let mailer = state.mailer.clone();
    tokio::spawn(async move {
        let subject = email.subject.clone();
        if let Err(e) = mailer.send(email).await {
            warn!(%subject, "Failed to send email: {e}");
        }
    });
}

pub(super) async fn register(
    State(state): State<BlogService>,
    jar: CookieJar,
    Payload { body, file }: Payload<RegisterRequest>,
) -> Result<(CookieJar, Reply<SessionData>)> {
    let username = normalize(&body.username);
    let email = normalize(&body.email);
    let first_name = body.first_name.trim().to_owned();
    let last_name = body.last_name.trim().to_owned();

    if username.is_empty()
        || email.is_empty()
        || first_name.is_empty()
        || last_name.is_empty()
        || body.password.is_empty()
    {
        return Err(ApiError::validation("All fields are mandatory."));
    }
    validate_username(&username)?;
    if !EMAIL.is_match(&email) {
        return Err(ApiError::validation("Please fill in a valid email address"));
    }
    validate_password(&body.password)?;
    ensure_image(file.as_ref())?;

    if state.store.user_by_email(&email).await?.is_some() {
        return Err(ApiError::conflict(DUPLICATE_EMAIL));
    }
    if state.store.user_by_username(&username).await?.is_some() {
        return Err(ApiError::conflict(DUPLICATE_USERNAME));
    }

    let password_hash = state.credentials.hash(&body.password).await?;
    let avatar = match &file {
        Some(file) => {
            let image = state.media.upload(AVATAR_FOLDER, file).await?;
            Avatar {
                public_id: image.resource_id,
                secure_url: image.resource_url,
            }
        }
        None => Avatar {
            public_id: String::new(),
            secure_url: state.config.default_avatar_url.clone(),
        },
    };

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        username,
        email,
        password_hash,
        first_name,
        last_name,
        bio: String::new(),
        avatar,
        role: Role::User,
        is_blocked: false,
        is_verified: false,
        is_closed: false,
        followers: 0,
        reset_token: None,
        reset_token_expiry: None,
        verify_token: None,
        verify_token_expiry: None,
        created_at: now,
        updated_at: now,
    };

    let user = match state.store.insert_user(user.clone()).await {
        Ok(user) => user,
        Err(e) => {
            if !user.avatar.public_id.is_empty() {
                state.media.delete_all(&[user.avatar.public_id]).await;
            }
            return Err(e.into());
        }
    };

    info!(user_id = %user.id, username = %user.username, "Registered user");
    send_in_background(&state, mailer::welcome(&user.email, &user.first_name));
    sign_in(
        &state,
        jar,
        &user,
        StatusCode::CREATED,
        "User created Successfully",
        None,
    )
}

pub(super) async fn login(
    State(state): State<BlogService>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<(CookieJar, Reply<SessionData>)> {
    let username = normalize(&body.username);
    if username.is_empty() || body.password.is_empty() {
        return Err(ApiError::validation("Username and Password is mandatory"));
    }

    let invalid =
        || ApiError::unauthenticated("Email or Password do not match or user does not exist");
    let mut user = state
        .store
        .user_by_username(&username)
        .await?
        .ok_or_else(invalid)?;
    if !state
        .credentials
        .verify(&body.password, &user.password_hash)
        .await?
    {
        return Err(invalid());
    }

    if user.is_blocked {
        return Err(ApiError::forbidden(BLOCKED));
    }

    let mut user_info = None;
    if user.is_closed {
        user = state
            .store
            .update_user(user.id, UserPatch::closed(false))
            .await?;
        user_info = Some("Account reopened successfully.");
        info!(user_id = %user.id, "Reopened closed account on login");
    }

    sign_in(
        &state,
        jar,
        &user,
        StatusCode::OK,
        "User logged in successfully",
        user_info,
    )
}

pub(super) async fn logout(_: Session, jar: CookieJar) -> (CookieJar, Reply<NoData>) {
    (
        jar.remove(removal_cookie()),
        Reply::message("User logged Out successfully"),
    )
}

pub(super) async fn refresh_token(
    State(state): State<BlogService>,
    ActiveUser(user): ActiveUser,
    jar: CookieJar,
) -> Result<(CookieJar, Reply<SessionData>)> {
    sign_in(
        &state,
        jar,
        &user,
        StatusCode::OK,
        "Token refreshed successfully",
        None,
    )
}

pub(super) async fn forgot_password(
    State(state): State<BlogService>,
    Json(body): Json<EmailRequest>,
) -> Result<Reply<NoData>> {
    let email = normalize(&body.email);
    if email.is_empty() {
        return Err(ApiError::validation("Email is required"));
    }

    let user = state
        .store
        .user_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::not_found("Email not registered"))?;
    if user.is_blocked {
        return Err(ApiError::forbidden(BLOCKED));
    }

    let token = OneTimeToken::generate(Utc::now());
    let user = state
        .store
        .update_user(user.id, UserPatch::reset_token(Some(token.digest())))
        .await?;

    let link = frontend_link(&state.config, &format!("reset-password/{}", token.plaintext));
    if let Err(e) = state
        .mailer
        .send(mailer::reset_password(&user.email, &link))
        .await
    {
        if let Err(revert) = state
            .store
            .update_user(user.id, UserPatch::reset_token(None))
            .await
        {
            warn!(user_id = %user.id, "Failed to revert reset token: {revert}");
        }
        return Err(e.into());
    }

    Ok(Reply::message(format!(
        "Reset password link has been sent to {email} successfully"
    )))
}

pub(super) async fn reset_password(
    State(state): State<BlogService>,
    Path(reset_token): Path<String>,
    Json(body): Json<PasswordRequest>,
) -> Result<Reply<NoData>> {
    if body.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }
    validate_password(&body.password)?;

    let user = state
        .store
        .user_by_reset_token(&hash_token(&reset_token), Utc::now())
        .await?
        .ok_or_else(|| ApiError::validation("Token is invalid or expired, please try again"))?;
    if user.is_blocked {
        return Err(ApiError::forbidden(BLOCKED));
    }

    let password_hash = state.credentials.hash(&body.password).await?;
    state
        .store
        .update_user(
            user.id,
            UserPatch {
                password_hash: Some(password_hash),
                reset_token: Some(None),
                ..UserPatch::default()
            },
        )
        .await?;

    info!(user_id = %user.id, "Password reset");
    Ok(Reply::message("Password changed successfully"))
}

pub(super) async fn change_password(
    State(state): State<BlogService>,
    VerifiedUser(user): VerifiedUser,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Reply<NoData>> {
    if body.old_password.is_empty() || body.new_password.is_empty() {
        return Err(ApiError::validation(
            "Old password and new password are required",
        ));
    }
    if body.old_password == body.new_password {
        return Err(ApiError::validation(
            "New Password can not be the same as Old Password",
        ));
    }
    validate_password(&body.new_password)?;

    if !state
        .credentials
        .verify(&body.old_password, &user.password_hash)
        .await?
    {
        return Err(ApiError::validation("Invalid old password"));
    }

    let password_hash = state.credentials.hash(&body.new_password).await?;
    state
        .store
        .update_user(
            user.id,
            UserPatch {
                password_hash: Some(password_hash),
                ..UserPatch::default()
            },
        )
        .await?;
    Ok(Reply::message("Password changed successfully"))
}

pub(super) async fn send_verification(
    State(state): State<BlogService>,
    Session(user): Session,
) -> Result<Reply<NoData>> {
    if user.is_blocked {
        return Err(ApiError::forbidden(BLOCKED));
    }
    if user.is_verified {
        return Err(ApiError::validation("Account already verified."));
    }

    let token = OneTimeToken::generate(Utc::now());
    let user = state
        .store
        .update_user(user.id, UserPatch::verify_token(Some(token.digest())))
        .await?;

    let link = frontend_link(
        &state.config,
        &format!("verify/{}/{}", user.username, token.plaintext),
    );
    if let Err(e) = state
        .mailer
        .send(mailer::verify_account(&user.email, &user.first_name, &link))
        .await
    {
        if let Err(revert) = state
            .store
            .update_user(user.id, UserPatch::verify_token(None))
            .await
        {
            warn!(user_id = %user.id, "Failed to revert verify token: {revert}");
        }
        return Err(e.into());
    }

    Ok(Reply::message(format!(
        "Verify token has been sent to {} successfully",
        user.email
    )))
}

pub(super) async fn verify_account(
    State(state): State<BlogService>,
    Path((username, token)): Path<(String, String)>,
) -> Result<Reply<NoData>> {
    let user = state
        .store
        .user_by_verify_token(&hash_token(&token), Utc::now())
        .await?
        .ok_or_else(|| ApiError::not_found("Invalid Token"))?;
    if user.username != normalize(&username) {
        return Err(ApiError::validation(
            "Either the token or username is invalid",
        ));
    }

    state
        .store
        .update_user(
            user.id,
            UserPatch {
                is_verified: Some(true),
                verify_token: Some(None),
                ..UserPatch::default()
            },
        )
        .await?;

    info!(user_id = %user.id, "Account verified");
    Ok(Reply::message("Account Verified Successfully"))
}

pub(super) async fn profile(
    State(state): State<BlogService>,
    Session(caller): Session,
    Path(username): Path<String>,
) -> Result<Reply<ProfileData>> {
    let user = state
        .store
        .user_by_username(&normalize(&username))
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if !caller.is_admin() {
        if user.is_blocked {
            return Err(ApiError::forbidden("This account has been blocked by admin."));
        }
        if user.is_closed {
            return Err(ApiError::forbidden("This account has been closed."));
        }
    }

    let is_author = caller.id == user.id;
    let include_drafts = is_author || caller.is_admin();
    let posts = state
        .store
        .posts_by_author(user.id, include_drafts, PROFILE_POSTS)
        .await?;
    let total_posts = state
        .store
        .count_posts_by_author(user.id, include_drafts)
        .await?;

    Ok(Reply::ok(
        "Profile fetched successfully",
        ProfileData {
            is_author,
            total_followers: user.followers,
            total_posts,
            posts,
            user: UserView::from(&user),
        },
    ))
}

pub(super) async fn update_profile(
    State(state): State<BlogService>,
    ActiveUser(user): ActiveUser,
    Payload { body, file }: Payload<ProfileUpdate>,
) -> Result<Reply<UserData>> {
    let ProfileUpdate {
        username,
        first_name,
        last_name,
        bio,
    } = body;
    let username = username.as_deref().map(normalize).filter(|u| !u.is_empty());
    let first_name = first_name.map(|n| n.trim().to_owned()).filter(|n| !n.is_empty());
    let last_name = last_name.map(|n| n.trim().to_owned()).filter(|n| !n.is_empty());

    if username.is_none()
        && first_name.is_none()
        && last_name.is_none()
        && bio.is_none()
        && file.is_none()
    {
        return Err(ApiError::validation(
            "At least one field is required for update.",
        ));
    }
    ensure_image(file.as_ref())?;

    let mut patch = UserPatch {
        first_name,
        last_name,
        bio: bio.map(|b| b.trim().to_owned()),
        ..UserPatch::default()
    };
    if let Some(username) = username {
        validate_username(&username)?;
        if username != user.username {
            if state.store.user_by_username(&username).await?.is_some() {
                return Err(ApiError::conflict(DUPLICATE_USERNAME));
            }
            patch.username = Some(username);
        }
    }

    let old_avatar = user.avatar.public_id.clone();
    let mut uploaded = None;
    if let Some(file) = &file {
        let image = state.media.upload(AVATAR_FOLDER, file).await?;
        uploaded = Some(image.resource_id.clone());
        patch.avatar = Some(Avatar {
            public_id: image.resource_id,
            secure_url: image.resource_url,
        });
    }

    let user = match state.store.update_user(user.id, patch).await {
        Ok(user) => user,
        Err(e) => {
            if let Some(key) = uploaded {
                state.media.delete_all(&[key]).await;
            }
            return Err(e.into());
        }
    };
    if uploaded.is_some() && !old_avatar.is_empty() {
        state.media.delete_all(&[old_avatar]).await;
    }

    Ok(Reply::ok(
        "Profile updated successfully",
        UserData {
            user: UserView::from(&user),
        },
    ))
}

async fn set_blocked(
    state: &BlogService,
    id: Uuid,
    username: &str,
    blocked: bool,
) -> Result<User> {
    let username = normalize(username);
    if username.is_empty() {
        return Err(ApiError::validation("Please provide username"));
    }

    let user = state
        .store
        .user(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found."))?;
    if user.username != username {
        return Err(ApiError::validation("Either of Id or Username is Incorrect"));
    }
    if blocked && user.is_admin() {
        return Err(ApiError::validation("Admin can not be blocked."));
    }

    Ok(state
        .store
        .update_user(user.id, UserPatch::blocked(blocked))
        .await?)
}

pub(super) async fn block(
    State(state): State<BlogService>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UsernameRequest>,
) -> Result<Reply<NoData>> {
    let user = set_blocked(&state, id, &body.username, true).await?;
    info!(user_id = %user.id, admin_id = %admin.id, "Blocked account");
    Ok(Reply::message("The account has been blocked."))
}

pub(super) async fn unblock(
    State(state): State<BlogService>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UsernameRequest>,
) -> Result<Reply<NoData>> {
    let user = set_blocked(&state, id, &body.username, false).await?;
    info!(user_id = %user.id, admin_id = %admin.id, "Unblocked account");
    Ok(Reply::message(
        "The account has been unblocked successfully.",
    ))
}

pub(super) async fn close_account(
    State(state): State<BlogService>,
    Session(caller): Session,
    jar: CookieJar,
    Json(body): Json<UsernameRequest>,
) -> Result<(CookieJar, Reply<NoData>)> {
    let username = normalize(&body.username);
    if username.is_empty() {
        return Err(ApiError::validation("Please provide username."));
    }
    if caller.is_blocked {
        return Err(ApiError::forbidden(BLOCKED));
    }

    let user = state
        .store
        .user_by_username(&username)
        .await?
        .ok_or_else(|| ApiError::not_found("Username is invalid"))?;
    let own = caller.id == user.id;
    if (!own && !caller.is_admin()) || user.is_admin() {
        return Err(ApiError::forbidden(NOT_OWNER));
    }

    let user = state
        .store
        .update_user(user.id, UserPatch::closed(true))
        .await?;
    info!(user_id = %user.id, closed_by = %caller.id, "Closed account");

    send_in_background(
        &state,
        mailer::account_closed(&user.email, &user.first_name, &state.config.support_email),
    );

    let jar = if own { jar.remove(removal_cookie()) } else { jar };
    Ok((jar, Reply::message("Account closed successfully")))
}

pub(super) async fn delete_account(
    State(state): State<BlogService>,
    Session(caller): Session,
    jar: CookieJar,
    Path(id): Path<Uuid>,
) -> Result<(CookieJar, Reply<Deleted>)> {
    if caller.is_blocked {
        return Err(ApiError::forbidden(BLOCKED));
    }
    ensure_author_or_admin(&caller, id)?;
    if state.store.user(id).await?.is_none() {
        return Err(ApiError::not_found("User not found."));
    }

    let cascade = state.store.delete_user(id).await?;
    let orphaned_assets = state.media.delete_all(&cascade.assets).await;
    info!(
        user_id = %id,
        deleted_by = %caller.id,
        posts = cascade.posts,
        orphaned = orphaned_assets.len(),
        "Deleted account"
    );

    let jar = if caller.id == id {
        jar.remove(removal_cookie())
    } else {
        jar
    };
    Ok((
        jar,
        Reply::ok("Account deleted successfully", Deleted { orphaned_assets }),
    ))
}

pub(super) async fn list_users(
    State(state): State<BlogService>,
    _: AdminUser,
    Query(query): Query<ListQuery>,
) -> Result<Reply<UserList>> {
    let limit = page_size(query.limit);
    let rows = state
        .store
        .list_users(query.skip.max(0), limit + 1)
        .await?;
    let (users, has_more) = paginate(rows, limit as usize);

    Ok(Reply::ok(
        "Users fetched successfully",
        UserList {
            users: users.iter().map(UserView::from).collect(),
            has_more: Some(has_more),
        },
    ))
}

pub(super) async fn search_users(
    State(state): State<BlogService>,
    _: AdminUser,
    Query(query): Query<SearchQuery>,
) -> Result<Reply<UserList>> {
    let query = query.query.trim();
    if query.is_empty() {
        return Err(ApiError::validation("Please provide a search query"));
    }

    let users = state.store.search_users(query, SEARCH_LIMIT).await?;
    Ok(Reply::ok(
        "Users fetched successfully",
        UserList {
            users: users.iter().map(UserView::from).collect(),
            has_more: None,
        },
    ))
}

/// Finds a free username derived from the local part of an email address.
async fn username_for(state: &BlogService, email: &str) -> Result<String> {
    let base: String = email
        .split('@')
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    let base = if base.is_empty() { "user".to_owned() } else { base };

    for _ in 0..5 {
        let candidate = format!("{base}{:04}", rand::thread_rng().gen_range(0..10_000));
        if state.store.user_by_username(&candidate).await?.is_none() {
            return Ok(candidate);
        }
    }
    Ok(format!("{base}{}", Uuid::new_v4().simple()))
}

pub(super) async fn google_auth(
    State(state): State<BlogService>,
    jar: CookieJar,
    Json(body): Json<GoogleAuthRequest>,
) -> Result<(CookieJar, Reply<SessionData>)> {
    if body.credential.trim().is_empty() {
        return Err(ApiError::validation("Google credential is required"));
    }

    let identity = state.identity.verify(body.credential.trim()).await?;
    if !identity.email_verified {
        return Err(ApiError::unauthenticated(
            "Google account email is not verified",
        ));
    }
    let email = normalize(&identity.email);

    if let Some(mut user) = state.store.user_by_email(&email).await? {
        if user.is_blocked {
            return Err(ApiError::forbidden(BLOCKED));
        }
        let mut user_info = None;
        if user.is_closed || !user.is_verified {
            if user.is_closed {
                user_info = Some("Account reopened successfully.");
            }
            let patch = UserPatch {
                is_closed: Some(false),
                is_verified: Some(true),
                ..UserPatch::default()
            };
            user = state.store.update_user(user.id, patch).await?;
        }
        return sign_in(
            &state,
            jar,
            &user,
            StatusCode::OK,
            "User logged in successfully",
            user_info,
        );
    }

    // Google accounts sign in through Google only, so the password is random and never sent.
    let password = OneTimeToken::generate(Utc::now()).plaintext;
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        username: username_for(&state, &email).await?,
        email,
        password_hash: state.credentials.hash(&password).await?,
        first_name: identity.given_name,
        last_name: identity.family_name,
        bio: String::new(),
        avatar: Avatar {
            public_id: String::new(),
            secure_url: identity
                .picture
                .unwrap_or_else(|| state.config.default_avatar_url.clone()),
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
    };
    let user = state.store.insert_user(user).await?;
    info!(user_id = %user.id, "Registered user through Google");

    send_in_background(&state, mailer::welcome(&user.email, &user.first_name));
    sign_in(
        &state,
        jar,
        &user,
        StatusCode::CREATED,
        "User created Successfully",
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_pattern() {
        assert!(EMAIL.is_match("ada@example.com"));
        assert!(EMAIL.is_match("first.last+tag@mail.example.co"));
        assert!(!EMAIL.is_match("ada@example"));
        assert!(!EMAIL.is_match("ada example@example.com"));
    }

    #[test]
    fn username_rules() {
        assert!(validate_username("writer").is_ok());
        assert!(validate_username("short").is_err());
        assert!(validate_username("has space").is_err());
        assert_eq!(normalize("  MixedCase "), "mixedcase");
    }
}
