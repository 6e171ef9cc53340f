// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use axum::extract::State;

use super::users::EMAIL;
use crate::error::{ApiError, Result};
use crate::extract::Json;
use crate::mailer;
use crate::types::{ContactRequest, NoData, Reply};
use crate::BlogService;

/// Liveness check.
pub(crate) async fn ping() -> &'static str {
    "Pong"
}

pub(super) async fn contact(
    State(state): State<BlogService>,
    Json(body): Json<ContactRequest>,
) -> Result<Reply<NoData>> {
    let name = body.name.trim();
    let email = body.email.trim().to_lowercase();
    let subject = body.subject.trim();
    let message = body.message.trim();
    if name.is_empty() || email.is_empty() || subject.is_empty() || message.is_empty() {
        return Err(ApiError::validation("All fields are mandatory"));
    }
    if !EMAIL.is_match(&email) {
        return Err(ApiError::validation("Please fill in a valid email address"));
    }

    state
        .mailer
        .send(mailer::contact(
            &state.config.support_email,
            name,
            &email,
            subject,
            message,
        ))
        .await?;

    Ok(Reply::message("Form submitted successfully!"))
}
