// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::auth::token::TokenError;
use crate::mailer::MailError;
use crate::media::MediaError;
use crate::oauth::OAuthError;
use crate::store::StoreError;

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

pub const UNAUTHORIZED: &str = "Unauthorized request";

/// Every failure a request can end in. Rendered to clients as `{success: false, message}`.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Max request exceeded. Please try again after {minutes} minutes")]
    RateLimited { minutes: u64 },

    #[error("{message}")]
    Upstream {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Something went wrong, please try again later")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn upstream(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Upstream {
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Upstream { .. } | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Upstream { message, source } => {
                error!(status = status.as_u16(), error = ?source, "{message}");
            }
            Self::Internal(source) => {
                error!(status = status.as_u16(), error = ?source, "Internal error");
            }
            _ => {}
        }

        let body = json!({
            "success": false,
            "message": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(what) => Self::NotFound(format!("{what} not found")),
            StoreError::Conflict(message) => Self::Conflict(message),
            StoreError::Internal(e) => Self::Internal(e),
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(value: TokenError) -> Self {
        match value {
            TokenError::Signing(e) => Self::Internal(e.into()),
            _ => Self::Unauthenticated(UNAUTHORIZED.to_owned()),
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(value: MediaError) -> Self {
        Self::upstream("File not uploaded, please try again", value)
    }
}

impl From<OAuthError> for ApiError {
    fn from(value: OAuthError) -> Self {
        match value {
            OAuthError::Rejected(reason) => {
                tracing::debug!("Google sign-in rejected: {reason}");
                Self::Unauthenticated("Invalid Google credential".to_owned())
            }
            e => Self::upstream("Google sign-in is unavailable", e),
        }
    }
}

impl From<MailError> for ApiError {
    fn from(value: MailError) -> Self {
        Self::upstream("Email could not be sent, please try again", value)
    }
}
