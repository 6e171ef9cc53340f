// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Extractors whose rejections render through [ApiError], plus [Payload] for endpoints that take
//! either a JSON body or a multipart form carrying a file.

use anyhow::Context;
use axum::async_trait;
use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;

use crate::error::ApiError;
use crate::media::TempUpload;
use crate::BlogService;

/// File fields accepted in multipart bodies.
const FILE_FIELDS: &[&str] = &["image", "avatar", "resource"];

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct Json<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct Path<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct Query<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        ApiError::validation(format!("Invalid form data: {}", error.body_text()))
    }
}

/// A request body given as JSON, or as a multipart form whose text fields make up `T` and whose
/// single file part is spooled to the upload directory.
pub struct Payload<T> {
    pub body: T,
    pub file: Option<TempUpload>,
}

#[async_trait]
impl<T> FromRequest<BlogService> for Payload<T>
where
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &BlogService) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let mut multipart = Multipart::from_request(req, state).await?;
            return read_form(&mut multipart, state).await;
        }

        let Json(body) = Json::<T>::from_request(req, state).await?;
        Ok(Payload { body, file: None })
    }
}

async fn read_form<T: DeserializeOwned>(
    multipart: &mut Multipart,
    state: &BlogService,
) -> Result<Payload<T>, ApiError> {
    let mut fields = Map::new();
    let mut file = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_owned();

        if field.file_name().is_some() {
            if !FILE_FIELDS.contains(&name.as_str()) {
                return Err(ApiError::validation(format!("Unexpected file field '{name}'")));
            }
            if file.is_some() {
                return Err(ApiError::validation("Only one file may be uploaded"));
            }
            file = Some(spool(field, state).await?);
        } else {
            fields.insert(name, Value::String(field.text().await?));
        }
    }

    let body = serde_json::from_value(Value::Object(fields))
        .map_err(|e| ApiError::validation(e.to_string()))?;
    Ok(Payload { body, file })
}

async fn spool(mut field: Field<'_>, state: &BlogService) -> Result<TempUpload, ApiError> {
    let limit = state.config.max_upload_bytes;
    let file_name = field.file_name().map(str::to_owned);
    let content_type = field.content_type().map(str::to_owned);

    let temp = tempfile::Builder::new()
        .prefix("upload-")
        .tempfile_in(&state.config.upload_dir)
        .context("cannot create upload file")?;
    let mut out = tokio::fs::File::from_std(temp.reopen().context("cannot open upload file")?);

    let mut written = 0;
    while let Some(chunk) = field.chunk().await? {
        written += chunk.len();
        if written > limit {
            return Err(ApiError::validation(format!(
                "File is too large, the limit is {} MB",
                limit / (1024 * 1024)
            )));
        }
        out.write_all(&chunk)
            .await
            .context("cannot write upload file")?;
    }
    out.flush().await.context("cannot write upload file")?;

    Ok(TempUpload {
        file: temp,
        file_name,
        content_type,
    })
}
