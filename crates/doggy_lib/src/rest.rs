//! Plain HTTP endpoints that live next to the GraphQL API: an email
//! availability check for the sign-up form and profile image uploads.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use doggy_common_types::{normalize_email, parse_id, InvalidId, Table, UnknownTable};
use doggy_store::{DoggyStore, StoreError};
use serde::Deserialize;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::metrics;
use crate::object_storage::{put_with_timeout, ObjectStorage, UploadError};
use crate::prometheus_metrics::success_label;

#[derive(Clone)]
pub struct RestState {
    pub store: Arc<dyn DoggyStore>,
    pub storage: Arc<dyn ObjectStorage>,
    pub bucket: String,
    pub upload_timeout: Duration,
}

pub fn rest_routes(state: RestState) -> Router {
    Router::new()
        .route("/emailExists", post(email_exists))
        .route("/upload/:table/:id", post(upload))
        .with_state(state)
}

#[derive(Debug, thiserror::Error)]
pub enum RestError {
    #[error("Bad request: Please provide valid email!")]
    InvalidEmail,
    #[error(transparent)]
    UnknownTable(#[from] UnknownTable),
    #[error(transparent)]
    InvalidId(#[from] InvalidId),
    #[error("no row in `{0}` has ID `{1}`")]
    NotFound(Table, Uuid),
    #[error("`{0}` rows have no profile image")]
    NoProfileImage(Table),
    #[error("invalid image upload: {0}")]
    InvalidImage(String),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error("internal server error")]
    Store(#[from] StoreError),
}

impl RestError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidEmail
            | Self::UnknownTable(_)
            | Self::InvalidId(_)
            | Self::NoProfileImage(_)
            | Self::InvalidImage(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(..) => StatusCode::NOT_FOUND,
            Self::Upload(UploadError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            Self::Upload(_) => StatusCode::BAD_GATEWAY,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<MultipartError> for RestError {
    fn from(err: MultipartError) -> Self {
        Self::InvalidImage(err.body_text())
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        match &self {
            Self::Store(err) => error!(error = %err, "Store failure while serving REST request"),
            Self::Upload(err) => error!(error = %err, "Object storage failure"),
            _ => debug!(error = %self, "Rejected REST request"),
        }
        (self.status(), self.to_string()).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct EmailExistsRequest {
    #[serde(default)]
    pub email: String,
}

/// Answers `true` or `false` as plain text.
async fn email_exists(
    State(state): State<RestState>,
    payload: Result<Json<EmailExistsRequest>, JsonRejection>,
) -> Result<String, RestError> {
    let email = match payload {
        Ok(Json(request)) => request.email,
        Err(rejection) => {
            debug!(error = %rejection, "Malformed emailExists body");
            String::new()
        }
    };

    let result = check_email(state.store.as_ref(), &email).await;
    metrics()
        .email_exists_requests
        .with_label_values(&[success_label(&result)])
        .inc();
    result.map(|exists| exists.to_string())
}

pub async fn check_email(store: &dyn DoggyStore, email: &str) -> Result<bool, RestError> {
    let email = normalize_email(email).ok_or(RestError::InvalidEmail)?;
    Ok(store.email_exists(&email).await?)
}

/// An uploaded image, as taken out of the multipart body.
#[derive(Debug, Clone)]
pub struct Image {
    pub content: Bytes,
    pub content_type: String,
}

async fn upload(
    State(state): State<RestState>,
    Path((table, id)): Path<(String, String)>,
    multipart: Multipart,
) -> Result<String, RestError> {
    let image = read_image(multipart).await?;
    upload_profile_image(&state, &table, &id, image).await
}

/// Takes the first file field of the body.
async fn read_image(mut multipart: Multipart) -> Result<Image, RestError> {
    while let Some(field) = multipart.next_field().await? {
        if field.file_name().is_none() {
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let content = field.bytes().await?;
        return Ok(Image {
            content,
            content_type,
        });
    }
    Err(RestError::InvalidImage("no file in request".to_string()))
}

/// Stores `image` and makes it the profile image of row `id` in `table`.
/// Returns the image's public URL.
pub async fn upload_profile_image(
    state: &RestState,
    table: &str,
    id: &str,
    image: Image,
) -> Result<String, RestError> {
    let table = Table::parse(table)?;
    let result = store_profile_image(state, table, id, image).await;
    metrics()
        .image_uploads
        .with_label_values(&[table.as_ref(), success_label(&result)])
        .inc();
    result
}

async fn store_profile_image(
    state: &RestState,
    table: Table,
    id: &str,
    image: Image,
) -> Result<String, RestError> {
    if !table.has_profile_image() {
        return Err(RestError::NoProfileImage(table));
    }
    let id = parse_id(id)?;
    if !state.store.id_exists(table, id).await? {
        return Err(RestError::NotFound(table, id));
    }

    let extension = image_extension(&image.content_type).ok_or_else(|| {
        RestError::InvalidImage(format!("unsupported content type `{}`", image.content_type))
    })?;
    if image.content.is_empty() {
        return Err(RestError::InvalidImage("empty file".to_string()));
    }
    let key = format!("{}.{}", Uuid::new_v4(), extension);

    let url = put_with_timeout(
        state.storage.as_ref(),
        &state.bucket,
        &key,
        image.content,
        &image.content_type,
        state.upload_timeout,
    )
    .await?;

    if !state.store.update_profile_image(table, id, &url).await? {
        // The row disappeared between the existence check and now.
        return Err(RestError::NotFound(table, id));
    }

    info!(%table, %id, %url, "Stored profile image");
    Ok(url)
}

/// `image/png` → `png`, `image/svg+xml` → `svg`. Anything that isn't an
/// image is refused.
pub fn image_extension(content_type: &str) -> Option<String> {
    let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
    let subtype = mime.strip_prefix("image/")?;
    let subtype = subtype.split('+').next()?;
    if subtype.is_empty() || !subtype.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return None;
    }
    Some(subtype.to_string())
}
