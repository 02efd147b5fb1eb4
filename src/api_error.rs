//! Request-level failures and their HTTP rendering.
//!
//! Store failures are classified by [`StoreErrorKind`] together with the
//! [`Operation`] that produced them. Client-facing messages are fixed
//! strings; the underlying error is logged, never sent.

use std::borrow::Cow;

use http::StatusCode;
use serde::Serialize;
use tracing::{debug, error};

use crate::pagination::InvalidPagination;
use crate::response::{IntoResponse, Json, Response};
use crate::store::{Entity, StoreError, StoreErrorKind, StoreResult};

/// The handler-level operation a store call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Read,
    CreateUser,
    CreatePost,
    UpdatePost,
    DeletePost,
    CreateComment,
    CreateCategory,
    CreateTag,
    ConnectCategories,
    ConnectTags,
}

/// An error response: status code plus `{"error": message}` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    message: Cow<'static, str>,
    missing_ids: Vec<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "<[i64]>::is_empty")]
    missing_ids: &'a [i64],
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<Cow<'static, str>>) -> Self {
        Self { status, message: message.into(), missing_ids: Vec::new() }
    }

    pub fn bad_request(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Server Error")
    }

    pub fn invalid_id() -> Self {
        Self::bad_request("Invalid id")
    }

    pub fn post_not_found() -> Self {
        Self::not_found("Post not found")
    }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn message(&self) -> &str { &self.message }
    pub fn missing_ids(&self) -> &[i64] { &self.missing_ids }

    /// Picks the response for a failed store call made on behalf of `op`.
    /// Combinations not listed collapse to `500 Server Error`.
    pub fn classify(err: StoreError, op: Operation) -> Self {
        use Operation as Op;
        use StoreErrorKind as Kind;

        match (err.kind, op, err.entity) {
            (Kind::UniqueViolation, Op::CreateUser, _)     => Self::conflict("Email already exists"),
            (Kind::UniqueViolation, Op::CreateCategory, _) => Self::conflict("Category already exists"),
            (Kind::UniqueViolation, Op::CreateTag, _)      => Self::conflict("Tag already exists"),

            (Kind::ForeignKeyViolation, Op::CreatePost, _)    => Self::not_found("Author not found"),
            (Kind::ForeignKeyViolation, Op::CreateComment, _) => Self::not_found("Post or author not found"),

            (
                Kind::NotFound,
                Op::UpdatePost | Op::DeletePost | Op::ConnectCategories | Op::ConnectTags,
                Some(Entity::Post),
            ) => Self::post_not_found(),
            (Kind::NotFound, Op::ConnectCategories, Some(Entity::Category)) => Self {
                missing_ids: err.missing_ids,
                ..Self::not_found("Category not found")
            },
            (Kind::NotFound, Op::ConnectTags, Some(Entity::Tag)) => Self {
                missing_ids: err.missing_ids,
                ..Self::not_found("Tag not found")
            },

            _ => {
                error!(operation = ?op, error = %err, "store call failed");
                Self::internal()
            }
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        debug!("rejected request body: {e}");
        Self::bad_request("Invalid JSON body")
    }
}

impl From<InvalidPagination> for ApiError {
    fn from(_: InvalidPagination) -> Self {
        Self::bad_request("Invalid pagination parameters")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody { error: &self.message, missing_ids: &self.missing_ids };
        (self.status, Json(body)).into_response()
    }
}

/// `store.create_user(u).await.classify(Operation::CreateUser)?`
pub trait Classify<T> {
    fn classify(self, op: Operation) -> Result<T, ApiError>;
}

impl<T> Classify<T> for StoreResult<T> {
    fn classify(self, op: Operation) -> Result<T, ApiError> {
        self.map_err(|e| ApiError::classify(e, op))
    }
}
