//! Category and tag creation.

use http::StatusCode;
use serde::Deserialize;
use serde_json::json;

use crate::api_error::{ApiError, Classify, Operation};
use crate::request::Request;
use crate::response::{IntoResponse, Json, Response};
use crate::store::Db;

#[derive(Deserialize)]
struct NameBody {
    name: String,
}

/// `POST /categories` → `201 {category}`, or `409` on a duplicate name.
pub async fn create_category(db: Db, req: Request) -> Result<Response, ApiError> {
    let body: NameBody = req.json()?;
    let category = db.create_category(&body.name).await.classify(Operation::CreateCategory)?;
    Ok((StatusCode::CREATED, Json(json!({ "category": category }))).into_response())
}

/// `POST /tags` → `201 {tag}`, or `409` on a duplicate name.
pub async fn create_tag(db: Db, req: Request) -> Result<Response, ApiError> {
    let body: NameBody = req.json()?;
    let tag = db.create_tag(&body.name).await.classify(Operation::CreateTag)?;
    Ok((StatusCode::CREATED, Json(json!({ "tag": tag }))).into_response())
}
