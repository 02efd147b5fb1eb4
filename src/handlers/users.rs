use http::StatusCode;
use serde_json::json;

use crate::api_error::{ApiError, Classify, Operation};
use crate::model::NewUser;
use crate::request::Request;
use crate::response::{IntoResponse, Json, Response};
use crate::store::Db;

/// `GET /users` → `200 {users: [...]}`, each user with their posts.
pub async fn list(db: Db, _req: Request) -> Result<Response, ApiError> {
    let users = db.list_users().await.classify(Operation::Read)?;
    Ok(Json(json!({ "users": users })).into_response())
}

/// `POST /users` → `201 {user}`, or `409` when the email is taken.
pub async fn create(db: Db, req: Request) -> Result<Response, ApiError> {
    let new: NewUser = req.json()?;
    let user = db.create_user(new).await.classify(Operation::CreateUser)?;
    Ok((StatusCode::CREATED, Json(json!({ "user": user }))).into_response())
}
