use http::StatusCode;
use serde::Deserialize;
use serde_json::json;

use super::path_id;
use crate::api_error::{ApiError, Classify, Operation};
use crate::model::{CoercedId, NewComment};
use crate::request::Request;
use crate::response::{IntoResponse, Json, Response};
use crate::store::Db;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentBody {
    text: String,
    author_id: CoercedId,
}

/// `POST /posts/{id}/comments` → `201 {comment}` with its author, or `404`
/// when the post or the author does not exist.
pub async fn create(db: Db, req: Request) -> Result<Response, ApiError> {
    let post_id = path_id(&req)?;
    let body: CommentBody = req.json()?;
    let comment = db
        .create_comment(NewComment { text: body.text, post_id, author_id: body.author_id.0 })
        .await
        .classify(Operation::CreateComment)?;
    Ok((StatusCode::CREATED, Json(json!({ "comment": comment }))).into_response())
}

/// `GET /posts/{id}/comments` → `200 {comments: [...]}`, each with its author.
pub async fn list(db: Db, req: Request) -> Result<Response, ApiError> {
    let post_id = path_id(&req)?;
    let comments = db.find_comments(post_id).await.classify(Operation::Read)?;
    Ok(Json(json!({ "comments": comments })).into_response())
}
