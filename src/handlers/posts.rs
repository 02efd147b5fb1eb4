//! Post CRUD, the filtered listing, and category/tag assignment.

use http::StatusCode;
use serde::Deserialize;
use serde_json::json;

use super::path_id;
use crate::api_error::{ApiError, Classify, Operation};
use crate::filter::PostFilter;
use crate::model::{CoercedId, Include, NewPost, PostChanges};
use crate::pagination::Page;
use crate::relation::Connect;
use crate::request::Request;
use crate::response::{IntoResponse, Json, Response};
use crate::store::Db;

/// `GET /posts?category=&tag=&published=&page=&limit=`
///
/// Responds `200 {posts: [...], pagination: {page, limit, total, totalPages}}`
/// with author, categories and tags embedded in each post. `total` counts
/// every post matching the filter, not just this page.
pub async fn list(db: Db, req: Request) -> Result<Response, ApiError> {
    let filter = PostFilter::build(req.query("category"), req.query("tag"), req.query("published"));
    let page = Page::parse(req.query("page"), req.query("limit"))?;

    let posts = db.find_posts(&filter, page, Include::ALL).await.classify(Operation::Read)?;
    let total = db.count_posts(&filter).await.classify(Operation::Read)?;

    Ok(Json(json!({ "posts": posts, "pagination": page.meta(total) })).into_response())
}

/// `POST /posts` → `201 {post}` with `Location: /posts/{id}`. New posts start
/// unpublished.
pub async fn create(db: Db, req: Request) -> Result<Response, ApiError> {
    let new: NewPost = req.json()?;
    let post = db.create_post(new).await.classify(Operation::CreatePost)?;
    let location = format!("/posts/{}", post.id);
    Ok(Response::builder()
        .status(StatusCode::CREATED)
        .header("location", &location)
        .json(json!({ "post": post }).to_string().into_bytes()))
}

/// `GET /posts/{id}` → `200 {post}` with its author.
pub async fn get(db: Db, req: Request) -> Result<Response, ApiError> {
    let id = path_id(&req)?;
    let post = db
        .find_post(id, Include::AUTHOR)
        .await
        .classify(Operation::Read)?
        .ok_or_else(ApiError::post_not_found)?;
    Ok(Json(json!({ "post": post })).into_response())
}

/// `PUT /posts/{id}` → `200` with the updated post itself (no envelope).
pub async fn update(db: Db, req: Request) -> Result<Response, ApiError> {
    let id = path_id(&req)?;
    let changes: PostChanges = req.json()?;
    let post = db.update_post(id, changes).await.classify(Operation::UpdatePost)?;
    Ok(Json(post).into_response())
}

/// `DELETE /posts/{id}` → `204`.
pub async fn delete(db: Db, req: Request) -> Result<Response, ApiError> {
    let id = path_id(&req)?;
    db.delete_post(id).await.classify(Operation::DeletePost)?;
    Ok(Response::status(StatusCode::NO_CONTENT))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoryIds {
    category_ids: Vec<CoercedId>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TagIds {
    tag_ids: Vec<CoercedId>,
}

/// `PUT /posts/{id}/categories` with `{categoryIds: [...]}` → `200 {post}`
/// with its categories. Existing links are kept.
pub async fn connect_categories(db: Db, req: Request) -> Result<Response, ApiError> {
    let id = path_id(&req)?;
    let body: CategoryIds = req.json()?;
    let connect = Connect::categories(body.category_ids.into_iter().map(|c| c.0));
    let post = db.connect(id, &connect).await.classify(Operation::ConnectCategories)?;
    Ok(Json(json!({ "post": post })).into_response())
}

/// `PUT /posts/{id}/tags` with `{tagIds: [...]}` → `200 {post}` with its
/// tags. Existing links are kept.
pub async fn connect_tags(db: Db, req: Request) -> Result<Response, ApiError> {
    let id = path_id(&req)?;
    let body: TagIds = req.json()?;
    let connect = Connect::tags(body.tag_ids.into_iter().map(|t| t.0));
    let post = db.connect(id, &connect).await.classify(Operation::ConnectTags)?;
    Ok(Json(json!({ "post": post })).into_response())
}
