//! Route handlers.
//!
//! | Method | Path | Handler |
//! |---|---|---|
//! | GET | `/users` | [`users::list`] |
//! | POST | `/users` | [`users::create`] |
//! | GET | `/posts` | [`posts::list`] |
//! | POST | `/posts` | [`posts::create`] |
//! | GET | `/posts/{id}` | [`posts::get`] |
//! | PUT | `/posts/{id}` | [`posts::update`] |
//! | DELETE | `/posts/{id}` | [`posts::delete`] |
//! | PUT | `/posts/{id}/categories` | [`posts::connect_categories`] |
//! | PUT | `/posts/{id}/tags` | [`posts::connect_tags`] |
//! | POST | `/posts/{id}/comments` | [`comments::create`] |
//! | GET | `/posts/{id}/comments` | [`comments::list`] |
//! | POST | `/categories` | [`taxonomy::create_category`] |
//! | POST | `/tags` | [`taxonomy::create_tag`] |
//! | GET | `/healthz`, `/readyz` | [`health`](crate::health) |
//!
//! Every handler takes the store handle and the request, makes at most the
//! store calls its endpoint needs, and returns `Result<Response, ApiError>`.

pub mod comments;
pub mod posts;
pub mod taxonomy;
pub mod users;

use crate::api_error::ApiError;
use crate::health;
use crate::model::CoercedId;
use crate::request::Request;
use crate::router::Router;
use crate::store::Db;

/// The full pressroom route table over `db`.
pub fn routes(db: Db) -> Router<Db> {
    Router::new(db)
        .get("/users", users::list)
        .post("/users", users::create)
        .get("/posts", posts::list)
        .post("/posts", posts::create)
        .get("/posts/{id}", posts::get)
        .put("/posts/{id}", posts::update)
        .delete("/posts/{id}", posts::delete)
        .put("/posts/{id}/categories", posts::connect_categories)
        .put("/posts/{id}/tags", posts::connect_tags)
        .post("/posts/{id}/comments", comments::create)
        .get("/posts/{id}/comments", comments::list)
        .post("/categories", taxonomy::create_category)
        .post("/tags", taxonomy::create_tag)
        .get("/healthz", health::liveness)
        .get("/readyz", health::readiness)
}

/// The numeric `{id}` path segment, or `400 Invalid id`.
fn path_id(req: &Request) -> Result<i64, ApiError> {
    req.param("id")
        .and_then(CoercedId::parse)
        .ok_or_else(ApiError::invalid_id)
}
