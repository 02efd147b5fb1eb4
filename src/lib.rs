//! # pressroom
//!
//! A small blog backend speaking JSON over HTTP: users, posts, categories,
//! tags and comments, with filtered and paginated post listings.
//!
//! ## Layout
//!
//! - HTTP plumbing: [`Server`], [`Router`], [`Request`], [`Response`]
//! - Persistence: the [`Store`](store::Store) trait, an in-memory engine and
//!   a PostgreSQL engine behind the `postgres` feature
//! - Domain rules: [`filter`], [`pagination`], [`relation`]
//! - Failure mapping: [`ApiError`] turns store failures into status codes
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use pressroom::{Config, Server, store};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), pressroom::Error> {
//!     let config = Config::load()?;
//!     let db = store::connect(&config).await?;
//!     Server::bind(config.bind).serve(pressroom::app(db)).await
//! }
//! ```

mod api_error;
mod config;
mod error;
mod handler;
mod middleware;
mod request;
mod response;
mod router;
mod server;

pub mod filter;
pub mod handlers;
pub mod health;
pub mod model;
pub mod pagination;
pub mod relation;
pub mod store;

pub use api_error::{ApiError, Classify, Operation};
pub use config::{Config, LogFormat};
pub use error::Error;
pub use handler::Handler;
pub use request::Request;
pub use response::{IntoResponse, Json, Response};
pub use router::Router;
pub use server::Server;

use store::Db;

/// The complete application over `db`, ready for [`Server::serve`] or
/// in-process [`Router::call`].
pub fn app(db: Db) -> Router<Db> {
    handlers::routes(db)
}
