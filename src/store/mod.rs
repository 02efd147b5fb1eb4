//! Persistence capability.
//!
//! Handlers talk to storage only through the [`Store`] trait, injected as a
//! [`Db`] handle. Every engine reports failures as a [`StoreError`] whose
//! [`StoreErrorKind`] says *what* went wrong (unique violation, dangling
//! reference, missing row) independently of the engine's own error codes.
//!
//! Engines:
//!
//! - [`MemoryStore`]: in-process tables with relational constraints checked
//!   at write time. The default engine and the test double.
//! - `PgStore`: PostgreSQL via `sqlx` (cargo feature `postgres`).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::Config;
use crate::filter::PostFilter;
use crate::model::{
    Category, CommentRecord, Include, NewComment, NewPost, NewUser, Post, PostChanges,
    PostRecord, Tag, User, UserRecord,
};
use crate::pagination::Page;
use crate::relation::Connect;

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;

/// Shared store handle given to every handler.
pub type Db = Arc<dyn Store>;

pub type StoreResult<T> = Result<T, StoreError>;

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    User,
    Post,
    Category,
    Tag,
    Comment,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User     => "user",
            Self::Post     => "post",
            Self::Category => "category",
            Self::Tag      => "tag",
            Self::Comment  => "comment",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreErrorKind {
    /// A unique column already holds the value.
    UniqueViolation,
    /// A referenced row does not exist.
    ForeignKeyViolation,
    /// The row targeted by an update, delete or connect does not exist.
    NotFound,
    /// Anything else: connectivity, decoding, engine bugs.
    Other,
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UniqueViolation     => "unique_violation",
            Self::ForeignKeyViolation => "foreign_key_violation",
            Self::NotFound            => "not_found",
            Self::Other               => "other",
        })
    }
}

/// A failed store operation.
///
/// `entity` names the table the failing write targeted (for `NotFound` with
/// `missing_ids`, the table the ids were looked up in).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub entity: Option<Entity>,
    pub message: String,
    pub missing_ids: Vec<i64>,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, entity: Option<Entity>, message: impl Into<String>) -> Self {
        Self { kind, entity, message: message.into(), missing_ids: Vec::new() }
    }

    pub fn unique(entity: Entity, message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::UniqueViolation, Some(entity), message)
    }

    pub fn foreign_key(entity: Entity, message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::ForeignKeyViolation, Some(entity), message)
    }

    pub fn not_found(entity: Entity, id: i64) -> Self {
        Self::new(StoreErrorKind::NotFound, Some(entity), format!("no {entity} with id {id}"))
    }

    /// Some of the ids handed to a connect do not exist in `entity`'s table.
    pub fn missing(entity: Entity, ids: Vec<i64>) -> Self {
        let list = ids.iter().map(i64::to_string).collect::<Vec<_>>().join(", ");
        Self {
            missing_ids: ids,
            ..Self::new(StoreErrorKind::NotFound, Some(entity), format!("no {entity} with id {list}"))
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Other, None, message)
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(entity) = self.entity {
            write!(f, " on {entity}")?;
        }
        write!(f, ": {}", self.message)
    }
}

impl std::error::Error for StoreError {}

// ── Store ─────────────────────────────────────────────────────────────────────

/// Typed create/read/update/delete/count operations over the blog's records.
///
/// Each method is a single engine call and is atomic on its own; nothing
/// spans two calls.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// All users in id order, each with their posts.
    async fn list_users(&self) -> StoreResult<Vec<UserRecord>>;

    /// Fails with `UniqueViolation` when the email is taken.
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;

    /// Posts matching `filter` in id order, windowed by `page`.
    async fn find_posts(
        &self,
        filter: &PostFilter,
        page: Page,
        include: Include,
    ) -> StoreResult<Vec<PostRecord>>;

    async fn count_posts(&self, filter: &PostFilter) -> StoreResult<u64>;

    /// Fails with `ForeignKeyViolation` when the author does not exist.
    async fn create_post(&self, post: NewPost) -> StoreResult<Post>;

    /// `Ok(None)` when no post has this id.
    async fn find_post(&self, id: i64, include: Include) -> StoreResult<Option<PostRecord>>;

    /// Fails with `NotFound` when no post has this id.
    async fn update_post(&self, id: i64, changes: PostChanges) -> StoreResult<Post>;

    /// Removes the post with its comments and links. Fails with `NotFound`
    /// when no post has this id.
    async fn delete_post(&self, id: i64) -> StoreResult<()>;

    /// Adds links without touching existing ones. Fails with `NotFound` on
    /// `Entity::Post` when the post is missing, or with `NotFound` carrying
    /// `missing_ids` when any target id is missing; nothing is linked then.
    async fn connect(&self, post_id: i64, connect: &Connect) -> StoreResult<PostRecord>;

    /// Fails with `ForeignKeyViolation` when the post or author is missing.
    async fn create_comment(&self, comment: NewComment) -> StoreResult<CommentRecord>;

    /// Comments on a post in id order, each with its author. An unknown post
    /// simply has no comments.
    async fn find_comments(&self, post_id: i64) -> StoreResult<Vec<CommentRecord>>;

    async fn create_category(&self, name: &str) -> StoreResult<Category>;

    async fn create_tag(&self, name: &str) -> StoreResult<Tag>;

    /// Cheap round-trip used by the readiness probe.
    async fn ping(&self) -> StoreResult<()>;
}

/// Builds the engine selected by `config`.
///
/// A `database_url` selects PostgreSQL when the `postgres` feature is
/// compiled in; otherwise the in-memory engine is used.
pub async fn connect(config: &Config) -> StoreResult<Db> {
    match config.database_url.as_deref() {
        #[cfg(feature = "postgres")]
        Some(url) => {
            let store = PgStore::connect(url, config.max_connections).await?;
            info!("using postgres store");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "postgres"))]
        Some(_) => {
            tracing::warn!("database_url is set but pressroom was built without the `postgres` feature; using the in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        None => {
            info!("no database_url configured; using the in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
