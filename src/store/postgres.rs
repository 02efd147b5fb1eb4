//! PostgreSQL store over a `sqlx` connection pool.
//!
//! Expects the tables described in `schema.sql`. Driver errors are classified
//! by [`sqlx::error::ErrorKind`], never by message text.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use sqlx::error::ErrorKind;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::debug;

use super::{Entity, Store, StoreError, StoreResult};
use crate::filter::PostFilter;
use crate::model::{
    Category, Comment, CommentRecord, Include, NewComment, NewPost, NewUser, Post, PostChanges,
    PostRecord, Tag, User, UserRecord,
};
use crate::pagination::Page;
use crate::relation::{Connect, Relation};

const POST_COLUMNS: &str = "p.id, p.title, p.content, p.published, p.author_id";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| StoreError::other(format!("failed to connect to postgres: {e}")))?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> StoreResult<sqlx::pool::PoolConnection<Postgres>> {
        self.pool.acquire().await.map_err(classify(None))
    }
}

// ── Error classification ──────────────────────────────────────────────────────

/// Maps a driver error to a [`StoreError`] attributed to `entity`.
fn classify(entity: Option<Entity>) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |err| {
        let kind = match &err {
            sqlx::Error::Database(db) => match db.kind() {
                ErrorKind::UniqueViolation     => Some(super::StoreErrorKind::UniqueViolation),
                ErrorKind::ForeignKeyViolation => Some(super::StoreErrorKind::ForeignKeyViolation),
                _ => None,
            },
            sqlx::Error::RowNotFound => Some(super::StoreErrorKind::NotFound),
            _ => None,
        };
        match kind {
            Some(kind) => StoreError::new(kind, entity, err.to_string()),
            None => StoreError::other(err.to_string()),
        }
    }
}

// ── Query helpers ─────────────────────────────────────────────────────────────

/// Appends the `WHERE` clause for `filter` to a query over `posts p`.
fn push_filter<'a>(qb: &mut QueryBuilder<'a, Postgres>, filter: &PostFilter) {
    let mut sep = " WHERE ";
    if let Some(category) = &filter.category {
        qb.push(sep)
            .push("EXISTS (SELECT 1 FROM post_categories pc JOIN categories c ON c.id = pc.category_id \
                   WHERE pc.post_id = p.id AND c.name = ")
            .push_bind(category.clone())
            .push(")");
        sep = " AND ";
    }
    if let Some(tag) = &filter.tag {
        qb.push(sep)
            .push("EXISTS (SELECT 1 FROM post_tags pt JOIN tags t ON t.id = pt.tag_id \
                   WHERE pt.post_id = p.id AND t.name = ")
            .push_bind(tag.clone())
            .push(")");
        sep = " AND ";
    }
    if let Some(published) = filter.published {
        qb.push(sep).push("p.published = ").push_bind(published);
    }
}

fn link_table(relation: Relation) -> (&'static str, &'static str, &'static str) {
    // (link table, link column, target table)
    match relation {
        Relation::Categories => ("post_categories", "category_id", "categories"),
        Relation::Tags       => ("post_tags", "tag_id", "tags"),
    }
}

/// Requested ids absent from `found`, in request order.
fn missing_ids(requested: &[i64], found: Vec<i64>) -> Vec<i64> {
    let found: HashSet<i64> = found.into_iter().collect();
    requested.iter().copied().filter(|id| !found.contains(id)).collect()
}

/// Loads the requested relations for `posts` with one query per relation.
async fn expand(
    conn: &mut PgConnection,
    posts: Vec<Post>,
    include: Include,
) -> StoreResult<Vec<PostRecord>> {
    let post_ids: Vec<i64> = posts.iter().map(|p| p.id).collect();

    let mut authors = HashMap::new();
    if include.author {
        let author_ids: Vec<i64> = posts.iter().map(|p| p.author_id).collect();
        let users: Vec<User> = sqlx::query_as("SELECT id, email, name FROM users WHERE id = ANY($1)")
            .bind(&author_ids)
            .fetch_all(&mut *conn)
            .await
            .map_err(classify(Some(Entity::User)))?;
        authors.extend(users.into_iter().map(|u| (u.id, u)));
    }

    let mut categories: HashMap<i64, Vec<Category>> = HashMap::new();
    if include.categories {
        let rows: Vec<(i64, i64, String)> = sqlx::query_as(
            "SELECT pc.post_id, c.id, c.name FROM post_categories pc \
             JOIN categories c ON c.id = pc.category_id \
             WHERE pc.post_id = ANY($1) ORDER BY c.id",
        )
        .bind(&post_ids)
        .fetch_all(&mut *conn)
        .await
        .map_err(classify(Some(Entity::Category)))?;
        for (post_id, id, name) in rows {
            categories.entry(post_id).or_default().push(Category { id, name });
        }
    }

    let mut tags: HashMap<i64, Vec<Tag>> = HashMap::new();
    if include.tags {
        let rows: Vec<(i64, i64, String)> = sqlx::query_as(
            "SELECT pt.post_id, t.id, t.name FROM post_tags pt \
             JOIN tags t ON t.id = pt.tag_id \
             WHERE pt.post_id = ANY($1) ORDER BY t.id",
        )
        .bind(&post_ids)
        .fetch_all(&mut *conn)
        .await
        .map_err(classify(Some(Entity::Tag)))?;
        for (post_id, id, name) in rows {
            tags.entry(post_id).or_default().push(Tag { id, name });
        }
    }

    Ok(posts
        .into_iter()
        .map(|post| PostRecord {
            author: include.author.then(|| authors.get(&post.author_id).cloned()).flatten(),
            categories: include.categories.then(|| categories.remove(&post.id).unwrap_or_default()),
            tags: include.tags.then(|| tags.remove(&post.id).unwrap_or_default()),
            post,
        })
        .collect())
}

async fn find_post_in(
    conn: &mut PgConnection,
    id: i64,
    include: Include,
) -> StoreResult<Option<PostRecord>> {
    let post: Option<Post> = sqlx::query_as(&format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.id = $1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(classify(Some(Entity::Post)))?;
    match post {
        Some(post) => Ok(expand(conn, vec![post], include).await?.pop()),
        None => Ok(None),
    }
}

// ── Store ─────────────────────────────────────────────────────────────────────

#[async_trait]
impl Store for PgStore {
    async fn list_users(&self) -> StoreResult<Vec<UserRecord>> {
        let users: Vec<User> = sqlx::query_as("SELECT id, email, name FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(classify(Some(Entity::User)))?;
        let posts: Vec<Post> = sqlx::query_as(&format!("SELECT {POST_COLUMNS} FROM posts p ORDER BY p.id"))
            .fetch_all(&self.pool)
            .await
            .map_err(classify(Some(Entity::Post)))?;

        let mut by_author: HashMap<i64, Vec<Post>> = HashMap::new();
        for post in posts {
            by_author.entry(post.author_id).or_default().push(post);
        }
        Ok(users
            .into_iter()
            .map(|user| UserRecord { posts: by_author.remove(&user.id).unwrap_or_default(), user })
            .collect())
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        sqlx::query_as("INSERT INTO users (email, name) VALUES ($1, $2) RETURNING id, email, name")
            .bind(user.email)
            .bind(user.name)
            .fetch_one(&self.pool)
            .await
            .map_err(classify(Some(Entity::User)))
    }

    async fn find_posts(
        &self,
        filter: &PostFilter,
        page: Page,
        include: Include,
    ) -> StoreResult<Vec<PostRecord>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {POST_COLUMNS} FROM posts p"));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY p.id LIMIT ")
            .push_bind(page.limit() as i64)
            .push(" OFFSET ")
            .push_bind(page.offset() as i64);

        let mut conn = self.conn().await?;
        let posts: Vec<Post> = qb
            .build_query_as()
            .fetch_all(&mut *conn)
            .await
            .map_err(classify(Some(Entity::Post)))?;
        expand(&mut conn, posts, include).await
    }

    async fn count_posts(&self, filter: &PostFilter) -> StoreResult<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM posts p");
        push_filter(&mut qb, filter);
        let total: i64 = qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(classify(Some(Entity::Post)))?;
        Ok(total.max(0) as u64)
    }

    async fn create_post(&self, post: NewPost) -> StoreResult<Post> {
        sqlx::query_as(
            "INSERT INTO posts (title, content, author_id) VALUES ($1, $2, $3) \
             RETURNING id, title, content, published, author_id",
        )
        .bind(post.title)
        .bind(post.content)
        .bind(post.author_id)
        .fetch_one(&self.pool)
        .await
        .map_err(classify(Some(Entity::Post)))
    }

    async fn find_post(&self, id: i64, include: Include) -> StoreResult<Option<PostRecord>> {
        let mut conn = self.conn().await?;
        find_post_in(&mut conn, id, include).await
    }

    async fn update_post(&self, id: i64, changes: PostChanges) -> StoreResult<Post> {
        let post: Option<Post> = sqlx::query_as(
            "UPDATE posts SET title = COALESCE($2, title), content = COALESCE($3, content), \
             published = COALESCE($4, published) WHERE id = $1 \
             RETURNING id, title, content, published, author_id",
        )
        .bind(id)
        .bind(changes.title)
        .bind(changes.content)
        .bind(changes.published)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify(Some(Entity::Post)))?;
        post.ok_or_else(|| StoreError::not_found(Entity::Post, id))
    }

    async fn delete_post(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(classify(Some(Entity::Post)))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(Entity::Post, id));
        }
        debug!(id, "post deleted");
        Ok(())
    }

    async fn connect(&self, post_id: i64, connect: &Connect) -> StoreResult<PostRecord> {
        let (links, column, targets) = link_table(connect.relation);
        let target = connect.relation.target();
        let mut tx = self.pool.begin().await.map_err(classify(None))?;

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM posts WHERE id = $1 FOR UPDATE")
            .bind(post_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(classify(Some(Entity::Post)))?;
        if exists.is_none() {
            return Err(StoreError::not_found(Entity::Post, post_id));
        }

        if !connect.is_empty() {
            let found: Vec<i64> = sqlx::query_scalar(&format!("SELECT id FROM {targets} WHERE id = ANY($1)"))
                .bind(&connect.ids)
                .fetch_all(&mut *tx)
                .await
                .map_err(classify(Some(target)))?;
            let missing = missing_ids(&connect.ids, found);
            if !missing.is_empty() {
                return Err(StoreError::missing(target, missing));
            }

            sqlx::query(&format!(
                "INSERT INTO {links} (post_id, {column}) SELECT $1, UNNEST($2::bigint[]) ON CONFLICT DO NOTHING"
            ))
            .bind(post_id)
            .bind(&connect.ids)
            .execute(&mut *tx)
            .await
            .map_err(classify(Some(target)))?;
        }

        let record = find_post_in(&mut tx, post_id, connect.relation.include())
            .await?
            .ok_or_else(|| StoreError::not_found(Entity::Post, post_id))?;
        tx.commit().await.map_err(classify(None))?;
        Ok(record)
    }

    async fn create_comment(&self, comment: NewComment) -> StoreResult<CommentRecord> {
        let mut conn = self.conn().await?;
        let comment: Comment = sqlx::query_as(
            "INSERT INTO comments (text, post_id, author_id) VALUES ($1, $2, $3) \
             RETURNING id, text, post_id, author_id",
        )
        .bind(comment.text)
        .bind(comment.post_id)
        .bind(comment.author_id)
        .fetch_one(&mut *conn)
        .await
        .map_err(classify(Some(Entity::Comment)))?;

        let author: User = sqlx::query_as("SELECT id, email, name FROM users WHERE id = $1")
            .bind(comment.author_id)
            .fetch_one(&mut *conn)
            .await
            .map_err(classify(Some(Entity::User)))?;
        Ok(CommentRecord { comment, author })
    }

    async fn find_comments(&self, post_id: i64) -> StoreResult<Vec<CommentRecord>> {
        let rows: Vec<(i64, String, i64, i64, String, Option<String>)> = sqlx::query_as(
            "SELECT c.id, c.text, c.post_id, c.author_id, u.email, u.name FROM comments c \
             JOIN users u ON u.id = c.author_id WHERE c.post_id = $1 ORDER BY c.id",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(classify(Some(Entity::Comment)))?;

        Ok(rows
            .into_iter()
            .map(|(id, text, post_id, author_id, email, name)| CommentRecord {
                comment: Comment { id, text, post_id, author_id },
                author: User { id: author_id, email, name },
            })
            .collect())
    }

    async fn create_category(&self, name: &str) -> StoreResult<Category> {
        sqlx::query_as("INSERT INTO categories (name) VALUES ($1) RETURNING id, name")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(classify(Some(Entity::Category)))
    }

    async fn create_tag(&self, name: &str) -> StoreResult<Tag> {
        sqlx::query_as("INSERT INTO tags (name) VALUES ($1) RETURNING id, name")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(classify(Some(Entity::Tag)))
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(classify(None))
    }
}
