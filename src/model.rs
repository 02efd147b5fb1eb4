//! Records persisted by the store and the inputs that create them.
//!
//! Field names serialize as camelCase (`authorId`, `postId`), which is the
//! wire format every endpoint speaks.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

// ── Rows ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub published: bool,
    pub author_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Category {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub text: String,
    pub post_id: i64,
    pub author_id: i64,
}

// ── Expanded records ──────────────────────────────────────────────────────────

/// Which relations to load alongside a post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Include {
    pub author: bool,
    pub categories: bool,
    pub tags: bool,
}

impl Include {
    pub const NONE: Self = Self { author: false, categories: false, tags: false };
    pub const AUTHOR: Self = Self { author: true, ..Self::NONE };
    pub const CATEGORIES: Self = Self { categories: true, ..Self::NONE };
    pub const TAGS: Self = Self { tags: true, ..Self::NONE };
    pub const ALL: Self = Self { author: true, categories: true, tags: true };
}

/// A post plus whichever relations were requested. Relations that were not
/// requested are omitted from the JSON rather than sent as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostRecord {
    #[serde(flatten)]
    pub post: Post,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<Category>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Tag>>,
}

impl PostRecord {
    pub fn bare(post: Post) -> Self {
        Self { post, author: None, categories: None, tags: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentRecord {
    #[serde(flatten)]
    pub comment: Comment,
    pub author: User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    #[serde(flatten)]
    pub user: User,
    pub posts: Vec<Post>,
}

// ── Inputs ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewUser {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub title: String,
    pub content: String,
    #[serde(deserialize_with = "coerced_id")]
    pub author_id: i64,
}

/// Fields left out (or sent as `null`) are not changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PostChanges {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub published: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub text: String,
    pub post_id: i64,
    pub author_id: i64,
}

// ── Id coercion ───────────────────────────────────────────────────────────────

/// An id as clients send it: a JSON number or a numeric string (`7`, `"7"`,
/// `7.0`). Anything that is not a whole number is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoercedId(pub i64);

impl CoercedId {
    /// Parses a path segment or string body value.
    pub fn parse(raw: &str) -> Option<i64> {
        let raw = raw.trim();
        if let Ok(id) = raw.parse::<i64>() {
            return Some(id);
        }
        raw.parse::<f64>().ok().and_then(whole)
    }
}

// Largest magnitude an f64 holds without losing integer precision.
const MAX_EXACT: f64 = 9_007_199_254_740_992.0;

fn whole(value: f64) -> Option<i64> {
    (value.is_finite() && value.fract() == 0.0 && value.abs() <= MAX_EXACT).then_some(value as i64)
}

impl<'de> Deserialize<'de> for CoercedId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdVisitor;

        impl Visitor<'_> for IdVisitor {
            type Value = CoercedId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a whole number or a numeric string")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<CoercedId, E> {
                Ok(CoercedId(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<CoercedId, E> {
                i64::try_from(v)
                    .map(CoercedId)
                    .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(v), &self))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<CoercedId, E> {
                whole(v).map(CoercedId).ok_or_else(|| E::invalid_value(de::Unexpected::Float(v), &self))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<CoercedId, E> {
                CoercedId::parse(v).map(CoercedId).ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

fn coerced_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    CoercedId::deserialize(deserializer).map(|id| id.0)
}
