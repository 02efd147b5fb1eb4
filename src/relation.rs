//! Additive many-to-many linking for posts.
//!
//! `PUT /posts/{id}/categories` and `PUT /posts/{id}/tags` turn their id
//! arrays into a [`Connect`] instruction. Connecting never removes existing
//! links; ids already linked are left as they are.

use std::collections::HashSet;

use crate::model::Include;
use crate::store::Entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Categories,
    Tags,
}

impl Relation {
    /// The entity on the far side of the link table.
    pub fn target(self) -> Entity {
        match self {
            Self::Categories => Entity::Category,
            Self::Tags       => Entity::Tag,
        }
    }

    /// The relation to load when returning the post after connecting.
    pub fn include(self) -> Include {
        match self {
            Self::Categories => Include::CATEGORIES,
            Self::Tags       => Include::TAGS,
        }
    }
}

/// "Link these existing records to the post", with duplicates removed and
/// first-seen order kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connect {
    pub relation: Relation,
    pub ids: Vec<i64>,
}

impl Connect {
    pub fn new(relation: Relation, ids: impl IntoIterator<Item = i64>) -> Self {
        let mut seen = HashSet::new();
        let ids = ids.into_iter().filter(|id| seen.insert(*id)).collect();
        Self { relation, ids }
    }

    pub fn categories(ids: impl IntoIterator<Item = i64>) -> Self {
        Self::new(Relation::Categories, ids)
    }

    pub fn tags(ids: impl IntoIterator<Item = i64>) -> Self {
        Self::new(Relation::Tags, ids)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
