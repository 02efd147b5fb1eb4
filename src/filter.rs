//! Post listing filter.
//!
//! Turns the optional `category`, `tag` and `published` query parameters into
//! a [`PostFilter`]. Absent or empty parameters impose no constraint; the
//! rest are AND-combined. Names compare by exact, case-sensitive equality.

use crate::model::Post;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilter {
    /// At least one linked category has exactly this name.
    pub category: Option<String>,
    /// At least one linked tag has exactly this name.
    pub tag: Option<String>,
    pub published: Option<bool>,
}

impl PostFilter {
    /// `published` matches `true` only for the literal string `"true"`; any
    /// other non-empty value means `false`.
    pub fn build(category: Option<&str>, tag: Option<&str>, published: Option<&str>) -> Self {
        Self {
            category: non_empty(category).map(str::to_owned),
            tag: non_empty(tag).map(str::to_owned),
            published: non_empty(published).map(|p| p == "true"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.category.is_none() && self.tag.is_none() && self.published.is_none()
    }

    /// Evaluates the filter against one post. The closures report whether the
    /// post is linked to a category / tag with the given name.
    pub fn matches(
        &self,
        post: &Post,
        has_category: impl Fn(&str) -> bool,
        has_tag: impl Fn(&str) -> bool,
    ) -> bool {
        self.published.is_none_or(|p| post.published == p)
            && self.category.as_deref().is_none_or(&has_category)
            && self.tag.as_deref().is_none_or(&has_tag)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
