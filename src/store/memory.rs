//! In-process store.
//!
//! Tables live behind one `RwLock`, so every trait call is atomic. Writes
//! check the same constraints a relational schema would: unique emails and
//! names, references to existing rows, and cascade on post delete.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{Entity, Store, StoreError, StoreResult};
use crate::filter::PostFilter;
use crate::model::{
    Category, Comment, CommentRecord, Include, NewComment, NewPost, NewUser, Post, PostChanges,
    PostRecord, Tag, User, UserRecord,
};
use crate::pagination::Page;
use crate::relation::{Connect, Relation};

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Monotonic id source; ids are never reused after a delete.
#[derive(Default)]
struct Sequence(i64);

impl Sequence {
    fn next(&mut self) -> i64 {
        self.0 += 1;
        self.0
    }
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    posts: BTreeMap<i64, Post>,
    categories: BTreeMap<i64, Category>,
    tags: BTreeMap<i64, Tag>,
    comments: BTreeMap<i64, Comment>,
    // (post_id, category_id) / (post_id, tag_id)
    post_categories: BTreeSet<(i64, i64)>,
    post_tags: BTreeSet<(i64, i64)>,

    user_seq: Sequence,
    post_seq: Sequence,
    category_seq: Sequence,
    tag_seq: Sequence,
    comment_seq: Sequence,
}

impl Tables {
    fn linked(links: &BTreeSet<(i64, i64)>, post_id: i64) -> impl Iterator<Item = i64> + '_ {
        links.range((post_id, i64::MIN)..=(post_id, i64::MAX)).map(|&(_, id)| id)
    }

    fn categories_of(&self, post_id: i64) -> Vec<Category> {
        Self::linked(&self.post_categories, post_id)
            .filter_map(|id| self.categories.get(&id).cloned())
            .collect()
    }

    fn tags_of(&self, post_id: i64) -> Vec<Tag> {
        Self::linked(&self.post_tags, post_id)
            .filter_map(|id| self.tags.get(&id).cloned())
            .collect()
    }

    fn matches(&self, filter: &PostFilter, post: &Post) -> bool {
        filter.matches(
            post,
            |name| self.categories_of(post.id).iter().any(|c| c.name == name),
            |name| self.tags_of(post.id).iter().any(|t| t.name == name),
        )
    }

    fn expand(&self, post: &Post, include: Include) -> PostRecord {
        PostRecord {
            post: post.clone(),
            author: include.author.then(|| self.users.get(&post.author_id).cloned()).flatten(),
            categories: include.categories.then(|| self.categories_of(post.id)),
            tags: include.tags.then(|| self.tags_of(post.id)),
        }
    }

    fn comment_record(&self, comment: &Comment) -> Option<CommentRecord> {
        let author = self.users.get(&comment.author_id)?.clone();
        Some(CommentRecord { comment: comment.clone(), author })
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_users(&self) -> StoreResult<Vec<UserRecord>> {
        let t = self.tables.read().await;
        Ok(t.users.values()
            .map(|user| UserRecord {
                user: user.clone(),
                posts: t.posts.values().filter(|p| p.author_id == user.id).cloned().collect(),
            })
            .collect())
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut t = self.tables.write().await;
        if t.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::unique(Entity::User, "email already taken"));
        }
        let id = t.user_seq.next();
        let user = User { id, email: user.email, name: user.name };
        t.users.insert(id, user.clone());
        debug!(id, "user created");
        Ok(user)
    }

    async fn find_posts(
        &self,
        filter: &PostFilter,
        page: Page,
        include: Include,
    ) -> StoreResult<Vec<PostRecord>> {
        let t = self.tables.read().await;
        let skip = usize::try_from(page.offset()).unwrap_or(usize::MAX);
        let take = usize::try_from(page.limit()).unwrap_or(usize::MAX);
        Ok(t.posts.values()
            .filter(|post| t.matches(filter, post))
            .skip(skip)
            .take(take)
            .map(|post| t.expand(post, include))
            .collect())
    }

    async fn count_posts(&self, filter: &PostFilter) -> StoreResult<u64> {
        let t = self.tables.read().await;
        if filter.is_empty() {
            return Ok(t.posts.len() as u64);
        }
        Ok(t.posts.values().filter(|post| t.matches(filter, post)).count() as u64)
    }

    async fn create_post(&self, post: NewPost) -> StoreResult<Post> {
        let mut t = self.tables.write().await;
        if !t.users.contains_key(&post.author_id) {
            return Err(StoreError::foreign_key(
                Entity::Post,
                format!("author {} does not exist", post.author_id),
            ));
        }
        let id = t.post_seq.next();
        let post = Post {
            id,
            title: post.title,
            content: post.content,
            published: false,
            author_id: post.author_id,
        };
        t.posts.insert(id, post.clone());
        debug!(id, "post created");
        Ok(post)
    }

    async fn find_post(&self, id: i64, include: Include) -> StoreResult<Option<PostRecord>> {
        let t = self.tables.read().await;
        Ok(t.posts.get(&id).map(|post| t.expand(post, include)))
    }

    async fn update_post(&self, id: i64, changes: PostChanges) -> StoreResult<Post> {
        let mut t = self.tables.write().await;
        let post = t.posts.get_mut(&id).ok_or_else(|| StoreError::not_found(Entity::Post, id))?;
        if let Some(title) = changes.title {
            post.title = title;
        }
        if let Some(content) = changes.content {
            post.content = content;
        }
        if let Some(published) = changes.published {
            post.published = published;
        }
        Ok(post.clone())
    }

    async fn delete_post(&self, id: i64) -> StoreResult<()> {
        let mut t = self.tables.write().await;
        if t.posts.remove(&id).is_none() {
            return Err(StoreError::not_found(Entity::Post, id));
        }
        t.comments.retain(|_, c| c.post_id != id);
        t.post_categories.retain(|&(post_id, _)| post_id != id);
        t.post_tags.retain(|&(post_id, _)| post_id != id);
        debug!(id, "post deleted");
        Ok(())
    }

    async fn connect(&self, post_id: i64, connect: &Connect) -> StoreResult<PostRecord> {
        let mut t = self.tables.write().await;
        if !t.posts.contains_key(&post_id) {
            return Err(StoreError::not_found(Entity::Post, post_id));
        }

        let missing: Vec<i64> = connect.ids.iter()
            .copied()
            .filter(|id| match connect.relation {
                Relation::Categories => !t.categories.contains_key(id),
                Relation::Tags       => !t.tags.contains_key(id),
            })
            .collect();
        if !missing.is_empty() {
            return Err(StoreError::missing(connect.relation.target(), missing));
        }

        let links = match connect.relation {
            Relation::Categories => &mut t.post_categories,
            Relation::Tags       => &mut t.post_tags,
        };
        links.extend(connect.ids.iter().map(|&id| (post_id, id)));

        let post = &t.posts[&post_id];
        Ok(t.expand(post, connect.relation.include()))
    }

    async fn create_comment(&self, comment: NewComment) -> StoreResult<CommentRecord> {
        let mut t = self.tables.write().await;
        if !t.posts.contains_key(&comment.post_id) || !t.users.contains_key(&comment.author_id) {
            return Err(StoreError::foreign_key(
                Entity::Comment,
                format!("post {} or author {} does not exist", comment.post_id, comment.author_id),
            ));
        }
        let id = t.comment_seq.next();
        let comment = Comment {
            id,
            text: comment.text,
            post_id: comment.post_id,
            author_id: comment.author_id,
        };
        t.comments.insert(id, comment.clone());
        t.comment_record(&comment)
            .ok_or_else(|| StoreError::other("comment author vanished"))
    }

    async fn find_comments(&self, post_id: i64) -> StoreResult<Vec<CommentRecord>> {
        let t = self.tables.read().await;
        Ok(t.comments.values()
            .filter(|c| c.post_id == post_id)
            .filter_map(|c| t.comment_record(c))
            .collect())
    }

    async fn create_category(&self, name: &str) -> StoreResult<Category> {
        let mut t = self.tables.write().await;
        if t.categories.values().any(|c| c.name == name) {
            return Err(StoreError::unique(Entity::Category, "name already taken"));
        }
        let id = t.category_seq.next();
        let category = Category { id, name: name.to_owned() };
        t.categories.insert(id, category.clone());
        Ok(category)
    }

    async fn create_tag(&self, name: &str) -> StoreResult<Tag> {
        let mut t = self.tables.write().await;
        if t.tags.values().any(|tag| tag.name == name) {
            return Err(StoreError::unique(Entity::Tag, "name already taken"));
        }
        let id = t.tag_seq.next();
        let tag = Tag { id, name: name.to_owned() };
        t.tags.insert(id, tag.clone());
        Ok(tag)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreErrorKind;

    async fn seeded() -> (MemoryStore, User) {
        let store = MemoryStore::new();
        let user = store
            .create_user(NewUser { email: "a@x.com".into(), name: Some("Ann".into()) })
            .await
            .unwrap();
        (store, user)
    }

    async fn post(store: &MemoryStore, author_id: i64, title: &str) -> Post {
        store
            .create_post(NewPost { title: title.into(), content: "body".into(), author_id })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn duplicate_email_is_a_unique_violation() {
        let (store, _) = seeded().await;
        let err = store
            .create_user(NewUser { email: "a@x.com".into(), name: None })
            .await
            .unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::UniqueViolation);
        assert_eq!(store.list_users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn post_needs_an_existing_author() {
        let (store, _) = seeded().await;
        let err = store
            .create_post(NewPost { title: "t".into(), content: "c".into(), author_id: 99 })
            .await
            .unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::ForeignKeyViolation);
        assert_eq!(err.entity, Some(Entity::Post));
    }

    #[tokio::test]
    async fn new_posts_are_unpublished_and_ids_are_not_reused() {
        let (store, user) = seeded().await;
        let first = post(&store, user.id, "one").await;
        assert!(!first.published);
        store.delete_post(first.id).await.unwrap();
        let second = post(&store, user.id, "two").await;
        assert_eq!(second.id, first.id + 1);
    }

    #[tokio::test]
    async fn connect_is_additive_and_idempotent() {
        let (store, user) = seeded().await;
        let p = post(&store, user.id, "p").await;
        for name in ["a", "b", "c"] {
            store.create_category(name).await.unwrap();
        }
        store.connect(p.id, &Connect::categories([3])).await.unwrap();
        store.connect(p.id, &Connect::categories([1, 2, 3])).await.unwrap();
        let record = store.find_post(p.id, Include::CATEGORIES).await.unwrap().unwrap();
        let ids: Vec<i64> = record.categories.unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(record.tags.is_none());
    }

    #[tokio::test]
    async fn connect_with_dangling_ids_links_nothing() {
        let (store, user) = seeded().await;
        let p = post(&store, user.id, "p").await;
        store.create_tag("rust").await.unwrap();
        let err = store.connect(p.id, &Connect::tags([1, 7, 8])).await.unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::NotFound);
        assert_eq!(err.entity, Some(Entity::Tag));
        assert_eq!(err.missing_ids, vec![7, 8]);
        let record = store.find_post(p.id, Include::TAGS).await.unwrap().unwrap();
        assert_eq!(record.tags, Some(vec![]));
    }

    #[tokio::test]
    async fn connect_to_missing_post_is_not_found() {
        let (store, _) = seeded().await;
        let err = store.connect(5, &Connect::tags([])).await.unwrap_err();
        assert_eq!((err.kind, err.entity), (StoreErrorKind::NotFound, Some(Entity::Post)));
    }

    #[tokio::test]
    async fn delete_cascades_comments_and_links() {
        let (store, user) = seeded().await;
        let p = post(&store, user.id, "p").await;
        store.create_category("news").await.unwrap();
        store.connect(p.id, &Connect::categories([1])).await.unwrap();
        store
            .create_comment(NewComment { text: "hi".into(), post_id: p.id, author_id: user.id })
            .await
            .unwrap();

        store.delete_post(p.id).await.unwrap();

        assert!(store.find_comments(p.id).await.unwrap().is_empty());
        let filter = PostFilter::build(Some("news"), None, None);
        assert_eq!(store.count_posts(&filter).await.unwrap(), 0);
        let err = store.delete_post(p.id).await.unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::NotFound);
    }

    #[tokio::test]
    async fn find_posts_windows_the_filtered_rows() {
        let (store, user) = seeded().await;
        for i in 1..=25 {
            let p = post(&store, user.id, &format!("post {i}")).await;
            if i % 2 == 0 {
                store
                    .update_post(p.id, PostChanges { published: Some(true), ..Default::default() })
                    .await
                    .unwrap();
            }
        }
        let published = PostFilter::build(None, None, Some("true"));
        assert_eq!(store.count_posts(&published).await.unwrap(), 12);

        let page = Page::new(2, 5).unwrap();
        let rows = store.find_posts(&published, page, Include::ALL).await.unwrap();
        let ids: Vec<i64> = rows.iter().map(|r| r.post.id).collect();
        assert_eq!(ids, vec![12, 14, 16, 18, 20]);
        assert_eq!(rows[0].author.as_ref().map(|a| a.id), Some(user.id));

        let beyond = Page::new(4, 5).unwrap();
        assert!(store.find_posts(&published, beyond, Include::NONE).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn comment_needs_post_and_author() {
        let (store, user) = seeded().await;
        let p = post(&store, user.id, "p").await;
        for (post_id, author_id) in [(p.id, 42), (42, user.id)] {
            let err = store
                .create_comment(NewComment { text: "x".into(), post_id, author_id })
                .await
                .unwrap_err();
            assert_eq!(err.kind, StoreErrorKind::ForeignKeyViolation);
        }
        assert!(store.find_comments(p.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn users_list_their_posts() {
        let (store, user) = seeded().await;
        post(&store, user.id, "mine").await;
        let users = store.list_users().await.unwrap();
        assert_eq!(users[0].posts.len(), 1);
        assert_eq!(users[0].posts[0].title, "mine");
    }
}
