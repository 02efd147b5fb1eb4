//! pressroom over a seeded in-memory store.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users
//!   curl 'http://localhost:3000/posts?published=true&limit=5'
//!   curl 'http://localhost:3000/posts?category=rust'
//!   curl -X PUT http://localhost:3000/posts/1/tags \
//!        -H 'content-type: application/json' \
//!        -d '{"tagIds":[1,2]}'
//!   curl -X POST http://localhost:3000/posts/1/comments \
//!        -H 'content-type: application/json' \
//!        -d '{"text":"Nice one","authorId":1}'
//!   curl http://localhost:3000/readyz

use std::sync::Arc;

use pressroom::model::{NewPost, NewUser, PostChanges};
use pressroom::relation::Connect;
use pressroom::store::{MemoryStore, Store};
use pressroom::{Server, app};

#[tokio::main]
async fn main() -> Result<(), pressroom::Error> {
    tracing_subscriber::fmt::init();

    let store = MemoryStore::new();
    seed(&store).await?;

    Server::bind(([0, 0, 0, 0], 3000)).serve(app(Arc::new(store))).await
}

// One author, ten posts, every other one published. The first post gets a
// category and both tags.
async fn seed(store: &MemoryStore) -> Result<(), pressroom::Error> {
    let author = store
        .create_user(NewUser { email: "ada@example.com".into(), name: Some("Ada".into()) })
        .await?;

    let rust = store.create_category("rust").await?;
    let web = store.create_tag("web").await?;
    let async_tag = store.create_tag("async").await?;

    for n in 1..=10 {
        let post = store
            .create_post(NewPost {
                title: format!("Post {n}"),
                content: format!("Body of post {n}"),
                author_id: author.id,
            })
            .await?;

        if n % 2 == 0 {
            let changes = PostChanges { published: Some(true), ..PostChanges::default() };
            store.update_post(post.id, changes).await?;
        }
        if n == 1 {
            store.connect(post.id, &Connect::categories([rust.id])).await?;
            store.connect(post.id, &Connect::tags([web.id, async_tag.id])).await?;
        }
    }

    Ok(())
}
