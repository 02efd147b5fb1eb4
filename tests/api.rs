use std::sync::Arc;

use bytes::Bytes;
use http::{Method, StatusCode};
use serde_json::{Value, json};

use pressroom::store::{Db, MemoryStore};
use pressroom::{Router, app};

fn fresh() -> Router<Db> {
    app(Arc::new(MemoryStore::new()))
}

async fn send(app: &Router<Db>, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = http::Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            builder = builder.header("content-type", "application/json");
            Bytes::from(serde_json::to_vec(&v).unwrap())
        }
        None => Bytes::new(),
    };
    let response = app.call(builder.body(body).unwrap()).await;
    let status = response.status_code();
    let value = if response.body().is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(response.body())
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(response.body()).into_owned()))
    };
    (status, value)
}

async fn user(app: &Router<Db>, email: &str) -> i64 {
    let (status, body) = send(app, Method::POST, "/users", Some(json!({ "email": email, "name": "Ann" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    body["user"]["id"].as_i64().unwrap()
}

async fn post(app: &Router<Db>, author: i64, title: &str) -> i64 {
    let (status, body) = send(
        app,
        Method::POST,
        "/posts",
        Some(json!({ "title": title, "content": "body", "authorId": author })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["post"]["id"].as_i64().unwrap()
}

async fn category(app: &Router<Db>, name: &str) -> i64 {
    let (status, body) = send(app, Method::POST, "/categories", Some(json!({ "name": name }))).await;
    assert_eq!(status, StatusCode::CREATED);
    body["category"]["id"].as_i64().unwrap()
}

async fn tag(app: &Router<Db>, name: &str) -> i64 {
    let (status, body) = send(app, Method::POST, "/tags", Some(json!({ "name": name }))).await;
    assert_eq!(status, StatusCode::CREATED);
    body["tag"]["id"].as_i64().unwrap()
}

// ── Users ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let app = fresh();
    user(&app, "a@x.com").await;

    let (status, body) = send(&app, Method::POST, "/users", Some(json!({ "email": "a@x.com" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, json!({ "error": "Email already exists" }));

    let (_, body) = send(&app, Method::GET, "/users", None).await;
    assert_eq!(body["users"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn users_are_listed_with_their_posts() {
    let app = fresh();
    let ann = user(&app, "a@x.com").await;
    post(&app, ann, "first").await;

    let (status, body) = send(&app, Method::GET, "/users", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["users"][0]["email"], "a@x.com");
    assert_eq!(body["users"][0]["posts"][0]["title"], "first");
}

#[tokio::test]
async fn malformed_body_is_a_bad_request() {
    let app = fresh();
    let request = http::Request::builder()
        .method(Method::POST)
        .uri("/users")
        .body(Bytes::from_static(b"{not json"))
        .unwrap();
    let response = app.call(request).await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, Method::POST, "/posts", Some(json!({ "title": "t" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Invalid JSON body" }));
}

// ── Posts ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn post_with_unknown_author_is_not_found() {
    let app = fresh();
    let (status, body) = send(
        &app,
        Method::POST,
        "/posts",
        Some(json!({ "title": "t", "content": "c", "authorId": 999 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Author not found" }));
}

#[tokio::test]
async fn created_post_points_at_itself() {
    let app = fresh();
    let ann = user(&app, "a@x.com").await;
    let request = http::Request::builder()
        .method(Method::POST)
        .uri("/posts")
        .body(Bytes::from(json!({ "title": "t", "content": "c", "authorId": ann }).to_string()))
        .unwrap();
    let response = app.call(request).await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    assert_eq!(response.header("content-type"), Some("application/json"));

    let body: Value = serde_json::from_slice(response.body()).unwrap();
    let id = body["post"]["id"].as_i64().unwrap();
    let location = format!("/posts/{id}");
    assert_eq!(response.header("location"), Some(location.as_str()));

    let (status, _) = send(&app, Method::GET, &location, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn created_post_is_unpublished_and_accepts_string_author_id() {
    let app = fresh();
    let ann = user(&app, "a@x.com").await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/posts",
        Some(json!({ "title": "t", "content": "c", "authorId": ann.to_string() })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["post"]["published"], false);
    assert_eq!(body["post"]["authorId"], ann);
}

#[tokio::test]
async fn single_post_embeds_its_author() {
    let app = fresh();
    let ann = user(&app, "a@x.com").await;
    let id = post(&app, ann, "hello").await;

    let (status, body) = send(&app, Method::GET, &format!("/posts/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["post"]["title"], "hello");
    assert_eq!(body["post"]["author"]["email"], "a@x.com");
}

#[tokio::test]
async fn unknown_and_invalid_post_ids() {
    let app = fresh();

    let (status, body) = send(&app, Method::GET, "/posts/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Post not found" }));

    let (status, body) = send(&app, Method::PUT, "/posts/999", Some(json!({ "title": "x" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Post not found" }));

    let (status, body) = send(&app, Method::GET, "/posts/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Invalid id" }));
}

#[tokio::test]
async fn update_returns_the_bare_post() {
    let app = fresh();
    let ann = user(&app, "a@x.com").await;
    let id = post(&app, ann, "draft").await;

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/posts/{id}"),
        Some(json!({ "title": "final", "published": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id);
    assert_eq!(body["title"], "final");
    assert_eq!(body["content"], "body");
    assert_eq!(body["published"], true);
}

#[tokio::test]
async fn delete_then_get_is_not_found() {
    let app = fresh();
    let ann = user(&app, "a@x.com").await;
    let id = post(&app, ann, "doomed").await;
    let uri = format!("/posts/{id}");

    let (status, body) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, _) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Listing ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn pagination_counts_every_match() {
    let app = fresh();
    let ann = user(&app, "a@x.com").await;
    for n in 0..25 {
        post(&app, ann, &format!("p{n}")).await;
    }

    let (status, body) = send(&app, Method::GET, "/posts?page=2&limit=10", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["posts"].as_array().unwrap().len(), 10);
    assert_eq!(body["posts"][0]["title"], "p10");
    assert_eq!(body["pagination"], json!({ "page": 2, "limit": 10, "total": 25, "totalPages": 3 }));

    let (_, body) = send(&app, Method::GET, "/posts?page=9", None).await;
    assert_eq!(body["posts"], json!([]));
    assert_eq!(body["pagination"]["total"], 25);
}

#[tokio::test]
async fn listing_defaults_and_rejects_negative_pages() {
    let app = fresh();

    let (status, body) = send(&app, Method::GET, "/posts?page=abc&limit=0", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"], json!({ "page": 1, "limit": 10, "total": 0, "totalPages": 0 }));

    let (status, body) = send(&app, Method::GET, "/posts?page=-1", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Invalid pagination parameters" }));
}

#[tokio::test]
async fn listing_filters_by_category_and_published() {
    let app = fresh();
    let ann = user(&app, "a@x.com").await;
    let tech = category(&app, "tech").await;
    let tagged = post(&app, ann, "tagged").await;
    let plain = post(&app, ann, "plain").await;

    send(&app, Method::PUT, &format!("/posts/{tagged}/categories"), Some(json!({ "categoryIds": [tech] }))).await;
    send(&app, Method::PUT, &format!("/posts/{plain}"), Some(json!({ "published": true }))).await;

    let (_, body) = send(&app, Method::GET, "/posts?category=tech", None).await;
    let posts = body["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["id"], tagged);
    assert_eq!(posts[0]["categories"][0]["name"], "tech");
    assert_eq!(posts[0]["author"]["id"], ann);
    assert_eq!(posts[0]["tags"], json!([]));

    let (_, body) = send(&app, Method::GET, "/posts?category=Tech", None).await;
    assert_eq!(body["pagination"]["total"], 0);

    let (_, body) = send(&app, Method::GET, "/posts?published=true", None).await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["posts"][0]["id"], plain);

    let (_, body) = send(&app, Method::GET, "/posts?published=yes", None).await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["posts"][0]["id"], tagged);

    let (_, body) = send(&app, Method::GET, "/posts?published=", None).await;
    assert_eq!(body["pagination"]["total"], 2);
}

#[tokio::test]
async fn publishing_moves_a_post_between_filters() {
    let app = fresh();
    let ann = user(&app, "a@x.com").await;
    let id = post(&app, ann, "draft").await;

    let (_, body) = send(&app, Method::GET, "/posts?published=false", None).await;
    assert_eq!(body["posts"][0]["id"], id);

    send(&app, Method::PUT, &format!("/posts/{id}"), Some(json!({ "published": true }))).await;

    let (_, body) = send(&app, Method::GET, "/posts?published=true", None).await;
    assert_eq!(body["posts"][0]["id"], id);
    let (_, body) = send(&app, Method::GET, "/posts?published=false", None).await;
    assert_eq!(body["pagination"]["total"], 0);
}

#[tokio::test]
async fn undecodable_filters_still_constrain_the_listing() {
    let app = fresh();
    let ann = user(&app, "a@x.com").await;
    post(&app, ann, "uncategorized").await;

    let (status, body) = send(&app, Method::GET, "/posts?category=caf%E9", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 0);

    let (_, body) = send(&app, Method::GET, "/posts?tag=%FF", None).await;
    assert_eq!(body["pagination"]["total"], 0);

    let (_, body) = send(&app, Method::GET, "/posts?published=%FF", None).await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["posts"][0]["published"], false);
}

#[tokio::test]
async fn trailing_slash_is_ignored() {
    let app = fresh();
    let ann = user(&app, "a@x.com").await;
    let id = post(&app, ann, "p").await;

    let (status, body) = send(&app, Method::GET, "/posts/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);

    let (status, body) = send(&app, Method::GET, &format!("/posts/{id}/"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["post"]["id"], id);
}

#[tokio::test]
async fn listing_filters_by_tag() {
    let app = fresh();
    let ann = user(&app, "a@x.com").await;
    let rust = tag(&app, "rust").await;
    let id = post(&app, ann, "tagged").await;
    post(&app, ann, "plain").await;

    send(&app, Method::PUT, &format!("/posts/{id}/tags"), Some(json!({ "tagIds": [rust] }))).await;

    let (_, body) = send(&app, Method::GET, "/posts?tag=rust&published=false", None).await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["posts"][0]["tags"][0]["name"], "rust");
}

// ── Categories, tags and connect ──────────────────────────────────────────────

#[tokio::test]
async fn duplicate_names_are_conflicts() {
    let app = fresh();
    category(&app, "tech").await;
    tag(&app, "rust").await;

    let (status, body) = send(&app, Method::POST, "/categories", Some(json!({ "name": "tech" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, json!({ "error": "Category already exists" }));

    let (status, body) = send(&app, Method::POST, "/tags", Some(json!({ "name": "rust" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, json!({ "error": "Tag already exists" }));
}

#[tokio::test]
async fn connect_is_additive() {
    let app = fresh();
    let ann = user(&app, "a@x.com").await;
    let id = post(&app, ann, "p").await;
    let ids: Vec<i64> = [
        category(&app, "one").await,
        category(&app, "two").await,
        category(&app, "three").await,
    ]
    .into();
    let uri = format!("/posts/{id}/categories");

    send(&app, Method::PUT, &uri, Some(json!({ "categoryIds": [ids[2]] }))).await;
    let (status, body) = send(&app, Method::PUT, &uri, Some(json!({ "categoryIds": [ids[0], ids[1], ids[1]] }))).await;
    assert_eq!(status, StatusCode::OK);

    let linked: Vec<i64> = body["post"]["categories"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_i64().unwrap())
        .collect();
    assert_eq!(linked, ids);
    assert!(body["post"].get("tags").is_none());
}

#[tokio::test]
async fn connect_with_dangling_ids_links_nothing() {
    let app = fresh();
    let ann = user(&app, "a@x.com").await;
    let id = post(&app, ann, "p").await;
    let real = tag(&app, "real").await;

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/posts/{id}/tags"),
        Some(json!({ "tagIds": [real, 404] })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Tag not found", "missingIds": [404] }));

    let (_, body) = send(&app, Method::GET, "/posts?tag=real", None).await;
    assert_eq!(body["pagination"]["total"], 0);
}

#[tokio::test]
async fn connect_to_unknown_post_is_not_found() {
    let app = fresh();
    let tech = category(&app, "tech").await;
    let (status, body) = send(&app, Method::PUT, "/posts/77/categories", Some(json!({ "categoryIds": [tech] }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Post not found" }));
}

// ── Comments ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn comments_round_trip_with_author() {
    let app = fresh();
    let ann = user(&app, "a@x.com").await;
    let id = post(&app, ann, "p").await;
    let uri = format!("/posts/{id}/comments");

    let (status, body) = send(&app, Method::POST, &uri, Some(json!({ "text": "nice", "authorId": ann }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["comment"]["postId"], id);
    assert_eq!(body["comment"]["author"]["email"], "a@x.com");

    let (status, body) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["comments"][0]["text"], "nice");
}

#[tokio::test]
async fn comment_on_unknown_post_or_author_is_not_found() {
    let app = fresh();
    let ann = user(&app, "a@x.com").await;
    let id = post(&app, ann, "p").await;

    let (status, body) = send(&app, Method::POST, "/posts/999/comments", Some(json!({ "text": "x", "authorId": ann }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "Post or author not found" }));

    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/posts/{id}/comments"),
        Some(json!({ "text": "x", "authorId": 999 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, Method::GET, "/posts/999/comments", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "comments": [] }));
}

#[tokio::test]
async fn deleting_a_post_removes_its_comments() {
    let app = fresh();
    let ann = user(&app, "a@x.com").await;
    let id = post(&app, ann, "p").await;
    let uri = format!("/posts/{id}/comments");
    send(&app, Method::POST, &uri, Some(json!({ "text": "bye", "authorId": ann }))).await;

    send(&app, Method::DELETE, &format!("/posts/{id}"), None).await;

    let (_, body) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(body, json!({ "comments": [] }));
}

// ── Probes and routing ────────────────────────────────────────────────────────

#[tokio::test]
async fn health_probes_answer() {
    let app = fresh();
    assert_eq!(send(&app, Method::GET, "/healthz", None).await, (StatusCode::OK, json!("ok")));
    assert_eq!(send(&app, Method::GET, "/readyz", None).await, (StatusCode::OK, json!("ready")));
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let app = fresh();
    let (status, _) = send(&app, Method::PATCH, "/posts/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
