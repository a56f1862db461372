use std::path::PathBuf;

use axum::extract::Query;
use axum::http::{header, HeaderMap};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use axum_extra::headers::UserAgent;
use axum_extra::TypedHeader;
use serde::Deserialize;

use ranged_download::{static_body, BufferResource, Disposition, FileResource, Ranged};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let router = Router::new()
        .route("/", get(|| async { "Hello, World!" }))
        .route("/file", get(get_file))
        .route("/text", get(get_text));

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
    tracing::info!("listening on {}", listener.local_addr().unwrap());
    axum::serve(listener, router).await.unwrap();
}

#[derive(Debug, Deserialize)]
struct FileRequest {
    path: PathBuf,
    #[serde(default)]
    disposition: Disposition,
    #[serde(default = "unlimited")]
    limit_kb: i64,
}

fn unlimited() -> i64 {
    -1
}

fn range(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

async fn get_file(
    user_agent: Option<TypedHeader<UserAgent>>,
    headers: HeaderMap,
    Query(q): Query<FileRequest>,
) -> impl IntoResponse {
    let resource = FileResource::open(&q.path).await;
    Ranged::new(range(&headers), resource)
        .user_agent(user_agent.map(|TypedHeader(ua)| ua.as_str().to_owned()))
        .disposition(q.disposition)
        .limit_rate_kb(q.limit_kb)
        .on_not_found(static_body("File not found"))
        .on_range_not_satisfiable(static_body("Range not satisfiable"))
}

async fn get_text(headers: HeaderMap) -> impl IntoResponse {
    let resource = BufferResource::new("0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz")
        .with_mime_type("text/plain");
    Ranged::new(range(&headers), resource)
        .inline()
        .on_range_not_satisfiable(static_body("Range not satisfiable"))
}
