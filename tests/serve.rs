use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap};
use axum::routing::get;
use axum::Router;
use reqwest::StatusCode;
use serde::Deserialize;

use ranged_download::{static_body, FileResource, Ranged};

const CONTENT: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Deserialize)]
struct FileRequest {
    name: String,
}

fn header(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_owned)
}

async fn get_file(
    State(dir): State<PathBuf>,
    headers: HeaderMap,
    Query(q): Query<FileRequest>,
) -> Ranged<FileResource> {
    let resource = FileResource::open(dir.join(&q.name)).await;
    Ranged::new(header(&headers, header::RANGE), resource)
        .user_agent(header(&headers, header::USER_AGENT))
        .on_not_found(static_body("File not found"))
        .on_range_not_satisfiable(static_body("Range not satisfiable"))
}

struct Server {
    addr: SocketAddr,
    client: reqwest::Client,
    _dir: tempfile::TempDir,
}

impl Server {
    async fn start() -> Server {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("alphabet.txt")).unwrap();
        file.write_all(CONTENT.as_bytes()).unwrap();

        let app = Router::new()
            .route("/file", get(get_file))
            .with_state(dir.path().to_path_buf());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Server { addr, client: reqwest::Client::new(), _dir: dir }
    }

    async fn get(&self, name: &str, range: Option<&str>) -> reqwest::Response {
        let mut request = self
            .client
            .get(format!("http://{}/file?name={}", self.addr, name))
            .header(header::USER_AGENT, "Mozilla/5.0 Firefox/121.0");
        if let Some(range) = range {
            request = request.header(header::RANGE, range);
        }
        request.send().await.unwrap()
    }
}

#[tokio::test]
async fn test_full_body() {
    let server = Server::start().await;
    let response = server.get("alphabet.txt", None).await;

    assert_eq!(StatusCode::OK, response.status());
    let headers = response.headers();
    assert_eq!("bytes", headers["accept-ranges"]);
    assert_eq!("62", headers["content-length"]);
    assert_eq!("application/octet-stream", headers["content-type"]);
    assert_eq!("attachment; filename*=UTF-8''alphabet.txt", headers["content-disposition"]);
    assert!(headers["etag"].to_str().unwrap().starts_with("W/\""));
    assert_eq!(CONTENT, response.text().await.unwrap());
}

#[tokio::test]
async fn test_single_range() {
    let server = Server::start().await;
    let response = server.get("alphabet.txt", Some("bytes=10-19")).await;

    assert_eq!(StatusCode::PARTIAL_CONTENT, response.status());
    assert_eq!("bytes 10-19/62", response.headers()["content-range"]);
    assert_eq!("10", response.headers()["content-length"]);
    assert_eq!("ABCDEFGHIJ", response.text().await.unwrap());
}

#[tokio::test]
async fn test_multiple_ranges() {
    let server = Server::start().await;
    let response = server.get("alphabet.txt", Some("bytes=0-0,-1")).await;

    assert_eq!(StatusCode::PARTIAL_CONTENT, response.status());
    let content_type = response.headers()["content-type"].to_str().unwrap().to_owned();
    let boundary = content_type
        .strip_prefix("multipart/byteranges; boundary=")
        .expect("multipart content type")
        .to_owned();
    let content_length: usize = response.headers()["content-length"].to_str().unwrap().parse().unwrap();

    let body = response.text().await.unwrap();
    assert_eq!(content_length, body.len());
    assert_eq!(
        format!(
            "--{boundary}\r\nContent-Type: application/octet-stream\r\nContent-Range: bytes 0-0/62\r\n\r\n0\r\n\
             --{boundary}\r\nContent-Type: application/octet-stream\r\nContent-Range: bytes 61-61/62\r\n\r\nz\r\n\
             --{boundary}--\r\n"
        ),
        body
    );
}

#[tokio::test]
async fn test_range_not_satisfiable() {
    let server = Server::start().await;
    let response = server.get("alphabet.txt", Some("bytes=0-1999")).await;

    assert_eq!(StatusCode::RANGE_NOT_SATISFIABLE, response.status());
    assert_eq!("bytes */62", response.headers()["content-range"]);
    assert_eq!("Range not satisfiable", response.text().await.unwrap());
}

#[tokio::test]
async fn test_not_found() {
    let server = Server::start().await;
    let response = server.get("missing.txt", Some("bytes=0-9")).await;

    assert_eq!(StatusCode::NOT_FOUND, response.status());
    assert!(response.headers().get("accept-ranges").is_none());
    assert_eq!("File not found", response.text().await.unwrap());
}
