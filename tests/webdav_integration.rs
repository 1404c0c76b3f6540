//! End-to-end tests: a real axum server for the proxy talking, over real
//! HTTP, to a small in-process fake backend. Exercises the scenarios
//! called out for directory listing, split-file reconstruction, ranged
//! reads, sharded writes, and the front-side auth/redirect behavior.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;

use webdav_proxy::config::Config;
use webdav_proxy::webdav::{build_router, AppState};

#[derive(Default)]
struct FakeBackend {
    puts: Mutex<Vec<(String, Vec<u8>)>>,
}

async fn fake_backend_handler(State(state): State<Arc<FakeBackend>>, req: Request) -> Response {
    let method = req.method().as_str().to_string();
    let path = req.uri().path().to_string();

    match method.as_str() {
        "PROPFIND" if path == "/a/" => propfind_listing(),
        "GET" if path == "/a/file.txt" => get_file_txt(req),
        "GET" if path == "/a/big.dat.splitinfo" => get_manifest(),
        "PUT" => {
            let body = axum::body::to_bytes(req.into_body(), usize::MAX)
                .await
                .unwrap_or_default();
            state.puts.lock().unwrap().push((path, body.to_vec()));
            StatusCode::CREATED.into_response()
        }
        "MKCOL" => StatusCode::CREATED.into_response(),
        "DELETE" => StatusCode::NO_CONTENT.into_response(),
        "COPY" | "MOVE" => StatusCode::CREATED.into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

fn propfind_listing() -> Response {
    let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<D:multistatus xmlns:D="DAV:">
  <D:response>
    <D:href>/a/</D:href>
    <D:propstat><D:prop>
      <D:resourcetype><D:collection/></D:resourcetype>
      <D:displayname>a</D:displayname>
    </D:prop><D:status>HTTP/1.1 200 OK</D:status></D:propstat>
  </D:response>
  <D:response>
    <D:href>/a/file.txt</D:href>
    <D:propstat><D:prop>
      <D:resourcetype/>
      <D:getcontentlength>11</D:getcontentlength>
      <D:getcontenttype>text/plain</D:getcontenttype>
      <D:getetag>"etag1"</D:getetag>
      <D:displayname>file.txt</D:displayname>
    </D:prop><D:status>HTTP/1.1 200 OK</D:status></D:propstat>
  </D:response>
  <D:response>
    <D:href>/a/big.dat</D:href>
    <D:propstat><D:prop>
      <D:resourcetype/>
      <D:getcontentlength>0</D:getcontentlength>
      <D:getcontenttype>application/octet-stream</D:getcontenttype>
      <D:displayname>big.dat</D:displayname>
    </D:prop><D:status>HTTP/1.1 200 OK</D:status></D:propstat>
  </D:response>
  <D:response>
    <D:href>/a/big.dat.part001</D:href>
    <D:propstat><D:prop>
      <D:resourcetype/>
      <D:getcontentlength>10</D:getcontentlength>
    </D:prop><D:status>HTTP/1.1 200 OK</D:status></D:propstat>
  </D:response>
  <D:response>
    <D:href>/a/big.dat.splitinfo</D:href>
    <D:propstat><D:prop>
      <D:resourcetype/>
      <D:getcontentlength>80</D:getcontentlength>
    </D:prop><D:status>HTTP/1.1 200 OK</D:status></D:propstat>
  </D:response>
</D:multistatus>"#;
    Response::builder()
        .status(StatusCode::MULTI_STATUS)
        .header(header::CONTENT_TYPE, "application/xml")
        .body(Body::from(xml))
        .unwrap()
}

fn get_manifest() -> Response {
    let json = r#"{"meta":{"content_length":30},"splitFileList":[
        {"fileName":"big.dat","fileSize":20},
        {"fileName":"big.dat.part001","fileSize":10}
    ]}"#;
    Response::builder()
        .status(StatusCode::OK)
        .body(Body::from(json))
        .unwrap()
}

fn get_file_txt(req: Request) -> Response {
    const CONTENT: &[u8] = b"hello world";
    let range = req
        .headers()
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("bytes="))
        .and_then(|v| v.split('-').next())
        .and_then(|v| v.parse::<usize>().ok());

    match range {
        Some(start) if start < CONTENT.len() => Response::builder()
            .status(StatusCode::PARTIAL_CONTENT)
            .header(header::CONTENT_RANGE, format!("bytes {start}-{}/{}", CONTENT.len() - 1, CONTENT.len()))
            .body(Body::from(CONTENT[start..].to_vec()))
            .unwrap(),
        _ => Response::builder()
            .status(StatusCode::OK)
            .body(Body::from(CONTENT.to_vec()))
            .unwrap(),
    }
}

async fn spawn_fake_backend() -> (SocketAddr, Arc<FakeBackend>) {
    let state = Arc::new(FakeBackend::default());
    let router = Router::new()
        .fallback(fake_backend_handler)
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (addr, state)
}

fn base_config(backend_addr: SocketAddr) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        mount_path: "/dav/".to_string(),
        auth_username: "user".to_string(),
        auth_password: "password".to_string(),
        backend_url: format!("http://{backend_addr}"),
        backend_username: None,
        backend_password: None,
        metadata_cache_size: 2000,
        metadata_cache_ttl_secs: 60,
        file_max_size: 100 * 1024 * 1024,
        http_client_timeout_secs: 10,
        enable_file_logging: false,
        log_level: "error".to_string(),
        log_file: "webdav_proxy_test.log".to_string(),
    }
}

async fn spawn_proxy(config: Config) -> SocketAddr {
    let state = Arc::new(AppState::new(config).unwrap());
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn propfind_lists_directory_and_reconstructs_split_file() {
    let (backend_addr, _backend) = spawn_fake_backend().await;
    let proxy_addr = spawn_proxy(base_config(backend_addr)).await;

    let client = reqwest::Client::new();
    let response = client
        .request(
            reqwest::Method::from_bytes(b"PROPFIND").unwrap(),
            format!("http://{proxy_addr}/dav/a/"),
        )
        .header("Depth", "1")
        .basic_auth("user", Some("password"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 207);
    let body = response.text().await.unwrap();
    assert!(body.contains("/dav/a/file.txt"));
    assert!(body.contains("/dav/a/big.dat<"));
    assert!(!body.contains("big.dat.part001"));
    assert!(!body.contains("big.dat.splitinfo"));
    // content length merged in from the manifest, not the physical head's own size.
    assert!(body.contains("30"));
}

#[tokio::test]
async fn get_honors_range_header() {
    let (backend_addr, _backend) = spawn_fake_backend().await;
    let proxy_addr = spawn_proxy(base_config(backend_addr)).await;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("http://{proxy_addr}/dav/a/file.txt"))
        .header(header::RANGE, "bytes=6-")
        .basic_auth("user", Some("password"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 206);
    let body = response.bytes().await.unwrap();
    assert_eq!(&body[..], b"world");
}

#[tokio::test]
async fn put_uploads_a_single_part_when_under_the_size_limit() {
    let (backend_addr, backend) = spawn_fake_backend().await;
    let proxy_addr = spawn_proxy(base_config(backend_addr)).await;

    let client = reqwest::Client::new();
    let response = client
        .put(format!("http://{proxy_addr}/dav/a/new.txt"))
        .basic_auth("user", Some("password"))
        .body("hello")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 201);
    let puts = backend.puts.lock().unwrap();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].0, "/a/new.txt");
    assert_eq!(puts[0].1, b"hello");
}

#[tokio::test]
async fn put_shards_oversized_uploads_and_emits_a_manifest() {
    let (backend_addr, backend) = spawn_fake_backend().await;
    let mut config = base_config(backend_addr);
    config.file_max_size = 10;
    let proxy_addr = spawn_proxy(config).await;

    let payload = vec![b'x'; 25];
    let client = reqwest::Client::new();
    let response = client
        .put(format!("http://{proxy_addr}/dav/a/big.dat"))
        .basic_auth("user", Some("password"))
        .body(payload)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 201);
    let puts = backend.puts.lock().unwrap();
    // 3 data parts + one .splitinfo manifest PUT.
    assert_eq!(puts.len(), 4);
    assert_eq!(puts[0].0, "/a/big.dat");
    assert_eq!(puts[0].1.len(), 10);
    assert_eq!(puts[1].0, "/a/big.dat.part001");
    assert_eq!(puts[1].1.len(), 10);
    assert_eq!(puts[2].0, "/a/big.dat.part002");
    assert_eq!(puts[2].1.len(), 5);
    assert_eq!(puts[3].0, "/a/big.dat.splitinfo");
    let manifest: serde_json::Value = serde_json::from_slice(&puts[3].1).unwrap();
    assert_eq!(manifest["splitFileList"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn rejects_requests_without_valid_credentials() {
    let (backend_addr, _backend) = spawn_fake_backend().await;
    let proxy_addr = spawn_proxy(base_config(backend_addr)).await;

    let client = reqwest::Client::new();
    let response = client
        .request(reqwest::Method::OPTIONS, format!("http://{proxy_addr}/dav/a/"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    let response = client
        .request(reqwest::Method::OPTIONS, format!("http://{proxy_addr}/dav/a/"))
        .basic_auth("user", Some("wrong"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn redirects_the_root_to_a_non_root_mount_path() {
    let (backend_addr, _backend) = spawn_fake_backend().await;
    let proxy_addr = spawn_proxy(base_config(backend_addr)).await;

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    let response = client
        .get(format!("http://{proxy_addr}/"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 302);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/dav/");
}
