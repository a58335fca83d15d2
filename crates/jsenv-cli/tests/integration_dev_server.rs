//! Dev server routes, driven through the axum router without a socket.

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use hyper::ext::ReasonPhrase;
use jsenv_bundler::dev::{DevKitchen, DevOptions};
use jsenv_cli::dev::{DevEvent, DevServerState, EVENTS_PATH, SharedState, router, server::REASON_HEADER};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

fn project(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (path, content) in files {
        let path = dir.path().join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
    dir
}

fn state(dir: &TempDir) -> SharedState {
    let kitchen = DevKitchen::new(DevOptions::new(dir.path()).node_esm_resolution(false)).unwrap();
    Arc::new(DevServerState::new(kitchen))
}

async fn get(app: &Router, path: &str, headers: &[(&str, &str)]) -> (StatusCode, axum::http::HeaderMap, String) {
    let mut request = Request::builder().uri(path);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    let response = app
        .clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_serves_html_with_autoreload_and_rewritten_references() {
    let dir = project(&[
        (
            "index.html",
            "<html><head><meta charset=\"utf-8\"></head><body><script type=\"module\" src=\"./js/main.js\"></script></body></html>",
        ),
        ("js/main.js", "import { n } from './file.js';\nconsole.log(n);\n"),
        ("js/file.js", "export const n = 42;\n"),
    ]);
    let app = router(state(&dir), false);

    let (status, headers, body) = get(&app, "/", &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/html"));
    assert!(body.contains("src=\"/js/main.js\""));
    assert!(body.contains("/__jsenv__/autoreload.js"));

    let (status, headers, body) = get(&app, "/js/main.js", &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.contains_key(header::ETAG));
    assert!(headers.contains_key(header::LAST_MODIFIED));
    assert!(body.contains("from '/js/file.js'"));
    assert!(body.contains("//# sourceMappingURL=data:application/json;charset=utf-8;base64,"));
}

#[tokio::test]
async fn test_conditional_get_then_change() {
    let dir = project(&[("main.css", "body { color: red; }\n")]);
    let state = state(&dir);
    let app = router(state.clone(), false);

    let (status, headers, _) = get(&app, "/main.css", &[]).await;
    assert_eq!(status, StatusCode::OK);
    let etag = headers[header::ETAG].to_str().unwrap().to_string();
    let last_modified = headers[header::LAST_MODIFIED].to_str().unwrap().to_string();

    let (status, headers, body) = get(&app, "/main.css", &[("if-none-match", &etag)]).await;
    assert_eq!(status, StatusCode::NOT_MODIFIED);
    assert!(body.is_empty());
    assert_eq!(headers[header::ETAG].to_str().unwrap(), etag);

    let (status, _, _) = get(&app, "/main.css", &[("if-modified-since", &last_modified)]).await;
    assert_eq!(status, StatusCode::NOT_MODIFIED);

    fs::write(dir.path().join("main.css"), "body { color: blue; }\n").unwrap();
    let event = state.file_changed(&dir.path().join("main.css"));
    assert_eq!(
        event,
        Some(DevEvent::Reload {
            urls: vec!["/main.css".into()]
        })
    );

    let (status, headers, body) = get(&app, "/main.css", &[("if-none-match", &etag)]).await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(headers[header::ETAG].to_str().unwrap(), etag);
    assert!(body.contains("blue"));
}

#[tokio::test]
async fn test_not_found_is_json_by_default() {
    let dir = project(&[]);
    let app = router(state(&dir), false);

    let (status, headers, body) = get(&app, "/missing.js", &[]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(headers[REASON_HEADER], "not found");
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], 404);
    assert_eq!(json["code"], "RESOURCE_NOT_FOUND");
}

#[tokio::test]
async fn test_not_found_sets_reason_phrase() {
    let dir = project(&[]);
    let app = router(state(&dir), false);

    let response = app
        .oneshot(Request::builder().uri("/missing.css").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let phrase = response.extensions().get::<ReasonPhrase>().unwrap();
    assert_eq!(phrase.as_bytes(), b"not found");
}

#[tokio::test]
async fn test_parse_error_renders_overlay_for_navigations() {
    let dir = project(&[("broken.js", "export const = ;\n")]);
    let app = router(state(&dir), false);

    let (status, headers, body) = get(&app, "/broken.js", &[]).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(headers[REASON_HEADER], "parse error");
    assert_eq!(serde_json::from_str::<serde_json::Value>(&body).unwrap()["reason"], "parse error");

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/broken.js").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let phrase = response.extensions().get::<ReasonPhrase>().unwrap();
    assert_eq!(phrase.as_bytes(), b"parse error");

    let (status, headers, body) = get(&app, "/broken.js", &[("accept", "text/html,*/*")]).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(headers[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/html"));
    assert!(body.contains("500 parse error"));
    assert!(body.contains(EVENTS_PATH));
}

#[tokio::test]
async fn test_autoreload_client_route() {
    let dir = project(&[]);
    let app = router(state(&dir), false);

    let (status, headers, body) = get(&app, "/__jsenv__/autoreload.js", &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/javascript");
    assert!(body.contains(EVENTS_PATH));
}

#[tokio::test]
async fn test_change_reaches_html_importer() {
    let dir = project(&[
        ("index.html", "<script type=\"module\" src=\"./main.js\"></script>"),
        ("main.js", "import './dep.js';\n"),
        ("dep.js", "export {};\n"),
    ]);
    let state = state(&dir);
    let app = router(state.clone(), false);
    for path in ["/", "/main.js", "/dep.js"] {
        assert_eq!(get(&app, path, &[]).await.0, StatusCode::OK);
    }

    let (_id, mut rx) = state.register_client();
    let Some(DevEvent::Reload { mut urls }) = state.file_changed(&dir.path().join("dep.js")) else {
        panic!("expected a reload event");
    };
    urls.sort();
    assert_eq!(urls, vec!["/dep.js", "/index.html", "/main.js"]);

    state.broadcast(&DevEvent::Reload { urls }).await;
    let message = rx.recv().await.unwrap();
    assert!(message.starts_with(r#"{"type":"reload""#));
}
