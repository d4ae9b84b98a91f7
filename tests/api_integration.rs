//! Integration tests for the HTTP API
//!
//! Tests profile editing, frame evaluation and diagnostics endpoints

use std::sync::Arc;

use facebind::core::{create_router, load_profiles, routes, AppState, ServerOptions};
use facebind::types::{AdvancedBinding, Binding, EdgeRule, Profile, ProfileSet, Settings, SimpleBinding};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt;
use serde_json::{json, Value};

fn test_profiles() -> ProfileSet {
    ProfileSet::from_profiles(vec![Profile::with_bindings(
        "Gaming",
        vec![
            Binding::Simple(SimpleBinding::new("jawOpen", 50, "down:space", "up:space")),
            Binding::Advanced(AdvancedBinding::new(
                EdgeRule::new("eyeBlinkLeft > 70 and", 0, "click:left"),
                EdgeRule::new("", 0, ""),
            )),
        ],
    )])
}

fn create_test_router() -> Router {
    create_router(ServerOptions {
        profiles: test_profiles(),
        settings: Settings::default(),
        profiles_path: None,
    })
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

fn frame(timestamp_ms: f64, jaw: f64) -> Value {
    json!({
        "timestampMs": timestamp_ms,
        "faceBlendshapes": [{"categories": [{"categoryName": "jawOpen", "score": jaw}]}]
    })
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_router();
    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["profiles"], 1);
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_frame_fires_transitions() {
    let app = create_test_router();

    let (status, json) = send(&app, "POST", "/frame", Some(frame(0.0, 0.8))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "EVALUATED");
    assert_eq!(json["profile"], "Gaming");
    let fired: Vec<&Value> = json["transitions"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|t| !t["action"].is_null())
        .collect();
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0]["action"], "down:space");

    let (_, json) = send(&app, "GET", "/state", None).await;
    assert_eq!(json["bindings"][0]["activated"], true);

    let (_, json) = send(&app, "POST", "/frame", Some(json!({"timestampMs": 16.0}))).await;
    assert_eq!(json["status"], "NO_FACE");
}

#[tokio::test]
async fn test_compile_failures_reach_diagnostics() {
    let app = create_test_router();

    let (status, json) = send(&app, "GET", "/diagnostics", None).await;
    assert_eq!(status, StatusCode::OK);
    let codes: Vec<&str> = json.as_array().unwrap().iter().map(|d| d["code"].as_str().unwrap()).collect();
    assert_eq!(codes, vec!["R101_COMPILE_FAILED"]);

    // Drained
    let (_, json) = send(&app, "GET", "/diagnostics", None).await;
    assert!(json.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_edit_binding() {
    let app = create_test_router();

    let edit = json!({"start_logic": "eyeBlinkLeft > 70", "start_debounce_ms": 100});
    let (status, _) = send(&app, "PUT", "/profiles/0/bindings/1", Some(edit)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, json) = send(&app, "GET", "/state", None).await;
    assert_eq!(json["bindings"][1]["start"]["compiled"], true);

    let (status, _) = send(&app, "PUT", "/profiles/0/bindings/0", Some(json!({"threshold": 120}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(&app, "PUT", "/profiles/0/bindings/9", Some(json!({"threshold": 20}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", "/profiles/3/bindings/0", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_profile_management() {
    let app = create_test_router();

    let (status, json) = send(&app, "POST", "/profiles", Some(json!({"name": "Reading"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["index"], 1);

    let (_, json) = send(&app, "GET", "/state", None).await;
    assert_eq!(json["selection"], 1);
    assert_eq!(json["profile"], "Reading");

    let (status, _) = send(&app, "PUT", "/selection", Some(json!({"index": 5}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "DELETE", "/profiles/selected", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "DELETE", "/profiles/selected", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Nothing left to evaluate against
    let (_, json) = send(&app, "POST", "/frame", Some(frame(0.0, 0.9))).await;
    assert_eq!(json["status"], "NO_PROFILE");

    let (status, _) = send(&app, "POST", "/save", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_runaway_expression_is_contained() {
    let app = create_test_router();
    send(&app, "PUT", "/profiles/0/bindings/1", Some(json!({"start_logic": "eyeBlinkLeft > 70"}))).await;
    let (_, json) = send(&app, "GET", "/state", None).await;
    assert_eq!(json["bindings"][1]["start"]["compiled"], true);
    send(&app, "GET", "/diagnostics", None).await;

    let nested = format!("{}eyeBlinkLeft{} > 70", "(".repeat(5_000), ")".repeat(5_000));
    let (status, _) = send(&app, "PUT", "/profiles/0/bindings/1", Some(json!({"start_logic": nested}))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, json) = send(&app, "GET", "/state", None).await;
    assert_eq!(json["bindings"][1]["start"]["compiled"], false);

    let (_, json) = send(&app, "GET", "/diagnostics", None).await;
    assert_eq!(json[0]["code"], "R101_COMPILE_FAILED");

    let (status, _) = send(&app, "POST", "/frame", Some(frame(0.0, 0.2))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_auto_save_on_exit() {
    let path = std::env::temp_dir()
        .join(format!("facebind_api_{}", std::process::id()))
        .join("profiles.json");
    let settings = Settings { auto_save_profiles: true, ..Settings::default() };
    let state = Arc::new(AppState::new(ServerOptions {
        profiles: test_profiles(),
        settings,
        profiles_path: Some(path.clone()),
    }));
    let app = routes(state.clone());

    send(&app, "POST", "/profiles", Some(json!({"name": "Reading"}))).await;
    assert!(state.save_on_exit().await.unwrap());

    let saved = load_profiles(&path).unwrap();
    let names: Vec<&str> = saved.profiles.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Gaming", "Reading"]);
    assert_eq!(saved.selection(), 1);
    std::fs::remove_file(&path).ok();

    // Auto-save off: nothing written
    let state = AppState::new(ServerOptions {
        profiles: test_profiles(),
        settings: Settings::default(),
        profiles_path: Some(path.clone()),
    });
    assert!(!state.save_on_exit().await.unwrap());
    assert!(!path.exists());
}
