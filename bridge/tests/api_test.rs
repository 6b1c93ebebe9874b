//! Request/response API tests: config round-trip and folder selection.

mod common;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use shared_types::{BackendConfig, ConfigUpdate};

use bridge::{BackendApi, SessionTransport, TransportError};

async fn api_for(router: Router) -> BackendApi {
    let addr = common::serve(router).await;
    let transport = SessionTransport::new(&common::config_for(addr)).expect("build transport");
    BackendApi::new(transport)
}

#[tokio::test]
async fn reads_backend_config() {
    let router = Router::new().route(
        "/config",
        get(|| async {
            Json(BackendConfig {
                prompt_template: "Use {context} to answer {question}".into(),
                model: "llama3.1".into(),
                k: 3,
                available_models: vec!["llama3.1".into(), "mistral".into()],
                current_folder: "/home/user/documents".into(),
            })
        }),
    );
    let api = api_for(router).await;

    let config = api.get_config().await.expect("config");
    assert_eq!(config.model, "llama3.1");
    assert_eq!(config.k, 3);
    assert_eq!(config.available_models.len(), 2);
}

#[tokio::test]
async fn config_rejection_surfaces_the_detail_message() {
    let router = Router::new().route(
        "/config",
        post(|| async {
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "detail": "k must be positive" })),
            )
        }),
    );
    let api = api_for(router).await;

    let update = ConfigUpdate {
        template: "t".into(),
        model: "llama3.1".into(),
        k: 0,
        folder: "/docs".into(),
    };
    let err = api.update_config(&update).await.expect_err("422");
    match err {
        TransportError::Status { status, body } => {
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
            assert_eq!(body, "k must be positive");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn reset_config_is_a_plain_acknowledgement() {
    let router = Router::new().route(
        "/config/reset",
        post(|| async { Json(json!({ "message": "Config reset to default" })) }),
    );
    let api = api_for(router).await;
    api.reset_config().await.expect("reset");
}

#[tokio::test]
async fn set_folder_returns_the_backend_message() {
    let router = Router::new().route(
        "/set-folder",
        post(|Json(body): Json<serde_json::Value>| async move {
            assert_eq!(body, json!({ "path": "/home/user/notes" }));
            Json(json!({ "message": "Folder updated, rescan started" }))
        }),
    );
    let api = api_for(router).await;

    let message = api.set_folder("/home/user/notes").await.expect("set folder");
    assert_eq!(message, "Folder updated, rescan started");
}

#[tokio::test]
async fn db_state_reports_index_and_directory_contents() {
    let router = Router::new().route(
        "/db-state",
        get(|| async {
            Json(json!({
                "documents_in_db": ["a.txt"],
                "files_in_db_directory": ["chroma.sqlite3"],
            }))
        }),
    );
    let api = api_for(router).await;

    let state = api.db_state().await.expect("db state");
    assert_eq!(state.documents_in_db, vec!["a.txt".to_string()]);
    assert_eq!(
        state.files_in_db_directory,
        vec!["chroma.sqlite3".to_string()],
    );
}

#[tokio::test]
async fn lists_and_refreshes_documents() {
    let router = Router::new()
        .route(
            "/documents",
            get(|| async { Json(json!({ "documents": ["a.txt", "b.pdf"] })) }),
        )
        .route(
            "/refresh-documents",
            get(|| async { Json(json!({ "message": "Documents refreshed successfully" })) }),
        );
    let api = api_for(router).await;

    let documents = api.list_documents().await.expect("documents");
    assert_eq!(documents, vec!["a.txt".to_string(), "b.pdf".to_string()]);
    let message = api.refresh_documents().await.expect("refresh");
    assert_eq!(message, "Documents refreshed successfully");
}
