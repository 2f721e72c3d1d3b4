#![allow(dead_code)]

use axum_test::TestServer;
use roomcast::AppState;
use sqlx::SqlitePool;
use std::net::SocketAddr;
use std::sync::Arc;

/// Builds an AppState for tests.
pub fn create_test_state(pool: SqlitePool) -> Arc<AppState> {
    Arc::new(AppState::new(pool))
}

/// Builds an in-process TestServer for the HTTP endpoints.
pub fn create_test_server(state: Arc<AppState>) -> TestServer {
    let app = roomcast::create_router(state);
    TestServer::new(app).expect("Failed to create test server")
}

/// Serves the router on an ephemeral local port for real WebSocket clients.
pub async fn spawn_server(state: Arc<AppState>) -> SocketAddr {
    let app = roomcast::create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Failed to read local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Test server failed");
    });

    addr
}
