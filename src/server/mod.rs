pub mod api;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use serde_json::json;
use sqlx::SqlitePool;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
}

/// Error payload in the exact shape the dashboard's chart code expects:
/// the series fields are present but empty so the front-end can fall back
/// to its error rendering without a separate code path.
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub label: String,
    pub unit: String,
}

impl ApiError {
    pub fn unknown_indicator(slug: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: format!("Indicador desconhecido: {}", slug),
            label: slug.to_string(),
            unit: String::new(),
        }
    }

    pub fn no_data(label: &str, unit: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("Não foi possível obter os dados de {}", label),
            label: label.to_string(),
            unit: unit.to_string(),
        }
    }

    pub fn internal(label: &str, unit: &str, message: String) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message,
            label: label.to_string(),
            unit: unit.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "dates": [],
            "values": [],
            "label": self.label,
            "unit": self.unit,
        }));
        (self.status, body).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET]);

    Router::new()
        .route("/health", get(api::health_handler))
        .route("/api/indicators", get(api::list_indicators_handler))
        .route("/api/series/{slug}", get(api::series_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn serve(pool: SqlitePool, addr: SocketAddr) -> Result<(), anyhow::Error> {
    let app = router(AppState { pool });

    info!(%addr, "Query API listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
