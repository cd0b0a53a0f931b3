use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use crate::metrics::DataPoint;

/// Shared state of the instrumented demo application.
pub struct AppState {
    /// Front door of the `Custom` named-series aspect.
    pub samples: UnboundedSender<DataPoint>,
}

// ─── Request / response types ────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct Greeting {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct SampleRequest {
    pub value: f64,
}

#[derive(Debug, Serialize)]
pub struct SampleAccepted {
    pub series: String,
    pub value: f64,
}

// ─── GET / ───────────────────────────────────────────────────────

pub async fn hello() -> Json<Greeting> {
    Json(Greeting {
        title: "Hello World - every request is counted and timed".into(),
    })
}

// ─── POST /samples/:series ───────────────────────────────────────

pub async fn push_sample(
    State(state): State<Arc<AppState>>,
    Path(series): Path<String>,
    Json(req): Json<SampleRequest>,
) -> Result<(StatusCode, Json<SampleAccepted>), AppError> {
    if !req.value.is_finite() {
        return Err(AppError::BadRequest("value must be a finite number".into()));
    }

    state
        .samples
        .send(DataPoint::new(series.clone(), req.value))
        .map_err(|_| AppError::Internal("sample channel closed".into()))?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SampleAccepted {
            series,
            value: req.value,
        }),
    ))
}

// ─── Unified error type ──────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error":  self.to_string(),
            "status": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}
