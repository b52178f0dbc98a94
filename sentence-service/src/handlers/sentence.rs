use crate::services::SelectionError;
use crate::startup::AppState;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

#[derive(Debug, Deserialize)]
pub struct GenerateSentenceQuery {
    pub word: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SentenceResponse {
    pub sentence: String,
}

#[derive(Debug, Serialize)]
pub struct SelectionErrorResponse {
    pub error: String,
}

/// Selection failures keep status 200; the `error` key tells them apart from a sentence.
impl IntoResponse for SelectionError {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            Json(SelectionErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

pub async fn generate_sentence(
    State(state): State<AppState>,
    query: Result<Query<GenerateSentenceQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(query) = query.map_err(|e| AppError::BadRequest(anyhow::anyhow!(e.body_text())))?;
    let word = query.word.ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!("Missing required query parameter: word"))
    })?;

    let response = match state.selector.select(&word).await {
        Ok(selection) => Json(SentenceResponse {
            sentence: selection.into_sentence(),
        })
        .into_response(),
        Err(e) => e.into_response(),
    };

    Ok(response)
}
