use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("You have already voted on this poll")]
    AlreadyVoted,

    #[error("{0}")]
    NotFound(&'static str),

    #[error("Sign in required")]
    Unauthorized,

    #[error("Only the poll's creator can do that")]
    Forbidden,

    #[error("Invalid request body")]
    MalformedRequest,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_)
            | AppError::AlreadyVoted
            | AppError::MalformedRequest
            | AppError::Store(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
        };

        if let AppError::Store(err) = &self {
            tracing::error!("Store error: {:?}", err);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
