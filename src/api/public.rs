//! Public API types

use axum::response::{IntoResponse, Response};
use http::StatusCode;

// Errors

pub struct ApiError(anyhow::Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!("{}", self.0);

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Something went wrong: {}", self.0),
        )
            .into_response()
    }
}

/// Lets handlers use `?` on anything convertible to `anyhow::Error`.
impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

// Re-export public types from each route

pub mod health {
    pub use crate::api::routes::health::public::*;
}

pub mod tasks {
    pub use crate::api::routes::tasks::public::*;
}

pub mod webhook {
    pub use crate::api::routes::webhook::public::*;
}
