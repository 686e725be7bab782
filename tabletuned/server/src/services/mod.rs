pub(crate) mod player;
pub(crate) mod requests;

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use libtabletune_queue::tabletune_queue::RequestError;
use serde_json::json;
use tracing::{debug, error};

/// Maps the library's typed refusals onto HTTP statuses with a JSON body a
/// client UI can render directly.
pub(crate) struct ApiError(pub(crate) RequestError);

impl From<RequestError> for ApiError {
    fn from(error: RequestError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RequestError::Validation(_) => StatusCode::BAD_REQUEST,
            RequestError::NotFound(_) => StatusCode::NOT_FOUND,
            RequestError::DuplicateTrack(_) | RequestError::QueueFull(_) => StatusCode::CONFLICT,
            RequestError::ExplicitContent(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RequestError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            RequestError::InsufficientPoints { .. } => StatusCode::PAYMENT_REQUIRED,
            RequestError::CatalogUnavailable(_) => StatusCode::BAD_GATEWAY,
            RequestError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        if status.is_server_error() {
            error!("request failed: {}", self.0);
        } else {
            debug!("request refused: {}", self.0);
        }

        let kind: &'static str = (&self.0).into();
        let body = Json(json!({
            "error": kind,
            "message": self.0.to_string(),
        }));
        let mut response = (status, body).into_response();
        if let RequestError::RateLimited {
            retry_after_seconds: Some(seconds),
            ..
        } = &self.0
        {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(*seconds));
        }
        response
    }
}
