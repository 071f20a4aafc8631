use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use relay_core::RelayError;
use relay_core::api::ErrorResponse;

/// Body returned for every authentication failure.
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";

/// HTTP-facing wrapper around [`RelayError`].
///
/// Every failure is rendered as `{"success": false, "error": "..."}`.
#[derive(Debug)]
pub struct ApiError(pub RelayError);

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            RelayError::MissingField(_) | RelayError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            RelayError::UnknownAgent(_) => StatusCode::NOT_FOUND,
            RelayError::Unauthorized => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self.0 {
            RelayError::Unauthorized => UNAUTHORIZED_MESSAGE.to_string(),
            RelayError::MissingField(field) => format!("Missing required field: {field}"),
            RelayError::UnknownAgent(agent_id) => format!("Agent not registered: {agent_id}"),
            other => other.to_string(),
        };
        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError(RelayError::MissingField("text")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(RelayError::UnknownAgent("x".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError(RelayError::Unauthorized).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError(RelayError::Server("boom".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
