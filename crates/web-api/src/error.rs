use application::ApplicationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::DomainError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::InvalidArgument { field, reason } => ApiError::new(
                StatusCode::BAD_REQUEST,
                "INVALID_ARGUMENT",
                format!("{}: {}", field, reason),
            ),
            DomainError::RoomNotFound(room_id) => ApiError::new(
                StatusCode::NOT_FOUND,
                "ROOM_NOT_FOUND",
                format!("room {} not found", room_id),
            ),
            DomainError::RoomAlreadyExists(room_id) => ApiError::new(
                StatusCode::CONFLICT,
                "ROOM_EXISTS",
                format!("room {} already exists", room_id),
            ),
            err @ DomainError::AlreadyJoined { .. } => {
                ApiError::new(StatusCode::CONFLICT, "ALREADY_JOINED", err.to_string())
            }
        }
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        match error {
            ApplicationError::Domain(err) => err.into(),
            err @ ApplicationError::NotFound(_) => ApiError::not_found(err.to_string()),
            err @ ApplicationError::NotUnique(_) => {
                ApiError::new(StatusCode::CONFLICT, "NOT_UNIQUE", err.to_string())
            }
            err @ ApplicationError::InvalidPayload(_) => ApiError::bad_request(err.to_string()),
            err @ (ApplicationError::TerminalStoreFailure { .. }
            | ApplicationError::CollaboratorFailure { .. }) => {
                ApiError::new(StatusCode::BAD_GATEWAY, "STORE_ERROR", err.to_string())
            }
            ApplicationError::Broadcast(err) => ApiError::internal_server_error(format!(
                "broadcast error: {}",
                err
            )),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
