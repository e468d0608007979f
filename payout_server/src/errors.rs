use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::error;
use payout_engine::PayoutEngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request query: {0}")]
    InvalidRequestQuery(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("The request was rejected. {0}")]
    ValidationError(String),
    #[error("The X-Acting-User header is required for this request.")]
    MissingActingUser,
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The request conflicts with the current state of the data. {0}")]
    Conflict(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestQuery(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::MissingActingUser => StatusCode::BAD_REQUEST,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<PayoutEngineError> for ServerError {
    fn from(e: PayoutEngineError) -> Self {
        match e {
            PayoutEngineError::Reconciliation(_) |
            PayoutEngineError::MissingReason |
            PayoutEngineError::MissingResolutionNotes |
            PayoutEngineError::InvalidQuery(_) => Self::ValidationError(e.to_string()),
            PayoutEngineError::RecordNotFound(_) | PayoutEngineError::AlertNotFound(_) => {
                Self::NoRecordFound(e.to_string())
            },
            PayoutEngineError::AlertAlreadyResolved(_) |
            PayoutEngineError::ConcurrentModification { .. } |
            PayoutEngineError::IllegalStatusTransition { .. } |
            PayoutEngineError::PayoutAlreadyExists(_) => Self::Conflict(e.to_string()),
            PayoutEngineError::DatabaseError(ref msg) => {
                error!("💻️ Database error: {msg}");
                Self::BackendError(e.to_string())
            },
        }
    }
}
