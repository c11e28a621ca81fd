use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use log::error;
use serde_json::json;
use storefront_engine::{
    db_types::StockShortfall,
    traits::CatalogError,
    CartApiError,
    CheckoutError,
    OrderApiError,
    OtpError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Authentication Error. {0}")]
    AuthenticationError(#[from] AuthError),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("OTP is invalid")]
    OtpInvalid,
    #[error("OTP has expired")]
    OtpExpired,
    #[error("Insufficient stock for {} line(s)", .0.len())]
    InsufficientStock(Vec<StockShortfall>),
    #[error("Payment gateway is unavailable. Please try again. {0}")]
    GatewayUnavailable(String),
    #[error("Payment gateway rejected the request. {0}")]
    GatewayRejected(String),
    #[error("Payment callback signature is invalid")]
    InvalidCallbackSignature,
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::AuthenticationError(e) => match e {
                AuthError::MissingToken => StatusCode::UNAUTHORIZED,
                AuthError::PoorlyFormattedToken(_) => StatusCode::UNAUTHORIZED,
                AuthError::ValidationError(_) => StatusCode::UNAUTHORIZED,
                AuthError::TokenExpired => StatusCode::UNAUTHORIZED,
                AuthError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            },
            Self::OtpInvalid => StatusCode::UNAUTHORIZED,
            Self::OtpExpired => StatusCode::GONE,
            Self::InsufficientStock(_) => StatusCode::CONFLICT,
            Self::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::GatewayRejected(_) => StatusCode::BAD_GATEWAY,
            Self::InvalidCallbackSignature => StatusCode::UNAUTHORIZED,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            Self::InsufficientStock(lines) => json!({ "error": self.to_string(), "lines": lines }),
            _ => json!({ "error": self.to_string() }),
        };
        HttpResponse::build(self.status_code()).insert_header(ContentType::json()).body(body.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("No access token was provided.")]
    MissingToken,
    #[error("Access token is not in the correct format. {0}")]
    PoorlyFormattedToken(String),
    #[error("Access token signature is invalid. {0}")]
    ValidationError(String),
    #[error("Access token has expired.")]
    TokenExpired,
    #[error("Insufficient Permissions. {0}")]
    InsufficientPermissions(String),
}

impl From<CartApiError> for ServerError {
    fn from(e: CartApiError) -> Self {
        match e {
            CartApiError::ValidationError(s) => Self::ValidationError(s),
            CartApiError::UnknownProduct(id) => Self::NoRecordFound(format!("Product {id} does not exist")),
            CartApiError::DatabaseError(s) => backend_error(s),
        }
    }
}

impl From<CatalogError> for ServerError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::InvalidProduct(s) => Self::ValidationError(s),
            CatalogError::DatabaseError(s) => backend_error(s),
        }
    }
}

impl From<OtpError> for ServerError {
    fn from(e: OtpError) -> Self {
        match e {
            OtpError::OtpInvalid => Self::OtpInvalid,
            OtpError::OtpExpired => Self::OtpExpired,
            OtpError::DatabaseError(s) => backend_error(s),
        }
    }
}

impl From<CheckoutError> for ServerError {
    fn from(e: CheckoutError) -> Self {
        match e {
            CheckoutError::ValidationError(s) => Self::ValidationError(s),
            CheckoutError::OtpInvalid => Self::OtpInvalid,
            CheckoutError::OtpExpired => Self::OtpExpired,
            CheckoutError::InsufficientStock(lines) => Self::InsufficientStock(lines),
            CheckoutError::GatewayUnavailable(s) => Self::GatewayUnavailable(s),
            CheckoutError::GatewayRejected(s) => Self::GatewayRejected(s),
            CheckoutError::InvalidCallbackSignature => Self::InvalidCallbackSignature,
            CheckoutError::SessionNotFound(id) => Self::NoRecordFound(format!("Payment session {id}")),
            CheckoutError::InvalidTransition(e) => Self::Unspecified(e.to_string()),
            CheckoutError::DatabaseError(s) => backend_error(s),
        }
    }
}

impl From<OrderApiError> for ServerError {
    fn from(e: OrderApiError) -> Self {
        match e {
            OrderApiError::OrderNotFound(id) => Self::NoRecordFound(format!("Order #{id}")),
            OrderApiError::InvalidStatusTransition { .. } => Self::ValidationError(e.to_string()),
            OrderApiError::DatabaseError(s) => backend_error(s),
        }
    }
}

fn backend_error(s: String) -> ServerError {
    error!("💻️ Backend error: {s}");
    ServerError::BackendError(s)
}
