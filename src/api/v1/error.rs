use crate::api::v1::handler::ApiResponse;
use crate::application_port::*;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use tracing::{debug, warn};
use warp::http::StatusCode;
use warp::{Rejection, reject};

pub async fn recover_error(err: Rejection) -> Result<impl warp::Reply, Infallible> {
    let (code, message) = if let Some(detailed) = err.find::<DetailedRejection>() {
        (detailed.code, detailed.message.clone())
    } else if let Some(code) = err.find::<ApiErrorCode>() {
        (*code, code.to_string())
    } else if err.is_not_found() {
        (ApiErrorCode::NotFound, ApiErrorCode::NotFound.to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (ApiErrorCode::InvalidInput, e.to_string())
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (ApiErrorCode::InvalidInput, "request body too large".to_string())
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (ApiErrorCode::InvalidInput, "content-length required".to_string())
    } else if err.find::<warp::reject::MissingHeader>().is_some() {
        (ApiErrorCode::InvalidToken, ApiErrorCode::InvalidToken.to_string())
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            ApiErrorCode::MethodNotAllowed,
            ApiErrorCode::MethodNotAllowed.to_string(),
        )
    } else {
        warn!("unhandled rejection: {:?}", err);
        (
            ApiErrorCode::InternalError,
            ApiErrorCode::InternalError.to_string(),
        )
    };

    let status = code.status();
    let json = warp::reply::json(&ApiResponse::<()>::err(code, message));
    Ok(warp::reply::with_status(json, status))
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum ApiErrorCode {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Email already registered")]
    EmailTaken,
    #[error("Refresh token is not valid")]
    InvalidRefreshToken,
    #[error("Token is not valid")]
    InvalidToken,
    #[error("Invalid request")]
    InvalidInput,
    #[error("User not found")]
    UserNotFound,
    #[error("Not found")]
    NotFound,
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Request timed out")]
    Timeout,
    #[error("Internal error")]
    InternalError,
}

impl ApiErrorCode {
    pub fn internal<E: std::fmt::Display>(error: E) -> ApiErrorCode {
        warn!("Internal error: {}", error);
        ApiErrorCode::InternalError
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidCredentials
            | ApiErrorCode::InvalidRefreshToken
            | ApiErrorCode::InvalidToken => StatusCode::UNAUTHORIZED,
            ApiErrorCode::EmailTaken => StatusCode::CONFLICT,
            ApiErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
            ApiErrorCode::UserNotFound | ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl reject::Reject for ApiErrorCode {}

/// Wraps a code that carries a caller-facing detail message, e.g. which
/// input field was rejected.
#[derive(Debug)]
pub struct DetailedRejection {
    pub code: ApiErrorCode,
    pub message: String,
}

impl reject::Reject for DetailedRejection {}

/// Turns a service error into a rejection, keeping input validation messages.
pub fn reject_auth(error: AuthError) -> Rejection {
    match error {
        AuthError::InvalidInput(message) => reject::custom(DetailedRejection {
            code: ApiErrorCode::InvalidInput,
            message,
        }),
        e => reject::custom(ApiErrorCode::from(e)),
    }
}

impl From<AuthError> for ApiErrorCode {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::InvalidCredentials => ApiErrorCode::InvalidCredentials,
            AuthError::EmailTaken => ApiErrorCode::EmailTaken,
            AuthError::InvalidRefreshToken => ApiErrorCode::InvalidRefreshToken,
            e if e.is_token_error() => {
                debug!("access token rejected: {}", e);
                ApiErrorCode::InvalidToken
            }
            AuthError::InvalidInput(_) => ApiErrorCode::InvalidInput,
            AuthError::UserNotFound => ApiErrorCode::UserNotFound,
            e @ (AuthError::Entropy(_) | AuthError::Store(_) | AuthError::Internal(_)) => {
                ApiErrorCode::internal(e)
            }
            _ => ApiErrorCode::InternalError,
        }
    }
}
