use super::cookie::RefreshCookie;
use super::error::*;
use crate::application_port::{
    AuthError, AuthService, AuthTokens, LoginInput, RegisterInput, UserProfile,
};
use crate::domain_model::UserId;
use crate::logger::*;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use warp::http::header::{HeaderValue, SET_COOKIE};
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::{Rejection, Reply, reject};

/// Transport-level knobs that the session core does not care about.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub cookie: RefreshCookie,
    pub request_timeout: Duration,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Runs a service call under the request deadline. On timeout the future is
/// dropped, which cancels any store call still in flight.
async fn bounded<T, F>(config: &ApiConfig, call: F) -> Result<T, Rejection>
where
    F: Future<Output = Result<T, AuthError>>,
{
    match tokio::time::timeout(config.request_timeout, call).await {
        Ok(result) => result.map_err(reject_auth),
        Err(_) => {
            warn!(timeout = ?config.request_timeout, "request timed out");
            Err(reject::custom(ApiErrorCode::Timeout))
        }
    }
}

fn respond<T: Serialize>(
    status: StatusCode,
    body: &ApiResponse<T>,
    set_cookie: Option<String>,
) -> Result<warp::reply::Response, Rejection> {
    let mut response = warp::reply::with_status(warp::reply::json(body), status).into_response();
    if let Some(cookie) = set_cookie {
        let value = HeaderValue::from_str(&cookie)
            .map_err(ApiErrorCode::internal)
            .map_err(reject::custom)?;
        response.headers_mut().append(SET_COOKIE, value);
    }
    Ok(response)
}

#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: UserId,
}

pub async fn register(
    body: CredentialsRequest,
    auth_service: Arc<dyn AuthService>,
    config: Arc<ApiConfig>,
) -> Result<impl Reply, Rejection> {
    let input = RegisterInput {
        email: body.email,
        password: body.password,
    };
    let user_id = bounded(&config, auth_service.register(input)).await?;

    respond(
        StatusCode::CREATED,
        &ApiResponse::ok(RegisterResponse { user_id }),
        None,
    )
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token_type: &'static str,
    #[serde(flatten)]
    pub tokens: AuthTokens,
}

fn token_reply(tokens: AuthTokens, config: &ApiConfig) -> Result<warp::reply::Response, Rejection> {
    let cookie = config.cookie.set(tokens.refresh_token.as_str());
    let body = ApiResponse::ok(TokenResponse {
        token_type: "Bearer",
        tokens,
    });
    respond(StatusCode::OK, &body, cookie)
}

pub async fn login(
    body: CredentialsRequest,
    auth_service: Arc<dyn AuthService>,
    config: Arc<ApiConfig>,
) -> Result<impl Reply, Rejection> {
    let input = LoginInput {
        email: body.email,
        password: body.password,
    };
    let tokens = bounded(&config, auth_service.login(input)).await?;

    token_reply(tokens, &config)
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// The refresh token may come in the JSON body or in the refresh cookie;
/// a non-empty body value wins. An empty body is allowed.
fn presented_refresh_token(body: &[u8], cookie: Option<String>) -> Result<String, Rejection> {
    let from_body = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        serde_json::from_slice::<RefreshRequest>(body)
            .map_err(|e| {
                reject::custom(DetailedRejection {
                    code: ApiErrorCode::InvalidInput,
                    message: e.to_string(),
                })
            })?
            .refresh_token
    };

    Ok(from_body
        .filter(|t| !t.is_empty())
        .or(cookie)
        .unwrap_or_default())
}

pub async fn refresh(
    body: Bytes,
    cookie_header: Option<String>,
    auth_service: Arc<dyn AuthService>,
    config: Arc<ApiConfig>,
) -> Result<impl Reply, Rejection> {
    let cookie = cookie_header.and_then(|h| config.cookie.read(&h));
    let presented = presented_refresh_token(&body, cookie)?;
    let tokens = bounded(&config, auth_service.refresh(&presented)).await?;

    token_reply(tokens, &config)
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub message: &'static str,
}

pub async fn logout(
    body: Bytes,
    cookie_header: Option<String>,
    auth_service: Arc<dyn AuthService>,
    config: Arc<ApiConfig>,
) -> Result<impl Reply, Rejection> {
    let cookie = cookie_header.and_then(|h| config.cookie.read(&h));
    let presented = presented_refresh_token(&body, cookie)?;
    bounded(&config, auth_service.logout(&presented)).await?;

    respond(
        StatusCode::OK,
        &ApiResponse::ok(LogoutResponse {
            message: "logged out",
        }),
        config.cookie.clear(),
    )
}

pub async fn me(
    user_id: UserId,
    auth_service: Arc<dyn AuthService>,
    config: Arc<ApiConfig>,
) -> Result<impl Reply, Rejection> {
    let profile: UserProfile = bounded(&config, auth_service.profile(&user_id)).await?;

    Ok(warp::reply::json(&ApiResponse::ok(profile)))
}
