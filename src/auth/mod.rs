use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::api::handlers::ErrorResponse;
use crate::config::{AuthConfig, AuthMode};

pub const API_KEY_HEADER: &str = "X-API-Key";

pub struct AuthService {
    mode: AuthMode,
    api_keys: Arc<Vec<String>>,
}

impl AuthService {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            mode: config.mode,
            api_keys: Arc::new(config.api_keys.clone()),
        }
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    pub fn validate_key(&self, key: &str) -> bool {
        match self.mode {
            AuthMode::None => true,
            AuthMode::ApiKey => self
                .api_keys
                .iter()
                .fold(false, |matched, k| matched | bool::from(k.as_bytes().ct_eq(key.as_bytes()))),
        }
    }
}

pub async fn auth_middleware(
    auth_service: Arc<AuthService>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let api_key = headers
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    if auth_service.validate_key(api_key) {
        next.run(request).await
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Invalid or missing API key".to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(mode: AuthMode, keys: &[&str]) -> AuthService {
        AuthService::new(&AuthConfig {
            mode,
            api_keys: keys.iter().map(|k| k.to_string()).collect(),
        })
    }

    #[test]
    fn test_none_mode_allows_everything() {
        assert!(service(AuthMode::None, &[]).validate_key(""));
    }

    #[test]
    fn test_api_key_mode() {
        let auth = service(AuthMode::ApiKey, &["alpha", "bravo"]);
        assert!(auth.validate_key("bravo"));
        assert!(!auth.validate_key("brav"));
        assert!(!auth.validate_key(""));
    }

    #[test]
    fn test_api_key_mode_without_keys_denies() {
        assert!(!service(AuthMode::ApiKey, &[]).validate_key("anything"));
    }
}
