use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::{api_state::ApiState, error::ApiError};

/// Shared-token check on mutating routes. Deployments without a configured
/// token run open, which is the expected mode behind a private network.
pub async fn api_auth(
    State(state): State<ApiState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(expected) = state.config.api_token.as_deref() {
        let presented = extract_api_key(&request)
            .ok_or_else(|| ApiError::Unauthorized("You have to be authenticated".to_string()))?;
        if presented != expected {
            return Err(ApiError::Unauthorized(
                "You have to be authenticated".to_string(),
            ));
        }
    }

    Ok(next.run(request).await)
}

fn extract_api_key(request: &Request) -> Option<String> {
    request
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .or_else(|| {
            request
                .headers()
                .get("Authorization")
                .and_then(|v| v.to_str().ok())
                .and_then(|auth| auth.strip_prefix("Bearer ").map(str::trim))
        })
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;

    #[test]
    fn test_extract_api_key_prefers_header_then_bearer() {
        let request = HttpRequest::builder()
            .header("X-API-Key", "key-from-header")
            .header("Authorization", "Bearer key-from-bearer")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            extract_api_key(&request).as_deref(),
            Some("key-from-header")
        );

        let request = HttpRequest::builder()
            .header("Authorization", "Bearer key-from-bearer")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            extract_api_key(&request).as_deref(),
            Some("key-from-bearer")
        );

        let request = HttpRequest::builder().body(Body::empty()).unwrap();
        assert!(extract_api_key(&request).is_none());
    }
}
