//! Caller identity for multi-user deployments.
//!
//! Without an `X-User-Id` header the server runs single-tenant and every
//! private agent is shared. With it, private agents belong to that user.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

pub const USER_HEADER: &str = "x-user-id";

/// Identity attached to request extensions by [`auth_middleware`].
#[derive(Debug, Clone, Default)]
pub struct AuthenticatedUser {
    pub user_id: Option<String>,
}

impl AuthenticatedUser {
    fn from_headers(headers: &HeaderMap) -> Self {
        let user_id = headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        Self { user_id }
    }
}

/// Extractor for routes that scope data to the caller.
pub struct CurrentUser(pub AuthenticatedUser);

impl CurrentUser {
    pub fn user_id(&self) -> Option<&str> {
        self.0.user_id.as_deref()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or((StatusCode::UNAUTHORIZED, "Not authenticated"))
    }
}

pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let user = AuthenticatedUser::from_headers(request.headers());
    request.extensions_mut().insert(user);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn blank_header_means_single_tenant() {
        let mut headers = HeaderMap::new();
        assert_eq!(AuthenticatedUser::from_headers(&headers).user_id, None);

        headers.insert(USER_HEADER, HeaderValue::from_static("   "));
        assert_eq!(AuthenticatedUser::from_headers(&headers).user_id, None);

        headers.insert(USER_HEADER, HeaderValue::from_static(" alice "));
        assert_eq!(
            AuthenticatedUser::from_headers(&headers).user_id.as_deref(),
            Some("alice")
        );
    }
}
