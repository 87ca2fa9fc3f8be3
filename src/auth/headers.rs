//! Outbound authentication headers.

use std::sync::Arc;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

use crate::auth::identity::{IdentityError, IdentityTokenProvider};

pub const X_SERVERLESS_AUTHORIZATION: HeaderName =
    HeaderName::from_static("x-serverless-authorization");

/// Headers attached to one upstream call. Built per request, never cached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthHeaderSet {
    /// The caller's own `Authorization`, passed through unchanged.
    pub authorization: Option<HeaderValue>,
    /// The gateway's service identity for the upstream.
    pub serverless_authorization: Option<HeaderValue>,
}

impl AuthHeaderSet {
    pub fn apply(&self, headers: &mut HeaderMap) {
        if let Some(value) = &self.authorization {
            headers.insert(header::AUTHORIZATION, value.clone());
        }
        if let Some(value) = &self.serverless_authorization {
            headers.insert(X_SERVERLESS_AUTHORIZATION, value.clone());
        }
    }
}

/// Combines the caller's credentials with a freshly minted service identity.
#[derive(Clone)]
pub struct AuthHeaderResolver {
    /// `None` in local development: no service identity is attached.
    identity: Option<(Arc<dyn IdentityTokenProvider>, String)>,
}

impl AuthHeaderResolver {
    /// Resolver that only passes the caller's header through.
    pub fn local() -> Self {
        Self { identity: None }
    }

    /// Resolver that mints a token for `audience` on every call.
    pub fn with_identity(
        provider: Arc<dyn IdentityTokenProvider>,
        audience: impl Into<String>,
    ) -> Self {
        Self {
            identity: Some((provider, audience.into())),
        }
    }

    /// Build the header set for one upstream call.
    ///
    /// A provider failure is returned as-is; the caller must not forward
    /// the request without the service identity.
    pub async fn resolve(
        &self,
        user_authorization: Option<&HeaderValue>,
    ) -> Result<AuthHeaderSet, IdentityError> {
        let mut set = AuthHeaderSet {
            authorization: user_authorization.cloned(),
            serverless_authorization: None,
        };

        let Some((provider, audience)) = &self.identity else {
            tracing::debug!("Skipping service identity for local development");
            return Ok(set);
        };

        let token = provider.authorization_for(audience).await?;
        let value = HeaderValue::from_str(&token).map_err(|_| IdentityError::InvalidToken)?;
        set.serverless_authorization = Some(value);
        Ok(set)
    }
}

impl std::fmt::Debug for AuthHeaderResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthHeaderResolver")
            .field("audience", &self.identity.as_ref().map(|(_, aud)| aud))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl IdentityTokenProvider for FixedProvider {
        async fn authorization_for(&self, audience: &str) -> Result<String, IdentityError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("Bearer svc-{}-{}", audience, n))
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl IdentityTokenProvider for FailingProvider {
        async fn authorization_for(&self, _audience: &str) -> Result<String, IdentityError> {
            Err(IdentityError::EmptyToken)
        }
    }

    #[tokio::test]
    async fn test_local_passes_user_header_only() {
        let user = HeaderValue::from_static("Bearer user-token");
        let set = AuthHeaderResolver::local().resolve(Some(&user)).await.unwrap();
        assert_eq!(set.authorization, Some(user));
        assert!(set.serverless_authorization.is_none());

        let set = AuthHeaderResolver::local().resolve(None).await.unwrap();
        assert_eq!(set, AuthHeaderSet::default());
    }

    #[tokio::test]
    async fn test_mints_fresh_token_per_call() {
        let provider = Arc::new(FixedProvider {
            calls: AtomicUsize::new(0),
        });
        let resolver = AuthHeaderResolver::with_identity(provider.clone(), "backend");
        let user = HeaderValue::from_static("Bearer user-token");

        let first = resolver.resolve(Some(&user)).await.unwrap();
        let second = resolver.resolve(None).await.unwrap();

        assert_eq!(first.authorization, Some(user));
        assert_eq!(first.serverless_authorization.unwrap(), "Bearer svc-backend-0");
        assert!(second.authorization.is_none());
        assert_eq!(second.serverless_authorization.unwrap(), "Bearer svc-backend-1");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_provider_failure_is_fatal() {
        let resolver = AuthHeaderResolver::with_identity(Arc::new(FailingProvider), "backend");
        assert!(resolver.resolve(None).await.is_err());
    }

    #[test]
    fn test_apply_writes_both_headers() {
        let set = AuthHeaderSet {
            authorization: Some(HeaderValue::from_static("Bearer a")),
            serverless_authorization: Some(HeaderValue::from_static("Bearer b")),
        };
        let mut headers = HeaderMap::new();
        set.apply(&mut headers);
        assert_eq!(headers[header::AUTHORIZATION], "Bearer a");
        assert_eq!(headers[X_SERVERLESS_AUTHORIZATION], "Bearer b");
    }
}
