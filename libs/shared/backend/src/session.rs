use std::sync::Arc;

/// Source of the caller's access token for outgoing backend calls.
///
/// Services never read tokens from storage themselves; whoever builds the
/// client decides where the token comes from.
pub trait SessionContext: Send + Sync {
    fn access_token(&self) -> Option<String>;
}

/// Forwards the bearer token the current request arrived with.
#[derive(Debug, Clone)]
pub struct BearerSession {
    token: String,
}

impl BearerSession {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }

    pub fn shared(token: impl Into<String>) -> Arc<dyn SessionContext> {
        Arc::new(Self::new(token))
    }
}

impl SessionContext for BearerSession {
    fn access_token(&self) -> Option<String> {
        if self.token.is_empty() {
            None
        } else {
            Some(self.token.clone())
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnonymousSession;

impl SessionContext for AnonymousSession {
    fn access_token(&self) -> Option<String> {
        None
    }
}
