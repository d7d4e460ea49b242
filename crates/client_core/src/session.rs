use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct SessionState {
    token: String,
    current_user: Option<Value>,
}

/// Login state shared by everything that issues requests for one console
/// session. Cloning shares the same state.
#[derive(Debug, Clone, Default)]
pub struct SessionContext {
    inner: Arc<RwLock<SessionState>>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(SessionState {
                token: token.into(),
                current_user: None,
            })),
        }
    }

    pub async fn set_auth(&self, token: impl Into<String>, user: Option<Value>) {
        let mut guard = self.inner.write().await;
        guard.token = token.into();
        guard.current_user = user;
    }

    pub async fn clear_auth(&self) {
        let mut guard = self.inner.write().await;
        guard.token.clear();
        guard.current_user = None;
    }

    /// The bearer token, if one is set and non-empty.
    pub async fn token(&self) -> Option<String> {
        let guard = self.inner.read().await;
        (!guard.token.is_empty()).then(|| guard.token.clone())
    }

    pub async fn current_user(&self) -> Option<Value> {
        self.inner.read().await.current_user.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        !self.inner.read().await.token.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn set_and_clear_auth_round_trip_through_clones() {
        let session = SessionContext::new();
        let shared = session.clone();
        assert!(!shared.is_authenticated().await);
        assert_eq!(shared.token().await, None);

        session
            .set_auth("tok-1", Some(json!({ "userId": "admin" })))
            .await;
        assert_eq!(shared.token().await.as_deref(), Some("tok-1"));
        assert_eq!(
            shared.current_user().await,
            Some(json!({ "userId": "admin" }))
        );

        shared.clear_auth().await;
        assert!(!session.is_authenticated().await);
        assert_eq!(session.current_user().await, None);
    }

    #[tokio::test]
    async fn empty_token_counts_as_signed_out() {
        let session = SessionContext::with_token("");
        assert_eq!(session.token().await, None);
        assert!(!session.is_authenticated().await);
    }
}
