use std::sync::Arc;

use crate::api::{ApiClient, ApiError};
use crate::cache::QueryCache;
use crate::models::{LoginRequest, ProfileUpdate, SessionPayload, SignupRequest, User};
use crate::realtime::ConnectionManager;
use crate::secure_storage::TokenStore;
use crate::store::{ProcessingRegistry, SharedStore};

/// Session lifecycle: obtains the token, hands it to the REST client and the
/// push channel, and tears every per-user state down on logout.
#[derive(Clone)]
pub struct AuthService {
    api: ApiClient,
    tokens: Arc<dyn TokenStore>,
    store: SharedStore,
    realtime: ConnectionManager,
    cache: QueryCache,
    processing: ProcessingRegistry,
}

impl AuthService {
    pub fn new(
        api: ApiClient,
        tokens: Arc<dyn TokenStore>,
        store: SharedStore,
        realtime: ConnectionManager,
        cache: QueryCache,
        processing: ProcessingRegistry,
    ) -> Self {
        Self {
            api,
            tokens,
            store,
            realtime,
            cache,
            processing,
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<User, ApiError> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let payload: SessionPayload = self.api.post("/auth/login", &request).await?;
        Ok(self.establish(payload))
    }

    pub async fn signup(&self, request: &SignupRequest) -> Result<User, ApiError> {
        let payload: SessionPayload = self.api.post("/auth/signup", request).await?;
        Ok(self.establish(payload))
    }

    /// Resume the session of a previous run from the persisted token.
    /// `Ok(None)` when there is no token or the backend no longer accepts it.
    pub async fn restore_session(&self) -> Result<Option<User>, ApiError> {
        let Some(token) = self.tokens.load() else {
            return Ok(None);
        };

        self.api.set_token(token.clone());
        match self.api.get::<User>("/users/me").await {
            Ok(user) => Ok(Some(self.establish(SessionPayload { token, user }))),
            Err(e) if e.is_unauthorized() => {
                tracing::info!("Stored session expired");
                self.api.clear_token();
                self.tokens.clear();
                Ok(None)
            }
            Err(e) => {
                self.api.clear_token();
                Err(e)
            }
        }
    }

    pub fn logout(&self) {
        self.realtime.disconnect();
        self.realtime.set_token(None);
        self.api.clear_token();
        self.tokens.clear();
        self.store.write().clear();
        self.cache.clear();
        self.processing.clear_all();
        tracing::info!("Logged out");
    }

    pub async fn refresh_profile(&self) -> Result<User, ApiError> {
        let user: User = self.api.get("/users/me").await?;
        self.store.write().session.update_user(user.clone());
        Ok(user)
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ApiError> {
        let user: User = self.api.patch("/users/me", update).await?;
        self.store.write().session.update_user(user.clone());
        Ok(user)
    }

    pub async fn accept_terms(&self) -> Result<(), ApiError> {
        self.api
            .post_value("/users/me/accept-terms", &serde_json::json!({}))
            .await?;
        self.store.write().session.accept_terms();
        Ok(())
    }

    fn establish(&self, payload: SessionPayload) -> User {
        let user = payload.user.clone();
        self.tokens.save(&payload.token);
        self.api.set_token(payload.token.clone());
        self.realtime.set_token(Some(payload.token.clone()));
        self.store.write().session.login(payload);
        self.realtime.connect();
        user
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::testing::FakeConnector;
    use crate::realtime::{ConnectionStatus, ReconnectPolicy};
    use crate::secure_storage::MemoryTokenStore;
    use crate::store::app_store;
    use serde_json::json;
    use std::time::Duration;
    use url::Url;

    struct Harness {
        auth: AuthService,
        connector: Arc<FakeConnector>,
        tokens: Arc<MemoryTokenStore>,
        store: SharedStore,
        cache: QueryCache,
        processing: ProcessingRegistry,
    }

    fn harness() -> Harness {
        let connector = Arc::new(FakeConnector::default());
        let realtime = ConnectionManager::new(
            connector.clone(),
            Url::parse("ws://127.0.0.1:9/socket.io/").unwrap(),
            "/",
            ReconnectPolicy::default(),
        );
        let tokens = Arc::new(MemoryTokenStore::default());
        let store = app_store::shared();
        let cache = QueryCache::new(Duration::from_secs(60));
        let processing = ProcessingRegistry::new(Duration::from_millis(3000));
        let auth = AuthService::new(
            ApiClient::new("http://127.0.0.1:9/api/v1"),
            tokens.clone(),
            store.clone(),
            realtime,
            cache.clone(),
            processing.clone(),
        );
        Harness {
            auth,
            connector,
            tokens,
            store,
            cache,
            processing,
        }
    }

    fn payload() -> SessionPayload {
        SessionPayload {
            token: "jwt-1".to_string(),
            user: serde_json::from_value(json!({"id": "u1", "email": "a@b.fr"})).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_establish_wires_token_everywhere() {
        let h = harness();
        let user = h.auth.establish(payload());

        assert_eq!(user.id, "u1");
        assert_eq!(h.tokens.load().as_deref(), Some("jwt-1"));
        assert_eq!(h.auth.api.token().as_deref(), Some("jwt-1"));
        assert!(h.store.read().session.is_authenticated());
        assert_eq!(h.connector.open_count(), 1);
        assert_eq!(
            h.connector.last_options().unwrap().token.as_deref(),
            Some("jwt-1")
        );
    }

    #[tokio::test]
    async fn test_logout_clears_per_user_state() {
        let h = harness();
        h.auth.establish(payload());
        h.cache.insert(
            crate::cache::CacheKey::raw("getContract", r#"{"id":"c1"}"#),
            json!({"id": "c1"}),
            vec![],
        );
        h.processing.start_processing("c1");

        h.auth.logout();

        assert!(!h.store.read().session.is_authenticated());
        assert!(h.tokens.load().is_none());
        assert!(h.auth.api.token().is_none());
        assert!(h.cache.is_empty());
        assert!(h.processing.is_empty());
        assert_eq!(h.auth.realtime.status(), ConnectionStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_restore_without_token_is_anonymous() {
        let h = harness();
        assert_eq!(h.auth.restore_session().await.unwrap(), None);
        assert_eq!(h.connector.open_count(), 0);
    }

    #[tokio::test]
    async fn test_restore_with_unreachable_backend_keeps_token() {
        let h = harness();
        h.tokens.save("jwt-1");

        let err = h.auth.restore_session().await.unwrap_err();
        assert!(matches!(err, ApiError::Network { .. }));
        assert_eq!(h.tokens.load().as_deref(), Some("jwt-1"));
        assert!(h.auth.api.token().is_none());
    }
}
