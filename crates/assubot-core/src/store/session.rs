use crate::models::{SessionPayload, User};
use crate::realtime::CreditUpdate;

/// Sub-store for the authenticated user. One session at a time.
#[derive(Debug, Default)]
pub struct SessionStore {
    token: Option<String>,
    user: Option<User>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn login(&mut self, payload: SessionPayload) {
        tracing::info!(user_id = %payload.user.id, "session started");
        self.token = Some(payload.token);
        self.user = Some(payload.user);
    }

    pub fn logout(&mut self) {
        if self.user.is_some() {
            tracing::info!("session ended");
        }
        self.token = None;
        self.user = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.user.is_some()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.id.as_str())
    }

    pub fn credit_balance(&self) -> Option<u64> {
        self.user.as_ref().map(|u| u.credit_balance)
    }

    // ===== Mutations =====

    /// Returns whether the balance changed
    pub fn set_credit_balance(&mut self, balance: u64) -> bool {
        match self.user.as_mut() {
            Some(user) if user.credit_balance != balance => {
                user.credit_balance = balance;
                true
            }
            _ => false,
        }
    }

    /// Apply a pushed balance change if it belongs to the signed-in user.
    /// Returns whether the update was accepted, even when the balance was
    /// already at that value.
    pub fn apply_credit_update(&mut self, update: &CreditUpdate) -> bool {
        if self.user_id() != Some(update.user_id.as_str()) {
            tracing::debug!(user_id = %update.user_id, "ignoring credit update for another user");
            return false;
        }
        self.set_credit_balance(update.new_balance);
        true
    }

    /// Replace the user with a fresher copy from the backend
    pub fn update_user(&mut self, user: User) {
        if self.token.is_none() {
            return;
        }
        self.user = Some(user);
    }

    pub fn accept_terms(&mut self) {
        if let Some(user) = self.user.as_mut() {
            user.accepted_terms = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::CreditOperation;

    fn signed_in(balance: u64) -> SessionStore {
        let mut store = SessionStore::new();
        store.login(SessionPayload {
            token: "tok".to_string(),
            user: serde_json::from_value(serde_json::json!({
                "id": "u1",
                "email": "jeanne@example.fr",
                "creditBalance": balance
            }))
            .unwrap(),
        });
        store
    }

    fn update(user_id: &str, balance: u64) -> CreditUpdate {
        CreditUpdate {
            user_id: user_id.to_string(),
            new_balance: balance,
            operation: CreditOperation::Purchased,
            amount: 10,
        }
    }

    #[test]
    fn test_credit_update_filtered_by_user() {
        let mut store = signed_in(50);
        assert!(!store.apply_credit_update(&update("u2", 10)));
        assert_eq!(store.credit_balance(), Some(50));

        assert!(store.apply_credit_update(&update("u1", 60)));
        assert_eq!(store.credit_balance(), Some(60));

        assert!(store.apply_credit_update(&update("u1", 60)));
        assert_eq!(store.credit_balance(), Some(60));
    }

    #[test]
    fn test_logout_clears_everything() {
        let mut store = signed_in(50);
        assert!(store.is_authenticated());
        store.logout();
        assert!(!store.is_authenticated());
        assert_eq!(store.credit_balance(), None);
        assert!(!store.set_credit_balance(3));
    }

    #[test]
    fn test_accept_terms() {
        let mut store = signed_in(0);
        assert!(!store.user().unwrap().accepted_terms);
        store.accept_terms();
        assert!(store.user().unwrap().accepted_terms);
    }
}
