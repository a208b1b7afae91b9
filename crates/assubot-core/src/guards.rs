//! Access checks a front-end runs before showing a screen.
//!
//! Checks are ordered: authentication first, then profile completion, then
//! terms acceptance. The first failing check decides the redirect.

use crate::store::SessionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    CompleteProfile,
    AcceptTerms,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    Allow,
    Redirect(Route),
}

impl GuardOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardOutcome::Allow)
    }
}

pub fn is_authenticated(session: &SessionStore) -> bool {
    session.is_authenticated()
}

pub fn is_profile_complete(session: &SessionStore) -> bool {
    session.user().is_some_and(|u| u.is_profile_complete())
}

pub fn has_accepted_terms(session: &SessionStore) -> bool {
    session.user().is_some_and(|u| u.accepted_terms)
}

/// Screens that only need a session (profile and terms forms themselves)
pub fn require_auth(session: &SessionStore) -> GuardOutcome {
    if is_authenticated(session) {
        GuardOutcome::Allow
    } else {
        GuardOutcome::Redirect(Route::Login)
    }
}

/// Screens of the product proper
pub fn require_onboarded(session: &SessionStore) -> GuardOutcome {
    if !is_authenticated(session) {
        GuardOutcome::Redirect(Route::Login)
    } else if !is_profile_complete(session) {
        GuardOutcome::Redirect(Route::CompleteProfile)
    } else if !has_accepted_terms(session) {
        GuardOutcome::Redirect(Route::AcceptTerms)
    } else {
        GuardOutcome::Allow
    }
}
