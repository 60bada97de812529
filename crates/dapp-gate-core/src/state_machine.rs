use serde::{Deserialize, Serialize};

use crate::errors::{PortError, ValidationError};

/// Lifecycle of a single authorization prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthStatus {
    None,
    Pending,
    Allowed,
    Denied,
    Persisted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAction {
    Request,
    Allow,
    Deny,
    Persist,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransition {
    pub from: AuthStatus,
    pub to: AuthStatus,
    pub reason: &'static str,
}

pub fn auth_transition(
    from: AuthStatus,
    action: AuthAction,
) -> Result<StateTransition, ValidationError> {
    let (to, reason) = match (from, action) {
        (AuthStatus::None, AuthAction::Request) => (AuthStatus::Pending, "prompt_opened"),
        (AuthStatus::Pending, AuthAction::Allow) => (AuthStatus::Allowed, "user_allowed"),
        (AuthStatus::Pending, AuthAction::Deny) => (AuthStatus::Denied, "user_denied"),
        (AuthStatus::Allowed | AuthStatus::Denied, AuthAction::Persist) => {
            (AuthStatus::Persisted, "decision_persisted")
        }
        _ => {
            return Err(ValidationError::Port(PortError::Validation(format!(
                "illegal auth transition: {from:?} --{action:?}-->"
            ))))
        }
    };
    Ok(StateTransition { from, to, reason })
}
