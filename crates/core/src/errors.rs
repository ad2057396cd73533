use thiserror::Error;

use crate::roles::Role;
use crate::workflow::TransitionError;

/// Domain-level rejection taxonomy. Every rejected mutation maps to exactly
/// one of these variants and names the specific precondition that failed.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("actor `{actor}` is not authorized to {action} (requires role `{role}`)")]
    Authorization { actor: String, role: Role, action: String },
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("validation failed: {0}")]
    Validation(String),
}

impl DomainError {
    pub fn authorization(
        actor: impl Into<String>,
        role: Role,
        action: impl Into<String>,
    ) -> Self {
        Self::Authorization { actor: actor.into(), role, action: action.into() }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::quote::QuoteStatus;
    use crate::errors::DomainError;
    use crate::roles::Role;
    use crate::workflow::TransitionError;

    #[test]
    fn authorization_error_names_actor_role_and_action() {
        let error =
            DomainError::authorization("u-petrov", Role::QuoteControl, "return quote for revision");

        assert_eq!(
            error.to_string(),
            "actor `u-petrov` is not authorized to return quote for revision (requires role `quote_control`)"
        );
    }

    #[test]
    fn transition_error_folds_into_domain_error() {
        let error: DomainError = TransitionError::NotAdmissible {
            from: QuoteStatus::Draft,
            to: QuoteStatus::Deal,
        }
        .into();

        assert!(matches!(error, DomainError::InvalidTransition(_)));
        assert!(error.to_string().contains("draft"));
        assert!(error.to_string().contains("deal"));
    }
}
