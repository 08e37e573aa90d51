use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("Not found: {entity} with {field}={value}")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("Validation: {0}")]
    Validation(String),

    #[error("Invalid transition: cannot {action} {entity} in status {from}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        action: &'static str,
    },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payment {payment_id} already has a settlement")]
    AlreadySettled { payment_id: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Payment provider error: {message}")]
    Provider {
        message: String,
        /// The provider may have acted on the request; an operator (or
        /// `reconcile`) must query the provider before anything is retried.
        reconciliation_required: bool,
    },

    #[error("Repository error: {0}")]
    Repository(String),
}

impl DomainError {
    pub fn not_found(entity: &'static str, value: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            field: "id",
            value: value.to_string(),
        }
    }

    /// Whether this error is likely transient (e.g. DB connection lost,
    /// provider blip) and the operation may succeed if retried.
    pub fn is_transient(&self) -> bool {
        match self {
            DomainError::Repository(_) => true,
            DomainError::Provider {
                reconciliation_required,
                ..
            } => !reconciliation_required,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_errors_are_transient() {
        assert!(DomainError::Repository("connection reset".into()).is_transient());
    }

    #[test]
    fn provider_errors_needing_reconciliation_are_not_retried() {
        let retryable = DomainError::Provider {
            message: "503".into(),
            reconciliation_required: false,
        };
        let settled_elsewhere = DomainError::Provider {
            message: "timeout".into(),
            reconciliation_required: true,
        };
        assert!(retryable.is_transient());
        assert!(!settled_elsewhere.is_transient());
    }

    #[test]
    fn business_rule_errors_are_permanent() {
        assert!(!DomainError::Conflict("double booking".into()).is_transient());
        assert!(!DomainError::AlreadySettled {
            payment_id: "p".into()
        }
        .is_transient());
    }

    #[test]
    fn invalid_transition_message_names_status() {
        let err = DomainError::InvalidTransition {
            entity: "Reservation",
            from: "completed".into(),
            action: "cancel",
        };
        assert_eq!(
            err.to_string(),
            "Invalid transition: cannot cancel Reservation in status completed"
        );
    }
}
