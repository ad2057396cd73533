//! Mutation surface of the pipeline. Each operation is one transaction:
//! load current rows, check the actor's role, re-derive whatever the write
//! depends on, persist, commit. Derived fields are never trusted from the
//! caller and never read back stale.

use std::sync::Arc;

use thiserror::Error;

use dealflow_core::approvals::ApprovalPolicy;
use dealflow_core::errors::DomainError;
use dealflow_core::roles::{Role, RoleDirectory};
use dealflow_core::workflow::TransitionError;
use dealflow_core::{OrgId, UserId};

use crate::repositories::RepositoryError;
use crate::DbPool;

pub mod approvals;
pub mod assignments;
pub mod documents;
pub mod issuance;
pub mod quotes;
pub mod settlement;
pub mod workflow;

pub use approvals::{ApprovalDecision, ApprovalService};
pub use assignments::AssignmentService;
pub use documents::DocumentService;
pub use issuance::IssuanceService;
pub use quotes::{NewQuote, NewQuoteItem, QuoteItemPatch, QuoteService};
pub use settlement::{NewInvoice, PaymentInput, PlanUpsert, SettlementService};
pub use workflow::WorkflowService;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
}

impl From<sqlx::Error> for ServiceError {
    fn from(error: sqlx::Error) -> Self {
        ServiceError::Repository(RepositoryError::Database(error))
    }
}

impl From<TransitionError> for ServiceError {
    fn from(error: TransitionError) -> Self {
        ServiceError::Domain(DomainError::InvalidTransition(error))
    }
}

impl ServiceError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        ServiceError::NotFound { entity, id: id.into() }
    }
}

pub(crate) fn new_id(prefix: &str) -> String {
    format!("{prefix}-{}", sqlx::types::Uuid::new_v4())
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(db) if db.message().contains("UNIQUE constraint failed")
    )
}

/// Maps a unique-index rejection to a caller-facing conflict; anything else
/// stays a repository error.
pub(crate) fn unique_conflict(error: RepositoryError, message: &str) -> ServiceError {
    match error {
        RepositoryError::Database(db_error) if is_unique_violation(&db_error) => {
            ServiceError::Domain(DomainError::conflict(message))
        }
        other => ServiceError::Repository(other),
    }
}

pub(crate) fn ensure_role(
    roles: &dyn RoleDirectory,
    org_id: &OrgId,
    actor: &UserId,
    role: Role,
    action: &str,
) -> Result<(), ServiceError> {
    if roles.authorizes(org_id, actor, role) {
        Ok(())
    } else {
        Err(ServiceError::Domain(DomainError::authorization(actor.0.clone(), role, action)))
    }
}

/// Passes when the actor holds any of the listed roles. The authorization
/// error names the first listed role, which callers order as the primary
/// owner of the action.
pub(crate) fn ensure_any_role(
    roles: &dyn RoleDirectory,
    org_id: &OrgId,
    actor: &UserId,
    accepted: &[Role],
    action: &str,
) -> Result<(), ServiceError> {
    if accepted.iter().any(|role| roles.authorizes(org_id, actor, *role)) {
        return Ok(());
    }
    let role = accepted.first().copied().unwrap_or(Role::Admin);
    Err(ServiceError::Domain(DomainError::authorization(actor.0.clone(), role, action)))
}

/// One constructor for the whole mutation surface; the CLI and tests hold
/// this instead of wiring seven services by hand.
pub struct Services {
    pub quotes: QuoteService,
    pub workflow: WorkflowService,
    pub approvals: ApprovalService,
    pub issuance: IssuanceService,
    pub settlement: SettlementService,
    pub assignments: AssignmentService,
    pub documents: DocumentService,
}

impl Services {
    pub fn new(pool: DbPool, roles: Arc<dyn RoleDirectory>, policy: ApprovalPolicy) -> Self {
        Self {
            quotes: QuoteService::new(pool.clone(), roles.clone()),
            workflow: WorkflowService::new(pool.clone(), roles.clone(), policy.clone()),
            approvals: ApprovalService::new(pool.clone(), roles.clone(), policy.clone()),
            issuance: IssuanceService::new(pool.clone(), roles.clone(), policy),
            settlement: SettlementService::new(pool.clone(), roles.clone()),
            assignments: AssignmentService::new(pool.clone(), roles.clone()),
            documents: DocumentService::new(pool, roles),
        }
    }
}
