pub mod approvals;
pub mod assignment;
pub mod chain;
pub mod config;
pub mod domain;
pub mod errors;
pub mod roles;
pub mod settlement;
pub mod workflow;

pub use approvals::{Amendment, AmendmentOp, ApprovalPolicy, ApprovalReason};
pub use assignment::{AssignmentBook, RouteRule};
pub use chain::{entry_hash, verify_chain, ChainVerification, GENESIS_HASH};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::approval::{Approval, ApprovalId, ApprovalStatus};
pub use domain::assignment::{AssignmentId, BrandAssignment, RouteAssignment};
pub use domain::contract::{
    Contract, ContractId, Deal, DealId, DealStatus, Specification, SpecificationId,
    SpecificationStatus,
};
pub use domain::notification::{
    DocumentOwnerKind, DocumentRef, DocumentRefId, Notification, NotificationId,
    NotificationPriority, NotificationRecipient, NotificationStatus,
};
pub use domain::quote::{
    DealType, ProcurementStatus, Quote, QuoteId, QuoteItem, QuoteItemId, QuoteStatus,
};
pub use domain::settlement::{
    CategoryKind, InvoiceId, InvoiceStatus, PaymentId, PlanFactCategory, PlanFactItem,
    PlanFactItemId, PlanFactStatus, SupplierInvoice, SupplierInvoicePayment,
};
pub use domain::transition::{TransitionId, WorkflowTransition};
pub use domain::{OrgId, UserId};
pub use errors::DomainError;
pub use roles::{Role, RoleDirectory, StaticRoleDirectory};
pub use settlement::{covered_amount, derive_invoice_status, derive_plan_fact, DealTotals};
pub use workflow::{
    Gate, GateContext, ParallelStage, TransitionError, TransitionPlan, WorkflowEngine,
};
