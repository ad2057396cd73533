//! SQLite persistence for the quote pipeline and its settlement ledger.
//!
//! Layering: `repositories` are plain row mappers over an executor and never
//! open transactions; `services` own the transactions and are the only write
//! path for status-bearing fields; `queries` is the read-only status
//! surface.

pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod queries;
pub mod repositories;
pub mod services;

pub use connection::{connect, connect_from_config, connect_with_settings, DbPool};
pub use fixtures::{seed_demo_dataset, SeedSummary};
pub use repositories::RepositoryError;
pub use services::{
    ApprovalDecision, NewInvoice, NewQuote, NewQuoteItem, PaymentInput, PlanUpsert,
    QuoteItemPatch, ServiceError, Services,
};
