use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{OrgId, UserId};
use crate::errors::DomainError;
use crate::roles::Role;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRefId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    Normal,
    High,
}

impl NotificationPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationPriority::Low => "low",
            NotificationPriority::Normal => "normal",
            NotificationPriority::High => "high",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(NotificationPriority::Low),
            "normal" => Ok(NotificationPriority::Normal),
            "high" => Ok(NotificationPriority::High),
            other => {
                Err(DomainError::validation(format!("unknown notification priority `{other}`")))
            }
        }
    }
}

/// Delivery progress reported back by the external dispatcher. The pipeline
/// only ever enqueues rows in `queued`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Queued,
    Sent,
    Delivered,
    Read,
    Failed,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Queued => "queued",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Delivered => "delivered",
            NotificationStatus::Read => "read",
            NotificationStatus::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "queued" => Ok(NotificationStatus::Queued),
            "sent" => Ok(NotificationStatus::Sent),
            "delivered" => Ok(NotificationStatus::Delivered),
            "read" => Ok(NotificationStatus::Read),
            "failed" => Ok(NotificationStatus::Failed),
            other => {
                Err(DomainError::validation(format!("unknown notification status `{other}`")))
            }
        }
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage handoffs address a concrete user when one is derivable (the sales
/// manager, a resolved procurement or logistics assignee) and fall back to the
/// whole department otherwise.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationRecipient {
    User(UserId),
    Department(Role),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub org_id: OrgId,
    pub recipient: NotificationRecipient,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub priority: NotificationPriority,
    pub status: NotificationStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Closed set of entities a document can be attached to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentOwnerKind {
    Quote,
    Specification,
    Deal,
    SupplierInvoice,
}

impl DocumentOwnerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentOwnerKind::Quote => "quote",
            DocumentOwnerKind::Specification => "specification",
            DocumentOwnerKind::Deal => "deal",
            DocumentOwnerKind::SupplierInvoice => "supplier_invoice",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "quote" => Ok(DocumentOwnerKind::Quote),
            "specification" => Ok(DocumentOwnerKind::Specification),
            "deal" => Ok(DocumentOwnerKind::Deal),
            "supplier_invoice" => Ok(DocumentOwnerKind::SupplierInvoice),
            other => {
                Err(DomainError::validation(format!("unknown document owner kind `{other}`")))
            }
        }
    }
}

/// Pointer to an externally stored file. The path is opaque to the pipeline;
/// contents are never inspected here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: DocumentRefId,
    pub org_id: OrgId,
    pub owner_kind: DocumentOwnerKind,
    pub owner_id: String,
    pub path: String,
    pub uploaded_by: UserId,
    pub uploaded_at: DateTime<Utc>,
}
