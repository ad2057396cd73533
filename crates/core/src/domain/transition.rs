use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::quote::{QuoteId, QuoteStatus};
use crate::domain::UserId;
use crate::roles::Role;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransitionId(pub String);

/// Append-only audit row written once per committed quote transition.
/// `seq` is dense per quote starting at 1; `entry_hash` chains each row to
/// its predecessor so retroactive edits are detectable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowTransition {
    pub id: TransitionId,
    pub quote_id: QuoteId,
    pub seq: i64,
    pub from_status: QuoteStatus,
    pub to_status: QuoteStatus,
    pub actor_id: UserId,
    pub role: Role,
    pub comment: Option<String>,
    pub prev_hash: String,
    pub entry_hash: String,
    pub occurred_at: DateTime<Utc>,
}
