use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{OrgId, UserId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssignmentId(pub String);

/// Maps a brand to the procurement specialist who owns it. Unique per
/// (organization, brand), matched exactly after normalization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandAssignment {
    pub id: AssignmentId,
    pub org_id: OrgId,
    pub brand: String,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Maps a route pattern to the logistics specialist who owns it. Patterns
/// may carry `*` wildcards; the most specific matching pattern wins.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteAssignment {
    pub id: AssignmentId,
    pub org_id: OrgId,
    pub pattern: String,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
