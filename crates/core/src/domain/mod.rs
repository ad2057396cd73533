pub mod approval;
pub mod assignment;
pub mod contract;
pub mod notification;
pub mod quote;
pub mod settlement;
pub mod transition;

pub use contract::ContractId;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrgId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);
