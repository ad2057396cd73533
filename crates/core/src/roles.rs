use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{OrgId, UserId};
use crate::errors::DomainError;

/// Departments and functions that gate workflow transitions. Membership is
/// resolved through a [`RoleDirectory`]; the pipeline itself never stores
/// role assignments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SalesManager,
    Procurement,
    Logistics,
    Customs,
    QuoteControl,
    SeniorManagement,
    Finance,
    Admin,
}

impl Role {
    pub const ALL: [Role; 8] = [
        Role::SalesManager,
        Role::Procurement,
        Role::Logistics,
        Role::Customs,
        Role::QuoteControl,
        Role::SeniorManagement,
        Role::Finance,
        Role::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SalesManager => "sales_manager",
            Role::Procurement => "procurement",
            Role::Logistics => "logistics",
            Role::Customs => "customs",
            Role::QuoteControl => "quote_control",
            Role::SeniorManagement => "senior_management",
            Role::Finance => "finance",
            Role::Admin => "admin",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sales_manager" => Ok(Role::SalesManager),
            "procurement" => Ok(Role::Procurement),
            "logistics" => Ok(Role::Logistics),
            "customs" => Ok(Role::Customs),
            "quote_control" => Ok(Role::QuoteControl),
            "senior_management" => Ok(Role::SeniorManagement),
            "finance" => Ok(Role::Finance),
            "admin" => Ok(Role::Admin),
            other => Err(DomainError::validation(format!("unknown role `{other}`"))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boundary to the external identity/membership system. Answers a single
/// question: does this user hold this role inside this organization.
pub trait RoleDirectory: Send + Sync {
    fn has_role(&self, org_id: &OrgId, user_id: &UserId, role: Role) -> bool;

    /// Admin satisfies every role gate.
    fn authorizes(&self, org_id: &OrgId, user_id: &UserId, role: Role) -> bool {
        self.has_role(org_id, user_id, role) || self.has_role(org_id, user_id, Role::Admin)
    }
}

/// Fixed membership table for embedding and tests.
#[derive(Clone, Debug, Default)]
pub struct StaticRoleDirectory {
    grants: HashMap<(String, String), HashSet<Role>>,
}

impl StaticRoleDirectory {
    pub fn grant(mut self, org_id: &OrgId, user_id: &UserId, role: Role) -> Self {
        self.grants
            .entry((org_id.0.clone(), user_id.0.clone()))
            .or_default()
            .insert(role);
        self
    }
}

impl RoleDirectory for StaticRoleDirectory {
    fn has_role(&self, org_id: &OrgId, user_id: &UserId, role: Role) -> bool {
        self.grants
            .get(&(org_id.0.clone(), user_id.0.clone()))
            .is_some_and(|roles| roles.contains(&role))
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::{OrgId, UserId};
    use crate::roles::{Role, RoleDirectory, StaticRoleDirectory};

    fn org() -> OrgId {
        OrgId("org-1".to_string())
    }

    #[test]
    fn role_strings_round_trip() {
        for role in Role::ALL {
            assert_eq!(Role::parse(role.as_str()).expect("round trip"), role);
        }
        assert!(Role::parse("director_of_vibes").is_err());
    }

    #[test]
    fn directory_scopes_grants_to_organization() {
        let user = UserId("u-ivanova".to_string());
        let directory = StaticRoleDirectory::default().grant(&org(), &user, Role::Logistics);

        assert!(directory.has_role(&org(), &user, Role::Logistics));
        assert!(!directory.has_role(&OrgId("org-2".to_string()), &user, Role::Logistics));
        assert!(!directory.has_role(&org(), &user, Role::Customs));
    }

    #[test]
    fn admin_authorizes_every_role() {
        let user = UserId("u-admin".to_string());
        let directory = StaticRoleDirectory::default().grant(&org(), &user, Role::Admin);

        for role in Role::ALL {
            assert!(directory.authorizes(&org(), &user, role));
        }
        assert!(!directory.has_role(&org(), &user, Role::Customs));
    }
}
