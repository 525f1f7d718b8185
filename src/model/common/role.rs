use serde::{Deserialize, Serialize};

/// A member's role within the organization.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Officer,
    Admin,
    Auditor,
}

impl Role {
    /// May this role see results that have not been made public?
    pub fn sees_hidden_results(self) -> bool {
        matches!(self, Self::Admin | Self::Officer)
    }
}
