use serde::{Deserialize, Serialize};

use crate::model::{common::role::Role, mongodb::Id};

/// Branch name used for members without one.
pub const UNASSIGNED_BRANCH: &str = "Unassigned";

/// A member of the organization. Members are managed elsewhere; this
/// backend only reads the fields it needs for turnout and privilege checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    #[serde(rename = "_id")]
    pub id: Id,
    /// Branch or unit code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub role: Role,
}

impl Member {
    pub fn new(branch: Option<&str>, role: Role) -> Self {
        Self {
            id: Id::new(),
            branch: branch.map(String::from),
            role,
        }
    }

    /// The branch this member counts towards in turnout statistics.
    pub fn branch_name(&self) -> &str {
        match self.branch.as_deref().map(str::trim) {
            Some(branch) if !branch.is_empty() => branch,
            _ => UNASSIGNED_BRANCH,
        }
    }
}
