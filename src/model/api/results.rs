use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::engine::{
    curve::CurvePoint,
    lifecycle::TickReport,
    tally::{BranchTurnout, DataSource, GroupTally, Tally},
    visibility::{Visibility, VisibilityReason},
};
use crate::model::{api::id::ApiId, common::contest::ContestStatus, mongodb::Id};

/// An API-friendly tally of one contest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyDesc {
    pub contest_id: ApiId,
    /// Votes per candidate ID.
    pub counts: BTreeMap<ApiId, u64>,
    pub total_votes: u64,
    pub unique_voters: usize,
    pub turnout_pct: Option<u32>,
    pub branch_turnout: Vec<BranchTurnout>,
    pub degraded: Vec<DataSource>,
}

impl From<Tally> for TallyDesc {
    fn from(tally: Tally) -> Self {
        Self {
            contest_id: tally.contest_id.into(),
            total_votes: tally.total_votes(),
            counts: tally
                .counts
                .into_iter()
                .map(|(candidate, votes)| (candidate.into(), votes))
                .collect(),
            unique_voters: tally.unique_voters.len(),
            turnout_pct: tally.turnout_pct,
            branch_turnout: tally.branch_turnout,
            degraded: tally.degraded,
        }
    }
}

/// The answer to a tally request. Hidden results are not an error: the
/// tally is simply withheld and `visibility` says why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyResponse {
    pub visibility: Visibility,
    pub tally: Option<TallyDesc>,
}

impl TallyResponse {
    pub fn withheld(visibility: Visibility) -> Self {
        Self {
            visibility,
            tally: None,
        }
    }
}

/// Turnout across an election grouping, with each contest's tally subject
/// to that contest's visibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupTallyDesc {
    pub group: String,
    pub unique_voters: usize,
    pub turnout_pct: Option<u32>,
    pub branch_turnout: Vec<BranchTurnout>,
    pub degraded: Vec<DataSource>,
    pub contests: Vec<TallyResponse>,
}

impl GroupTallyDesc {
    pub fn new(group: GroupTally, contests: Vec<TallyResponse>) -> Self {
        Self {
            group: group.group,
            unique_voters: group.unique_voters.len(),
            turnout_pct: group.turnout_pct,
            branch_turnout: group.branch_turnout,
            degraded: group.degraded,
            contests,
        }
    }
}

/// The engagement curve of a contest. Points are only given while voting is
/// under way; otherwise the client shows a neutral state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveResponse {
    pub contest_id: ApiId,
    pub status: ContestStatus,
    pub points: Option<Vec<CurvePoint>>,
    /// Sources that could not be read; the curve is drawn without them.
    pub degraded: Vec<DataSource>,
}

/// Visibility of the "current" contest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentVisibility {
    pub contest_id: Option<ApiId>,
    pub visible: bool,
    pub reason: VisibilityReason,
}

/// What a manually triggered scheduler tick did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReportDesc {
    pub activated: Vec<ApiId>,
    pub completed: Vec<ApiId>,
    pub skipped: Vec<ApiId>,
    pub failed: Vec<ApiId>,
}

impl From<TickReport> for TickReportDesc {
    fn from(report: TickReport) -> Self {
        let ids = |ids: Vec<Id>| -> Vec<ApiId> { ids.into_iter().map(ApiId::from).collect() };
        Self {
            activated: ids(report.activated),
            completed: ids(report.completed),
            skipped: ids(report.skipped),
            failed: ids(report.failed),
        }
    }
}
