use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    common::contest::ContestStatus,
    db::{
        candidate::Candidate,
        contest::{Contest, NewContest},
    },
};

fn one() -> u32 {
    1
}

/// A contest specification, as submitted by an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestSpec {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Defaults to a single-seat contest.
    #[serde(default = "one")]
    pub max_selections_per_member: u32,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub results_public: Option<bool>,
    #[serde(default)]
    pub group: Option<String>,
}

impl From<ContestSpec> for NewContest {
    fn from(spec: ContestSpec) -> Self {
        let mut contest = NewContest::new(
            spec.title,
            spec.description,
            spec.max_selections_per_member,
            spec.start_at,
            spec.end_at,
        );
        contest.results_public = spec.results_public;
        contest.group = spec.group;
        contest
    }
}

/// A candidate specification, as submitted by an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub photo: Option<String>,
}

/// Request body for reopening a contest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReopenRequest {
    pub end_at: DateTime<Utc>,
}

/// Request body for publishing or hiding results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRequest {
    pub public: bool,
}

/// An API-friendly candidate description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDesc {
    pub id: ApiId,
    pub name: String,
    pub description: String,
    pub photo: Option<String>,
}

impl From<Candidate> for CandidateDesc {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id.into(),
            name: candidate.candidate.name,
            description: candidate.candidate.description,
            photo: candidate.candidate.photo,
        }
    }
}

/// A summary of a contest, without its candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestSummary {
    pub id: ApiId,
    pub title: String,
    pub status: ContestStatus,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    pub group: Option<String>,
}

impl From<Contest> for ContestSummary {
    fn from(contest: Contest) -> Self {
        Self {
            id: contest.id.into(),
            title: contest.contest.title,
            status: contest.contest.status,
            start_at: contest.contest.start_at,
            end_at: contest.contest.end_at,
            group: contest.contest.group,
        }
    }
}

/// A full contest description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestDesc {
    pub id: ApiId,
    pub title: String,
    pub description: String,
    pub max_selections_per_member: u32,
    pub status: ContestStatus,
    pub start_at: Option<DateTime<Utc>>,
    pub end_at: Option<DateTime<Utc>>,
    /// Whether results are released to everyone.
    pub results_public: bool,
    pub group: Option<String>,
    pub candidates: Vec<CandidateDesc>,
}

impl ContestDesc {
    pub fn new(contest: Contest, candidates: Vec<Candidate>) -> Self {
        let results_public = contest.results_public();
        Self {
            id: contest.id.into(),
            title: contest.contest.title,
            description: contest.contest.description,
            max_selections_per_member: contest.contest.max_selections_per_member,
            status: contest.contest.status,
            start_at: contest.contest.start_at,
            end_at: contest.contest.end_at,
            results_public,
            group: contest.contest.group,
            candidates: candidates.into_iter().map(CandidateDesc::from).collect(),
        }
    }
}
