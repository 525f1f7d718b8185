//! Who may see a contest's results, and when.

use serde::{Deserialize, Serialize};

use crate::model::{
    common::{contest::ContestStatus, role::Role},
    db::contest::Contest,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityReason {
    /// Results are published to everyone.
    Public,
    /// Results are hidden, but the caller's role may see them anyway.
    Privileged,
    /// Results are hidden from this caller.
    Hidden,
    /// There is no contest to show results for.
    NoData,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visibility {
    pub visible: bool,
    pub reason: VisibilityReason,
}

impl Visibility {
    fn new(reason: VisibilityReason) -> Self {
        let visible = matches!(
            reason,
            VisibilityReason::Public | VisibilityReason::Privileged
        );
        Self { visible, reason }
    }
}

/// Decide whether `role` may see the results of `contest`.
///
/// Anonymous callers (`role == None`) are treated like ordinary members.
pub fn resolve(contest: Option<&Contest>, role: Option<Role>) -> Visibility {
    let contest = match contest {
        Some(contest) => contest,
        None => return Visibility::new(VisibilityReason::NoData),
    };
    if contest.results_public() {
        Visibility::new(VisibilityReason::Public)
    } else if role.map_or(false, Role::sees_hidden_results) {
        Visibility::new(VisibilityReason::Privileged)
    } else {
        Visibility::new(VisibilityReason::Hidden)
    }
}

/// The contest whose results are "current": the ongoing contest that started
/// most recently, or failing that the most recently ended completed one.
pub fn current_contest(contests: &[Contest]) -> Option<&Contest> {
    let ongoing = contests
        .iter()
        .filter(|c| c.status.is_ongoing())
        .max_by_key(|c| (c.start_at, c.id));
    ongoing.or_else(|| {
        contests
            .iter()
            .filter(|c| c.status == ContestStatus::Completed)
            .max_by_key(|c| (c.end_at, c.id))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{Duration, Utc};

    use crate::model::{db::contest::NewContest, mongodb::Id};

    fn contest(results_public: Option<bool>) -> Contest {
        let mut contest = NewContest::current_example();
        contest.results_public = results_public;
        Contest { id: Id::new(), contest }
    }

    #[test]
    fn unset_flag_behaves_like_public() {
        let unset = contest(None);
        let public = contest(Some(true));
        for role in [None, Some(Role::Member), Some(Role::Auditor), Some(Role::Admin)] {
            assert_eq!(resolve(Some(&unset), role), resolve(Some(&public), role));
            assert!(resolve(Some(&unset), role).visible);
        }
    }

    #[test]
    fn hidden_results_need_admin_or_officer() {
        let hidden = contest(Some(false));
        for role in [Role::Admin, Role::Officer] {
            assert_eq!(
                resolve(Some(&hidden), Some(role)),
                Visibility {
                    visible: true,
                    reason: VisibilityReason::Privileged
                }
            );
        }
        for role in [None, Some(Role::Member), Some(Role::Auditor)] {
            assert_eq!(
                resolve(Some(&hidden), role),
                Visibility {
                    visible: false,
                    reason: VisibilityReason::Hidden
                }
            );
        }
    }

    #[test]
    fn no_contest_is_not_the_same_as_hidden() {
        let none = resolve(None, Some(Role::Admin));
        assert!(!none.visible);
        assert_eq!(none.reason, VisibilityReason::NoData);
    }

    #[test]
    fn current_contest_prefers_ongoing_then_latest_completed() {
        let now = Utc::now();
        let mut old = contest(None);
        old.status = ContestStatus::Completed;
        old.end_at = Some(now - Duration::days(10));
        let mut recent = contest(None);
        recent.status = ContestStatus::Completed;
        recent.end_at = Some(now - Duration::days(1));
        let mut cancelled = contest(None);
        cancelled.status = ContestStatus::Cancelled;

        let mut contests = vec![old.clone(), recent.clone(), cancelled];
        assert_eq!(current_contest(&contests).map(|c| c.id), Some(recent.id));

        let mut paused = contest(None);
        paused.status = ContestStatus::Paused;
        contests.push(paused.clone());
        assert_eq!(current_contest(&contests).map(|c| c.id), Some(paused.id));

        assert!(current_contest(&[]).is_none());
    }
}
