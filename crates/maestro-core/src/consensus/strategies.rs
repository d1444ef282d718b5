//! Voting strategies as an explicit dispatch table.
//!
//! Each strategy is a pure function over pre-computed vote metrics, so
//! strategies are unit-testable in isolation and adding one is a single
//! table entry. Quorum and critical-blocking are handled *before*
//! dispatch (see the coordinator); a strategy only decides among
//! `approved`, `queue_changes`, `address_critical`, and `escalate`.

use crate::models::review::{ReviewOutcome, Thresholds, VotingStrategy};

/// Weighted totals and counts folded from a panel's votes. Abstentions
/// are counted but carry no weight.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoteMetrics {
    pub vote_count: usize,
    pub abstain_count: usize,
    /// Raw (unweighted) count of `approve` votes.
    pub approve_count: usize,
    pub approve_weight: f64,
    pub changes_weight: f64,
    pub critical_weight: f64,
    pub total_weight: f64,
    pub approval_percentage: f64,
    pub changes_percentage: f64,
    pub critical_percentage: f64,
}

pub type StrategyFn = fn(&VoteMetrics, &Thresholds) -> (ReviewOutcome, String);

/// Strategy tag → pure evaluation function.
pub const STRATEGIES: &[(VotingStrategy, StrategyFn)] = &[
    (VotingStrategy::AnyCritical, any_critical),
    (VotingStrategy::Unanimous, unanimous),
    (VotingStrategy::Majority, majority),
    (VotingStrategy::Quorum, quorum),
    (VotingStrategy::WeightedThreshold, weighted_threshold),
];

/// Look up and run the strategy for a tag.
pub fn evaluate(
    strategy: VotingStrategy,
    metrics: &VoteMetrics,
    thresholds: &Thresholds,
) -> (ReviewOutcome, String) {
    let f = STRATEGIES
        .iter()
        .find(|(tag, _)| *tag == strategy)
        .map(|(_, f)| *f)
        .unwrap_or(weighted_threshold);
    f(metrics, thresholds)
}

/// Criticals are handled up front; here only the changes pressure decides.
fn any_critical(m: &VoteMetrics, t: &Thresholds) -> (ReviewOutcome, String) {
    let changes_threshold = t.changes_threshold.unwrap_or(0.5);
    if m.changes_percentage > changes_threshold {
        (
            ReviewOutcome::QueueChanges,
            format!(
                "changes weight {:.0}% above {:.0}% threshold",
                m.changes_percentage * 100.0,
                changes_threshold * 100.0
            ),
        )
    } else {
        (ReviewOutcome::Approved, "no blocking votes".to_string())
    }
}

fn unanimous(m: &VoteMetrics, _t: &Thresholds) -> (ReviewOutcome, String) {
    if m.vote_count == m.approve_count + m.abstain_count {
        (
            ReviewOutcome::Approved,
            "all votes approve or abstain".to_string(),
        )
    } else if m.critical_weight > 0.0 {
        (
            ReviewOutcome::AddressCritical,
            "unanimity broken by critical vote".to_string(),
        )
    } else {
        (
            ReviewOutcome::QueueChanges,
            "unanimity broken by change request".to_string(),
        )
    }
}

fn majority(m: &VoteMetrics, _t: &Thresholds) -> (ReviewOutcome, String) {
    if m.approval_percentage > 0.5 {
        (
            ReviewOutcome::Approved,
            format!("approval majority at {:.0}%", m.approval_percentage * 100.0),
        )
    } else if m.changes_percentage > 0.5 {
        (
            ReviewOutcome::QueueChanges,
            format!("changes majority at {:.0}%", m.changes_percentage * 100.0),
        )
    } else {
        (ReviewOutcome::Escalate, "no majority".to_string())
    }
}

/// Counts raw approve votes against the quorum threshold.
fn quorum(m: &VoteMetrics, t: &Thresholds) -> (ReviewOutcome, String) {
    if m.approve_count >= t.quorum {
        (
            ReviewOutcome::Approved,
            format!("{} approvals meet quorum {}", m.approve_count, t.quorum),
        )
    } else {
        (
            ReviewOutcome::QueueChanges,
            format!("{} approvals below quorum {}", m.approve_count, t.quorum),
        )
    }
}

fn weighted_threshold(m: &VoteMetrics, t: &Thresholds) -> (ReviewOutcome, String) {
    let approve_threshold = t.approve_threshold.unwrap_or(0.7);
    let changes_threshold = t.changes_threshold.unwrap_or(0.4);
    if m.approval_percentage >= approve_threshold {
        (
            ReviewOutcome::Approved,
            format!(
                "approval {:.0}% meets {:.0}% threshold",
                m.approval_percentage * 100.0,
                approve_threshold * 100.0
            ),
        )
    } else if m.changes_percentage >= changes_threshold {
        (
            ReviewOutcome::QueueChanges,
            format!(
                "changes {:.0}% meets {:.0}% threshold",
                m.changes_percentage * 100.0,
                changes_threshold * 100.0
            ),
        )
    } else {
        (
            ReviewOutcome::Escalate,
            "neither threshold met".to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(approve: f64, changes: f64, critical: f64, abstains: usize) -> VoteMetrics {
        let total = approve + changes + critical;
        let pct = |w: f64| if total > 0.0 { w / total } else { 0.0 };
        VoteMetrics {
            vote_count: (approve + changes + critical) as usize + abstains,
            abstain_count: abstains,
            approve_count: approve as usize,
            approve_weight: approve,
            changes_weight: changes,
            critical_weight: critical,
            total_weight: total,
            approval_percentage: pct(approve),
            changes_percentage: pct(changes),
            critical_percentage: pct(critical),
        }
    }

    #[test]
    fn test_table_covers_every_strategy() {
        for strategy in [
            VotingStrategy::AnyCritical,
            VotingStrategy::Unanimous,
            VotingStrategy::Majority,
            VotingStrategy::Quorum,
            VotingStrategy::WeightedThreshold,
        ] {
            assert!(STRATEGIES.iter().any(|(tag, _)| *tag == strategy));
        }
    }

    #[test]
    fn test_any_critical_changes_pressure() {
        let t = Thresholds::default();
        let (outcome, _) = evaluate(VotingStrategy::AnyCritical, &metrics(1.0, 2.0, 0.0, 0), &t);
        assert_eq!(outcome, ReviewOutcome::QueueChanges);

        let (outcome, _) = evaluate(VotingStrategy::AnyCritical, &metrics(2.0, 1.0, 0.0, 0), &t);
        assert_eq!(outcome, ReviewOutcome::Approved);
    }

    #[test]
    fn test_unanimous() {
        let t = Thresholds::default();
        let (outcome, _) = evaluate(VotingStrategy::Unanimous, &metrics(3.0, 0.0, 0.0, 1), &t);
        assert_eq!(outcome, ReviewOutcome::Approved);

        let (outcome, _) = evaluate(VotingStrategy::Unanimous, &metrics(3.0, 1.0, 0.0, 0), &t);
        assert_eq!(outcome, ReviewOutcome::QueueChanges);

        let (outcome, _) = evaluate(VotingStrategy::Unanimous, &metrics(3.0, 0.0, 1.0, 0), &t);
        assert_eq!(outcome, ReviewOutcome::AddressCritical);
    }

    #[test]
    fn test_majority() {
        let t = Thresholds::default();
        // 2 approve / 1 request_changes → 66.7% approval.
        let (outcome, _) = evaluate(VotingStrategy::Majority, &metrics(2.0, 1.0, 0.0, 0), &t);
        assert_eq!(outcome, ReviewOutcome::Approved);

        let (outcome, _) = evaluate(VotingStrategy::Majority, &metrics(1.0, 2.0, 0.0, 0), &t);
        assert_eq!(outcome, ReviewOutcome::QueueChanges);

        // Even split: no majority either way.
        let (outcome, _) = evaluate(VotingStrategy::Majority, &metrics(1.0, 1.0, 0.0, 0), &t);
        assert_eq!(outcome, ReviewOutcome::Escalate);
    }

    #[test]
    fn test_quorum_counts_raw_approvals() {
        let t = Thresholds {
            quorum: 2,
            ..Thresholds::default()
        };
        let (outcome, _) = evaluate(VotingStrategy::Quorum, &metrics(2.0, 1.0, 0.0, 0), &t);
        assert_eq!(outcome, ReviewOutcome::Approved);

        let (outcome, _) = evaluate(VotingStrategy::Quorum, &metrics(1.0, 2.0, 0.0, 0), &t);
        assert_eq!(outcome, ReviewOutcome::QueueChanges);
    }

    #[test]
    fn test_weighted_threshold_defaults() {
        let t = Thresholds::default();
        // approve 3, changes 2, abstain 1 → approval 60% < 70%, changes 40% >= 40%.
        let m = metrics(3.0, 2.0, 0.0, 1);
        assert!((m.approval_percentage - 0.6).abs() < 1e-9);
        assert!((m.changes_percentage - 0.4).abs() < 1e-9);
        let (outcome, _) = evaluate(VotingStrategy::WeightedThreshold, &m, &t);
        assert_eq!(outcome, ReviewOutcome::QueueChanges);

        let (outcome, _) = evaluate(
            VotingStrategy::WeightedThreshold,
            &metrics(7.0, 1.0, 0.0, 0),
            &t,
        );
        assert_eq!(outcome, ReviewOutcome::Approved);

        let (outcome, _) = evaluate(
            VotingStrategy::WeightedThreshold,
            &metrics(2.0, 1.0, 0.0, 0),
            &t,
        );
        assert_eq!(outcome, ReviewOutcome::Escalate);
    }
}
