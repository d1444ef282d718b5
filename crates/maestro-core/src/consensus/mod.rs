//! Review panel consensus — collects weighted reviewer votes and folds
//! them into a single outcome.
//!
//! Aggregation is a pure, order-independent fold over the vote set:
//! quorum is checked first, then critical-blocking, then the configured
//! strategy (see [`strategies`]). Votes are never deduplicated by
//! reviewer; every appended vote counts.

pub mod parser;
pub mod strategies;

use chrono::Utc;

use crate::error::CoreError;
use crate::events::{EngineEvent, EngineEventType, EventBus};
use crate::models::review::{
    PanelStatus, ReviewConfig, ReviewIssue, ReviewOutcome, ReviewPanelExecution, ReviewSummary,
    ReviewerVote, VoteKind,
};
use crate::store::ReviewStore;

pub use parser::{parse_reviewer_response, ParsedReview};
pub use strategies::{evaluate, VoteMetrics};

/// Per-kind vote counts for the stats surface.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelStats {
    pub status: PanelStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ReviewOutcome>,
    pub vote_count: usize,
    pub approve_count: usize,
    pub changes_count: usize,
    pub critical_count: usize,
    pub abstain_count: usize,
    pub total_weight: f64,
}

#[derive(Clone)]
pub struct ReviewCoordinator {
    store: ReviewStore,
    event_bus: EventBus,
}

impl ReviewCoordinator {
    pub fn new(store: ReviewStore, event_bus: EventBus) -> Self {
        Self { store, event_bus }
    }

    pub async fn create_panel(
        &self,
        node_execution_id: &str,
        execution_id: &str,
        config: ReviewConfig,
    ) -> Result<ReviewPanelExecution, CoreError> {
        let panel = ReviewPanelExecution::new(
            node_execution_id.to_string(),
            execution_id.to_string(),
            config,
        );
        self.store.save_panel(&panel).await?;
        tracing::info!(
            "Review panel {} created for node {} ({} reviewers, {})",
            panel.id,
            node_execution_id,
            panel.config.reviewers.len(),
            panel.config.voting.strategy.as_str()
        );
        Ok(panel)
    }

    pub async fn get_panel(&self, panel_id: &str) -> Result<ReviewPanelExecution, CoreError> {
        self.store
            .get_panel(panel_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Review panel {} not found", panel_id)))
    }

    pub async fn panel_for_node(
        &self,
        node_execution_id: &str,
    ) -> Result<Option<ReviewPanelExecution>, CoreError> {
        self.store.panel_for_node(node_execution_id).await
    }

    pub async fn start_collecting(&self, panel_id: &str) -> Result<(), CoreError> {
        let mut panel = self.get_panel(panel_id).await?;
        if panel.status == PanelStatus::Completed {
            return Err(CoreError::InvalidState(format!(
                "Review panel {} already completed",
                panel_id
            )));
        }
        panel.status = PanelStatus::Collecting;
        panel.updated_at = Utc::now();
        self.store.save_panel(&panel).await
    }

    /// Append a vote. Votes land in arrival order and are never
    /// deduplicated; a reviewer voting twice is counted twice.
    pub async fn add_vote(
        &self,
        panel_id: &str,
        reviewer_id: &str,
        vote: VoteKind,
        feedback: String,
        issues: Vec<ReviewIssue>,
        weight: f64,
    ) -> Result<ReviewerVote, CoreError> {
        let panel = self.get_panel(panel_id).await?;
        if panel.status == PanelStatus::Completed {
            return Err(CoreError::InvalidState(format!(
                "Review panel {} already completed",
                panel_id
            )));
        }
        let vote = ReviewerVote::new(
            panel_id.to_string(),
            reviewer_id.to_string(),
            vote,
            feedback,
            issues,
            weight,
        );
        self.store.save_vote(&vote).await?;
        Ok(vote)
    }

    pub async fn list_votes(&self, panel_id: &str) -> Result<Vec<ReviewerVote>, CoreError> {
        self.store.list_votes(panel_id).await
    }

    /// Whether every configured reviewer's vote has arrived.
    pub async fn has_all_votes(&self, panel_id: &str) -> Result<bool, CoreError> {
        let panel = self.get_panel(panel_id).await?;
        let count = self.store.count_votes(panel_id).await?;
        Ok(count >= panel.config.reviewers.len())
    }

    /// Fold the collected votes into an outcome and complete the panel.
    pub async fn aggregate(
        &self,
        panel_id: &str,
    ) -> Result<(ReviewOutcome, ReviewSummary), CoreError> {
        let mut panel = self.get_panel(panel_id).await?;
        if panel.status == PanelStatus::Completed {
            return Err(CoreError::InvalidState(format!(
                "Review panel {} already completed",
                panel_id
            )));
        }
        let votes = self.store.list_votes(panel_id).await?;
        let thresholds = &panel.config.voting.thresholds;

        let (metrics, critical_issues, other_issues) = fold_votes(&votes);
        let quorum_met = metrics.vote_count - metrics.abstain_count >= thresholds.quorum;

        let (outcome, reason) = if !quorum_met {
            (
                ReviewOutcome::Escalate,
                format!(
                    "quorum not met: {} non-abstaining votes, {} required",
                    metrics.vote_count - metrics.abstain_count,
                    thresholds.quorum
                ),
            )
        } else if thresholds.critical_blocks && metrics.critical_weight > 0.0 {
            (
                ReviewOutcome::AddressCritical,
                format!("critical weight {} blocks approval", metrics.critical_weight),
            )
        } else {
            evaluate(panel.config.voting.strategy, &metrics, thresholds)
        };

        let summary = ReviewSummary {
            total_weight: metrics.total_weight,
            critical_weight: metrics.critical_weight,
            changes_weight: metrics.changes_weight,
            approve_weight: metrics.approve_weight,
            abstain_count: metrics.abstain_count,
            approval_percentage: metrics.approval_percentage,
            changes_percentage: metrics.changes_percentage,
            quorum_met,
            outcome_reason: reason,
            critical_issues,
            other_issues,
        };

        panel.status = PanelStatus::Completed;
        panel.outcome = Some(outcome);
        panel.summary = Some(summary.clone());
        panel.updated_at = Utc::now();
        self.store.save_panel(&panel).await?;

        tracing::info!(
            "Review panel {} completed: {} ({})",
            panel_id,
            outcome.as_str(),
            summary.outcome_reason
        );
        self.event_bus
            .emit(EngineEvent::new(
                EngineEventType::PanelCompleted,
                Some(panel.execution_id.clone()),
                serde_json::json!({
                    "panelId": panel.id,
                    "outcome": outcome.as_str(),
                }),
            ))
            .await;

        Ok((outcome, summary))
    }

    pub async fn stats(&self, panel_id: &str) -> Result<PanelStats, CoreError> {
        let panel = self.get_panel(panel_id).await?;
        let votes = self.store.list_votes(panel_id).await?;
        let count_kind =
            |kind: VoteKind| votes.iter().filter(|v| v.vote == kind).count();
        Ok(PanelStats {
            status: panel.status,
            outcome: panel.outcome,
            vote_count: votes.len(),
            approve_count: count_kind(VoteKind::Approve),
            changes_count: count_kind(VoteKind::RequestChanges),
            critical_count: count_kind(VoteKind::Critical),
            abstain_count: count_kind(VoteKind::Abstain),
            total_weight: votes
                .iter()
                .filter(|v| v.vote != VoteKind::Abstain)
                .map(|v| v.weight)
                .sum(),
        })
    }
}

/// Partition votes by kind and compute the weighted metrics. Abstentions
/// count toward `vote_count`/`abstain_count` but carry no weight. Issues
/// are gathered from `critical` and `request_changes` votes only.
fn fold_votes(votes: &[ReviewerVote]) -> (VoteMetrics, Vec<ReviewIssue>, Vec<ReviewIssue>) {
    let mut metrics = VoteMetrics {
        vote_count: votes.len(),
        ..VoteMetrics::default()
    };
    let mut critical_issues = Vec::new();
    let mut other_issues = Vec::new();

    for vote in votes {
        match vote.vote {
            VoteKind::Approve => {
                metrics.approve_count += 1;
                metrics.approve_weight += vote.weight;
            }
            VoteKind::RequestChanges => metrics.changes_weight += vote.weight,
            VoteKind::Critical => metrics.critical_weight += vote.weight,
            VoteKind::Abstain => metrics.abstain_count += 1,
        }
        if matches!(vote.vote, VoteKind::Critical | VoteKind::RequestChanges) {
            for issue in &vote.issues {
                if issue.is_critical() {
                    critical_issues.push(issue.clone());
                } else {
                    other_issues.push(issue.clone());
                }
            }
        }
    }

    metrics.total_weight =
        metrics.approve_weight + metrics.changes_weight + metrics.critical_weight;
    if metrics.total_weight > 0.0 {
        metrics.approval_percentage = metrics.approve_weight / metrics.total_weight;
        metrics.changes_percentage = metrics.changes_weight / metrics.total_weight;
        metrics.critical_percentage = metrics.critical_weight / metrics.total_weight;
    }

    (metrics, critical_issues, other_issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::review::{Thresholds, VotingConfig, VotingStrategy};

    fn coordinator() -> ReviewCoordinator {
        ReviewCoordinator::new(
            ReviewStore::new(Database::open_in_memory().unwrap()),
            EventBus::new(),
        )
    }

    fn config(reviewers: &[&str], strategy: VotingStrategy, thresholds: Thresholds) -> ReviewConfig {
        ReviewConfig {
            reviewers: reviewers.iter().map(|r| r.to_string()).collect(),
            voting: VotingConfig {
                strategy,
                thresholds,
            },
        }
    }

    async fn vote(
        c: &ReviewCoordinator,
        panel_id: &str,
        reviewer: &str,
        kind: VoteKind,
        weight: f64,
        issues: Vec<ReviewIssue>,
    ) {
        c.add_vote(panel_id, reviewer, kind, String::new(), issues, weight)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_quorum_shortfall_escalates_for_every_strategy() {
        for strategy in [
            VotingStrategy::AnyCritical,
            VotingStrategy::Unanimous,
            VotingStrategy::Majority,
            VotingStrategy::Quorum,
            VotingStrategy::WeightedThreshold,
        ] {
            let c = coordinator();
            let thresholds = Thresholds {
                quorum: 2,
                ..Thresholds::default()
            };
            let panel = c
                .create_panel("n1", "ex-1", config(&["a", "b"], strategy, thresholds))
                .await
                .unwrap();
            vote(&c, &panel.id, "a", VoteKind::Approve, 1.0, vec![]).await;
            vote(&c, &panel.id, "b", VoteKind::Abstain, 1.0, vec![]).await;

            let (outcome, summary) = c.aggregate(&panel.id).await.unwrap();
            assert_eq!(outcome, ReviewOutcome::Escalate, "{:?}", strategy);
            assert!(!summary.quorum_met);
        }
    }

    #[tokio::test]
    async fn test_critical_blocks_approval() {
        let c = coordinator();
        let panel = c
            .create_panel(
                "n1",
                "ex-1",
                config(
                    &["a", "b", "c"],
                    VotingStrategy::WeightedThreshold,
                    Thresholds::default(),
                ),
            )
            .await
            .unwrap();
        vote(&c, &panel.id, "a", VoteKind::Approve, 1.0, vec![]).await;
        vote(&c, &panel.id, "b", VoteKind::Approve, 1.0, vec![]).await;
        vote(
            &c,
            &panel.id,
            "c",
            VoteKind::Critical,
            1.0,
            vec![ReviewIssue {
                severity: "critical".to_string(),
                description: "data loss on rollback".to_string(),
            }],
        )
        .await;

        let (outcome, summary) = c.aggregate(&panel.id).await.unwrap();
        assert_eq!(outcome, ReviewOutcome::AddressCritical);
        assert!(summary.quorum_met);
        assert_eq!(summary.critical_weight, 1.0);
        assert_eq!(summary.critical_issues.len(), 1);
    }

    #[tokio::test]
    async fn test_majority_approves_two_thirds() {
        let c = coordinator();
        let panel = c
            .create_panel(
                "n1",
                "ex-1",
                config(
                    &["a", "b", "c"],
                    VotingStrategy::Majority,
                    Thresholds::default(),
                ),
            )
            .await
            .unwrap();
        vote(&c, &panel.id, "a", VoteKind::Approve, 1.0, vec![]).await;
        vote(&c, &panel.id, "b", VoteKind::Approve, 1.0, vec![]).await;
        vote(&c, &panel.id, "c", VoteKind::RequestChanges, 1.0, vec![]).await;

        let (outcome, summary) = c.aggregate(&panel.id).await.unwrap();
        assert_eq!(outcome, ReviewOutcome::Approved);
        assert!(summary.approval_percentage > 0.66 && summary.approval_percentage < 0.67);
    }

    #[tokio::test]
    async fn test_weighted_threshold_queue_changes() {
        let c = coordinator();
        let panel = c
            .create_panel(
                "n1",
                "ex-1",
                config(
                    &["a", "b", "c"],
                    VotingStrategy::WeightedThreshold,
                    Thresholds::default(),
                ),
            )
            .await
            .unwrap();
        vote(&c, &panel.id, "a", VoteKind::Approve, 3.0, vec![]).await;
        vote(&c, &panel.id, "b", VoteKind::RequestChanges, 2.0, vec![]).await;
        vote(&c, &panel.id, "c", VoteKind::Abstain, 1.0, vec![]).await;

        let (outcome, summary) = c.aggregate(&panel.id).await.unwrap();
        assert_eq!(outcome, ReviewOutcome::QueueChanges);
        assert_eq!(summary.total_weight, 5.0);
        assert!((summary.approval_percentage - 0.6).abs() < 1e-9);
        assert!((summary.changes_percentage - 0.4).abs() < 1e-9);
        assert_eq!(summary.abstain_count, 1);
    }

    #[tokio::test]
    async fn test_duplicate_reviewer_votes_all_count() {
        let c = coordinator();
        let panel = c
            .create_panel(
                "n1",
                "ex-1",
                config(&["a"], VotingStrategy::Majority, Thresholds::default()),
            )
            .await
            .unwrap();
        vote(&c, &panel.id, "a", VoteKind::Approve, 1.0, vec![]).await;
        vote(&c, &panel.id, "a", VoteKind::Approve, 1.0, vec![]).await;
        vote(&c, &panel.id, "a", VoteKind::RequestChanges, 1.0, vec![]).await;

        assert!(c.has_all_votes(&panel.id).await.unwrap());
        let (outcome, summary) = c.aggregate(&panel.id).await.unwrap();
        assert_eq!(outcome, ReviewOutcome::Approved);
        assert_eq!(summary.total_weight, 3.0);
    }

    #[tokio::test]
    async fn test_vote_after_completion_rejected() {
        let c = coordinator();
        let panel = c
            .create_panel(
                "n1",
                "ex-1",
                config(&["a"], VotingStrategy::Majority, Thresholds::default()),
            )
            .await
            .unwrap();
        vote(&c, &panel.id, "a", VoteKind::Approve, 1.0, vec![]).await;
        c.aggregate(&panel.id).await.unwrap();

        let err = c
            .add_vote(&panel.id, "a", VoteKind::Approve, String::new(), vec![], 1.0)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));

        let err = c.aggregate(&panel.id).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_panel_lifecycle_and_stats() {
        let c = coordinator();
        let panel = c
            .create_panel(
                "n1",
                "ex-1",
                config(&["a", "b"], VotingStrategy::Quorum, Thresholds::default()),
            )
            .await
            .unwrap();
        assert_eq!(panel.status, PanelStatus::Pending);

        c.start_collecting(&panel.id).await.unwrap();
        assert_eq!(
            c.get_panel(&panel.id).await.unwrap().status,
            PanelStatus::Collecting
        );
        assert!(!c.has_all_votes(&panel.id).await.unwrap());

        vote(&c, &panel.id, "a", VoteKind::Approve, 1.0, vec![]).await;
        vote(&c, &panel.id, "b", VoteKind::Abstain, 1.0, vec![]).await;
        assert!(c.has_all_votes(&panel.id).await.unwrap());

        let (outcome, _) = c.aggregate(&panel.id).await.unwrap();
        assert_eq!(outcome, ReviewOutcome::Approved);

        let stats = c.stats(&panel.id).await.unwrap();
        assert_eq!(stats.status, PanelStatus::Completed);
        assert_eq!(stats.outcome, Some(ReviewOutcome::Approved));
        assert_eq!(stats.vote_count, 2);
        assert_eq!(stats.approve_count, 1);
        assert_eq!(stats.abstain_count, 1);
        assert_eq!(stats.total_weight, 1.0);
    }

    #[tokio::test]
    async fn test_zero_votes_escalates() {
        let c = coordinator();
        let panel = c
            .create_panel(
                "n1",
                "ex-1",
                config(&["a"], VotingStrategy::Majority, Thresholds::default()),
            )
            .await
            .unwrap();
        let (outcome, summary) = c.aggregate(&panel.id).await.unwrap();
        assert_eq!(outcome, ReviewOutcome::Escalate);
        assert_eq!(summary.total_weight, 0.0);
        assert_eq!(summary.approval_percentage, 0.0);
    }
}
