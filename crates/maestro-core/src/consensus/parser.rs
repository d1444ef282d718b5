//! Reviewer response parsing.
//!
//! Reviewers answer in loosely structured text:
//!
//! ```text
//! VOTE: request_changes
//! FEEDBACK: The migration is missing a rollback path.
//! ISSUES: [{"severity": "major", "description": "no rollback"}]
//! ```
//!
//! Markers are case-insensitive. A missing `FEEDBACK:` marker means the
//! whole raw text is the feedback; a malformed `ISSUES:` array is ignored
//! rather than fatal.

use regex::Regex;

use crate::models::review::{ReviewIssue, VoteKind};

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedReview {
    pub vote: Option<VoteKind>,
    pub feedback: String,
    pub issues: Option<Vec<ReviewIssue>>,
}

pub fn parse_reviewer_response(raw: &str) -> ParsedReview {
    let vote_re = Regex::new(r"(?im)^\s*vote:\s*(approve|request_changes|critical|abstain)\b")
        .unwrap();
    let vote = vote_re
        .captures(raw)
        .and_then(|caps| VoteKind::from_str(&caps[1].to_lowercase()));

    let feedback_re = Regex::new(r"(?is)feedback:\s*(.*?)(?:\bissues:|\z)").unwrap();
    let feedback = match feedback_re.captures(raw) {
        Some(caps) => caps[1].trim().to_string(),
        None => raw.trim().to_string(),
    };

    let issues_re = Regex::new(r"(?is)issues:\s*(\[.*\])").unwrap();
    let issues = issues_re
        .captures(raw)
        .and_then(|caps| serde_json::from_str::<Vec<ReviewIssue>>(&caps[1]).ok());

    ParsedReview {
        vote,
        feedback,
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_response() {
        let raw = r#"VOTE: request_changes
FEEDBACK: Migration lacks a rollback path.
Please add one.
ISSUES: [{"severity": "major", "description": "no rollback"}]"#;
        let parsed = parse_reviewer_response(raw);
        assert_eq!(parsed.vote, Some(VoteKind::RequestChanges));
        assert_eq!(
            parsed.feedback,
            "Migration lacks a rollback path.\nPlease add one."
        );
        let issues = parsed.issues.unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, "major");
    }

    #[test]
    fn test_case_insensitive_markers() {
        let raw = "vote: APPROVE\nfeedback: ship it";
        let parsed = parse_reviewer_response(raw);
        assert_eq!(parsed.vote, Some(VoteKind::Approve));
        assert_eq!(parsed.feedback, "ship it");
        assert!(parsed.issues.is_none());
    }

    #[test]
    fn test_missing_feedback_marker_uses_whole_text() {
        let raw = "VOTE: abstain\nI have no strong opinion here.";
        let parsed = parse_reviewer_response(raw);
        assert_eq!(parsed.vote, Some(VoteKind::Abstain));
        assert_eq!(
            parsed.feedback,
            "VOTE: abstain\nI have no strong opinion here."
        );
    }

    #[test]
    fn test_malformed_issues_ignored() {
        let raw = "VOTE: critical\nFEEDBACK: broken\nISSUES: [not json";
        let parsed = parse_reviewer_response(raw);
        assert_eq!(parsed.vote, Some(VoteKind::Critical));
        assert_eq!(parsed.feedback, "broken");
        assert!(parsed.issues.is_none());
    }

    #[test]
    fn test_unknown_vote_kind_is_none() {
        let raw = "VOTE: maybe\nFEEDBACK: unsure";
        let parsed = parse_reviewer_response(raw);
        assert_eq!(parsed.vote, None);
        assert_eq!(parsed.feedback, "unsure");
    }
}
