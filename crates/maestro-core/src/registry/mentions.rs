//! Mention parsing — locates `@name` / `@id` / `@keyword` tokens in free
//! text and resolves them to registered agents.
//!
//! Two passes with explicit interval tracking:
//!
//! 1. Multi-word pass: agent names, longest first, matched case-insensitively
//!    as `@<name>` followed by whitespace, punctuation, or end of text.
//!    A candidate overlapping an already-accepted range is dropped.
//! 2. Single-word pass: `@word[-word]*` tokens outside accepted ranges,
//!    resolved against agent id, exact single-word name, or trigger
//!    keyword. Unresolved tokens stay in the text untouched.
//!
//! Accepted mentions are stripped in descending start order and the
//! remainder is whitespace-normalized.

use regex::Regex;

use crate::models::agent::{Agent, AgentMention};

/// Result of parsing a text for mentions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionParse {
    /// Accepted mentions, ordered by start index.
    pub mentions: Vec<AgentMention>,
    /// The input with accepted mentions removed, whitespace-normalized.
    pub clean_text: String,
}

/// Parse `text` against the given agents.
pub fn parse_mentions(text: &str, agents: &[Agent]) -> MentionParse {
    let mut accepted: Vec<AgentMention> = Vec::new();

    // Deterministic candidate order: longest name first, then by name.
    let mut by_name_len: Vec<&Agent> = agents.iter().collect();
    by_name_len.sort_by(|a, b| {
        b.name
            .chars()
            .count()
            .cmp(&a.name.chars().count())
            .then_with(|| a.name.cmp(&b.name))
    });

    // Pass 1: full agent names.
    for agent in &by_name_len {
        if agent.name.trim().is_empty() {
            continue;
        }
        let pattern = format!("(?i)@{}", regex::escape(&agent.name));
        let re = match Regex::new(&pattern) {
            Ok(re) => re,
            Err(_) => continue,
        };
        for m in re.find_iter(text) {
            if !boundary_ok(text, m.end()) {
                continue;
            }
            if overlaps(&accepted, m.start(), m.end()) {
                continue;
            }
            accepted.push(AgentMention {
                agent_id: agent.id.clone(),
                start_index: m.start(),
                end_index: m.end(),
                matched_text: text[m.start()..m.end()].to_string(),
            });
        }
    }

    // Pass 2: single-word tokens (@word or @word-word).
    let token_re = Regex::new(r"@([A-Za-z0-9_]+(?:-[A-Za-z0-9_]+)*)").unwrap();
    for m in token_re.find_iter(text) {
        if overlaps(&accepted, m.start(), m.end()) {
            continue;
        }
        let token = &text[m.start() + 1..m.end()];
        if let Some(agent) = resolve_token(token, &by_name_len) {
            accepted.push(AgentMention {
                agent_id: agent.id.clone(),
                start_index: m.start(),
                end_index: m.end(),
                matched_text: text[m.start()..m.end()].to_string(),
            });
        }
    }

    // Strip accepted ranges from the end so earlier indices stay valid.
    let mut clean = text.to_string();
    let mut by_start_desc = accepted.clone();
    by_start_desc.sort_by(|a, b| b.start_index.cmp(&a.start_index));
    for mention in &by_start_desc {
        clean.replace_range(mention.start_index..mention.end_index, "");
    }
    let clean_text = clean.split_whitespace().collect::<Vec<_>>().join(" ");

    accepted.sort_by_key(|m| m.start_index);
    MentionParse {
        mentions: accepted,
        clean_text,
    }
}

/// A name match must end at the text boundary or before whitespace or
/// punctuation, so `@dev` does not claim the front of `@developer`.
fn boundary_ok(text: &str, end: usize) -> bool {
    match text[end..].chars().next() {
        None => true,
        Some(c) => !(c.is_alphanumeric() || c == '_' || c == '-'),
    }
}

fn overlaps(accepted: &[AgentMention], start: usize, end: usize) -> bool {
    accepted
        .iter()
        .any(|m| start < m.end_index && end > m.start_index)
}

/// Resolve a bare token against agent id, exact single-word name, or
/// trigger keyword, case-insensitively.
fn resolve_token<'a>(token: &str, agents: &[&'a Agent]) -> Option<&'a Agent> {
    if let Some(agent) = agents
        .iter()
        .find(|a| a.id.eq_ignore_ascii_case(token))
        .copied()
    {
        return Some(agent);
    }
    if let Some(agent) = agents
        .iter()
        .find(|a| !a.name.contains(' ') && a.name.eq_ignore_ascii_case(token))
        .copied()
    {
        return Some(agent);
    }
    agents
        .iter()
        .find(|a| {
            a.trigger_keywords
                .iter()
                .any(|k| k.eq_ignore_ascii_case(token))
        })
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::agent::{AgentConfig, AgentRole};

    fn agent(id: &str, name: &str, keywords: &[&str]) -> Agent {
        Agent::new(AgentConfig {
            id: Some(id.to_string()),
            name: name.to_string(),
            role: AgentRole::Specialist,
            description: None,
            trigger_keywords: keywords.iter().map(|k| k.to_string()).collect(),
        })
    }

    #[test]
    fn test_multi_word_name_extracted_and_stripped() {
        let agents = vec![agent("cr", "Code Reviewer", &[])];
        let parse = parse_mentions("Please ask @Code Reviewer to check this", &agents);
        assert_eq!(parse.mentions.len(), 1);
        assert_eq!(parse.mentions[0].agent_id, "cr");
        assert_eq!(parse.mentions[0].matched_text, "@Code Reviewer");
        assert_eq!(parse.clean_text, "Please ask to check this");
    }

    #[test]
    fn test_longest_name_wins_overlap() {
        let agents = vec![
            agent("r", "Reviewer", &[]),
            agent("sr", "Senior Reviewer", &[]),
        ];
        let parse = parse_mentions("cc @Senior Reviewer please", &agents);
        assert_eq!(parse.mentions.len(), 1);
        assert_eq!(parse.mentions[0].agent_id, "sr");
        assert_eq!(parse.clean_text, "cc please");
    }

    #[test]
    fn test_name_prefix_does_not_claim_longer_word() {
        let agents = vec![agent("dev", "dev", &[])];
        let parse = parse_mentions("ping @developer and @dev", &agents);
        assert_eq!(parse.mentions.len(), 1);
        assert_eq!(parse.mentions[0].matched_text, "@dev");
        assert_eq!(parse.clean_text, "ping @developer and");
    }

    #[test]
    fn test_single_word_resolves_id_and_keyword() {
        let agents = vec![
            agent("writer-1", "Tech Writer", &["docs"]),
            agent("qa", "QA Bot", &[]),
        ];
        let parse = parse_mentions("@writer-1 then @docs then @qa", &agents);
        assert_eq!(parse.mentions.len(), 3);
        assert_eq!(parse.mentions[0].agent_id, "writer-1");
        assert_eq!(parse.mentions[1].agent_id, "writer-1");
        assert_eq!(parse.mentions[2].agent_id, "qa");
        assert_eq!(parse.clean_text, "then then");
    }

    #[test]
    fn test_unmatched_tokens_left_untouched() {
        let agents = vec![agent("a", "Alpha", &[])];
        let parse = parse_mentions("hello @nobody and @Alpha!", &agents);
        assert_eq!(parse.mentions.len(), 1);
        assert_eq!(parse.mentions[0].agent_id, "a");
        assert_eq!(parse.clean_text, "hello @nobody and !");
    }

    #[test]
    fn test_case_insensitive_matching() {
        let agents = vec![agent("a", "Alpha", &[])];
        let parse = parse_mentions("@ALPHA @alpha @aLpHa", &agents);
        assert_eq!(parse.mentions.len(), 3);
        assert_eq!(parse.clean_text, "");
    }

    #[test]
    fn test_punctuation_terminates_name() {
        let agents = vec![agent("a", "Alpha", &[])];
        let parse = parse_mentions("thanks, @Alpha.", &agents);
        assert_eq!(parse.mentions.len(), 1);
        assert_eq!(parse.clean_text, "thanks, .");
    }

    #[test]
    fn test_no_agents_no_mentions() {
        let parse = parse_mentions("@anyone home?", &[]);
        assert!(parse.mentions.is_empty());
        assert_eq!(parse.clean_text, "@anyone home?");
    }

    #[test]
    fn test_adversarial_many_at_signs() {
        let agents = vec![agent("a", "Alpha", &[])];
        let text = "@ @@ @@@ @x @y @z ".repeat(50) + "@Alpha";
        let parse = parse_mentions(&text, &agents);
        assert_eq!(parse.mentions.len(), 1);
        assert_eq!(parse.mentions[0].agent_id, "a");
    }
}
