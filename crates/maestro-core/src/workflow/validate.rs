//! Workflow definition validation.
//!
//! A definition is either fully valid or rejected with the complete list
//! of problems — validation never partially applies. The dependency graph
//! must be acyclic; cyclic definitions are rejected here rather than left
//! to hit the iteration cap at run time.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::CoreError;
use crate::workflow::schema::WorkflowDefinition;

/// Validate a workflow definition, collecting every problem found.
pub fn validate_definition(def: &WorkflowDefinition) -> Result<(), CoreError> {
    let mut errors: Vec<String> = Vec::new();

    if def.name.trim().is_empty() {
        errors.push("workflow name is required".to_string());
    }
    if def.trigger.trigger_type.trim().is_empty() {
        errors.push("trigger type is required".to_string());
    }
    if def.steps.is_empty() {
        errors.push("workflow must contain at least one step".to_string());
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for step in &def.steps {
        if !seen.insert(step.id.as_str()) {
            errors.push(format!("duplicate step id '{}'", step.id));
        }
        if step.is_review() {
            match &step.review {
                Some(config) if config.reviewers.is_empty() => {
                    errors.push(format!("review step '{}' has no reviewers", step.id));
                }
                None => {
                    errors.push(format!(
                        "review step '{}' is missing its review configuration",
                        step.id
                    ));
                }
                _ => {}
            }
        }
    }

    let known: HashSet<&str> = def.steps.iter().map(|s| s.id.as_str()).collect();
    for step in &def.steps {
        for dep in &step.depends {
            if !known.contains(dep.as_str()) {
                errors.push(format!(
                    "step '{}' depends on unknown step '{}'",
                    step.id, dep
                ));
            }
        }
    }

    // Only meaningful once every dependency resolves.
    if errors.is_empty() {
        if let Some(cycle_members) = find_cycle(def) {
            errors.push(format!(
                "dependency cycle involving steps: {}",
                cycle_members.join(", ")
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(CoreError::Validation(errors))
    }
}

/// Kahn's algorithm over the `depends` graph. Returns the steps left
/// unordered (the cycle members, sorted for stable messages), or None
/// when the graph is acyclic.
fn find_cycle(def: &WorkflowDefinition) -> Option<Vec<String>> {
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for step in &def.steps {
        in_degree.entry(step.id.as_str()).or_insert(0);
        for dep in &step.depends {
            *in_degree.entry(step.id.as_str()).or_insert(0) += 1;
            dependents
                .entry(dep.as_str())
                .or_default()
                .push(step.id.as_str());
        }
    }

    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, d)| **d == 0)
        .map(|(id, _)| *id)
        .collect();

    let mut ordered = 0usize;
    while let Some(id) = queue.pop_front() {
        ordered += 1;
        if let Some(next) = dependents.get(id) {
            for dependent in next {
                let degree = in_degree.get_mut(dependent).unwrap();
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(dependent);
                }
            }
        }
    }

    if ordered == def.steps.len() {
        None
    } else {
        let mut members: Vec<String> = in_degree
            .into_iter()
            .filter(|(_, d)| *d > 0)
            .map(|(id, _)| id.to_string())
            .collect();
        members.sort();
        Some(members)
    }
}
