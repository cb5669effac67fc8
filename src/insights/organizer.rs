//! Groups stacks under a primary category label, most relevant first

use super::relevance::relevance_score;
use crate::types::{Category, StackWithRelations};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Priority order for choosing a stack's primary label
pub const PRIORITY_CATEGORIES: [&str; 8] = [
    "Sleep",
    "Focus",
    "Energy",
    "Recovery",
    "Longevity",
    "Mood",
    "Stress",
    "Gut Health",
];

/// Label for stacks without any category
pub const FALLBACK_LABEL: &str = "Other";

/// Stack annotated with its score and label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedStack {
    #[serde(flatten)]
    pub stack: StackWithRelations,
    pub relevance_score: u32,
    pub category: String,
}

/// Stacks sharing a primary label, highest score first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryGroup {
    pub label: String,
    pub stacks: Vec<RankedStack>,
}

/// Primary label: first priority name contained (case-insensitively) in any
/// category name, else the first category name, else "Other"
pub fn category_label(categories: &[Category]) -> String {
    let lowered: Vec<String> = categories.iter().map(|c| c.name.to_lowercase()).collect();

    PRIORITY_CATEGORIES
        .iter()
        .find(|priority| {
            let needle = priority.to_lowercase();
            lowered.iter().any(|name| name.contains(&needle))
        })
        .map(|p| p.to_string())
        .or_else(|| categories.first().map(|c| c.name.clone()))
        .unwrap_or_else(|| FALLBACK_LABEL.to_string())
}

/// Score, sort (descending, stable) and group stacks by label
///
/// Groups appear in the order their first member appears in the sorted list.
pub fn organize_stacks(stacks: Vec<StackWithRelations>, now: DateTime<Utc>) -> Vec<CategoryGroup> {
    let mut ranked: Vec<RankedStack> = stacks
        .into_iter()
        .map(|stack| RankedStack {
            relevance_score: relevance_score(&stack, now),
            category: category_label(&stack.categories),
            stack,
        })
        .collect();

    ranked.sort_by(|a, b| b.relevance_score.cmp(&a.relevance_score));

    let mut groups: Vec<CategoryGroup> = Vec::new();
    for stack in ranked {
        match groups.iter_mut().find(|g| g.label == stack.category) {
            Some(group) => group.stacks.push(stack),
            None => groups.push(CategoryGroup {
                label: stack.category.clone(),
                stacks: vec![stack],
            }),
        }
    }

    groups
}
