//! Widening plan for over-constrained queries
//!
//! The plan is an ordered list of filter stages, built up front:
//! `full -> partial_1 -> ... -> unfiltered`. Each later stage drops the
//! predicates named by the next step in the configured order. Steps that
//! would drop nothing are skipped, so every stage differs from the one
//! before it and the plan length is bounded by the number of steps + 2.

use serde::{Deserialize, Serialize};

use crate::types::{FilterField, Predicate};

/// One relaxation step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WideningStep {
    Category,
    /// Both price bounds at once
    Price,
    Color,
    Brand,
    Gender,
}

impl WideningStep {
    pub fn fields(&self) -> &'static [FilterField] {
        match self {
            WideningStep::Category => &[FilterField::Category],
            WideningStep::Price => &[FilterField::PriceMin, FilterField::PriceMax],
            WideningStep::Color => &[FilterField::Color],
            WideningStep::Brand => &[FilterField::Brand],
            WideningStep::Gender => &[FilterField::Gender],
        }
    }

    /// Least selective first
    pub fn default_order() -> Vec<WideningStep> {
        vec![
            WideningStep::Category,
            WideningStep::Price,
            WideningStep::Color,
            WideningStep::Brand,
            WideningStep::Gender,
        ]
    }
}

/// Predicates in force at one stage, and everything dropped to get there
#[derive(Debug, Clone, PartialEq)]
pub struct FilterStage {
    pub predicates: Vec<Predicate>,
    pub dropped: Vec<FilterField>,
}

impl FilterStage {
    pub fn is_unfiltered(&self) -> bool {
        self.predicates.is_empty()
    }
}

/// Build the stage list for `predicates`. The first stage is the full
/// filter, the last is always unfiltered.
pub fn plan(predicates: &[Predicate], order: &[WideningStep]) -> Vec<FilterStage> {
    let mut stages = vec![FilterStage {
        predicates: predicates.to_vec(),
        dropped: Vec::new(),
    }];

    let mut remaining = predicates.to_vec();
    let mut dropped = Vec::new();

    for step in order {
        if remaining.is_empty() {
            break;
        }
        let fields = step.fields();
        let before = remaining.len();
        remaining.retain(|p| {
            let drop = fields.contains(&p.field);
            if drop {
                dropped.push(p.field);
            }
            !drop
        });
        if remaining.len() < before {
            stages.push(FilterStage {
                predicates: remaining.clone(),
                dropped: dropped.clone(),
            });
        }
    }

    // Fields the order does not mention are dropped together at the end
    if !remaining.is_empty() {
        dropped.extend(remaining.iter().map(|p| p.field));
        stages.push(FilterStage {
            predicates: Vec::new(),
            dropped,
        });
    }

    stages
}
