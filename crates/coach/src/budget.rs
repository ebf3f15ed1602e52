use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed set of interview question archetypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    SelfIntroduction,
    ProjectDeepDive,
    Behavioral,
    SystemDesign,
    CodingExplanation,
    QuickAnswer,
    /// Fallback when classification fails, times out or is inconclusive.
    Unknown,
}

impl QuestionKind {
    pub const ALL: [QuestionKind; 7] = [
        QuestionKind::SelfIntroduction,
        QuestionKind::ProjectDeepDive,
        QuestionKind::Behavioral,
        QuestionKind::SystemDesign,
        QuestionKind::CodingExplanation,
        QuestionKind::QuickAnswer,
        QuestionKind::Unknown,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            QuestionKind::SelfIntroduction => "Self-introduction",
            QuestionKind::ProjectDeepDive => "Project deep-dive",
            QuestionKind::Behavioral => "Behavioral",
            QuestionKind::SystemDesign => "System design",
            QuestionKind::CodingExplanation => "Coding explanation",
            QuestionKind::QuickAnswer => "Quick answer",
            QuestionKind::Unknown => "General",
        }
    }
}

/// Per-category answer timing: the target length, the threshold where the
/// soft nudge fires, and the threshold where the hard nudge fires.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QuestionBudget {
    pub target_secs: u64,
    pub soft_secs: u64,
    pub hard_secs: u64,
}

#[derive(Debug, Error)]
pub enum BudgetError {
    #[error("budget for {kind:?}: soft threshold {soft}s exceeds hard threshold {hard}s")]
    SoftAboveHard {
        kind: QuestionKind,
        soft: u64,
        hard: u64,
    },
    #[error("budget for {kind:?}: thresholds must be strictly positive")]
    NonPositive { kind: QuestionKind },
    #[error("budget table has no entry for the unknown fallback category")]
    MissingUnknown,
}

/// Static table mapping each question category to its timing budget.
///
/// Validated at construction: `soft <= hard` and strictly positive for every
/// entry, and the `Unknown` fallback must exist since every lookup can
/// degrade to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    try_from = "HashMap<QuestionKind, QuestionBudget>",
    into = "HashMap<QuestionKind, QuestionBudget>"
)]
pub struct BudgetTable {
    entries: HashMap<QuestionKind, QuestionBudget>,
}

impl TryFrom<HashMap<QuestionKind, QuestionBudget>> for BudgetTable {
    type Error = BudgetError;

    fn try_from(entries: HashMap<QuestionKind, QuestionBudget>) -> Result<Self, BudgetError> {
        Self::new(entries)
    }
}

impl From<BudgetTable> for HashMap<QuestionKind, QuestionBudget> {
    fn from(table: BudgetTable) -> Self {
        table.entries
    }
}

impl BudgetTable {
    pub fn new(entries: HashMap<QuestionKind, QuestionBudget>) -> Result<Self, BudgetError> {
        if !entries.contains_key(&QuestionKind::Unknown) {
            return Err(BudgetError::MissingUnknown);
        }
        for (kind, budget) in &entries {
            if budget.target_secs == 0 || budget.soft_secs == 0 || budget.hard_secs == 0 {
                return Err(BudgetError::NonPositive { kind: *kind });
            }
            if budget.soft_secs > budget.hard_secs {
                return Err(BudgetError::SoftAboveHard {
                    kind: *kind,
                    soft: budget.soft_secs,
                    hard: budget.hard_secs,
                });
            }
        }
        Ok(Self { entries })
    }

    /// Budget for a category, degrading to the `Unknown` fallback.
    pub fn budget(&self, kind: QuestionKind) -> QuestionBudget {
        match self.entries.get(&kind) {
            Some(budget) => *budget,
            // every construction path validates that this entry exists
            None => self.entries[&QuestionKind::Unknown],
        }
    }

    pub fn kinds(&self) -> impl Iterator<Item = QuestionKind> + '_ {
        self.entries.keys().copied()
    }
}

impl Default for BudgetTable {
    fn default() -> Self {
        let entries = HashMap::from([
            (
                QuestionKind::SelfIntroduction,
                QuestionBudget {
                    target_secs: 90,
                    soft_secs: 120,
                    hard_secs: 180,
                },
            ),
            (
                QuestionKind::ProjectDeepDive,
                QuestionBudget {
                    target_secs: 180,
                    soft_secs: 240,
                    hard_secs: 330,
                },
            ),
            (
                QuestionKind::Behavioral,
                QuestionBudget {
                    target_secs: 150,
                    soft_secs: 210,
                    hard_secs: 300,
                },
            ),
            (
                QuestionKind::SystemDesign,
                QuestionBudget {
                    target_secs: 300,
                    soft_secs: 420,
                    hard_secs: 600,
                },
            ),
            (
                QuestionKind::CodingExplanation,
                QuestionBudget {
                    target_secs: 180,
                    soft_secs: 240,
                    hard_secs: 360,
                },
            ),
            (
                QuestionKind::QuickAnswer,
                QuestionBudget {
                    target_secs: 45,
                    soft_secs: 75,
                    hard_secs: 120,
                },
            ),
            (
                QuestionKind::Unknown,
                QuestionBudget {
                    target_secs: 120,
                    soft_secs: 180,
                    hard_secs: 270,
                },
            ),
        ]);
        Self::new(entries).expect("default budget table must be valid")
    }
}
