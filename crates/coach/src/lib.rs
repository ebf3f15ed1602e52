pub mod budget;
pub mod classifier;
pub mod machine;

pub use budget::{BudgetError, BudgetTable, QuestionBudget, QuestionKind};
pub use classifier::{Classification, KeywordClassifier, QuestionClassifier};
pub use machine::{AnswerCoach, CoachConfig, CoachEvent, CoachSession, CoachState, NudgeLevel};
