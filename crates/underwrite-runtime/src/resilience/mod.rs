//! Token accounting and limits for a single run.

mod budget;

pub use budget::{BudgetTracker, LlmUsage, TokenBudget};
