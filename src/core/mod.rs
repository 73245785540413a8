pub mod calculators;
mod corpus;
mod engine;
mod metrics;
pub mod rates;
mod solver;
mod types;

pub use corpus::{CorpusBlock, bucket_blocks, initial_retirement_spending, required_corpus};
pub use engine::simulate;
pub use metrics::{balance_at_retirement, evaluate_plan, evaluate_plan_with_step_up, final_balance};
pub use solver::{shortfall, top_up, top_up_with_step_up};
pub use types::{
    AdditionalSavingsNeeded, ContributionType, PlanInput, PlanMetrics, ProjectionPoint,
    WithdrawalStrategy,
};
