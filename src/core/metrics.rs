use super::corpus::required_corpus;
use super::engine::simulate;
use super::solver::{shortfall, top_up_with_step_up};
use super::types::{PlanInput, PlanMetrics, ProjectionPoint};

pub fn evaluate_plan(input: &PlanInput) -> PlanMetrics {
    evaluate_plan_with_step_up(input, input.step_up_rate() * 100.0)
}

pub fn evaluate_plan_with_step_up(input: &PlanInput, step_up_pct: f64) -> PlanMetrics {
    let projection = simulate(input);
    let required = required_corpus(input);
    let at_retirement = balance_at_retirement(&projection, input.retirement_age);
    let gap = shortfall(required, at_retirement);
    let additional_savings = top_up_with_step_up(gap, input, step_up_pct);

    let final_balance = final_balance(&projection);
    let is_successful = final_balance > 0.0;
    let peak_balance = projection
        .iter()
        .map(ProjectionPoint::display_balance)
        .fold(0.0, f64::max);
    let years_funded = years_funded(&projection, input, is_successful);

    PlanMetrics {
        projection,
        balance_at_retirement: at_retirement,
        required_corpus: required,
        shortfall: gap,
        additional_savings,
        final_balance,
        is_successful,
        peak_balance,
        years_funded,
    }
}

pub fn balance_at_retirement(projection: &[ProjectionPoint], retirement_age: u32) -> f64 {
    projection
        .iter()
        .find(|p| p.age == retirement_age)
        .map(ProjectionPoint::display_balance)
        .unwrap_or(0.0)
}

pub fn final_balance(projection: &[ProjectionPoint]) -> f64 {
    projection
        .last()
        .map(|p| p.total_balance - p.annual_expense)
        .unwrap_or(0.0)
}

// The first retired point with a raw balance at or below zero marks
// exhaustion; money running out part-way through a year counts that year as
// funded. A successful plan is funded for the whole retirement.
fn years_funded(projection: &[ProjectionPoint], input: &PlanInput, is_successful: bool) -> u32 {
    let full_retirement = input.life_expectancy.saturating_sub(input.retirement_age);
    if is_successful {
        return full_retirement;
    }
    projection
        .iter()
        .find(|p| p.is_retired && p.total_balance <= 0.0)
        .map(|p| p.age.saturating_sub(input.retirement_age))
        .unwrap_or(full_retirement)
}
