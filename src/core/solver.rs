use super::rates::{annuity_future_value_factor, monthly_rate_from_annual};
use super::types::{AdditionalSavingsNeeded, PlanInput};

// Return and step-up rates closer than this are treated as equal.
const RATE_GAP_EPSILON: f64 = 1e-4;
// Below this monthly rate the fixed top-up uses the zero-interest limit.
const MONTHLY_RATE_EPSILON: f64 = 1e-12;

pub fn shortfall(required_corpus: f64, balance_at_retirement: f64) -> f64 {
    (required_corpus - balance_at_retirement).max(0.0)
}

pub fn top_up(shortfall: f64, input: &PlanInput) -> AdditionalSavingsNeeded {
    top_up_with_step_up(shortfall, input, input.step_up_rate() * 100.0)
}

pub fn top_up_with_step_up(
    shortfall: f64,
    input: &PlanInput,
    step_up_pct: f64,
) -> AdditionalSavingsNeeded {
    if shortfall <= 0.0 {
        return AdditionalSavingsNeeded::default();
    }
    let years_to_retirement = input.years_to_retirement();
    if years_to_retirement <= 0 {
        return AdditionalSavingsNeeded::default();
    }

    let years = years_to_retirement as f64;
    let annual_return = input.expected_return();
    let monthly_rate = monthly_rate_from_annual(annual_return);

    AdditionalSavingsNeeded {
        fixed_monthly: fixed_top_up(shortfall, monthly_rate, years * 12.0),
        step_up_monthly: step_up_top_up(
            shortfall,
            annual_return,
            monthly_rate,
            step_up_pct / 100.0,
            years,
        ),
    }
}

fn fixed_top_up(shortfall: f64, monthly_rate: f64, months: f64) -> f64 {
    if monthly_rate.abs() < MONTHLY_RATE_EPSILON {
        return shortfall / months;
    }
    shortfall * monthly_rate / ((1.0 + monthly_rate).powf(months) - 1.0)
}

fn step_up_top_up(
    shortfall: f64,
    annual_return: f64,
    monthly_rate: f64,
    step_up_rate: f64,
    years: f64,
) -> f64 {
    let year_factor = annuity_future_value_factor(monthly_rate, 12.0);
    if (annual_return - step_up_rate).abs() < RATE_GAP_EPSILON {
        return shortfall / (year_factor * years);
    }
    shortfall * (annual_return - step_up_rate)
        / (year_factor * ((1.0 + annual_return).powf(years) - (1.0 + step_up_rate).powf(years)))
}
