use serde::Serialize;

use super::rates::{present_value, real_rate};
use super::types::{PlanInput, WithdrawalStrategy};

// Below this magnitude the real rate is treated as zero and the corpus is
// the undiscounted sum of spending.
const REAL_RATE_EPSILON: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorpusBlock {
    pub start_year: u32,
    pub length_years: u32,
    pub amount: f64,
    pub present_value: f64,
}

pub fn required_corpus(input: &PlanInput) -> f64 {
    let years_in_retirement = input.years_in_retirement();
    if years_in_retirement <= 0 {
        return 0.0;
    }

    match input.strategy {
        WithdrawalStrategy::Normal => {
            let years = years_in_retirement as f64;
            let spending = initial_retirement_spending(input);
            let real = real_rate(input.expected_return(), input.inflation());
            if real.abs() < REAL_RATE_EPSILON {
                return spending * years;
            }
            spending * (1.0 - (1.0 + real).powf(-years)) / (real / (1.0 + real))
        }
        WithdrawalStrategy::Bucket { .. } => bucket_blocks(input)
            .iter()
            .map(|block| block.present_value)
            .sum(),
    }
}

pub fn initial_retirement_spending(input: &PlanInput) -> f64 {
    let years = input.years_to_retirement() as f64;
    input.monthly_spending_today * 12.0 * (1.0 + input.inflation()).powf(years)
}

pub fn bucket_blocks(input: &PlanInput) -> Vec<CorpusBlock> {
    let Some(bucket_years) = input.strategy.bucket_years() else {
        return Vec::new();
    };
    let years_in_retirement = input.years_in_retirement();
    if years_in_retirement <= 0 {
        return Vec::new();
    }
    let years_in_retirement = years_in_retirement as u32;

    let spending = initial_retirement_spending(input);
    let real = real_rate(input.expected_return(), input.inflation());

    (0..years_in_retirement)
        .step_by(bucket_years as usize)
        .map(|start_year| {
            let length_years = bucket_years.min(years_in_retirement - start_year);
            let amount = spending * f64::from(length_years);
            CorpusBlock {
                start_year,
                length_years,
                amount,
                present_value: present_value(amount, real, f64::from(start_year)),
            }
        })
        .collect()
}
