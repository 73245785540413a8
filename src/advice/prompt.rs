use serde::Serialize;

use crate::core::{ContributionType, PlanInput, PlanMetrics, WithdrawalStrategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Country {
    pub name: &'static str,
    pub code: &'static str,
    pub currency_symbol: &'static str,
    pub currency_code: &'static str,
}

pub const COUNTRIES: [Country; 4] = [
    Country {
        name: "USA",
        code: "US",
        currency_symbol: "$",
        currency_code: "USD",
    },
    Country {
        name: "India",
        code: "IN",
        currency_symbol: "₹",
        currency_code: "INR",
    },
    Country {
        name: "Australia",
        code: "AU",
        currency_symbol: "$",
        currency_code: "AUD",
    },
    Country {
        name: "Canada",
        code: "CA",
        currency_symbol: "$",
        currency_code: "CAD",
    },
];

/// Case-insensitive lookup by ISO code. `None` for unsupported countries.
pub fn country_by_code(code: &str) -> Option<Country> {
    COUNTRIES
        .iter()
        .copied()
        .find(|c| c.code.eq_ignore_ascii_case(code.trim()))
}

/// Prompt asking a provider to review `plan` in the context of `country`.
/// `step_up_pct` is the growth rate the step-up top-up was priced at.
pub fn build_prompt(
    plan: &PlanInput,
    step_up_pct: f64,
    country: &Country,
    metrics: &PlanMetrics,
) -> String {
    let sym = country.currency_symbol;
    let strategy = match plan.strategy {
        WithdrawalStrategy::Normal => "Normal (Direct Withdrawal)".to_string(),
        WithdrawalStrategy::Bucket { .. } => format!(
            "Bucket strategy (Bucket Size: {} years)",
            plan.strategy.bucket_years().unwrap_or(1)
        ),
    };
    let contribution = match plan.contribution_type {
        ContributionType::Fixed => "Fixed amount".to_string(),
        ContributionType::StepUp { annual_growth_pct } => {
            format!("Step-up: Increases by {annual_growth_pct}% annually")
        }
    };
    let strategy_name = match plan.strategy {
        WithdrawalStrategy::Normal => "normal",
        WithdrawalStrategy::Bucket { .. } => "bucket",
    };

    format!(
        "As a professional financial advisor, analyze the following retirement plan and provide concise, actionable advice.

Context:
Country: {country_name} (Currency: {currency_code})
Withdrawal Strategy: {strategy}

Data:
Current Age: {current_age}
Retirement Age: {retirement_age}
Current Savings: {sym}{current_savings}
Monthly Contribution: {sym}{monthly_contribution} ({contribution})
Expected Annual Return: {expected_return}%
Expected Inflation: {inflation}%
Planned Spending in Retirement: {sym}{monthly_spending}/month ({sym}{annual_spending}/year) (Current Value)
Life Expectancy: {life_expectancy}

Calculated Metrics:
Projected Balance at Retirement (at age {retirement_age}): {sym}{balance_at_retirement}
Estimated Required Corpus at Retirement: {sym}{required_corpus}
Savings Shortfall: {sym}{shortfall}
Additional Monthly Savings Needed (Fixed): {sym}{fixed_monthly}
Additional Monthly Savings Needed (Step-up at {step_up_pct}% annual growth): {sym}{step_up_monthly}
Years Funded in Retirement: {years_funded}

Please provide:
1. A summary of the plan's feasibility considering the {country_name} context.
2. 3-4 specific recommendations to improve the outcome, including thoughts on the chosen {strategy_name} strategy.
3. A brief risk assessment.

Format the response as Markdown.",
        country_name = country.name,
        currency_code = country.currency_code,
        current_age = plan.current_age,
        retirement_age = plan.retirement_age,
        current_savings = format_amount(plan.current_savings),
        monthly_contribution = format_amount(plan.monthly_contribution),
        expected_return = plan.expected_return_pct,
        inflation = plan.inflation_pct,
        monthly_spending = format_amount(plan.monthly_spending_today),
        annual_spending = format_amount(plan.monthly_spending_today * 12.0),
        life_expectancy = plan.life_expectancy,
        balance_at_retirement = format_amount(metrics.balance_at_retirement),
        required_corpus = format_amount(metrics.required_corpus),
        shortfall = format_amount(metrics.shortfall),
        fixed_monthly = format_amount(metrics.additional_savings.fixed_monthly),
        step_up_monthly = format_amount(metrics.additional_savings.step_up_monthly),
        years_funded = metrics.years_funded,
    )
}

/// Rounds to whole units and groups thousands with commas.
fn format_amount(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if rounded < 0.0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}
