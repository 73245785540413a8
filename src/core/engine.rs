use super::rates::monthly_rate_from_annual;
use super::types::{ContributionType, PlanInput, ProjectionPoint, WithdrawalStrategy};

#[derive(Debug, Clone, Copy)]
struct Portfolio {
    growth: f64,
    safe: f64,
}

impl Portfolio {
    fn total(self) -> f64 {
        self.growth + self.safe
    }
}

#[derive(Debug, Clone, Copy)]
struct MonthlyRates {
    market: f64,
    inflation: f64,
}

// Year-by-year balance trajectory from the current age through life
// expectancy, one point per age, each recorded at the start of that year.
pub fn simulate(input: &PlanInput) -> Vec<ProjectionPoint> {
    let rates = MonthlyRates {
        market: monthly_rate_from_annual(input.expected_return()),
        inflation: monthly_rate_from_annual(input.inflation()),
    };
    let inflation = input.inflation();
    let bucket_years = input.strategy.bucket_years();

    let mut portfolio = Portfolio {
        growth: input.current_savings,
        safe: 0.0,
    };
    let mut annual_spending = input.monthly_spending_today * 12.0;
    let mut monthly_contribution = input.monthly_contribution;

    let capacity = input.life_expectancy.saturating_sub(input.current_age) as usize + 1;
    let mut points = Vec::with_capacity(capacity);

    for age in input.current_age..=input.life_expectancy {
        let is_retired = age >= input.retirement_age;

        if let Some(years) = bucket_years {
            if is_retired && (age - input.retirement_age) % years == 0 {
                refill_safe_sleeve(&mut portfolio, annual_spending * f64::from(years));
            }
        }

        points.push(ProjectionPoint {
            age,
            total_balance: portfolio.total(),
            growth_sleeve_balance: portfolio.growth,
            safe_sleeve_balance: portfolio.safe,
            annual_expense: if is_retired { annual_spending } else { 0.0 },
            is_retired,
        });

        for _ in 0..12 {
            if is_retired {
                apply_retirement_month(
                    &mut portfolio,
                    input.strategy,
                    annual_spending / 12.0,
                    rates,
                );
            } else {
                apply_accumulation_month(&mut portfolio, monthly_contribution, rates);
            }
        }

        annual_spending *= 1.0 + inflation;
        if let ContributionType::StepUp { annual_growth_pct } = input.contribution_type {
            monthly_contribution *= 1.0 + annual_growth_pct / 100.0;
        }
    }

    points
}

fn refill_safe_sleeve(portfolio: &mut Portfolio, needed: f64) {
    let transfer = portfolio.growth.min(needed).max(0.0);
    portfolio.safe += transfer;
    portfolio.growth -= transfer;
}

fn apply_accumulation_month(portfolio: &mut Portfolio, contribution: f64, rates: MonthlyRates) {
    portfolio.growth = (portfolio.growth + contribution) * (1.0 + rates.market);
}

fn apply_retirement_month(
    portfolio: &mut Portfolio,
    strategy: WithdrawalStrategy,
    withdrawal: f64,
    rates: MonthlyRates,
) {
    match strategy {
        WithdrawalStrategy::Normal => {
            portfolio.growth = (portfolio.growth - withdrawal) * (1.0 + rates.market);
        }
        WithdrawalStrategy::Bucket { .. } => {
            if portfolio.safe >= withdrawal {
                portfolio.safe -= withdrawal;
            } else {
                let remaining = withdrawal - portfolio.safe;
                portfolio.safe = 0.0;
                portfolio.growth -= remaining;
            }
            portfolio.growth *= 1.0 + rates.market;
            portfolio.safe *= 1.0 + rates.inflation;
        }
    }
}
