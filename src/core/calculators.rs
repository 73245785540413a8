use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SipResult {
    pub maturity_value: f64,
    pub total_invested: f64,
    pub wealth_gained: f64,
}

pub fn sip(
    monthly_investment: f64,
    annual_return_pct: f64,
    tenure_years: u32,
    step_up_pct: Option<f64>,
) -> SipResult {
    let rate = annual_return_pct / 100.0 / 12.0;
    let months = tenure_years * 12;

    let mut total_invested = 0.0;
    let mut maturity_value = 0.0;
    let mut instalment = monthly_investment;

    for month in 1..=months {
        if let Some(step_up) = step_up_pct {
            if month > 1 && (month - 1) % 12 == 0 {
                instalment *= 1.0 + step_up / 100.0;
            }
        }
        total_invested += instalment;
        maturity_value += instalment * (1.0 + rate).powi((months - month + 1) as i32);
    }

    SipResult {
        maturity_value,
        total_invested,
        wealth_gained: maturity_value - total_invested,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmiResult {
    pub emi: f64,
    pub total_payment: f64,
    pub total_interest: f64,
}

pub fn emi(principal: f64, annual_rate_pct: f64, tenure_years: u32) -> EmiResult {
    let rate = annual_rate_pct / 12.0 / 100.0;
    let months = f64::from(tenure_years * 12);
    if months == 0.0 {
        return EmiResult {
            emi: 0.0,
            total_payment: 0.0,
            total_interest: 0.0,
        };
    }

    let emi = if rate.abs() < 1e-12 {
        principal / months
    } else {
        let growth = (1.0 + rate).powf(months);
        principal * rate * growth / (growth - 1.0)
    };
    let total_payment = emi * months;
    EmiResult {
        emi,
        total_payment,
        total_interest: total_payment - principal,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositResult {
    pub maturity: f64,
    pub interest: f64,
    pub total_invested: f64,
}

const DEPOSIT_COMPOUNDS_PER_YEAR: f64 = 4.0;

pub fn fixed_deposit(amount: f64, annual_rate_pct: f64, tenure_years: u32) -> DepositResult {
    let rate = annual_rate_pct / 100.0;
    let n = DEPOSIT_COMPOUNDS_PER_YEAR;
    let maturity = amount * (1.0 + rate / n).powf(n * f64::from(tenure_years));
    DepositResult {
        maturity,
        interest: maturity - amount,
        total_invested: amount,
    }
}

pub fn recurring_deposit(
    monthly_amount: f64,
    annual_rate_pct: f64,
    tenure_years: u32,
) -> DepositResult {
    let rate = annual_rate_pct / 100.0;
    let n = DEPOSIT_COMPOUNDS_PER_YEAR;
    let months = tenure_years * 12;

    let maturity: f64 = (1..=months)
        .map(|i| {
            let remaining_months = f64::from(months - i + 1);
            monthly_amount * (1.0 + rate / n).powf(n * remaining_months / 12.0)
        })
        .sum();
    let total_invested = monthly_amount * f64::from(months);
    DepositResult {
        maturity,
        interest: maturity - total_invested,
        total_invested,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GoalInput {
    pub current_age: u32,
    pub retirement_age: u32,
    pub years_to_goal: i32,
    pub current_cost: f64,
    pub current_savings: f64,
    pub monthly_contribution: f64,
    pub expected_return_pct: f64,
    pub inflation_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalResult {
    pub goal_age: u32,
    pub years_to_goal: u32,
    pub future_cost: f64,
    pub total_estimated_corpus: f64,
    pub shortfall: f64,
    pub is_achievable: bool,
    pub additional_monthly_needed: f64,
    pub additional_lump_sum_needed: f64,
}

pub fn goal(input: &GoalInput) -> Option<GoalResult> {
    let years_to_goal = u32::try_from(input.years_to_goal).ok()?;
    let goal_age = input.current_age.checked_add(years_to_goal)?;
    let annual_rate = input.expected_return_pct / 100.0;
    let monthly_rate = annual_rate / 12.0;
    let years = f64::from(years_to_goal);

    let future_cost = input.current_cost * (1.0 + input.inflation_pct / 100.0).powf(years);
    let fv_savings = input.current_savings * (1.0 + annual_rate).powf(years);

    let contribution_years =
        i64::from(goal_age.min(input.retirement_age)) - i64::from(input.current_age);
    let months = (contribution_years * 12).max(0) as f64;
    let gap_years = f64::from(goal_age.saturating_sub(input.retirement_age));
    let annuity_due_factor = annuity_due_factor(monthly_rate, months);

    let fv_contributions = if months > 0.0 {
        input.monthly_contribution * annuity_due_factor * (1.0 + annual_rate).powf(gap_years)
    } else {
        0.0
    };

    let total_estimated_corpus = fv_savings + fv_contributions;
    let shortfall = (future_cost - total_estimated_corpus).max(0.0);

    let mut additional_monthly_needed = 0.0;
    let mut additional_lump_sum_needed = 0.0;
    if shortfall > 0.0 {
        if months > 0.0 {
            let needed_at_contribution_end = shortfall / (1.0 + annual_rate).powf(gap_years);
            additional_monthly_needed = needed_at_contribution_end / annuity_due_factor;
        }
        additional_lump_sum_needed = shortfall / (1.0 + annual_rate).powf(years);
    }

    Some(GoalResult {
        goal_age,
        years_to_goal,
        future_cost,
        total_estimated_corpus,
        shortfall,
        is_achievable: total_estimated_corpus >= future_cost,
        additional_monthly_needed,
        additional_lump_sum_needed,
    })
}

// Future value of 1 paid at the start of each of `periods` periods.
fn annuity_due_factor(rate: f64, periods: f64) -> f64 {
    if rate.abs() < 1e-12 {
        return periods;
    }
    ((1.0 + rate).powf(periods) - 1.0) / rate * (1.0 + rate)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseShare {
    pub category: String,
    pub amount: f64,
    pub share_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseSummary {
    pub total_monthly: f64,
    pub total_annual: f64,
    pub categories: Vec<ExpenseShare>,
}

pub const DEFAULT_EXPENSE_CATEGORIES: [(&str, f64); 10] = [
    ("Rent/Mortgage", 2000.0),
    ("Groceries", 500.0),
    ("Utilities", 200.0),
    ("Transport", 300.0),
    ("Entertainment", 200.0),
    ("Insurance", 150.0),
    ("Children Expenses", 1000.0),
    ("Maid", 500.0),
    ("Travel", 200.0),
    ("Misc", 100.0),
];

pub fn summarize_expenses<'a, I>(items: I) -> ExpenseSummary
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    let items: Vec<(&str, f64)> = items.into_iter().collect();
    let total_monthly: f64 = items.iter().map(|(_, amount)| amount).sum();
    let categories = items
        .into_iter()
        .map(|(category, amount)| ExpenseShare {
            category: category.to_string(),
            amount,
            share_pct: if total_monthly > 0.0 {
                amount / total_monthly * 100.0
            } else {
                0.0
            },
        })
        .collect();

    ExpenseSummary {
        total_monthly,
        total_annual: total_monthly * 12.0,
        categories,
    }
}
