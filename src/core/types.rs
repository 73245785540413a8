use serde::Serialize;

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ContributionType {
    Fixed,
    #[serde(rename_all = "camelCase")]
    StepUp { annual_growth_pct: f64 },
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WithdrawalStrategy {
    Normal,
    #[serde(rename_all = "camelCase")]
    Bucket { bucket_size_years: i32 },
}

impl WithdrawalStrategy {
    pub fn bucket_years(self) -> Option<u32> {
        match self {
            WithdrawalStrategy::Normal => None,
            WithdrawalStrategy::Bucket { bucket_size_years } => {
                Some(bucket_size_years.max(1) as u32)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanInput {
    pub current_age: u32,
    pub retirement_age: u32,
    pub life_expectancy: u32,
    pub current_savings: f64,
    pub monthly_contribution: f64,
    pub contribution_type: ContributionType,
    pub expected_return_pct: f64,
    pub inflation_pct: f64,
    pub monthly_spending_today: f64,
    pub strategy: WithdrawalStrategy,
}

impl PlanInput {
    pub fn expected_return(&self) -> f64 {
        self.expected_return_pct / 100.0
    }

    pub fn inflation(&self) -> f64 {
        self.inflation_pct / 100.0
    }

    pub fn step_up_rate(&self) -> f64 {
        match self.contribution_type {
            ContributionType::Fixed => 0.0,
            ContributionType::StepUp { annual_growth_pct } => annual_growth_pct / 100.0,
        }
    }

    pub fn years_to_retirement(&self) -> i64 {
        i64::from(self.retirement_age) - i64::from(self.current_age)
    }

    pub fn years_in_retirement(&self) -> i64 {
        i64::from(self.life_expectancy) - i64::from(self.retirement_age)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionPoint {
    pub age: u32,
    // Raw balance at the start of the year. Negative means the plan has failed.
    pub total_balance: f64,
    pub growth_sleeve_balance: f64,
    pub safe_sleeve_balance: f64,
    pub annual_expense: f64,
    pub is_retired: bool,
}

impl ProjectionPoint {
    pub fn display_balance(&self) -> f64 {
        self.total_balance.max(0.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalSavingsNeeded {
    pub fixed_monthly: f64,
    pub step_up_monthly: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanMetrics {
    pub projection: Vec<ProjectionPoint>,
    pub balance_at_retirement: f64,
    pub required_corpus: f64,
    pub shortfall: f64,
    pub additional_savings: AdditionalSavingsNeeded,
    pub final_balance: f64,
    pub is_successful: bool,
    pub peak_balance: f64,
    pub years_funded: u32,
}
