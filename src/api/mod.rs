use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Json, Query, State},
    http::{Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Args, ValueEnum};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use crate::advice::{
    AdviceConfig, AdviceError, AdviceProvider, CLIENT_TIMEOUT, COUNTRIES, Country,
    GEMINI_API_KEY_VAR, ProviderKind, SERVER_TIMEOUT, XAI_API_KEY_VAR, build_prompt,
    country_by_code, request_advice,
};
use crate::core::calculators::{
    DEFAULT_EXPENSE_CATEGORIES, EmiResult, ExpenseSummary, GoalInput, GoalResult,
    SipResult, emi, fixed_deposit, goal, recurring_deposit, sip, summarize_expenses,
};
use crate::core::{
    AdditionalSavingsNeeded, ContributionType, PlanInput, PlanMetrics, ProjectionPoint,
    WithdrawalStrategy, evaluate_plan_with_step_up,
};

const DEFAULT_CURRENT_AGE: u32 = 30;
const DEFAULT_RETIREMENT_AGE: u32 = 60;
const DEFAULT_LIFE_EXPECTANCY: u32 = 90;
const DEFAULT_CURRENT_SAVINGS: f64 = 50_000.0;
const DEFAULT_MONTHLY_CONTRIBUTION: f64 = 1_000.0;
const DEFAULT_STEP_UP_RATE: f64 = 5.0;
const DEFAULT_EXPECTED_RETURN: f64 = 9.0;
const DEFAULT_INFLATION_RATE: f64 = 5.0;
const DEFAULT_MONTHLY_SPENDING: f64 = 5_000.0;
const DEFAULT_BUCKET_SIZE: i32 = 5;

const MAX_AGE: u32 = 150;
const MAX_TENURE_YEARS: u32 = 100;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliContributionType {
    Fixed,
    StepUp,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum CliStrategy {
    Normal,
    Bucket,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiContributionType {
    Fixed,
    #[serde(alias = "stepUp", alias = "step_up")]
    StepUp,
}

impl From<ApiContributionType> for CliContributionType {
    fn from(value: ApiContributionType) -> Self {
        match value {
            ApiContributionType::Fixed => CliContributionType::Fixed,
            ApiContributionType::StepUp => CliContributionType::StepUp,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiStrategy {
    Normal,
    #[serde(alias = "block")]
    Bucket,
}

impl From<ApiStrategy> for CliStrategy {
    fn from(value: ApiStrategy) -> Self {
        match value {
            ApiStrategy::Normal => CliStrategy::Normal,
            ApiStrategy::Bucket => CliStrategy::Bucket,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    #[arg(long, default_value_t = DEFAULT_CURRENT_AGE)]
    pub current_age: u32,
    #[arg(long, default_value_t = DEFAULT_RETIREMENT_AGE)]
    pub retirement_age: u32,
    #[arg(long, default_value_t = DEFAULT_LIFE_EXPECTANCY, help = "Age to fund through")]
    pub life_expectancy: u32,
    #[arg(long, default_value_t = DEFAULT_CURRENT_SAVINGS)]
    pub current_savings: f64,
    #[arg(long, default_value_t = DEFAULT_MONTHLY_CONTRIBUTION)]
    pub monthly_contribution: f64,
    #[arg(long, value_enum, default_value_t = CliContributionType::Fixed)]
    pub contribution_type: CliContributionType,
    #[arg(
        long,
        default_value_t = DEFAULT_STEP_UP_RATE,
        help = "Annual contribution increase in percent; also prices the step-up top-up"
    )]
    pub step_up_rate: f64,
    #[arg(long, default_value_t = DEFAULT_EXPECTED_RETURN, help = "Expected annual return in percent")]
    pub expected_return: f64,
    #[arg(long, default_value_t = DEFAULT_INFLATION_RATE, help = "Expected annual inflation in percent")]
    pub inflation_rate: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_MONTHLY_SPENDING,
        help = "Monthly spending in retirement at today's prices"
    )]
    pub monthly_spending: f64,
    #[arg(long, value_enum, default_value_t = CliStrategy::Bucket)]
    pub strategy: CliStrategy,
    #[arg(
        long,
        default_value_t = DEFAULT_BUCKET_SIZE,
        allow_negative_numbers = true,
        help = "Years of spending per safe-sleeve refill; values below 1 are treated as 1"
    )]
    pub bucket_size: i32,
}

impl Default for PlanArgs {
    fn default() -> Self {
        Self {
            current_age: DEFAULT_CURRENT_AGE,
            retirement_age: DEFAULT_RETIREMENT_AGE,
            life_expectancy: DEFAULT_LIFE_EXPECTANCY,
            current_savings: DEFAULT_CURRENT_SAVINGS,
            monthly_contribution: DEFAULT_MONTHLY_CONTRIBUTION,
            contribution_type: CliContributionType::Fixed,
            step_up_rate: DEFAULT_STEP_UP_RATE,
            expected_return: DEFAULT_EXPECTED_RETURN,
            inflation_rate: DEFAULT_INFLATION_RATE,
            monthly_spending: DEFAULT_MONTHLY_SPENDING,
            strategy: CliStrategy::Bucket,
            bucket_size: DEFAULT_BUCKET_SIZE,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PlanPayload {
    current_age: Option<u32>,
    retirement_age: Option<u32>,
    life_expectancy: Option<u32>,
    current_savings: Option<f64>,
    monthly_contribution: Option<f64>,
    contribution_type: Option<ApiContributionType>,
    step_up_rate: Option<f64>,
    expected_return: Option<f64>,
    inflation_rate: Option<f64>,
    #[serde(alias = "retirementSpending")]
    monthly_spending: Option<f64>,
    strategy: Option<ApiStrategy>,
    #[serde(alias = "blockSize")]
    bucket_size: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CountryPayload {
    code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct AdvicePayload {
    data: PlanPayload,
    country: Option<CountryPayload>,
    model: Option<String>,
}

#[derive(Debug, Clone)]
struct PlanRequest {
    plan: PlanInput,
    step_up_pct: f64,
}

#[derive(Debug)]
struct AdviceRequest {
    plan: PlanRequest,
    country: Country,
    provider: ProviderKind,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectionResponse {
    input: PlanInput,
    step_up_rate: f64,
    projection: Vec<ProjectionPoint>,
    balance_at_retirement: f64,
    required_corpus: f64,
    shortfall: f64,
    additional_savings: AdditionalSavingsNeeded,
    final_balance: f64,
    is_successful: bool,
    peak_balance: f64,
    years_funded: u32,
}

#[derive(Debug, Serialize)]
struct AdviceResponse {
    text: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct NotFoundResponse {
    error: &'static str,
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SipPayload {
    monthly_investment: f64,
    expected_return: f64,
    tenure_years: u32,
    step_up: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmiPayload {
    loan_amount: f64,
    rate: f64,
    tenure_years: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DepositPayload {
    amount: f64,
    rate: f64,
    tenure_years: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoalPayload {
    current_age: u32,
    retirement_age: u32,
    years_to_goal: i32,
    current_cost: f64,
    current_savings: f64,
    monthly_contribution: f64,
    expected_return: f64,
    inflation_rate: f64,
}

#[derive(Debug, Deserialize)]
struct ExpenseItemPayload {
    category: String,
    amount: f64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ExpensesPayload {
    items: Vec<ExpenseItemPayload>,
}

#[derive(Clone, Default)]
pub struct AppState {
    gemini: Option<Arc<dyn AdviceProvider>>,
    grok: Option<Arc<dyn AdviceProvider>>,
}

impl AppState {
    pub fn from_config(config: &AdviceConfig) -> Self {
        let mut state = Self::default();
        for kind in [ProviderKind::Gemini, ProviderKind::Grok] {
            match config.provider(kind) {
                Ok(provider) => state = state.with_provider(kind, Arc::from(provider)),
                Err(AdviceError::MissingApiKey { var }) => {
                    info!("{var} not set; {kind:?} advice disabled");
                }
                Err(err) => error!("failed to initialise {kind:?} advice provider: {err}"),
            }
        }
        state
    }

    pub fn with_provider(mut self, kind: ProviderKind, provider: Arc<dyn AdviceProvider>) -> Self {
        match kind {
            ProviderKind::Gemini => self.gemini = Some(provider),
            ProviderKind::Grok => self.grok = Some(provider),
        }
        self
    }

    fn provider(&self, kind: ProviderKind) -> Result<Arc<dyn AdviceProvider>, AdviceError> {
        let (slot, var) = match kind {
            ProviderKind::Gemini => (&self.gemini, GEMINI_API_KEY_VAR),
            ProviderKind::Grok => (&self.grok, XAI_API_KEY_VAR),
        };
        slot.clone().ok_or(AdviceError::MissingApiKey { var })
    }
}

fn build_plan_input(args: &PlanArgs) -> Result<PlanInput, String> {
    if args.retirement_age < args.current_age {
        return Err("--retirement-age must be >= --current-age".to_string());
    }

    if args.life_expectancy < args.retirement_age {
        return Err("--life-expectancy must be >= --retirement-age".to_string());
    }

    if args.life_expectancy > MAX_AGE {
        return Err(format!("--life-expectancy must be <= {MAX_AGE}"));
    }

    if !args.current_savings.is_finite() || args.current_savings < 0.0 {
        return Err("--current-savings must be >= 0".to_string());
    }

    if !args.monthly_contribution.is_finite() || args.monthly_contribution < 0.0 {
        return Err("--monthly-contribution must be >= 0".to_string());
    }

    if !args.monthly_spending.is_finite() || args.monthly_spending < 0.0 {
        return Err("--monthly-spending must be >= 0".to_string());
    }

    for (flag, value) in [
        ("--expected-return", args.expected_return),
        ("--inflation-rate", args.inflation_rate),
        ("--step-up-rate", args.step_up_rate),
    ] {
        if !value.is_finite() || value <= -100.0 {
            return Err(format!("{flag} must be a finite percentage > -100"));
        }
    }

    let contribution_type = match args.contribution_type {
        CliContributionType::Fixed => ContributionType::Fixed,
        CliContributionType::StepUp => ContributionType::StepUp {
            annual_growth_pct: args.step_up_rate,
        },
    };
    let strategy = match args.strategy {
        CliStrategy::Normal => WithdrawalStrategy::Normal,
        CliStrategy::Bucket => WithdrawalStrategy::Bucket {
            bucket_size_years: args.bucket_size,
        },
    };

    Ok(PlanInput {
        current_age: args.current_age,
        retirement_age: args.retirement_age,
        life_expectancy: args.life_expectancy,
        current_savings: args.current_savings,
        monthly_contribution: args.monthly_contribution,
        contribution_type,
        expected_return_pct: args.expected_return,
        inflation_pct: args.inflation_rate,
        monthly_spending_today: args.monthly_spending,
        strategy,
    })
}

fn plan_request_from_args(args: &PlanArgs) -> Result<PlanRequest, String> {
    Ok(PlanRequest {
        plan: build_plan_input(args)?,
        step_up_pct: args.step_up_rate,
    })
}

fn plan_request_from_payload(payload: PlanPayload) -> Result<PlanRequest, String> {
    let mut args = PlanArgs::default();

    if let Some(v) = payload.current_age {
        args.current_age = v;
    }
    if let Some(v) = payload.retirement_age {
        args.retirement_age = v;
    }
    if let Some(v) = payload.life_expectancy {
        args.life_expectancy = v;
    }
    if let Some(v) = payload.current_savings {
        args.current_savings = v;
    }
    if let Some(v) = payload.monthly_contribution {
        args.monthly_contribution = v;
    }
    if let Some(v) = payload.contribution_type {
        args.contribution_type = v.into();
    }
    if let Some(v) = payload.step_up_rate {
        args.step_up_rate = v;
    }
    if let Some(v) = payload.expected_return {
        args.expected_return = v;
    }
    if let Some(v) = payload.inflation_rate {
        args.inflation_rate = v;
    }
    if let Some(v) = payload.monthly_spending {
        args.monthly_spending = v;
    }
    if let Some(v) = payload.strategy {
        args.strategy = v.into();
    }
    if let Some(v) = payload.bucket_size {
        args.bucket_size = v;
    }

    plan_request_from_args(&args)
}

#[cfg(test)]
fn plan_request_from_json(json: &str) -> Result<PlanRequest, String> {
    let payload = serde_json::from_str::<PlanPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    plan_request_from_payload(payload)
}

fn advice_request_from_payload(payload: AdvicePayload) -> Result<AdviceRequest, String> {
    let plan = plan_request_from_payload(payload.data)?;
    let country = match payload.country.and_then(|c| c.code) {
        None => COUNTRIES[0],
        Some(code) => {
            country_by_code(&code).ok_or_else(|| format!("Unsupported country code: {code}"))?
        }
    };
    let provider = payload
        .model
        .as_deref()
        .map(ProviderKind::from_name)
        .unwrap_or_default();
    Ok(AdviceRequest {
        plan,
        country,
        provider,
    })
}

fn build_projection_response(request: &PlanRequest, metrics: PlanMetrics) -> ProjectionResponse {
    ProjectionResponse {
        input: request.plan.clone(),
        step_up_rate: request.step_up_pct,
        projection: metrics.projection,
        balance_at_retirement: metrics.balance_at_retirement,
        required_corpus: metrics.required_corpus,
        shortfall: metrics.shortfall,
        additional_savings: metrics.additional_savings,
        final_balance: metrics.final_balance,
        is_successful: metrics.is_successful,
        peak_balance: metrics.peak_balance,
        years_funded: metrics.years_funded,
    }
}

fn run_projection(request: &PlanRequest) -> ProjectionResponse {
    let metrics = evaluate_plan_with_step_up(&request.plan, request.step_up_pct);
    build_projection_response(request, metrics)
}

pub fn projection_json(args: &PlanArgs) -> Result<String, String> {
    let request = plan_request_from_args(args)?;
    let response = run_projection(&request);
    serde_json::to_string_pretty(&response).map_err(|e| format!("failed to render projection: {e}"))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route(
            "/api/projection",
            get(projection_get_handler).post(projection_post_handler),
        )
        .route("/api/advice", post(advice_handler))
        .route("/api/calculators/sip", post(sip_handler))
        .route("/api/calculators/emi", post(emi_handler))
        .route("/api/calculators/fd", post(fixed_deposit_handler))
        .route("/api/calculators/rd", post(recurring_deposit_handler))
        .route("/api/calculators/goal", post(goal_handler))
        .route("/api/calculators/expenses", post(expenses_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

pub async fn run_http_server(port: u16, state: AppState) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    info!("RetireWise HTTP API listening on http://{addr}");
    info!("Local access: http://127.0.0.1:{port}/api/health");

    axum::serve(listener, app).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler(method: Method, uri: Uri) -> Response {
    warn!("Unknown API call: {method} {uri}");
    json_response(
        StatusCode::NOT_FOUND,
        NotFoundResponse {
            error: "Route not found",
            url: uri.to_string(),
        },
    )
}

async fn projection_get_handler(Query(payload): Query<PlanPayload>) -> Response {
    projection_handler_impl(payload)
}

async fn projection_post_handler(Json(payload): Json<PlanPayload>) -> Response {
    projection_handler_impl(payload)
}

fn projection_handler_impl(payload: PlanPayload) -> Response {
    let request = match plan_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    debug!("projection request: {:?}", request.plan);
    json_response(StatusCode::OK, run_projection(&request))
}

async fn advice_handler(
    State(state): State<AppState>,
    Json(payload): Json<AdvicePayload>,
) -> Response {
    let request = match advice_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let provider = match state.provider(request.provider) {
        Ok(provider) => provider,
        Err(err) => {
            error!("advice unavailable: {err}");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string());
        }
    };

    let metrics = evaluate_plan_with_step_up(&request.plan.plan, request.plan.step_up_pct);
    let prompt = build_prompt(
        &request.plan.plan,
        request.plan.step_up_pct,
        &request.country,
        &metrics,
    );
    info!(
        "requesting advice from {} for {}",
        provider.name(),
        request.country.code
    );

    let outcome = tokio::time::timeout(
        SERVER_TIMEOUT,
        request_advice(provider.as_ref(), &prompt, CLIENT_TIMEOUT),
    )
    .await;
    match outcome {
        Ok(Ok(text)) => json_response(StatusCode::OK, AdviceResponse { text }),
        Ok(Err(err)) => {
            error!("Server AI Error: {err}");
            let status = if err.is_timeout() {
                StatusCode::REQUEST_TIMEOUT
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            error_response(status, &err.to_string())
        }
        Err(_) => {
            error!("advice request exceeded {}s", SERVER_TIMEOUT.as_secs());
            error_response(StatusCode::REQUEST_TIMEOUT, "Request has timed out.")
        }
    }
}

async fn sip_handler(Json(payload): Json<SipPayload>) -> Response {
    calculator_response(sip_from_payload(&payload))
}

async fn emi_handler(Json(payload): Json<EmiPayload>) -> Response {
    calculator_response(emi_from_payload(&payload))
}

async fn fixed_deposit_handler(Json(payload): Json<DepositPayload>) -> Response {
    calculator_response(
        validate_deposit(&payload)
            .map(|()| fixed_deposit(payload.amount, payload.rate, payload.tenure_years)),
    )
}

async fn recurring_deposit_handler(Json(payload): Json<DepositPayload>) -> Response {
    calculator_response(
        validate_deposit(&payload)
            .map(|()| recurring_deposit(payload.amount, payload.rate, payload.tenure_years)),
    )
}

async fn goal_handler(Json(payload): Json<GoalPayload>) -> Response {
    calculator_response(goal_from_payload(&payload))
}

async fn expenses_handler(Json(payload): Json<ExpensesPayload>) -> Response {
    calculator_response(expenses_from_payload(&payload))
}

fn sip_from_payload(payload: &SipPayload) -> Result<SipResult, String> {
    non_negative("monthlyInvestment", payload.monthly_investment)?;
    finite_rate("expectedReturn", payload.expected_return)?;
    tenure("tenureYears", payload.tenure_years)?;
    if let Some(step_up) = payload.step_up {
        finite_rate("stepUp", step_up)?;
    }
    Ok(sip(
        payload.monthly_investment,
        payload.expected_return,
        payload.tenure_years,
        payload.step_up,
    ))
}

fn emi_from_payload(payload: &EmiPayload) -> Result<EmiResult, String> {
    non_negative("loanAmount", payload.loan_amount)?;
    finite_rate("rate", payload.rate)?;
    tenure("tenureYears", payload.tenure_years)?;
    Ok(emi(payload.loan_amount, payload.rate, payload.tenure_years))
}

fn validate_deposit(payload: &DepositPayload) -> Result<(), String> {
    non_negative("amount", payload.amount)?;
    finite_rate("rate", payload.rate)?;
    tenure("tenureYears", payload.tenure_years)
}

fn goal_from_payload(payload: &GoalPayload) -> Result<GoalResult, String> {
    non_negative("currentCost", payload.current_cost)?;
    non_negative("currentSavings", payload.current_savings)?;
    non_negative("monthlyContribution", payload.monthly_contribution)?;
    finite_rate("expectedReturn", payload.expected_return)?;
    finite_rate("inflationRate", payload.inflation_rate)?;
    if payload.current_age > MAX_AGE {
        return Err(format!("currentAge must be <= {MAX_AGE}"));
    }
    if payload.retirement_age > MAX_AGE {
        return Err(format!("retirementAge must be <= {MAX_AGE}"));
    }
    if payload.years_to_goal > MAX_TENURE_YEARS as i32 {
        return Err(format!("yearsToGoal must be <= {MAX_TENURE_YEARS}"));
    }

    goal(&GoalInput {
        current_age: payload.current_age,
        retirement_age: payload.retirement_age,
        years_to_goal: payload.years_to_goal,
        current_cost: payload.current_cost,
        current_savings: payload.current_savings,
        monthly_contribution: payload.monthly_contribution,
        expected_return_pct: payload.expected_return,
        inflation_pct: payload.inflation_rate,
    })
    .ok_or_else(|| "yearsToGoal must be >= 0".to_string())
}

fn expenses_from_payload(payload: &ExpensesPayload) -> Result<ExpenseSummary, String> {
    if payload.items.is_empty() {
        return Ok(summarize_expenses(DEFAULT_EXPENSE_CATEGORIES));
    }
    for item in &payload.items {
        if !item.amount.is_finite() {
            return Err(format!("amount for {} must be finite", item.category));
        }
    }
    Ok(summarize_expenses(
        payload
            .items
            .iter()
            .map(|item| (item.category.as_str(), item.amount)),
    ))
}

fn non_negative(field: &str, value: f64) -> Result<(), String> {
    if !value.is_finite() || value < 0.0 {
        return Err(format!("{field} must be >= 0"));
    }
    Ok(())
}

fn finite_rate(field: &str, value: f64) -> Result<(), String> {
    if !value.is_finite() || value <= -100.0 {
        return Err(format!("{field} must be a finite percentage > -100"));
    }
    Ok(())
}

fn tenure(field: &str, years: u32) -> Result<(), String> {
    if years > MAX_TENURE_YEARS {
        return Err(format!("{field} must be <= {MAX_TENURE_YEARS}"));
    }
    Ok(())
}

fn calculator_response<T: Serialize>(result: Result<T, String>) -> Response {
    match result {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advice::tests::ScriptedProvider;
    use serde_json::Value;
    use std::sync::atomic::Ordering;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_args() -> PlanArgs {
        PlanArgs::default()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body readable");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[test]
    fn build_plan_input_maps_defaults() {
        let plan = build_plan_input(&sample_args()).expect("valid defaults");
        assert_eq!(plan.current_age, 30);
        assert_eq!(plan.retirement_age, 60);
        assert_eq!(plan.life_expectancy, 90);
        assert_eq!(plan.contribution_type, ContributionType::Fixed);
        assert_eq!(
            plan.strategy,
            WithdrawalStrategy::Bucket {
                bucket_size_years: 5
            }
        );
        assert_approx(plan.expected_return_pct, 9.0);
    }

    #[test]
    fn build_plan_input_carries_step_up_rate_into_contribution_type() {
        let mut args = sample_args();
        args.contribution_type = CliContributionType::StepUp;
        args.step_up_rate = 7.5;
        let plan = build_plan_input(&args).expect("valid inputs");
        assert_eq!(
            plan.contribution_type,
            ContributionType::StepUp {
                annual_growth_pct: 7.5
            }
        );
    }

    #[test]
    fn build_plan_input_rejects_non_monotonic_ages() {
        let mut args = sample_args();
        args.retirement_age = 25;
        let err = build_plan_input(&args).expect_err("must reject retirement before now");
        assert!(err.contains("--retirement-age"));

        let mut args = sample_args();
        args.life_expectancy = 55;
        let err = build_plan_input(&args).expect_err("must reject early life expectancy");
        assert!(err.contains("--life-expectancy"));
    }

    #[test]
    fn build_plan_input_rejects_negative_or_non_finite_amounts() {
        let mut args = sample_args();
        args.current_savings = -1.0;
        assert!(
            build_plan_input(&args)
                .expect_err("negative savings")
                .contains("--current-savings")
        );

        let mut args = sample_args();
        args.monthly_spending = f64::NAN;
        assert!(
            build_plan_input(&args)
                .expect_err("nan spending")
                .contains("--monthly-spending")
        );

        let mut args = sample_args();
        args.inflation_rate = -100.0;
        assert!(
            build_plan_input(&args)
                .expect_err("inflation wipes out prices")
                .contains("--inflation-rate")
        );
    }

    #[test]
    fn build_plan_input_keeps_non_positive_bucket_size_for_engine_clamping() {
        let mut args = sample_args();
        args.bucket_size = 0;
        let plan = build_plan_input(&args).expect("bucket size is clamped later");
        assert_eq!(plan.strategy.bucket_years(), Some(1));
    }

    #[test]
    fn plan_request_from_json_parses_web_keys() {
        let request = plan_request_from_json(
            r#"{
                "currentAge": 35,
                "retirementAge": 55,
                "lifeExpectancy": 85,
                "currentSavings": 120000,
                "monthlyContribution": 2500,
                "contributionType": "step-up",
                "stepUpRate": 6,
                "expectedReturn": 8,
                "inflationRate": 3,
                "monthlySpending": 4000,
                "strategy": "block",
                "blockSize": 3
            }"#,
        )
        .expect("valid payload");

        let plan = &request.plan;
        assert_eq!(plan.current_age, 35);
        assert_eq!(plan.retirement_age, 55);
        assert_eq!(plan.life_expectancy, 85);
        assert_approx(plan.current_savings, 120_000.0);
        assert_approx(plan.monthly_contribution, 2_500.0);
        assert_eq!(
            plan.contribution_type,
            ContributionType::StepUp {
                annual_growth_pct: 6.0
            }
        );
        assert_approx(plan.expected_return_pct, 8.0);
        assert_approx(plan.inflation_pct, 3.0);
        assert_approx(plan.monthly_spending_today, 4_000.0);
        assert_eq!(
            plan.strategy,
            WithdrawalStrategy::Bucket {
                bucket_size_years: 3
            }
        );
        assert_approx(request.step_up_pct, 6.0);
    }

    #[test]
    fn plan_request_from_json_accepts_aliases_and_defaults() {
        let request = plan_request_from_json(
            r#"{"contributionType":"stepUp","strategy":"normal","retirementSpending":3000}"#,
        )
        .expect("valid payload");
        assert_eq!(request.plan.strategy, WithdrawalStrategy::Normal);
        assert_approx(request.plan.monthly_spending_today, 3_000.0);
        assert_eq!(request.plan.current_age, 30);
        assert_approx(request.step_up_pct, 5.0);
    }

    #[test]
    fn plan_request_from_json_rejects_unknown_strategy() {
        let err = plan_request_from_json(r#"{"strategy":"ladder"}"#).expect_err("bad strategy");
        assert!(err.contains("Invalid API JSON payload"));
    }

    #[test]
    fn projection_response_serialization_contains_expected_fields() {
        let request = plan_request_from_args(&sample_args()).expect("valid defaults");
        let response = run_projection(&request);
        assert_eq!(response.projection.len(), 61);

        let json = serde_json::to_string(&response).expect("response should serialize");
        for field in [
            "\"projection\"",
            "\"balanceAtRetirement\"",
            "\"requiredCorpus\"",
            "\"shortfall\"",
            "\"additionalSavings\"",
            "\"fixedMonthly\"",
            "\"stepUpMonthly\"",
            "\"finalBalance\"",
            "\"isSuccessful\"",
            "\"peakBalance\"",
            "\"yearsFunded\"",
            "\"growthSleeveBalance\"",
            "\"safeSleeveBalance\"",
            "\"bucketSizeYears\"",
        ] {
            assert!(json.contains(field), "missing {field}");
        }
    }

    #[test]
    fn projection_json_reports_invalid_args() {
        let mut args = sample_args();
        args.life_expectancy = MAX_AGE + 1;
        let err = projection_json(&args).expect_err("too old");
        assert!(err.contains("--life-expectancy"));
        assert!(projection_json(&sample_args()).is_ok());
    }

    #[test]
    fn advice_request_resolves_country_and_model() {
        let payload: AdvicePayload = serde_json::from_str(
            r#"{"data":{"currentAge":40},"country":{"code":"IN","name":"India"},"model":"grok"}"#,
        )
        .expect("valid payload");
        let request = advice_request_from_payload(payload).expect("valid request");
        assert_eq!(request.country.currency_code, "INR");
        assert_eq!(request.provider, ProviderKind::Grok);
        assert_eq!(request.plan.plan.current_age, 40);

        let payload: AdvicePayload =
            serde_json::from_str(r#"{"data":{}}"#).expect("valid payload");
        let request = advice_request_from_payload(payload).expect("valid request");
        assert_eq!(request.country.code, "US");
        assert_eq!(request.provider, ProviderKind::Gemini);

        let payload: AdvicePayload =
            serde_json::from_str(r#"{"data":{},"country":{"code":"FR"}}"#).expect("valid payload");
        let err = advice_request_from_payload(payload).expect_err("unsupported country");
        assert!(err.contains("FR"));
    }

    #[test]
    fn calculator_payloads_are_validated() {
        let err = emi_from_payload(&EmiPayload {
            loan_amount: -5.0,
            rate: 8.0,
            tenure_years: 10,
        })
        .expect_err("negative loan");
        assert!(err.contains("loanAmount"));

        let err = sip_from_payload(&SipPayload {
            monthly_investment: 100.0,
            expected_return: 12.0,
            tenure_years: MAX_TENURE_YEARS + 1,
            step_up: None,
        })
        .expect_err("tenure too long");
        assert!(err.contains("tenureYears"));

        let err = goal_from_payload(&GoalPayload {
            current_age: 30,
            retirement_age: 60,
            years_to_goal: -2,
            current_cost: 1_000.0,
            current_savings: 0.0,
            monthly_contribution: 0.0,
            expected_return: 8.0,
            inflation_rate: 5.0,
        })
        .expect_err("goal in the past");
        assert!(err.contains("yearsToGoal"));
    }

    #[test]
    fn empty_expense_list_uses_default_budget() {
        let summary = expenses_from_payload(&ExpensesPayload::default()).expect("defaults");
        assert_eq!(summary.categories.len(), DEFAULT_EXPENSE_CATEGORIES.len());
        assert_approx(summary.total_monthly, 5_150.0);
    }

    #[tokio::test]
    async fn health_handler_reports_ok() {
        let response = health_handler().await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).map(|v| v.as_bytes()),
            Some(&b"no-store"[..])
        );
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn unknown_route_returns_not_found_with_url() {
        let uri: Uri = "/api/unknown?x=1".parse().expect("valid uri");
        let response = not_found_handler(Method::GET, uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"], "Route not found");
        assert_eq!(body["url"], "/api/unknown?x=1");
    }

    #[tokio::test]
    async fn projection_handler_rejects_invalid_plan() {
        let payload = PlanPayload {
            retirement_age: Some(20),
            ..PlanPayload::default()
        };
        let response = projection_post_handler(Json(payload)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(
            body["error"]
                .as_str()
                .expect("error string")
                .contains("--retirement-age")
        );
    }

    #[tokio::test]
    async fn projection_handler_returns_metrics() {
        let payload = PlanPayload {
            strategy: Some(ApiStrategy::Normal),
            ..PlanPayload::default()
        };
        let response = projection_get_handler(Query(payload)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["projection"].as_array().map(Vec::len), Some(61));
        assert!(body["requiredCorpus"].as_f64().expect("number") > 0.0);
        assert_eq!(body["input"]["strategy"]["type"], "normal");
    }

    #[tokio::test]
    async fn advice_handler_returns_provider_text() {
        let provider = Arc::new(ScriptedProvider::new(1));
        let state = AppState::default().with_provider(ProviderKind::Gemini, provider.clone());
        let payload: AdvicePayload =
            serde_json::from_str(r#"{"data":{},"country":{"code":"AU"}}"#).expect("payload");

        let response = advice_handler(State(state), Json(payload)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(
            body["text"]
                .as_str()
                .expect("text")
                .starts_with("## Advice")
        );
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn advice_handler_reports_missing_key() {
        let payload: AdvicePayload =
            serde_json::from_str(r#"{"data":{},"model":"grok"}"#).expect("payload");
        let response = advice_handler(State(AppState::default()), Json(payload)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(
            body["error"],
            "XAI_API_KEY is not set in the server environment variables."
        );
    }

    #[tokio::test]
    async fn advice_handler_surfaces_provider_failure() {
        let provider = Arc::new(ScriptedProvider::new(2));
        let state = AppState::default().with_provider(ProviderKind::Gemini, provider.clone());
        let payload: AdvicePayload = serde_json::from_str(r#"{"data":{}}"#).expect("payload");

        let response = advice_handler(State(state), Json(payload)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["error"].as_str().expect("error").contains("overloaded"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn calculator_handlers_return_results() {
        let response = emi_handler(Json(EmiPayload {
            loan_amount: 12_000.0,
            rate: 0.0,
            tenure_years: 1,
        }))
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_approx(body["emi"].as_f64().expect("emi"), 1_000.0);

        let response = fixed_deposit_handler(Json(DepositPayload {
            amount: 1_000.0,
            rate: 8.0,
            tenure_years: 1,
        }))
        .await;
        let body = body_json(response).await;
        assert_approx(
            body["maturity"].as_f64().expect("maturity"),
            1_000.0 * 1.02_f64.powi(4),
        );

        let response = recurring_deposit_handler(Json(DepositPayload {
            amount: -1.0,
            rate: 8.0,
            tenure_years: 1,
        }))
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn goal_handler_rejects_out_of_range_age() {
        let response = goal_handler(Json(GoalPayload {
            current_age: u32::MAX,
            retirement_age: 60,
            years_to_goal: 15,
            current_cost: 500_000.0,
            current_savings: 50_000.0,
            monthly_contribution: 1_000.0,
            expected_return: 10.0,
            inflation_rate: 7.0,
        }))
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["error"].as_str().expect("error").contains("currentAge"));

        let response = goal_handler(Json(GoalPayload {
            current_age: 30,
            retirement_age: MAX_AGE + 1,
            years_to_goal: 15,
            current_cost: 500_000.0,
            current_savings: 50_000.0,
            monthly_contribution: 1_000.0,
            expected_return: 10.0,
            inflation_rate: 7.0,
        }))
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
