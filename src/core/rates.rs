pub fn monthly_rate_from_annual(annual: f64) -> f64 {
    (1.0 + annual).powf(1.0 / 12.0) - 1.0
}

pub fn real_rate(nominal: f64, inflation: f64) -> f64 {
    (1.0 + nominal) / (1.0 + inflation) - 1.0
}

pub fn future_value(amount: f64, rate: f64, periods: f64) -> f64 {
    amount * (1.0 + rate).powf(periods)
}

pub fn present_value(amount: f64, rate: f64, periods: f64) -> f64 {
    amount / (1.0 + rate).powf(periods)
}

pub fn annuity_future_value_factor(rate: f64, periods: f64) -> f64 {
    if rate.abs() < 1e-12 {
        return periods;
    }
    ((1.0 + rate).powf(periods) - 1.0) / rate
}
