//! Retirement savings projection: a deterministic month-by-month engine,
//! the HTTP API around it and an optional narrative advice layer.

pub mod advice;
pub mod api;
pub mod core;
