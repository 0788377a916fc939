//! Error model shared by the `AppHost` crates.
//!
//! - RFC 9457 Problem Details (`Problem`)
//! - Static error catalog entries (`ErrDef`)
//!
//! With the `axum` feature a `Problem` can be returned directly from a handler.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod catalog;
pub mod problem;

pub use catalog::ErrDef;
pub use problem::{APPLICATION_PROBLEM_JSON, Problem};

/// Attach the request path and an optional trace id to a `Problem`.
pub fn finalize(mut p: Problem, instance: &str, trace_id: Option<String>) -> Problem {
    p = p.with_instance(instance);
    if let Some(tid) = trace_id {
        p = p.with_trace_id(tid);
    }
    p
}
