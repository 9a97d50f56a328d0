//! # stepwise
//!
//! Composable, step-based assertions for HTTP request/response testing.
//!
//! A [`Step`] is a single, possibly-failing unit of test action. Steps
//! compose into [`Steps`] sequences that run strictly in order and stop at
//! the first failure, reporting how far execution got. [`HttpCall`] wraps
//! one HTTP exchange and exposes assertion steps over status, headers, and
//! body content.
//!
//! ```
//! use stepwise::{expect_deep_equal, expect_diff_equal, steps};
//!
//! steps![
//!     expect_deep_equal(2 + 2, 4),
//!     expect_diff_equal("same", "same"),
//! ]
//! .test();
//! ```
//!
//! HTTP assertions run against a live server (or any injected transport):
//!
//! ```no_run
//! use stepwise::HttpCall;
//!
//! let call = HttpCall::new();
//! stepwise::steps![
//!     call.new_request("GET", "http://localhost:8000/health", None),
//!     call.response_status_equals(200),
//!     call.response_body_contains("ok"),
//! ]
//! .test();
//! ```

pub mod assert;
pub mod diff;
pub mod error;
pub mod http;
pub mod step;

pub use assert::{
    any_error, expect_deep_equal, expect_diff_equal, expect_error, expect_none,
    expect_pretty_equal,
};
pub use error::StepError;
pub use http::{
    DefaultValidator, Headers, HttpCall, HttpClient, Request, ReqwestClient, Response,
    SchemaValidator, Validation,
};
pub use step::{
    BoxStep, Harness, LazySteps, NamedStep, PanicHarness, RunResult, Step, StepFn, StepProducer,
    Steps, step,
};
