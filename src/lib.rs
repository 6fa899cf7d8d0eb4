#![forbid(unsafe_code)]
//! specpilot: process orchestration for an external API contract-testing engine
//!
//! The engine (Specmatic or a compatible tool) does the actual contract testing. This crate stages specs for it,
//! runs it under a time limit, attributes the report files it writes to the run that produced them, and keeps
//! long-running mock servers in a port-keyed registry.
//!
//! ## Layout
//!
//! - [`orchestrator`]: the facade upper layers call (`run_test`, `manage_mock`, `check_compatibility`)
//! - [`staging`], [`executor`], [`discovery`]: the test-run pipeline
//! - [`mock`]: the mock-server registry
//! - [`compat`]: backward-compatibility checks
//! - [`engine`], [`process`]: the engine command surface and process handles
//! - [`cli`], [`serve`]: the two front ends
//!
//! Report vocabulary lives in `specpilot_core`; report parsing in `specpilot_report`.
//!
//! ## Panic Policy
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` module enforces
//!   `#![deny(clippy::unwrap_used)]`.
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.

pub mod cli;
pub mod compat;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod executor;
pub mod mock;
pub mod orchestrator;
pub mod process;
pub mod serve;
pub mod staging;

pub use config::{PilotConfig, ReportLayout};
pub use error::{PilotError, PilotResult};
pub use orchestrator::{Capability, MockCommand, MockOpResult, Orchestrator, TestRequest, TestRunReport};
pub use specpilot_core::{CompatibilityReport, SpecFormat, TestSuiteReport};
