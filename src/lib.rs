//! apiforge - HTTP API test toolkit
//!
//! Issues HTTP requests against a service under test, asserts on JSON
//! responses through path-query expressions, and stands in for upstream
//! dependencies with an embedded mock server.
//!
//! # Features
//!
//! - **Mock Server**: first-match-wins rule matching by method, exact
//!   path, query-parameter and body subsets; latency simulation
//! - **Query Helper**: typed, null-tolerant JSON path access with
//!   filter/sort/group/projection operations
//! - **Assertion Chain**: fluent fail-fast response verification
//! - **API Client**: reqwest wrapper capturing status, headers, body and
//!   timing into one snapshot
//! - **Load Metrics**: concurrent probe fan-out with latency percentiles
//!
//! # Example
//!
//! ```no_run
//! use apiforge::{ApiClient, MockResponse, MockServer};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> apiforge::Result<()> {
//!     let mut server = MockServer::new("127.0.0.1", 0);
//!     server.stub(
//!         "GET",
//!         "/api/users",
//!         MockResponse::json(200, json!({"code": 0, "items": [{"id": 1}]})),
//!     );
//!     server.start().await?;
//!
//!     let client = ApiClient::new(server.base_url())?;
//!     client
//!         .get("/api/users")
//!         .await?
//!         .assert_chain()
//!         .assert_status_code(200)?
//!         .assert_json_path("$.code", json!(0))?
//!         .assert_path_length("$.items", 1)?;
//!
//!     server.stop().await
//! }
//! ```

pub mod assertion;
pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod query;
pub mod report;
pub mod rule;
pub mod server;

pub use assertion::{AssertionChain, ValueKind};
pub use client::{ApiClient, ApiSnapshot};
pub use config::Settings;
pub use error::{Error, Result};
pub use metrics::{run_load, LoadReport, Outcome};
pub use query::QueryHelper;
pub use report::{JsonRunStore, ReportRenderer, RunStatus, RunStore, TestRunRecord};
pub use rule::{Delay, MockResponse, MockRule, RuleSet};
pub use server::MockServer;
