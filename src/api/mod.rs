//! Management-API gating: path-pattern risk classification, path-parameter
//! substitution, and a retrying Bearer-authenticated HTTP client.

mod client;
mod logs;
mod manager;

pub use client::ApiClient;
pub use logs::{build_where_clause, retrieve_logs, LogFilter, LogQuery};
pub use manager::{ApiManager, ApiOutcome};
