//! GitHub API integration: typed client, pagination, log parsing, and the
//! review-thread resolution fallback.

pub mod client;
pub mod logs;
pub mod pagination;
pub mod threads;
pub mod types;

pub use client::{DEFAULT_API_ROOT, GitHubClient};
pub use threads::ThreadResolution;
