//! hubmark exports GitHub issues, pull requests, and Actions runs as
//! Markdown documents.
//!
//! The entry point is [`Exporter::run_export`]: build a [`GitHubClient`]
//! over an [`http::HttpTransport`], wrap it in an [`Exporter`], and hand it
//! an [`ExportRequest`] plus a cancellation token. Requests carry a target,
//! an optional marker-range selection, and an optional export profile;
//! results are either rendered Markdown with advisory warnings or a typed
//! failure from a closed error taxonomy.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use hubmark::http::ReqwestTransport;
//! use hubmark::{ExportRequest, Exporter, GitHubClient, Target};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() {
//! let client = GitHubClient::new(Arc::new(ReqwestTransport::default()), None);
//! let exporter = Exporter::new(client);
//! let request = ExportRequest {
//!     request_id: "demo".to_string(),
//!     target: Target::Issue {
//!         owner: "rust-lang".to_string(),
//!         repo: "rust".to_string(),
//!         number: 1,
//!     },
//!     selection: None,
//!     profile: None,
//! };
//! match exporter.run_export(&request, &CancellationToken::new()).await {
//!     Ok(success) => println!("{}", success.markdown),
//!     Err(failure) => eprintln!("{}: {}", failure.code.as_str(), failure.message),
//! }
//! # }
//! ```

pub mod cache;
pub mod error;
pub mod executor;
pub mod github;
pub mod http;
pub mod pipeline;
pub mod plan;
pub mod profile;
pub mod render;
pub mod timeline;

pub use error::{ErrorCode, ExportError, ExportFailure};
pub use github::{DEFAULT_API_ROOT, GitHubClient};
pub use pipeline::{ExportRequest, ExportSuccess, Exporter, Target};
pub use profile::{ActionsRunProfile, ExportProfile, IssueProfile, PullProfile};
pub use timeline::{Marker, MarkerRange, MarkerType};
