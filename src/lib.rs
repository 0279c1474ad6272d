//! # rp-digest
//!
//! Daily QA launch digest bot: reads nightly launch results from a
//! ReportPortal instance and posts a summary to a Telegram chat.
//!
//! ## What a cycle does
//!
//! 1. Exchange stored credentials for a bearer token
//! 2. Fetch recent launches for the regression and cross-platform suites
//! 3. Pick the most recent qualifying launch per tracked version line and
//!    per cross-platform branch/commit pair
//! 4. Collect the issue-tracker links of each reported launch's defects
//! 5. Render fixed-field blocks, pack them under the chat message cap and
//!    deliver
//!
//! Cycles run on a daily schedule and on demand via the `/report` chat
//! command; both paths share one [`orchestrator::Reporter`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use rp_digest::config::Config;
//! use rp_digest::orchestrator::Reporter;
//! use rp_digest::portal::PortalClient;
//! use rp_digest::telegram::TelegramSink;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let portal = PortalClient::new(&config.portal)?;
//!     let sink = TelegramSink::new(&config.telegram, config.retry.clone())?;
//!     let reporter = Reporter::new(config.clone(), portal, sink);
//!     reporter.run_report_cycle(config.telegram.chat_id).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Chat command listener
pub mod bot;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Report cycle orchestration
pub mod orchestrator;
/// ReportPortal HTTP client
pub mod portal;
/// Digest rendering and message packing
pub mod report;
/// Retry logic with exponential backoff
pub mod retry;
/// Daily report scheduling
pub mod scheduler;
/// Chat delivery boundary
pub mod telegram;
/// Wire and domain types
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
