//! Wire types for the ReportPortal API and selection-time annotations
//!
//! Launch attributes are schema-free key/value pairs; presence and value vary
//! by suite, so extraction is always explicit lookup-with-default. Fields the
//! bot derives during selection (resolved version, branch, commit) live in a
//! separate [`ResolvedMeta`] carried next to the raw record — the wire record
//! is never mutated in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attribute key carrying the full build version on primary-suite launches
pub const ATTR_FULL_VERSION: &str = "FullVersion";
/// Attribute key carrying the short version on cross-platform launches
pub const ATTR_VERSION: &str = "Version";
/// Attribute key marking a launch as a re-run of a failed set
pub const ATTR_RELAUNCH: &str = "Re-launch";
/// Attribute key carrying the database backend of a primary-suite launch
pub const ATTR_DB_TYPE: &str = "Db type";
/// Attribute key carrying the branch on primary-suite launches
pub const ATTR_BRANCH_NAME: &str = "Branch name";
/// Attribute key carrying the branch on cross-platform launches
pub const ATTR_BRANCH: &str = "Branch";
/// Attribute key carrying the commit hash
pub const ATTR_COMMIT_HASH: &str = "Commit hash";
/// Attribute key carrying the operating system of a cross-platform launch
pub const ATTR_OS: &str = "OS";
/// Attribute key carrying the database of a cross-platform launch
pub const ATTR_DATABASE: &str = "Database";

/// Execution status of a launch
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LaunchStatus {
    /// Still executing; never reported
    InProgress,
    /// All tests passed
    Passed,
    /// At least one test failed
    Failed,
    /// Stopped manually
    Stopped,
    /// Aborted by the service
    Interrupted,
    /// Any status this bot does not know about
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for LaunchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LaunchStatus::InProgress => "IN_PROGRESS",
            LaunchStatus::Passed => "PASSED",
            LaunchStatus::Failed => "FAILED",
            LaunchStatus::Stopped => "STOPPED",
            LaunchStatus::Interrupted => "INTERRUPTED",
            LaunchStatus::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// One key/value attribute attached to a launch
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LaunchAttribute {
    /// Attribute key; the service allows key-less system attributes
    #[serde(default)]
    pub key: Option<String>,
    /// Attribute value
    #[serde(default)]
    pub value: String,
}

/// Test execution counters of a launch
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct ExecutionStats {
    /// Total number of test items
    #[serde(default)]
    pub total: u64,
    /// Number of passed test items
    #[serde(default)]
    pub passed: u64,
    /// Number of failed test items
    #[serde(default)]
    pub failed: u64,
    /// Number of skipped test items
    #[serde(default)]
    pub skipped: u64,
}

/// Statistics envelope as returned by the launch endpoint
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct LaunchStatistics {
    /// Execution counters
    #[serde(default)]
    pub executions: ExecutionStats,
}

/// One test-suite execution run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Launch {
    /// Run identifier, unique per project
    pub id: u64,
    /// Run name
    #[serde(default)]
    pub name: String,
    /// Schema-free key/value attributes
    #[serde(default)]
    pub attributes: Vec<LaunchAttribute>,
    /// Execution counters
    #[serde(default)]
    pub statistics: LaunchStatistics,
    /// Execution status
    pub status: LaunchStatus,
    /// Start time with timezone, used for recency ordering
    pub start_time: DateTime<Utc>,
}

impl Launch {
    /// Look up an attribute value by key
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.key.as_deref() == Some(key))
            .map(|a| a.value.as_str())
    }
}

/// Response envelope of the launch endpoint
#[derive(Clone, Debug, Default, Deserialize)]
pub struct LaunchPage {
    /// Launches on this page; an absent or empty collection is not an error
    #[serde(default)]
    pub content: Vec<Launch>,
}

/// Pagination block of a paged response
#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct PageMeta {
    /// Current page number (1-based)
    #[serde(default, rename = "number")]
    pub number: u32,
    /// Total number of pages available
    #[serde(default, rename = "totalPages")]
    pub total_pages: u32,
}

/// Issue block of a defect-type test item
#[derive(Clone, Debug, Deserialize)]
pub struct ItemIssue {
    /// Issue type locator, e.g. `pb001` for a product bug
    #[serde(rename = "issueType")]
    pub issue_type: String,
    /// Free-text analyst comment; defect links are extracted from here
    #[serde(default)]
    pub comment: Option<String>,
}

/// One test item returned by the item endpoint
#[derive(Clone, Debug, Deserialize)]
pub struct TestItem {
    /// Item identifier
    pub id: u64,
    /// Triage information; absent for items without an assigned issue
    #[serde(default)]
    pub issue: Option<ItemIssue>,
}

/// Response envelope of the item endpoint
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ItemPage {
    /// Items on this page
    #[serde(default)]
    pub content: Vec<TestItem>,
    /// Pagination block
    #[serde(default)]
    pub page: PageMeta,
}

/// Selection-time annotations resolved from launch attributes
///
/// Produced by the launch fetcher, consumed by the formatter. These are
/// transient fields, not server-provided data; keeping them out of [`Launch`]
/// prevents confusing them with same-named wire attributes.
#[derive(Clone, Debug, Default)]
pub struct ResolvedMeta {
    /// Resolved version string
    pub version: Option<String>,
    /// Resolved branch
    pub branch: Option<String>,
    /// Resolved commit hash
    pub commit: Option<String>,
    /// Tracked version prefix the launch was bucketed under; set only for
    /// primary-suite launches
    pub tracked_prefix: Option<String>,
}

/// A launch retained for reporting, paired with its resolved metadata
#[derive(Clone, Debug)]
pub struct ReportedLaunch {
    /// The raw wire record
    pub launch: Launch,
    /// Annotations resolved during selection
    pub meta: ResolvedMeta,
}

/// Which suite a launch query targets
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Suite {
    /// Nightly regression suite, bucketed by tracked version prefix
    Primary,
    /// Cross-platform suite, bucketed by (branch, commit)
    CrossPlatform,
}
