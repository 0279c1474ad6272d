//! Launch queries and per-suite selection rules
//!
//! The fetcher issues a single page request per cycle (newest launches
//! first, bounded by the suite's lookback window) and reduces the page to
//! the launches worth reporting. Selection never trusts the server-side
//! sort order: recency is always decided by comparing start times.

use super::PortalClient;
use crate::config::{ReportConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::with_retry;
use crate::types::{
    ATTR_BRANCH, ATTR_BRANCH_NAME, ATTR_COMMIT_HASH, ATTR_DATABASE, ATTR_DB_TYPE,
    ATTR_FULL_VERSION, ATTR_OS, ATTR_RELAUNCH, ATTR_VERSION, Launch, LaunchPage, LaunchStatus,
    ReportedLaunch, ResolvedMeta, Suite,
};
use chrono::Utc;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// Page size of the launch query; the service caps at 100
const PAGE_SIZE: u32 = 100;

/// Sort order requested from the service (informational only; selection
/// re-compares start times regardless)
const SORT_NEWEST_FIRST: &str = "startTime,number,DESC";

impl Suite {
    fn project<'a>(&self, report: &'a ReportConfig) -> &'a str {
        match self {
            Suite::Primary => &report.primary_project,
            Suite::CrossPlatform => &report.secondary_project,
        }
    }

    fn lookback(&self, report: &ReportConfig) -> std::time::Duration {
        match self {
            Suite::Primary => report.primary_lookback,
            Suite::CrossPlatform => report.secondary_lookback,
        }
    }
}

impl PortalClient {
    /// Fetch recent launches for a suite and apply its selection rules
    ///
    /// An endpoint returning zero content is not an error; it yields an
    /// empty result. Network and HTTP failures propagate after retries.
    pub async fn fetch_launches(
        &self,
        token: &str,
        suite: Suite,
        report: &ReportConfig,
        retry: &RetryConfig,
    ) -> Result<Vec<ReportedLaunch>> {
        let page = with_retry(retry, || self.request_launch_page(token, suite, report)).await?;
        tracing::debug!(
            suite = ?suite,
            launches = page.content.len(),
            "launch page fetched"
        );

        let selected = match suite {
            Suite::Primary => select_primary(page.content, &report.tracked_prefixes),
            Suite::CrossPlatform => select_cross_platform(page.content),
        };
        tracing::info!(suite = ?suite, selected = selected.len(), "launch selection done");
        Ok(selected)
    }

    async fn request_launch_page(
        &self,
        token: &str,
        suite: Suite,
        report: &ReportConfig,
    ) -> Result<LaunchPage> {
        let project = suite.project(report);
        let lookback = suite.lookback(report);
        let since = Utc::now()
            - chrono::Duration::from_std(lookback)
                .map_err(|e| Error::config(format!("lookback window out of range: {e}")))?;

        let url = self.endpoint(&format!("api/v1/{project}/launch"))?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .query(&[
                ("ids", String::new()),
                ("page.page", "1".to_string()),
                ("page.size", PAGE_SIZE.to_string()),
                ("page.sort", SORT_NEWEST_FIRST.to_string()),
                (
                    "filter.gt.startTime",
                    since.timestamp_millis().to_string(),
                ),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch(format!(
                "launch endpoint for {project} returned HTTP {}",
                status.as_u16()
            )));
        }
        Ok(response.json().await?)
    }
}

/// Primary-suite selection: qualifying launches bucketed by tracked version
/// prefix, keeping the strictly-latest launch per bucket
///
/// A launch qualifies only if it is not `IN_PROGRESS`, carries a
/// `FullVersion` starting with a tracked prefix, `Re-launch == "true"` and
/// `Db type == "postgres"`. The result is ordered like `prefixes`, so at
/// most one launch per tracked version line, newest line first.
pub fn select_primary(launches: Vec<Launch>, prefixes: &[String]) -> Vec<ReportedLaunch> {
    let mut best: Vec<Option<ReportedLaunch>> = prefixes.iter().map(|_| None).collect();

    for launch in launches {
        if launch.status == LaunchStatus::InProgress {
            continue;
        }
        let Some(full_version) = launch.attribute(ATTR_FULL_VERSION) else {
            continue;
        };
        let Some(bucket) = prefixes.iter().position(|p| full_version.starts_with(p.as_str()))
        else {
            continue;
        };
        if launch.attribute(ATTR_RELAUNCH) != Some("true") {
            continue;
        }
        if launch.attribute(ATTR_DB_TYPE) != Some("postgres") {
            continue;
        }

        let newer = best[bucket]
            .as_ref()
            .is_none_or(|current| launch.start_time > current.launch.start_time);
        if newer {
            let meta = ResolvedMeta {
                version: Some(full_version.to_owned()),
                branch: launch.attribute(ATTR_BRANCH_NAME).map(str::to_owned),
                commit: launch.attribute(ATTR_COMMIT_HASH).map(str::to_owned),
                tracked_prefix: Some(prefixes[bucket].clone()),
            };
            best[bucket] = Some(ReportedLaunch { launch, meta });
        }
    }

    best.into_iter().flatten().collect()
}

/// Cross-platform selection: qualifying launches grouped by (branch, commit),
/// keeping the strictly-latest launch per group
///
/// A launch qualifies only if it is not `IN_PROGRESS`, ran on Linux against
/// PostgreSQL, and carries non-empty `Branch` and `Commit hash` attributes.
/// The result count is unbounded: one launch per distinct pair seen in the
/// window, in deterministic (branch, commit) order.
pub fn select_cross_platform(launches: Vec<Launch>) -> Vec<ReportedLaunch> {
    let mut best: BTreeMap<(String, String), ReportedLaunch> = BTreeMap::new();

    for launch in launches {
        if launch.status == LaunchStatus::InProgress {
            continue;
        }
        if launch.attribute(ATTR_OS) != Some("Linux") {
            continue;
        }
        if launch.attribute(ATTR_DATABASE) != Some("PostgreSQL") {
            continue;
        }
        let Some(branch) = launch.attribute(ATTR_BRANCH).filter(|b| !b.is_empty()) else {
            continue;
        };
        let Some(commit) = launch.attribute(ATTR_COMMIT_HASH).filter(|c| !c.is_empty()) else {
            continue;
        };

        let key = (branch.to_owned(), commit.to_owned());
        let meta = ResolvedMeta {
            version: launch.attribute(ATTR_VERSION).map(str::to_owned),
            branch: Some(key.0.clone()),
            commit: Some(key.1.clone()),
            tracked_prefix: None,
        };
        match best.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(ReportedLaunch { launch, meta });
            }
            Entry::Occupied(mut slot) => {
                if launch.start_time > slot.get().launch.start_time {
                    slot.insert(ReportedLaunch { launch, meta });
                }
            }
        }
    }

    best.into_values().collect()
}
