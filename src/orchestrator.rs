//! Report cycle orchestration
//!
//! One cycle is a single sequential flow: acquire token, fetch launches per
//! suite, fetch defects per reported launch, format, pack, deliver. Failure
//! scoping follows the error taxonomy: auth or launch-fetch failures abort
//! the cycle (with a best-effort explanation sent to the chat), a defect
//! failure only marks that launch's links as unknown, and the reader always
//! receives either data or an explicit "unavailable, reason" line.

use crate::config::Config;
use crate::error::Result;
use crate::portal::PortalClient;
use crate::report::{DefectSummary, assemble_report, format_defect_blocks, format_launch};
use crate::telegram::{MESSAGE_CHAR_LIMIT, MessageSink};
use crate::types::{ReportedLaunch, Suite};
use tracing::{error, info, warn};

/// Suite label used for cross-platform launch blocks
const CROSS_PLATFORM_LABEL: &str = "Cross-platform";

/// Runs report cycles against one portal and one chat transport
pub struct Reporter<S: MessageSink> {
    config: Config,
    portal: PortalClient,
    sink: S,
}

impl<S: MessageSink> Reporter<S> {
    /// Bundle the collaborators of a report cycle
    pub fn new(config: Config, portal: PortalClient, sink: S) -> Self {
        Self {
            config,
            portal,
            sink,
        }
    }

    /// The chat the scheduled digest goes to
    pub fn default_chat_id(&self) -> i64 {
        self.config.telegram.chat_id
    }

    /// Run one full report cycle against `chat_id`
    ///
    /// Repeated calls produce independent deliveries; nothing is cached or
    /// shared between cycles.
    pub async fn run_report_cycle(&self, chat_id: i64) -> Result<()> {
        info!(chat_id, "report cycle started");
        let report = &self.config.report;
        let retry = &self.config.retry;

        let token = match self.portal.acquire_token(retry).await {
            Ok(token) => token,
            Err(e) => {
                error!(error = %e, "token acquisition failed");
                self.best_effort_send(chat_id, &format!("Report unavailable, reason: {e}"))
                    .await;
                return Err(e);
            }
        };

        let primary = match self
            .portal
            .fetch_launches(&token, Suite::Primary, report, retry)
            .await
        {
            Ok(launches) => launches,
            Err(e) => {
                error!(error = %e, "primary launch fetch failed");
                self.best_effort_send(
                    chat_id,
                    &format!("Regression launch data unavailable, reason: {e}"),
                )
                .await;
                return Err(e);
            }
        };

        let secondary = match self
            .portal
            .fetch_launches(&token, Suite::CrossPlatform, report, retry)
            .await
        {
            Ok(launches) => launches,
            Err(e) => {
                error!(error = %e, "cross-platform launch fetch failed");
                self.best_effort_send(
                    chat_id,
                    &format!("Cross-platform launch data unavailable, reason: {e}"),
                )
                .await;
                return Err(e);
            }
        };

        let mut blocks = Vec::new();

        // One block per tracked version line, newest first; absent lines get
        // an explicit "no data" block instead of silence
        for prefix in &report.tracked_prefixes {
            let label = format!("Regression {prefix}");
            // Selection already decided the bucket; match on its annotation
            // rather than re-deriving it from the version string
            let found = primary
                .iter()
                .find(|r| r.meta.tracked_prefix.as_deref() == Some(prefix.as_str()));
            match found {
                Some(reported) => {
                    blocks.extend(
                        self.launch_blocks(&token, &label, reported, &report.primary_project)
                            .await,
                    );
                }
                None => blocks.push(format_launch(
                    &label,
                    None,
                    self.portal.base_url(),
                    &report.primary_project,
                )),
            }
        }

        if secondary.is_empty() {
            blocks.push(format_launch(
                CROSS_PLATFORM_LABEL,
                None,
                self.portal.base_url(),
                &report.secondary_project,
            ));
        } else {
            for reported in &secondary {
                blocks.extend(
                    self.launch_blocks(
                        &token,
                        CROSS_PLATFORM_LABEL,
                        reported,
                        &report.secondary_project,
                    )
                    .await,
                );
            }
        }

        let versions: Vec<&str> = primary
            .iter()
            .chain(secondary.iter())
            .filter_map(|r| r.meta.version.as_deref())
            .collect();
        if !versions.is_empty() {
            blocks.push(format!(
                "Digest covers the latest launches of: {}",
                versions.join(", ")
            ));
        }

        let messages = assemble_report(&blocks, MESSAGE_CHAR_LIMIT);
        for text in &messages {
            if let Err(e) = self.sink.send_message(chat_id, text).await {
                if e.to_string().contains("chat not found") {
                    // A missing chat is a configuration problem, not a blip
                    error!(
                        chat_id,
                        error = %e,
                        "chat rejected the message; check TELEGRAM_CHAT_ID"
                    );
                } else {
                    error!(chat_id, error = %e, "message delivery failed");
                }
                return Err(e);
            }
        }

        info!(chat_id, messages = messages.len(), "report cycle completed");
        Ok(())
    }

    /// Format one launch as packable blocks: the field block followed by its
    /// defect blocks, each bounded by the message cap
    ///
    /// A failed defect lookup is scoped here: the defect block states the
    /// links are unknown and the cycle continues with the remaining launches.
    async fn launch_blocks(
        &self,
        token: &str,
        label: &str,
        reported: &ReportedLaunch,
        project: &str,
    ) -> Vec<String> {
        let summary = match self
            .portal
            .fetch_defects(token, project, reported.launch.id, &self.config.retry)
            .await
        {
            Ok(links) => DefectSummary::Links(links),
            Err(e) => {
                warn!(
                    launch_id = reported.launch.id,
                    error = %e,
                    "defect lookup failed, reporting links as unknown"
                );
                DefectSummary::Unavailable(e.to_string())
            }
        };

        let mut blocks = vec![format_launch(
            label,
            Some(reported),
            self.portal.base_url(),
            project,
        )];
        blocks.extend(format_defect_blocks(&summary, MESSAGE_CHAR_LIMIT));
        blocks
    }

    async fn best_effort_send(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.sink.send_message(chat_id, text).await {
            warn!(chat_id, error = %e, "could not deliver the error notice");
        }
    }
}
