//! Daily report scheduling
//!
//! Computes the delay until the next configured local report time and sleeps
//! until then, running one report cycle per wake-up. The delay is recomputed
//! from the wall clock after every cycle, so a long cycle or a suspended host
//! drifts back onto the schedule instead of accumulating offset.

use crate::orchestrator::Reporter;
use crate::telegram::MessageSink;
use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Fires one report cycle per day at the configured local time
pub struct DailyScheduler<S: MessageSink> {
    reporter: Arc<Reporter<S>>,
    report_time: NaiveTime,
    timezone: Tz,
}

impl<S: MessageSink> DailyScheduler<S> {
    /// Create a scheduler driving `reporter` at `report_time` in `timezone`
    pub fn new(reporter: Arc<Reporter<S>>, report_time: NaiveTime, timezone: Tz) -> Self {
        Self {
            reporter,
            report_time,
            timezone,
        }
    }

    /// Run daily cycles until `shutdown` fires
    ///
    /// A failed cycle is logged and the scheduler arms the next day; one bad
    /// morning never stops the digest.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            report_time = %self.report_time,
            timezone = %self.timezone,
            "daily scheduler started"
        );

        loop {
            let delay = next_run_delay(Utc::now(), self.report_time, self.timezone);
            info!(seconds = delay.as_secs(), "next daily report armed");

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("daily scheduler shutting down");
                    break;
                }
                _ = sleep(delay) => {
                    let chat_id = self.reporter.default_chat_id();
                    if let Err(e) = self.reporter.run_report_cycle(chat_id).await {
                        error!(error = %e, "scheduled report cycle failed");
                    }
                }
            }
        }
    }
}

/// Delay from `now` until the next occurrence of `report_time` in `timezone`
///
/// A local time swallowed by a DST gap is skipped to the next valid day; an
/// ambiguous time resolves to its earlier occurrence.
pub fn next_run_delay(now: DateTime<Utc>, report_time: NaiveTime, timezone: Tz) -> Duration {
    use chrono::TimeZone;

    let local_now = now.with_timezone(&timezone);
    let mut date = local_now.date_naive();
    if local_now.time() >= report_time {
        date = date.succ_opt().unwrap_or(date);
    }

    loop {
        let candidate = timezone
            .from_local_datetime(&date.and_time(report_time))
            .earliest();
        match candidate {
            Some(candidate) if candidate > local_now => {
                return (candidate.with_timezone(&Utc) - now)
                    .to_std()
                    .unwrap_or(Duration::ZERO);
            }
            _ => match date.succ_opt() {
                Some(next) => date = next,
                // Calendar overflow; fall back to a plain day
                None => return Duration::from_secs(24 * 60 * 60),
            },
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn nine() -> NaiveTime {
        NaiveTime::from_hms_opt(9, 0, 0).unwrap()
    }

    #[test]
    fn before_report_time_waits_until_today() {
        // 06:00 Moscow is 03:00 UTC
        let now = Utc.with_ymd_and_hms(2025, 3, 11, 3, 0, 0).unwrap();
        let delay = next_run_delay(now, nine(), chrono_tz::Europe::Moscow);
        assert_eq!(delay, Duration::from_secs(3 * 3600));
    }

    #[test]
    fn after_report_time_waits_until_tomorrow() {
        // 10:30 Moscow is 07:30 UTC
        let now = Utc.with_ymd_and_hms(2025, 3, 11, 7, 30, 0).unwrap();
        let delay = next_run_delay(now, nine(), chrono_tz::Europe::Moscow);
        assert_eq!(delay, Duration::from_secs(22 * 3600 + 30 * 60));
    }

    #[test]
    fn exactly_at_report_time_arms_the_next_day() {
        // 09:00 Moscow is 06:00 UTC
        let now = Utc.with_ymd_and_hms(2025, 3, 11, 6, 0, 0).unwrap();
        let delay = next_run_delay(now, nine(), chrono_tz::Europe::Moscow);
        assert_eq!(delay, Duration::from_secs(24 * 3600));
    }

    #[test]
    fn dst_gap_skips_to_the_next_valid_day() {
        // Berlin, 2025-03-30: 02:30 local does not exist (clocks jump to 03:00)
        let gap_time = NaiveTime::from_hms_opt(2, 30, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 3, 29, 12, 0, 0).unwrap();
        let delay = next_run_delay(now, gap_time, chrono_tz::Europe::Berlin);
        // Next valid 02:30 local is on the 31st (02:30 CEST = 00:30 UTC)
        let expected_fire = Utc.with_ymd_and_hms(2025, 3, 31, 0, 30, 0).unwrap();
        assert_eq!(delay, (expected_fire - now).to_std().unwrap());
    }

    #[test]
    fn delay_is_always_under_two_days() {
        let now = Utc.with_ymd_and_hms(2025, 7, 1, 23, 59, 59).unwrap();
        let delay = next_run_delay(now, nine(), chrono_tz::Europe::Moscow);
        assert!(delay <= Duration::from_secs(48 * 3600));
        assert!(delay > Duration::ZERO);
    }
}
