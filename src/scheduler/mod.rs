use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveTime, TimeZone};
use std::future::Future;
use tokio::time::{Duration, sleep};
use tracing::{error, info};

const POLL_SECONDS: u64 = 30;

/// Runs `task` once a day at the time `ingest_time` yields. The time is
/// re-read on every poll, so a changed `ingest_time` applies without a restart.
pub async fn run_daily_scheduler<S, F, Fut>(mut ingest_time: S, mut task: F) -> Result<()>
where
    S: FnMut() -> Result<NaiveTime>,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let poll = Duration::from_secs(POLL_SECONDS);
    let mut announced: Option<NaiveTime> = None;

    loop {
        let at = match ingest_time() {
            Ok(value) => value,
            Err(error) => {
                error!(error = %error, "failed to load ingest schedule");
                sleep(poll).await;
                continue;
            }
        };

        let now = Local::now();
        let next = next_run_after(&now, at).context("No local time matches ingest_time");
        let wait = match next.and_then(|next| {
            (next - now)
                .to_std()
                .context("Next ingest time is in the past")
        }) {
            Ok(value) => value,
            Err(error) => {
                error!(error = %error, ingest_time = %at, "cannot schedule ingest");
                sleep(poll).await;
                continue;
            }
        };

        if announced != Some(at) {
            info!(
                ingest_time = %at.format("%H:%M"),
                seconds = wait.as_secs(),
                "next ingest scheduled"
            );
            announced = Some(at);
        }

        if wait > poll {
            sleep(poll).await;
            continue;
        }

        sleep(wait).await;

        if let Err(error) = task().await {
            error!(error = %error, "scheduled ingest failed");
        }

        sleep(Duration::from_secs(1)).await;
    }
}

/// First instant strictly after `now` whose wall-clock time is `at`. A time
/// skipped by a DST jump moves to the next day; a repeated one takes the
/// earlier instant.
pub fn next_run_after<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> Option<DateTime<Tz>> {
    let today = now.date_naive();

    (0..=2)
        .map(|offset| today + ChronoDuration::days(offset))
        .filter_map(|day| now.timezone().from_local_datetime(&day.and_time(at)).earliest())
        .find(|candidate| candidate > now)
}

#[cfg(test)]
mod tests {
    use super::next_run_after;
    use chrono::{NaiveTime, TimeZone, Utc};

    fn time(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time")
    }

    #[test]
    fn runs_later_today_when_time_is_ahead() {
        let now = Utc.with_ymd_and_hms(2024, 1, 9, 8, 0, 0).single().expect("now");
        let next = next_run_after(&now, time(9, 5)).expect("next run");

        assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 9, 9, 5, 0).single().expect("next"));
    }

    #[test]
    fn rolls_over_to_tomorrow_once_time_has_passed() {
        let now = Utc.with_ymd_and_hms(2024, 1, 9, 9, 5, 0).single().expect("now");
        let next = next_run_after(&now, time(9, 5)).expect("next run");

        assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 10, 9, 5, 0).single().expect("next"));
    }

    #[test]
    fn crosses_month_boundaries() {
        let now = Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 0).single().expect("now");
        let next = next_run_after(&now, time(0, 30)).expect("next run");

        assert_eq!(next, Utc.with_ymd_and_hms(2024, 2, 1, 0, 30, 0).single().expect("next"));
    }
}
