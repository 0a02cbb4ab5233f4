//! Weekly promotional template broadcast.

use super::Gateway;
use chrono::{
    DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Weekday,
};
use relay_core::{error::RelayError, message::TemplateRef};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Result of one broadcast run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    pub date: NaiveDate,
    pub recipients: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// The first `weekday` at `time` strictly after `now`.
pub fn next_occurrence(now: NaiveDateTime, weekday: Weekday, time: NaiveTime) -> NaiveDateTime {
    let today = now.date();
    let days_ahead = (i64::from(weekday.num_days_from_monday())
        - i64::from(today.weekday().num_days_from_monday()))
    .rem_euclid(7);
    let candidate = (today + Duration::days(days_ahead)).and_time(time);
    if candidate > now {
        candidate
    } else {
        candidate + Duration::days(7)
    }
}

/// How long to sleep from `now` until the wall-clock time `next` in `now`'s zone.
///
/// Returns `None` when `next` falls in a DST gap. An ambiguous time resolves
/// to its first occurrence. A target already past gives a zero wait.
fn wait_until<Tz: TimeZone>(now: &DateTime<Tz>, next: NaiveDateTime) -> Option<std::time::Duration> {
    let target = next.and_local_timezone(now.timezone()).earliest()?;
    Some(
        target
            .signed_duration_since(now.clone())
            .to_std()
            .unwrap_or_default(),
    )
}

impl Gateway {
    /// Background task: broadcast the promotion template once a week.
    pub(super) async fn promotion_loop(self: Arc<Self>, weekday: Weekday, time: NaiveTime) {
        info!(
            "promotion: loop started ({weekday} {} local, template {})",
            time.format("%H:%M"),
            self.promotion.template
        );

        let mut after = Local::now().naive_local();
        loop {
            let next = next_occurrence(after, weekday, time);
            let Some(wait) = wait_until(&Local::now(), next) else {
                warn!("promotion: {next} does not exist in local time, skipping");
                after = next;
                continue;
            };
            info!("promotion: next broadcast at {next}");
            tokio::time::sleep(wait).await;
            after = next.max(Local::now().naive_local());

            match self.broadcast_promotion(next.date()).await {
                Ok(Some(report)) => info!(
                    "promotion: {} done, {}/{} delivered",
                    report.date, report.delivered, report.recipients
                ),
                Ok(None) => {}
                Err(e) => error!("promotion: broadcast for {} failed: {e}", next.date()),
            }
        }
    }

    /// Send the promotion template to every customer, at most once per `date`.
    ///
    /// Returns `None` when `date` was already claimed. Per-recipient failures
    /// are counted and do not stop the run.
    pub async fn broadcast_promotion(
        &self,
        date: NaiveDate,
    ) -> Result<Option<BroadcastReport>, RelayError> {
        let template = TemplateRef {
            name: self.promotion.template.clone(),
            language: self.promotion.language.clone(),
        };

        // Load recipients first: a date claimed before an error is never retried.
        let customers = self.memory.list_customers().await?;
        if !self.memory.claim_broadcast(date, &template.name).await? {
            info!("promotion: already sent for {date}, skipping");
            return Ok(None);
        }

        info!(
            "promotion: sending {} to {} customer(s)",
            template.name,
            customers.len()
        );

        let mut report = BroadcastReport {
            date,
            recipients: customers.len(),
            delivered: 0,
            failed: 0,
        };
        for contact in &customers {
            let outcome = self.channel.send_template(contact, &template).await;
            if outcome.is_delivered() {
                report.delivered += 1;
            } else {
                warn!("promotion: {contact} not reached: {outcome}");
                report.failed += 1;
            }
        }

        self.memory
            .finish_broadcast(date, report.delivered as i64, report.failed as i64)
            .await?;
        Ok(Some(report))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use chrono::{FixedOffset, Utc};
    use relay_core::config::Config;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn promo_time() -> NaiveTime {
        NaiveTime::from_hms_opt(20, 59, 0).unwrap()
    }

    #[test]
    fn test_next_occurrence_later_this_week() {
        // 2026-10-20 is a Tuesday.
        let next = next_occurrence(at(2026, 10, 20, 9, 0), Weekday::Fri, promo_time());
        assert_eq!(next, at(2026, 10, 23, 20, 59));
    }

    #[test]
    fn test_next_occurrence_same_day_before_and_after() {
        let friday_morning = at(2026, 10, 23, 8, 0);
        assert_eq!(
            next_occurrence(friday_morning, Weekday::Fri, promo_time()),
            at(2026, 10, 23, 20, 59)
        );

        // Exactly at the slot is not "after now".
        let on_the_minute = at(2026, 10, 23, 20, 59);
        assert_eq!(
            next_occurrence(on_the_minute, Weekday::Fri, promo_time()),
            at(2026, 10, 30, 20, 59)
        );

        let friday_night = at(2026, 10, 23, 23, 30);
        assert_eq!(
            next_occurrence(friday_night, Weekday::Fri, promo_time()),
            at(2026, 10, 30, 20, 59)
        );
    }

    #[test]
    fn test_next_occurrence_wraps_week() {
        // Saturday to the following Friday; Sunday to Monday.
        assert_eq!(
            next_occurrence(at(2026, 10, 24, 12, 0), Weekday::Fri, promo_time()),
            at(2026, 10, 30, 20, 59)
        );
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        assert_eq!(
            next_occurrence(at(2026, 10, 25, 12, 0), Weekday::Mon, nine),
            at(2026, 10, 26, 9, 0)
        );
    }

    #[test]
    fn test_wait_until_resolves_in_zone() {
        let paris = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = paris
            .from_local_datetime(&at(2026, 10, 23, 20, 0))
            .single()
            .unwrap();
        assert_eq!(
            wait_until(&now, at(2026, 10, 23, 20, 59)),
            Some(std::time::Duration::from_secs(59 * 60))
        );

        // Same instant seen from UTC: the slot is 20:59 UTC, three hours later.
        let utc_now = now.with_timezone(&Utc);
        assert_eq!(
            wait_until(&utc_now, at(2026, 10, 23, 20, 59)),
            Some(std::time::Duration::from_secs(3 * 3600 - 60))
        );
    }

    #[test]
    fn test_wait_until_past_target_is_zero() {
        let now = Utc.from_utc_datetime(&at(2026, 10, 23, 21, 0));
        assert_eq!(
            wait_until(&now, at(2026, 10, 23, 20, 59)),
            Some(std::time::Duration::ZERO)
        );
    }

    async fn promo_harness(channel: MockChannel) -> Harness {
        let mut config = Config::default();
        config.promotion.enabled = true;
        config.promotion.template = "weekly_promo".into();
        config.promotion.language = "fr".into();
        Harness::with_config(MockProvider::replying("Ok."), channel, config).await
    }

    #[tokio::test]
    async fn test_broadcast_at_most_once_per_date() {
        let h = promo_harness(MockChannel::new()).await;
        for contact in ["alice", "bob"] {
            h.gateway.memory.register_customer(contact).await.unwrap();
        }
        let friday = NaiveDate::from_ymd_opt(2026, 10, 23).unwrap();

        let report = h.gateway.broadcast_promotion(friday).await.unwrap().unwrap();
        assert_eq!(report.recipients, 2);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 0);

        assert!(h.gateway.broadcast_promotion(friday).await.unwrap().is_none());

        let templates = h.channel.templates();
        assert_eq!(templates.len(), 2);
        assert!(templates.iter().all(|(_, t)| t.name == "weekly_promo" && t.language == "fr"));

        let next_friday = NaiveDate::from_ymd_opt(2026, 10, 30).unwrap();
        assert!(h.gateway.broadcast_promotion(next_friday).await.unwrap().is_some());
        assert_eq!(h.channel.templates().len(), 4);
    }

    #[tokio::test]
    async fn test_failed_recipient_does_not_stop_run() {
        let h = promo_harness(MockChannel::new().rejecting("bob")).await;
        for contact in ["alice", "bob", "carol"] {
            h.gateway.memory.register_customer(contact).await.unwrap();
        }
        let date = NaiveDate::from_ymd_opt(2026, 10, 23).unwrap();

        let report = h.gateway.broadcast_promotion(date).await.unwrap().unwrap();
        assert_eq!(report.delivered, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(h.channel.templates().len(), 3);

        let record = h.gateway.memory.last_broadcast().await.unwrap().unwrap();
        assert!(record.finished);
        assert_eq!(record.delivered, 2);
        assert_eq!(record.failed, 1);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_webhook_customers() {
        let h = promo_harness(MockChannel::new()).await;
        h.gateway
            .handle_delivery(&text_delivery("wamid.1", "33611111111", "Bonjour"))
            .await
            .unwrap();

        let date = NaiveDate::from_ymd_opt(2026, 10, 23).unwrap();
        let report = h.gateway.broadcast_promotion(date).await.unwrap().unwrap();
        assert_eq!(report.recipients, 1);
        assert_eq!(h.channel.templates()[0].0, "33611111111");
    }

    #[tokio::test]
    async fn test_failed_customer_read_leaves_date_unclaimed() {
        let h = promo_harness(MockChannel::new()).await;
        for contact in ["alice", "bob"] {
            h.gateway.memory.register_customer(contact).await.unwrap();
        }
        let date = NaiveDate::from_ymd_opt(2026, 10, 23).unwrap();
        let pool = h.gateway.memory.pool();

        sqlx::query("ALTER TABLE customers RENAME TO customers_offline")
            .execute(pool)
            .await
            .unwrap();
        assert!(h.gateway.broadcast_promotion(date).await.is_err());
        assert!(h.gateway.memory.last_broadcast().await.unwrap().is_none());
        assert!(h.channel.templates().is_empty());

        sqlx::query("ALTER TABLE customers_offline RENAME TO customers")
            .execute(pool)
            .await
            .unwrap();
        let report = h.gateway.broadcast_promotion(date).await.unwrap().unwrap();
        assert_eq!(report.delivered, 2);
        assert_eq!(h.channel.templates().len(), 2);
    }
}
