//! Statistics derived from the session log. Everything here is a pure
//! function of the records passed in; nothing is cached between calls.

mod types;

pub use types::{DailyStat, DaySummary, LifetimeTotals};

use std::collections::{BTreeMap, HashSet};

use chrono::{Days, Local, NaiveDate, TimeZone};

use crate::{models::SessionRecord, utils::Clock};

/// Buckets records by calendar day in `tz`. Production code uses
/// [`StatsAggregator::local`] so days match what the user sees.
#[derive(Debug, Clone)]
pub struct StatsAggregator<Tz: TimeZone> {
    tz: Tz,
}

impl StatsAggregator<Local> {
    pub fn local() -> Self {
        Self { tz: Local }
    }
}

impl<Tz: TimeZone> StatsAggregator<Tz> {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    fn date_of(&self, record: &SessionRecord) -> NaiveDate {
        record.timestamp_utc.with_timezone(&self.tz).date_naive()
    }

    pub fn lifetime_totals(&self, records: &[SessionRecord]) -> LifetimeTotals {
        let count = records.len();
        let total_minutes = records
            .iter()
            .map(|record| u64::from(record.duration_minutes))
            .sum();

        let active_days: HashSet<NaiveDate> =
            records.iter().map(|record| self.date_of(record)).collect();
        let average_per_active_day = if active_days.is_empty() {
            0.0
        } else {
            round_to_tenth(count as f64 / active_days.len() as f64)
        };

        LifetimeTotals {
            count,
            total_minutes,
            average_per_active_day,
        }
    }

    /// Exactly `window_days` consecutive days ending at `end_date`, oldest
    /// first, days without sessions reported as zero.
    pub fn daily_buckets(
        &self,
        records: &[SessionRecord],
        window_days: u32,
        end_date: NaiveDate,
    ) -> Vec<DailyStat> {
        if window_days == 0 {
            return Vec::new();
        }

        let start = end_date
            .checked_sub_days(Days::new(u64::from(window_days - 1)))
            .unwrap_or(NaiveDate::MIN);

        let mut minutes_by_date: BTreeMap<NaiveDate, u64> = start
            .iter_days()
            .take_while(|date| *date <= end_date)
            .map(|date| (date, 0))
            .collect();

        for record in records {
            if let Some(total) = minutes_by_date.get_mut(&self.date_of(record)) {
                *total += u64::from(record.duration_minutes);
            }
        }

        minutes_by_date
            .into_iter()
            .map(|(date, total_minutes)| DailyStat {
                date,
                total_minutes,
            })
            .collect()
    }

    /// [`daily_buckets`](Self::daily_buckets) ending at the clock's current
    /// date in this aggregator's time zone.
    pub fn daily_buckets_until_today(
        &self,
        records: &[SessionRecord],
        window_days: u32,
        clock: &dyn Clock,
    ) -> Vec<DailyStat> {
        let today = clock.now().with_timezone(&self.tz).date_naive();
        self.daily_buckets(records, window_days, today)
    }

    /// Sessions and minutes on one calendar day.
    pub fn day_summary(&self, records: &[SessionRecord], date: NaiveDate) -> DaySummary {
        records
            .iter()
            .filter(|record| self.date_of(record) == date)
            .fold(DaySummary::default(), |summary, record| DaySummary {
                sessions: summary.sessions + 1,
                minutes: summary.minutes + u64::from(record.duration_minutes),
            })
    }
}

/// Largest bucket, never below 1, for scaling bar charts.
pub fn peak_minutes(buckets: &[DailyStat]) -> u64 {
    buckets
        .iter()
        .map(|bucket| bucket.total_minutes)
        .max()
        .unwrap_or(0)
        .max(1)
}

fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, FixedOffset, Utc};

    use super::*;
    use crate::utils::ManualClock;

    fn at(rfc3339: &str, minutes: u32) -> SessionRecord {
        let timestamp = DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc);
        SessionRecord::work(timestamp, minutes)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn lifetime_totals_average_over_active_days() {
        let stats = StatsAggregator::new(Utc);
        let records = vec![
            at("2024-03-01T09:00:00Z", 25),
            at("2024-03-01T15:00:00Z", 25),
            at("2024-03-02T09:00:00Z", 25),
        ];

        let totals = stats.lifetime_totals(&records);
        assert_eq!(totals.count, 3);
        assert_eq!(totals.total_minutes, 75);
        assert_eq!(totals.average_per_active_day, 1.5);
    }

    #[test]
    fn lifetime_totals_of_nothing_are_zero() {
        let totals = StatsAggregator::new(Utc).lifetime_totals(&[]);
        assert_eq!(
            totals,
            LifetimeTotals {
                count: 0,
                total_minutes: 0,
                average_per_active_day: 0.0,
            }
        );
    }

    #[test]
    fn average_rounds_to_one_decimal() {
        let stats = StatsAggregator::new(Utc);
        let records = vec![
            at("2024-03-01T09:00:00Z", 25),
            at("2024-03-01T10:00:00Z", 25),
            at("2024-03-02T09:00:00Z", 25),
            at("2024-03-02T10:00:00Z", 25),
            at("2024-03-03T09:00:00Z", 25),
        ];
        // 5 / 3 = 1.666…
        assert_eq!(stats.lifetime_totals(&records).average_per_active_day, 1.7);
    }

    #[test]
    fn buckets_always_cover_the_whole_window() {
        let stats = StatsAggregator::new(Utc);
        let buckets = stats.daily_buckets(&[], 7, date(2024, 3, 7));

        assert_eq!(buckets.len(), 7);
        assert!(buckets.iter().all(|bucket| bucket.total_minutes == 0));
        assert_eq!(buckets.first().map(|b| b.date), Some(date(2024, 3, 1)));
        assert_eq!(buckets.last().map(|b| b.date), Some(date(2024, 3, 7)));

        assert_eq!(stats.daily_buckets(&[], 30, date(2024, 3, 7)).len(), 30);
        assert!(stats.daily_buckets(&[], 0, date(2024, 3, 7)).is_empty());
    }

    #[test]
    fn buckets_sum_per_day_and_ignore_outside_records() {
        let stats = StatsAggregator::new(Utc);
        let records = vec![
            at("2024-02-20T09:00:00Z", 25),
            at("2024-03-05T09:00:00Z", 25),
            at("2024-03-05T11:00:00Z", 50),
            at("2024-03-07T23:59:59Z", 25),
            at("2024-03-08T00:00:00Z", 25),
        ];

        let buckets = stats.daily_buckets(&records, 7, date(2024, 3, 7));
        let minutes: Vec<u64> = buckets.iter().map(|b| b.total_minutes).collect();
        assert_eq!(minutes, vec![0, 0, 0, 0, 75, 0, 25]);
    }

    #[test]
    fn buckets_use_the_local_calendar_day() {
        // 23:30 UTC is already the next day at UTC+2.
        let records = vec![at("2024-03-05T23:30:00Z", 25)];

        let utc = StatsAggregator::new(Utc).daily_buckets(&records, 2, date(2024, 3, 6));
        assert_eq!(utc[0].total_minutes, 25);
        assert_eq!(utc[1].total_minutes, 0);

        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let local =
            StatsAggregator::new(plus_two).daily_buckets(&records, 2, date(2024, 3, 6));
        assert_eq!(local[0].total_minutes, 0);
        assert_eq!(local[1].total_minutes, 25);

        let totals = StatsAggregator::new(plus_two).lifetime_totals(&[
            at("2024-03-05T21:00:00Z", 25),
            at("2024-03-05T23:30:00Z", 25),
        ]);
        assert_eq!(totals.average_per_active_day, 1.0);
    }

    #[test]
    fn buckets_until_today_follow_the_clock() {
        let clock = ManualClock::new(at("2024-03-07T12:00:00Z", 1).timestamp_utc);
        let records = vec![at("2024-03-07T08:00:00Z", 25)];

        let buckets = StatsAggregator::new(Utc).daily_buckets_until_today(&records, 7, &clock);
        let today = DailyStat {
            date: date(2024, 3, 7),
            total_minutes: 25,
        };
        assert_eq!(buckets.last(), Some(&today));
    }

    #[test]
    fn same_input_same_output() {
        let stats = StatsAggregator::new(Utc);
        let records = vec![at("2024-03-05T09:00:00Z", 25)];
        let first = stats.daily_buckets(&records, 7, date(2024, 3, 7));
        let second = stats.daily_buckets(&records, 7, date(2024, 3, 7));
        assert_eq!(first, second);
        assert_eq!(
            stats.lifetime_totals(&records),
            stats.lifetime_totals(&records)
        );
    }

    #[test]
    fn day_summary_counts_one_day() {
        let stats = StatsAggregator::new(Utc);
        let records = vec![
            at("2024-03-05T09:00:00Z", 25),
            at("2024-03-05T10:00:00Z", 50),
            at("2024-03-06T09:00:00Z", 25),
        ];
        assert_eq!(
            stats.day_summary(&records, date(2024, 3, 5)),
            DaySummary {
                sessions: 2,
                minutes: 75
            }
        );
        assert_eq!(
            stats.day_summary(&records, date(2024, 3, 4)),
            DaySummary::default()
        );
    }

    #[test]
    fn peak_has_a_floor_of_one() {
        assert_eq!(peak_minutes(&[]), 1);
        let buckets = vec![
            DailyStat {
                date: date(2024, 3, 1),
                total_minutes: 0,
            },
            DailyStat {
                date: date(2024, 3, 2),
                total_minutes: 50,
            },
        ];
        assert_eq!(peak_minutes(&buckets), 50);
    }
}
