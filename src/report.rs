use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst};

use std::{
    collections::BTreeMap,
    fmt::{self, Display},
};

use crate::{money::Money, record::RawRecord};

/// The length of a reporting period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    Month,
    Year,
}

impl Period {
    /// Returns the key of the period containing `date`: `"YYYY-MM"` for a
    /// month, `"YYYY"` for a year.
    #[must_use]
    pub fn key(self, date: NaiveDate) -> String {
        match self {
            Self::Month => format!("{:04}-{:02}", date.year(), date.month()),
            Self::Year => format!("{:04}", date.year()),
        }
    }
}

/// Accumulates the sales for one period: a month (`"YYYY-MM"`) or a year
/// (`"YYYY"`).
///
/// `average` is only meaningful after [`PeriodBucket::finalize`]; it is zero
/// for a bucket with no sales.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodBucket {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub total: Money,
    pub count: u64,
    pub average: f64,
    /// The contributing raw records, kept for monthly buckets only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<RawRecord>>,
}

impl PeriodBucket {
    /// Creates an empty bucket that retains its contributing records.
    #[must_use]
    pub fn detailed() -> Self {
        Self {
            items: Some(Vec::new()),
            ..Self::default()
        }
    }

    /// Adds one sale to the bucket. Returns `None`, leaving the bucket
    /// unchanged, if the total would overflow.
    pub fn add(&mut self, line_total: Money, record: &RawRecord) -> Option<()> {
        self.total = self.total.checked_add(line_total)?;
        self.count += 1;
        if let Some(items) = &mut self.items {
            items.push(record.clone());
        }
        Some(())
    }

    pub fn finalize(&mut self) {
        self.average = self.total.average(self.count);
    }
}

/// Monthly and yearly sales aggregates for one user.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserReport {
    pub monthly: BTreeMap<String, PeriodBucket>,
    pub yearly: BTreeMap<String, PeriodBucket>,
    pub user_id: String,
    pub generated_at: DateTime<Utc>,
    /// Number of valid sales folded into the report.
    #[serde(default)]
    pub total_sales: u64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default)]
    pub total_revenue: Money,
}

impl UserReport {
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            monthly: BTreeMap::new(),
            yearly: BTreeMap::new(),
            user_id: user_id.into(),
            generated_at: Utc::now(),
            total_sales: 0,
            total_revenue: Money::default(),
        }
    }

    /// Returns the monthly buckets, then the yearly ones, each in ascending
    /// period order.
    pub fn rows(&self) -> impl Iterator<Item = (&str, &PeriodBucket)> {
        self.monthly
            .iter()
            .chain(&self.yearly)
            .map(|(period, bucket)| (period.as_str(), bucket))
    }

    /// Returns a printable table of this report, with amounts labelled in
    /// `currency`.
    #[must_use]
    pub fn summary<'a>(&'a self, currency: &'a str) -> Summary<'a> {
        Summary {
            report: self,
            currency,
        }
    }
}

/// A printable view of a [`UserReport`]; see [`UserReport::summary`].
pub struct Summary<'a> {
    report: &'a UserReport,
    currency: &'a str,
}

impl Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self.report;
        let total_heading = format!("Total ({})", self.currency);
        writeln!(f, "User {}", report.user_id)?;
        writeln!(
            f,
            "{:<8} {:>14} {:>12} {:>6}",
            "Period", total_heading, "Average", "Sales"
        )?;
        let length = 43;
        writeln!(f, "{:-<length$}", "")?;
        for (period, bucket) in report.rows() {
            writeln!(
                f,
                "{period:<8} {:>14} {:>12.2} {:>6}",
                bucket.total, bucket.average, bucket.count
            )?;
        }
        writeln!(f, "{:-<length$}", "")?;
        writeln!(
            f,
            "{:<8} {:>14} {:>12} {:>6}",
            "Total", report.total_revenue, "", report.total_sales
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record() -> RawRecord {
        let serde_json::Value::Object(map) = json!({"user_id": 1, "product": "Widget"}) else {
            unreachable!()
        };
        map
    }

    #[test]
    fn key_fn_pads_months_and_years() {
        let date = NaiveDate::from_ymd_opt(987, 3, 9).unwrap();
        assert_eq!(Period::Month.key(date), "0987-03");
        assert_eq!(Period::Year.key(date), "0987");
    }

    #[test]
    fn finalize_fn_computes_average() {
        let mut bucket = PeriodBucket::detailed();
        bucket.add(Money::from_cents(2000), &record());
        bucket.add(Money::from_cents(500), &record());
        bucket.finalize();
        assert_eq!(bucket.total, Money::from_cents(2500));
        assert_eq!(bucket.count, 2);
        assert!((bucket.average - 12.5).abs() < f64::EPSILON);
        assert_eq!(bucket.items.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn finalize_fn_gives_empty_bucket_zero_average() {
        let mut bucket = PeriodBucket::default();
        bucket.finalize();
        assert!(bucket.average.abs() < f64::EPSILON);
        assert!(!bucket.average.is_nan());
    }

    #[test]
    fn add_fn_refuses_a_sale_that_overflows_the_total() {
        let mut bucket = PeriodBucket::detailed();
        assert_eq!(bucket.add(Money::from_cents(i64::MAX), &record()), Some(()));
        assert_eq!(bucket.add(Money::from_cents(1), &record()), None);
        assert_eq!(bucket.total, Money::from_cents(i64::MAX));
        assert_eq!(bucket.count, 1);
        assert_eq!(bucket.items.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn bucket_total_deserializes_from_number_or_string() {
        let bucket: PeriodBucket =
            serde_json::from_str(r#"{"total": 25.0, "count": 2, "average": 12.5}"#).unwrap();
        assert_eq!(bucket.total, Money::from_cents(2500));
        assert_eq!(bucket.items, None);
        let bucket: PeriodBucket =
            serde_json::from_str(r#"{"total": "25.00", "count": 2, "average": 12.5}"#).unwrap();
        assert_eq!(bucket.total, Money::from_cents(2500));
    }

    #[test]
    fn rows_fn_lists_months_before_years() {
        let mut report = UserReport::new("1");
        report.yearly.insert("2024".into(), PeriodBucket::default());
        report.monthly.insert("2024-02".into(), PeriodBucket::default());
        report.monthly.insert("2024-01".into(), PeriodBucket::default());
        let periods: Vec<_> = report.rows().map(|(p, _)| p).collect();
        assert_eq!(periods, vec!["2024-01", "2024-02", "2024"]);
    }

    #[test]
    fn summary_shows_currency_and_totals() {
        let mut report = UserReport::new("42");
        let mut bucket = PeriodBucket::default();
        bucket.add(Money::from_cents(2500), &record());
        bucket.finalize();
        report.monthly.insert("2024-01".into(), bucket);
        report.total_sales = 1;
        report.total_revenue = Money::from_cents(2500);
        let text = report.summary("EUR").to_string();
        assert!(text.contains("User 42"), "{text}");
        assert!(text.contains("Total (EUR)"), "{text}");
        assert!(text.contains("2024-01"), "{text}");
        assert!(text.contains("25.00"), "{text}");
    }
}
