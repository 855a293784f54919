//! Statistics over the whole loaded dataset, across every user.
//!
//! Each function validates the records with the configured date format and
//! leaves invalid ones out, exactly as a user report would.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, PickFirst};
use tracing::{info, warn};

use std::{
    cmp::Reverse,
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt::{self, Display},
};

use crate::{
    money::Money,
    record::{RawRecord, SaleRecord},
    report::Period,
};

/// A valid sale, with its position in the loaded records.
struct Line {
    index: usize,
    sale: SaleRecord,
    total: Money,
}

fn valid_lines(records: &[RawRecord], date_format: &str) -> Vec<Line> {
    records
        .iter()
        .enumerate()
        .filter_map(|(index, raw)| {
            let sale = SaleRecord::from_raw(raw, date_format).ok()?;
            let total = sale.line_total()?;
            Some(Line { index, sale, total })
        })
        .collect()
}

/// The first and last sale dates in a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Totals over every valid sale in a dataset.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetStats {
    pub total_records: usize,
    pub valid_records: usize,
    pub unique_users: usize,
    /// `None` if there are no valid sales.
    pub date_range: Option<DateRange>,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub total_revenue: Money,
    pub average_sale: f64,
    pub total_quantity: u64,
}

impl DatasetStats {
    /// Computes statistics over `records`.
    ///
    /// A sale whose line total would overflow the revenue total is counted
    /// as invalid.
    #[must_use]
    pub fn compute(records: &[RawRecord], date_format: &str) -> Self {
        let mut users = BTreeSet::new();
        let mut date_range: Option<DateRange> = None;
        let mut total_revenue = Money::default();
        let mut total_quantity = 0u64;
        let mut valid_records = 0;
        for line in valid_lines(records, date_format) {
            let Some(revenue) = total_revenue.checked_add(line.total) else {
                warn!("record {}: revenue total overflows, leaving it out", line.index);
                continue;
            };
            total_revenue = revenue;
            total_quantity += u64::from(line.sale.quantity);
            valid_records += 1;
            let date = line.sale.date;
            date_range = Some(match date_range {
                Some(range) => DateRange {
                    start: range.start.min(date),
                    end: range.end.max(date),
                },
                None => DateRange {
                    start: date,
                    end: date,
                },
            });
            users.insert(line.sale.user_id);
        }
        let stats = Self {
            total_records: records.len(),
            valid_records,
            unique_users: users.len(),
            date_range,
            total_revenue,
            average_sale: total_revenue.average(valid_records as u64),
            total_quantity,
        };
        info!(
            "dataset: {} records, {} valid, {} users",
            stats.total_records, stats.valid_records, stats.unique_users
        );
        stats
    }
}

impl Display for DatasetStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Records: {} ({} valid)",
            self.total_records, self.valid_records
        )?;
        writeln!(f, "Users:   {}", self.unique_users)?;
        if let Some(range) = self.date_range {
            writeln!(f, "Dates:   {} to {}", range.start, range.end)?;
        }
        writeln!(f, "Revenue: {}", self.total_revenue)?;
        writeln!(f, "Average: {:.2}", self.average_sale)?;
        write!(f, "Units:   {}", self.total_quantity)
    }
}

/// One user's totals across the whole dataset.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTotals {
    pub user_id: String,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub revenue: Money,
    pub quantity: u64,
    pub transactions: u64,
}

/// Returns the `n` users with the highest revenue, highest first. Users with
/// equal revenue are listed in id order.
#[must_use]
pub fn top_users(records: &[RawRecord], date_format: &str, n: usize) -> Vec<UserTotals> {
    let mut totals: HashMap<String, UserTotals> = HashMap::new();
    for line in valid_lines(records, date_format) {
        let entry = totals
            .entry(line.sale.user_id.clone())
            .or_insert_with(|| UserTotals {
                user_id: line.sale.user_id.clone(),
                revenue: Money::default(),
                quantity: 0,
                transactions: 0,
            });
        let Some(revenue) = entry.revenue.checked_add(line.total) else {
            warn!("record {}: revenue total overflows, leaving it out", line.index);
            continue;
        };
        entry.revenue = revenue;
        entry.quantity += u64::from(line.sale.quantity);
        entry.transactions += 1;
    }
    let mut ranked: Vec<_> = totals.into_values().collect();
    ranked.sort_by(|a, b| {
        Reverse(a.revenue)
            .cmp(&Reverse(b.revenue))
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    ranked.truncate(n);
    ranked
}

/// Sales across all users in one period.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub total_revenue: Money,
    pub average_sale: f64,
    pub sales: u64,
    pub unique_users: usize,
}

/// Returns revenue, sale counts and distinct users for every month or year
/// that has sales, keyed and ordered by period.
#[must_use]
pub fn period_summary(
    records: &[RawRecord],
    date_format: &str,
    period: Period,
) -> BTreeMap<String, PeriodSummary> {
    let mut groups: BTreeMap<String, (Money, u64, BTreeSet<String>)> = BTreeMap::new();
    for line in valid_lines(records, date_format) {
        let (revenue, sales, users) = groups.entry(period.key(line.sale.date)).or_default();
        let Some(sum) = revenue.checked_add(line.total) else {
            warn!("record {}: revenue total overflows, leaving it out", line.index);
            continue;
        };
        *revenue = sum;
        *sales += 1;
        users.insert(line.sale.user_id);
    }
    groups
        .into_iter()
        .map(|(key, (total_revenue, sales, users))| {
            let summary = PeriodSummary {
                total_revenue,
                average_sale: total_revenue.average(sales),
                sales,
                unique_users: users.len(),
            };
            (key, summary)
        })
        .collect()
}

/// A sale whose line total is unusually far from the mean.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anomaly {
    /// Position of the record in the loaded collection.
    pub index: usize,
    pub user_id: String,
    pub line_total: Money,
}

/// Returns the sales whose line total lies more than `threshold` sample
/// standard deviations from the mean, in record order.
///
/// Fewer than two valid sales never yield anomalies.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn detect_anomalies(records: &[RawRecord], date_format: &str, threshold: f64) -> Vec<Anomaly> {
    let lines = valid_lines(records, date_format);
    if lines.len() < 2 {
        return Vec::new();
    }
    let n = lines.len() as f64;
    let mean = lines.iter().map(|l| l.total.as_f64()).sum::<f64>() / n;
    let variance = lines
        .iter()
        .map(|l| (l.total.as_f64() - mean).powi(2))
        .sum::<f64>()
        / (n - 1.0);
    let limit = threshold * variance.sqrt();
    let anomalies: Vec<_> = lines
        .into_iter()
        .filter(|l| (l.total.as_f64() - mean).abs() > limit)
        .map(|l| Anomaly {
            index: l.index,
            user_id: l.sale.user_id,
            line_total: l.total,
        })
        .collect();
    info!(
        "found {} anomalous sales (threshold {threshold} std dev)",
        anomalies.len()
    );
    anomalies
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;

    const ISO: &str = "%Y-%m-%d";

    fn records(value: Value) -> Vec<RawRecord> {
        let Value::Array(items) = value else {
            panic!("test data must be an array");
        };
        items
            .into_iter()
            .filter_map(|v| match v {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect()
    }

    fn sample() -> Vec<RawRecord> {
        records(json!([
            {"user_id": 1, "date": "2024-02-01", "price": 10, "quantity": 2},
            {"user_id": 2, "date": "2023-11-15", "price": "5.50", "quantity": 1},
            {"user_id": 1, "date": "2024-02-20", "price": 3, "quantity": 3},
            {"user_id": 3, "date": "2024-01-05", "quantity": 1},
            {"user_id": 2, "date": "2024-02-03", "price": 20, "quantity": 1},
        ]))
    }

    #[test]
    fn compute_fn_totals_valid_records() {
        let stats = DatasetStats::compute(&sample(), ISO);
        assert_eq!(stats.total_records, 5);
        assert_eq!(stats.valid_records, 4);
        assert_eq!(stats.unique_users, 2);
        assert_eq!(
            stats.date_range,
            Some(DateRange {
                start: NaiveDate::from_ymd_opt(2023, 11, 15).unwrap(),
                end: NaiveDate::from_ymd_opt(2024, 2, 20).unwrap(),
            })
        );
        assert_eq!(stats.total_revenue, Money::from_cents(5450));
        assert!((stats.average_sale - 13.625).abs() < f64::EPSILON);
        assert_eq!(stats.total_quantity, 7);
    }

    #[test]
    fn compute_fn_handles_empty_data() {
        let stats = DatasetStats::compute(&[], ISO);
        assert_eq!(stats.valid_records, 0);
        assert_eq!(stats.date_range, None);
        assert!(stats.average_sale.abs() < f64::EPSILON);
    }

    #[test]
    fn compute_fn_leaves_out_a_sale_that_overflows_revenue() {
        let data = records(json!([
            {"user_id": 1, "date": "2024-01-05", "price": "50000000000000000", "quantity": 1},
            {"user_id": 1, "date": "2024-01-06", "price": "50000000000000000", "quantity": 1},
        ]));
        let stats = DatasetStats::compute(&data, ISO);
        assert_eq!(stats.valid_records, 1);
        assert_eq!(stats.total_revenue, Money::from_cents(5_000_000_000_000_000_000));
    }

    #[test]
    fn top_users_fn_ranks_by_revenue() {
        let top = top_users(&sample(), ISO, 10);
        assert_eq!(
            top,
            vec![
                UserTotals {
                    user_id: "1".into(),
                    revenue: Money::from_cents(2900),
                    quantity: 5,
                    transactions: 2,
                },
                UserTotals {
                    user_id: "2".into(),
                    revenue: Money::from_cents(2550),
                    quantity: 2,
                    transactions: 2,
                },
            ]
        );
        assert_eq!(top_users(&sample(), ISO, 1).len(), 1);
    }

    #[test]
    fn period_summary_fn_groups_all_users_by_period() {
        let months = period_summary(&sample(), ISO, Period::Month);
        let keys: Vec<_> = months.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["2023-11", "2024-02"]);
        let feb = &months["2024-02"];
        assert_eq!(feb.total_revenue, Money::from_cents(4900));
        assert_eq!(feb.sales, 3);
        assert_eq!(feb.unique_users, 2);
        let years = period_summary(&sample(), ISO, Period::Year);
        assert_eq!(years["2024"].sales, 3);
        assert_eq!(years["2023"].total_revenue, Money::from_cents(550));
    }

    #[test]
    fn detect_anomalies_fn_flags_outliers_beyond_threshold() {
        let mut data: Vec<Value> = (0..9)
            .map(|_| json!({"user_id": 1, "date": "2024-01-01", "price": 10, "quantity": 1}))
            .collect();
        data.push(json!({"user_id": 9, "date": "2024-01-02", "price": 1000, "quantity": 1}));
        let data = records(Value::Array(data));
        let found = detect_anomalies(&data, ISO, 2.0);
        assert_eq!(
            found,
            vec![Anomaly {
                index: 9,
                user_id: "9".into(),
                line_total: Money::from_cents(100_000),
            }]
        );
        assert!(detect_anomalies(&data, ISO, 3.0).is_empty());
    }

    #[test]
    fn detect_anomalies_fn_needs_two_sales() {
        let data = records(json!([
            {"user_id": 1, "date": "2024-01-01", "price": 10, "quantity": 1},
        ]));
        assert!(detect_anomalies(&data, ISO, 0.0).is_empty());
    }

    #[test]
    fn stats_serialize_with_iso_dates() {
        let value = serde_json::to_value(DatasetStats::compute(&sample(), ISO)).unwrap();
        assert_eq!(value["date_range"]["start"], "2023-11-15");
        assert_eq!(value["total_revenue"], 54.5);
    }
}
