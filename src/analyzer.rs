//! Per-user monthly and yearly aggregation, with a cache of computed reports.

use tracing::{info, warn};

use std::collections::BTreeMap;

use crate::{
    error::{Result, SalesError},
    money::Money,
    record::{self, InvalidRecord, RawRecord, RecordError, SaleRecord},
    report::{Period, PeriodBucket, UserReport},
};

/// A freshly computed report, and the records that had to be left out of it.
#[derive(Debug)]
pub struct Processed<'a> {
    pub report: &'a UserReport,
    pub invalid: Vec<InvalidRecord>,
}

/// Computes the report for `user_id` from `records`, without caching it.
///
/// Records belonging to `user_id` that fail validation are skipped and
/// returned alongside the report; they never abort the calculation.
///
/// # Errors
///
/// Returns [`SalesError::NoSalesForUser`] if no record belongs to `user_id`,
/// or if none of the ones that do is valid.
pub fn calculate(
    records: &[RawRecord],
    user_id: &str,
    date_format: &str,
) -> Result<(UserReport, Vec<InvalidRecord>)> {
    let user_id = user_id.trim();
    let mut report = UserReport::new(user_id);
    let mut invalid = Vec::new();
    let mut matched = 0;
    for (index, raw) in records.iter().enumerate() {
        if record::user_id(raw).as_deref() != Some(user_id) {
            continue;
        }
        matched += 1;
        let folded = SaleRecord::from_raw(raw, date_format).and_then(|sale| {
            let line_total = sale.line_total().ok_or_else(|| RecordError::InvalidNumber {
                field: record::PRICE,
                value: format!("{} x {} overflows", sale.price, sale.quantity),
            })?;
            fold(&mut report, &sale, line_total, raw)
        });
        if let Err(error) = folded {
            warn!("skipping record {index} for user {user_id}: {error}");
            invalid.push(InvalidRecord {
                index,
                user_id: user_id.to_string(),
                error,
            });
        }
    }
    if report.total_sales == 0 {
        if matched > 0 {
            warn!("user {user_id}: all {matched} records are invalid");
        }
        return Err(SalesError::NoSalesForUser(user_id.to_string()));
    }
    for bucket in report.monthly.values_mut().chain(report.yearly.values_mut()) {
        bucket.finalize();
    }
    Ok((report, invalid))
}

/// Adds one sale to its month, its year and the report totals, or to none of
/// them if the running revenue would overflow.
fn fold(
    report: &mut UserReport,
    sale: &SaleRecord,
    line_total: Money,
    raw: &RawRecord,
) -> std::result::Result<(), RecordError> {
    let overflow = || RecordError::InvalidNumber {
        field: record::PRICE,
        value: format!("{line_total} overflows the running total"),
    };
    // Line totals are non-negative, so no bucket total exceeds the revenue.
    let revenue = report
        .total_revenue
        .checked_add(line_total)
        .ok_or_else(overflow)?;
    let month = Period::Month.key(sale.date);
    let year = Period::Year.key(sale.date);
    report
        .monthly
        .entry(month)
        .or_insert_with(PeriodBucket::detailed)
        .add(line_total, raw)
        .ok_or_else(overflow)?;
    report
        .yearly
        .entry(year)
        .or_default()
        .add(line_total, raw)
        .ok_or_else(overflow)?;
    report.total_sales += 1;
    report.total_revenue = revenue;
    Ok(())
}

/// Computes user reports and caches them by user id.
///
/// A cached report is only replaced by recomputing it with
/// [`SalesAnalyzer::process_user`].
#[derive(Debug, Default)]
pub struct SalesAnalyzer {
    reports: BTreeMap<String, UserReport>,
}

impl SalesAnalyzer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes the report for `user_id` and caches it, replacing any report
    /// already held for that user.
    ///
    /// # Errors
    ///
    /// Returns [`SalesError::NoSalesForUser`] if `records` holds no valid sale
    /// for `user_id`. The cache is left untouched in that case.
    pub fn process_user(
        &mut self,
        records: &[RawRecord],
        user_id: &str,
        date_format: &str,
    ) -> Result<Processed<'_>> {
        let (report, invalid) = match calculate(records, user_id, date_format) {
            Ok(result) => result,
            Err(e) => {
                warn!("{e}");
                return Err(e);
            }
        };
        info!(
            "computed report for user {}: {} sales, {} skipped",
            report.user_id,
            report.total_sales,
            invalid.len()
        );
        let id = report.user_id.clone();
        self.reports.insert(id.clone(), report);
        Ok(Processed {
            report: &self.reports[&id],
            invalid,
        })
    }

    #[must_use]
    pub fn report(&self, user_id: &str) -> Option<&UserReport> {
        self.reports.get(user_id.trim())
    }

    /// Returns the ids of all cached reports, sorted.
    #[must_use]
    pub fn user_ids(&self) -> Vec<String> {
        self.reports.keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}
