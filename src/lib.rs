#![doc = include_str!("../README.md")]
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

pub mod analyzer;
pub mod error;
pub mod generator;
pub mod loader;
pub mod money;
pub mod preferences;
pub mod readers;
pub mod record;
pub mod registry;
pub mod report;
pub mod stats;
pub mod writers;

pub use analyzer::{Processed, SalesAnalyzer};
pub use error::{Result, SalesError};
pub use generator::{BatchStats, Outcome, ReportGenerator, SUMMARY_FILE};
pub use loader::{DataLoader, LoadSummary};
pub use money::Money;
pub use preferences::Preferences;
pub use record::{InvalidRecord, RawRecord, RecordError, SaleRecord};
pub use report::{Period, PeriodBucket, UserReport};
pub use stats::{Anomaly, DatasetStats, PeriodSummary, UserTotals};

/// Loads sales data, computes per-user reports, and writes them out.
///
/// Owns one [`DataLoader`], one [`SalesAnalyzer`], one [`ReportGenerator`],
/// and the [`Preferences`] they share. Independent systems share nothing.
///
/// # Examples
///
/// ```no_run
/// # use sales_report::SalesSystem;
/// let mut system = SalesSystem::new();
/// system.load_data(["sales.json", "sales.csv"]);
/// system.set_preferences([("output_type", "csv"), ("currency", "EUR")]);
/// system.process_user("42").unwrap();
/// let outcomes = system.generate_reports("reports", None).unwrap();
/// ```
#[derive(Default)]
pub struct SalesSystem {
    loader: DataLoader,
    analyzer: SalesAnalyzer,
    generator: ReportGenerator,
    prefs: Preferences,
}

impl SalesSystem {
    /// Creates a system with no data, the built-in readers and writers, and
    /// default preferences.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_parts(loader: DataLoader, generator: ReportGenerator, prefs: Preferences) -> Self {
        Self {
            loader,
            analyzer: SalesAnalyzer::new(),
            generator,
            prefs,
        }
    }

    /// Appends the records in `paths` to the loaded data. See
    /// [`DataLoader::load`].
    pub fn load_data<P: AsRef<Path>>(&mut self, paths: impl IntoIterator<Item = P>) -> LoadSummary {
        self.loader.load(paths)
    }

    /// Updates preferences, returning the keys that were ignored. See
    /// [`Preferences::set_many`].
    pub fn set_preferences<K, V>(&mut self, prefs: impl IntoIterator<Item = (K, V)>) -> Vec<String>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.prefs.set_many(prefs)
    }

    /// Computes and caches the report for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SalesError::NoSalesForUser`] if the loaded data holds no valid
    /// sale for `user_id`.
    pub fn process_user(&mut self, user_id: &str) -> Result<Processed<'_>> {
        self.analyzer
            .process_user(self.loader.records(), user_id, &self.prefs.date_format)
    }

    /// Writes reports for `user_ids`, or for every cached report if `None`.
    /// See [`ReportGenerator::generate`].
    ///
    /// # Errors
    ///
    /// Returns [`SalesError::Io`] if `output_dir` cannot be created.
    pub fn generate_reports(
        &mut self,
        output_dir: impl AsRef<Path>,
        user_ids: Option<&[String]>,
    ) -> Result<Vec<Outcome>> {
        self.generator.generate(
            &mut self.analyzer,
            self.loader.records(),
            &self.prefs,
            output_dir.as_ref(),
            user_ids,
        )
    }

    /// Returns statistics over every loaded record.
    #[must_use]
    pub fn statistics(&self) -> DatasetStats {
        DatasetStats::compute(self.loader.records(), &self.prefs.date_format)
    }

    /// Returns the `n` users with the highest revenue. See
    /// [`stats::top_users`].
    #[must_use]
    pub fn top_users(&self, n: usize) -> Vec<UserTotals> {
        stats::top_users(self.loader.records(), &self.prefs.date_format, n)
    }

    #[must_use]
    pub fn period_summary(&self, period: Period) -> BTreeMap<String, PeriodSummary> {
        stats::period_summary(self.loader.records(), &self.prefs.date_format, period)
    }

    /// Returns the sales more than `threshold` standard deviations from the
    /// mean. See [`stats::detect_anomalies`].
    #[must_use]
    pub fn anomalies(&self, threshold: f64) -> Vec<Anomaly> {
        stats::detect_anomalies(self.loader.records(), &self.prefs.date_format, threshold)
    }

    /// Writes [`SalesSystem::statistics`] to `summary.json` in `output_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`SalesError::Io`] if the summary cannot be written.
    pub fn generate_summary(&self, output_dir: impl AsRef<Path>) -> Result<PathBuf> {
        self.generator
            .write_summary(&self.statistics(), output_dir.as_ref())
    }

    #[must_use]
    pub fn loader(&self) -> &DataLoader {
        &self.loader
    }

    #[must_use]
    pub fn analyzer(&self) -> &SalesAnalyzer {
        &self.analyzer
    }

    #[must_use]
    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }
}
