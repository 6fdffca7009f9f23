//! Run manifests and per-date alignment.
//!
//! A manifest is the JSON array of run records a results server reports for
//! aligned runs, e.g.
//!
//! ```json
//! [{"id": 5, "browser_name": "chrome", "browser_version": "120.0",
//!   "full_revision_hash": "0123abcd...", "time_start": "2023-01-02T03:04:05Z"}]
//! ```
//!
//! Extra fields are ignored.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use wpt_results::RunId;

use crate::config::BadRanges;
use crate::error::{MetricsError, Result};

/// Release channel of the runs being compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Channel {
    /// Stable browser releases.
    #[default]
    Stable,
    /// Experimental (nightly / tech-preview) builds.
    Experimental,
}

impl Channel {
    /// Picks the channel from an `--experimental` flag.
    #[must_use]
    pub fn from_experimental(experimental: bool) -> Self {
        if experimental {
            Channel::Experimental
        } else {
            Channel::Stable
        }
    }

    /// Label used in output file names.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Channel::Stable => "stable",
            Channel::Experimental => "experimental",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Metadata of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Run id; results live under `<results>/<id>/`.
    pub id: RunId,
    /// Product name, e.g. `chrome`.
    pub browser_name: String,
    /// Browser version string.
    pub browser_version: String,
    /// WPT revision the run was made at.
    pub full_revision_hash: String,
    /// Start time; its UTC date is the run's date.
    pub time_start: DateTime<Utc>,
}

impl RunRecord {
    /// The run's date.
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.time_start.date_naive()
    }
}

/// Reads a run manifest.
///
/// # Errors
///
/// Returns [`MetricsError::Io`] if the file cannot be read and
/// [`MetricsError::Manifest`] if it is not an array of run records.
pub fn load_manifest(path: &Path) -> Result<Vec<RunRecord>> {
    let content = fs::read(path).map_err(MetricsError::io(path))?;
    serde_json::from_slice(&content).map_err(|source| MetricsError::Manifest {
        path: path.to_path_buf(),
        source,
    })
}

/// Runs grouped by date, one per product, in product order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignedRuns {
    dates: BTreeMap<NaiveDate, Vec<RunRecord>>,
}

impl AlignedRuns {
    /// Groups `records` by date within `[from, to)`.
    ///
    /// Records of other products are ignored, as are dates inside a bad
    /// range of `channel` and dates with no runs. Each date's runs are
    /// ordered like `products`.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::EmptyDateRange`] if `from >= to` and
    /// [`MetricsError::DuplicateProduct`] if a date has two runs of one
    /// product and [`MetricsError::RunCountMismatch`] if a date does not have
    /// exactly one run per product.
    pub fn align(
        records: Vec<RunRecord>,
        products: &[String],
        from: NaiveDate,
        to: NaiveDate,
        channel: Channel,
        bad_ranges: &BadRanges,
    ) -> Result<Self> {
        if from >= to {
            return Err(MetricsError::EmptyDateRange { from, to });
        }

        let mut dates: BTreeMap<NaiveDate, Vec<RunRecord>> = BTreeMap::new();
        let mut skipped = 0usize;
        for record in records {
            let date = record.date();
            if date < from || date >= to || !products.contains(&record.browser_name) {
                continue;
            }
            if let Some(range) = bad_ranges.containing(channel, date) {
                warn!(
                    %date,
                    run_id = record.id,
                    range_end = %range.end,
                    "skipping run in bad date range"
                );
                skipped += 1;
                continue;
            }
            dates.entry(date).or_default().push(record);
        }

        for (date, runs) in &mut dates {
            let repeated = {
                let mut seen = HashSet::new();
                runs.iter().find(|r| !seen.insert(r.browser_name.as_str()))
            };
            if let Some(repeated) = repeated {
                return Err(MetricsError::DuplicateProduct {
                    date: *date,
                    product: repeated.browser_name.clone(),
                    run_ids: runs.iter().map(|r| r.id).collect(),
                });
            }
            if runs.len() != products.len() {
                return Err(MetricsError::RunCountMismatch {
                    date: *date,
                    found: runs.len(),
                    expected: products.len(),
                });
            }
            runs.sort_by_key(|r| products.iter().position(|p| *p == r.browser_name));
        }

        info!(
            %from,
            %to,
            %channel,
            dates = dates.len(),
            skipped,
            "aligned runs"
        );
        Ok(Self { dates })
    }

    /// Number of dates with a run-set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Whether no date has a run-set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// The run-set of `date`.
    #[must_use]
    pub fn get(&self, date: NaiveDate) -> Option<&[RunRecord]> {
        self.dates.get(&date).map(Vec::as_slice)
    }

    /// Run-sets in date order.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, &[RunRecord])> {
        self.dates.iter().map(|(d, runs)| (*d, runs.as_slice()))
    }

    /// Every run id, in date then product order.
    #[must_use]
    pub fn run_ids(&self) -> Vec<RunId> {
        self.dates.values().flatten().map(|r| r.id).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::DateRange;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn record(id: RunId, browser: &str, day: &str) -> RunRecord {
        RunRecord {
            id,
            browser_name: browser.to_string(),
            browser_version: format!("{browser}-1"),
            full_revision_hash: "abcdef0123456789".to_string(),
            time_start: format!("{day}T10:00:00Z").parse().unwrap(),
        }
    }

    fn products() -> Vec<String> {
        vec!["chrome".to_string(), "firefox".to_string()]
    }

    #[test]
    fn groups_by_date_in_product_order() {
        let records = vec![
            record(2, "firefox", "2020-01-01"),
            record(1, "chrome", "2020-01-01"),
            record(3, "chrome", "2020-01-03"),
            record(4, "firefox", "2020-01-03"),
            record(5, "safari", "2020-01-03"),
            record(6, "chrome", "2020-01-05"),
        ];
        let aligned = AlignedRuns::align(
            records,
            &products(),
            date("2020-01-01"),
            date("2020-01-05"),
            Channel::Stable,
            &BadRanges::default(),
        )
        .unwrap();
        assert_eq!(aligned.len(), 2);
        assert_eq!(aligned.run_ids(), vec![1, 2, 3, 4]);
        assert!(aligned.get(date("2020-01-02")).is_none());
    }

    #[test]
    fn skips_bad_ranges_of_the_channel_only() {
        let records = vec![
            record(1, "chrome", "2020-01-01"),
            record(2, "firefox", "2020-01-01"),
            record(3, "chrome", "2020-01-02"),
            record(4, "firefox", "2020-01-02"),
        ];
        let bad = BadRanges {
            stable: vec![DateRange {
                start: date("2020-01-02"),
                end: date("2020-01-03"),
            }],
            experimental: Vec::new(),
        };
        let from = date("2020-01-01");
        let to = date("2020-02-01");
        let stable =
            AlignedRuns::align(records.clone(), &products(), from, to, Channel::Stable, &bad)
                .unwrap();
        assert_eq!(stable.run_ids(), vec![1, 2]);
        let experimental =
            AlignedRuns::align(records, &products(), from, to, Channel::Experimental, &bad)
                .unwrap();
        assert_eq!(experimental.len(), 2);
    }

    #[test]
    fn incomplete_date_is_an_error() {
        let records = vec![record(1, "chrome", "2020-01-01")];
        let err = AlignedRuns::align(
            records,
            &products(),
            date("2020-01-01"),
            date("2020-01-02"),
            Channel::Stable,
            &BadRanges::default(),
        );
        assert!(matches!(
            err,
            Err(MetricsError::RunCountMismatch {
                found: 1,
                expected: 2,
                ..
            })
        ));
    }

    #[test]
    fn repeated_product_is_an_error() {
        let records = vec![
            record(1, "chrome", "2020-01-01"),
            record(2, "chrome", "2020-01-01"),
        ];
        let err = AlignedRuns::align(
            records,
            &products(),
            date("2020-01-01"),
            date("2020-01-02"),
            Channel::Stable,
            &BadRanges::default(),
        );
        assert!(matches!(
            err,
            Err(MetricsError::DuplicateProduct { product, run_ids, .. })
                if product == "chrome" && run_ids == [1, 2]
        ));
    }

    #[test]
    fn empty_range_is_an_error() {
        let d = date("2020-01-01");
        assert!(matches!(
            AlignedRuns::align(Vec::new(), &products(), d, d, Channel::Stable, &BadRanges::default()),
            Err(MetricsError::EmptyDateRange { .. })
        ));
    }

    #[test]
    fn manifest_ignores_extra_fields() {
        let records: Vec<RunRecord> = serde_json::from_str(
            r#"[{"id": 7, "browser_name": "chrome", "browser_version": "99",
                 "full_revision_hash": "ff", "time_start": "2021-05-06T23:59:59Z",
                 "labels": ["master", "stable"]}]"#,
        )
        .unwrap();
        assert_eq!(records[0].date(), date("2021-05-06"));
    }
}
