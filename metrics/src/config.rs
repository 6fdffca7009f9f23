//! Batch configuration: products, bad-date ranges, interop exceptions and
//! category allow-lists.
//!
//! ```toml
//! products = ["chrome", "firefox", "safari"]
//!
//! [bad_ranges]
//! stable = [["2019-02-06", "2019-03-09"]]
//!
//! [interop]
//! known_non_ok = ["/css/css-grid/grid-definition/grid-limits-001.html"]
//!
//! [[categories]]
//! name = "cascade"
//! tests = ["/css/css-cascade/layer-basic.html"]
//! tests_file = "categories/cascade.txt"
//! ```

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use crate::error::{MetricsError, Result};
use crate::manifest::Channel;

/// A half-open date range `[start, end)` whose results are not trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "(NaiveDate, NaiveDate)")]
pub struct DateRange {
    /// First bad date.
    pub start: NaiveDate,
    /// First good date after the range.
    pub end: NaiveDate,
}

impl From<(NaiveDate, NaiveDate)> for DateRange {
    fn from((start, end): (NaiveDate, NaiveDate)) -> Self {
        Self { start, end }
    }
}

impl DateRange {
    /// Whether `date` falls in the range.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }
}

/// Bad-date ranges per channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BadRanges {
    /// Ranges for stable runs.
    pub stable: Vec<DateRange>,
    /// Ranges for experimental runs.
    pub experimental: Vec<DateRange>,
}

impl BadRanges {
    /// The ranges that apply to `channel`.
    #[must_use]
    pub fn for_channel(&self, channel: Channel) -> &[DateRange] {
        match channel {
            Channel::Stable => &self.stable,
            Channel::Experimental => &self.experimental,
        }
    }

    /// The range containing `date` on `channel`, if any.
    #[must_use]
    pub fn containing(&self, channel: Channel, date: NaiveDate) -> Option<&DateRange> {
        self.for_channel(channel).iter().find(|r| r.contains(date))
    }
}

/// Interop scoring policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InteropConfig {
    /// Tests whose non-OK harness status is accepted.
    pub known_non_ok: Vec<String>,
}

/// One interop category.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategoryConfig {
    /// Category name, used in CSV headers.
    pub name: String,
    /// Inline allow-list entries.
    #[serde(default)]
    pub tests: Vec<String>,
    /// File with one test path per line, relative to the config file.
    #[serde(default)]
    pub tests_file: Option<PathBuf>,
}

impl CategoryConfig {
    /// The full allow-list. Only meaningful after [`MetricsConfig::load`] or
    /// [`MetricsConfig::resolve`] has merged `tests_file` into `tests`.
    #[must_use]
    pub fn allow_list(&self) -> BTreeSet<String> {
        self.tests.iter().cloned().collect()
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    /// Products (browsers) compared on every date.
    pub products: Vec<String>,
    /// Dates to skip.
    pub bad_ranges: BadRanges,
    /// Interop scoring policy.
    pub interop: InteropConfig,
    /// Interop categories.
    pub categories: Vec<CategoryConfig>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            products: ["chrome", "firefox", "safari"].map(String::from).to_vec(),
            bad_ranges: BadRanges::default(),
            interop: InteropConfig::default(),
            categories: Vec::new(),
        }
    }
}

impl MetricsConfig {
    /// Reads, resolves and validates a configuration file.
    ///
    /// `tests_file` paths are resolved against the config file's directory.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Io`] if a file cannot be read,
    /// [`MetricsError::ConfigSyntax`] for malformed TOML and
    /// [`MetricsError::InvalidConfig`] if validation fails.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(MetricsError::io(path))?;
        let config: Self = toml::from_str(&content).map_err(|source| MetricsError::ConfigSyntax {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let config = config.resolve(base)?;
        config.validate()?;
        debug!(
            path = %path.display(),
            products = config.products.len(),
            categories = config.categories.len(),
            "loaded config"
        );
        Ok(config)
    }

    /// Merges every category's `tests_file` into its inline `tests`.
    ///
    /// Blank lines and lines starting with `#` are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::Io`] if a tests file cannot be read.
    pub fn resolve(mut self, base: &Path) -> Result<Self> {
        for category in &mut self.categories {
            let Some(file) = category.tests_file.take() else {
                continue;
            };
            let path = base.join(file);
            let content = fs::read_to_string(&path).map_err(MetricsError::io(&path))?;
            category.tests.extend(
                content
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty() && !l.starts_with('#'))
                    .map(String::from),
            );
        }
        Ok(self)
    }

    /// Checks the configuration rules.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::InvalidConfig`] naming the first broken rule.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(MetricsError::InvalidConfig(msg));

        if self.products.len() < 2 {
            return invalid("at least 2 products must be specified".to_string());
        }
        let mut seen = HashSet::new();
        for product in &self.products {
            if !seen.insert(product.as_str()) {
                return invalid(format!("duplicate product: {product}"));
            }
        }

        for range in self.bad_ranges.stable.iter().chain(&self.bad_ranges.experimental) {
            if range.start >= range.end {
                return invalid(format!(
                    "bad range must start before it ends: {} .. {}",
                    range.start, range.end
                ));
            }
        }

        let mut names = HashSet::new();
        for category in &self.categories {
            if !names.insert(category.name.as_str()) {
                return invalid(format!("duplicate category: {}", category.name));
            }
            if category.tests.is_empty() && category.tests_file.is_none() {
                return invalid(format!("category {} has no tests", category.name));
            }
            if let Some(test) = category.tests.iter().find(|t| !t.starts_with('/')) {
                return invalid(format!(
                    "category {}: test path must start with '/': {test}",
                    category.name
                ));
            }
        }
        Ok(())
    }

    /// Products in the order used for CSV columns.
    #[must_use]
    pub fn sorted_products(&self) -> Vec<String> {
        let mut products = self.products.clone();
        products.sort();
        products
    }

    /// Products as a set, for run-set validation.
    #[must_use]
    pub fn product_set(&self) -> BTreeSet<String> {
        self.products.iter().cloned().collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config: MetricsConfig = toml::from_str("").unwrap();
        assert_eq!(config, MetricsConfig::default());
        assert!(config.validate().is_ok());
        assert_eq!(config.sorted_products(), ["chrome", "firefox", "safari"]);
    }

    #[test]
    fn parses_ranges_and_categories() {
        let config: MetricsConfig = toml::from_str(
            r#"
            products = ["safari", "chrome"]

            [bad_ranges]
            stable = [["2019-02-06", "2019-03-09"]]

            [interop]
            known_non_ok = ["/a.html"]

            [[categories]]
            name = "grid"
            tests = ["/css/grid/a.html"]
            "#,
        )
        .unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.sorted_products(), ["chrome", "safari"]);
        let range = config.bad_ranges.stable[0];
        assert!(range.contains(date("2019-02-06")));
        assert!(range.contains(date("2019-03-08")));
        assert!(!range.contains(date("2019-03-09")));
        assert!(config
            .bad_ranges
            .containing(Channel::Experimental, date("2019-02-10"))
            .is_none());
        assert_eq!(config.categories[0].allow_list().len(), 1);
    }

    #[test]
    fn rejects_broken_rules() {
        let cases = [
            r#"products = ["chrome"]"#,
            r#"products = ["chrome", "chrome"]"#,
            "[bad_ranges]\nstable = [[\"2020-01-02\", \"2020-01-02\"]]",
            "[[categories]]\nname = \"a\"",
            "[[categories]]\nname = \"a\"\ntests = [\"relative.html\"]",
            "[[categories]]\nname = \"a\"\ntests = [\"/x\"]\n[[categories]]\nname = \"a\"\ntests = [\"/y\"]",
        ];
        for case in cases {
            let config: MetricsConfig = toml::from_str(case).unwrap();
            assert!(
                matches!(config.validate(), Err(MetricsError::InvalidConfig(_))),
                "accepted: {case}"
            );
        }
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<MetricsConfig>("browsers = []").is_err());
    }
}
