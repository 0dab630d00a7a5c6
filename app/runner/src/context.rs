//! FILENAME: app/runner/src/context.rs
//! Per-run configuration.
//!
//! `Settings` holds the process-wide directories and defaults; a `RunContext`
//! is resolved from them once per report and handed to the pipeline.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Local, NaiveDate};

use crate::catalog::ReportDescriptor;
use crate::error::RunError;

/// Bounded retry around loading and flattening a report's input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_ATTEMPTS: u32 = 3;
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(10);

    pub fn new(attempts: u32, delay: Duration) -> Self {
        RetryPolicy {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// A single attempt.
    pub fn none() -> Self {
        RetryPolicy::new(1, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(Self::DEFAULT_ATTEMPTS, Self::DEFAULT_DELAY)
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Per-run log files are only written when set.
    pub log_dir: Option<PathBuf>,
    pub reference_date: NaiveDate,
    pub retry: RetryPolicy,
}

impl Settings {
    pub fn new(data_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Settings {
            data_dir: data_dir.into(),
            output_dir: output_dir.into(),
            log_dir: None,
            reference_date: Local::now().date_naive(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = date;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn data_path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }
}

/// Command-line replacements for a descriptor's default file names.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub inputs: Vec<String>,
    pub baseline: Option<String>,
    pub output: Option<String>,
}

/// Everything one report run reads: files, retry policy and the date ages
/// are measured against.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub report: String,
    pub inputs: Vec<PathBuf>,
    pub baseline: Option<PathBuf>,
    pub output: PathBuf,
    pub log_path: Option<PathBuf>,
    pub retry: RetryPolicy,
    pub reference_date: NaiveDate,
}

impl RunContext {
    pub fn resolve(
        settings: &Settings,
        descriptor: &ReportDescriptor,
        overrides: &RunOverrides,
    ) -> Result<Self, RunError> {
        let report = descriptor.name().to_string();

        let input_names: &[String] = if overrides.inputs.is_empty() {
            &descriptor.inputs
        } else {
            &overrides.inputs
        };
        if input_names.is_empty() {
            return Err(RunError::Usage(format!("{}: no input file configured", report)));
        }
        let inputs = input_names.iter().map(|f| settings.data_path(f)).collect();

        let baseline = overrides
            .baseline
            .as_ref()
            .or(descriptor.baseline_input.as_ref())
            .map(|f| settings.data_path(f));
        if descriptor.definition.has_baseline() && baseline.is_none() {
            return Err(RunError::Usage(format!("{}: no baseline input configured", report)));
        }

        let output_name = overrides
            .output
            .clone()
            .unwrap_or_else(|| descriptor.output_file());
        let output = settings.output_dir.join(output_name);

        let log_path = settings
            .log_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.log", report)));

        let retry = if descriptor.retry {
            settings.retry
        } else {
            RetryPolicy::none()
        };

        Ok(RunContext {
            report,
            inputs,
            baseline,
            output,
            log_path,
            retry,
            reference_date: settings.reference_date,
        })
    }

    /// Every file the run reads, baseline last.
    pub fn all_inputs(&self) -> impl Iterator<Item = &Path> {
        self.inputs
            .iter()
            .chain(self.baseline.iter())
            .map(PathBuf::as_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;

    fn settings() -> Settings {
        Settings::new("/data", "/output")
            .with_reference_date(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
    }

    #[test]
    fn descriptor_defaults_resolve_under_directories() {
        let descriptor = catalog::find("heating_matrix").unwrap();
        let ctx = RunContext::resolve(&settings(), &descriptor, &RunOverrides::default()).unwrap();

        assert_eq!(ctx.inputs, vec![PathBuf::from("/data/heating_matrix.txt")]);
        assert_eq!(ctx.output, PathBuf::from("/output/heating_matrix.xlsx"));
        assert_eq!(ctx.log_path, None);
        assert_eq!(ctx.retry, RetryPolicy::none());
    }

    #[test]
    fn overrides_replace_file_names() {
        let descriptor = catalog::find("heating_matrix").unwrap();
        let overrides = RunOverrides {
            inputs: vec!["march.txt".into()],
            baseline: None,
            output: Some("march.xlsx".into()),
        };
        let ctx = RunContext::resolve(&settings().with_log_dir("/logs"), &descriptor, &overrides).unwrap();

        assert_eq!(ctx.inputs, vec![PathBuf::from("/data/march.txt")]);
        assert_eq!(ctx.output, PathBuf::from("/output/march.xlsx"));
        assert_eq!(ctx.log_path, Some(PathBuf::from("/logs/heating_matrix.log")));
    }

    #[test]
    fn retrying_reports_use_settings_policy() {
        let descriptor = catalog::find("address_heating_matrix_query").unwrap();
        let ctx = RunContext::resolve(&settings(), &descriptor, &RunOverrides::default()).unwrap();
        assert_eq!(ctx.retry, RetryPolicy::default());
        assert_eq!(ctx.retry.attempts, 3);
    }

    #[test]
    fn baseline_is_listed_after_inputs() {
        let descriptor = catalog::find("energy_labels").unwrap();
        let ctx = RunContext::resolve(&settings(), &descriptor, &RunOverrides::default()).unwrap();
        let all: Vec<&Path> = ctx.all_inputs().collect();
        assert_eq!(all, vec![Path::new("/data/energy_labels.txt"), Path::new("/data/total_units.txt")]);
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).attempts, 1);
    }
}
