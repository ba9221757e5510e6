//! End-to-end run: rename, convert, derive, encode, impute, analyse, report.
//!
//! The pipeline owns its [`PipelineConfig`] and the table it is given.
//! Required input columns are checked before any stage runs. Each stage
//! logs one `info` event with the table shape and elapsed time.
//!
//! ```
//! use survey_insight::config::PipelineConfig;
//! use survey_insight::pipeline::Pipeline;
//! use survey_insight::table::{Column, Table};
//!
//! let table = Table::from_columns([
//!     ("Height", Column::from_values(vec![65.0, 70.0, 68.0])),
//!     ("Weight", Column::from_values(vec![150.0, 180.0, 165.0])),
//!     ("Age", Column::from_values(vec![29.0, 45.0, 61.0])),
//!     ("Grip strength", Column::from_values(vec![30.0, 38.0, 25.0])),
//!     ("Frailty", Column::from_labels(&[Some("N"), Some("N"), Some("Y")])),
//! ]).unwrap();
//!
//! let output = Pipeline::new(PipelineConfig::frailty()).run(table).unwrap();
//! assert!(output.table.has_column("AgeGroup_>60"));
//! assert_eq!(output.report.summary.unwrap().rows.len(), 7);
//! ```

use crate::config::PipelineConfig;
use crate::convert::convert;
use crate::encoding::OneHotEncoder;
use crate::error::{Result, SurveyError};
use crate::features::{bin, ratio, row_mean};
use crate::impute::impute;
use crate::inference::{linear_regression, t_test};
use crate::ingest::IngestSummary;
use crate::report::{AnalysisReport, ReportBuilder};
use crate::stats::{correlation_matrix, describe, group_means, pearson};
use crate::table::Table;
use std::time::Instant;

/// Result of one run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// The transformed table.
    pub table: Table,
    pub report: AnalysisReport,
    /// One-hot mappings fitted (or reused) during the run, in config order.
    pub encoders: Vec<OneHotEncoder>,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
}

fn stage_done(stage: &str, table: &Table, started: Instant) {
    tracing::info!(
        stage,
        rows = table.row_count(),
        columns = table.column_count(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "stage complete"
    );
}

impl Pipeline {
    /// Wraps `config` as given; call [`PipelineConfig::validate`] first for untrusted input.
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// The configuration this pipeline runs.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Fails with [`SurveyError::MissingRequiredColumn`] for the first
    /// input column the configuration reads that `table` lacks.
    pub fn check_required(&self, table: &Table) -> Result<()> {
        match self
            .config
            .required_columns()
            .into_iter()
            .find(|(name, _)| !table.has_column(name))
        {
            Some((column, stage)) => Err(SurveyError::MissingRequiredColumn {
                column,
                stage: stage.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Runs every stage, fitting one-hot mappings on `table`.
    pub fn run(&self, table: Table) -> Result<PipelineOutput> {
        self.execute(table, None)
    }

    /// Runs every stage, reusing one-hot mappings from an earlier run.
    ///
    /// Categories absent from `fitted` become all-zero rows.
    pub fn run_with_encoders(&self, table: Table, fitted: &[OneHotEncoder]) -> Result<PipelineOutput> {
        if fitted.len() != self.config.one_hot_encodings.len() {
            return Err(SurveyError::Config(format!(
                "{} fitted one-hot encoders supplied, configuration has {}",
                fitted.len(),
                self.config.one_hot_encodings.len()
            )));
        }
        self.execute(table, Some(fitted))
    }

    fn execute(&self, mut table: Table, fitted: Option<&[OneHotEncoder]>) -> Result<PipelineOutput> {
        let config = &self.config;
        let run_started = Instant::now();
        self.check_required(&table)?;
        let mut report = ReportBuilder::new(config.title.clone())
            .decimals(config.decimals)
            .dataset(IngestSummary::of(&table));

        let started = Instant::now();
        for r in &config.renames {
            table.rename_column(&r.from, &r.to)?;
        }
        stage_done("rename", &table, started);

        let started = Instant::now();
        for step in &config.conversions {
            convert(&mut table, step, false)?;
        }
        stage_done("convert", &table, started);

        let started = Instant::now();
        for step in &config.ratios {
            ratio(&mut table, step)?;
        }
        for step in &config.row_means {
            row_mean(&mut table, step)?;
        }
        for step in &config.binnings {
            bin(&mut table, step)?;
        }
        stage_done("features", &table, started);

        let started = Instant::now();
        for step in &config.binary_encodings {
            step.apply(&mut table)?;
        }
        let mut encoders = Vec::with_capacity(config.one_hot_encodings.len());
        for (i, step) in config.one_hot_encodings.iter().enumerate() {
            let encoder = match fitted.and_then(|f| f.get(i)) {
                Some(existing) => existing.clone(),
                None => OneHotEncoder::fit(&table, &step.source, step.prefix())?,
            };
            report = report.one_hot(encoder.apply(&mut table)?);
            encoders.push(encoder);
        }
        stage_done("encode", &table, started);

        if config.impute {
            let started = Instant::now();
            report = report.imputation(impute(&mut table)?);
            stage_done("impute", &table, started);
        }

        if let Some(column) = config.analysed_columns().into_iter().find(|c| !table.has_column(c)) {
            return Err(SurveyError::MissingRequiredColumn {
                column: column.to_string(),
                stage: "stats".to_string(),
            });
        }

        let started = Instant::now();
        if !config.summary_columns.is_empty() {
            report = report.summary(describe(&table, &config.summary_columns)?);
        }
        for pair in &config.correlations {
            report = report.correlation(pearson(&table, &pair.x, &pair.y)?);
        }
        for columns in &config.correlation_matrices {
            report = report.correlation_matrix(correlation_matrix(&table, columns)?);
        }
        for spec in &config.group_means {
            report = report.group_means(group_means(&table, &spec.group_column, &spec.columns)?);
        }
        for test in &config.t_tests {
            report = report.t_test(t_test(&table, test)?);
        }
        for spec in &config.regressions {
            report = report.regression(linear_regression(&table, spec)?);
        }
        stage_done("stats", &table, started);

        let report = report.build();
        stage_done("pipeline", &table, run_started);
        Ok(PipelineOutput {
            table,
            report,
            encoders,
        })
    }
}
