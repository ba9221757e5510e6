//! # survey-insight
//!
//! Feature engineering and summary statistics for flat survey tables.
//!
//! survey-insight turns a raw table (imperial measurements, integer ages,
//! categorical answers) into an analysis-ready one and computes the
//! statistics a report or chart needs. Every stage is deterministic: the
//! same input yields the same table and the same numbers.
//!
//! ## Modules
//!
//! - [`table`] — Column-major table with explicit missing values
//! - [`ingest`] — CSV reading with type inference, header cleaning, CSV writing
//! - [`convert`] — Scale/offset unit conversion
//! - [`binning`] — Interval specifications with per-edge inclusivity
//! - [`features`] — Ratios (BMI), row means, binned labels, half-even rounding
//! - [`encoding`] — Binary encoding and fit/apply one-hot encoding
//! - [`impute`] — Median and mode imputation
//! - [`stats`] — Mean/median/std, Pearson correlation, correlation matrices, group means
//! - [`inference`] — Welch and pooled t-tests, simple linear regression
//! - [`report`] — Result packaging with Markdown and JSON rendering
//! - [`config`] — Pipeline configuration and study presets
//! - [`pipeline`] — End-to-end run
//! - [`error`] — Error types
//!
//! ## Quick Start
//!
//! ```
//! use survey_insight::config::PipelineConfig;
//! use survey_insight::ingest::CsvReader;
//! use survey_insight::pipeline::Pipeline;
//!
//! let csv = "Height,Weight,Age,Grip strength,Frailty\n\
//!            65.8,112,30,30,N\n\
//!            71.5,136,19,31,N\n\
//!            68.2,142,22,28,Y\n\
//!            70.1,136,61,20,Y\n";
//! let table = CsvReader::new().read_str(csv).unwrap();
//! let output = Pipeline::new(PipelineConfig::frailty()).run(table).unwrap();
//!
//! let bmi = output.report.summary.as_ref().unwrap().get("BMI").unwrap();
//! assert_eq!(bmi.count, 4);
//! assert!(output.report.to_markdown().contains("Correlation between Grip_kg and Frailty_binary"));
//! ```

pub mod binning;
pub mod config;
pub mod convert;
pub mod encoding;
pub mod error;
pub mod features;
pub mod impute;
pub mod inference;
pub mod ingest;
pub mod pipeline;
pub mod report;
pub mod stats;
pub mod table;
