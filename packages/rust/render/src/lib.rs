//! Report rendering and HTML optimization for SuperAnalyze.
//!
//! - [`ReportRenderer`] turns an [`AnalysisResult`](superanalyze_shared::AnalysisResult)
//!   into a standalone HTML page using built-in `minijinja` templates.
//! - [`optimize`] minifies that page with `minify-html` and rejects any
//!   result whose visible text differs from the input.

pub mod optimizer;
pub mod renderer;

pub use optimizer::{optimize, visible_text};
pub use renderer::{REPORT_TEMPLATE, ReportRenderer, body_as_html, report_parameters};
