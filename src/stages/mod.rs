//! Stage-Setup Routines
//!
//! Each routine inspects the build context, registers the nodes one
//! processing stage needs, wires them to the producers of their inputs,
//! and returns the files later stages may consume. Modules:
//! - `summary`: trigger, range, template count, and coincidence plotting
//! - `hwinj`: hardware-injection report page and its segment query

pub mod hwinj;
pub mod summary;

pub use hwinj::setup_hwinj_report;
pub use summary::{setup_summary_plots, Stage, StageSet, SummaryPatterns};

use std::fs;
use std::path::Path;

use crate::error::Result;

/// Creates a stage's output directory if it does not already exist.
pub fn ensure_output_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;
    Ok(())
}
