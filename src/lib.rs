//! gwplan - Summary-Stage Workflow Assembly
//!
//! Assembles the summary stages of a multi-detector search into an
//! executable plan: plotting jobs over every processing tag and detector
//! combination, the hardware-injection report page, and the dependency
//! edges wiring them to the stages that feed them. The finished plan is
//! validated and exported for an external engine; executing it is out of
//! scope here.
//!
//! # Architecture
//!
//! The library is organized into four main modules:
//!
//! - [`workflow`]: Configuration, detectors, file records, nodes, and the
//!   dependency graph
//! - [`stages`]: Stage-setup routines that register the summary jobs
//! - [`external`]: Resource fetching and captured external calls
//! - [`error`]: Error type shared across the crate
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use gwplan::stages::{setup_summary_plots, StageSet, SummaryPatterns};
//! use gwplan::workflow::{Config, FileList, Workflow};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Load the run configuration
//!     let config = Config::load(Path::new("run.yaml"))?;
//!     let mut workflow = Workflow::new(config)?;
//!
//!     // Assemble the default summary stages for one processing tag
//!     let patterns = SummaryPatterns::new("INSPIRAL_FULL", "TMPLTBANK");
//!     let tags = vec!["full_data".to_string()];
//!     setup_summary_plots(
//!         &mut workflow,
//!         &FileList::new(),
//!         "run.cache",
//!         &patterns,
//!         &StageSet::default(),
//!         Path::new("summary_plots"),
//!         &tags,
//!     )?;
//!
//!     // Check the graph and export the plan
//!     workflow.validate()?;
//!     workflow.save(Path::new("plan.yaml"))?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod external;
pub mod stages;
pub mod workflow;

// Re-export commonly used types
pub use error::{PlanError, Result};
pub use stages::{setup_hwinj_report, setup_summary_plots, StageSet, SummaryPatterns};
pub use workflow::{Config, FileList, OutputFile, Workflow};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "gwplan";
