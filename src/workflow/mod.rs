//! Workflow Assembly Module
//!
//! Provides the data structures a plan is assembled from: run
//! configuration, detector sets, file records, job descriptors, and the
//! dependency graph that ties them together.
//!
//! # Structure
//!
//! - [`config`]: Sectioned run configuration with tag-aware lookups
//! - [`detector`]: Detector sets and their coincident combinations
//! - [`model`]: Analysis window and scheduling universe
//! - [`file`]: Output file records and file lists
//! - [`node`]: Job descriptors and per-invocation nodes
//! - [`graph`]: Build context, dependency DAG, and plan export

pub mod config;
pub mod detector;
pub mod file;
pub mod graph;
pub mod model;
pub mod node;

pub use config::Config;
pub use detector::DetectorSet;
pub use file::{FileList, OutputFile};
pub use graph::{Dag, NodeId, PlanDoc, Workflow};
pub use model::{AnalysisWindow, Universe};
pub use node::{Argument, Executable, Node};
