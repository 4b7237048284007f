//! Summary Plotting Stages
//!
//! Assembles the plotting jobs that summarize one search run: trigger
//! plots, inspiral range plots, template count plots, and the coincidence
//! plots spanning every detector combination. Components:
//! - `Stage` / `StageSet`: which plotting stages to assemble
//! - `SummaryPatterns`: cache patterns the plotters select inputs with
//! - `setup_*` routines: register the nodes of one stage
//! - `setup_summary_plots`: runs the selected stages in a fixed order
//!
//! Every routine follows the same contract: called with no processing
//! tags it does nothing and returns an empty list; otherwise it creates
//! the output directory, registers its nodes, links each node to the
//! producers of the stage inputs, and returns the files later stages may
//! consume. The plotters publish through their output path rather than
//! declared products, so the returned lists are empty.

use std::path::Path;

use log::info;

use crate::error::{PlanError, Result};
use crate::stages::ensure_output_dir;
use crate::workflow::file::FileList;
use crate::workflow::graph::Workflow;
use crate::workflow::model::{AnalysisWindow, Universe};
use crate::workflow::node::{Executable, Node};

/// `[executables]` key of the trigger plotter.
pub const TRIGGER_PLOTS_EXE: &str = "trigger_plots";
/// `[executables]` key of the inspiral range plotter.
pub const RANGE_PLOTS_EXE: &str = "range_plots";
/// `[executables]` key of the template count plotter.
pub const TEMPLATE_COUNT_PLOTS_EXE: &str = "template_count_plots";
/// `[executables]` key of the coincidence plotter.
pub const COINCIDENCE_PLOTS_EXE: &str = "coincidence_plots";

/// Appended to the upper-cased processing tag to form each node's user tag.
const USER_TAG_SUFFIX: &str = "_SUMMARY_PLOTS";

/// One summary plotting stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Single-detector trigger plots.
    TriggerPlots,
    /// Inspiral range plots.
    RangePlots,
    /// Template bank size plots.
    TemplateCountPlots,
    /// Coincident trigger plots over detector combinations.
    CoincidencePlots,
}

/// Selection of summary stages to assemble.
///
/// The default selection leaves out the coincidence plots; they only make
/// sense once a coincidence analysis is part of the run, so they are
/// opt-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSet {
    enabled: Vec<Stage>,
}

impl Default for StageSet {
    fn default() -> Self {
        Self {
            enabled: vec![
                Stage::TriggerPlots,
                Stage::RangePlots,
                Stage::TemplateCountPlots,
            ],
        }
    }
}

impl StageSet {
    /// Every stage, coincidence plots included.
    pub fn all() -> Self {
        Self::default().with(Stage::CoincidencePlots)
    }

    /// Adds a stage to the selection.
    pub fn with(mut self, stage: Stage) -> Self {
        if !self.enabled.contains(&stage) {
            self.enabled.push(stage);
        }
        self
    }

    /// Removes a stage from the selection.
    pub fn without(mut self, stage: Stage) -> Self {
        self.enabled.retain(|s| *s != stage);
        self
    }

    /// Checks whether a stage is selected.
    pub fn contains(&self, stage: Stage) -> bool {
        self.enabled.contains(&stage)
    }
}

/// Cache patterns the plotters use to pick their inputs.
///
/// The coincidence patterns stay unset until a coincidence analysis
/// provides them; enabling that stage without them is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryPatterns {
    /// Matches single-detector trigger files.
    pub trigger_pattern: String,
    /// Matches template bank files.
    pub bank_pattern: String,
    /// Matches zero-lag coincident trigger files.
    pub coinc_pattern: Option<String>,
    /// Matches time-slide coincident trigger files.
    pub slide_pattern: Option<String>,
}

impl SummaryPatterns {
    /// Patterns for the always-available stages.
    pub fn new(trigger_pattern: impl Into<String>, bank_pattern: impl Into<String>) -> Self {
        Self {
            trigger_pattern: trigger_pattern.into(),
            bank_pattern: bank_pattern.into(),
            coinc_pattern: None,
            slide_pattern: None,
        }
    }

    /// Adds the patterns the coincidence stage needs.
    pub fn with_coincidence(
        mut self,
        coinc_pattern: impl Into<String>,
        slide_pattern: impl Into<String>,
    ) -> Self {
        self.coinc_pattern = Some(coinc_pattern.into());
        self.slide_pattern = Some(slide_pattern.into());
        self
    }
}

/// Sets up trigger plotting: one node per processing tag, covering the
/// full detector set of the run.
pub fn setup_trigger_plots(
    workflow: &mut Workflow,
    inputs: &FileList,
    cache_file: &str,
    patterns: &SummaryPatterns,
    out_dir: &Path,
    tags: &[String],
) -> Result<FileList> {
    if tags.is_empty() {
        return Ok(FileList::new());
    }
    ensure_output_dir(out_dir)?;
    info!("Setting up trigger plots: {} tag(s)", tags.len());

    let exe = Executable::new(
        &workflow.config,
        TRIGGER_PLOTS_EXE,
        Universe::Vanilla,
        &workflow.detectors,
        out_dir,
        tags,
    )?;
    let ifo_string = workflow.detectors.ifo_string();

    for tag in tags {
        let mut node = Node::new(&exe);
        attach_common_opts(&mut node, workflow.window, cache_file, &ifo_string);
        node.add_opt("--ifo-tag", format!("FIRST_{}", ifo_string));
        attach_naming_opts(&mut node, tag, out_dir);
        node.add_opt("--trig-pattern", patterns.trigger_pattern.clone());
        node.add_flag("--enable-output");

        let id = workflow.add_node(node);
        workflow.link_inputs(inputs, id);
    }

    Ok(FileList::new())
}

/// Sets up inspiral range plotting: one node per processing tag.
pub fn setup_range_plots(
    workflow: &mut Workflow,
    inputs: &FileList,
    cache_file: &str,
    patterns: &SummaryPatterns,
    out_dir: &Path,
    tags: &[String],
) -> Result<FileList> {
    if tags.is_empty() {
        return Ok(FileList::new());
    }
    ensure_output_dir(out_dir)?;
    info!("Setting up range plots: {} tag(s)", tags.len());

    let exe = Executable::new(
        &workflow.config,
        RANGE_PLOTS_EXE,
        Universe::Vanilla,
        &workflow.detectors,
        out_dir,
        tags,
    )?;
    let ifo_string = workflow.detectors.ifo_string();

    for tag in tags {
        let mut node = Node::new(&exe);
        attach_common_opts(&mut node, workflow.window, cache_file, &ifo_string);
        attach_naming_opts(&mut node, tag, out_dir);
        node.add_opt("--bank-pattern", patterns.bank_pattern.clone());
        node.add_opt("--trig-pattern", patterns.trigger_pattern.clone());
        node.add_flag("--enable-output");

        let id = workflow.add_node(node);
        workflow.link_inputs(inputs, id);
    }

    Ok(FileList::new())
}

/// Sets up template count plotting: one node per processing tag.
pub fn setup_template_count_plots(
    workflow: &mut Workflow,
    inputs: &FileList,
    cache_file: &str,
    patterns: &SummaryPatterns,
    out_dir: &Path,
    tags: &[String],
) -> Result<FileList> {
    if tags.is_empty() {
        return Ok(FileList::new());
    }
    ensure_output_dir(out_dir)?;
    info!("Setting up template count plots: {} tag(s)", tags.len());

    let exe = Executable::new(
        &workflow.config,
        TEMPLATE_COUNT_PLOTS_EXE,
        Universe::Vanilla,
        &workflow.detectors,
        out_dir,
        tags,
    )?;
    let ifo_string = workflow.detectors.ifo_string();

    for tag in tags {
        let mut node = Node::new(&exe);
        attach_common_opts(&mut node, workflow.window, cache_file, &ifo_string);
        attach_naming_opts(&mut node, tag, out_dir);
        node.add_opt("--bank-pattern", patterns.bank_pattern.clone());
        node.add_flag("--enable-output");

        let id = workflow.add_node(node);
        workflow.link_inputs(inputs, id);
    }

    Ok(FileList::new())
}

/// Sets up coincidence plotting: one node per processing tag and coincident
/// detector subset, so a three-detector run with one tag yields four nodes.
///
/// Requires both coincidence patterns; assembling this stage without them
/// fails with [`PlanError::MissingPattern`].
pub fn setup_coincidence_plots(
    workflow: &mut Workflow,
    inputs: &FileList,
    cache_file: &str,
    patterns: &SummaryPatterns,
    out_dir: &Path,
    tags: &[String],
) -> Result<FileList> {
    if tags.is_empty() {
        return Ok(FileList::new());
    }
    let coinc_pattern = require_pattern(patterns.coinc_pattern.as_deref(), "coinc-pattern")?;
    let slide_pattern = require_pattern(patterns.slide_pattern.as_deref(), "slide-pattern")?;
    ensure_output_dir(out_dir)?;

    let subsets = workflow.detectors.coincident_subsets();
    info!(
        "Setting up coincidence plots: {} tag(s) over {} detector subset(s)",
        tags.len(),
        subsets.len()
    );

    let exe = Executable::new(
        &workflow.config,
        COINCIDENCE_PLOTS_EXE,
        Universe::Vanilla,
        &workflow.detectors,
        out_dir,
        tags,
    )?;

    for tag in tags {
        for subset in &subsets {
            let subset_string = subset.ifo_string();
            let mut node = Node::new(&exe);
            attach_common_opts(&mut node, workflow.window, cache_file, &subset_string);
            node.add_opt("--ifo-tag", format!("SECOND_{}", subset_string));
            for detector in subset.iter() {
                node.add_flag(trigger_flag(detector));
            }
            attach_naming_opts(&mut node, tag, out_dir);
            node.add_opt("--coinc-pattern", coinc_pattern.as_str());
            node.add_opt("--slide-pattern", slide_pattern.as_str());
            node.add_flag("--enable-output");

            let id = workflow.add_node(node);
            workflow.link_inputs(inputs, id);
        }
    }

    Ok(FileList::new())
}

/// Runs the selected summary stages in a fixed order: trigger plots, range
/// plots, template count plots, then coincidence plots.
pub fn setup_summary_plots(
    workflow: &mut Workflow,
    inputs: &FileList,
    cache_file: &str,
    patterns: &SummaryPatterns,
    stages: &StageSet,
    out_dir: &Path,
    tags: &[String],
) -> Result<FileList> {
    if tags.is_empty() {
        return Ok(FileList::new());
    }
    ensure_output_dir(out_dir)?;
    info!("Entering summary plot setup: {}", out_dir.display());
    let before = workflow.node_count();

    let mut out_files = FileList::new();
    if stages.contains(Stage::TriggerPlots) {
        out_files.extend(setup_trigger_plots(
            workflow, inputs, cache_file, patterns, out_dir, tags,
        )?);
    }
    if stages.contains(Stage::RangePlots) {
        out_files.extend(setup_range_plots(
            workflow, inputs, cache_file, patterns, out_dir, tags,
        )?);
    }
    if stages.contains(Stage::TemplateCountPlots) {
        out_files.extend(setup_template_count_plots(
            workflow, inputs, cache_file, patterns, out_dir, tags,
        )?);
    }
    if stages.contains(Stage::CoincidencePlots) {
        out_files.extend(setup_coincidence_plots(
            workflow, inputs, cache_file, patterns, out_dir, tags,
        )?);
    }

    info!(
        "Leaving summary plot setup: {} node(s) registered",
        workflow.node_count() - before
    );
    Ok(out_files)
}

/// Options shared by every summary plotting node, in their canonical order.
fn attach_common_opts(node: &mut Node, window: AnalysisWindow, cache_file: &str, ifo_times: &str) {
    node.add_opt("--gps-start-time", window.start.to_string());
    node.add_opt("--gps-end-time", window.end.to_string());
    node.add_opt("--cache-file", cache_file);
    node.add_opt("--ifo-times", ifo_times);
}

/// Options naming a node's products.
fn attach_naming_opts(node: &mut Node, tag: &str, out_dir: &Path) {
    node.add_opt("--user-tag", user_tag(tag));
    node.add_opt("--output-path", out_dir.display().to_string());
}

/// User tag of a node: the upper-cased processing tag plus the stage suffix.
fn user_tag(tag: &str) -> String {
    format!("{}{}", tag.to_uppercase(), USER_TAG_SUFFIX)
}

/// Per-detector trigger selection flag, e.g. `--h1-triggers`.
fn trigger_flag(detector: &str) -> String {
    format!("--{}-triggers", detector.to_lowercase())
}

fn require_pattern(pattern: Option<&str>, name: &str) -> Result<String> {
    pattern
        .map(str::to_string)
        .ok_or_else(|| PlanError::MissingPattern {
            stage: COINCIDENCE_PLOTS_EXE.to_string(),
            pattern: name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::config::Config;
    use crate::workflow::file::OutputFile;
    use crate::workflow::node::Executable;

    fn build_workflow(detectors: &str) -> Workflow {
        let mut config = Config::new();
        config.set("workflow", "detectors", detectors);
        config.set("workflow", "start-time", "900000000");
        config.set("workflow", "end-time", "900002048");
        config.set("executables", "trigger_plots", "/usr/bin/plot_triggers");
        config.set("executables", "range_plots", "/usr/bin/plot_range");
        config.set("executables", "template_count_plots", "/usr/bin/plot_banksize");
        config.set("executables", "coincidence_plots", "/usr/bin/plot_coincs");
        config.set("executables", "upstream", "/usr/bin/upstream");
        Workflow::new(config).unwrap()
    }

    fn tag_list(tags: &[&str]) -> Vec<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    fn patterns() -> SummaryPatterns {
        SummaryPatterns::new("INSPIRAL_FULL", "TMPLTBANK")
    }

    fn coinc_patterns() -> SummaryPatterns {
        patterns().with_coincidence("COINC", "COINC_SLIDE")
    }

    fn produced_inputs(workflow: &mut Workflow, count: usize) -> FileList {
        let exe = Executable::new(
            &workflow.config,
            "upstream",
            Universe::Vanilla,
            &workflow.detectors,
            Path::new("/data/upstream"),
            &[],
        )
        .unwrap();

        let mut inputs = FileList::new();
        for index in 0..count {
            let mut node = Node::new(&exe);
            node.add_output(OutputFile::new(
                workflow.detectors.ifo_string(),
                format!("INSPIRAL_{}", index),
                workflow.window,
                "xml.gz",
                "/data/upstream",
            ));
            let id = workflow.add_node(node);
            inputs.extend(workflow.outputs_of(id).unwrap().clone());
        }
        inputs
    }

    #[test]
    fn test_stage_set_default_excludes_coincidence() {
        let stages = StageSet::default();
        assert!(stages.contains(Stage::TriggerPlots));
        assert!(stages.contains(Stage::RangePlots));
        assert!(stages.contains(Stage::TemplateCountPlots));
        assert!(!stages.contains(Stage::CoincidencePlots));
    }

    #[test]
    fn test_stage_set_with_without() {
        let stages = StageSet::all().without(Stage::RangePlots);
        assert!(stages.contains(Stage::CoincidencePlots));
        assert!(!stages.contains(Stage::RangePlots));

        let again = stages.with(Stage::RangePlots).with(Stage::RangePlots);
        assert!(again.contains(Stage::RangePlots));
    }

    #[test]
    fn test_user_tag_and_trigger_flag() {
        assert_eq!(user_tag("full_data"), "FULL_DATA_SUMMARY_PLOTS");
        assert_eq!(trigger_flag("H1"), "--h1-triggers");
    }

    #[test]
    fn test_ensure_output_dir_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("plots");

        ensure_output_dir(&out_dir).unwrap();
        ensure_output_dir(&out_dir).unwrap();
        assert!(out_dir.is_dir());
    }

    #[test]
    fn test_trigger_plots_one_node_per_tag() {
        let dir = tempfile::tempdir().unwrap();
        let mut workflow = build_workflow("H1,L1");
        let tags = tag_list(&["full_data", "playground"]);

        setup_trigger_plots(
            &mut workflow,
            &FileList::new(),
            "run.cache",
            &patterns(),
            dir.path(),
            &tags,
        )
        .unwrap();

        assert_eq!(workflow.node_count(), 2);
        let node = workflow.nodes().next().unwrap();
        assert_eq!(node.opt_value("--ifo-times"), Some("H1L1"));
        assert_eq!(node.opt_value("--ifo-tag"), Some("FIRST_H1L1"));
        assert_eq!(node.opt_value("--user-tag"), Some("FULL_DATA_SUMMARY_PLOTS"));
        assert_eq!(node.opt_value("--trig-pattern"), Some("INSPIRAL_FULL"));
        assert!(node.has_flag("--enable-output"));
    }

    #[test]
    fn test_range_plots_argument_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut workflow = build_workflow("H1,L1");
        let tags = tag_list(&["full_data"]);

        setup_range_plots(
            &mut workflow,
            &FileList::new(),
            "run.cache",
            &patterns(),
            dir.path(),
            &tags,
        )
        .unwrap();

        let node = workflow.nodes().next().unwrap();
        let expected = vec![
            "--gps-start-time".to_string(),
            "900000000".to_string(),
            "--gps-end-time".to_string(),
            "900002048".to_string(),
            "--cache-file".to_string(),
            "run.cache".to_string(),
            "--ifo-times".to_string(),
            "H1L1".to_string(),
            "--user-tag".to_string(),
            "FULL_DATA_SUMMARY_PLOTS".to_string(),
            "--output-path".to_string(),
            dir.path().display().to_string(),
            "--bank-pattern".to_string(),
            "TMPLTBANK".to_string(),
            "--trig-pattern".to_string(),
            "INSPIRAL_FULL".to_string(),
            "--enable-output".to_string(),
        ];
        assert_eq!(node.arg_list(), expected);
    }

    #[test]
    fn test_template_count_plots_skip_trigger_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let mut workflow = build_workflow("H1,L1");
        let tags = tag_list(&["full_data"]);

        setup_template_count_plots(
            &mut workflow,
            &FileList::new(),
            "run.cache",
            &patterns(),
            dir.path(),
            &tags,
        )
        .unwrap();

        assert_eq!(workflow.node_count(), 1);
        let node = workflow.nodes().next().unwrap();
        assert_eq!(node.opt_value("--bank-pattern"), Some("TMPLTBANK"));
        assert_eq!(node.opt_value("--trig-pattern"), None);
        assert_eq!(node.opt_value("--ifo-tag"), None);
    }

    #[test]
    fn test_empty_tags_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("plots");
        let mut workflow = build_workflow("H1,L1");

        let files = setup_summary_plots(
            &mut workflow,
            &FileList::new(),
            "run.cache",
            &coinc_patterns(),
            &StageSet::all(),
            &out_dir,
            &[],
        )
        .unwrap();

        assert!(files.is_empty());
        assert_eq!(workflow.node_count(), 0);
        assert!(!out_dir.exists());
    }

    #[test]
    fn test_coincidence_plots_cover_all_subsets() {
        let dir = tempfile::tempdir().unwrap();
        let mut workflow = build_workflow("H1,L1,V1");
        let tags = tag_list(&["full_data"]);

        setup_coincidence_plots(
            &mut workflow,
            &FileList::new(),
            "run.cache",
            &coinc_patterns(),
            dir.path(),
            &tags,
        )
        .unwrap();

        assert_eq!(workflow.node_count(), 4);
        let ifo_tags: Vec<_> = workflow
            .nodes()
            .map(|node| node.opt_value("--ifo-tag").unwrap().to_string())
            .collect();
        assert_eq!(
            ifo_tags,
            ["SECOND_H1L1", "SECOND_H1V1", "SECOND_L1V1", "SECOND_H1L1V1"]
        );

        let first = workflow.nodes().next().unwrap();
        assert!(first.has_flag("--h1-triggers"));
        assert!(first.has_flag("--l1-triggers"));
        assert!(!first.has_flag("--v1-triggers"));
        assert_eq!(first.opt_value("--coinc-pattern"), Some("COINC"));
        assert_eq!(first.opt_value("--slide-pattern"), Some("COINC_SLIDE"));
    }

    #[test]
    fn test_coincidence_plots_node_count_scales_with_tags() {
        let dir = tempfile::tempdir().unwrap();
        let mut workflow = build_workflow("H1,L1");
        let tags = tag_list(&["full_data", "playground"]);

        setup_coincidence_plots(
            &mut workflow,
            &FileList::new(),
            "run.cache",
            &coinc_patterns(),
            dir.path(),
            &tags,
        )
        .unwrap();

        // one subset (H1L1) times two tags
        assert_eq!(workflow.node_count(), 2);
    }

    #[test]
    fn test_coincidence_plots_require_patterns() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("plots");
        let mut workflow = build_workflow("H1,L1");
        let tags = tag_list(&["full_data"]);

        let result = setup_coincidence_plots(
            &mut workflow,
            &FileList::new(),
            "run.cache",
            &patterns(),
            &out_dir,
            &tags,
        );

        assert!(matches!(result, Err(PlanError::MissingPattern { .. })));
        assert!(!out_dir.exists());
    }

    #[test]
    fn test_nodes_depend_on_every_input_producer() {
        let dir = tempfile::tempdir().unwrap();
        let mut workflow = build_workflow("H1,L1");
        let inputs = produced_inputs(&mut workflow, 2);
        let tags = tag_list(&["full_data", "playground"]);

        setup_trigger_plots(
            &mut workflow,
            &inputs,
            "run.cache",
            &patterns(),
            dir.path(),
            &tags,
        )
        .unwrap();

        // two producers feeding each of the two plot nodes
        assert_eq!(workflow.node_count(), 4);
        assert_eq!(workflow.edge_count(), 4);
        workflow.validate().unwrap();
    }

    #[test]
    fn test_dispatcher_default_stage_selection() {
        let dir = tempfile::tempdir().unwrap();
        let mut workflow = build_workflow("H1,L1");
        let tags = tag_list(&["full_data"]);

        let files = setup_summary_plots(
            &mut workflow,
            &FileList::new(),
            "run.cache",
            &coinc_patterns(),
            &StageSet::default(),
            dir.path(),
            &tags,
        )
        .unwrap();

        // trigger, range, and template count stages only
        assert!(files.is_empty());
        assert_eq!(workflow.node_count(), 3);
    }

    #[test]
    fn test_dispatcher_all_stages() {
        let dir = tempfile::tempdir().unwrap();
        let mut workflow = build_workflow("H1,L1");
        let tags = tag_list(&["full_data"]);

        setup_summary_plots(
            &mut workflow,
            &FileList::new(),
            "run.cache",
            &coinc_patterns(),
            &StageSet::all(),
            dir.path(),
            &tags,
        )
        .unwrap();

        assert_eq!(workflow.node_count(), 4);
    }

    #[test]
    fn test_dispatcher_creates_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("summary").join("plots");
        let mut workflow = build_workflow("H1,L1");

        setup_summary_plots(
            &mut workflow,
            &FileList::new(),
            "run.cache",
            &patterns(),
            &StageSet::default(),
            &out_dir,
            &tag_list(&["full_data"]),
        )
        .unwrap();

        assert!(out_dir.is_dir());
    }

    #[test]
    fn test_missing_executable_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::new();
        config.set("workflow", "detectors", "H1,L1");
        config.set("workflow", "start-time", "900000000");
        config.set("workflow", "end-time", "900002048");
        let mut workflow = Workflow::new(config).unwrap();

        let result = setup_trigger_plots(
            &mut workflow,
            &FileList::new(),
            "run.cache",
            &patterns(),
            dir.path(),
            &tag_list(&["full_data"]),
        );

        assert!(matches!(result, Err(PlanError::UnknownExecutable(_))));
    }
}
