//! Hardware-Injection Report Stage
//!
//! Assembles the single report-page job summarizing hardware injections
//! over the analysis window. Unlike the plotting stages this one reaches
//! outside the process during assembly: the injection definer file is
//! fetched to the stage directory, and the segment lists the page needs
//! are queried up front so they exist before the plan ever runs.

use std::path::Path;

use log::info;

use crate::error::{PlanError, Result};
use crate::external;
use crate::stages::ensure_output_dir;
use crate::workflow::file::{FileList, OutputFile};
use crate::workflow::graph::Workflow;
use crate::workflow::model::Universe;
use crate::workflow::node::{Executable, Node};

/// Config section holding hardware-injection settings.
pub const HWINJ_SECTION: &str = "workflow-hardware-injections";
/// Config section holding segment database settings.
pub const SEGMENTS_SECTION: &str = "workflow-segments";
/// `[executables]` key of the report page generator.
pub const HWINJ_PAGE_EXE: &str = "hwinj_page";

/// Sets up the hardware-injection report: exactly one node spanning the
/// whole run, plus the assembly-time side effects it depends on.
///
/// In order: the definer file named by `hwinj-definer-url` in
/// `[workflow-hardware-injections]` is fetched into `out_dir` and its local
/// path written back to the configuration as `hwinj-definer-file`; the
/// segment lists are queried into `out_dir`; then the report node is
/// registered and linked to the producers of `inputs`. Returns the report
/// page as the stage's single product.
///
/// # Arguments
/// * `workflow` - Build context; its configuration gains the resolved
///   definer path
/// * `inputs` - Files the report reads, used for dependency edges
/// * `cache_file` - Cache the report selects triggers from
/// * `trigger_pattern` - Cache pattern naming the trigger entries
/// * `out_dir` - Directory the report and its segment files land in
/// * `tags` - Processing tags; empty means the stage is skipped
pub fn setup_hwinj_report(
    workflow: &mut Workflow,
    inputs: &FileList,
    cache_file: &str,
    trigger_pattern: &str,
    out_dir: &Path,
    tags: &[String],
) -> Result<FileList> {
    if tags.is_empty() {
        return Ok(FileList::new());
    }
    info!("Entering hardware injection report setup");
    ensure_output_dir(out_dir)?;

    let exe = Executable::new(
        &workflow.config,
        HWINJ_PAGE_EXE,
        Universe::Vanilla,
        &workflow.detectors,
        out_dir,
        tags,
    )?;

    let definer_url = workflow
        .config
        .get_opt_tags(HWINJ_SECTION, "hwinj-definer-url", tags)?;
    let definer_name =
        external::resource_basename(&definer_url).ok_or_else(|| PlanError::Fetch {
            url: definer_url.clone(),
            reason: "URL has no file component".to_string(),
        })?;
    let definer_path = out_dir.join(definer_name);
    external::fetch_resource(&definer_url, &definer_path)?;
    workflow.config.set(
        HWINJ_SECTION,
        "hwinj-definer-file",
        definer_path.display().to_string(),
    );

    query_injection_segments(workflow, out_dir, &definer_path)?;

    let mut node = Node::new(&exe);
    node.add_opt("--gps-start-time", workflow.window.start.to_string());
    node.add_opt("--gps-end-time", workflow.window.end.to_string());
    node.add_opt("--source-xml", definer_path.display().to_string());
    node.add_opt("--segment-dir", out_dir.display().to_string());
    node.add_opt("--cache-file", cache_file);
    node.add_opt("--cache-pattern", trigger_pattern);
    node.add_flag("--analyze-injections");
    for detector in workflow.detectors.iter() {
        node.add_flag(injection_flag(detector));
    }

    let report = OutputFile::new(
        workflow.detectors.ifo_string(),
        "HWINJ_SUMMARY",
        workflow.window,
        "html",
        out_dir,
    )
    .with_tags(tags.to_vec());
    node.add_opt("--outfile", report.storage_path().display().to_string());
    node.add_output(report);

    let id = workflow.add_node(node);
    workflow.link_inputs(inputs, id);

    let mut out_files = FileList::new();
    if let Some(outputs) = workflow.outputs_of(id) {
        out_files.extend(outputs.clone());
    }

    info!("Leaving hardware injection report setup");
    Ok(out_files)
}

/// Queries the segment lists the report page reads, capturing the tool's
/// output under `logs/` in the stage directory.
///
/// The query runs the report program itself in its list-only mode, against
/// the database named by `segments-database-url` in `[workflow-segments]`.
fn query_injection_segments(
    workflow: &Workflow,
    out_dir: &Path,
    definer_path: &Path,
) -> Result<()> {
    let log_dir = out_dir.join("logs");
    let program = workflow.config.get("executables", HWINJ_PAGE_EXE)?;
    let segment_db = workflow
        .config
        .get(SEGMENTS_SECTION, "segments-database-url")?;

    let mut args = vec![
        "--gps-start-time".to_string(),
        workflow.window.start.to_string(),
        "--gps-end-time".to_string(),
        workflow.window.end.to_string(),
        "--segment-db".to_string(),
        segment_db.to_string(),
        "--segment-dir".to_string(),
        out_dir.display().to_string(),
        "--source-xml".to_string(),
        definer_path.display().to_string(),
        "--get-segment-list".to_string(),
    ];
    for detector in workflow.detectors.iter() {
        args.push(injection_flag(detector));
    }

    external::make_external_call(program, &args, &log_dir, "hwinjseg-call")
}

/// Per-detector injection selection flag, e.g. `--h1-injections`.
fn injection_flag(detector: &str) -> String {
    format!("--{}-injections", detector.to_lowercase())
}
