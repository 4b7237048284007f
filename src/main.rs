//! gwplan CLI Entry Point
//!
//! Assembles the summary-stage plan for one search run and writes it out.
//!
//! # Usage
//!
//! ```bash
//! # Assemble the default summary stages
//! gwplan run.yaml --cache-file run.cache
//!
//! # Several processing tags
//! gwplan run.yaml --cache-file run.cache --tag full_data --tag playground
//!
//! # Include the coincidence plots and the hardware injection report
//! gwplan run.yaml --cache-file run.cache --enable-coincidence --with-hwinj
//!
//! # Validate without writing the plan
//! gwplan run.yaml --cache-file run.cache --dry-run
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use log::{error, info};

use gwplan::stages::{setup_hwinj_report, setup_summary_plots, StageSet, SummaryPatterns};
use gwplan::workflow::{Config, FileList, Workflow};
use gwplan::{APP_NAME, VERSION};

/// Processing tag assumed when none is given.
const DEFAULT_TAG: &str = "full_data";

/// Default path of the exported plan.
const DEFAULT_PLAN: &str = "plan.yaml";

/// Config section holding the summary cache patterns.
const SUMMARY_SECTION: &str = "workflow-summary";

/// Command-line configuration parsed from arguments.
#[derive(Debug)]
struct CliOptions {
    config_path: String,
    cache_file: String,
    output_dir: PathBuf,
    inputs_manifest: Option<PathBuf>,
    tags: Vec<String>,
    plan_out: PathBuf,
    enable_coincidence: bool,
    with_hwinj: bool,
    dry_run: bool,
    verbose: bool,
}

impl Default for CliOptions {
    fn default() -> Self {
        Self {
            config_path: String::new(),
            cache_file: String::new(),
            output_dir: PathBuf::from("."),
            inputs_manifest: None,
            tags: Vec::new(),
            plan_out: PathBuf::from(DEFAULT_PLAN),
            enable_coincidence: false,
            with_hwinj: false,
            dry_run: false,
            verbose: false,
        }
    }
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME, VERSION);
    println!("Summary-Stage Workflow Assembly");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: gwplan [OPTIONS] <CONFIG_FILE>");
    println!();
    println!("Arguments:");
    println!("  <CONFIG_FILE>         Path to the run configuration YAML file");
    println!();
    println!("Options:");
    println!("  --cache-file PATH     Cache the plot jobs read triggers from (required)");
    println!("  --output-dir PATH     Directory stage outputs land in (default: .)");
    println!("  --inputs PATH         Manifest of files produced by earlier stages");
    println!("  --tag NAME            Processing tag; repeat for several (default: {})", DEFAULT_TAG);
    println!("  --plan PATH           Where to write the assembled plan (default: {})", DEFAULT_PLAN);
    println!("  --enable-coincidence  Also assemble the coincidence plotting stage");
    println!("  --with-hwinj          Also assemble the hardware injection report");
    println!("  --dry-run             Assemble and validate without writing the plan");
    println!("  --verbose             Enable debug logging");
    println!("  --help                Show this help message");
    println!("  --version             Show version information");
    println!();
    println!("Examples:");
    println!("  gwplan run.yaml --cache-file run.cache");
    println!("  gwplan run.yaml --cache-file run.cache --tag full_data --tag playground");
    println!("  gwplan run.yaml --cache-file run.cache --with-hwinj --plan plan.json");
}

/// Parses command-line arguments into a CliOptions struct.
fn parse_arguments(args: &[String]) -> Result<CliOptions, String> {
    let mut options = CliOptions::default();
    let mut positional_index = 0;
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--enable-coincidence" => {
                options.enable_coincidence = true;
            }
            "--with-hwinj" => {
                options.with_hwinj = true;
            }
            "--dry-run" => {
                options.dry_run = true;
            }
            "--verbose" | "-v" => {
                options.verbose = true;
            }
            "--cache-file" => {
                i += 1;
                if i >= args.len() {
                    return Err("--cache-file requires a path argument".to_string());
                }
                options.cache_file = args[i].clone();
            }
            "--output-dir" => {
                i += 1;
                if i >= args.len() {
                    return Err("--output-dir requires a path argument".to_string());
                }
                options.output_dir = PathBuf::from(&args[i]);
            }
            "--inputs" => {
                i += 1;
                if i >= args.len() {
                    return Err("--inputs requires a path argument".to_string());
                }
                options.inputs_manifest = Some(PathBuf::from(&args[i]));
            }
            "--tag" => {
                i += 1;
                if i >= args.len() {
                    return Err("--tag requires a name argument".to_string());
                }
                options.tags.push(args[i].clone());
            }
            "--plan" => {
                i += 1;
                if i >= args.len() {
                    return Err("--plan requires a path argument".to_string());
                }
                options.plan_out = PathBuf::from(&args[i]);
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                // Positional argument
                match positional_index {
                    0 => options.config_path = arg.clone(),
                    _ => return Err(format!("Unexpected argument: {}", arg)),
                }
                positional_index += 1;
            }
        }
        i += 1;
    }

    if options.config_path.is_empty() {
        return Err("A configuration file argument is required".to_string());
    }
    if options.cache_file.is_empty() {
        return Err("--cache-file is required".to_string());
    }
    if options.tags.is_empty() {
        options.tags.push(DEFAULT_TAG.to_string());
    }

    Ok(options)
}

/// Builds the cache patterns from the `[workflow-summary]` section.
///
/// The trigger and bank patterns are required; the coincidence patterns
/// are picked up only when both are present.
fn load_patterns(config: &Config) -> Result<SummaryPatterns, Box<dyn std::error::Error>> {
    let trigger = config.get(SUMMARY_SECTION, "trigger-pattern")?;
    let bank = config.get(SUMMARY_SECTION, "bank-pattern")?;
    let mut patterns = SummaryPatterns::new(trigger, bank);

    let coinc = config.get_opt(SUMMARY_SECTION, "coinc-pattern");
    let slide = config.get_opt(SUMMARY_SECTION, "slide-pattern");
    if let (Some(coinc), Some(slide)) = (coinc, slide) {
        patterns = patterns.with_coincidence(coinc, slide);
    }

    Ok(patterns)
}

/// Main application entry point.
fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let options = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    // Setup logging
    setup_logging(options.verbose);

    // Print banner
    print_banner();

    if options.dry_run {
        info!("Mode: DRY RUN (plan will not be written)");
        println!();
    }

    // Load configuration and build the assembly context
    info!("Loading configuration: {}", options.config_path);
    let config = Config::load(Path::new(&options.config_path)).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        format!(
            "Could not load configuration from '{}': {}",
            options.config_path, e
        )
    })?;
    let mut workflow = Workflow::new(config)?;
    info!("Processing tags: {}", options.tags.join(", "));

    // Files from earlier stages, if a manifest was given
    let inputs = match &options.inputs_manifest {
        Some(path) => {
            let list = FileList::load(path).map_err(|e| {
                error!("Failed to load input manifest: {}", e);
                format!("Could not load input manifest from '{}': {}", path.display(), e)
            })?;
            info!("Loaded {} input file(s) from {}", list.len(), path.display());
            list
        }
        None => FileList::new(),
    };

    let patterns = load_patterns(&workflow.config)?;
    let stage_selection = if options.enable_coincidence {
        StageSet::all()
    } else {
        StageSet::default()
    };

    // Assemble the stages
    let plots_dir = options.output_dir.join("summary_plots");
    setup_summary_plots(
        &mut workflow,
        &inputs,
        &options.cache_file,
        &patterns,
        &stage_selection,
        &plots_dir,
        &options.tags,
    )?;

    if options.with_hwinj {
        let hwinj_dir = options.output_dir.join("hwinj");
        let report_files = setup_hwinj_report(
            &mut workflow,
            &inputs,
            &options.cache_file,
            &patterns.trigger_pattern,
            &hwinj_dir,
            &options.tags,
        )?;
        for file in &report_files {
            info!("Hardware injection report: {}", file.storage_path().display());
        }
    }

    // Check the graph and export the plan
    workflow.validate()?;
    info!(
        "Plan assembled: {} node(s), {} edge(s)",
        workflow.node_count(),
        workflow.edge_count()
    );

    if options.dry_run {
        info!("Dry run complete; plan not written");
    } else {
        workflow.save(&options.plan_out)?;
    }

    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
