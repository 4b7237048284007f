//! External Resource Handling
//!
//! The assembly phase occasionally has to leave the process: pulling a
//! definer file from a remote server, or shelling out to a query tool whose
//! results the plan depends on. This module keeps those escapes in one
//! place. Components:
//! - `fetch_resource`: materializes a URL (http, https, file, or plain
//!   path) into a local destination
//! - `make_external_call`: runs a program and captures stdout/stderr into
//!   timestamped log files
//! - `resource_basename`: final path component of a URL

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::Utc;
use log::{debug, error, info};
use once_cell::sync::Lazy;

use crate::error::{PlanError, Result};

/// Shared client for definer downloads; built on first use.
static HTTP_CLIENT: Lazy<reqwest::blocking::Client> =
    Lazy::new(reqwest::blocking::Client::new);

/// Materializes `url` at `dest` and returns the destination path.
///
/// `http://` and `https://` URLs are downloaded; `file://` URLs and bare
/// paths are copied. Parent directories of `dest` are created as needed.
///
/// # Arguments
/// * `url` - Source location of the resource
/// * `dest` - Local path the resource should end up at
pub fn fetch_resource(url: &str, dest: &Path) -> Result<PathBuf> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    if url.starts_with("http://") || url.starts_with("https://") {
        info!("Downloading resource: {}", url);
        let response = HTTP_CLIENT.get(url).send().map_err(|err| PlanError::Fetch {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
        if !response.status().is_success() {
            return Err(PlanError::Fetch {
                url: url.to_string(),
                reason: format!("server returned {}", response.status()),
            });
        }
        let bytes = response.bytes().map_err(|err| PlanError::Fetch {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
        fs::write(dest, &bytes)?;
    } else {
        let source = url.strip_prefix("file://").unwrap_or(url);
        debug!("Copying local resource: {}", source);
        fs::copy(source, dest).map_err(|err| PlanError::Fetch {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
    }

    Ok(dest.to_path_buf())
}

/// Runs `program` with `args`, capturing stdout and stderr into
/// `{basename}-{timestamp}.out` / `.err` under `log_dir`.
///
/// The log files are written even when the call fails, so the captured
/// output survives for post-mortems.
pub fn make_external_call(
    program: &str,
    args: &[String],
    log_dir: &Path,
    basename: &str,
) -> Result<()> {
    fs::create_dir_all(log_dir)?;

    debug!("External call: {} {}", program, args.join(" "));
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|err| PlanError::ExternalCall {
            program: program.to_string(),
            status: err.to_string(),
            log_dir: log_dir.to_path_buf(),
        })?;

    let stamp = Utc::now().format("%Y%m%dT%H%M%SZ");
    let stdout_path = log_dir.join(format!("{}-{}.out", basename, stamp));
    let stderr_path = log_dir.join(format!("{}-{}.err", basename, stamp));
    fs::write(&stdout_path, &output.stdout)?;
    fs::write(&stderr_path, &output.stderr)?;

    if output.status.success() {
        debug!("External call finished: {}", program);
        Ok(())
    } else {
        error!(
            "External call '{}' failed; captured output in {}",
            program,
            log_dir.display()
        );
        Err(PlanError::ExternalCall {
            program: program.to_string(),
            status: output.status.to_string(),
            log_dir: log_dir.to_path_buf(),
        })
    }
}

/// Final path component of a URL, or `None` when the URL ends in a slash.
pub fn resource_basename(url: &str) -> Option<&str> {
    url.rsplit('/').next().filter(|name| !name.is_empty())
}
