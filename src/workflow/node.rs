//! Job Descriptors and Invocation Nodes
//!
//! An [`Executable`] binds a logical job name to the concrete program and
//! run context and is created once per stage-setup call. A [`Node`] is one
//! invocation of that descriptor: an ordered argument list plus the files
//! the invocation declares as produced.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};
use crate::workflow::config::Config;
use crate::workflow::detector::DetectorSet;
use crate::workflow::file::{FileList, OutputFile};
use crate::workflow::model::Universe;

/// One command-line argument: a flag and an optional value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Argument {
    pub flag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Job descriptor: logical name bound to a program, resource profile, and
/// run context. Created once per stage-setup call and reused by every node
/// the call spawns.
#[derive(Debug, Clone)]
pub struct Executable {
    /// Logical job name, also the `[executables]` lookup key.
    pub name: String,
    /// Concrete program path from the `[executables]` section.
    pub program: String,
    /// Scheduling universe for the exported plan.
    pub universe: Universe,
    /// Detectors participating in this job type.
    pub detectors: DetectorSet,
    /// Directory the job's products land in.
    pub out_dir: PathBuf,
    /// Processing-pass tags active for this descriptor.
    pub tags: Vec<String>,
    /// Options from the `[{name}]` section, seeded into every node.
    section_opts: Vec<(String, String)>,
}

impl Executable {
    /// Resolves a logical job name against the configuration.
    ///
    /// The program path comes from the `[executables]` section; options in
    /// the `[{name}]` section become per-node defaults. A missing program
    /// entry is an error.
    pub fn new(
        config: &Config,
        name: &str,
        universe: Universe,
        detectors: &DetectorSet,
        out_dir: &Path,
        tags: &[String],
    ) -> Result<Self> {
        let program = config
            .get_opt("executables", name)
            .ok_or_else(|| PlanError::UnknownExecutable(name.to_string()))?
            .to_string();

        Ok(Self {
            name: name.to_string(),
            program,
            universe,
            detectors: detectors.clone(),
            out_dir: out_dir.to_path_buf(),
            tags: tags.to_vec(),
            section_opts: config.section_items(name),
        })
    }

    /// Concatenated detector string for this descriptor.
    pub fn ifo_string(&self) -> String {
        self.detectors.ifo_string()
    }
}

/// One invocation of a job descriptor.
#[derive(Debug, Clone)]
pub struct Node {
    /// Descriptor this invocation was built from.
    pub executable: Executable,
    /// Arguments in insertion order.
    pub args: Vec<Argument>,
    /// Files this invocation declares as produced.
    pub outputs: FileList,
}

impl Node {
    /// Creates a node, seeding arguments from the descriptor's config
    /// section. An empty section value becomes a bare flag.
    pub fn new(executable: &Executable) -> Self {
        let mut node = Self {
            executable: executable.clone(),
            args: Vec::new(),
            outputs: FileList::new(),
        };
        for (name, value) in &executable.section_opts {
            let flag = format!("--{}", name);
            if value.is_empty() {
                node.add_flag(flag);
            } else {
                node.add_opt(flag, value.clone());
            }
        }
        node
    }

    /// Appends a valued option.
    pub fn add_opt(&mut self, flag: impl Into<String>, value: impl Into<String>) {
        self.args.push(Argument {
            flag: flag.into(),
            value: Some(value.into()),
        });
    }

    /// Appends a bare flag.
    pub fn add_flag(&mut self, flag: impl Into<String>) {
        self.args.push(Argument {
            flag: flag.into(),
            value: None,
        });
    }

    /// Declares an output file of this invocation.
    pub fn add_output(&mut self, file: OutputFile) {
        self.outputs.push(file);
    }

    /// Value of the first occurrence of a valued option.
    pub fn opt_value(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .find(|arg| arg.flag == flag)
            .and_then(|arg| arg.value.as_deref())
    }

    /// Checks for a bare flag.
    pub fn has_flag(&self, flag: &str) -> bool {
        self.args
            .iter()
            .any(|arg| arg.flag == flag && arg.value.is_none())
    }

    /// Renders the argument list in insertion order.
    pub fn arg_list(&self) -> Vec<String> {
        let mut rendered = Vec::new();
        for arg in &self.args {
            rendered.push(arg.flag.clone());
            if let Some(value) = &arg.value {
                rendered.push(value.clone());
            }
        }
        rendered
    }
}
