//! Output Artifacts
//!
//! Records describing the files a node declares as produced, named per the
//! observatory frame-file convention
//! `{IFOS}-{DESCRIPTION}-{START}-{DURATION}.{ext}` under the stage output
//! directory. A [`FileList`] is the typed sequence the stage routines
//! accept as inputs and return as products.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::workflow::graph::NodeId;
use crate::workflow::model::AnalysisWindow;

/// One produced-artifact record.
///
/// The producing node exclusively owns the record; downstream stages read
/// the `producer` back-reference to wire dependency edges and never mutate
/// it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OutputFile {
    /// Detector string the artifact covers, e.g. `"H1L1V1"`.
    pub ifos: String,
    /// Upper-case logical description embedded in the filename.
    pub description: String,
    /// Processing-pass tags, appended upper-cased to the filename.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Analysis window the artifact covers.
    pub window: AnalysisWindow,
    /// File extension without the leading dot.
    pub extension: String,
    /// Directory the artifact is stored under.
    pub directory: PathBuf,
    /// Node that produces this artifact, stamped at registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producer: Option<NodeId>,
}

impl OutputFile {
    /// Creates an artifact record with no producer.
    pub fn new(
        ifos: impl Into<String>,
        description: impl Into<String>,
        window: AnalysisWindow,
        extension: impl Into<String>,
        directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            ifos: ifos.into(),
            description: description.into(),
            tags: Vec::new(),
            window,
            extension: extension.into(),
            directory: directory.into(),
            producer: None,
        }
    }

    /// Sets the processing-pass tags carried in the filename.
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Filename following the observatory artifact convention.
    pub fn file_name(&self) -> String {
        let mut description = self.description.clone();
        for tag in &self.tags {
            description.push('_');
            description.push_str(&tag.to_uppercase());
        }
        format!(
            "{}-{}-{}-{}.{}",
            self.ifos,
            description,
            self.window.start,
            self.window.duration(),
            self.extension
        )
    }

    /// Full storage path under the artifact's directory.
    pub fn storage_path(&self) -> PathBuf {
        self.directory.join(self.file_name())
    }
}

/// Ordered, typed sequence of artifact records.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct FileList(Vec<OutputFile>);

impl FileList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one artifact record.
    pub fn push(&mut self, file: OutputFile) {
        self.0.push(file);
    }

    /// Appends every record of another list, preserving order.
    pub fn extend(&mut self, other: FileList) {
        self.0.extend(other.0);
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the list holds no records.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates records in order.
    pub fn iter(&self) -> std::slice::Iter<'_, OutputFile> {
        self.0.iter()
    }

    /// Iterates records mutably, in order.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, OutputFile> {
        self.0.iter_mut()
    }

    /// Loads a YAML manifest of prior-stage artifacts.
    ///
    /// Manifest entries describe files produced outside this plan, so any
    /// producer back-references are cleared: ids are only meaningful within
    /// the plan that assigned them.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut list: FileList = serde_yaml::from_str(&content)?;
        for file in list.iter_mut() {
            file.producer = None;
        }
        Ok(list)
    }
}

impl From<Vec<OutputFile>> for FileList {
    fn from(files: Vec<OutputFile>) -> Self {
        Self(files)
    }
}

impl IntoIterator for FileList {
    type Item = OutputFile;
    type IntoIter = std::vec::IntoIter<OutputFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a FileList {
    type Item = &'a OutputFile;
    type IntoIter = std::slice::Iter<'a, OutputFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
