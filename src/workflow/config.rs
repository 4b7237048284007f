//! Run Configuration
//!
//! Sectioned key/value configuration backing plan assembly. A configuration
//! file is a YAML mapping of section names to option mappings:
//!
//! ```yaml
//! workflow:
//!   detectors: H1,L1,V1
//!   start-time: 967593543
//!   end-time: 971622087
//!
//! executables:
//!   trigger_plots: /usr/bin/plot_triggers
//!
//! workflow-hardware-injections:
//!   hwinj-definer-url: https://example.org/defs/H1L1V1-HWINJ_DEFINER.xml
//! ```
//!
//! Scalar option values (numbers, booleans) are stringified on load; every
//! lookup returns strings and callers parse what they need. Tag-qualified
//! lookups check `{section}-{tag}` sections before falling back to the base
//! section, so a processing pass can override single options.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::{debug, info};
use serde_yaml::Value;

use crate::error::{PlanError, Result};

/// Sectioned string configuration shared by every assembly routine.
#[derive(Debug, Clone, Default)]
pub struct Config {
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl Config {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a configuration from a YAML file.
    ///
    /// The document must be a mapping of sections to option mappings; any
    /// scalar option value is accepted and stored as a string.
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading configuration from: {}", path.display());

        let content = fs::read_to_string(path)?;
        let document: Value = serde_yaml::from_str(&content)?;
        let config = Self::from_value(document)?;

        debug!("Parsed {} configuration sections", config.sections.len());
        Ok(config)
    }

    /// Builds a configuration from a parsed YAML document.
    fn from_value(document: Value) -> Result<Self> {
        let Value::Mapping(top) = document else {
            return Err(PlanError::Config(
                "configuration root must be a mapping of sections".to_string(),
            ));
        };

        let mut sections = BTreeMap::new();
        for (key, value) in top {
            let section = scalar_to_string(&key).ok_or_else(|| {
                PlanError::Config("section names must be scalar".to_string())
            })?;

            let Value::Mapping(entries) = value else {
                return Err(PlanError::Config(format!(
                    "section [{}] must be a mapping of options",
                    section
                )));
            };

            let mut options = BTreeMap::new();
            for (opt_key, opt_value) in entries {
                let option = scalar_to_string(&opt_key).ok_or_else(|| {
                    PlanError::Config(format!(
                        "option names in section [{}] must be scalar",
                        section
                    ))
                })?;
                let rendered = scalar_to_string(&opt_value).ok_or_else(|| {
                    PlanError::Config(format!(
                        "option '{}' in section [{}] must be a scalar value",
                        option, section
                    ))
                })?;
                options.insert(option, rendered);
            }
            sections.insert(section, options);
        }

        Ok(Self { sections })
    }

    /// Checks whether a section exists.
    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }

    /// Checks whether an option exists in a section.
    pub fn has_option(&self, section: &str, option: &str) -> bool {
        self.get_opt(section, option).is_some()
    }

    /// Looks up an option, treating absence as an error.
    pub fn get(&self, section: &str, option: &str) -> Result<&str> {
        self.get_opt(section, option)
            .ok_or_else(|| PlanError::MissingOption {
                section: section.to_string(),
                option: option.to_string(),
            })
    }

    /// Looks up an option, returning `None` when absent.
    pub fn get_opt(&self, section: &str, option: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|options| options.get(option))
            .map(String::as_str)
    }

    /// Looks up an option with tag-qualified precedence.
    ///
    /// For each tag, the `{section}-{tag}` section (tag lower-cased) is
    /// consulted first. One distinct tagged value wins over the base section;
    /// conflicting tagged values are an error; no tagged value falls back to
    /// the base section, whose absence is a [`PlanError::MissingOption`].
    pub fn get_opt_tags(&self, section: &str, option: &str, tags: &[String]) -> Result<String> {
        let mut tagged: Vec<String> = tags
            .iter()
            .filter_map(|tag| {
                let name = format!("{}-{}", section, tag.to_lowercase());
                self.get_opt(&name, option).map(str::to_string)
            })
            .collect();
        tagged.sort();
        tagged.dedup();

        match tagged.len() {
            0 => self.get(section, option).map(str::to_string),
            1 => Ok(tagged.remove(0)),
            _ => Err(PlanError::AmbiguousOption {
                section: section.to_string(),
                option: option.to_string(),
            }),
        }
    }

    /// Sets an option, creating the section if needed.
    pub fn set(
        &mut self,
        section: impl Into<String>,
        option: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.sections
            .entry(section.into())
            .or_default()
            .insert(option.into(), value.into());
    }

    /// Returns a section's options as sorted `(name, value)` pairs.
    ///
    /// An absent section yields an empty list.
    pub fn section_items(&self, section: &str) -> Vec<(String, String)> {
        self.sections
            .get(section)
            .map(|options| {
                options
                    .iter()
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Renders a scalar YAML value as a string.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}
