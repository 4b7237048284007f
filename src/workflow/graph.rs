//! Plan Build Context
//!
//! [`Workflow`] is the mutable builder handle the stage routines share
//! during the assembly phase: configuration, detector set, analysis window,
//! the node arena, and the dependency [`Dag`]. Assembly is single-threaded;
//! routines take `&mut Workflow` and run to completion before the next
//! stage starts. Once assembled, the plan is validated and serialized for
//! the external engine that will execute it.

use std::collections::VecDeque;
use std::fmt;
use std::fs;
use std::path::Path;

use chrono::Utc;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};
use crate::workflow::config::Config;
use crate::workflow::detector::DetectorSet;
use crate::workflow::file::FileList;
use crate::workflow::model::{AnalysisWindow, Universe};
use crate::workflow::node::Node;

/// Index of a node in the build context's arena.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Dependency edges between registered nodes.
///
/// Edges are stored in insertion order; inserting an existing edge is a
/// no-op, so repeated producers in an input list collapse to one edge.
#[derive(Debug, Clone, Default)]
pub struct Dag {
    edges: Vec<(NodeId, NodeId)>,
}

impl Dag {
    /// Records an edge from `parent` to `child` if not already present.
    pub fn add_dependency(&mut self, parent: NodeId, child: NodeId) {
        if !self.has_dependency(parent, child) {
            self.edges.push((parent, child));
        }
    }

    /// Checks for an edge from `parent` to `child`.
    pub fn has_dependency(&self, parent: NodeId, child: NodeId) -> bool {
        self.edges.contains(&(parent, child))
    }

    /// Parents of a node, in edge insertion order.
    pub fn parents_of(&self, child: NodeId) -> Vec<NodeId> {
        self.edges
            .iter()
            .filter(|(_, c)| *c == child)
            .map(|(p, _)| *p)
            .collect()
    }

    /// Number of distinct edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// All edges in insertion order.
    pub fn edges(&self) -> &[(NodeId, NodeId)] {
        &self.edges
    }
}

/// Assembly-phase build context for one plan.
#[derive(Debug, Clone)]
pub struct Workflow {
    /// Shared run configuration; the hardware-injection stage writes the
    /// resolved definer path back here.
    pub config: Config,
    /// Detectors participating in the run.
    pub detectors: DetectorSet,
    /// GPS window shared by every node.
    pub window: AnalysisWindow,
    /// Registered nodes, indexed by [`NodeId`].
    nodes: Vec<Node>,
    /// Dependency edges between registered nodes.
    pub dag: Dag,
}

impl Workflow {
    /// Builds the context from a configuration's `[workflow]` section:
    /// `detectors` (comma-separated), `start-time`, and `end-time`.
    pub fn new(config: Config) -> Result<Self> {
        let detectors = DetectorSet::from_csv(config.get("workflow", "detectors")?)?;
        let start = parse_gps(&config, "start-time")?;
        let end = parse_gps(&config, "end-time")?;
        let window = AnalysisWindow::new(start, end)?;

        info!(
            "Build context ready: detectors {}, window {}",
            detectors.ifo_string(),
            window
        );

        Ok(Self {
            config,
            detectors,
            window,
            nodes: Vec::new(),
            dag: Dag::default(),
        })
    }

    /// Registers a node, stamping its id into every declared output as the
    /// producer, and returns the id.
    pub fn add_node(&mut self, mut node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        for file in node.outputs.iter_mut() {
            file.producer = Some(id);
        }
        debug!("Registered node {} ({})", id, node.executable.name);
        self.nodes.push(node);
        id
    }

    /// Records a dependency edge between two registered nodes.
    pub fn add_dependency(&mut self, parent: NodeId, child: NodeId) {
        self.dag.add_dependency(parent, child);
    }

    /// Adds an edge from every input file's producing node to `child`.
    ///
    /// Files without a producer contribute no edge; their ordering relative
    /// to prior stages is then unspecified, which callers treat as a latent
    /// hazard rather than an error.
    pub fn link_inputs(&mut self, inputs: &FileList, child: NodeId) {
        for file in inputs.iter() {
            if let Some(parent) = file.producer {
                self.dag.add_dependency(parent, child);
            }
        }
    }

    /// Looks up a registered node.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Declared outputs of a registered node.
    pub fn outputs_of(&self, id: NodeId) -> Option<&FileList> {
        self.nodes.get(id.0).map(|node| &node.outputs)
    }

    /// Number of registered nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of distinct dependency edges.
    pub fn edge_count(&self) -> usize {
        self.dag.edge_count()
    }

    /// Iterates registered nodes in registration order.
    pub fn nodes(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    /// Structural check of the assembled graph: every edge endpoint must be
    /// a registered node and the graph must be acyclic (Kahn's algorithm).
    pub fn validate(&self) -> Result<()> {
        let count = self.nodes.len();
        let mut in_degree = vec![0usize; count];

        for &(parent, child) in self.dag.edges() {
            if parent.0 >= count {
                return Err(PlanError::UnknownNode(parent.0));
            }
            if child.0 >= count {
                return Err(PlanError::UnknownNode(child.0));
            }
            in_degree[child.0] += 1;
        }

        let mut queue: VecDeque<usize> =
            (0..count).filter(|&i| in_degree[i] == 0).collect();
        let mut visited = 0;

        while let Some(current) = queue.pop_front() {
            visited += 1;
            for &(parent, child) in self.dag.edges() {
                if parent.0 == current {
                    in_degree[child.0] -= 1;
                    if in_degree[child.0] == 0 {
                        queue.push_back(child.0);
                    }
                }
            }
        }

        if visited != count {
            return Err(PlanError::CyclicDependency);
        }

        info!(
            "Plan validated: {} nodes, {} edges",
            count,
            self.dag.edge_count()
        );
        Ok(())
    }

    /// Snapshot of the assembled plan for export.
    pub fn to_plan(&self) -> PlanDoc {
        let nodes = self
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| PlanNode {
                label: self.node_label(NodeId(index)),
                program: node.executable.program.clone(),
                universe: node.executable.universe,
                arguments: node.arg_list(),
                outputs: node
                    .outputs
                    .iter()
                    .map(|file| file.storage_path().display().to_string())
                    .collect(),
            })
            .collect();

        let edges = self
            .dag
            .edges()
            .iter()
            .map(|&(parent, child)| PlanEdge {
                parent: self.node_label(parent),
                child: self.node_label(child),
            })
            .collect();

        PlanDoc {
            generated: Utc::now().to_rfc3339(),
            detectors: self.detectors.ifo_string(),
            start_time: self.window.start,
            end_time: self.window.end,
            nodes,
            edges,
        }
    }

    /// Serializes the plan to a file: JSON when the path ends in `.json`,
    /// YAML otherwise.
    pub fn save(&self, path: &Path) -> Result<()> {
        let plan = self.to_plan();
        let rendered = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::to_string_pretty(&plan)?,
            _ => serde_yaml::to_string(&plan)?,
        };
        fs::write(path, rendered)?;
        info!("Plan saved to: {}", path.display());
        Ok(())
    }

    /// Stable human-readable label for a node in the exported plan.
    fn node_label(&self, id: NodeId) -> String {
        match self.nodes.get(id.0) {
            Some(node) => format!("{}_{}", node.executable.name, id.0),
            None => format!("unknown_{}", id.0),
        }
    }
}

/// Parses a `[workflow]` GPS second.
fn parse_gps(config: &Config, option: &str) -> Result<u64> {
    let raw = config.get("workflow", option)?;
    raw.parse().map_err(|_| {
        PlanError::Config(format!(
            "option '{}' in section [workflow] is not a GPS second: '{}'",
            option, raw
        ))
    })
}

/// Serializable snapshot of an assembled plan.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PlanDoc {
    /// UTC timestamp of the export.
    pub generated: String,
    /// Concatenated detector string of the run.
    pub detectors: String,
    /// GPS window start.
    pub start_time: u64,
    /// GPS window end.
    pub end_time: u64,
    /// Nodes in registration order.
    pub nodes: Vec<PlanNode>,
    /// Dependency edges by node label.
    pub edges: Vec<PlanEdge>,
}

/// One node of the exported plan.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PlanNode {
    pub label: String,
    pub program: String,
    pub universe: Universe,
    pub arguments: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<String>,
}

/// One dependency edge of the exported plan.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PlanEdge {
    pub parent: String,
    pub child: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::file::OutputFile;
    use crate::workflow::node::Executable;

    fn test_workflow() -> Workflow {
        let mut config = Config::new();
        config.set("workflow", "detectors", "H1,L1");
        config.set("workflow", "start-time", "900000000");
        config.set("workflow", "end-time", "900002048");
        config.set("executables", "trigger_plots", "/usr/bin/plot_triggers");
        config.set("executables", "upstream", "/usr/bin/upstream");
        Workflow::new(config).unwrap()
    }

    fn plain_node(workflow: &Workflow, name: &str) -> Node {
        let exe = Executable::new(
            &workflow.config,
            name,
            Universe::Vanilla,
            &workflow.detectors,
            Path::new("/data/plots"),
            &[],
        )
        .unwrap();
        Node::new(&exe)
    }

    fn producing_node(workflow: &Workflow, description: &str) -> Node {
        let mut node = plain_node(workflow, "upstream");
        node.add_output(OutputFile::new(
            "H1L1",
            description,
            workflow.window,
            "xml.gz",
            "/data/run1",
        ));
        node
    }

    #[test]
    fn test_new_reads_workflow_section() {
        let workflow = test_workflow();
        assert_eq!(workflow.detectors.ifo_string(), "H1L1");
        assert_eq!(workflow.window.start, 900000000);
        assert_eq!(workflow.window.duration(), 2048);
        assert_eq!(workflow.node_count(), 0);
    }

    #[test]
    fn test_new_rejects_bad_gps() {
        let mut config = Config::new();
        config.set("workflow", "detectors", "H1");
        config.set("workflow", "start-time", "not-a-number");
        config.set("workflow", "end-time", "900002048");
        assert!(matches!(
            Workflow::new(config),
            Err(PlanError::Config(_))
        ));
    }

    #[test]
    fn test_new_missing_section() {
        let config = Config::new();
        assert!(matches!(
            Workflow::new(config),
            Err(PlanError::MissingOption { .. })
        ));
    }

    #[test]
    fn test_add_node_stamps_producer() {
        let mut workflow = test_workflow();
        let node = producing_node(&workflow, "INSPIRAL");

        let id = workflow.add_node(node);
        let outputs = workflow.outputs_of(id).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs.iter().next().unwrap().producer, Some(id));
    }

    #[test]
    fn test_link_inputs_only_produced_files() {
        let mut workflow = test_workflow();

        let producer = producing_node(&workflow, "INSPIRAL");
        let producer_id = workflow.add_node(producer);
        let mut inputs = workflow.outputs_of(producer_id).unwrap().clone();
        inputs.push(OutputFile::new(
            "H1L1",
            "EXTERNAL",
            workflow.window,
            "xml.gz",
            "/data/external",
        ));

        let consumer = plain_node(&workflow, "trigger_plots");
        let consumer_id = workflow.add_node(consumer);
        workflow.link_inputs(&inputs, consumer_id);

        assert_eq!(workflow.edge_count(), 1);
        assert!(workflow.dag.has_dependency(producer_id, consumer_id));
    }

    #[test]
    fn test_add_dependency_idempotent() {
        let mut workflow = test_workflow();
        let a = workflow.add_node(plain_node(&workflow, "upstream"));
        let b = workflow.add_node(plain_node(&workflow, "trigger_plots"));

        workflow.add_dependency(a, b);
        workflow.add_dependency(a, b);

        assert_eq!(workflow.edge_count(), 1);
        assert_eq!(workflow.dag.parents_of(b), [a]);
    }

    #[test]
    fn test_validate_acyclic() {
        let mut workflow = test_workflow();
        let a = workflow.add_node(plain_node(&workflow, "upstream"));
        let b = workflow.add_node(plain_node(&workflow, "trigger_plots"));
        workflow.add_dependency(a, b);

        assert!(workflow.validate().is_ok());
    }

    #[test]
    fn test_validate_detects_cycle() {
        let mut workflow = test_workflow();
        let a = workflow.add_node(plain_node(&workflow, "upstream"));
        let b = workflow.add_node(plain_node(&workflow, "trigger_plots"));
        workflow.add_dependency(a, b);
        workflow.add_dependency(b, a);

        assert!(matches!(
            workflow.validate(),
            Err(PlanError::CyclicDependency)
        ));
    }

    #[test]
    fn test_validate_detects_unknown_node() {
        let mut workflow = test_workflow();
        let a = workflow.add_node(plain_node(&workflow, "upstream"));
        workflow.add_dependency(a, NodeId(99));

        assert!(matches!(
            workflow.validate(),
            Err(PlanError::UnknownNode(99))
        ));
    }

    #[test]
    fn test_to_plan_labels_and_edges() {
        let mut workflow = test_workflow();
        let a = workflow.add_node(producing_node(&workflow, "INSPIRAL"));
        let b = workflow.add_node(plain_node(&workflow, "trigger_plots"));
        workflow.add_dependency(a, b);

        let plan = workflow.to_plan();
        assert_eq!(plan.detectors, "H1L1");
        assert_eq!(plan.nodes.len(), 2);
        assert_eq!(plan.nodes[0].label, "upstream_0");
        assert_eq!(plan.nodes[1].label, "trigger_plots_1");
        assert_eq!(plan.nodes[0].outputs.len(), 1);
        assert_eq!(plan.edges.len(), 1);
        assert_eq!(plan.edges[0].parent, "upstream_0");
        assert_eq!(plan.edges[0].child, "trigger_plots_1");
    }

    #[test]
    fn test_save_yaml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.yaml");

        let mut workflow = test_workflow();
        let a = workflow.add_node(producing_node(&workflow, "INSPIRAL"));
        let b = workflow.add_node(plain_node(&workflow, "trigger_plots"));
        workflow.add_dependency(a, b);

        workflow.save(&path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let plan: PlanDoc = serde_yaml::from_str(&content).unwrap();
        assert_eq!(plan.nodes.len(), 2);
        assert_eq!(plan.start_time, 900000000);
    }

    #[test]
    fn test_save_json_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");

        let mut workflow = test_workflow();
        workflow.add_node(plain_node(&workflow, "trigger_plots"));

        workflow.save(&path).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let plan: PlanDoc = serde_json::from_str(&content).unwrap();
        assert_eq!(plan.nodes.len(), 1);
    }
}
