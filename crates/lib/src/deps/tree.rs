use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use tracing::debug;

use super::{DependencyError, DependencySource};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyNode {
  pub tool: String,
  /// Declared dependencies, in declaration order.
  pub dependencies: Vec<String>,
  /// Already installed; excluded from the generation order.
  pub has_existing_artifact: bool,
}

/// Discovery result shown before anything is generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySummary {
  pub root: String,
  pub generation_order: Vec<String>,
  pub satisfied: Vec<String>,
}

/// Dependency graph rooted at one tool. Diamond dependencies share a node.
#[derive(Debug, Clone)]
pub struct DependencyTree {
  graph: DiGraph<DependencyNode, ()>,
  index: HashMap<String, NodeIndex>,
  root: NodeIndex,
}

impl DependencyTree {
  pub fn root(&self) -> &DependencyNode {
    &self.graph[self.root]
  }

  pub fn get(&self, tool: &str) -> Option<&DependencyNode> {
    self.index.get(tool).map(|&idx| &self.graph[idx])
  }

  pub fn len(&self) -> usize {
    self.graph.node_count()
  }

  pub fn is_empty(&self) -> bool {
    self.graph.node_count() == 0
  }

  /// `(dependent, dependency)` pairs.
  pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
    self.graph.edge_references().map(|edge| {
      (
        self.graph[edge.source()].tool.as_str(),
        self.graph[edge.target()].tool.as_str(),
      )
    })
  }

  fn children(&self, idx: NodeIndex) -> Vec<NodeIndex> {
    let mut edges: Vec<_> = self.graph.edges(idx).collect();
    edges.sort_by_key(|edge| edge.id());
    edges.into_iter().map(|edge| edge.target()).collect()
  }

  /// Post-order walk: every dependency precedes its dependents, each tool
  /// appears once, and already-installed tools are left out.
  pub fn to_generation_order(&self) -> Vec<String> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    self.post_order(self.root, &mut visited, &mut order);
    order
  }

  fn post_order(&self, idx: NodeIndex, visited: &mut HashSet<NodeIndex>, order: &mut Vec<String>) {
    if !visited.insert(idx) {
      return;
    }
    for child in self.children(idx) {
      self.post_order(child, visited, order);
    }
    let node = &self.graph[idx];
    if !node.has_existing_artifact {
      order.push(node.tool.clone());
    }
  }

  pub fn satisfied(&self) -> Vec<String> {
    let mut satisfied: Vec<String> = self
      .graph
      .node_weights()
      .filter(|node| node.has_existing_artifact)
      .map(|node| node.tool.clone())
      .collect();
    satisfied.sort();
    satisfied
  }

  pub fn summary(&self) -> DependencySummary {
    DependencySummary {
      root: self.root().tool.clone(),
      generation_order: self.to_generation_order(),
      satisfied: self.satisfied(),
    }
  }

  /// ASCII rendering. Repeated diamond nodes are printed once in full and
  /// marked `[duplicate]` afterwards.
  pub fn format_tree(&self) -> String {
    let mut out = String::new();
    let mut printed = HashSet::new();
    let _ = writeln!(out, "{}", self.label(self.root));
    printed.insert(self.root);
    self.format_children(self.root, "", &mut printed, &mut out);
    out
  }

  fn format_children(&self, idx: NodeIndex, prefix: &str, printed: &mut HashSet<NodeIndex>, out: &mut String) {
    let children = self.children(idx);
    let last = children.len().saturating_sub(1);

    for (i, child) in children.into_iter().enumerate() {
      let (branch, indent) = if i == last { ("└── ", "    ") } else { ("├── ", "│   ") };

      if !printed.insert(child) {
        let _ = writeln!(out, "{prefix}{branch}{} [duplicate]", self.graph[child].tool);
        continue;
      }

      let _ = writeln!(out, "{prefix}{branch}{}", self.label(child));
      self.format_children(child, &format!("{prefix}{indent}"), printed, out);
    }
  }

  fn label(&self, idx: NodeIndex) -> String {
    let node = &self.graph[idx];
    let status = if node.has_existing_artifact {
      "installed"
    } else {
      "needs install"
    };
    format!("{} ({status})", node.tool)
  }
}

struct Frame {
  idx: NodeIndex,
  next: usize,
}

/// Walks declared dependencies depth-first, rejecting cycles.
pub struct DependencyResolver<'a> {
  source: &'a dyn DependencySource,
  is_resolved: &'a (dyn Fn(&str) -> bool + Sync),
}

impl<'a> DependencyResolver<'a> {
  pub fn new(source: &'a dyn DependencySource, is_resolved: &'a (dyn Fn(&str) -> bool + Sync)) -> Self {
    Self { source, is_resolved }
  }

  /// Build the full tree for `root` and its generation order.
  ///
  /// Any cycle aborts the whole resolution; no partial tree is returned.
  pub async fn resolve(&self, root: &str) -> Result<(DependencyTree, Vec<String>), DependencyError> {
    let mut graph = DiGraph::new();
    let mut index = HashMap::new();

    let root_idx = self.add_node(&mut graph, &mut index, root).await?;
    let mut stack = vec![Frame { idx: root_idx, next: 0 }];

    while let Some(frame) = stack.last_mut() {
      let parent = frame.idx;
      let Some(dep) = graph[parent].dependencies.get(frame.next).cloned() else {
        stack.pop();
        continue;
      };
      frame.next += 1;

      if stack.iter().any(|f| graph[f.idx].tool == dep) {
        let mut chain: Vec<String> = stack.iter().map(|f| graph[f.idx].tool.clone()).collect();
        chain.push(dep);
        return Err(DependencyError::Cycle { chain });
      }

      if let Some(&existing) = index.get(&dep) {
        debug!(tool = %dep, parent = %graph[parent].tool, "dependency already visited");
        graph.add_edge(parent, existing, ());
        continue;
      }

      let child = self.add_node(&mut graph, &mut index, &dep).await?;
      graph.add_edge(parent, child, ());
      stack.push(Frame { idx: child, next: 0 });
    }

    let tree = DependencyTree {
      graph,
      index,
      root: root_idx,
    };
    let order = tree.to_generation_order();
    Ok((tree, order))
  }

  async fn add_node(
    &self,
    graph: &mut DiGraph<DependencyNode, ()>,
    index: &mut HashMap<String, NodeIndex>,
    tool: &str,
  ) -> Result<NodeIndex, DependencyError> {
    let dependencies = self.source.dependencies(tool).await?;
    let node = DependencyNode {
      tool: tool.to_string(),
      dependencies,
      has_existing_artifact: (self.is_resolved)(tool),
    };
    let idx = graph.add_node(node);
    index.insert(tool.to_string(), idx);
    Ok(idx)
  }
}
