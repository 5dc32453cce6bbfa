use crate::analysis::lines::SourceLines;
use crate::analysis::linker::ParentIndex;
use crate::config::ReviewConfig;
use crate::parser::ast::{NodeId, NodeKind, Tree};

/// Read-only snapshot shared by every rule during one pass
#[derive(Debug, Clone, Copy)]
pub struct AnalysisContext<'a> {
    pub source: &'a str,
    pub tree: &'a Tree,
    pub parents: &'a ParentIndex,
    pub lines: &'a SourceLines,
    pub config: &'a ReviewConfig,
}

impl<'a> AnalysisContext<'a> {
    pub fn new(
        source: &'a str,
        tree: &'a Tree,
        parents: &'a ParentIndex,
        lines: &'a SourceLines,
        config: &'a ReviewConfig,
    ) -> Self {
        Self {
            source,
            tree,
            parents,
            lines,
            config,
        }
    }

    /// Every node in pre-order together with its kind
    pub fn nodes(self) -> impl Iterator<Item = (NodeId, &'a NodeKind)> + 'a {
        let tree = self.tree;
        tree.walk().map(move |id| (id, tree.kind(id)))
    }

    /// Line findings about `id` are reported at. Decorated definitions
    /// report at their `def` or `class` keyword.
    pub fn line(&self, id: NodeId) -> usize {
        match self.tree.kind(id) {
            NodeKind::FunctionDefinition { keyword_line, .. }
            | NodeKind::ClassDefinition { keyword_line, .. } => *keyword_line,
            _ => self.tree.line(id),
        }
    }

    pub fn parent_kind(&self, id: NodeId) -> Option<&'a NodeKind> {
        self.parents.parent(id).map(|p| self.tree.kind(p))
    }

    /// Whether any strict ancestor of `id` satisfies `predicate`
    pub fn has_ancestor(&self, id: NodeId, predicate: impl Fn(&NodeKind) -> bool) -> bool {
        self.parents
            .ancestors(id)
            .any(|ancestor| predicate(self.tree.kind(ancestor)))
    }
}
