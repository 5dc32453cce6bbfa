use crate::parser::ast::{NodeId, Tree};
use log::trace;

/// Child to parent lookup, built once per tree. The root has no parent.
#[derive(Debug, Clone)]
pub struct ParentIndex {
    parents: Vec<Option<NodeId>>,
}

/// Visits every node once and records it as the parent of its children
pub fn link(tree: &Tree) -> ParentIndex {
    let mut parents = vec![None; tree.len()];

    for id in tree.walk() {
        for child in tree.children(id) {
            parents[child.index()] = Some(id);
        }
    }

    trace!("linked {} nodes", parents.len());
    ParentIndex { parents }
}

impl ParentIndex {
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(id.index()).copied().flatten()
    }

    /// Strict ancestors, nearest first
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            index: self,
            current: self.parent(id),
        }
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

pub struct Ancestors<'a> {
    index: &'a ParentIndex,
    current: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.current?;
        self.current = self.index.parent(id);
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ast::NodeKind;
    use crate::parser::parse;

    #[test]
    fn test_every_non_root_node_has_parent() {
        let tree = parse("for x in y:\n    if x:\n        break\n").unwrap();
        let index = link(&tree);

        assert_eq!(index.len(), tree.len());
        for id in tree.walk() {
            if id == tree.root() {
                assert_eq!(index.parent(id), None);
            } else {
                assert!(index.parent(id).is_some());
            }
        }
    }

    #[test]
    fn test_ancestors_reach_loop() {
        let tree = parse("for x in y:\n    if x:\n        break\n").unwrap();
        let index = link(&tree);
        let brk = tree
            .walk()
            .find(|id| matches!(tree.kind(*id), NodeKind::Break))
            .unwrap();

        let kinds: Vec<bool> = index
            .ancestors(brk)
            .map(|a| tree.kind(a).is_loop())
            .collect();
        assert_eq!(kinds, vec![false, true, false]);
        assert_eq!(index.ancestors(brk).last(), Some(tree.root()));
    }
}
