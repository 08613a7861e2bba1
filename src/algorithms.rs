use std::collections::VecDeque;
use std::ops::ControlFlow;

use crate::config::HierarchyConfig;
use crate::error::{LibError, Result};
use crate::models::{AncestorNode, AncestorTree, EmployeeId, EmployeeNode};
use crate::store::HierarchySnapshot;

/// Upward traversals over one snapshot.
#[derive(Debug, Clone, Copy)]
pub struct AncestorResolver<'a> {
    snapshot: &'a HierarchySnapshot,
    max_tree_depth: usize,
    max_tree_nodes: usize,
}

impl<'a> AncestorResolver<'a> {
    pub fn new(snapshot: &'a HierarchySnapshot) -> Self {
        Self::with_limits(snapshot, &HierarchyConfig::default())
    }

    pub fn with_limits(snapshot: &'a HierarchySnapshot, config: &HierarchyConfig) -> Self {
        Self {
            snapshot,
            max_tree_depth: config.max_tree_depth.max(1),
            max_tree_nodes: config.max_tree_nodes.max(1),
        }
    }

    /// Resolved supervisors in stored order. Always empty for administrators.
    pub fn direct_supervisors(&self, employee_id: &EmployeeId) -> Result<Vec<&'a EmployeeNode>> {
        let position = self.locate(employee_id)?;
        Ok(self
            .snapshot
            .effective_supervisors(position)
            .iter()
            .map(|supervisor| self.snapshot.node_at(*supervisor))
            .collect())
    }

    /// Every reachable ancestor once, depth-first in stored supervisor order.
    pub fn ancestor_chain(&self, employee_id: &EmployeeId) -> Result<Vec<&'a EmployeeNode>> {
        let start = self.locate(employee_id)?;
        let mut chain = Vec::new();
        let walked = walk_ancestors(self.snapshot, start, |position, _| {
            chain.push(self.snapshot.node_at(position));
            ControlFlow::Continue(())
        });
        debug_assert!(walked.is_continue());
        Ok(chain)
    }

    /// The first reporting path from `from` up to `ancestor`, both ends included.
    pub fn path_to_ancestor(
        &self,
        from: &EmployeeId,
        ancestor: &EmployeeId,
    ) -> Result<Option<Vec<EmployeeId>>> {
        let start = self.locate(from)?;
        let target = self.locate(ancestor)?;
        if start == target {
            return Ok(Some(vec![from.clone()]));
        }

        let mut parents = vec![None; self.snapshot.len()];
        let found = walk_ancestors(self.snapshot, start, |position, parent| {
            parents[position] = Some(parent);
            if position == target {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });
        if found.is_continue() {
            return Ok(None);
        }

        let mut path = vec![self.snapshot.node_at(target).id.clone()];
        let mut cursor = target;
        while let Some(parent) = parents[cursor] {
            path.push(self.snapshot.node_at(parent).id.clone());
            if parent == start {
                break;
            }
            cursor = parent;
        }
        path.reverse();
        Ok(Some(path))
    }

    pub fn ancestor_tree(&self, employee_id: &EmployeeId) -> Result<AncestorTree> {
        let position = self.locate(employee_id)?;
        if self.snapshot.node_at(position).is_admin {
            return Ok(AncestorTree::NotApplicable);
        }
        if self.snapshot.effective_supervisors(position).is_empty() {
            return Ok(AncestorTree::Empty);
        }

        let mut expansion = TreeExpansion {
            snapshot: self.snapshot,
            on_path: vec![false; self.snapshot.len()],
            remaining: self.max_tree_nodes,
            max_depth: self.max_tree_depth,
            truncated: 0,
        };
        let root = expansion.expand(position, 0);
        if expansion.truncated > 0 {
            tracing::warn!(
                employee_id = %employee_id,
                truncated_branches = expansion.truncated,
                "ancestor tree expansion was cut short"
            );
        }

        Ok(AncestorTree::Tree { root })
    }

    fn locate(&self, employee_id: &EmployeeId) -> Result<usize> {
        self.snapshot
            .position(employee_id)
            .ok_or_else(|| LibError::not_found("Employee not found", employee_id))
    }
}

struct TreeExpansion<'a> {
    snapshot: &'a HierarchySnapshot,
    on_path: Vec<bool>,
    remaining: usize,
    max_depth: usize,
    truncated: usize,
}

impl TreeExpansion<'_> {
    fn expand(&mut self, position: usize, depth: usize) -> AncestorNode {
        let snapshot = self.snapshot;
        let mut output = self.leaf(position);
        let supervisors = snapshot.effective_supervisors(position);
        if supervisors.is_empty() {
            return output;
        }
        if depth >= self.max_depth {
            output.truncated = true;
            self.truncated += 1;
            return output;
        }

        self.on_path[position] = true;
        for &supervisor in supervisors {
            if self.remaining == 0 {
                output.truncated = true;
                self.truncated += 1;
                break;
            }
            if self.on_path[supervisor] {
                // Stored data loops back onto this branch: show the repeat, stop expanding.
                let mut repeat = self.leaf(supervisor);
                repeat.truncated = true;
                self.truncated += 1;
                output.supervisors.push(repeat);
                continue;
            }
            output.supervisors.push(self.expand(supervisor, depth + 1));
        }
        self.on_path[position] = false;

        output
    }

    fn leaf(&mut self, position: usize) -> AncestorNode {
        self.remaining = self.remaining.saturating_sub(1);
        let node = self.snapshot.node_at(position);
        AncestorNode {
            id: node.id.clone(),
            name: node.name.clone(),
            role: node.role.clone(),
            supervisors: Vec::new(),
            truncated: false,
        }
    }
}

/// Depth-first pre-order walk over effective supervisor edges starting above `start`.
///
/// `visit` receives each ancestor position and the position it was reached from. Each
/// position is visited at most once, so cycles in stored data terminate the walk.
pub(crate) fn walk_ancestors<F>(
    snapshot: &HierarchySnapshot,
    start: usize,
    mut visit: F,
) -> ControlFlow<()>
where
    F: FnMut(usize, usize) -> ControlFlow<()>,
{
    let mut visited = vec![false; snapshot.len()];
    visited[start] = true;
    let mut stack: Vec<(usize, usize)> = snapshot
        .effective_supervisors(start)
        .iter()
        .rev()
        .map(|supervisor| (*supervisor, start))
        .collect();

    while let Some((position, parent)) = stack.pop() {
        if visited[position] {
            continue;
        }
        visited[position] = true;
        visit(position, parent)?;
        stack.extend(
            snapshot
                .effective_supervisors(position)
                .iter()
                .rev()
                .filter(|supervisor| !visited[**supervisor])
                .map(|supervisor| (*supervisor, position)),
        );
    }

    ControlFlow::Continue(())
}

/// Employees ordered so that every supervisor precedes the people reporting to them.
///
/// Employees caught in a cycle (and everyone below them) are left out.
pub fn reporting_order(snapshot: &HierarchySnapshot) -> Vec<&EmployeeNode> {
    kahn_order(snapshot)
        .into_iter()
        .map(|position| snapshot.node_at(position))
        .collect()
}

pub fn has_cycle(snapshot: &HierarchySnapshot) -> bool {
    kahn_order(snapshot).len() != snapshot.len()
}

pub(crate) fn kahn_order(snapshot: &HierarchySnapshot) -> Vec<usize> {
    let mut indegree = vec![0usize; snapshot.len()];
    let mut reports: Vec<Vec<usize>> = vec![Vec::new(); snapshot.len()];
    for position in 0..snapshot.len() {
        for &supervisor in snapshot.effective_supervisors(position) {
            indegree[position] += 1;
            reports[supervisor].push(position);
        }
    }

    let mut queue: VecDeque<usize> = (0..snapshot.len())
        .filter(|position| indegree[*position] == 0)
        .collect();

    let mut ordered = Vec::with_capacity(snapshot.len());
    while let Some(position) = queue.pop_front() {
        ordered.push(position);
        for &report in &reports[position] {
            indegree[report] -= 1;
            if indegree[report] == 0 {
                queue.push_back(report);
            }
        }
    }

    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::{EmployeeRecord, RoleRef};

    fn employee(id: &str, is_admin: bool, reports_to: &[&str]) -> EmployeeRecord {
        EmployeeRecord {
            id: id.into(),
            name: id.to_uppercase(),
            role: RoleRef::Named("field".to_string()),
            is_admin,
            reports_to: reports_to.iter().map(|id| EmployeeId::from(*id)).collect(),
            updated_at: None,
        }
    }

    fn chain_ids(nodes: &[&EmployeeNode]) -> Vec<String> {
        nodes.iter().map(|node| node.id.to_string()).collect()
    }

    fn multi_parent() -> HierarchySnapshot {
        HierarchySnapshot::load(vec![
            employee("a", true, &[]),
            employee("b", false, &["a"]),
            employee("c", false, &["b"]),
            employee("d", false, &["b", "c"]),
        ])
        .expect("snapshot loads")
    }

    #[test]
    fn direct_supervisors_follow_stored_order() {
        let snapshot = multi_parent();
        let resolver = AncestorResolver::new(&snapshot);
        let direct = resolver.direct_supervisors(&"d".into()).expect("d exists");
        assert_eq!(chain_ids(&direct), vec!["b", "c"]);
    }

    #[test]
    fn admin_direct_supervisors_are_always_empty() {
        let snapshot = HierarchySnapshot::load(vec![
            employee("a", true, &["b"]),
            employee("b", false, &[]),
        ])
        .expect("loads");
        let resolver = AncestorResolver::new(&snapshot);
        assert!(resolver.direct_supervisors(&"a".into()).expect("a").is_empty());
        assert_eq!(
            resolver.ancestor_tree(&"a".into()).expect("a"),
            AncestorTree::NotApplicable
        );
    }

    #[test]
    fn ancestor_chain_lists_each_ancestor_once() {
        let snapshot = multi_parent();
        let resolver = AncestorResolver::new(&snapshot);
        let chain = resolver.ancestor_chain(&"d".into()).expect("d exists");
        assert_eq!(chain_ids(&chain), vec!["b", "a", "c"]);
    }

    #[test]
    fn ancestor_chain_terminates_on_stored_cycles() {
        let snapshot = HierarchySnapshot::load(vec![
            employee("x", false, &["y"]),
            employee("y", false, &["z"]),
            employee("z", false, &["x"]),
        ])
        .expect("loads");
        let resolver = AncestorResolver::new(&snapshot);
        let chain = resolver.ancestor_chain(&"x".into()).expect("x exists");
        assert_eq!(chain_ids(&chain), vec!["y", "z"]);
    }

    #[test]
    fn path_to_ancestor_reports_connecting_chain() {
        let snapshot = multi_parent();
        let resolver = AncestorResolver::new(&snapshot);
        let path = resolver
            .path_to_ancestor(&"d".into(), &"a".into())
            .expect("ids exist")
            .expect("a is above d");
        let expected: Vec<EmployeeId> = vec!["d".into(), "b".into(), "a".into()];
        assert_eq!(path, expected);

        let none = resolver
            .path_to_ancestor(&"b".into(), &"d".into())
            .expect("ids exist");
        assert!(none.is_none());
    }

    #[test]
    fn ancestor_tree_expands_every_lineage_without_dedup() {
        let snapshot = multi_parent();
        let resolver = AncestorResolver::new(&snapshot);
        let tree = resolver.ancestor_tree(&"d".into()).expect("d exists");
        let root = tree.root().expect("d has a tree");

        assert_eq!(root.id.as_str(), "d");
        assert_eq!(root.supervisor_ids(), vec![&EmployeeId::from("b"), &EmployeeId::from("c")]);

        let b = &root.supervisors[0];
        assert_eq!(b.supervisor_ids(), vec![&EmployeeId::from("a")]);
        assert!(b.supervisors[0].supervisors.is_empty());

        let c = &root.supervisors[1];
        assert_eq!(c.supervisor_ids(), vec![&EmployeeId::from("b")]);
        assert_eq!(c.supervisors[0].supervisor_ids(), vec![&EmployeeId::from("a")]);
        assert!(!root.truncated);
    }

    #[test]
    fn ancestor_tree_marks_unconfigured_employee_as_empty() {
        let snapshot = HierarchySnapshot::load(vec![
            employee("a", true, &[]),
            employee("b", false, &["ghost"]),
        ])
        .expect("loads");
        let resolver = AncestorResolver::new(&snapshot);
        assert_eq!(
            resolver.ancestor_tree(&"b".into()).expect("b exists"),
            AncestorTree::Empty
        );
    }

    #[test]
    fn ancestor_tree_guards_against_stored_cycles() {
        let snapshot = HierarchySnapshot::load(vec![
            employee("x", false, &["y"]),
            employee("y", false, &["x"]),
        ])
        .expect("loads");
        let resolver = AncestorResolver::new(&snapshot);
        let tree = resolver.ancestor_tree(&"x".into()).expect("x exists");
        let root = tree.root().expect("x has a tree");
        let y = &root.supervisors[0];
        assert_eq!(y.id.as_str(), "y");
        let repeat = &y.supervisors[0];
        assert_eq!(repeat.id.as_str(), "x");
        assert!(repeat.truncated);
        assert!(repeat.supervisors.is_empty());
    }

    #[test]
    fn ancestor_tree_respects_depth_limit() {
        let snapshot = HierarchySnapshot::load(vec![
            employee("a", false, &[]),
            employee("b", false, &["a"]),
            employee("c", false, &["b"]),
        ])
        .expect("loads");
        let config = HierarchyConfig {
            max_tree_depth: 1,
            ..HierarchyConfig::default()
        };
        let resolver = AncestorResolver::with_limits(&snapshot, &config);
        let tree = resolver.ancestor_tree(&"c".into()).expect("c exists");
        let b = &tree.root().expect("tree").supervisors[0];
        assert_eq!(b.id.as_str(), "b");
        assert!(b.truncated);
        assert!(b.supervisors.is_empty());
    }

    #[test]
    fn ancestor_tree_stops_at_node_budget() {
        let snapshot = HierarchySnapshot::load(vec![
            employee("a", false, &[]),
            employee("b", false, &["a"]),
            employee("c", false, &["a"]),
            employee("d", false, &["b", "c"]),
        ])
        .expect("loads");
        let config = HierarchyConfig {
            max_tree_nodes: 2,
            ..HierarchyConfig::default()
        };
        let resolver = AncestorResolver::with_limits(&snapshot, &config);
        let tree = resolver.ancestor_tree(&"d".into()).expect("d exists");
        let root = tree.root().expect("d has a tree");

        assert!(root.truncated);
        assert_eq!(root.supervisor_ids(), vec![&EmployeeId::from("b")]);
        let b = &root.supervisors[0];
        assert!(b.truncated);
        assert!(b.supervisors.is_empty());
    }

    #[test]
    fn unknown_employee_is_not_found() {
        let snapshot = multi_parent();
        let resolver = AncestorResolver::new(&snapshot);
        let err = resolver.ancestor_tree(&"nobody".into()).expect_err("missing");
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn reporting_order_puts_supervisors_first() {
        let snapshot = multi_parent();
        let order = reporting_order(&snapshot);
        assert_eq!(chain_ids(&order), vec!["a", "b", "c", "d"]);
        assert!(!has_cycle(&snapshot));
    }

    #[test]
    fn has_cycle_detects_stored_loops() {
        let snapshot = HierarchySnapshot::load(vec![
            employee("x", false, &["y"]),
            employee("y", false, &["x"]),
            employee("z", false, &[]),
        ])
        .expect("loads");
        assert!(has_cycle(&snapshot));
        assert_eq!(chain_ids(&reporting_order(&snapshot)), vec!["z"]);
    }
}
