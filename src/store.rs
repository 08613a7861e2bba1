use std::collections::HashMap;

use anyhow::anyhow;

use crate::error::{LibError, Result};
use crate::models::{EmployeeId, EmployeeNode, EmployeeRecord, normalize_supervisor_ids};

/// Immutable, addressable view of the employee directory at one point in time.
///
/// A snapshot is never mutated after `load`; share it behind an `Arc` for concurrent reads
/// and load a new one after every committed write.
#[derive(Debug, Clone, Default)]
pub struct HierarchySnapshot {
    nodes: Vec<EmployeeNode>,
    index: HashMap<EmployeeId, usize>,
}

impl HierarchySnapshot {
    pub fn load<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = EmployeeRecord>,
    {
        let records = records.into_iter();
        let mut nodes = Vec::with_capacity(records.size_hint().0);
        let mut index = HashMap::with_capacity(records.size_hint().0);

        for record in records {
            let id = EmployeeId(record.id.0.trim().to_string());
            if id.is_blank() {
                return Err(LibError::invalid(
                    "Employee id is required",
                    anyhow!("employee record {:?} had a blank id", record.name),
                ));
            }
            if index.insert(id.clone(), nodes.len()).is_some() {
                return Err(LibError::invalid(
                    "Employee ids must be unique",
                    anyhow!("duplicate employee id {}", id),
                ));
            }

            nodes.push(EmployeeNode {
                id,
                name: record.name,
                role: record.role,
                is_admin: record.is_admin,
                supervisor_ids: normalize_supervisor_ids(record.reports_to),
                updated_at: record.updated_at,
                resolved: Vec::new(),
            });
        }

        let mut dangling = 0usize;
        for node in &mut nodes {
            let mut resolved = Vec::with_capacity(node.supervisor_ids.len());
            for supervisor_id in &node.supervisor_ids {
                // Stale ids stay in `supervisor_ids` but never become edges.
                match index.get(supervisor_id) {
                    Some(position) => resolved.push(*position),
                    None => dangling += 1,
                }
            }
            node.resolved = resolved;
        }

        tracing::debug!(
            employees = nodes.len(),
            dangling_supervisor_refs = dangling,
            "loaded hierarchy snapshot"
        );

        Ok(Self { nodes, index })
    }

    pub fn get(&self, id: &EmployeeId) -> Result<&EmployeeNode> {
        self.position(id)
            .map(|position| &self.nodes[position])
            .ok_or_else(|| LibError::not_found("Employee not found", id))
    }

    pub fn contains(&self, id: &EmployeeId) -> bool {
        self.index.contains_key(id)
    }

    /// Every employee in load order. Call again to restart.
    pub fn all(&self) -> impl ExactSizeIterator<Item = &EmployeeNode> + Clone + '_ {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn position(&self, id: &EmployeeId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub(crate) fn node_at(&self, position: usize) -> &EmployeeNode {
        &self.nodes[position]
    }

    /// Resolved supervisor positions honouring the admin-root rule.
    pub(crate) fn effective_supervisors(&self, position: usize) -> &[usize] {
        let node = &self.nodes[position];
        if node.is_admin { &[] } else { node.resolved.as_slice() }
    }
}
