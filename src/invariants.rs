use anyhow::anyhow;

use crate::algorithms::{AncestorResolver, kahn_order};
use crate::directory::{EmployeeDirectory, SupervisorReplacement};
use crate::error::{LibError, Result};
use crate::models::{AssignSupervisorsCommand, EmployeeId, HierarchyViolation};
use crate::store::HierarchySnapshot;

/// Validates supervisor-set replacements against one snapshot.
///
/// Checks run in a fixed order and stop at the first failure: the employee must exist,
/// every candidate must exist, the employee may not list itself, administrators take no
/// supervisors, and no candidate may already sit below the employee.
#[derive(Debug, Clone, Copy)]
pub struct EdgeMutator<'a> {
    snapshot: &'a HierarchySnapshot,
}

impl<'a> EdgeMutator<'a> {
    pub fn new(snapshot: &'a HierarchySnapshot) -> Self {
        Self { snapshot }
    }

    pub fn validate(&self, command: AssignSupervisorsCommand) -> Result<SupervisorReplacement> {
        let command = command.normalize()?;
        let employee = self.snapshot.get(&command.employee_id)?;

        for supervisor_id in &command.supervisor_ids {
            if !self.snapshot.contains(supervisor_id) {
                return Err(LibError::not_found("Supervisor not found", supervisor_id));
            }
        }

        if command.supervisor_ids.contains(&command.employee_id) {
            return Err(LibError::self_reference(&command.employee_id));
        }

        if employee.is_admin && !command.supervisor_ids.is_empty() {
            return Err(LibError::invalid_with_code(
                "admin_hierarchy_not_applicable",
                "Administrators cannot be assigned supervisors",
                anyhow!("employee {} is an administrator", command.employee_id),
            ));
        }

        let resolver = AncestorResolver::new(self.snapshot);
        for supervisor_id in &command.supervisor_ids {
            if let Some(path) = resolver.path_to_ancestor(supervisor_id, &command.employee_id)? {
                let mut cycle = Vec::with_capacity(path.len() + 1);
                cycle.push(command.employee_id.clone());
                cycle.extend(path);
                return Err(LibError::cycle(&command.employee_id, supervisor_id, cycle));
            }
        }

        Ok(SupervisorReplacement {
            employee_id: command.employee_id,
            supervisor_ids: command.supervisor_ids,
            expected_updated_at: employee.updated_at,
        })
    }

    /// Validates, then hands the replacement to the directory. Nothing is written on failure.
    pub async fn commit<D>(
        &self,
        directory: &D,
        command: AssignSupervisorsCommand,
    ) -> Result<SupervisorReplacement>
    where
        D: EmployeeDirectory + ?Sized,
    {
        let replacement = match self.validate(command) {
            Ok(replacement) => replacement,
            Err(err) => {
                tracing::warn!(code = err.code, error = %err.source, "supervisor assignment rejected");
                return Err(err);
            }
        };

        directory.replace_supervisors(&replacement).await?;
        tracing::info!(
            employee_id = %replacement.employee_id,
            supervisors = replacement.supervisor_ids.len(),
            "supervisor set replaced"
        );

        Ok(replacement)
    }
}

/// Every problem in the stored hierarchy, in load order, with cycles last.
pub fn hierarchy_violations(snapshot: &HierarchySnapshot) -> Vec<HierarchyViolation> {
    let mut violations = Vec::new();
    for node in snapshot.all() {
        for supervisor_id in &node.supervisor_ids {
            if !snapshot.contains(supervisor_id) {
                violations.push(HierarchyViolation::UnknownSupervisorReference {
                    employee_id: node.id.clone(),
                    missing_supervisor_id: supervisor_id.clone(),
                });
            }
        }

        if node.supervisor_ids.contains(&node.id) {
            violations.push(HierarchyViolation::SelfReference {
                employee_id: node.id.clone(),
            });
        }

        if node.is_admin && !node.supervisor_ids.is_empty() {
            violations.push(HierarchyViolation::AdminHasSupervisors {
                employee_id: node.id.clone(),
                supervisor_ids: node.supervisor_ids.clone(),
            });
        }
    }

    violations.extend(
        find_cycles(snapshot)
            .into_iter()
            .filter(|path| path.len() > 2)
            .map(|path| HierarchyViolation::CycleDetected { path }),
    );

    violations
}

pub fn ensure_hierarchy_invariants(snapshot: &HierarchySnapshot) -> Result<()> {
    let violations = hierarchy_violations(snapshot);
    if let Some(first) = violations.first() {
        return Err(LibError::invalid_with_code(
            first.error_code(),
            first.public_message(),
            anyhow!("hierarchy invariant validation failed: {:?}", violations),
        ));
    }

    Ok(())
}

/// Closed reporting loops over effective edges, each as `[a, b, ..., a]`.
///
/// Self references show up as `[a, a]`.
pub fn find_cycles(snapshot: &HierarchySnapshot) -> Vec<Vec<EmployeeId>> {
    // Anything Kahn's order reaches cannot sit on a cycle.
    let mut finished = vec![false; snapshot.len()];
    for position in kahn_order(snapshot) {
        finished[position] = true;
    }

    let mut cycles = Vec::new();
    let mut on_path = vec![false; snapshot.len()];
    for start in 0..snapshot.len() {
        if finished[start] {
            continue;
        }

        let mut path = vec![start];
        let mut frames: Vec<(usize, usize)> = vec![(start, 0)];
        on_path[start] = true;

        while let Some((position, next_child)) = frames.last_mut() {
            let position = *position;
            let supervisors = snapshot.effective_supervisors(position);
            let Some(&supervisor) = supervisors.get(*next_child) else {
                frames.pop();
                path.pop();
                on_path[position] = false;
                finished[position] = true;
                continue;
            };
            *next_child += 1;

            if on_path[supervisor] {
                if let Some(from) = path.iter().position(|p| *p == supervisor) {
                    let mut cycle: Vec<EmployeeId> = path[from..]
                        .iter()
                        .map(|p| snapshot.node_at(*p).id.clone())
                        .collect();
                    cycle.push(snapshot.node_at(supervisor).id.clone());
                    cycles.push(cycle);
                }
                continue;
            }
            if finished[supervisor] {
                continue;
            }

            on_path[supervisor] = true;
            path.push(supervisor);
            frames.push((supervisor, 0));
        }
    }

    cycles
}
