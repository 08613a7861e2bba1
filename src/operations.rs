use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::algorithms::AncestorResolver;
use crate::config::HierarchyConfig;
use crate::directory::{EmployeeDirectory, SupervisorReplacement};
use crate::error::Result;
use crate::invariants::{EdgeMutator, hierarchy_violations};
use crate::models::{
    AncestorTree, AssignSupervisorsCommand, EmployeeId, EnrichedEmployee, HierarchyViolation,
};
use crate::store::HierarchySnapshot;

/// Command-style hierarchy actions for callers that route requests generically.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum HierarchyOperation {
    List,
    GetAncestorTree {
        employee_id: EmployeeId,
    },
    AssignSupervisors {
        employee_id: EmployeeId,
        #[serde(default)]
        supervisor_ids: Vec<EmployeeId>,
    },
    ClearSupervisors {
        employee_id: EmployeeId,
    },
    Audit,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum HierarchyOperationResult {
    Employees { items: Vec<EnrichedEmployee> },
    AncestorTree { tree: AncestorTree },
    SupervisorsReplaced { replacement: SupervisorReplacement },
    Violations { items: Vec<HierarchyViolation> },
}

/// Public entry point to the reporting hierarchy.
///
/// Every call loads a fresh snapshot from the directory; nothing is cached between calls,
/// so a query issued after a successful write always sees that write.
#[derive(Debug, Clone)]
pub struct HierarchyFacade<D> {
    directory: D,
    config: HierarchyConfig,
}

impl<D> HierarchyFacade<D>
where
    D: EmployeeDirectory,
{
    pub fn new(directory: D) -> Self {
        Self::with_config(directory, HierarchyConfig::default())
    }

    pub fn with_config(directory: D, config: HierarchyConfig) -> Self {
        Self { directory, config }
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn config(&self) -> &HierarchyConfig {
        &self.config
    }

    pub async fn snapshot(&self) -> Result<Arc<HierarchySnapshot>> {
        let records = self.directory.load_employees().await?;
        Ok(Arc::new(HierarchySnapshot::load(records)?))
    }

    pub async fn execute(&self, operation: HierarchyOperation) -> Result<HierarchyOperationResult> {
        match operation {
            HierarchyOperation::List => {
                let items = self.list_enriched().await?;
                Ok(HierarchyOperationResult::Employees { items })
            }
            HierarchyOperation::GetAncestorTree { employee_id } => {
                let tree = self.get_ancestor_tree(&employee_id).await?;
                Ok(HierarchyOperationResult::AncestorTree { tree })
            }
            HierarchyOperation::AssignSupervisors {
                employee_id,
                supervisor_ids,
            } => {
                let replacement = self.assign_supervisors(employee_id, supervisor_ids).await?;
                Ok(HierarchyOperationResult::SupervisorsReplaced { replacement })
            }
            HierarchyOperation::ClearSupervisors { employee_id } => {
                let replacement = self.clear_supervisors(employee_id).await?;
                Ok(HierarchyOperationResult::SupervisorsReplaced { replacement })
            }
            HierarchyOperation::Audit => {
                let items = self.audit().await?;
                Ok(HierarchyOperationResult::Violations { items })
            }
        }
    }

    pub async fn list_enriched(&self) -> Result<Vec<EnrichedEmployee>> {
        let snapshot = self.snapshot().await?;
        Ok(enriched_listing(&snapshot))
    }

    pub async fn get_ancestor_tree(&self, employee_id: &EmployeeId) -> Result<AncestorTree> {
        let snapshot = self.snapshot().await?;
        AncestorResolver::with_limits(&snapshot, &self.config).ancestor_tree(employee_id)
    }

    /// Replaces the employee's whole supervisor set after validating it against a snapshot
    /// taken at the start of this call.
    pub async fn assign_supervisors(
        &self,
        employee_id: EmployeeId,
        supervisor_ids: Vec<EmployeeId>,
    ) -> Result<SupervisorReplacement> {
        let snapshot = self.snapshot().await?;
        EdgeMutator::new(&snapshot)
            .commit(
                &self.directory,
                AssignSupervisorsCommand::new(employee_id, supervisor_ids),
            )
            .await
    }

    pub async fn clear_supervisors(&self, employee_id: EmployeeId) -> Result<SupervisorReplacement> {
        self.assign_supervisors(employee_id, Vec::new()).await
    }

    pub async fn audit(&self) -> Result<Vec<HierarchyViolation>> {
        let snapshot = self.snapshot().await?;
        Ok(hierarchy_violations(&snapshot))
    }
}

/// Every employee with resolved direct supervisors, administrators first.
///
/// Within each group the load order is kept.
pub fn enriched_listing(snapshot: &HierarchySnapshot) -> Vec<EnrichedEmployee> {
    let resolver = AncestorResolver::new(snapshot);
    let (admins, others): (Vec<_>, Vec<_>) = snapshot.all().partition(|node| node.is_admin);

    admins
        .into_iter()
        .chain(others)
        .map(|node| EnrichedEmployee {
            id: node.id.clone(),
            name: node.name.clone(),
            role: node.role.clone(),
            is_admin: node.is_admin,
            supervisors: resolver
                .direct_supervisors(&node.id)
                .map(|supervisors| supervisors.iter().map(|s| s.summary()).collect())
                .unwrap_or_default(),
        })
        .collect()
}
