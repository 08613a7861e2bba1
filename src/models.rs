use std::collections::HashSet;
use std::fmt;

use anyhow::anyhow;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{LibError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct EmployeeId(pub String);

impl EmployeeId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    fn trimmed(self) -> Self {
        if self.0.trim().len() == self.0.len() {
            self
        } else {
            Self(self.0.trim().to_string())
        }
    }
}

impl fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EmployeeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EmployeeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Either a built-in role tag or a reference to a custom role definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoleRef {
    Named(String),
    Custom { id: String, name: String },
}

impl RoleRef {
    pub fn display_name(&self) -> &str {
        match self {
            RoleRef::Named(name) => name,
            RoleRef::Custom { name, .. } => name,
        }
    }
}

impl Default for RoleRef {
    fn default() -> Self {
        RoleRef::Named(String::new())
    }
}

/// One employee as supplied by the employee directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRecord {
    pub id: EmployeeId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: RoleRef,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub reports_to: Vec<EmployeeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<NaiveDateTime>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<EmployeeId>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<EmployeeId>>::deserialize(deserializer)?.unwrap_or_default())
}

/// An employee inside a loaded snapshot.
///
/// `supervisor_ids` is the normalized stored list and may contain ids that did not
/// resolve; `resolved` holds snapshot indices for the ones that did.
#[derive(Debug, Clone)]
pub struct EmployeeNode {
    pub id: EmployeeId,
    pub name: String,
    pub role: RoleRef,
    pub is_admin: bool,
    pub supervisor_ids: Vec<EmployeeId>,
    pub updated_at: Option<NaiveDateTime>,
    pub(crate) resolved: Vec<usize>,
}

impl EmployeeNode {
    pub fn summary(&self) -> SupervisorSummary {
        SupervisorSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            role: self.role.clone(),
        }
    }

    /// Stored supervisor ids that do not exist in the snapshot.
    pub fn has_dangling_supervisors(&self) -> bool {
        self.resolved.len() != self.supervisor_ids.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupervisorSummary {
    pub id: EmployeeId,
    pub name: String,
    pub role: RoleRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedEmployee {
    pub id: EmployeeId,
    pub name: String,
    pub role: RoleRef,
    pub is_admin: bool,
    pub supervisors: Vec<SupervisorSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AncestorTree {
    /// Administrators are hierarchy roots; a tree does not apply to them.
    NotApplicable,
    /// No supervisors configured yet.
    Empty,
    Tree { root: AncestorNode },
}

impl AncestorTree {
    pub fn root(&self) -> Option<&AncestorNode> {
        match self {
            AncestorTree::Tree { root } => Some(root),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AncestorNode {
    pub id: EmployeeId,
    pub name: String,
    pub role: RoleRef,
    pub supervisors: Vec<AncestorNode>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

impl AncestorNode {
    pub fn supervisor_ids(&self) -> Vec<&EmployeeId> {
        self.supervisors.iter().map(|node| &node.id).collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignSupervisorsPayload {
    #[serde(default)]
    pub supervisor_ids: Vec<EmployeeId>,
}

/// Full replacement of one employee's supervisor set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignSupervisorsCommand {
    pub employee_id: EmployeeId,
    #[serde(default)]
    pub supervisor_ids: Vec<EmployeeId>,
}

impl AssignSupervisorsCommand {
    pub fn new(employee_id: EmployeeId, supervisor_ids: Vec<EmployeeId>) -> Self {
        Self {
            employee_id,
            supervisor_ids,
        }
    }

    pub fn clear(employee_id: EmployeeId) -> Self {
        Self::new(employee_id, Vec::new())
    }

    pub fn normalize(self) -> Result<Self> {
        let employee_id = self.employee_id.trimmed();
        if employee_id.is_blank() {
            return Err(LibError::invalid(
                "Employee id is required",
                anyhow!("blank employee id in supervisor assignment"),
            ));
        }

        Ok(Self {
            employee_id,
            supervisor_ids: normalize_supervisor_ids(self.supervisor_ids),
        })
    }
}

/// Trims ids, drops blank entries and removes duplicates keeping first-seen order.
pub fn normalize_supervisor_ids<I>(ids: I) -> Vec<EmployeeId>
where
    I: IntoIterator<Item = EmployeeId>,
{
    let mut seen = HashSet::new();
    let mut output = Vec::new();
    for id in ids {
        let id = id.trimmed();
        if id.is_blank() {
            continue;
        }
        if seen.insert(id.clone()) {
            output.push(id);
        }
    }
    output
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HierarchyViolation {
    UnknownSupervisorReference {
        employee_id: EmployeeId,
        missing_supervisor_id: EmployeeId,
    },
    SelfReference {
        employee_id: EmployeeId,
    },
    AdminHasSupervisors {
        employee_id: EmployeeId,
        supervisor_ids: Vec<EmployeeId>,
    },
    CycleDetected {
        path: Vec<EmployeeId>,
    },
}

impl HierarchyViolation {
    pub const fn error_code(&self) -> &'static str {
        match self {
            HierarchyViolation::UnknownSupervisorReference { .. } => {
                "hierarchy_unknown_supervisor_reference"
            }
            HierarchyViolation::SelfReference { .. } => "hierarchy_self_reference",
            HierarchyViolation::AdminHasSupervisors { .. } => "hierarchy_admin_has_supervisors",
            HierarchyViolation::CycleDetected { .. } => "hierarchy_cycle",
        }
    }

    pub const fn public_message(&self) -> &'static str {
        match self {
            HierarchyViolation::UnknownSupervisorReference { .. } => {
                "Supervisor reference points to an employee that does not exist"
            }
            HierarchyViolation::SelfReference { .. } => "Employee is listed as their own supervisor",
            HierarchyViolation::AdminHasSupervisors { .. } => {
                "Administrator has stored supervisors that are ignored"
            }
            HierarchyViolation::CycleDetected { .. } => "Reporting lines form a cycle",
        }
    }
}
