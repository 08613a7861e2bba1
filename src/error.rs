use std::fmt;

use anyhow::anyhow;
use serde::Serialize;

use crate::models::EmployeeId;

pub type Result<T> = std::result::Result<T, LibError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    SelfReference,
    CycleDetected,
    UpstreamConflict,
    UpstreamFailure,
}

/// Structured payload for the error kinds that name specific employees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorDetails {
    MissingEmployee {
        employee_id: EmployeeId,
    },
    SelfReference {
        employee_id: EmployeeId,
    },
    Cycle {
        employee_id: EmployeeId,
        through_supervisor_id: EmployeeId,
        path: Vec<EmployeeId>,
    },
}

#[derive(Debug)]
pub struct LibError {
    pub kind: ErrorKind,
    pub code: &'static str,
    pub public: &'static str,
    pub details: Option<ErrorDetails>,
    pub source: anyhow::Error,
}

impl LibError {
    pub fn invalid(public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::InvalidInput,
            code: "invalid_input",
            public,
            details: None,
            source,
        }
    }

    pub fn invalid_with_code(
        code: &'static str,
        public: &'static str,
        source: anyhow::Error,
    ) -> Self {
        Self {
            kind: ErrorKind::InvalidInput,
            code,
            public,
            details: None,
            source,
        }
    }

    pub fn not_found(public: &'static str, employee_id: &EmployeeId) -> Self {
        Self {
            kind: ErrorKind::NotFound,
            code: "employee_not_found",
            public,
            details: Some(ErrorDetails::MissingEmployee {
                employee_id: employee_id.clone(),
            }),
            source: anyhow!("employee {} not found", employee_id),
        }
    }

    pub fn self_reference(employee_id: &EmployeeId) -> Self {
        Self {
            kind: ErrorKind::SelfReference,
            code: "hierarchy_self_reference",
            public: "An employee cannot report to themselves",
            details: Some(ErrorDetails::SelfReference {
                employee_id: employee_id.clone(),
            }),
            source: anyhow!("employee {} listed as its own supervisor", employee_id),
        }
    }

    pub fn cycle(
        employee_id: &EmployeeId,
        through_supervisor_id: &EmployeeId,
        path: Vec<EmployeeId>,
    ) -> Self {
        let rendered = path
            .iter()
            .map(EmployeeId::as_str)
            .collect::<Vec<_>>()
            .join(" -> ");
        Self {
            kind: ErrorKind::CycleDetected,
            code: "hierarchy_cycle",
            public: "Assigning these supervisors would create a reporting cycle",
            details: Some(ErrorDetails::Cycle {
                employee_id: employee_id.clone(),
                through_supervisor_id: through_supervisor_id.clone(),
                path,
            }),
            source: anyhow!(
                "employee {} reporting to {} closes cycle {}",
                employee_id,
                through_supervisor_id,
                rendered
            ),
        }
    }

    pub fn upstream_conflict(public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::UpstreamConflict,
            code: "upstream_conflict",
            public,
            details: None,
            source,
        }
    }

    pub fn upstream_failure(public: &'static str, source: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::UpstreamFailure,
            code: "upstream_failure",
            public,
            details: None,
            source,
        }
    }

    /// The employee id carried by `NotFound`, `SelfReference` and `CycleDetected` errors.
    pub fn employee_id(&self) -> Option<&EmployeeId> {
        match self.details.as_ref()? {
            ErrorDetails::MissingEmployee { employee_id }
            | ErrorDetails::SelfReference { employee_id }
            | ErrorDetails::Cycle { employee_id, .. } => Some(employee_id),
        }
    }
}

impl fmt::Display for LibError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.public, self.code, self.source)
    }
}

impl std::error::Error for LibError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for LibError {
    fn from(value: sqlx::Error) -> Self {
        Self::upstream_failure("Employee directory request failed", anyhow!(value))
    }
}
