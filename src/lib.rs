pub mod algorithms;
#[cfg(feature = "api")]
pub mod api;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod directory;
pub mod error;
pub mod invariants;
pub mod models;
pub mod operations;
pub mod store;

pub mod prelude {
    pub use crate::algorithms::{AncestorResolver, has_cycle, reporting_order};
    #[cfg(feature = "api")]
    pub use crate::api::{HasDirectory, HierarchyApp};
    pub use crate::config::HierarchyConfig;
    #[cfg(feature = "sqlx")]
    pub use crate::db::{PgEmployeeDirectory, create_hierarchy_tables};
    pub use crate::directory::{EmployeeDirectory, InMemoryDirectory, SupervisorReplacement};
    pub use crate::error::{ErrorDetails, ErrorKind, LibError, Result};
    pub use crate::invariants::{
        EdgeMutator, ensure_hierarchy_invariants, find_cycles, hierarchy_violations,
    };
    pub use crate::models::{
        AncestorNode, AncestorTree, AssignSupervisorsCommand, AssignSupervisorsPayload, EmployeeId,
        EmployeeNode, EmployeeRecord, EnrichedEmployee, HierarchyViolation, RoleRef,
        SupervisorSummary,
    };
    pub use crate::operations::{
        HierarchyFacade, HierarchyOperation, HierarchyOperationResult, enriched_listing,
    };
    pub use crate::store::HierarchySnapshot;
}
