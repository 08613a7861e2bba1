use std::future::Future;
use std::sync::Arc;

use anyhow::anyhow;
use chrono::{Duration, NaiveDateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::{LibError, Result};
use crate::models::{EmployeeId, EmployeeRecord};

/// A validated, deduplicated supervisor set ready to be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupervisorReplacement {
    pub employee_id: EmployeeId,
    pub supervisor_ids: Vec<EmployeeId>,
    /// Stamp observed when the change was validated; a different stored stamp is a conflict.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_updated_at: Option<NaiveDateTime>,
}

/// The store of record for employees.
///
/// Implementations report concurrent modification as `UpstreamConflict` and transport or
/// storage problems as `UpstreamFailure`.
pub trait EmployeeDirectory: Send + Sync {
    fn load_employees(&self) -> impl Future<Output = Result<Vec<EmployeeRecord>>> + Send;

    /// Full replacement of one employee's `reportsTo` list. Must be idempotent.
    fn replace_supervisors(
        &self,
        replacement: &SupervisorReplacement,
    ) -> impl Future<Output = Result<()>> + Send;
}

impl<D> EmployeeDirectory for Arc<D>
where
    D: EmployeeDirectory + ?Sized,
{
    fn load_employees(&self) -> impl Future<Output = Result<Vec<EmployeeRecord>>> + Send {
        (**self).load_employees()
    }

    fn replace_supervisors(
        &self,
        replacement: &SupervisorReplacement,
    ) -> impl Future<Output = Result<()>> + Send {
        (**self).replace_supervisors(replacement)
    }
}

/// Directory kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    records: RwLock<Vec<EmployeeRecord>>,
}

impl InMemoryDirectory {
    /// Records without a stamp get one, so every later write can be checked against it.
    pub fn new(mut records: Vec<EmployeeRecord>) -> Self {
        for record in &mut records {
            if record.updated_at.is_none() {
                record.updated_at = Some(next_stamp(None));
            }
        }
        Self {
            records: RwLock::new(records),
        }
    }

    /// Overwrites one record as an external editor would, bumping its stamp.
    pub async fn upsert(&self, mut record: EmployeeRecord) {
        let mut records = self.records.write().await;
        match records
            .iter_mut()
            .find(|existing| same_employee(&existing.id, &record.id))
        {
            Some(existing) => {
                record.updated_at = Some(next_stamp(existing.updated_at));
                *existing = record;
            }
            None => {
                record.updated_at = Some(next_stamp(None));
                records.push(record);
            }
        }
    }
}

impl EmployeeDirectory for InMemoryDirectory {
    async fn load_employees(&self) -> Result<Vec<EmployeeRecord>> {
        Ok(self.records.read().await.clone())
    }

    async fn replace_supervisors(&self, replacement: &SupervisorReplacement) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|record| same_employee(&record.id, &replacement.employee_id))
            .ok_or_else(|| LibError::not_found("Employee not found", &replacement.employee_id))?;

        if record.updated_at != replacement.expected_updated_at {
            return Err(LibError::upstream_conflict(
                "Employee was modified by someone else; reload and try again",
                anyhow!(
                    "stamp mismatch for {}: expected {:?}, stored {:?}",
                    replacement.employee_id,
                    replacement.expected_updated_at,
                    record.updated_at
                ),
            ));
        }

        record.reports_to = replacement.supervisor_ids.clone();
        record.updated_at = Some(next_stamp(record.updated_at));
        Ok(())
    }
}

// Snapshots trim stored ids, so lookups have to as well.
fn same_employee(stored: &EmployeeId, id: &EmployeeId) -> bool {
    stored.as_str().trim() == id.as_str().trim()
}

fn next_stamp(previous: Option<NaiveDateTime>) -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    match previous {
        Some(previous) if previous >= now => previous + Duration::microseconds(1),
        _ => now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::RoleRef;

    fn employee(id: &str) -> EmployeeRecord {
        EmployeeRecord {
            id: id.into(),
            name: id.to_uppercase(),
            role: RoleRef::Named("field".to_string()),
            is_admin: false,
            reports_to: Vec::new(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn replace_supervisors_overwrites_list_and_bumps_stamp() {
        let directory = InMemoryDirectory::new(vec![employee("a"), employee("b")]);
        let observed = directory.load_employees().await.expect("load")[1].updated_at;
        assert!(observed.is_some());

        directory
            .replace_supervisors(&SupervisorReplacement {
                employee_id: "b".into(),
                supervisor_ids: vec!["a".into()],
                expected_updated_at: observed,
            })
            .await
            .expect("write succeeds");

        let records = directory.load_employees().await.expect("load");
        assert_eq!(records[1].reports_to, vec![EmployeeId::from("a")]);
        assert!(records[1].updated_at > observed);
    }

    #[tokio::test]
    async fn write_without_a_stamp_cannot_overwrite_a_later_edit() {
        let directory = InMemoryDirectory::new(vec![employee("a"), employee("b"), employee("c")]);
        directory
            .replace_supervisors(&SupervisorReplacement {
                employee_id: "b".into(),
                supervisor_ids: vec!["c".into()],
                expected_updated_at: directory.load_employees().await.expect("load")[1].updated_at,
            })
            .await
            .expect("first writer wins");

        let err = directory
            .replace_supervisors(&SupervisorReplacement {
                employee_id: "b".into(),
                supervisor_ids: vec!["a".into()],
                expected_updated_at: None,
            })
            .await
            .expect_err("unstamped write rejected");
        assert_eq!(err.kind, ErrorKind::UpstreamConflict);

        let records = directory.load_employees().await.expect("load");
        assert_eq!(records[1].reports_to, vec![EmployeeId::from("c")]);
    }

    #[tokio::test]
    async fn padded_stored_ids_match_trimmed_lookups() {
        let directory = InMemoryDirectory::new(vec![employee("a"), employee(" b ")]);
        let observed = directory.load_employees().await.expect("load")[1].updated_at;

        directory
            .replace_supervisors(&SupervisorReplacement {
                employee_id: "b".into(),
                supervisor_ids: vec!["a".into()],
                expected_updated_at: observed,
            })
            .await
            .expect("padded id found");

        let records = directory.load_employees().await.expect("load");
        assert_eq!(records[1].reports_to, vec![EmployeeId::from("a")]);
    }

    #[tokio::test]
    async fn stale_stamp_is_a_conflict() {
        let directory = InMemoryDirectory::new(vec![employee("a"), employee("b")]);
        directory.upsert(employee("b")).await;
        let stale = Some(Utc::now().naive_utc() - Duration::days(1));

        let err = directory
            .replace_supervisors(&SupervisorReplacement {
                employee_id: "b".into(),
                supervisor_ids: vec!["a".into()],
                expected_updated_at: stale,
            })
            .await
            .expect_err("stale write rejected");
        assert_eq!(err.kind, ErrorKind::UpstreamConflict);

        let records = directory.load_employees().await.expect("load");
        assert!(records[1].reports_to.is_empty());
    }

    #[tokio::test]
    async fn arc_wrapped_directory_delegates() {
        let directory = Arc::new(InMemoryDirectory::new(vec![employee("a")]));
        let records = EmployeeDirectory::load_employees(&directory)
            .await
            .expect("load");
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn stamps_are_strictly_increasing() {
        let far_future = Utc::now().naive_utc() + Duration::days(1);
        assert!(next_stamp(Some(far_future)) > far_future);
    }
}
