//! Role permission assignment.
//!
//! # Invariants
//! - A role's permission set is replaced atomically or not at all.
//! - Only active roles accept permission changes.

use super::ServiceResult;
use crate::model::{PERMISSIONS, ROLES, ROLE_PERMISSIONS};
use crate::record::{with_transaction, Record, RecordRepository, SqliteRecordRepository};
use log::info;
use rusqlite::Connection;

pub struct RoleService<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> RoleService<'conn> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }

    /// Gets one active role.
    pub fn role(&self, role_id: i64) -> ServiceResult<Record> {
        let roles = SqliteRecordRepository::try_new(&*self.conn, &ROLES)?;
        Ok(roles.find_or_fail(role_id)?)
    }

    /// Replaces the permission set of `role_id`.
    ///
    /// Returns the stored permission ids, ascending. Unknown permission ids
    /// fail the whole operation and leave the previous set in place.
    pub fn set_permissions(
        &mut self,
        role_id: i64,
        permission_ids: &[i64],
    ) -> ServiceResult<Vec<i64>> {
        let stored = with_transaction(self.conn, |tx| {
            let roles = SqliteRecordRepository::try_new(tx, &ROLES)?;
            roles.find_or_fail(role_id)?;
            ROLE_PERMISSIONS.replace_links_in(tx, role_id, permission_ids)?;
            ROLE_PERMISSIONS.linked_ids(tx, role_id)
        })?;

        info!(
            "event=role_permissions_set module=service status=ok role_id={role_id} count={}",
            stored.len()
        );
        Ok(stored)
    }

    /// Permission ids granted to `role_id`, ascending.
    pub fn permissions(&self, role_id: i64) -> ServiceResult<Vec<i64>> {
        self.role(role_id)?;
        Ok(ROLE_PERMISSIONS.linked_ids(&*self.conn, role_id)?)
    }

    /// Permission records granted to `role_id`, ordered by id.
    pub fn permission_records(&self, role_id: i64) -> ServiceResult<Vec<Record>> {
        let ids = self.permissions(role_id)?;
        let permissions = SqliteRecordRepository::try_new(&*self.conn, &PERMISSIONS)?;
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = permissions.find(id)? {
                records.push(record);
            }
        }
        Ok(records)
    }
}
