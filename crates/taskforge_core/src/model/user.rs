//! Typed user record.
//!
//! # Invariants
//! - Credential and token columns are hidden by the descriptor and never
//!   appear on this struct.

use crate::record::{
    get_i64, get_opt_i64, get_text, FromRecord, Record, RecordError, RecordResult,
};
use serde::{Deserialize, Serialize};

/// Account lifecycle state stored in `users.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    /// Registered, activation pending.
    Pending,
    Active,
    Inactive,
}

impl UserStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    pub fn parse(value: &str) -> RecordResult<Self> {
        match value {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(RecordError::InvalidData(format!(
                "unknown user status `{other}`"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub company_id: Option<i64>,
    pub role_id: Option<i64>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub status: UserStatus,
    /// Epoch milliseconds of the last successful sign-in.
    pub last_login_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl FromRecord for User {
    fn from_record(record: Record) -> RecordResult<Self> {
        Ok(Self {
            id: get_i64(&record, "id")?,
            company_id: get_opt_i64(&record, "company_id")?,
            role_id: get_opt_i64(&record, "role_id")?,
            first_name: get_text(&record, "first_name")?,
            last_name: get_text(&record, "last_name")?,
            email: get_text(&record, "email")?,
            status: UserStatus::parse(&get_text(&record, "status")?)?,
            last_login_at: get_opt_i64(&record, "last_login_at")?,
            created_at: get_i64(&record, "created_at")?,
            updated_at: get_i64(&record, "updated_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{User, UserStatus};
    use crate::record::{record, FromRecord, RecordError};
    use rusqlite::types::Value;

    fn sample() -> crate::record::Record {
        record([
            ("id", Value::Integer(4)),
            ("company_id", Value::Null),
            ("role_id", Value::Integer(2)),
            ("first_name", Value::Text("Ada".into())),
            ("last_name", Value::Text("Byron".into())),
            ("email", Value::Text("ada@example.com".into())),
            ("status", Value::Text("active".into())),
            ("last_login_at", Value::Null),
            ("created_at", Value::Integer(1_700_000_000_000)),
            ("updated_at", Value::Integer(1_700_000_000_000)),
            ("is_deleted", Value::Integer(0)),
        ])
    }

    #[test]
    fn converts_policy_filtered_row() {
        let user = User::from_record(sample()).unwrap();
        assert_eq!(user.id, 4);
        assert_eq!(user.company_id, None);
        assert_eq!(user.status, UserStatus::Active);
        assert_eq!(user.full_name(), "Ada Byron");
    }

    #[test]
    fn unknown_status_is_invalid_data() {
        let mut row = sample();
        row.insert("status".into(), Value::Text("banned".into()));
        assert!(matches!(
            User::from_record(row),
            Err(RecordError::InvalidData(message)) if message.contains("banned")
        ));
    }
}
