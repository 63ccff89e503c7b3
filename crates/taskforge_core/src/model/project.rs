//! Typed project record.

use crate::record::{
    get_i64, get_opt_f64, get_opt_i64, get_opt_text, get_text, FromRecord, Record, RecordResult,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub company_id: Option<i64>,
    pub owner_id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub status_id: i64,
    /// ISO-8601 calendar dates, stored as text.
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub budget: Option<f64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl FromRecord for Project {
    fn from_record(record: Record) -> RecordResult<Self> {
        Ok(Self {
            id: get_i64(&record, "id")?,
            company_id: get_opt_i64(&record, "company_id")?,
            owner_id: get_opt_i64(&record, "owner_id")?,
            name: get_text(&record, "name")?,
            description: get_opt_text(&record, "description")?,
            status_id: get_i64(&record, "status_id")?,
            start_date: get_opt_text(&record, "start_date")?,
            end_date: get_opt_text(&record, "end_date")?,
            budget: get_opt_f64(&record, "budget")?,
            created_at: get_i64(&record, "created_at")?,
            updated_at: get_i64(&record, "updated_at")?,
        })
    }
}
