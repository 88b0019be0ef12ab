//! Selection criteria for read-side queries.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Sort order for selected records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderBy {
    /// Most recently updated first
    #[default]
    UpdatedDesc,
    /// Most recently submitted first
    CreatedDesc,
}

/// Stateless per-query selection parameters.
///
/// Dates bound the output window handed to the store's ranged read; both
/// default to yesterday when unset. Everything else narrows the result
/// in-memory.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SelectionCriteria {
    /// Inclusive start of the output window
    #[serde(default)]
    pub start_date: Option<NaiveDate>,

    /// Inclusive end of the output window
    #[serde(default)]
    pub end_date: Option<NaiveDate>,

    /// A record passes when it matches at least one term (empty = no filter)
    #[serde(default)]
    pub keywords_include: Vec<String>,

    /// A record is rejected when it matches any term
    #[serde(default)]
    pub keywords_exclude: Vec<String>,

    /// Category allow-list (empty = no filter)
    #[serde(default)]
    pub categories: Vec<String>,

    /// Maximum number of records returned; 0 means unbounded
    #[serde(default)]
    pub limit: usize,

    #[serde(default)]
    pub order_by: OrderBy,
}
