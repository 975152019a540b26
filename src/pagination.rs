// src/pagination.rs
use serde::{Deserialize, Serialize};

/// Strona wyników z API sklepu.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    #[serde(default)]
    pub total_items: i64,
    #[serde(default)]
    pub total_pages: i64,
    #[serde(default)]
    pub current_page: i64,
    #[serde(default)]
    pub per_page: i64,
    pub data: Vec<T>,
}
