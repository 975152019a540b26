// src/filters.rs
use serde::{Deserialize, Serialize};

const DEFAULT_PAGE_LIMIT: i64 = 12;
const MAX_PAGE_LIMIT: i64 = 50;
const DEFAULT_SORT_BY: &str = "name";
const DEFAULT_SORT_ORDER: &str = "asc";
const SORTABLE_FIELDS: [&str; 3] = ["name", "price", "createdAt"];

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ListingParams {
    // Paginacja
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    offset: Option<i64>,

    // Filtry
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    search: Option<String>,

    //Sortowanie
    #[serde(default)]
    sort_by: Option<String>,
    #[serde(default)]
    order: Option<String>,
}

/// Parametry zapytania w postaci wysyłanej do API sklepu.
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamListingQuery {
    pub limit: i64,
    pub offset: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    pub sort_by: String,
    pub order: String,
}

impl ListingParams {
    pub fn limit(&self) -> i64 {
        match self.limit {
            Some(limit) if limit > 0 && limit <= MAX_PAGE_LIMIT => limit,
            Some(_) => MAX_PAGE_LIMIT,
            None => DEFAULT_PAGE_LIMIT,
        }
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    pub fn category(&self) -> Option<String> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
    }

    pub fn search(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }

    pub fn sort_by(&self) -> &str {
        match self.sort_by.as_deref() {
            Some(field) if SORTABLE_FIELDS.contains(&field) => field,
            _ => DEFAULT_SORT_BY,
        }
    }

    pub fn order(&self) -> &str {
        self.order.as_deref().map_or(DEFAULT_SORT_ORDER, |o| {
            if o.eq_ignore_ascii_case("desc") {
                "desc"
            } else {
                "asc"
            }
        })
    }

    pub fn to_upstream_query(&self) -> UpstreamListingQuery {
        UpstreamListingQuery {
            limit: self.limit(),
            offset: self.offset(),
            category: self.category(),
            search: self.search(),
            sort_by: self.sort_by().to_string(),
            order: self.order().to_string(),
        }
    }
}
