use serde::{Deserialize, Serialize};
use tsvflow_common::types::Record;

use crate::api::response::PaginationMeta;
use crate::ingest::{RecordStore, StoreError};

/// Group size used when the request does not name one.
pub const DEFAULT_LIMIT: usize = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListRecordsQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_guid: Option<String>,
    /// Starting offset into the unit's records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    /// Records per group
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRecordsResponse {
    pub groups: Vec<Vec<Record>>,
    pub pagination: PaginationMeta,
}

#[derive(Debug, thiserror::Error)]
pub enum ListRecordsError {
    #[error("unit_guid is required")]
    UnitGuidRequired,
    #[error("Limit must be greater than 0")]
    InvalidLimit,
    #[error("No records found for unit '{0}'")]
    NotFound(String),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ListRecordsQuery {
    pub fn validate(&self) -> Result<(), ListRecordsError> {
        if self.unit_guid().is_empty() {
            return Err(ListRecordsError::UnitGuidRequired);
        }
        if self.limit == Some(0) {
            return Err(ListRecordsError::InvalidLimit);
        }
        Ok(())
    }

    fn unit_guid(&self) -> &str {
        self.unit_guid.as_deref().map(str::trim).unwrap_or_default()
    }

    fn page(&self) -> usize {
        self.page.unwrap_or(0)
    }

    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT)
    }
}

#[tracing::instrument(skip(store))]
pub async fn handle(
    store: &dyn RecordStore,
    query: ListRecordsQuery,
) -> Result<ListRecordsResponse, ListRecordsError> {
    query.validate()?;

    let unit_guid = query.unit_guid();
    let records = store.records_by_unit(unit_guid).await?;
    if records.is_empty() {
        return Err(ListRecordsError::NotFound(unit_guid.to_string()));
    }

    let (page, limit) = (query.page(), query.limit());
    let groups = paginate(&records, page, limit);

    Ok(ListRecordsResponse {
        pagination: PaginationMeta::new(page, limit, records.len(), groups.len()),
        groups,
    })
}

/// Split `data[page..]` into consecutive groups of `limit` records.
///
/// Empty when `page` is past the end or `limit` is zero. Only the last group
/// may be shorter than `limit`.
pub fn paginate(data: &[Record], page: usize, limit: usize) -> Vec<Vec<Record>> {
    if limit == 0 || page >= data.len() {
        return Vec::new();
    }
    data[page..].chunks(limit).map(<[Record]>::to_vec).collect()
}
