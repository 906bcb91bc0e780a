//! Token pagination as HubSpot does it
//!
//! - v3 APIs return `paging.next.after`, sent back as `after`
//! - legacy email events return `offset`, sent back as `offset` while `hasMore`

use super::types::{token_at, NextPage, PaginationState, Paginator, StopCondition};
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

/// Follows a next-page token found in each response
#[derive(Debug, Clone)]
pub struct CursorPaginator {
    /// Request parameter that carries the token
    pub cursor_param: String,
    /// Dotted path of the token in the response
    pub cursor_path: String,
    pub stop_condition: StopCondition,
}

impl CursorPaginator {
    pub fn new(
        cursor_param: impl Into<String>,
        cursor_path: impl Into<String>,
        stop_condition: StopCondition,
    ) -> Self {
        Self {
            cursor_param: cursor_param.into(),
            cursor_path: cursor_path.into(),
            stop_condition,
        }
    }

    /// `paging.next.after` of the v3 APIs
    pub fn hubspot_v3() -> Self {
        Self::new("after", "paging.next.after", StopCondition::CursorMissing)
    }

    /// `offset` plus `hasMore` of the legacy APIs
    pub fn offset_has_more() -> Self {
        Self::new("offset", "offset", StopCondition::field("hasMore", false))
    }
}

impl Paginator for CursorPaginator {
    fn initial_params(&self, state: &PaginationState) -> HashMap<String, String> {
        state
            .cursor
            .iter()
            .map(|cursor| (self.cursor_param.clone(), cursor.clone()))
            .collect()
    }

    fn process_response(
        &self,
        body: &Value,
        records_count: usize,
        state: &mut PaginationState,
    ) -> NextPage {
        state.total_fetched += records_count as u64;

        if self.stop_condition.is_met(body, records_count) {
            return NextPage::Done;
        }

        let Some(cursor) = token_at(body, &self.cursor_path).filter(|c| !c.is_empty()) else {
            return NextPage::Done;
        };

        if state.cursor.as_deref() == Some(cursor.as_str()) {
            warn!(cursor = %cursor, page = state.page, "Next-page token repeated, stopping");
            return NextPage::Done;
        }

        state.advance(cursor.clone());
        NextPage::with_param(&self.cursor_param, cursor)
    }
}
