//! Pagination types and traits

use serde_json::Value;
use std::collections::HashMap;

/// What the paginator decided after a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// Fetch another page with these parameters
    Continue { params: HashMap<String, String> },
    /// Last page reached
    Done,
}

impl NextPage {
    pub fn with_param(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Continue {
            params: HashMap::from([(key.into(), value.into())]),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        match self {
            Self::Continue { params } => params.get(key).map(String::as_str),
            Self::Done => None,
        }
    }
}

/// When a response ends pagination, apart from a missing token
#[derive(Debug, Clone, Default, PartialEq)]
pub enum StopCondition {
    /// A page without records is the last one
    #[default]
    EmptyPage,
    /// A field holds this value, e.g. `hasMore: false`
    Field { path: String, value: Value },
    /// Only the token decides
    CursorMissing,
}

impl StopCondition {
    pub fn field(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Field {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Whether this response is the last page
    pub fn is_met(&self, body: &Value, records_count: usize) -> bool {
        match self {
            Self::EmptyPage => records_count == 0,
            Self::Field { path, value } => value_at(body, path) == Some(value),
            Self::CursorMissing => false,
        }
    }
}

/// Position within one context's pages
#[derive(Debug, Clone, Default)]
pub struct PaginationState {
    /// Zero-based page number
    pub page: u32,
    /// Token of the page being requested
    pub cursor: Option<String>,
    pub total_fetched: u64,
}

impl PaginationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move on to the page behind `cursor`
    pub fn advance(&mut self, cursor: String) {
        self.cursor = Some(cursor);
        self.page += 1;
    }
}

/// Reads the next-page token out of a response
pub trait Paginator: Send + Sync {
    /// Parameters that select the current page
    fn initial_params(&self, state: &PaginationState) -> HashMap<String, String>;

    /// Inspect a response and decide whether another page follows
    fn process_response(
        &self,
        body: &Value,
        records_count: usize,
        state: &mut PaginationState,
    ) -> NextPage;
}

/// Walk a dotted path (`paging.next.after`, optionally `$.`-prefixed)
pub fn value_at<'a>(body: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.strip_prefix("$.").unwrap_or(path);
    path.split('.')
        .try_fold(body, |current, part| current.as_object()?.get(part))
}

/// A scalar at a dotted path, as it would be sent back in a request
pub fn token_at(body: &Value, path: &str) -> Option<String> {
    match value_at(body, path)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
