//! Pagination module
//!
//! Each stream owns a paginator that pulls the next-page token out of a
//! response. Streams decide where the token goes: query string for GET
//! endpoints, request body for CRM search.

mod strategies;
mod types;

pub use strategies::CursorPaginator;
pub use types::{token_at, value_at, NextPage, PaginationState, Paginator, StopCondition};
