// Pagination Controller - bounded, order-preserving result pages

use crate::error::{QueryError, QueryResult};
use serde::Serialize;
use std::ops::ControlFlow;

/// Default page size for record retrieval
pub const DEFAULT_RECORD_LIMIT: u32 = 100;

/// Default number of months in a per-hospital trend
pub const DEFAULT_TREND_LIMIT: u32 = 36;

/// Hard upper bound for any requested limit
pub const DEFAULT_MAX_LIMIT: u32 = 1_000;

/// Limit policy handed to the engine at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuerySettings {
    pub record_limit: u32,
    pub trend_limit: u32,
    pub max_limit: u32,
}

impl Default for QuerySettings {
    fn default() -> Self {
        QuerySettings {
            record_limit: DEFAULT_RECORD_LIMIT,
            trend_limit: DEFAULT_TREND_LIMIT,
            max_limit: DEFAULT_MAX_LIMIT,
        }
    }
}

impl QuerySettings {
    /// Effective limit: `default` when unset, clamped to `max_limit`.
    /// A zero limit is rejected rather than silently widened.
    pub fn resolve(&self, requested: Option<u32>, default: u32) -> QueryResult<usize> {
        let limit = match requested {
            Some(0) => return Err(QueryError::invalid("limit must be a positive integer")),
            Some(n) => n,
            None => default,
        };

        Ok(limit.min(self.max_limit).max(1) as usize)
    }
}

/// Parse a raw `limit` query value. Blank means unset.
pub fn parse_limit(raw: Option<&str>) -> QueryResult<Option<u32>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<u32>()
            .map(Some)
            .map_err(|_| QueryError::invalid(format!("limit must be a positive integer, got '{}'", value))),
    }
}

// ============================================================================
// PAGE
// ============================================================================

/// Emitted items, never more than the limit. `count()` is always `data.len()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    data: Vec<T>,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Page { data: Vec::new() }
    }

    pub fn count(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn into_data(self) -> Vec<T> {
        self.data
    }
}

/// Take at most `limit` items from `items`, keeping their order.
pub fn paginate<T>(items: impl IntoIterator<Item = T>, limit: usize) -> Page<T> {
    Page {
        data: items.into_iter().take(limit).collect(),
    }
}

/// Streaming paginator, used as a store-scan visitor.
pub struct Paginator<T> {
    limit: usize,
    data: Vec<T>,
}

impl<T> Paginator<T> {
    pub fn new(limit: usize) -> Self {
        Paginator {
            limit,
            data: Vec::with_capacity(limit.min(DEFAULT_MAX_LIMIT as usize)),
        }
    }

    /// Accept one item; `Break` once the page is full.
    pub fn push(&mut self, item: T) -> ControlFlow<()> {
        if self.data.len() < self.limit {
            self.data.push(item);
        }

        if self.data.len() >= self.limit {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    pub fn finish(self) -> Page<T> {
        Page { data: self.data }
    }
}
