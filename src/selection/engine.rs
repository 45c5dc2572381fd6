//! Paginated selection
//!
//! Pages through a compiled selection and yields decoded records lazily, in
//! store order.
//!
//! Each call asks for `min(batch ceiling, remaining)` items, so a limit of
//! `3 * ceiling + 5` takes exactly four calls. An offset is realised by
//! fetching `limit + offset` raw items and skipping the first `offset` before
//! decoding.

use std::collections::VecDeque;

use thiserror::Error;

use super::statement::CompiledSelection;
use crate::observability::AdapterMetrics;
use crate::record::{self, DecodedRecord, Model, RecordError};
use crate::store::{traced, Item, StoreClient, StoreError};

/// Attribute holding the per-page count in count results
const COUNT_ATTR: &str = "Count";

/// Errors raised while paging
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectionError {
    #[error("store call failed for `{statement}`: {source}")]
    Store {
        statement: String,
        #[source]
        source: StoreError,
    },

    #[error("item {item_name} could not be decoded: {source}")]
    Decode {
        item_name: String,
        #[source]
        source: RecordError,
    },

    #[error("count result is malformed: {0}")]
    MalformedCount(String),
}

/// Runs compiled selections against a store client
pub struct SelectionEngine<'a> {
    client: &'a dyn StoreClient,
    batch_limit: usize,
    metrics: Option<&'a AdapterMetrics>,
}

impl<'a> SelectionEngine<'a> {
    pub fn new(client: &'a dyn StoreClient, batch_limit: usize) -> Self {
        Self {
            client,
            batch_limit: batch_limit.max(1),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: &'a AdapterMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Starts a lazy, non-restartable pass over the selection
    pub fn select<'s>(&'s self, model: &'s Model, selection: &'s CompiledSelection) -> Records<'s> {
        Records {
            client: self.client,
            metrics: self.metrics,
            model,
            selection,
            batch_limit: self.batch_limit,
            buffer: VecDeque::new(),
            next_token: None,
            remaining: selection.limit.map(|limit| limit.saturating_add(selection.offset)),
            to_skip: selection.offset,
            exhausted: false,
        }
    }

    /// Counts the matching items, summing `count(*)` pages.
    ///
    /// Offset and limit are applied to the total.
    pub fn count(&self, selection: &CompiledSelection) -> Result<u64, SelectionError> {
        let statement = selection.count_statement();
        let mut total: u64 = 0;
        let mut next_token: Option<String> = None;

        loop {
            let page = traced("SELECT", &statement, || {
                self.client.select(&statement, next_token.as_deref())
            })
            .map_err(|source| SelectionError::Store {
                statement: statement.clone(),
                source,
            })?;
            if let Some(metrics) = self.metrics {
                metrics.increment_selects();
            }

            for item in &page.items {
                total += page_count(item)?;
            }

            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        let total = total.saturating_sub(selection.offset as u64);
        Ok(match selection.limit {
            Some(limit) => total.min(limit as u64),
            None => total,
        })
    }
}

fn page_count(item: &Item) -> Result<u64, SelectionError> {
    let Some(values) = item.attributes.get(COUNT_ATTR) else {
        return Ok(0);
    };
    values
        .first()
        .map(|v| v.parse::<u64>())
        .transpose()
        .map(|n| n.unwrap_or(0))
        .map_err(|_| SelectionError::MalformedCount(format!("{:?}", values)))
}

/// Lazy record sequence produced by [`SelectionEngine::select`]
pub struct Records<'a> {
    client: &'a dyn StoreClient,
    metrics: Option<&'a AdapterMetrics>,
    model: &'a Model,
    selection: &'a CompiledSelection,
    batch_limit: usize,
    buffer: VecDeque<Item>,
    next_token: Option<String>,
    /// Raw items still to fetch, offset included; `None` when unbounded
    remaining: Option<usize>,
    to_skip: usize,
    exhausted: bool,
}

impl Records<'_> {
    fn fetch_page(&mut self) -> Result<(), SelectionError> {
        let page_limit = match self.remaining {
            Some(remaining) => remaining.min(self.batch_limit),
            None => self.batch_limit,
        };
        let statement = self.selection.statement(Some(page_limit));
        let client = self.client;
        let token = self.next_token.take();

        let page = traced("SELECT", &statement, || {
            client.select(&statement, token.as_deref())
        })
        .map_err(|source| SelectionError::Store {
            statement: statement.clone(),
            source,
        })?;
        if let Some(metrics) = self.metrics {
            metrics.increment_selects();
        }

        let mut items = page.items;
        if let Some(remaining) = self.remaining {
            items.truncate(remaining);
            self.remaining = Some(remaining - items.len());
        }
        self.buffer.extend(items);
        self.next_token = page.next_token;
        if self.next_token.is_none() || self.remaining == Some(0) {
            self.exhausted = true;
        }
        Ok(())
    }
}

impl Iterator for Records<'_> {
    type Item = Result<DecodedRecord, SelectionError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                if self.to_skip > 0 {
                    self.to_skip -= 1;
                    continue;
                }
                return Some(
                    record::decode(self.model, &item.name, &item.attributes).map_err(|source| {
                        SelectionError::Decode {
                            item_name: item.name.clone(),
                            source,
                        }
                    }),
                );
            }

            if self.exhausted {
                return None;
            }
            if let Err(e) = self.fetch_page() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
    }
}
