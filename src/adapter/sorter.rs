//! Local sorting of read results
//!
//! The store orders by at most one attribute, and only as text. Results are
//! re-sorted here on every requested key.

use std::cmp::Ordering;

use serde_json::Value;

use crate::condition::compare_values;
use crate::record::DecodedRecord;
use crate::selection::{SortDirection, SortSpec};

/// Sorts decoded records
pub struct RecordSorter;

impl RecordSorter {
    /// Sorts records by each key in turn.
    ///
    /// Sort is stable, so records equal on every key keep store order.
    pub fn sort(records: &mut [DecodedRecord], order: &[SortSpec]) {
        if order.is_empty() {
            return;
        }
        records.sort_by(|a, b| {
            for spec in order {
                let ordering = Self::compare(a.get(&spec.field), b.get(&spec.field));
                let ordering = match spec.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }

    /// Null sorts first; other values compare numerically when both read as
    /// numbers and as text otherwise.
    fn compare(a: &Value, b: &Value) -> Ordering {
        match (a.is_null(), b.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => compare_values(a, b),
        }
    }
}
