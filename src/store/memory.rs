//! In-process store emulator
//!
//! Interprets the select dialect over in-memory domains and reproduces the
//! behaviours the adapter has to cope with:
//! - a per-call batch ceiling with continuation tokens
//! - eventual consistency: writes become visible only after a configurable
//!   number of subsequent read calls, in the order they were issued
//! - attribute values are sets of strings

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use base64::Engine;

use super::client::{Item, SelectPage, StoreClient};
use super::dialect::{self, AttrRef, Projection, Statement};
use super::errors::{StoreError, StoreResult};
use crate::record::AttributeMap;

/// Page size used when a statement has no LIMIT
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Largest LIMIT a single call accepts
pub const DEFAULT_BATCH_CEILING: usize = 2500;

type Domain = BTreeMap<String, AttributeMap>;

#[derive(Debug, Clone)]
enum Write {
    Put {
        domain: String,
        item_name: String,
        attributes: AttributeMap,
        replace: bool,
    },
    Delete {
        domain: String,
        item_name: String,
        names: Option<Vec<String>>,
    },
}

#[derive(Debug)]
struct PendingWrite {
    /// Applied once this many reads have been served
    visible_at: u64,
    write: Write,
}

#[derive(Debug, Default)]
struct State {
    domains: BTreeMap<String, Domain>,
    pending: VecDeque<PendingWrite>,
    reads: u64,
    injected_failure: Option<StoreError>,
    select_log: Vec<String>,
}

/// Snapshot of call counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCalls {
    pub selects: u64,
    pub gets: u64,
    pub puts: u64,
    pub deletes: u64,
    pub domain_calls: u64,
}

#[derive(Debug, Default)]
struct CallCounters {
    selects: AtomicU64,
    gets: AtomicU64,
    puts: AtomicU64,
    deletes: AtomicU64,
    domain_calls: AtomicU64,
}

/// In-memory [`StoreClient`]
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
    batch_ceiling: usize,
    visibility_lag: u64,
    calls: CallCounters,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store with immediate visibility
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            batch_ceiling: DEFAULT_BATCH_CEILING,
            visibility_lag: 0,
            calls: CallCounters::default(),
        }
    }

    /// Sets the largest LIMIT a single select accepts
    pub fn with_batch_ceiling(mut self, ceiling: usize) -> Self {
        self.batch_ceiling = ceiling.max(1);
        self
    }

    /// Delays write visibility by `reads` read calls
    pub fn with_visibility_lag(mut self, reads: u64) -> Self {
        self.visibility_lag = reads;
        self
    }

    /// Creates a domain up front
    pub fn with_domain(self, domain: &str) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.domains.entry(domain.to_string()).or_default();
        }
        self
    }

    pub fn batch_ceiling(&self) -> usize {
        self.batch_ceiling
    }

    /// Makes every pending write visible
    pub fn flush(&self) -> StoreResult<()> {
        let mut state = self.lock()?;
        while let Some(pending) = state.pending.pop_front() {
            apply(&mut state.domains, pending.write);
        }
        Ok(())
    }

    /// Fails the next call with `error`
    pub fn inject_failure(&self, error: StoreError) -> StoreResult<()> {
        self.lock()?.injected_failure = Some(error);
        Ok(())
    }

    /// Returns the call counts so far
    pub fn calls(&self) -> StoreCalls {
        StoreCalls {
            selects: self.calls.selects.load(Ordering::Relaxed),
            gets: self.calls.gets.load(Ordering::Relaxed),
            puts: self.calls.puts.load(Ordering::Relaxed),
            deletes: self.calls.deletes.load(Ordering::Relaxed),
            domain_calls: self.calls.domain_calls.load(Ordering::Relaxed),
        }
    }

    /// Returns every select expression received, in order
    pub fn select_log(&self) -> Vec<String> {
        self.lock().map(|s| s.select_log.clone()).unwrap_or_default()
    }

    /// Returns the number of writes not yet visible
    pub fn pending_writes(&self) -> usize {
        self.lock().map(|s| s.pending.len()).unwrap_or_default()
    }

    /// Reads an item directly, bypassing visibility and call accounting
    pub fn peek_item(&self, domain: &str, item_name: &str) -> Option<AttributeMap> {
        let state = self.lock().ok()?;
        state.domains.get(domain)?.get(item_name).cloned()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Internal("store lock poisoned".into()))
    }

    /// Locks the state for a call, surfacing any injected failure
    fn begin(&self, counter: &AtomicU64) -> StoreResult<MutexGuard<'_, State>> {
        counter.fetch_add(1, Ordering::Relaxed);
        let mut state = self.lock()?;
        if let Some(error) = state.injected_failure.take() {
            return Err(error);
        }
        Ok(state)
    }

    /// Counts a read and applies the writes that became visible
    fn advance_reads(state: &mut State) {
        state.reads += 1;
        while state
            .pending
            .front()
            .map_or(false, |p| p.visible_at < state.reads)
        {
            if let Some(pending) = state.pending.pop_front() {
                apply(&mut state.domains, pending.write);
            }
        }
    }

    fn enqueue(&self, state: &mut State, write: Write) {
        let visible_at = state.reads + self.visibility_lag;
        if self.visibility_lag == 0 && state.pending.is_empty() {
            apply(&mut state.domains, write);
        } else {
            state.pending.push_back(PendingWrite { visible_at, write });
        }
    }

    fn page_size(&self, statement: &Statement) -> StoreResult<usize> {
        match statement.limit {
            Some(0) => Err(StoreError::InvalidExpression("LIMIT must be positive".into())),
            Some(limit) if limit > self.batch_ceiling => Err(StoreError::InvalidExpression(
                format!("LIMIT {} exceeds ceiling {}", limit, self.batch_ceiling),
            )),
            Some(limit) => Ok(limit),
            None if statement.projection == Projection::Count => Ok(self.batch_ceiling),
            None => Ok(DEFAULT_PAGE_SIZE.min(self.batch_ceiling)),
        }
    }
}

fn apply(domains: &mut BTreeMap<String, Domain>, write: Write) {
    match write {
        Write::Put {
            domain,
            item_name,
            attributes,
            replace,
        } => {
            let item = domains
                .entry(domain)
                .or_default()
                .entry(item_name)
                .or_default();
            for (name, values) in attributes {
                let slot = item.entry(name).or_default();
                if replace {
                    slot.clear();
                }
                slot.extend(values);
                slot.sort();
                slot.dedup();
            }
        }
        Write::Delete {
            domain,
            item_name,
            names,
        } => {
            let Some(items) = domains.get_mut(&domain) else {
                return;
            };
            match names {
                None => {
                    items.remove(&item_name);
                }
                Some(names) => {
                    if let Some(item) = items.get_mut(&item_name) {
                        for name in names {
                            item.remove(&name);
                        }
                        if item.is_empty() {
                            items.remove(&item_name);
                        }
                    }
                }
            }
        }
    }
}

fn encode_token(offset: usize) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(format!("offset:{}", offset))
}

fn decode_token(token: &str) -> StoreResult<usize> {
    let invalid = || StoreError::InvalidNextToken(token.to_string());
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|_| invalid())?;
    let text = String::from_utf8(bytes).map_err(|_| invalid())?;
    text.strip_prefix("offset:")
        .and_then(|n| n.parse().ok())
        .ok_or_else(invalid)
}

fn sort_key<'a>(attr: &AttrRef, name: &'a str, attributes: &'a AttributeMap) -> Option<&'a str> {
    dialect::values_of(attr, name, attributes).into_iter().min()
}

fn project(statement: &Statement, name: &str, attributes: &AttributeMap) -> Item {
    let projected = match &statement.projection {
        Projection::All => attributes.clone(),
        Projection::ItemName | Projection::Count => AttributeMap::new(),
        Projection::Attributes(attrs) => attrs
            .iter()
            .filter_map(|attr| match attr {
                AttrRef::Name(n) => attributes.get(n).map(|v| (n.clone(), v.clone())),
                AttrRef::ItemName => None,
            })
            .collect(),
    };
    Item::new(name, projected)
}

impl StoreClient for MemoryStore {
    fn select(&self, expression: &str, next_token: Option<&str>) -> StoreResult<SelectPage> {
        let mut state = self.begin(&self.calls.selects)?;
        state.select_log.push(expression.to_string());

        let statement = dialect::parse(expression)?;
        let page_size = self.page_size(&statement)?;
        let start = next_token.map(decode_token).transpose()?.unwrap_or(0);

        Self::advance_reads(&mut state);
        let domain = state
            .domains
            .get(&statement.domain)
            .ok_or_else(|| StoreError::NoSuchDomain(statement.domain.clone()))?;

        let mut matched: Vec<(&String, &AttributeMap)> = domain
            .iter()
            .filter(|(name, attrs)| {
                statement
                    .filter
                    .as_ref()
                    .map_or(true, |filter| filter.matches(name, attrs))
            })
            .collect();

        if let Some((attr, descending)) = &statement.order {
            matched.sort_by(|(a_name, a), (b_name, b)| {
                let ordering = sort_key(attr, a_name, a).cmp(&sort_key(attr, b_name, b));
                let ordering = if *descending { ordering.reverse() } else { ordering };
                ordering.then_with(|| a_name.cmp(b_name))
            });
        }

        let end = (start + page_size).min(matched.len());
        let next_token = (end < matched.len()).then(|| encode_token(end));
        let window = matched.get(start..end).unwrap_or(&[]);

        let items = if statement.projection == Projection::Count {
            let mut attributes = AttributeMap::new();
            attributes.insert("Count".to_string(), vec![window.len().to_string()]);
            vec![Item::new("Domain", attributes)]
        } else {
            window
                .iter()
                .map(|(name, attrs)| project(&statement, name, attrs))
                .collect()
        };

        Ok(SelectPage { items, next_token })
    }

    fn get_attributes(
        &self,
        domain: &str,
        item_name: &str,
        names: &[String],
    ) -> StoreResult<AttributeMap> {
        let mut state = self.begin(&self.calls.gets)?;
        Self::advance_reads(&mut state);

        let items = state
            .domains
            .get(domain)
            .ok_or_else(|| StoreError::NoSuchDomain(domain.to_string()))?;
        let Some(item) = items.get(item_name) else {
            return Ok(AttributeMap::new());
        };
        if names.is_empty() {
            return Ok(item.clone());
        }
        Ok(item
            .iter()
            .filter(|(name, _)| names.contains(name))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn put_attributes(
        &self,
        domain: &str,
        item_name: &str,
        attributes: &AttributeMap,
        replace: bool,
    ) -> StoreResult<()> {
        let mut state = self.begin(&self.calls.puts)?;
        if !state.domains.contains_key(domain) {
            return Err(StoreError::NoSuchDomain(domain.to_string()));
        }
        self.enqueue(
            &mut state,
            Write::Put {
                domain: domain.to_string(),
                item_name: item_name.to_string(),
                attributes: attributes.clone(),
                replace,
            },
        );
        Ok(())
    }

    fn delete_attributes(
        &self,
        domain: &str,
        item_name: &str,
        names: Option<&[String]>,
    ) -> StoreResult<()> {
        let mut state = self.begin(&self.calls.deletes)?;
        if !state.domains.contains_key(domain) {
            return Err(StoreError::NoSuchDomain(domain.to_string()));
        }
        self.enqueue(
            &mut state,
            Write::Delete {
                domain: domain.to_string(),
                item_name: item_name.to_string(),
                names: names.map(<[String]>::to_vec),
            },
        );
        Ok(())
    }

    fn create_domain(&self, domain: &str) -> StoreResult<()> {
        let mut state = self.begin(&self.calls.domain_calls)?;
        state.domains.entry(domain.to_string()).or_default();
        Ok(())
    }

    fn delete_domain(&self, domain: &str) -> StoreResult<()> {
        let mut state = self.begin(&self.calls.domain_calls)?;
        state.domains.remove(domain);
        state.pending.retain(|p| match &p.write {
            Write::Put { domain: d, .. } | Write::Delete { domain: d, .. } => d != domain,
        });
        Ok(())
    }

    fn list_domains(&self) -> StoreResult<Vec<String>> {
        let state = self.begin(&self.calls.domain_calls)?;
        Ok(state.domains.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> AttributeMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), vec![v.to_string()]))
            .collect()
    }

    fn seeded(count: usize) -> MemoryStore {
        let store = MemoryStore::new().with_domain("d");
        for i in 0..count {
            store
                .put_attributes("d", &format!("item-{:03}", i), &attrs(&[("n", &format!("{:03}", i))]), true)
                .unwrap();
        }
        store
    }

    #[test]
    fn test_put_replace_and_add() {
        let store = MemoryStore::new().with_domain("d");
        store.put_attributes("d", "a", &attrs(&[("tag", "x")]), false).unwrap();
        store.put_attributes("d", "a", &attrs(&[("tag", "y")]), false).unwrap();
        assert_eq!(store.peek_item("d", "a").unwrap()["tag"], vec!["x", "y"]);

        store.put_attributes("d", "a", &attrs(&[("tag", "z")]), true).unwrap();
        assert_eq!(store.peek_item("d", "a").unwrap()["tag"], vec!["z"]);
    }

    #[test]
    fn test_delete_attributes() {
        let store = MemoryStore::new().with_domain("d");
        store
            .put_attributes("d", "a", &attrs(&[("x", "1"), ("y", "2")]), true)
            .unwrap();
        store
            .delete_attributes("d", "a", Some(&["x".to_string()]))
            .unwrap();
        assert!(!store.peek_item("d", "a").unwrap().contains_key("x"));

        store.delete_attributes("d", "a", None).unwrap();
        assert!(store.peek_item("d", "a").is_none());
    }

    #[test]
    fn test_missing_domain() {
        let store = MemoryStore::new();
        let err = store.put_attributes("nope", "a", &AttributeMap::new(), true).unwrap_err();
        assert_eq!(err, StoreError::NoSuchDomain("nope".into()));
        assert!(store.select("SELECT * FROM nope", None).is_err());
    }

    #[test]
    fn test_paging_with_tokens() {
        let store = seeded(7).with_batch_ceiling(3);

        let first = store.select("SELECT * FROM d LIMIT 3", None).unwrap();
        assert_eq!(first.items.len(), 3);
        let token = first.next_token.unwrap();

        let second = store.select("SELECT * FROM d LIMIT 3", Some(&token)).unwrap();
        assert_eq!(second.items[0].name, "item-003");

        let third = store
            .select("SELECT * FROM d LIMIT 3", second.next_token.as_deref())
            .unwrap();
        assert_eq!(third.items.len(), 1);
        assert!(third.next_token.is_none());
    }

    #[test]
    fn test_limit_over_ceiling_rejected() {
        let store = seeded(1).with_batch_ceiling(3);
        let err = store.select("SELECT * FROM d LIMIT 4", None).unwrap_err();
        assert!(matches!(err, StoreError::InvalidExpression(_)));
    }

    #[test]
    fn test_bad_token() {
        let store = seeded(1);
        let err = store.select("SELECT * FROM d", Some("???")).unwrap_err();
        assert!(matches!(err, StoreError::InvalidNextToken(_)));
    }

    #[test]
    fn test_order_and_projection() {
        let store = seeded(5);
        let page = store
            .select("SELECT n FROM d WHERE n IS NOT NULL ORDER BY n DESC LIMIT 2", None)
            .unwrap();
        let names: Vec<&str> = page.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["item-004", "item-003"]);
        assert_eq!(page.items[0].attributes.len(), 1);
    }

    #[test]
    fn test_count_pages() {
        let store = seeded(5).with_batch_ceiling(2);
        let page = store.select("SELECT count(*) FROM d", None).unwrap();
        assert_eq!(page.items[0].name, "Domain");
        assert_eq!(page.items[0].attributes["Count"], vec!["2"]);
        assert!(page.next_token.is_some());
    }

    #[test]
    fn test_visibility_lag() {
        let store = MemoryStore::new().with_domain("d").with_visibility_lag(2);
        store.put_attributes("d", "a", &attrs(&[("x", "1")]), true).unwrap();
        assert_eq!(store.pending_writes(), 1);

        assert!(store.get_attributes("d", "a", &[]).unwrap().is_empty());
        assert!(store.get_attributes("d", "a", &[]).unwrap().is_empty());
        assert_eq!(store.get_attributes("d", "a", &[]).unwrap()["x"], vec!["1"]);
    }

    #[test]
    fn test_writes_become_visible_in_order() {
        let store = MemoryStore::new().with_domain("d").with_visibility_lag(1);
        store.put_attributes("d", "a", &attrs(&[("x", "1")]), true).unwrap();
        store.get_attributes("d", "zz", &[]).unwrap();
        store.put_attributes("d", "a", &attrs(&[("x", "2")]), true).unwrap();

        // First write lands on this read; the second one is still pending.
        assert_eq!(store.get_attributes("d", "a", &[]).unwrap()["x"], vec!["1"]);
        assert_eq!(store.get_attributes("d", "a", &[]).unwrap()["x"], vec!["2"]);
    }

    #[test]
    fn test_injected_failure_is_one_shot() {
        let store = seeded(1);
        store
            .inject_failure(StoreError::Unavailable("throttled".into()))
            .unwrap();
        assert!(store.select("SELECT * FROM d", None).is_err());
        assert!(store.select("SELECT * FROM d", None).is_ok());
        assert_eq!(store.calls().selects, 2);
    }
}
