//! Record adapter
//!
//! Maps model-level create, read, update, delete and count onto store calls.
//!
//! # Operation flow
//!
//! Reads: wait for consistency (automatic policy), compile the query into a
//! select statement, page through the results, then de-duplicate, apply the
//! residual conditions and sort locally.
//!
//! Mutations: write each item, then record the mutation with the
//! consistency synchronizer. Mutations are not atomic across items; a store
//! failure part way leaves earlier items written.
//!
//! Update and delete only accept equality conjunctions. Anything else is
//! rejected before the first store call.

use std::collections::HashSet;

use serde_json::{Map, Value};

use super::config::AdapterConfig;
use super::errors::{AdapterError, AdapterResult, ConfigError};
use super::query::{Aggregate, Query};
use super::sorter::RecordSorter;
use crate::condition::ConditionMatcher;
use crate::consistency::{ConsistencyPolicy, ConsistencySynchronizer};
use crate::observability::{AdapterMetrics, Logger, MetricsSnapshot, TransactionScope};
use crate::record::{encode, encode_named, item_name, type_filter, DecodedRecord, Model};
use crate::selection::{CompiledSelection, SelectionEngine};
use crate::store::{traced, NullStore, StoreClient};

/// Adapter over one store domain
pub struct SdbAdapter {
    client: Box<dyn StoreClient>,
    config: AdapterConfig,
    domain: String,
    synchronizer: ConsistencySynchronizer,
    metrics: AdapterMetrics,
}

impl SdbAdapter {
    /// Create an adapter over `client`.
    ///
    /// Validates the configuration and, with `create_domain`, creates the
    /// domain if the store does not list it.
    pub fn new(config: AdapterConfig, client: Box<dyn StoreClient>) -> AdapterResult<Self> {
        config.validate()?;
        if let Some(level) = config.log_level {
            Logger::set_min_severity(level);
        }

        let domain = config.domain_name().ok_or_else(|| ConfigError::Invalid {
            field: "domain",
            message: "either domain or path must be set".to_string(),
        })?;

        // Nothing is ever visible in null mode, so a token could never be
        // observed.
        let policy = if config.null_mode {
            ConsistencyPolicy::Disabled
        } else {
            config.wait_for_consistency
        };
        let synchronizer =
            ConsistencySynchronizer::new(policy, config.consistency.clone(), domain.clone());

        let adapter = Self {
            client,
            config,
            domain,
            synchronizer,
            metrics: AdapterMetrics::new(),
        };

        if adapter.config.create_domain {
            adapter.ensure_domain()?;
        }

        Logger::info(
            "ADAPTER_READY",
            &[
                ("consistency", policy.as_str()),
                ("domain", adapter.domain.as_str()),
                ("endpoint", adapter.config.endpoint().as_str()),
                ("null_mode", if adapter.config.null_mode { "true" } else { "false" }),
            ],
        );
        Ok(adapter)
    }

    /// Create an adapter from configuration alone.
    ///
    /// Only null mode can be built this way; a live store needs a client
    /// passed to [`new`](Self::new).
    pub fn from_config(config: AdapterConfig) -> AdapterResult<Self> {
        if !config.null_mode {
            return Err(ConfigError::Invalid {
                field: "null_mode",
                message: "a store client is required unless null_mode is set".to_string(),
            }
            .into());
        }
        Self::new(config, Box::new(NullStore::new()))
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn consistency_policy(&self) -> ConsistencyPolicy {
        self.synchronizer.policy()
    }

    pub fn set_consistency_policy(&mut self, policy: ConsistencyPolicy) {
        self.synchronizer.set_policy(policy);
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Writes new records, returning how many were written.
    ///
    /// Records of a model with a serial key and no key value are assigned a
    /// fresh time-ordered identifier, written back into the record.
    pub fn create(
        &mut self,
        model: &Model,
        resources: &mut [Map<String, Value>],
    ) -> AdapterResult<usize> {
        scoped("CREATE", || {
            let mut written = 0;
            let outcome = resources.iter_mut().try_for_each(|resource| -> AdapterResult<()> {
                self.create_one(model, resource)?;
                written += 1;
                Ok(())
            });
            self.settle_mutation("CREATE", written, outcome)
        })
    }

    /// Returns the records matching `query`.
    ///
    /// The limit is pushed to the store; residual conditions are applied
    /// afterwards and are not re-limited.
    pub fn read(&self, query: &Query) -> AdapterResult<Vec<DecodedRecord>> {
        let scope = TransactionScope::open("READ");
        let result = self.before_read("READ").and_then(|_| {
            let fields = query.returned_fields();
            let records = self.select_matching("READ", query)?;
            Ok(records
                .into_iter()
                .map(|record| record.project(&fields))
                .collect::<Vec<_>>())
        });
        match &result {
            Ok(records) => scope.complete(&[("records", records.len().to_string().as_str())]),
            Err(e) => scope.fail(&e.to_string()),
        }
        result
    }

    /// Sets `attributes` on every record matching `query`, returning how
    /// many were updated. A `null` attribute deletes the stored attribute.
    pub fn update(
        &mut self,
        attributes: &Map<String, Value>,
        query: &Query,
    ) -> AdapterResult<usize> {
        scoped("UPDATE", || {
            require_equality("update", query)?;
            self.before_read("UPDATE")?;
            let records = self.select_matching("UPDATE", query)?;

            let mut written = 0;
            let outcome = records.iter().try_for_each(|record| -> AdapterResult<()> {
                self.update_one(query.model(), &record.item_name, attributes)?;
                written += 1;
                Ok(())
            });
            self.settle_mutation("UPDATE", written, outcome)
        })
    }

    /// Deletes every record matching `query`, returning how many were
    /// deleted.
    pub fn delete(&mut self, query: &Query) -> AdapterResult<usize> {
        scoped("DELETE", || {
            require_equality("delete", query)?;
            self.before_read("DELETE")?;
            let records = self.select_matching("DELETE", query)?;

            let mut deleted = 0;
            let outcome = records.iter().try_for_each(|record| -> AdapterResult<()> {
                traced("DELETE_ATTRIBUTES", &record.item_name, || {
                    self.client.delete_attributes(&self.domain, &record.item_name, None)
                })
                .map_err(|e| AdapterError::store("DELETE", record.item_name.clone(), e))?;
                self.metrics.increment_items_deleted();
                deleted += 1;
                Ok(())
            });
            self.settle_mutation("DELETE", deleted, outcome)
        })
    }

    /// Answers an aggregate over the records matching `query`.
    ///
    /// Only counting is supported. The count is computed by the store unless
    /// the query needs local filtering or de-duplication, in which case the
    /// matching records are read and counted.
    pub fn aggregate(&self, query: &Query, function: &Aggregate) -> AdapterResult<Vec<u64>> {
        if *function != Aggregate::Count {
            return Err(AdapterError::UnsupportedQuery(format!(
                "aggregate function {} is not supported, only count",
                function.as_str()
            )));
        }

        scoped("AGGREGATE", || {
            self.before_read("AGGREGATE")?;
            let selection = self.compile_selection(query, &[])?;
            let count = if selection.residual.is_vacuous() && !query.is_unique() {
                SelectionEngine::new(self.client.as_ref(), self.config.batch_limit)
                    .with_metrics(&self.metrics)
                    .count(&selection)
                    .map_err(|e| AdapterError::from_selection("AGGREGATE", e))?
            } else {
                self.select_matching("AGGREGATE", query)?.len() as u64
            };
            Ok(vec![count])
        })
    }

    /// Blocks until the last mutation's consistency token is visible,
    /// whatever the policy.
    pub fn wait_for_consistency(&self) -> AdapterResult<()> {
        self.synchronizer
            .wait(self.client.as_ref(), &self.metrics)
            .map(|_| ())
            .map_err(|e| AdapterError::from_consistency("WAIT_FOR_CONSISTENCY", e))
    }

    /// Lists the domains the store holds
    pub fn domains(&self) -> AdapterResult<Vec<String>> {
        traced("LIST_DOMAINS", "", || self.client.list_domains())
            .map_err(|e| AdapterError::store("LIST_DOMAINS", "", e))
    }

    fn ensure_domain(&self) -> AdapterResult<()> {
        let domains = self.domains()?;
        if domains.iter().any(|d| d == &self.domain) {
            return Ok(());
        }
        traced("CREATE_DOMAIN", &self.domain, || {
            self.client.create_domain(&self.domain)
        })
        .map_err(|e| AdapterError::store("CREATE_DOMAIN", self.domain.clone(), e))?;
        Logger::info("DOMAIN_CREATED", &[("domain", self.domain.as_str())]);
        Ok(())
    }

    fn create_one(&self, model: &Model, resource: &mut Map<String, Value>) -> AdapterResult<()> {
        if let Some(serial) = model.serial_field() {
            if resource.get(&serial.name).map_or(true, Value::is_null) {
                resource.insert(serial.name.clone(), Value::String(item_name::generate_serial()));
            }
        }

        let encoded = encode(model, resource).map_err(|e| AdapterError::record("CREATE", e))?;
        traced("PUT_ATTRIBUTES", &encoded.item_name, || {
            self.client
                .put_attributes(&self.domain, &encoded.item_name, &encoded.writable, true)
        })
        .map_err(|e| AdapterError::store("CREATE", encoded.item_name.clone(), e))?;
        self.metrics.increment_items_written();
        Ok(())
    }

    fn update_one(
        &self,
        model: &Model,
        item_name: &str,
        attributes: &Map<String, Value>,
    ) -> AdapterResult<()> {
        let encoded = encode_named(model, item_name, attributes)
            .map_err(|e| AdapterError::record("UPDATE", e))?;

        traced("PUT_ATTRIBUTES", item_name, || {
            self.client
                .put_attributes(&self.domain, item_name, &encoded.writable, true)
        })
        .map_err(|e| AdapterError::store("UPDATE", item_name, e))?;

        if !encoded.deletable.is_empty() {
            traced("DELETE_ATTRIBUTES", item_name, || {
                self.client
                    .delete_attributes(&self.domain, item_name, Some(&encoded.deletable))
            })
            .map_err(|e| AdapterError::store("UPDATE", item_name, e))?;
        }
        self.metrics.increment_items_written();
        Ok(())
    }

    /// Records a mutation that wrote `written` items.
    ///
    /// On a partial failure the token is still written for the items that
    /// made it, and the original error is returned.
    fn settle_mutation(
        &mut self,
        operation: &'static str,
        written: usize,
        outcome: AdapterResult<()>,
    ) -> AdapterResult<usize> {
        match outcome {
            Ok(()) => {
                if written > 0 {
                    self.mark_modified(operation)?;
                }
                Ok(written)
            }
            Err(e) => {
                if written > 0 {
                    if let Err(token_error) = self.mark_modified(operation) {
                        Logger::warn(
                            "CONSISTENCY_TOKEN_SKIPPED",
                            &[
                                ("operation", operation),
                                ("reason", token_error.to_string().as_str()),
                            ],
                        );
                    }
                }
                Err(e)
            }
        }
    }

    fn mark_modified(&mut self, operation: &'static str) -> AdapterResult<()> {
        self.synchronizer
            .record_mutation(self.client.as_ref())
            .map_err(|e| AdapterError::from_consistency(operation, e))
    }

    fn before_read(&self, operation: &'static str) -> AdapterResult<()> {
        self.synchronizer
            .before_read(self.client.as_ref(), &self.metrics)
            .map_err(|e| AdapterError::from_consistency(operation, e))
    }

    fn compile_selection(
        &self,
        query: &Query,
        projection: &[String],
    ) -> AdapterResult<CompiledSelection> {
        let conditions = type_filter(query.model()).and_with(query.conditions().clone());
        Ok(CompiledSelection::compile(
            &self.domain,
            conditions,
            projection,
            query.order().first(),
            query.limit_value(),
            query.offset_value(),
        )?)
    }

    /// Selects, de-duplicates, post-filters and sorts the records matching
    /// `query`, with every field the query mentions still present.
    fn select_matching(
        &self,
        operation: &'static str,
        query: &Query,
    ) -> AdapterResult<Vec<DecodedRecord>> {
        let selection = self.compile_selection(query, &query.required_attributes())?;
        let engine = SelectionEngine::new(self.client.as_ref(), self.config.batch_limit)
            .with_metrics(&self.metrics);

        let mut records = engine
            .select(query.model(), &selection)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AdapterError::from_selection(operation, e))?;

        if query.is_unique() {
            dedup_records(&mut records, &query.returned_fields());
        }

        if !selection.residual.is_vacuous() {
            let before = records.len();
            records.retain(|record| ConditionMatcher::matches(&record.attributes, &selection.residual));
            self.metrics
                .add_records_filtered((before - records.len()) as u64);
        }

        RecordSorter::sort(&mut records, query.order());
        Ok(records)
    }
}

/// Runs one adapter operation inside a transaction scope
fn scoped<T>(name: &'static str, operation: impl FnOnce() -> AdapterResult<T>) -> AdapterResult<T> {
    let scope = TransactionScope::open(name);
    let result = operation();
    scope.finish(&result);
    result
}

fn require_equality(operation: &str, query: &Query) -> AdapterResult<()> {
    if query.conditions().is_equality_only() {
        return Ok(());
    }
    Err(AdapterError::UnsupportedQuery(format!(
        "{} accepts only equality conditions, got {}",
        operation,
        query.conditions()
    )))
}

/// Keeps the first record for each distinct combination of `fields`
fn dedup_records(records: &mut Vec<DecodedRecord>, fields: &[String]) {
    let mut seen = HashSet::new();
    records.retain(|record| {
        let key: Vec<String> = fields.iter().map(|f| record.get(f).to_string()).collect();
        seen.insert(key)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use crate::record::FieldKind;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn posts() -> Model {
        Model::new("posts")
            .serial("id")
            .field("title", FieldKind::String)
            .field("score", FieldKind::Integer)
    }

    fn adapter() -> (SdbAdapter, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new().with_domain("posts"));
        let adapter =
            SdbAdapter::new(AdapterConfig::for_domain("posts"), Box::new(store.clone())).unwrap();
        (adapter, store)
    }

    fn row(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_create_assigns_serial() {
        let (mut adapter, store) = adapter();
        let mut rows = vec![row(json!({"title": "a"}))];
        assert_eq!(adapter.create(&posts(), &mut rows).unwrap(), 1);

        let id = rows[0]["id"].as_str().unwrap().to_string();
        assert!(store.peek_item("posts", &id).is_some());
        assert_eq!(adapter.metrics().items_written, 1);
    }

    #[test]
    fn test_update_rejects_non_equality_before_writing() {
        let (mut adapter, store) = adapter();
        let query = Query::new(posts()).filter(Condition::gt("score", 1));
        let err = adapter.update(&row(json!({"title": "b"})), &query).unwrap_err();
        assert!(matches!(err, AdapterError::UnsupportedQuery(_)));
        assert_eq!(store.calls().selects, 0);
        assert_eq!(store.calls().puts, 0);
    }

    #[test]
    fn test_dedup_keeps_first() {
        let mut records = vec![
            DecodedRecord {
                item_name: "1".into(),
                attributes: row(json!({"title": "a"})),
                metadata: None,
            },
            DecodedRecord {
                item_name: "2".into(),
                attributes: row(json!({"title": "a"})),
                metadata: None,
            },
        ];
        dedup_records(&mut records, &["title".to_string()]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].item_name, "1");
    }

    #[test]
    fn test_from_config_requires_null_mode() {
        let err = SdbAdapter::from_config(AdapterConfig::for_domain("posts")).err().unwrap();
        assert!(matches!(err, AdapterError::Configuration(_)));

        let config = AdapterConfig {
            null_mode: true,
            wait_for_consistency: ConsistencyPolicy::Automatic,
            ..AdapterConfig::for_domain("posts")
        };
        let adapter = SdbAdapter::from_config(config).unwrap();
        assert_eq!(adapter.consistency_policy(), ConsistencyPolicy::Disabled);
    }

    #[test]
    fn test_create_domain_when_missing() {
        let store = Arc::new(MemoryStore::new());
        let config = AdapterConfig {
            create_domain: true,
            ..AdapterConfig::for_domain("posts")
        };
        let adapter = SdbAdapter::new(config, Box::new(store.clone())).unwrap();
        assert_eq!(adapter.domains().unwrap(), vec!["posts".to_string()]);

        // Already present: listed but not created again.
        let before = store.calls().domain_calls;
        let config = AdapterConfig {
            create_domain: true,
            ..AdapterConfig::for_domain("posts")
        };
        SdbAdapter::new(config, Box::new(store.clone())).unwrap();
        assert_eq!(store.calls().domain_calls, before + 1);
    }
}
