//! Null-mode store
//!
//! Accepts every call, logs it at TRACE and returns empty results.

use super::client::{SelectPage, StoreClient};
use super::errors::StoreResult;
use crate::observability::Logger;
use crate::record::AttributeMap;

/// Store client that stores nothing
#[derive(Debug, Default)]
pub struct NullStore;

impl NullStore {
    pub fn new() -> Self {
        Self
    }

    fn log(call: &str, argument: &str) {
        Logger::trace("STORE_NULL_CALL", &[("call", call), ("argument", argument)]);
    }
}

impl StoreClient for NullStore {
    fn select(&self, expression: &str, _next_token: Option<&str>) -> StoreResult<SelectPage> {
        Self::log("select", expression);
        Ok(SelectPage::default())
    }

    fn get_attributes(
        &self,
        _domain: &str,
        item_name: &str,
        _names: &[String],
    ) -> StoreResult<AttributeMap> {
        Self::log("get_attributes", item_name);
        Ok(AttributeMap::new())
    }

    fn put_attributes(
        &self,
        _domain: &str,
        item_name: &str,
        _attributes: &AttributeMap,
        _replace: bool,
    ) -> StoreResult<()> {
        Self::log("put_attributes", item_name);
        Ok(())
    }

    fn delete_attributes(
        &self,
        _domain: &str,
        item_name: &str,
        _names: Option<&[String]>,
    ) -> StoreResult<()> {
        Self::log("delete_attributes", item_name);
        Ok(())
    }

    fn create_domain(&self, domain: &str) -> StoreResult<()> {
        Self::log("create_domain", domain);
        Ok(())
    }

    fn delete_domain(&self, domain: &str) -> StoreResult<()> {
        Self::log("delete_domain", domain);
        Ok(())
    }

    fn list_domains(&self) -> StoreResult<Vec<String>> {
        Self::log("list_domains", "");
        Ok(Vec::new())
    }
}
