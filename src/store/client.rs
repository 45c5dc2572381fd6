//! Store client seam
//!
//! The adapter talks to the attribute store only through [`StoreClient`].
//! Calls are blocking and take `&self`; implementations handle their own
//! interior synchronization.

use std::sync::Arc;

use super::errors::StoreResult;
use crate::record::AttributeMap;

/// One stored item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub name: String,
    pub attributes: AttributeMap,
}

impl Item {
    pub fn new(name: impl Into<String>, attributes: AttributeMap) -> Self {
        Self {
            name: name.into(),
            attributes,
        }
    }
}

/// One page of select results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectPage {
    pub items: Vec<Item>,
    /// Present when more results remain
    pub next_token: Option<String>,
}

/// Blocking client for a multi-valued attribute store
pub trait StoreClient: Send + Sync {
    /// Runs one page of a select expression
    fn select(&self, expression: &str, next_token: Option<&str>) -> StoreResult<SelectPage>;

    /// Reads attributes of one item; an empty `names` reads all of them.
    /// A missing item reads as an empty map.
    fn get_attributes(
        &self,
        domain: &str,
        item_name: &str,
        names: &[String],
    ) -> StoreResult<AttributeMap>;

    /// Writes attributes of one item.
    ///
    /// With `replace`, each named attribute's values are replaced; otherwise
    /// the values are added to the existing set.
    fn put_attributes(
        &self,
        domain: &str,
        item_name: &str,
        attributes: &AttributeMap,
        replace: bool,
    ) -> StoreResult<()>;

    /// Deletes the named attributes, or the whole item when `names` is `None`
    fn delete_attributes(
        &self,
        domain: &str,
        item_name: &str,
        names: Option<&[String]>,
    ) -> StoreResult<()>;

    fn create_domain(&self, domain: &str) -> StoreResult<()>;

    fn delete_domain(&self, domain: &str) -> StoreResult<()>;

    fn list_domains(&self) -> StoreResult<Vec<String>>;
}

impl<T: StoreClient + ?Sized> StoreClient for Arc<T> {
    fn select(&self, expression: &str, next_token: Option<&str>) -> StoreResult<SelectPage> {
        (**self).select(expression, next_token)
    }

    fn get_attributes(
        &self,
        domain: &str,
        item_name: &str,
        names: &[String],
    ) -> StoreResult<AttributeMap> {
        (**self).get_attributes(domain, item_name, names)
    }

    fn put_attributes(
        &self,
        domain: &str,
        item_name: &str,
        attributes: &AttributeMap,
        replace: bool,
    ) -> StoreResult<()> {
        (**self).put_attributes(domain, item_name, attributes, replace)
    }

    fn delete_attributes(
        &self,
        domain: &str,
        item_name: &str,
        names: Option<&[String]>,
    ) -> StoreResult<()> {
        (**self).delete_attributes(domain, item_name, names)
    }

    fn create_domain(&self, domain: &str) -> StoreResult<()> {
        (**self).create_domain(domain)
    }

    fn delete_domain(&self, domain: &str) -> StoreResult<()> {
        (**self).delete_domain(domain)
    }

    fn list_domains(&self) -> StoreResult<Vec<String>> {
        (**self).list_domains()
    }
}
