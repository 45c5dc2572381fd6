//! Record subsystem
//!
//! Models, the attribute codec and item naming.
//!
//! Stored items are flat: every attribute is a set of strings. The codec maps
//! typed fields onto that shape and stamps each item with its model's type so
//! several models can share one domain.

mod codec;
mod errors;
pub mod item_name;
mod model;

pub use codec::{
    decode, encode, encode_named, type_filter, AttributeMap, DecodedRecord, EncodedRecord, RecordMetadata,
    CODEC_VERSION, DEPRECATED_TYPE_ATTR, METADATA_ATTR, META_ATTRS,
};
pub use errors::{RecordError, RecordResult};
pub use model::{FieldDef, FieldKind, Model};
