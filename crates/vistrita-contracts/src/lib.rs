//! Data model, structured-output contracts and the product log shared by the
//! Vistrita engine and CLI.

pub mod attributes;
pub mod bulk;
pub mod copy;
pub mod errors;
pub mod image;
pub mod models;
pub mod product_log;
pub mod schema;
pub mod tone;

pub use attributes::{AttributeEnvelope, AttributeRecord};
pub use bulk::BulkOutcome;
pub use copy::{CopyRequest, CopyResult, GenerationOutcome, ProductInput};
pub use errors::{ClientInputError, DecodeError};
pub use crate::image::ImagePayload;
pub use product_log::{
    EntrySource, EntryStatus, PersistenceOutcome, ProductLog, ProductLogEntry, ProductStore,
};
pub use schema::{attribute_contract, copy_contract, ContractError, SchemaContract};
pub use tone::Tone;
