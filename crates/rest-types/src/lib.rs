//! Schema validation and coercion of REST payloads.
//!
//! Decoded request and response bodies arrive as raw [`typed::Value`]s. This
//! crate checks them against declared schemas, coerces individual values into
//! their declared types (enumerations, timestamps, containers, records) and
//! reports precisely why a payload does not match.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`schema`] | `validate_fields` and the `SchemaPolicy` configuration |
//! | [`coerce`] | Single-value `is_acceptable` and `coerce` |
//! | [`record`] | `RecordSchema` declarations and the `RecordType` they build |

pub mod coerce;
pub mod record;
pub mod schema;

pub use coerce::{coerce, is_acceptable};
pub use record::{RecordSchema, RecordType};
pub use schema::{validate_fields, SchemaPolicy};
