//! Translation between dialect-agnostic schemas and the type algebra.
//!
//! - inbound: [`from_schema`] flattens a schema into a [`TypeEnvironment`]
//! - outbound: [`to_schema`] turns an inferred type back into a schema,
//!   reporting whatever the target dialect cannot express
//!
//! [`TypeEnvironment`]: crate::env::TypeEnvironment
mod dialect;
mod from_schema;
mod json_schema;
mod to_schema;

pub use dialect::{Capabilities, Dialect, UnionSupport};
pub use from_schema::{MAX_SCHEMA_DEPTH, from_schema};
pub use json_schema::{DialectAdapter, JsonSchemaAdapter};
pub use to_schema::{Conversion, to_schema};
