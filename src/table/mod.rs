//! Tables
//!
//! Fixed per-table schemas, the registry that binds file names to them, and
//! primary-key generation.

pub mod ids;
pub mod registry;
pub mod schema;

pub use ids::generate_id;
pub use registry::{TableRegistry, CUTTERS, LOCATION_LOG, MOLDS, SHIP_LOG, USER_COMMENTS};
pub use schema::TableSchema;
