//! Intent lifecycle: the record that owns every status change, and the
//! stores it persists through.

pub mod error;
pub mod record;
pub mod sqlite_store;
pub mod store;

pub use error::*;
pub use record::*;
pub use sqlite_store::*;
pub use store::*;
