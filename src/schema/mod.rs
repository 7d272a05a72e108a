//! Daily log persistence schema
//!
//! Raw, loosely typed documents as stored by the persistence layer, and the
//! adapter that types them against the habit definitions.

mod raw_record;
mod adapter;

pub use raw_record::*;
pub use adapter::*;
