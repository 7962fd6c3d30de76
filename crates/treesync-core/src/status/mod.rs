//! Run status tracking per source identifier.

pub mod model;
pub mod store;
