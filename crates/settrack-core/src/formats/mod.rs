//! # Formats
//!
//! Binary dataset format for moving a store's content between machines.

mod persistence;

pub use persistence::{
    Dataset, MAX_PERSISTENCE_PAYLOAD_SIZE, PersistenceHeader, dataset_from_bytes, dataset_to_bytes,
};
