pub mod adapters;
pub mod metadata_store;
pub mod overflow;
pub mod pipeline;
pub mod pump;
pub mod queue;
pub mod storage;
pub mod worker;
