pub mod compare;
pub mod ingest;
pub mod running_lots;
pub mod status;
pub mod sync;
