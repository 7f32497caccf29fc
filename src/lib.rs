//! Ingestion of AOI (automated optical inspection) batch logs.
//!
//! [`lotlog`] turns one station log into a [`model::LotRecord`]; the `aoilog`
//! binary drives it over whole folders and persists the results.

pub mod lotlog;
pub mod model;
pub mod util;
