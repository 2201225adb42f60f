//! Core building blocks: parameter structs, date helpers and the three
//! pipelines (tile acquisition, observation extraction, break rasters).
//! These are consumed by the high-level `api` module.
pub mod acquisition;
pub mod breaks;
pub mod dates;
pub mod extraction;
pub mod params;
