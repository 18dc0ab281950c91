//! Wire and file types shared by every deferd crate.
//!
//! The JSON shape of these types is the compatibility boundary for `tasks.json`,
//! `history.json` and the HTTP API, so field names here must stay stable.

mod domain;
pub use domain::*;
