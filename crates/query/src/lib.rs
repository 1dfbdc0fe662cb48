//! Query engine: hard-filters and ranks dataset records against a
//! structured constraint.
//!
//! The hard filter is exclusionary (a dropped record never reappears, no
//! matter its score); the soft score only orders what survived.

mod constraint;
mod engine;
mod error;
mod score;

pub use constraint::Constraint;
pub use engine::{find_by_name, search, RankedHit, RankedResult, DEFAULT_LIMIT, MAX_LIMIT};
pub use error::{QueryError, Result};
