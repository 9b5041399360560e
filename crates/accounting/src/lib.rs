//! Privacy accounting for composed pipelines.
//!
//! Calibrates free parameters so a pipeline meets a target bound, and
//! composes measurements that release on the same input.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod calibrate;
pub mod compose;
pub mod config;

pub use calibrate::{binary_search, binary_search_chain, binary_search_param};
pub use compose::make_sequential_composition;
pub use config::SearchConfig;

/// Common imports for privacy accounting.
pub mod prelude {
    pub use crate::{
        binary_search, binary_search_chain, binary_search_param, make_sequential_composition,
        SearchConfig,
    };
}
