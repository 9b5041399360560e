//! Facade crate re-exporting stable APIs.
//!
//! Typed pipelines live in [`core`] and [`accounting`]. Host-facing pipelines
//! are [`Step`]s built with the wrappers in [`calls`], chained with `>>` and
//! calibrated with [`binary_search_chain`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod calls;
pub mod search;
pub mod step;

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use dp_chain_accounting as accounting;
pub use dp_chain_bridge as bridge;
pub use dp_chain_core as core;

pub use dp_chain_accounting::SearchConfig;
pub use dp_chain_bridge::{
    from_native, to_native, AnyMeasurement, AnyObject, AnyTransformation, FfiError, FfiResult,
    Library, LibraryConfig, TypeDescriptor, Value,
};
pub use dp_chain_core::{DpError, ErrorKind, Relate, Result};
pub use search::{binary_search_chain, binary_search_chain_with, binary_search_param};
pub use step::{Step, StepKind};

/// Convenience prelude for building host-level pipelines.
pub mod prelude {
    pub use crate::calls::*;
    pub use crate::{
        binary_search_chain, binary_search_chain_with, DpError, ErrorKind, Library,
        LibraryConfig, Relate, Result, SearchConfig, Step, TypeDescriptor, Value,
    };
}
