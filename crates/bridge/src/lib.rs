//! Bridge between a dynamically typed calling surface and typed steps.
//!
//! Type names and example values resolve to [`TypeDescriptor`]s, host
//! [`Value`]s convert exactly into [`AnyObject`] handles, and typed
//! transformations and measurements are erased into steps over handles. The
//! [`Library`] capability object runs every native operation and reports
//! through [`FfiResult`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

#[macro_use]
mod dispatch;

pub mod any;
pub mod convert;
pub mod ffi;
pub mod library;
pub mod typing;
pub mod value;

pub use any::{
    product_into_any, AnyDomain, AnyMeasure, AnyMeasurement, AnyMetric, AnyObject,
    AnyTransformation, IntoAnyMeasurementExt, IntoAnyTransformationExt,
};
pub use convert::{from_native, to_native, HostValue};
pub use ffi::{FfiError, FfiResult};
pub use library::{Arg, Library, LibraryConfig, Native, OPERATIONS};
pub use typing::{NativeType, Primitive, TypeDescriptor};
pub use value::Value;

/// Common imports for bridge users.
pub mod prelude {
    pub use crate::{
        from_native, to_native, AnyMeasurement, AnyObject, AnyTransformation, Arg, FfiResult,
        IntoAnyMeasurementExt, IntoAnyTransformationExt, Library, LibraryConfig, Native,
        TypeDescriptor, Value,
    };
}
