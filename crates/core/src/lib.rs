//! Core types for composable differential privacy.
//!
//! This crate provides the strongly typed building blocks: domains, metrics
//! and measures, relations between distance bounds, transformations and
//! measurements, and the rules for chaining them.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod chain;
pub mod domain;
pub mod error;
pub mod meas;
pub mod metric;
pub mod noise;
pub mod relation;
pub mod search;
pub mod step;
pub mod traits;
pub mod trans;

pub use chain::{chain_relations, make_chain_mt, make_chain_pm, make_chain_tt, ChainStrategy};
pub use domain::{AllDomain, BoundedDomain, Domain, ProductDomain, SizedDomain, VectorDomain};
pub use error::{DpError, ErrorKind, Result};
pub use meas::{
    make_base_gaussian, make_base_gaussian_with, make_base_gaussian_zcdp,
    make_base_gaussian_zcdp_with, make_base_geometric, make_base_geometric_with,
    make_base_laplace, make_base_laplace_with, make_base_stability, make_base_stability_with,
    make_base_vector_gaussian, make_base_vector_gaussian_with, make_base_vector_geometric,
    make_base_vector_geometric_with, make_base_vector_laplace, make_base_vector_laplace_with,
    make_constant_time_base_geometric, make_constant_time_base_geometric_with,
    make_constant_time_base_vector_geometric, make_constant_time_base_vector_geometric_with,
    make_shuffle_amplification, make_shuffle_amplification_with, ScalarMeasurement,
    StabilityMeasurement, VectorMeasurement,
};
pub use metric::{
    AbsoluteDistance, HammingDistance, IntDistance, L1Distance, L2Distance, MaxDivergence,
    Measure, Metric, SmoothedMaxDivergence, SymmetricDistance, ZeroConcentratedDivergence,
};
pub use noise::NoiseSource;
pub use relation::{BackwardMap, ForwardMap, PrivacyRelation, Relation, StabilityRelation};
pub use search::{Bisect, DistanceSearch, DEFAULT_MAX_BISECTIONS, DEFAULT_MAX_DOUBLINGS};
pub use step::{Function, Measurement, Relate, Transformation};
pub use traits::{cast, Arith, DistanceValue, FloatNumber, Integer, Number};
pub use trans::{
    make_bounded_sum, make_cast_default, make_clamp, make_count, make_count_by,
    make_count_distinct, make_identity, make_select_column, make_sized_bounded_sum,
    make_split_dataframe, make_split_lines, DataFrame,
};

/// Common imports for downstream users.
pub mod prelude {
    pub use crate::{
        make_base_gaussian, make_base_gaussian_zcdp, make_base_geometric, make_base_laplace,
        make_base_stability, make_base_vector_gaussian, make_base_vector_geometric,
        make_base_vector_laplace, make_bounded_sum, make_cast_default, make_chain_mt,
        make_chain_pm, make_chain_tt, make_clamp, make_constant_time_base_geometric,
        make_constant_time_base_vector_geometric, make_count, make_count_by,
        make_count_distinct, make_identity, make_select_column, make_shuffle_amplification,
        make_sized_bounded_sum, make_split_dataframe, make_split_lines, AbsoluteDistance,
        AllDomain, BoundedDomain, DataFrame, Domain, DpError, ErrorKind, Function,
        HammingDistance, L1Distance, L2Distance, MaxDivergence, Measure, Measurement, Metric,
        NoiseSource, Relate, Relation, Result, SizedDomain, SmoothedMaxDivergence,
        SymmetricDistance, Transformation, VectorDomain, ZeroConcentratedDivergence,
    };
}
