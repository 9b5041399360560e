//! Calibration of host-level pipelines.

use dp_chain_accounting::{self as accounting, SearchConfig};
use dp_chain_bridge::Value;
use dp_chain_core::{Bisect, Result};

use crate::step::Step;

/// Build the pipeline at the smallest (or, when the bound only holds below
/// some threshold, the largest) parameter for which `check(d_in, d_out)`
/// holds.
///
/// The search brackets from zero outwards, so no bounds are needed.
pub fn binary_search_chain<P, F>(make_chain: F, d_in: &Value, d_out: &Value) -> Result<Step>
where
    P: Bisect,
    F: Fn(&P) -> Result<Step>,
{
    binary_search_chain_with(make_chain, d_in, d_out, None, &SearchConfig::default())
}

/// [`binary_search_chain`] with explicit bounds and caps.
pub fn binary_search_chain_with<P, F>(
    make_chain: F,
    d_in: &Value,
    d_out: &Value,
    bounds: Option<(P, P)>,
    config: &SearchConfig,
) -> Result<Step>
where
    P: Bisect,
    F: Fn(&P) -> Result<Step>,
{
    accounting::binary_search_chain(make_chain, d_in, d_out, bounds, config)
}

/// The parameter [`binary_search_chain`] would build at.
pub fn binary_search_param<P, F>(
    make_chain: F,
    d_in: &Value,
    d_out: &Value,
    bounds: Option<(P, P)>,
    config: &SearchConfig,
) -> Result<P>
where
    P: Bisect,
    F: Fn(&P) -> Result<Step>,
{
    accounting::binary_search_param(make_chain, d_in, d_out, bounds, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calls;
    use dp_chain_bridge::{Library, LibraryConfig};
    use dp_chain_core::ErrorKind;

    #[test]
    fn laplace_scale_is_calibrated() {
        let library = Library::new(LibraryConfig::default().with_seed(1));
        let scale = binary_search_param(
            |s: &f64| calls::make_base_laplace(&library, *s, None),
            &Value::Float(1.0),
            &Value::Float(0.5),
            None,
            &library.config().search,
        )
        .unwrap();
        assert_eq!(scale, 2.0);
    }

    #[test]
    fn unreachable_targets_exhaust_the_search() {
        let library = Library::new(LibraryConfig::default().with_seed(1));
        let config = SearchConfig::default().with_max_doublings(4);
        let err = binary_search_chain_with(
            |_: &u32| calls::make_base_laplace(&library, 1.0, None),
            &Value::Float(1.0),
            &Value::Float(0.5),
            None,
            &config,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SearchBoundsExhausted);
    }
}
