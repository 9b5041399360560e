//! Sequential chaining of transformations and measurements.
//!
//! A chain's relation is built lazily from the relations of its parts. The
//! strategy is chosen from what the parts declare, in this order:
//!
//! * **forward**: the first part maps `d_in` to its tightest `d_mid`;
//! * **backward**: the second part maps `d_out` to its loosest `d_mid`;
//! * **search**: the intermediate metric can be bisected, so the smallest
//!   `d_mid` accepted by the first part is found and handed to the second.

use std::fmt;
use std::ops::Shr;
use std::rc::Rc;

use tracing::debug;

use crate::domain::Domain;
use crate::error::{DpError, Result};
use crate::metric::{Measure, Metric};
use crate::relation::{BackwardMap, ForwardMap, Relation};
use crate::search::DistanceSearch;
use crate::step::{Function, Measurement, Transformation};

/// How a chained relation finds the intermediate bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainStrategy {
    /// Map `d_in` through the first relation's forward map.
    Forward,
    /// Map `d_out` through the second relation's backward map.
    Backward,
    /// Search the intermediate metric for the smallest passing bound.
    Search,
}

impl fmt::Display for ChainStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChainStrategy::Forward => "forward",
            ChainStrategy::Backward => "backward",
            ChainStrategy::Search => "search",
        };
        f.write_str(name)
    }
}

impl ChainStrategy {
    /// The strategy the given parts allow, if any.
    pub fn select<QI, QX, QO>(
        first: &Relation<QI, QX>,
        second: &Relation<QX, QO>,
        search: Option<&DistanceSearch<QX>>,
    ) -> Option<Self>
    where
        QI: 'static,
        QX: 'static,
        QO: 'static,
    {
        if first.forward_map().is_some() {
            Some(ChainStrategy::Forward)
        } else if second.backward_map().is_some() {
            Some(ChainStrategy::Backward)
        } else if search.is_some() {
            Some(ChainStrategy::Search)
        } else {
            None
        }
    }
}

/// Combine two relations sharing an intermediate distance type.
///
/// Fails with a metric mismatch when no strategy applies.
pub fn chain_relations<QI, QX, QO>(
    first: &Relation<QI, QX>,
    second: &Relation<QX, QO>,
    search: Option<DistanceSearch<QX>>,
) -> Result<Relation<QI, QO>>
where
    QI: 'static,
    QX: 'static,
    QO: 'static,
{
    let strategy = ChainStrategy::select(first, second, search.as_ref()).ok_or_else(|| {
        DpError::metric_mismatch(
            "intermediate bound has no forward map, backward map or search space",
        )
    })?;
    debug!(%strategy, "chaining relations");

    let forward_map: Option<ForwardMap<QI, QO>> = match (first.forward_map(), second.forward_map())
    {
        (Some(f0), Some(f1)) => Some(Rc::new(move |d_in: &QI| f1(&f0(d_in)?))),
        _ => None,
    };
    let backward_map: Option<BackwardMap<QO, QI>> =
        match (first.backward_map(), second.backward_map()) {
            (Some(b0), Some(b1)) => Some(Rc::new(move |d_out: &QO| b0(&b1(d_out)?))),
            _ => None,
        };

    let relation = match (strategy, first.forward_map(), second.backward_map(), search) {
        (ChainStrategy::Forward, Some(f0), _, _) => {
            let second = second.clone();
            Relation::new_all(
                move |d_in: &QI, d_out: &QO| second.eval(&f0(d_in)?, d_out),
                forward_map,
                backward_map,
            )
        }
        (ChainStrategy::Backward, _, Some(b1), _) => {
            let first = first.clone();
            Relation::new_all(
                move |d_in: &QI, d_out: &QO| first.eval(d_in, &b1(d_out)?),
                forward_map,
                backward_map,
            )
        }
        (ChainStrategy::Search, _, _, Some(search)) => {
            let (first, second) = (first.clone(), second.clone());
            Relation::new_all(
                move |d_in: &QI, d_out: &QO| {
                    match search.smallest_passing(&|d_mid: &QX| first.eval(d_in, d_mid))? {
                        Some(d_mid) => second.eval(&d_mid, d_out),
                        None => Ok(false),
                    }
                },
                forward_map,
                backward_map,
            )
        }
        (strategy, ..) => {
            return Err(DpError::native(format!(
                "{} strategy selected without its map",
                strategy
            )))
        }
    };
    Ok(relation)
}

fn ensure_domains_match<D: Domain>(output: &D, input: &D) -> Result<()> {
    if output == input {
        Ok(())
    } else {
        Err(DpError::domain_mismatch(format!(
            "output domain {:?} does not match input domain {:?}",
            output, input
        )))
    }
}

fn ensure_metrics_match<M: Metric>(output: &M, input: &M) -> Result<()> {
    if output == input {
        Ok(())
    } else {
        Err(DpError::metric_mismatch(format!(
            "output metric {:?} does not match input metric {:?}",
            output, input
        )))
    }
}

/// Run `first`, then `second`.
pub fn make_chain_tt<DI, DX, DO, MI, MX, MO>(
    first: &Transformation<DI, DX, MI, MX>,
    second: &Transformation<DX, DO, MX, MO>,
) -> Result<Transformation<DI, DO, MI, MO>>
where
    DI: Domain,
    DX: Domain,
    DO: Domain,
    MI: Metric,
    MX: Metric,
    MO: Metric,
    DI::Carrier: 'static,
    DX::Carrier: 'static,
    DO::Carrier: 'static,
    MI::Distance: 'static,
    MX::Distance: 'static,
    MO::Distance: 'static,
{
    ensure_domains_match(&first.output_domain, &second.input_domain)?;
    ensure_metrics_match(&first.output_metric, &second.input_metric)?;

    Ok(Transformation::new(
        first.input_domain.clone(),
        second.output_domain.clone(),
        Function::make_chain(&first.function, &second.function),
        first.input_metric.clone(),
        second.output_metric.clone(),
        chain_relations(
            &first.stability_relation,
            &second.stability_relation,
            first.output_metric.distance_search(),
        )?,
    ))
}

/// Run a transformation, then release its output with a measurement.
pub fn make_chain_mt<DI, DX, DO, MI, MX, MO>(
    first: &Transformation<DI, DX, MI, MX>,
    second: &Measurement<DX, DO, MX, MO>,
) -> Result<Measurement<DI, DO, MI, MO>>
where
    DI: Domain,
    DX: Domain,
    DO: Domain,
    MI: Metric,
    MX: Metric,
    MO: Measure,
    DI::Carrier: 'static,
    DX::Carrier: 'static,
    DO::Carrier: 'static,
    MI::Distance: 'static,
    MX::Distance: 'static,
    MO::Distance: 'static,
{
    ensure_domains_match(&first.output_domain, &second.input_domain)?;
    ensure_metrics_match(&first.output_metric, &second.input_metric)?;

    Ok(Measurement::new(
        first.input_domain.clone(),
        second.output_domain.clone(),
        Function::make_chain(&first.function, &second.function),
        first.input_metric.clone(),
        second.output_measure.clone(),
        chain_relations(
            &first.stability_relation,
            &second.privacy_relation,
            first.output_metric.distance_search(),
        )?,
    ))
}

/// Post-process a measurement's release.
///
/// The result carries the measurement's privacy relation unchanged; the
/// transformation's metrics play no part.
pub fn make_chain_pm<DI, DX, DO, MI, MO, MT, MU>(
    first: &Measurement<DI, DX, MI, MO>,
    second: &Transformation<DX, DO, MT, MU>,
) -> Result<Measurement<DI, DO, MI, MO>>
where
    DI: Domain,
    DX: Domain,
    DO: Domain,
    MI: Metric,
    MO: Measure,
    MT: Metric,
    MU: Metric,
    DI::Carrier: 'static,
    DX::Carrier: 'static,
    DO::Carrier: 'static,
    MI::Distance: 'static,
    MO::Distance: 'static,
{
    ensure_domains_match(&first.output_domain, &second.input_domain)?;
    debug!("post-processing measurement");

    Ok(Measurement::new(
        first.input_domain.clone(),
        second.output_domain.clone(),
        Function::make_chain(&first.function, &second.function),
        first.input_metric.clone(),
        first.output_measure.clone(),
        first.privacy_relation.clone(),
    ))
}

impl<DI, DX, DO, MI, MX, MO> Shr<Transformation<DX, DO, MX, MO>> for Transformation<DI, DX, MI, MX>
where
    DI: Domain,
    DX: Domain,
    DO: Domain,
    MI: Metric,
    MX: Metric,
    MO: Metric,
    DI::Carrier: 'static,
    DX::Carrier: 'static,
    DO::Carrier: 'static,
    MI::Distance: 'static,
    MX::Distance: 'static,
    MO::Distance: 'static,
{
    type Output = Result<Transformation<DI, DO, MI, MO>>;

    fn shr(self, rhs: Transformation<DX, DO, MX, MO>) -> Self::Output {
        make_chain_tt(&self, &rhs)
    }
}

impl<DI, DX, DO, MI, MX, MO> Shr<Transformation<DX, DO, MX, MO>>
    for Result<Transformation<DI, DX, MI, MX>>
where
    DI: Domain,
    DX: Domain,
    DO: Domain,
    MI: Metric,
    MX: Metric,
    MO: Metric,
    DI::Carrier: 'static,
    DX::Carrier: 'static,
    DO::Carrier: 'static,
    MI::Distance: 'static,
    MX::Distance: 'static,
    MO::Distance: 'static,
{
    type Output = Result<Transformation<DI, DO, MI, MO>>;

    fn shr(self, rhs: Transformation<DX, DO, MX, MO>) -> Self::Output {
        make_chain_tt(&self?, &rhs)
    }
}

impl<DI, DX, DO, MI, MX, MO> Shr<Measurement<DX, DO, MX, MO>> for Transformation<DI, DX, MI, MX>
where
    DI: Domain,
    DX: Domain,
    DO: Domain,
    MI: Metric,
    MX: Metric,
    MO: Measure,
    DI::Carrier: 'static,
    DX::Carrier: 'static,
    DO::Carrier: 'static,
    MI::Distance: 'static,
    MX::Distance: 'static,
    MO::Distance: 'static,
{
    type Output = Result<Measurement<DI, DO, MI, MO>>;

    fn shr(self, rhs: Measurement<DX, DO, MX, MO>) -> Self::Output {
        make_chain_mt(&self, &rhs)
    }
}

impl<DI, DX, DO, MI, MX, MO> Shr<Measurement<DX, DO, MX, MO>>
    for Result<Transformation<DI, DX, MI, MX>>
where
    DI: Domain,
    DX: Domain,
    DO: Domain,
    MI: Metric,
    MX: Metric,
    MO: Measure,
    DI::Carrier: 'static,
    DX::Carrier: 'static,
    DO::Carrier: 'static,
    MI::Distance: 'static,
    MX::Distance: 'static,
    MO::Distance: 'static,
{
    type Output = Result<Measurement<DI, DO, MI, MO>>;

    fn shr(self, rhs: Measurement<DX, DO, MX, MO>) -> Self::Output {
        make_chain_mt(&self?, &rhs)
    }
}

impl<DI, DX, DO, MI, MO, MT, MU> Shr<Transformation<DX, DO, MT, MU>> for Measurement<DI, DX, MI, MO>
where
    DI: Domain,
    DX: Domain,
    DO: Domain,
    MI: Metric,
    MO: Measure,
    MT: Metric,
    MU: Metric,
    DI::Carrier: 'static,
    DX::Carrier: 'static,
    DO::Carrier: 'static,
    MI::Distance: 'static,
    MO::Distance: 'static,
{
    type Output = Result<Measurement<DI, DO, MI, MO>>;

    fn shr(self, rhs: Transformation<DX, DO, MT, MU>) -> Self::Output {
        make_chain_pm(&self, &rhs)
    }
}

impl<DI, DX, DO, MI, MO, MT, MU> Shr<Transformation<DX, DO, MT, MU>>
    for Result<Measurement<DI, DX, MI, MO>>
where
    DI: Domain,
    DX: Domain,
    DO: Domain,
    MI: Metric,
    MO: Measure,
    MT: Metric,
    MU: Metric,
    DI::Carrier: 'static,
    DX::Carrier: 'static,
    DO::Carrier: 'static,
    MI::Distance: 'static,
    MO::Distance: 'static,
{
    type Output = Result<Measurement<DI, DO, MI, MO>>;

    fn shr(self, rhs: Transformation<DX, DO, MT, MU>) -> Self::Output {
        make_chain_pm(&self?, &rhs)
    }
}
