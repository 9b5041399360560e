//! Sequential composition of measurements over the same input.

use std::rc::Rc;

use tracing::debug;

use dp_chain_core::{
    Domain, DpError, ForwardMap, Function, Measure, Measurement, Metric, ProductDomain, Relation,
    Result,
};

/// Release every measurement on the same input.
///
/// The components must agree on input domain, input metric and output
/// measure, and each must declare a forward map. The total loss is the
/// measure's composition of the components' losses.
pub fn make_sequential_composition<DI, DO, MI, MO>(
    measurements: &[Measurement<DI, DO, MI, MO>],
) -> Result<Measurement<DI, ProductDomain<DO>, MI, MO>>
where
    DI: Domain,
    DO: Domain,
    MI: Metric,
    MO: Measure + 'static,
    DI::Carrier: 'static,
    DO::Carrier: 'static,
    MI::Distance: 'static,
    MO::Distance: 'static,
{
    let first = measurements
        .first()
        .ok_or_else(|| DpError::native("must compose at least one measurement"))?;

    for (index, measurement) in measurements.iter().enumerate().skip(1) {
        if measurement.input_domain != first.input_domain {
            return Err(DpError::domain_mismatch(format!(
                "component {} has input domain {:?}, expected {:?}",
                index, measurement.input_domain, first.input_domain
            )));
        }
        if measurement.input_metric != first.input_metric {
            return Err(DpError::metric_mismatch(format!(
                "component {} has input metric {:?}, expected {:?}",
                index, measurement.input_metric, first.input_metric
            )));
        }
        if measurement.output_measure != first.output_measure {
            return Err(DpError::metric_mismatch(format!(
                "component {} has output measure {:?}, expected {:?}",
                index, measurement.output_measure, first.output_measure
            )));
        }
    }

    let forward_maps = measurements
        .iter()
        .enumerate()
        .map(|(index, measurement)| {
            measurement.privacy_relation.forward_map().ok_or_else(|| {
                DpError::metric_mismatch(format!(
                    "component {} does not declare its privacy loss",
                    index
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let functions: Vec<Function<DI::Carrier, DO::Carrier>> =
        measurements.iter().map(|m| m.function.clone()).collect();
    debug!(components = measurements.len(), "composing measurements");

    let measure = first.output_measure.clone();
    let total: ForwardMap<MI::Distance, MO::Distance> = {
        let measure = measure.clone();
        Rc::new(move |d_in: &MI::Distance| {
            let losses = forward_maps
                .iter()
                .map(|forward| forward(d_in))
                .collect::<Result<Vec<_>>>()?;
            measure.compose(&losses)
        })
    };
    let within = total.clone();
    let relation = Relation::new_all(
        move |d_in: &MI::Distance, d_out: &MO::Distance| measure.within(&within(d_in)?, d_out),
        Some(total),
        None,
    );

    Ok(Measurement::new(
        first.input_domain.clone(),
        ProductDomain::new(measurements.iter().map(|m| m.output_domain.clone()).collect()),
        Function::new_fallible(move |arg: &DI::Carrier| {
            functions.iter().map(|function| function.eval(arg)).collect()
        }),
        first.input_metric.clone(),
        first.output_measure.clone(),
        relation,
    ))
}
