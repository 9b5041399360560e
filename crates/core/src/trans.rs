//! Concrete transformations: parsing, casting, clamping and aggregation.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::str::FromStr;

use num_traits::NumCast;

use crate::domain::{AllDomain, BoundedDomain, Domain, SizedDomain, VectorDomain};
use crate::error::{DpError, Result};
use crate::metric::{AbsoluteDistance, IntDistance, L1Distance, Metric, SymmetricDistance};
use crate::relation::Relation;
use crate::step::{Function, Transformation};
use crate::traits::{cast, FloatNumber, Integer, Number};

/// Columns of string cells keyed by column name.
pub type DataFrame<K> = HashMap<K, Vec<String>>;

/// Separator used when none is given.
pub const DEFAULT_SEPARATOR: &str = ",";

/// Passes its input through unchanged.
pub fn make_identity<D, M>(domain: D, metric: M) -> Transformation<D, D, M, M>
where
    D: Domain,
    D::Carrier: 'static + Clone,
    M: Metric,
    M::Distance: 'static + Clone + PartialOrd,
{
    Transformation::new(
        domain.clone(),
        domain,
        Function::new(|arg: &D::Carrier| arg.clone()),
        metric.clone(),
        metric,
        Relation::new_identity(),
    )
}

/// Splits text into lines.
pub fn make_split_lines() -> Transformation<
    AllDomain<String>,
    VectorDomain<AllDomain<String>>,
    SymmetricDistance,
    SymmetricDistance,
> {
    Transformation::new(
        AllDomain::new(),
        VectorDomain::new_all(),
        Function::new(|arg: &String| arg.lines().map(str::to_owned).collect()),
        SymmetricDistance,
        SymmetricDistance,
        Relation::new_from_constant(1 as IntDistance),
    )
}

/// Split one line into trimmed cells.
fn split_cells<'a>(line: &'a str, separator: &'a str) -> impl Iterator<Item = &'a str> {
    line.split(separator).map(str::trim)
}

/// Parses delimited text into named columns.
///
/// Each line is one record. Cells beyond the named columns are dropped and
/// missing cells are empty strings.
pub fn make_split_dataframe<K>(
    separator: Option<&str>,
    col_names: Vec<K>,
) -> Transformation<AllDomain<String>, AllDomain<DataFrame<K>>, SymmetricDistance, SymmetricDistance>
where
    K: 'static + Eq + Hash + Clone,
{
    let separator = separator.unwrap_or(DEFAULT_SEPARATOR).to_owned();
    Transformation::new(
        AllDomain::new(),
        AllDomain::new(),
        Function::new(move |arg: &String| {
            let mut columns: Vec<Vec<String>> = vec![Vec::new(); col_names.len()];
            for line in arg.lines() {
                let mut cells = split_cells(line, &separator);
                for column in columns.iter_mut() {
                    column.push(cells.next().unwrap_or_default().to_owned());
                }
            }
            col_names.iter().cloned().zip(columns).collect()
        }),
        SymmetricDistance,
        SymmetricDistance,
        Relation::new_from_constant(1 as IntDistance),
    )
}

/// Selects one column of a dataframe.
///
/// Invoking on a dataframe without the column fails.
pub fn make_select_column<K>(
    key: K,
) -> Transformation<
    AllDomain<DataFrame<K>>,
    VectorDomain<AllDomain<String>>,
    SymmetricDistance,
    SymmetricDistance,
>
where
    K: 'static + Eq + Hash + Clone + std::fmt::Debug,
{
    Transformation::new(
        AllDomain::new(),
        VectorDomain::new_all(),
        Function::new_fallible(move |arg: &DataFrame<K>| {
            arg.get(&key).cloned().ok_or_else(|| {
                DpError::native(format!("column {:?} does not exist", key))
            })
        }),
        SymmetricDistance,
        SymmetricDistance,
        Relation::new_from_constant(1 as IntDistance),
    )
}

/// Parses each string, substituting the default when parsing fails.
pub fn make_cast_default<TOA>() -> Transformation<
    VectorDomain<AllDomain<String>>,
    VectorDomain<AllDomain<TOA>>,
    SymmetricDistance,
    SymmetricDistance,
>
where
    TOA: 'static + FromStr + Default,
{
    Transformation::new(
        VectorDomain::new_all(),
        VectorDomain::new_all(),
        Function::new(|arg: &Vec<String>| {
            arg.iter()
                .map(|s| s.trim().parse::<TOA>().unwrap_or_default())
                .collect()
        }),
        SymmetricDistance,
        SymmetricDistance,
        Relation::new_from_constant(1 as IntDistance),
    )
}

/// Clamps each element into `[lower, upper]`.
pub fn make_clamp<T>(
    lower: T,
    upper: T,
) -> Result<
    Transformation<
        VectorDomain<AllDomain<T>>,
        VectorDomain<BoundedDomain<T>>,
        SymmetricDistance,
        SymmetricDistance,
    >,
>
where
    T: 'static + Copy + PartialOrd + std::fmt::Debug,
{
    let bounds = BoundedDomain::new(lower, upper)?;
    Ok(Transformation::new(
        VectorDomain::new_all(),
        VectorDomain::new(bounds),
        Function::new(move |arg: &Vec<T>| {
            arg.iter()
                .map(|v| {
                    if *v < lower {
                        lower
                    } else if *v > upper {
                        upper
                    } else {
                        *v
                    }
                })
                .collect()
        }),
        SymmetricDistance,
        SymmetricDistance,
        Relation::new_from_constant(1 as IntDistance),
    ))
}

fn saturating_count<TO: Integer>(n: usize) -> TO {
    <TO as NumCast>::from(n).unwrap_or_else(TO::max_value)
}

/// Counts records, saturating at the output type's maximum.
pub fn make_count<TIA, TO>() -> Transformation<
    VectorDomain<AllDomain<TIA>>,
    AllDomain<TO>,
    SymmetricDistance,
    AbsoluteDistance<TO>,
>
where
    TIA: 'static,
    TO: Integer,
{
    Transformation::new(
        VectorDomain::new_all(),
        AllDomain::new(),
        Function::new(|arg: &Vec<TIA>| saturating_count(arg.len())),
        SymmetricDistance,
        AbsoluteDistance::new(),
        Relation::new_from_constant(TO::one()),
    )
}

/// Counts distinct records, saturating at the output type's maximum.
pub fn make_count_distinct<TIA, TO>() -> Transformation<
    VectorDomain<AllDomain<TIA>>,
    AllDomain<TO>,
    SymmetricDistance,
    AbsoluteDistance<TO>,
>
where
    TIA: 'static + Eq + Hash,
    TO: Integer,
{
    Transformation::new(
        VectorDomain::new_all(),
        AllDomain::new(),
        Function::new(|arg: &Vec<TIA>| {
            saturating_count(arg.iter().collect::<HashSet<_>>().len())
        }),
        SymmetricDistance,
        AbsoluteDistance::new(),
        Relation::new_from_constant(TO::one()),
    )
}

/// Sums records clamped into `[lower, upper]`.
///
/// Adding or removing one record moves the sum by at most
/// `max(|lower|, |upper|)`. Integer sums saturate.
pub fn make_bounded_sum<T>(
    lower: T,
    upper: T,
) -> Result<
    Transformation<
        VectorDomain<BoundedDomain<T>>,
        AllDomain<T>,
        SymmetricDistance,
        AbsoluteDistance<T>,
    >,
>
where
    T: Number,
{
    let bounds = BoundedDomain::new(lower, upper)?;
    let (lower_mag, upper_mag) = (lower.magnitude(), upper.magnitude());
    let constant = if lower_mag > upper_mag {
        lower_mag
    } else {
        upper_mag
    };
    Ok(Transformation::new(
        VectorDomain::new(bounds),
        AllDomain::new(),
        Function::new(|arg: &Vec<T>| {
            arg.iter()
                .fold(T::zero(), |acc, v| acc.add_saturating(*v))
        }),
        SymmetricDistance,
        AbsoluteDistance::new(),
        Relation::new_from_constant(constant),
    ))
}

/// Sums exactly `size` records clamped into `[lower, upper]`.
///
/// With the length public, `d_in` symmetric changes replace at most
/// `d_in / 2` records, each moving the sum by at most `upper - lower`.
pub fn make_sized_bounded_sum<T>(
    size: usize,
    lower: T,
    upper: T,
) -> Result<
    Transformation<
        SizedDomain<BoundedDomain<T>>,
        AllDomain<T>,
        SymmetricDistance,
        AbsoluteDistance<T>,
    >,
>
where
    T: Number,
{
    let bounds = BoundedDomain::new(lower, upper)?;
    let range = upper.sub_saturating(lower);
    Ok(Transformation::new(
        SizedDomain::new(bounds, size),
        AllDomain::new(),
        Function::new(|arg: &Vec<T>| {
            arg.iter()
                .fold(T::zero(), |acc, v| acc.add_saturating(*v))
        }),
        SymmetricDistance,
        AbsoluteDistance::new(),
        Relation::new_from_forward(move |d_in: &IntDistance| {
            Ok(cast::<IntDistance, T>(*d_in / 2)?.mul_saturating(range))
        }),
    ))
}

/// Counts occurrences of each distinct record.
///
/// One added or removed record changes one count by one, so the L1 distance
/// between histograms is at most `d_in`.
pub fn make_count_by<TIK, TOC, QO>() -> Transformation<
    VectorDomain<AllDomain<TIK>>,
    AllDomain<HashMap<TIK, TOC>>,
    SymmetricDistance,
    L1Distance<QO>,
>
where
    TIK: 'static + Eq + Hash + Clone,
    TOC: Integer,
    QO: FloatNumber,
{
    Transformation::new(
        VectorDomain::new_all(),
        AllDomain::new(),
        Function::new(|arg: &Vec<TIK>| {
            let mut counts: HashMap<TIK, TOC> = HashMap::new();
            for key in arg {
                let count = counts.entry(key.clone()).or_insert_with(TOC::zero);
                *count = count.add_saturating(TOC::one());
            }
            counts
        }),
        SymmetricDistance,
        L1Distance::new(),
        Relation::new_from_constant(QO::one()),
    )
}
