use crate::error::Result;
use crate::spec::{Extent, WidthSpec};
use crate::types::Pt;

/// Resolves `specs` against `available`.
///
/// `measure(index, remaining)` reports the natural width of the auto entry at
/// `index` when offered `remaining`; it is only called for auto entries (and,
/// when `available` is unbounded, for every non-absolute entry).
pub fn distribute_widths(
    available: Pt,
    specs: &[WidthSpec],
    mut measure: impl FnMut(usize, Pt) -> Result<Pt>,
) -> Result<Vec<Pt>> {
    if specs.is_empty() {
        return Ok(Vec::new());
    }
    if available.is_unbounded() {
        return specs
            .iter()
            .enumerate()
            .map(|(index, spec)| match spec {
                Extent::Absolute(value) => Ok(value.max(Pt::ZERO)),
                _ => measure(index, available).map(|w| w.max(Pt::ZERO)),
            })
            .collect();
    }

    let total = available.max(Pt::ZERO).to_milli_i64();
    let mut out = vec![0i64; specs.len()];
    let mut fixed = Vec::new();
    let mut autos = Vec::new();
    let mut stars = Vec::new();
    for (index, spec) in specs.iter().enumerate() {
        match spec.fixed_length(available) {
            Some(length) => {
                out[index] = length.to_milli_i64().max(0);
                fixed.push(index);
            }
            None if matches!(spec, Extent::Auto) => autos.push(index),
            None => stars.push(index),
        }
    }

    let fixed_total: i64 = fixed.iter().map(|i| out[*i]).sum();
    if fixed_total > total {
        let weights: Vec<i64> = fixed.iter().map(|i| out[*i]).collect();
        share_proportionally(total, &fixed, &weights, &mut out);
        return Ok(to_pts(out));
    }
    let remaining = total - fixed_total;

    if !autos.is_empty() {
        let remaining_pt = Pt::from_milli_i64(remaining);
        let mut natural_total = 0i64;
        for index in &autos {
            let natural = measure(*index, remaining_pt)?.to_milli_i64().max(0);
            out[*index] = natural;
            natural_total = natural_total.saturating_add(natural);
        }
        if natural_total <= remaining {
            let leftover = remaining - natural_total;
            if !stars.is_empty() {
                share_evenly(leftover, &stars, &mut out);
            } else {
                let mut extra = vec![0i64; specs.len()];
                share_evenly(leftover, &autos, &mut extra);
                for index in &autos {
                    out[*index] += extra[*index];
                }
            }
        } else {
            log::debug!(
                "auto widths {natural_total} exceed remaining {remaining}; sharing evenly"
            );
            let mut flexible: Vec<usize> = autos.iter().chain(&stars).copied().collect();
            flexible.sort_unstable();
            share_evenly(remaining, &flexible, &mut out);
        }
    } else if !stars.is_empty() {
        share_evenly(remaining, &stars, &mut out);
    } else if fixed_total > 0 {
        let weights: Vec<i64> = fixed.iter().map(|i| out[*i]).collect();
        let mut extra = vec![0i64; specs.len()];
        share_proportionally(remaining, &fixed, &weights, &mut extra);
        for index in &fixed {
            out[*index] += extra[*index];
        }
    } else {
        share_evenly(remaining, &fixed, &mut out);
    }
    Ok(to_pts(out))
}

// Floor shares; the last index absorbs the remainder so the sum is exact.
fn share_evenly(total: i64, indices: &[usize], out: &mut [i64]) {
    let Some((last, rest)) = indices.split_last() else {
        return;
    };
    let share = total / indices.len() as i64;
    for index in rest {
        out[*index] = share;
    }
    out[*last] = total - share * rest.len() as i64;
}

fn share_proportionally(total: i64, indices: &[usize], weights: &[i64], out: &mut [i64]) {
    let weight_sum: i64 = weights.iter().sum();
    if weight_sum <= 0 {
        share_evenly(total, indices, out);
        return;
    }
    let Some((last, rest)) = indices.split_last() else {
        return;
    };
    let mut used = 0i64;
    for (index, weight) in rest.iter().zip(weights) {
        let value = ((total as i128 * *weight as i128) / weight_sum as i128) as i64;
        out[*index] = value;
        used += value;
    }
    out[*last] = total - used;
}

fn to_pts(values: Vec<i64>) -> Vec<Pt> {
    values.into_iter().map(Pt::from_milli_i64).collect()
}
