//! Credit allocation: splits a conversion value across an ordered
//! touchpoint sequence. Pure and stateless; safe to call from any thread.
//!
//! Every input touchpoint appears in the returned mapping (touchpoints a
//! model gives nothing to carry an explicit `0.0`), and the credits sum to
//! the input value. An empty sequence yields an empty mapping.

use std::collections::BTreeMap;

use attribution_core::types::{AttributionModelKind, Touchpoint};

/// Share given to each of the three W-shaped key moments.
const W_SHAPED_MILESTONE_WEIGHT: f64 = 0.30;
/// Share given to each of the four full-path milestones.
const FULL_PATH_MILESTONE_WEIGHT: f64 = 0.225;

pub type Credits = BTreeMap<String, f64>;

/// Allocate `total_value` using `model`. Touchpoints must already be sorted
/// by timestamp ascending.
pub fn allocate(model: AttributionModelKind, touchpoints: &[Touchpoint], total_value: f64) -> Credits {
    match model {
        AttributionModelKind::FirstTouch => first_touch(touchpoints, total_value),
        AttributionModelKind::LastTouch => last_touch(touchpoints, total_value),
        AttributionModelKind::Linear => linear(touchpoints, total_value),
        AttributionModelKind::WShaped => w_shaped(touchpoints, total_value),
        AttributionModelKind::FullPath => full_path(touchpoints, total_value),
    }
}

/// 100% to the first touchpoint.
pub fn first_touch(touchpoints: &[Touchpoint], total_value: f64) -> Credits {
    let mut shares = vec![0.0; touchpoints.len()];
    if let Some(first) = shares.first_mut() {
        *first = total_value;
    }
    to_credits(touchpoints, shares)
}

/// 100% to the last touchpoint.
pub fn last_touch(touchpoints: &[Touchpoint], total_value: f64) -> Credits {
    let mut shares = vec![0.0; touchpoints.len()];
    if let Some(last) = shares.last_mut() {
        *last = total_value;
    }
    to_credits(touchpoints, shares)
}

/// Equal credit to every touchpoint.
pub fn linear(touchpoints: &[Touchpoint], total_value: f64) -> Credits {
    to_credits(touchpoints, even_shares(touchpoints.len(), total_value))
}

/// W-shaped: 30% each to first, middle (`n / 2`) and last; 10% spread over
/// the rest. One touchpoint takes everything, two split 50/50, and with
/// exactly three the 10% goes back to the three key moments.
pub fn w_shaped(touchpoints: &[Touchpoint], total_value: f64) -> Credits {
    let n = touchpoints.len();
    let shares = match n {
        0..=2 => even_shares(n, total_value),
        _ => milestone_shares(n, &[0, n / 2, n - 1], W_SHAPED_MILESTONE_WEIGHT, total_value),
    };
    to_credits(touchpoints, shares)
}

/// Full-path: 22.5% each to first, lead (`n / 4`), opportunity (`n / 2`)
/// and close (last); 10% spread over the rest. Four or fewer touchpoints
/// fall back to linear.
pub fn full_path(touchpoints: &[Touchpoint], total_value: f64) -> Credits {
    let n = touchpoints.len();
    let shares = if n <= 4 {
        even_shares(n, total_value)
    } else {
        milestone_shares(n, &[0, n / 4, n / 2, n - 1], FULL_PATH_MILESTONE_WEIGHT, total_value)
    };
    to_credits(touchpoints, shares)
}

fn even_shares(n: usize, total_value: f64) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    vec![total_value / n as f64; n]
}

/// Give `weight` of the total to each milestone index, summing weights when
/// two roles land on the same index, then split the remainder evenly over
/// the non-milestone indices. With no non-milestone indices the remainder
/// is split evenly over the distinct milestone indices instead.
fn milestone_shares(n: usize, milestones: &[usize], weight: f64, total_value: f64) -> Vec<f64> {
    let mut shares = vec![0.0; n];
    for &idx in milestones {
        shares[idx] += total_value * weight;
    }

    let remainder = total_value * (1.0 - weight * milestones.len() as f64);
    let (milestone_idx, others): (Vec<usize>, Vec<usize>) =
        (0..n).partition(|i| milestones.contains(i));

    let targets = if others.is_empty() { milestone_idx } else { others };
    let per_target = remainder / targets.len() as f64;
    for idx in targets {
        shares[idx] += per_target;
    }
    shares
}

fn to_credits(touchpoints: &[Touchpoint], shares: Vec<f64>) -> Credits {
    touchpoints
        .iter()
        .zip(shares)
        .map(|(tp, share)| (tp.touchpoint_id.clone(), share))
        .collect()
}
