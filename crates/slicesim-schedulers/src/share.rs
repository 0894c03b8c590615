use std::cmp::Ordering;

/// Split `total` resource blocks proportionally to `weights` using largest
/// remainders. Equal remainders go to the earlier index. Non-positive or
/// non-finite weights count as zero; if every weight is zero the split is
/// equal. The result always sums to exactly `total` (or is empty).
pub fn split_by_weights(total: u32, weights: &[f64]) -> Vec<u32> {
    if weights.is_empty() {
        return Vec::new();
    }

    let mut sane: Vec<f64> = weights
        .iter()
        .map(|&w| if w.is_finite() && w > 0.0 { w } else { 0.0 })
        .collect();
    let mut sum: f64 = sane.iter().sum();
    if sum <= 0.0 {
        sane = vec![1.0; weights.len()];
        sum = sane.len() as f64;
    }

    let mut shares = Vec::with_capacity(sane.len());
    let mut remainders = Vec::with_capacity(sane.len());
    for (idx, w) in sane.iter().enumerate() {
        let exact = total as f64 * w / sum;
        let floor = exact.floor();
        shares.push(floor as u32);
        remainders.push((exact - floor, idx));
    }

    remainders.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.1.cmp(&b.1))
    });

    let assigned: u64 = shares.iter().map(|&s| s as u64).sum();
    if assigned <= total as u64 {
        let mut left = total as u64 - assigned;
        for &(_, idx) in &remainders {
            if left == 0 {
                break;
            }
            shares[idx] += 1;
            left -= 1;
        }
    } else {
        // Float error pushed a floor over an integer boundary.
        let mut excess = assigned - total as u64;
        for &(_, idx) in remainders.iter().rev() {
            if excess == 0 {
                break;
            }
            if shares[idx] > 0 {
                shares[idx] -= 1;
                excess -= 1;
            }
        }
    }
    shares
}
