//! One-dimensional density profiles: smoothing and peak/valley search.

/// Moving average with a `window`-wide box kernel, zero-padded at both ends
/// and centred like a "same"-mode convolution. Windows of 0 or 1 copy the
/// input.
pub fn smooth(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    if window <= 1 {
        return values.to_vec();
    }
    let offset = (window - 1) / 2;
    (0..n)
        .map(|i| {
            let end = i + offset; // inclusive
            let start = end as isize - (window as isize - 1);
            (start.max(0) as usize..=end.min(n - 1))
                .map(|j| values[j])
                .sum::<f64>()
                / window as f64
        })
        .collect()
}

pub fn to_f64(profile: &[u32]) -> Vec<f64> {
    profile.iter().map(|&v| v as f64).collect()
}

pub fn max_value(values: &[f64]) -> f64 {
    values.iter().copied().fold(0.0, f64::max)
}

/// Filters applied to candidate peaks, in the order height, distance,
/// prominence.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PeakCriteria {
    /// Minimum peak value.
    pub height: Option<f64>,
    /// Minimum index separation between kept peaks; taller peaks win.
    pub distance: Option<usize>,
    /// Minimum prominence above the higher of the two surrounding bases.
    pub prominence: Option<f64>,
}

/// Indices of local maxima of `signal` that pass `criteria`, ascending.
///
/// Flat-topped maxima report their middle sample (rounded down). The first
/// and last samples are never peaks.
pub fn find_peaks(signal: &[f64], criteria: &PeakCriteria) -> Vec<usize> {
    let mut peaks = local_maxima(signal);

    if let Some(height) = criteria.height {
        peaks.retain(|&p| signal[p] >= height);
    }
    if let Some(distance) = criteria.distance {
        peaks = select_by_distance(signal, &peaks, distance);
    }
    if let Some(min_prominence) = criteria.prominence {
        peaks.retain(|&p| prominence(signal, p) >= min_prominence);
    }
    peaks
}

/// Valleys of `signal` found as peaks of its reflection `max - signal`.
pub fn find_valleys(signal: &[f64], criteria: &PeakCriteria) -> Vec<usize> {
    let top = max_value(signal);
    let inverted: Vec<f64> = signal.iter().map(|v| top - v).collect();
    find_peaks(&inverted, criteria)
}

fn local_maxima(signal: &[f64]) -> Vec<usize> {
    let n = signal.len();
    let mut peaks = Vec::new();
    if n < 3 {
        return peaks;
    }
    let mut i = 1;
    while i < n - 1 {
        if signal[i - 1] < signal[i] {
            let mut ahead = i + 1;
            while ahead < n - 1 && signal[ahead] == signal[i] {
                ahead += 1;
            }
            if signal[ahead] < signal[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
                continue;
            }
        }
        i += 1;
    }
    peaks
}

fn select_by_distance(signal: &[f64], peaks: &[usize], distance: usize) -> Vec<usize> {
    if distance <= 1 || peaks.len() < 2 {
        return peaks.to_vec();
    }
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| signal[peaks[a]].total_cmp(&signal[peaks[b]]));

    let mut keep = vec![true; peaks.len()];
    for &i in order.iter().rev() {
        if !keep[i] {
            continue;
        }
        let mut j = i;
        while j > 0 && peaks[i] - peaks[j - 1] < distance {
            keep[j - 1] = false;
            j -= 1;
        }
        let mut j = i + 1;
        while j < peaks.len() && peaks[j] - peaks[i] < distance {
            keep[j] = false;
            j += 1;
        }
    }
    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, k)| k.then_some(p))
        .collect()
}

/// Height of the peak above the higher of its two bases, where each base is
/// the lowest point before the signal rises above the peak (or ends).
pub fn prominence(signal: &[f64], peak: usize) -> f64 {
    let top = signal[peak];

    let mut left_min = top;
    for &v in signal[..=peak].iter().rev() {
        if v > top {
            break;
        }
        left_min = left_min.min(v);
    }
    let mut right_min = top;
    for &v in &signal[peak..] {
        if v > top {
            break;
        }
        right_min = right_min.min(v);
    }
    top - left_min.max(right_min)
}
