// =============================================================================
// Moving Averages — cumulative SMA and index-decaying EMA
// =============================================================================
//
// Both series are aligned with the input: output[i] belongs to closes[i].
//
// SMA[i] = mean(closes[0..=i])            (cumulative, not windowed)
// EMA[i] = EMA[i-1] + (close_i - EMA[i-1]) * 2 / (i + 1)
//
// The EMA multiplier shrinks with the index instead of being fixed by a
// period. Element 0 of both series is pinned to 0.0.
// =============================================================================

/// Cumulative mean of `closes`, with element 0 pinned to 0.0.
pub fn cumulative_sma(closes: &[f64]) -> Vec<f64> {
    let mut result = Vec::with_capacity(closes.len());
    let mut sum = 0.0;

    for (i, &close) in closes.iter().enumerate() {
        sum += close;
        if i == 0 {
            result.push(0.0);
        } else {
            result.push(sum / (i + 1) as f64);
        }
    }

    result
}

/// Exponential average whose smoothing multiplier is `2 / (i + 1)`, with
/// element 0 pinned to 0.0.
pub fn decaying_ema(closes: &[f64]) -> Vec<f64> {
    let mut result = Vec::with_capacity(closes.len());
    if closes.is_empty() {
        return result;
    }

    result.push(0.0);
    let mut prev = 0.0;
    for (i, &close) in closes.iter().enumerate().skip(1) {
        let multiplier = 2.0 / (i as f64 + 1.0);
        let ema = (close - prev) * multiplier + prev;
        result.push(ema);
        prev = ema;
    }

    result
}
