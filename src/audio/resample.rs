//! Sample-rate conversion by linear interpolation.

/// Resamples `input` from `source_rate` to `target_rate` by linear
/// interpolation. Zero or equal rates return the input unchanged.
pub fn to_rate(input: &[f32], source_rate: u32, target_rate: u32) -> Vec<f32> {
    if input.is_empty() || source_rate == target_rate || source_rate == 0 || target_rate == 0 {
        return input.to_vec();
    }
    let step = source_rate as f64 / target_rate as f64;
    let output_len = ((input.len() as f64) / step).round().max(1.0) as usize;
    let last = input.len() - 1;
    let mut output = Vec::with_capacity(output_len);
    let mut position = 0.0f64;
    for _ in 0..output_len {
        let index = (position.floor() as usize).min(last);
        let next = (index + 1).min(last);
        let fraction = (position - index as f64) as f32;
        output.push(input[index] * (1.0 - fraction) + input[next] * fraction);
        position += step;
    }
    output
}
