pub const STANDARD_GRAVITY: f32 = 9.80665;

/// returns air density (kg/m^3) at altitude (m)
/// approximated using a linear function from 0m and 3000m data from standard atmosphere model
pub fn approximate_air_density(altitude_asl: f32) -> f32 {
    (1.225 - altitude_asl * 0.0001053).max(0.0)
}

/// Piecewise linear lookup into an evenly spaced table covering t = 0.0 - 1.0.
/// `t` outside of that range is clamped to the first / last entry.
pub fn lerp(
    t: f32, // 0-1
    values: &[f32],
) -> f32 {
    match values.len() {
        0 => return 0.0,
        1 => return values[0],
        _ => {}
    }
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };

    let segments = values.len() - 1;
    let position = t * segments as f32;
    let i = (position as usize).min(segments - 1);

    let local_t = position - i as f32;
    (1.0 - local_t) * values[i] + local_t * values[i + 1]
}
