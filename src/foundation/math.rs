use crate::foundation::core::Rgba8;

/// Blend two colors channel by channel: `a * (1 - ratio) + b * ratio`, truncated to `u8`.
///
/// All arithmetic is single precision. `ratio` is not clamped; callers keep it in `[0, 1]`.
/// Equal channels are passed through untouched so a color mixed with itself never drifts.
pub fn mix(a: Rgba8, b: Rgba8, ratio: f32) -> Rgba8 {
    let ch = |x: u8, y: u8| {
        if x == y {
            return x;
        }
        (f32::from(x) * (1.0 - ratio) + f32::from(y) * ratio) as u8
    };
    Rgba8 {
        r: ch(a.r, b.r),
        g: ch(a.g, b.g),
        b: ch(a.b, b.b),
        a: ch(a.a, b.a),
    }
}

/// Position of `pos` between `min` and `max`, clamped to `[0, 1]`.
pub fn lerp_pos(min: i64, max: i64, pos: i64) -> f32 {
    if max == min {
        return if pos >= max { 1.0 } else { 0.0 };
    }
    let v = (pos - min) as f32 / (max - min) as f32;
    v.clamp(0.0, 1.0)
}

/// Mix ratio for `frame` of a `transition_frames`-long transition: `frame / transition_frames`.
///
/// Lies in `[0, 1)`; the last sampled ratio is `(n - 1) / n`.
pub fn transition_ratio(frame: usize, transition_frames: usize) -> f32 {
    frame as f32 / transition_frames as f32
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
