use rayon::prelude::*;

use crate::foundation::core::{Canvas, Rgba8};
use crate::foundation::math::{lerp_pos, mix};
use crate::synth::TransitionStrategy;

/// Horizontal three-stop gradient that scrolls left by one canvas width per transition.
///
/// Stops sit at `[0, W, 2W]` on the first frame and move `frame * W / transition_frames` pixels
/// left on later frames, so the middle color reaches the left edge just as the window slides.
/// One row is computed and copied to every row.
#[derive(Clone, Copy, Debug, Default)]
pub struct SlidingGradient;

impl SlidingGradient {
    fn stops(frame: usize, transition_frames: usize, width: i64) -> [i64; 3] {
        let shift = (frame as i64 * width) / transition_frames as i64;
        [-shift, width - shift, 2 * width - shift]
    }
}

impl TransitionStrategy for SlidingGradient {
    fn window_len(&self) -> usize {
        3
    }

    fn render(
        &self,
        window: &[Rgba8],
        frame: usize,
        transition_frames: usize,
        canvas: Canvas,
        out: &mut [u8],
    ) {
        let [left, middle, right] = [window[0], window[1], window[2]];
        let stops = Self::stops(frame, transition_frames, i64::from(canvas.width));

        let row_bytes = canvas.row_bytes();
        let (first, rest) = out.split_at_mut(row_bytes);
        for (x, dst) in first.chunks_exact_mut(4).enumerate() {
            let x = x as i64;
            let c = mix(left, middle, lerp_pos(stops[0], stops[1], x));
            let c = mix(c, right, lerp_pos(stops[1], stops[2], x));
            dst.copy_from_slice(&c.to_bytes());
        }
        let first: &[u8] = first;
        rest.par_chunks_mut(row_bytes)
            .for_each(|row| row.copy_from_slice(first));
    }
}
