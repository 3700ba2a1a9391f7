use rayon::prelude::*;

use crate::foundation::core::{Canvas, Rgba8};
use crate::foundation::math::{mix, transition_ratio};
use crate::synth::TransitionStrategy;

/// Uniform fill that fades from `left` to `right` over the transition.
#[derive(Clone, Copy, Debug, Default)]
pub struct GradientFill;

impl TransitionStrategy for GradientFill {
    fn window_len(&self) -> usize {
        2
    }

    fn render(
        &self,
        window: &[Rgba8],
        frame: usize,
        transition_frames: usize,
        canvas: Canvas,
        out: &mut [u8],
    ) {
        let color = mix(
            window[0],
            window[1],
            transition_ratio(frame, transition_frames),
        );
        fill_solid(out, canvas, color);
    }
}

pub(crate) fn fill_solid(out: &mut [u8], canvas: Canvas, color: Rgba8) {
    let px = color.to_bytes();
    out.par_chunks_mut(canvas.row_bytes()).for_each(|row| {
        for dst in row.chunks_exact_mut(4) {
            dst.copy_from_slice(&px);
        }
    });
}
