//! Palette preview: every color of a palette laid out as one continuous horizontal gradient.

use std::path::Path;

use anyhow::Context as _;

use crate::foundation::core::{Canvas, Frame, FrameIndex, Rgba8};
use crate::foundation::error::{ColorRunError, ColorRunResult};
use crate::foundation::math::mix;

/// Render `colors` as a strip `segment_width * colors.len()` pixels wide.
///
/// The strip is split into `colors.len() - 1` equal segments, each blending one color into the
/// next.
pub fn render_strip(colors: &[Rgba8], segment_width: u32, height: u32) -> ColorRunResult<Frame> {
    if colors.len() < 2 {
        return Err(ColorRunError::validation(
            "a reference gradient needs at least two colors",
        ));
    }
    let width = segment_width
        .checked_mul(colors.len() as u32)
        .ok_or_else(|| ColorRunError::validation("reference gradient too wide"))?;
    let canvas = Canvas::new(width, height)?;
    let seg = (width as usize).div_ceil(colors.len() - 1);

    let mut row = Vec::with_capacity(canvas.row_bytes());
    for x in 0..width as usize {
        let s = (x / seg).min(colors.len() - 2);
        let ratio = (x - s * seg) as f32 / seg as f32;
        row.extend_from_slice(&mix(colors[s], colors[s + 1], ratio).to_bytes());
    }
    Ok(Frame::render(FrameIndex(0), canvas, |buf| {
        for dst in buf.chunks_exact_mut(row.len()) {
            dst.copy_from_slice(&row);
        }
    }))
}

/// Render and save a reference strip as PNG.
pub fn write_strip_png(
    path: &Path,
    colors: &[Rgba8],
    segment_width: u32,
    height: u32,
) -> ColorRunResult<()> {
    let frame = render_strip(colors, segment_width, height)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    let canvas = frame.canvas();
    image::save_buffer_with_format(
        path,
        frame.data(),
        canvas.width,
        canvas.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", path.display()))?;
    Ok(())
}
