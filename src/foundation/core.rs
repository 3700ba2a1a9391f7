use crate::foundation::error::{ColorRunError, ColorRunResult};

/// Straight-alpha RGBA8 color.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    /// Build a color from its four channels.
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Fully opaque color from an `[r, g, b]` triple, as the palette API reports them.
    pub const fn opaque(rgb: [u8; 3]) -> Self {
        Self::new(rgb[0], rgb[1], rgb[2], 255)
    }

    /// Color channels without alpha.
    pub const fn rgb(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Bytes in R, G, B, A order.
    pub const fn to_bytes(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Absolute 0-based frame sequence index.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize,
    serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

impl FrameIndex {
    /// The following frame index.
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Output image dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    /// Build and validate a canvas.
    pub fn new(width: u32, height: u32) -> ColorRunResult<Self> {
        let canvas = Self { width, height };
        canvas.validate()?;
        Ok(canvas)
    }

    /// Reject zero-sized canvases.
    pub fn validate(&self) -> ColorRunResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ColorRunError::validation(
                "canvas width/height must be non-zero",
            ));
        }
        Ok(())
    }

    /// Bytes in one RGBA8 row.
    pub fn row_bytes(&self) -> usize {
        self.width as usize * 4
    }

    /// Size of one raw RGBA8 frame: `width * height * 4`.
    pub fn frame_bytes(&self) -> usize {
        self.row_bytes() * self.height as usize
    }
}

/// One synthesized output image.
///
/// Immutable once built; the pixel buffer is always exactly `width * height * 4` bytes of
/// row-major RGBA8.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    index: FrameIndex,
    canvas: Canvas,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap an existing buffer, which must be exactly `canvas.frame_bytes()` long.
    pub fn new(index: FrameIndex, canvas: Canvas, data: Vec<u8>) -> ColorRunResult<Self> {
        if data.len() != canvas.frame_bytes() {
            return Err(ColorRunError::validation(format!(
                "frame data size mismatch: got {} bytes, expected {}",
                data.len(),
                canvas.frame_bytes()
            )));
        }
        Ok(Self {
            index,
            canvas,
            data,
        })
    }

    /// Allocate a correctly sized buffer and let `fill` write the pixels.
    pub fn render(index: FrameIndex, canvas: Canvas, fill: impl FnOnce(&mut [u8])) -> Self {
        let mut data = vec![0u8; canvas.frame_bytes()];
        fill(&mut data);
        Self {
            index,
            canvas,
            data,
        }
    }

    /// Frame where every pixel is `color`.
    pub fn solid(index: FrameIndex, canvas: Canvas, color: Rgba8) -> Self {
        let data = color.to_bytes().repeat(canvas.width as usize * canvas.height as usize);
        Self {
            index,
            canvas,
            data,
        }
    }

    /// Position of this frame in the output sequence.
    pub fn index(&self) -> FrameIndex {
        self.index
    }

    /// Frame dimensions.
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Row-major RGBA8 pixel bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Color at `(x, y)`, or `None` outside the canvas.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba8> {
        if x >= self.canvas.width || y >= self.canvas.height {
            return None;
        }
        let i = (y as usize * self.canvas.width as usize + x as usize) * 4;
        Some(Rgba8::new(
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ))
    }
}
