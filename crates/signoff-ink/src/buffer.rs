use std::io::Cursor;

use png::{BitDepth, ColorType, Decoder, Encoder, Transformations};

use crate::CaptureError;

/// An opaque RGB color, used as the background key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// The conventional canvas background.
    pub const WHITE: Rgb = Rgb {
        r: 0xFF,
        g: 0xFF,
        b: 0xFF,
    };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// What to do with the canvas background when rendering a signature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackgroundPolicy {
    /// Leave per-pixel alpha exactly as drawn (transparent-canvas UIs).
    #[default]
    Keep,
    /// Force alpha to zero for every pixel whose RGB equals the key color.
    ///
    /// The match is exact, so strokes drawn in the key color itself are
    /// keyed out too. That is a documented limitation of this mode, not
    /// something we try to repair.
    KeyOut(Rgb),
}

/// A row-major RGBA8 pixel buffer as produced by the drawing canvas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw RGBA bytes, validating the buffer shape.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self, CaptureError> {
        if width == 0 || height == 0 {
            return Err(CaptureError::EmptyDimensions);
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|px| px.checked_mul(4))
            .ok_or(CaptureError::EmptyDimensions)?;
        if data.len() != expected {
            return Err(CaptureError::BufferSize {
                width,
                height,
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Decode a PNG (any of gray / gray+alpha / RGB / RGBA, up to 16-bit)
    /// into an RGBA8 buffer. Used to drive capture from image files.
    pub fn from_png(bytes: &[u8]) -> Result<Self, CaptureError> {
        let mut decoder = Decoder::new(Cursor::new(bytes));
        decoder.set_transformations(Transformations::normalize_to_color8());
        let mut reader = decoder.read_info()?;
        let mut buf = vec![0u8; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf)?;
        buf.truncate(info.buffer_size());

        if info.bit_depth != BitDepth::Eight {
            return Err(CaptureError::UnsupportedPng("bit depth"));
        }

        let rgba = match info.color_type {
            ColorType::Rgba => buf,
            ColorType::Rgb => buf
                .chunks_exact(3)
                .flat_map(|px| [px[0], px[1], px[2], 0xFF])
                .collect(),
            ColorType::Grayscale => buf
                .iter()
                .flat_map(|&g| [g, g, g, 0xFF])
                .collect(),
            ColorType::GrayscaleAlpha => buf
                .chunks_exact(2)
                .flat_map(|px| [px[0], px[0], px[0], px[1]])
                .collect(),
            ColorType::Indexed => return Err(CaptureError::UnsupportedPng("indexed palette")),
        };

        Self::from_rgba(info.width, info.height, rgba)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_rgba(&self) -> &[u8] {
        &self.data
    }

    fn pixels(&self) -> impl Iterator<Item = &[u8]> {
        self.data.chunks_exact(4)
    }

    /// Whether the buffer contains any visible stroke under `policy`.
    ///
    /// A pixel is background when it is fully transparent, or (under
    /// [`BackgroundPolicy::KeyOut`]) when its RGB equals the key color.
    pub fn is_blank(&self, policy: BackgroundPolicy) -> bool {
        self.pixels().all(|px| {
            if px[3] == 0 {
                return true;
            }
            match policy {
                BackgroundPolicy::Keep => false,
                BackgroundPolicy::KeyOut(key) => px[0] == key.r && px[1] == key.g && px[2] == key.b,
            }
        })
    }
}

/// Render a captured canvas buffer into PNG bytes, applying the background
/// policy.
///
/// Fails with [`CaptureError::EmptyCanvas`] when no strokes were drawn;
/// callers must surface this and must not register the signature.
pub fn render_signature(
    buffer: &PixelBuffer,
    policy: BackgroundPolicy,
) -> Result<Vec<u8>, CaptureError> {
    if buffer.is_blank(policy) {
        return Err(CaptureError::EmptyCanvas);
    }

    let mut rgba = buffer.data.clone();
    if let BackgroundPolicy::KeyOut(key) = policy {
        for px in rgba.chunks_exact_mut(4) {
            if px[0] == key.r && px[1] == key.g && px[2] == key.b {
                px[3] = 0;
            }
        }
    }

    encode_rgba_png(buffer.width, buffer.height, &rgba)
}

/// RGBA8 -> PNG bytes. Deterministic for identical input.
fn encode_rgba_png(width: u32, height: u32, rgba: &[u8]) -> Result<Vec<u8>, CaptureError> {
    let mut out = Vec::new();
    {
        let mut encoder = Encoder::new(&mut out, width, height);
        encoder.set_color(ColorType::Rgba);
        encoder.set_depth(BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(rgba)?;
    }
    Ok(out)
}
