use serde::{Deserialize, Serialize};

/// EMUs (English Metric Units) per CSS pixel at 96 DPI, the unit DrawingML
/// anchors use for picture extents.
pub const EMU_PER_PIXEL: u64 = 9_525;

/// Display geometry for an embedded signature image.
///
/// The observed deployments disagree on the exact numbers (one uses 30x17,
/// another 19x35 with taller rows), so these are parameters rather than
/// constants; the defaults follow the first variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignatureDisplay {
    /// Displayed image width in pixels.
    pub width_px: u32,
    /// Displayed image height in pixels.
    pub height_px: u32,
    /// Height in points applied to each row that receives a signature.
    pub row_height: f64,
}

impl SignatureDisplay {
    pub fn width_emu(&self) -> u64 {
        u64::from(self.width_px) * EMU_PER_PIXEL
    }

    pub fn height_emu(&self) -> u64 {
        u64::from(self.height_px) * EMU_PER_PIXEL
    }
}

impl Default for SignatureDisplay {
    fn default() -> Self {
        Self {
            width_px: 30,
            height_px: 17,
            row_height: 15.0,
        }
    }
}
