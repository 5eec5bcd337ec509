use crate::error::AseError;

/// Pixel encoding of a [`Image`] buffer.
///
/// `Tilemap` cells are 32-bit tile references, not colors; see
/// [`crate::TileRef`] for the bit layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    Rgba,
    Grayscale,
    Indexed,
    Tilemap,
}

impl ColorMode {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            ColorMode::Rgba | ColorMode::Tilemap => 4,
            ColorMode::Grayscale => 2,
            ColorMode::Indexed => 1,
        }
    }

    /// Maps the file header's ColorDepth word. Tilemap is not a
    /// canvas mode and has no depth value.
    pub fn from_color_depth(bits: u16) -> Option<ColorMode> {
        match bits {
            32 => Some(ColorMode::Rgba),
            16 => Some(ColorMode::Grayscale),
            8 => Some(ColorMode::Indexed),
            _ => None,
        }
    }

    pub fn color_depth(&self) -> u16 {
        match self {
            ColorMode::Rgba | ColorMode::Tilemap => 32,
            ColorMode::Grayscale => 16,
            ColorMode::Indexed => 8,
        }
    }
}

/// A rectangular pixel buffer. Row-major, top-down, exactly
/// `width * height * bytes_per_pixel` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: u16,
    height: u16,
    color_mode: ColorMode,
    data: Vec<u8>,
}

impl Image {
    /// Zero-filled image. Dimensions must be positive.
    pub fn new(width: u16, height: u16, color_mode: ColorMode) -> Result<Image, AseError> {
        if width == 0 || height == 0 {
            return Err(AseError::InvalidData {
                detail: format!("image dimensions must be positive, got {}x{}", width, height),
            });
        }

        let len = width as usize * height as usize * color_mode.bytes_per_pixel();

        Ok(Image {
            width,
            height,
            color_mode,
            data: vec![0; len],
        })
    }

    pub fn from_data(
        width: u16,
        height: u16,
        color_mode: ColorMode,
        data: Vec<u8>,
    ) -> Result<Image, AseError> {
        if width == 0 || height == 0 {
            return Err(AseError::InvalidData {
                detail: format!("image dimensions must be positive, got {}x{}", width, height),
            });
        }

        let expected = width as usize * height as usize * color_mode.bytes_per_pixel();

        if data.len() != expected {
            return Err(AseError::InvalidData {
                detail: format!(
                    "pixel buffer is {} bytes, expected {} for {}x{}",
                    data.len(),
                    expected,
                    width,
                    height
                ),
            });
        }

        Ok(Image {
            width,
            height,
            color_mode,
            data,
        })
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn color_mode(&self) -> ColorMode {
        self.color_mode
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Reads one 32-bit tile cell. Only meaningful in Tilemap mode.
    pub fn cell(&self, x: u16, y: u16) -> Option<u32> {
        if self.color_mode != ColorMode::Tilemap || x >= self.width || y >= self.height {
            return None;
        }

        let at = (y as usize * self.width as usize + x as usize) * 4;
        let bytes = [
            self.data[at],
            self.data[at + 1],
            self.data[at + 2],
            self.data[at + 3],
        ];

        Some(u32::from_le_bytes(bytes))
    }

    pub fn set_cell(&mut self, x: u16, y: u16, cell: u32) -> bool {
        if self.color_mode != ColorMode::Tilemap || x >= self.width || y >= self.height {
            return false;
        }

        let at = (y as usize * self.width as usize + x as usize) * 4;
        self.data[at..at + 4].copy_from_slice(&cell.to_le_bytes());

        true
    }
}
