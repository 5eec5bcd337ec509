use std::{ffi::OsStr, fs::OpenOptions, io::Write, path::Path};

use image::RgbaImage;

use crate::error::AseError;
use crate::parser::parse_sprite;
use crate::types::{ColorMode, Image, Palette, Sprite};

/// True for `.ase` / `.aseprite`, case-insensitive.
pub fn is_supported(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .and_then(OsStr::to_str)
        .map(|ext| ext.eq_ignore_ascii_case("ase") || ext.eq_ignore_ascii_case("aseprite"))
        .unwrap_or(false)
}

impl Sprite {
    pub fn open_from_bytes(i: &[u8]) -> Result<Sprite, AseError> {
        parse_sprite(i)
    }

    /// Rejects unrecognised extensions, records the source path on
    /// the sprite and marks it clean.
    pub fn open_from_file(path: impl AsRef<Path>) -> Result<Sprite, AseError> {
        let path = path.as_ref();

        if !is_supported(path) {
            return Err(AseError::UnsupportedFormat {
                extension: path
                    .extension()
                    .and_then(OsStr::to_str)
                    .unwrap_or("")
                    .to_string(),
            });
        }

        let bytes = std::fs::read(path)?;
        let mut sprite = Self::open_from_bytes(&bytes)?;

        sprite.set_path_clean(path.to_path_buf());

        Ok(sprite)
    }

    /// Records the destination path and marks the sprite clean once
    /// the bytes hit the disk.
    pub fn write_to_file(&mut self, path: impl AsRef<Path>) -> Result<(), AseError> {
        let bytes = self.write_to_bytes()?;
        let path = path.as_ref();

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        file.write_all(&bytes)?;
        file.flush()?;

        self.set_path_clean(path.to_path_buf());

        Ok(())
    }
}

impl Image {
    /// Expands the buffer to RGBA for inspection. Indexed pixels go
    /// through the palette, with `transparent_index` mapping to fully
    /// transparent; `None` for tilemap images or a palette miss.
    pub fn to_rgba8(
        &self,
        palette: &Palette,
        transparent_index: Option<u8>,
    ) -> Option<RgbaImage> {
        let mut out = RgbaImage::new(self.width() as u32, self.height() as u32);

        match self.color_mode() {
            ColorMode::Rgba => {
                for (at, pixel) in out.pixels_mut().enumerate() {
                    let bytes = &self.data()[at * 4..at * 4 + 4];
                    *pixel = image::Rgba([bytes[0], bytes[1], bytes[2], bytes[3]]);
                }
            }
            ColorMode::Grayscale => {
                for (at, pixel) in out.pixels_mut().enumerate() {
                    let value = self.data()[at * 2];
                    let alpha = self.data()[at * 2 + 1];
                    *pixel = image::Rgba([value, value, value, alpha]);
                }
            }
            ColorMode::Indexed => {
                for (at, pixel) in out.pixels_mut().enumerate() {
                    let index = self.data()[at];

                    let rgba = if Some(index) == transparent_index {
                        [0, 0, 0, 0]
                    } else {
                        let color = palette.color(index as usize)?;
                        [color.r, color.g, color.b, color.a]
                    };

                    *pixel = image::Rgba(rgba);
                }
            }
            ColorMode::Tilemap => return None,
        }

        Some(out)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn supported_extensions() {
        assert!(is_supported("sprite.ase"));
        assert!(is_supported("sprite.aseprite"));
        assert!(is_supported("SPRITE.ASEPRITE"));
        assert!(!is_supported("sprite.png"));
        assert!(!is_supported("sprite"));
        assert!(!is_supported("ase"));
    }

    #[test]
    fn indexed_export_uses_palette() {
        let mut palette = Palette::new(0, 2);
        palette.set_color(0, crate::types::Rgba32::new(0, 0, 0, 255));
        palette.set_color(1, crate::types::Rgba32::new(255, 0, 0, 255));

        let image = Image::from_data(2, 1, ColorMode::Indexed, vec![1, 0]).unwrap();
        let rgba = image.to_rgba8(&palette, Some(0)).unwrap();

        assert_eq!(rgba.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(rgba.get_pixel(1, 0).0, [0, 0, 0, 0]);
    }
}
