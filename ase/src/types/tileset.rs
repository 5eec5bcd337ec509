use crate::constants::{
    TILE_FLIP_X_MASK, TILE_FLIP_Y_MASK, TILE_INDEX_MASK, TILE_ROTATE_90_MASK,
};
use crate::error::AseError;
use crate::types::{ColorMode, Image, UserData};

bitflags::bitflags! {
    /// Orientation bits of a 32-bit tile cell.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TileFlags: u32 {
        const FLIP_X = TILE_FLIP_X_MASK;
        const FLIP_Y = TILE_FLIP_Y_MASK;
        const ROTATE_90 = TILE_ROTATE_90_MASK;
    }
}

/// One tilemap cell: tile index in the low 29 bits, orientation in
/// the high 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRef {
    pub index: u32,
    pub flags: TileFlags,
}

impl TileRef {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            flags: TileFlags::empty(),
        }
    }

    pub fn with_flags(index: u32, flags: TileFlags) -> Self {
        Self { index, flags }
    }

    pub fn encode(&self) -> u32 {
        (self.index & TILE_INDEX_MASK) | self.flags.bits()
    }

    pub fn decode(cell: u32) -> Self {
        Self {
            index: cell & TILE_INDEX_MASK,
            flags: TileFlags::from_bits_truncate(cell),
        }
    }
}

/// Fixed-size tile dictionary. Tile 0 is the reserved empty tile: it
/// is seeded by the constructor and can never be removed or replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct Tileset {
    pub name: String,
    tile_width: u16,
    tile_height: u16,
    color_mode: ColorMode,
    pub base_index: i16,
    pub user_data: UserData,
    tiles: Vec<Image>,
}

impl Tileset {
    pub fn new(
        name: impl Into<String>,
        tile_width: u16,
        tile_height: u16,
        color_mode: ColorMode,
    ) -> Result<Self, AseError> {
        let empty = Image::new(tile_width, tile_height, color_mode)?;

        Ok(Self {
            name: name.into(),
            tile_width,
            tile_height,
            color_mode,
            base_index: 1,
            user_data: UserData::default(),
            tiles: vec![empty],
        })
    }

    /// Builds a tileset from decoded tiles. An empty list still gets
    /// the reserved empty tile; every image must match the declared
    /// size and mode.
    pub fn from_tiles(
        name: impl Into<String>,
        tile_width: u16,
        tile_height: u16,
        color_mode: ColorMode,
        tiles: Vec<Image>,
    ) -> Result<Self, AseError> {
        let mut tileset = Self::new(name, tile_width, tile_height, color_mode)?;

        for (index, tile) in tiles.into_iter().enumerate() {
            tileset.check_tile(&tile)?;

            if index == 0 {
                tileset.tiles[0] = tile;
            } else {
                tileset.tiles.push(tile);
            }
        }

        Ok(tileset)
    }

    fn check_tile(&self, tile: &Image) -> Result<(), AseError> {
        if tile.width() != self.tile_width
            || tile.height() != self.tile_height
            || tile.color_mode() != self.color_mode
        {
            return Err(AseError::InvalidData {
                detail: format!(
                    "tile is {}x{}, tileset wants {}x{}",
                    tile.width(),
                    tile.height(),
                    self.tile_width,
                    self.tile_height
                ),
            });
        }

        Ok(())
    }

    pub fn tile_width(&self) -> u16 {
        self.tile_width
    }

    pub fn tile_height(&self) -> u16 {
        self.tile_height
    }

    pub fn color_mode(&self) -> ColorMode {
        self.color_mode
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        // the reserved empty tile is always present
        false
    }

    pub fn tile(&self, index: usize) -> Option<&Image> {
        self.tiles.get(index)
    }

    pub fn tiles(&self) -> &[Image] {
        &self.tiles
    }

    /// Appends a tile, returning its index.
    pub fn add_tile(&mut self, tile: Image) -> Result<usize, AseError> {
        self.check_tile(&tile)?;
        self.tiles.push(tile);

        Ok(self.tiles.len() - 1)
    }

    /// Replaces a tile in place. Tile 0 is reserved and rejected.
    pub fn replace_tile(&mut self, index: usize, tile: Image) -> Result<(), AseError> {
        if index == 0 {
            return Err(AseError::InvalidData {
                detail: "tile 0 is the reserved empty tile".to_string(),
            });
        }

        self.check_tile(&tile)?;

        let Some(slot) = self.tiles.get_mut(index) else {
            return Err(AseError::InvalidData {
                detail: format!("no tile at index {}", index),
            });
        };

        *slot = tile;

        Ok(())
    }
}
