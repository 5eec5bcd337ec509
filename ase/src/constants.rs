pub const FILE_MAGIC: u16 = 0xA5E0;
pub const FRAME_MAGIC: u16 = 0xF1FA;

pub const FILE_HEADER_SIZE: usize = 128;
pub const FRAME_HEADER_SIZE: usize = 16;
// Size:DWORD + Type:WORD
pub const CHUNK_HEADER_SIZE: usize = 6;

pub const CHUNK_OLD_PALETTE: u16 = 0x0004;
pub const CHUNK_OLD_PALETTE_6BIT: u16 = 0x0011;
pub const CHUNK_LAYER: u16 = 0x2004;
pub const CHUNK_CEL: u16 = 0x2005;
pub const CHUNK_CEL_EXTRA: u16 = 0x2006;
pub const CHUNK_COLOR_PROFILE: u16 = 0x2007;
pub const CHUNK_EXTERNAL_FILES: u16 = 0x2008;
pub const CHUNK_TAGS: u16 = 0x2018;
pub const CHUNK_PALETTE: u16 = 0x2019;
pub const CHUNK_USER_DATA: u16 = 0x2020;
pub const CHUNK_SLICE: u16 = 0x2022;
pub const CHUNK_TILESET: u16 = 0x2023;

// file header Flags:DWORD
pub const HEADER_FLAG_LAYER_OPACITY_VALID: u32 = 1;
pub const HEADER_FLAG_GROUP_OPACITY_VALID: u32 = 2;
pub const HEADER_FLAG_LAYERS_HAVE_UUID: u32 = 4;

pub const LAYER_TYPE_IMAGE: u16 = 0;
pub const LAYER_TYPE_GROUP: u16 = 1;
pub const LAYER_TYPE_TILEMAP: u16 = 2;

pub const CEL_TYPE_RAW: u16 = 0;
pub const CEL_TYPE_LINKED: u16 = 1;
pub const CEL_TYPE_COMPRESSED_IMAGE: u16 = 2;
pub const CEL_TYPE_COMPRESSED_TILEMAP: u16 = 3;

pub const TILESET_FLAG_EXTERNAL_LINK: u32 = 1;
pub const TILESET_FLAG_EMBED_TILES: u32 = 2;
pub const TILESET_FLAG_EMPTY_TILE_IS_ID_0: u32 = 4;

pub const USER_DATA_FLAG_TEXT: u32 = 1;
pub const USER_DATA_FLAG_COLOR: u32 = 2;
pub const USER_DATA_FLAG_PROPERTIES: u32 = 4;

pub const SLICE_FLAG_NINE_SLICES: u32 = 1;
pub const SLICE_FLAG_PIVOT: u32 = 2;

pub const TILE_INDEX_MASK: u32 = 0x1FFF_FFFF;
pub const TILE_FLIP_X_MASK: u32 = 0x8000_0000;
pub const TILE_FLIP_Y_MASK: u32 = 0x4000_0000;
pub const TILE_ROTATE_90_MASK: u32 = 0x2000_0000;
pub const BITS_PER_TILE: u16 = 32;

pub const MAX_PALETTE_SIZE: usize = 256;
pub const DEFAULT_FRAME_DURATION_MS: u16 = 100;
// deprecated header Speed field, still written
pub const DEFAULT_SPEED_MS: u16 = 100;
