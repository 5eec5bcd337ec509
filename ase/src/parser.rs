use std::collections::VecDeque;
use std::io::Read;

use nom::{
    bytes::complete::take,
    combinator::{cond, map},
    number::complete::{le_i16, le_i32, le_u16, le_u32, le_u8},
    sequence::{pair, tuple},
    IResult as _IResult,
};
use tracing::{debug, warn};

use crate::constants::*;
use crate::error::AseError;
use crate::types::{
    AniDir, BlendMode, Cel, CelContent, CelData, ColorMode, Grid, GroupLayer, Image, ImageLayer,
    Layer, LayerFlags, PixelRatio, Rgba32, Slice, SliceCenter, SliceKey, SlicePivot, Sprite, Tag,
    TilemapLayer, Tileset, UserData,
};

type IResult<'a, T> = _IResult<&'a [u8], T, AseError>;

impl<'a> nom::error::ParseError<&'a [u8]> for AseError {
    // complete parsers only land here when the input runs short
    fn from_error_kind(_input: &'a [u8], _kind: nom::error::ErrorKind) -> Self {
        AseError::UnexpectedEof
    }

    fn append(_input: &'a [u8], _kind: nom::error::ErrorKind, other: Self) -> Self {
        other
    }
}

/// Unwraps a leaf parser result for the imperative chunk walker.
fn run<'a, T>(result: IResult<'a, T>) -> Result<(&'a [u8], T), AseError> {
    result.map_err(|err| match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => e,
        nom::Err::Incomplete(_) => AseError::UnexpectedEof,
    })
}

fn tail(file: &[u8], offset: usize) -> Result<&[u8], AseError> {
    file.get(offset..).ok_or(AseError::UnexpectedEof)
}

/// WORD length + UTF-8 bytes, no terminator.
fn string(i: &[u8]) -> IResult<String> {
    let (i, len) = le_u16(i)?;
    let (i, bytes) = take(len as usize)(i)?;

    match std::str::from_utf8(bytes) {
        Ok(s) => Ok((i, s.to_string())),
        Err(_) => Err(nom::Err::Failure(AseError::InvalidData {
            detail: "malformed UTF-8 in string".to_string(),
        })),
    }
}

fn rgba(i: &[u8]) -> IResult<Rgba32> {
    map(tuple((le_u8, le_u8, le_u8, le_u8)), |(r, g, b, a)| {
        Rgba32::new(r, g, b, a)
    })(i)
}

/// 16.16 signed fixed point.
fn fixed(i: &[u8]) -> IResult<f64> {
    map(le_i32, |raw| raw as f64 / 65536.0)(i)
}

/// Fills `expected_len` bytes from a zlib stream; a short stream is
/// tolerated and leaves the remainder zeroed.
fn inflate(compressed: &[u8], expected_len: usize) -> Result<Vec<u8>, AseError> {
    let mut out = vec![0u8; expected_len];
    let mut decoder = flate2::read::ZlibDecoder::new(compressed);
    let mut filled = 0;

    while filled < expected_len {
        match decoder.read(&mut out[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) => {
                return Err(AseError::InvalidData {
                    detail: format!("zlib: {}", err),
                })
            }
        }
    }

    Ok(out)
}

struct RawHeader {
    frame_count: u16,
    width: u16,
    height: u16,
    color_mode: ColorMode,
    flags: u32,
    speed: u16,
    transparent_index: u8,
    pixel_width: u8,
    pixel_height: u8,
    grid_x: i16,
    grid_y: i16,
    grid_width: u16,
    grid_height: u16,
}

fn parse_header(i: &[u8]) -> IResult<RawHeader> {
    let (i, _file_size) = le_u32(i)?;
    let (i, magic) = le_u16(i)?;

    if magic != FILE_MAGIC {
        return Err(nom::Err::Failure(AseError::InvalidFileMagic {
            found: magic,
        }));
    }

    let (i, frame_count) = le_u16(i)?;
    let (i, width) = le_u16(i)?;
    let (i, height) = le_u16(i)?;
    let (i, depth) = le_u16(i)?;

    let Some(color_mode) = ColorMode::from_color_depth(depth) else {
        return Err(nom::Err::Failure(AseError::UnknownColorDepth {
            bits: depth,
        }));
    };

    let (i, flags) = le_u32(i)?;
    let (i, speed) = le_u16(i)?;
    let (i, _) = take(8usize)(i)?;
    let (i, transparent_index) = le_u8(i)?;
    let (i, _) = take(3usize)(i)?;
    // the palette's true size comes from the palette chunk, not here
    let (i, _num_colors) = le_u16(i)?;
    let (i, pixel_width) = le_u8(i)?;
    let (i, pixel_height) = le_u8(i)?;
    let (i, grid_x) = le_i16(i)?;
    let (i, grid_y) = le_i16(i)?;
    let (i, grid_width) = le_u16(i)?;
    let (i, grid_height) = le_u16(i)?;
    let (i, _) = take(84usize)(i)?;

    Ok((
        i,
        RawHeader {
            frame_count,
            width,
            height,
            color_mode,
            flags,
            speed,
            transparent_index,
            pixel_width,
            pixel_height,
            grid_x,
            grid_y,
            grid_width,
            grid_height,
        },
    ))
}

struct RawFrameHeader {
    frame_bytes: u32,
    magic: u16,
    old_chunk_count: u16,
    duration_ms: u16,
    new_chunk_count: u32,
}

fn parse_frame_header(i: &[u8]) -> IResult<RawFrameHeader> {
    let (i, frame_bytes) = le_u32(i)?;
    let (i, magic) = le_u16(i)?;
    let (i, old_chunk_count) = le_u16(i)?;
    let (i, duration_ms) = le_u16(i)?;
    let (i, _) = take(2usize)(i)?;
    let (i, new_chunk_count) = le_u32(i)?;

    Ok((
        i,
        RawFrameHeader {
            frame_bytes,
            magic,
            old_chunk_count,
            duration_ms,
            new_chunk_count,
        },
    ))
}

/// What the next User Data chunk attaches to.
enum Target {
    None,
    Layer(Vec<usize>),
    Cel(Vec<usize>, u32),
    Slice(usize),
    Tileset(usize),
}

/// State threaded across the chunk stream.
struct Decoder {
    /// Layers in on-wire order; cel chunks index into this.
    layer_paths: Vec<Vec<usize>>,
    /// Most recently seen group per depth, as tree paths.
    group_stack: Vec<Vec<usize>>,
    last_target: Target,
    /// Tags from the latest Tags chunk still waiting for user data.
    pending_tag_user_data: VecDeque<usize>,
    /// Once a new-palette chunk is seen, old-palette chunks are dead.
    found_new_palette: bool,
    layer_opacity_valid: bool,
    group_opacity_valid: bool,
}

/// Builds a [`Sprite`] from the bytes of an `.ase`/`.aseprite` file.
pub fn parse_sprite(file: &[u8]) -> Result<Sprite, AseError> {
    let (_, header) = run(parse_header(file))?;

    let mut sprite = Sprite::new(header.width, header.height, header.color_mode)?;
    sprite.transparent_index = header.transparent_index;

    if header.pixel_width > 0 && header.pixel_height > 0 {
        sprite.pixel_ratio = PixelRatio {
            width: header.pixel_width,
            height: header.pixel_height,
        };
    }

    if header.grid_width > 0 && header.grid_height > 0 {
        sprite.grid = Grid {
            x: header.grid_x,
            y: header.grid_y,
            width: header.grid_width,
            height: header.grid_height,
        };
    }

    // deprecated Speed seeds frame 0 until the frame header says better
    if header.speed > 0 {
        sprite.set_frame_duration(0, header.speed);
    }

    if header.flags & HEADER_FLAG_LAYERS_HAVE_UUID != 0 {
        // uuids trail the layer chunk body and are skipped with it
        debug!("file declares layer uuids");
    }

    let mut decoder = Decoder {
        layer_paths: vec![],
        group_stack: vec![],
        last_target: Target::None,
        pending_tag_user_data: VecDeque::new(),
        found_new_palette: false,
        layer_opacity_valid: header.flags & HEADER_FLAG_LAYER_OPACITY_VALID != 0,
        group_opacity_valid: header.flags & HEADER_FLAG_GROUP_OPACITY_VALID != 0,
    };

    let mut offset = FILE_HEADER_SIZE;

    for frame in 0..header.frame_count as u32 {
        let frame_start = offset;
        let (_, frame_header) = run(parse_frame_header(tail(file, frame_start)?))?;

        if frame_header.magic != FRAME_MAGIC {
            return Err(AseError::BadFrameMagic { frame });
        }

        if frame > 0 {
            sprite.add_frame_like_last();
        }

        if frame_header.duration_ms > 0 {
            sprite.set_frame_duration(frame, frame_header.duration_ms);
        }

        let chunk_count = if frame_header.new_chunk_count != 0 {
            frame_header.new_chunk_count
        } else if frame_header.old_chunk_count == 0xFFFF {
            // unknown; bounded by the frame size below
            u32::MAX
        } else {
            frame_header.old_chunk_count as u32
        };

        let frame_end = frame_start + frame_header.frame_bytes as usize;

        if frame_end > file.len() || (frame_header.frame_bytes as usize) < FRAME_HEADER_SIZE {
            return Err(AseError::UnexpectedEof);
        }

        let mut cursor = frame_start + FRAME_HEADER_SIZE;
        let mut chunks_read = 0u32;

        while chunks_read < chunk_count && cursor + CHUNK_HEADER_SIZE <= frame_end {
            let (_, (chunk_size, chunk_type)) = run(pair(le_u32, le_u16)(tail(file, cursor)?))?;
            let chunk_size = chunk_size as usize;

            if chunk_size < CHUNK_HEADER_SIZE {
                return Err(AseError::InvalidData {
                    detail: format!("chunk size {} is smaller than its own header", chunk_size),
                });
            }

            let body = file
                .get(cursor + CHUNK_HEADER_SIZE..cursor + chunk_size)
                .ok_or(AseError::UnexpectedEof)?;

            handle_chunk(&mut sprite, &mut decoder, chunk_type, body, frame)?;

            // seek to chunk start + size regardless of how much the
            // handler consumed
            cursor += chunk_size;
            chunks_read += 1;
        }

        offset = frame_end;
    }

    validate_linked_cels(&sprite)?;

    Ok(sprite)
}

fn handle_chunk(
    sprite: &mut Sprite,
    decoder: &mut Decoder,
    chunk_type: u16,
    body: &[u8],
    frame: u32,
) -> Result<(), AseError> {
    match chunk_type {
        CHUNK_OLD_PALETTE => handle_old_palette(sprite, decoder, body, frame, false),
        CHUNK_OLD_PALETTE_6BIT => handle_old_palette(sprite, decoder, body, frame, true),
        CHUNK_LAYER => handle_layer(sprite, decoder, body),
        CHUNK_CEL => handle_cel(sprite, decoder, body, frame),
        CHUNK_CEL_EXTRA => handle_cel_extra(body),
        CHUNK_COLOR_PROFILE | CHUNK_EXTERNAL_FILES => {
            debug!(chunk_type, "skipping chunk");
            Ok(())
        }
        CHUNK_TAGS => handle_tags(sprite, decoder, body),
        CHUNK_PALETTE => handle_palette(sprite, decoder, body, frame),
        CHUNK_USER_DATA => handle_user_data(sprite, decoder, body),
        CHUNK_SLICE => handle_slice(sprite, decoder, body),
        CHUNK_TILESET => handle_tileset(sprite, decoder, body),
        unknown => {
            debug!(chunk_type = unknown, "skipping unknown chunk");
            Ok(())
        }
    }
}

fn handle_old_palette(
    sprite: &mut Sprite,
    decoder: &Decoder,
    body: &[u8],
    frame: u32,
    six_bit: bool,
) -> Result<(), AseError> {
    if decoder.found_new_palette {
        debug!("ignoring old-palette chunk after a new-palette chunk");
        return Ok(());
    }

    let (mut i, packet_count) = run(le_u16(body))?;
    let palette = sprite.palette_at_mut_or_insert(frame);
    let mut index = 0usize;

    for _ in 0..packet_count {
        let (j, skip) = run(le_u8(i))?;
        let (j, raw_count) = run(le_u8(j))?;
        let count = if raw_count == 0 { 256 } else { raw_count as usize };

        index += skip as usize;
        i = j;

        for _ in 0..count {
            let (j, (r, g, b)) = run(tuple((le_u8, le_u8, le_u8))(i))?;

            let color = if six_bit {
                // packets store 0..63 per channel
                Rgba32::new(scale_6bit(r), scale_6bit(g), scale_6bit(b), 255)
            } else {
                Rgba32::new(r, g, b, 255)
            };

            if index >= palette.len() && index < MAX_PALETTE_SIZE {
                palette.resize(index + 1);
            }

            palette.set_color(index, color);
            index += 1;
            i = j;
        }
    }

    Ok(())
}

fn scale_6bit(channel: u8) -> u8 {
    (channel as u16 * 255 / 63) as u8
}

struct RawLayer {
    flags: u16,
    layer_type: u16,
    child_level: u16,
    blend_mode: u16,
    opacity: u8,
    name: String,
    tileset_index: Option<u32>,
}

fn parse_layer(i: &[u8]) -> IResult<RawLayer> {
    let (i, flags) = le_u16(i)?;
    let (i, layer_type) = le_u16(i)?;
    let (i, child_level) = le_u16(i)?;
    let (i, _) = take(4usize)(i)?; // default width/height, ignored
    let (i, blend_mode) = le_u16(i)?;
    let (i, opacity) = le_u8(i)?;
    let (i, _) = take(3usize)(i)?;
    let (i, name) = string(i)?;
    let (i, tileset_index) = cond(layer_type == LAYER_TYPE_TILEMAP, le_u32)(i)?;

    Ok((
        i,
        RawLayer {
            flags,
            layer_type,
            child_level,
            blend_mode,
            opacity,
            name,
            tileset_index,
        },
    ))
}

fn handle_layer(sprite: &mut Sprite, decoder: &mut Decoder, body: &[u8]) -> Result<(), AseError> {
    let (_, raw) = run(parse_layer(body))?;

    let mut layer = match raw.layer_type {
        LAYER_TYPE_IMAGE => Layer::Image(ImageLayer::new(raw.name)),
        LAYER_TYPE_GROUP => Layer::Group(GroupLayer::new(raw.name)),
        LAYER_TYPE_TILEMAP => {
            let tileset_index = raw.tileset_index.unwrap_or(0) as usize;

            let Some(tileset) = sprite.tilesets.get(tileset_index) else {
                return Err(AseError::InvalidData {
                    detail: format!(
                        "tilemap layer references tileset {} but only {} exist",
                        tileset_index,
                        sprite.tilesets.len()
                    ),
                });
            };

            let mut layer = TilemapLayer::new(raw.name, tileset_index);
            layer.grid = Grid {
                x: 0,
                y: 0,
                width: tileset.tile_width(),
                height: tileset.tile_height(),
            };

            Layer::Tilemap(layer)
        }
        unknown => {
            return Err(AseError::InvalidData {
                detail: format!("unknown layer type {}", unknown),
            })
        }
    };

    let props = layer.props_mut();
    props.flags = LayerFlags::from_bits_truncate(raw.flags);
    props.blend_mode = BlendMode::from_u16(raw.blend_mode);

    let opacity_valid = if layer.is_group() {
        decoder.group_opacity_valid
    } else {
        decoder.layer_opacity_valid
    };

    if opacity_valid {
        layer.props_mut().opacity = raw.opacity;
    }

    let is_group = layer.is_group();
    let level = raw.child_level as usize;

    decoder.group_stack.truncate(level);

    if decoder.group_stack.len() < level {
        return Err(AseError::InvalidData {
            detail: format!("layer at child level {} has no parent group", level),
        });
    }

    let path = if level == 0 {
        sprite.layers.push(layer);
        vec![sprite.layers.len() - 1]
    } else {
        let mut parent_path = decoder.group_stack[level - 1].clone();

        let Some(Layer::Group(group)) = sprite.layer_at_path_mut(&parent_path) else {
            return Err(AseError::InvalidData {
                detail: format!("layer at child level {} has no parent group", level),
            });
        };

        group.push_child(layer);
        parent_path.push(group.children.len() - 1);
        parent_path
    };

    if is_group {
        decoder.group_stack.push(path.clone());
    }

    decoder.layer_paths.push(path.clone());
    decoder.last_target = Target::Layer(path);

    Ok(())
}

struct RawCel {
    layer_index: u16,
    x: i16,
    y: i16,
    opacity: u8,
    cel_type: u16,
    z_index: i16,
}

fn parse_cel_header(i: &[u8]) -> IResult<RawCel> {
    let (i, layer_index) = le_u16(i)?;
    let (i, x) = le_i16(i)?;
    let (i, y) = le_i16(i)?;
    let (i, opacity) = le_u8(i)?;
    let (i, cel_type) = le_u16(i)?;
    let (i, z_index) = le_i16(i)?;
    let (i, _) = take(5usize)(i)?;

    Ok((
        i,
        RawCel {
            layer_index,
            x,
            y,
            opacity,
            cel_type,
            z_index,
        },
    ))
}

fn handle_cel(
    sprite: &mut Sprite,
    decoder: &mut Decoder,
    body: &[u8],
    frame: u32,
) -> Result<(), AseError> {
    let (rest, raw) = run(parse_cel_header(body))?;
    let canvas_mode = sprite.color_mode();

    let content = match raw.cel_type {
        CEL_TYPE_RAW => {
            let (pixels, (width, height)) = run(pair(le_u16, le_u16)(rest))?;
            let len =
                width as usize * height as usize * canvas_mode.bytes_per_pixel();
            let data = pixels.get(..len).ok_or(AseError::UnexpectedEof)?.to_vec();

            CelContent::Data(CelData {
                image: Image::from_data(width, height, canvas_mode, data)?,
            })
        }
        CEL_TYPE_LINKED => {
            let (_, target) = run(le_u16(rest))?;

            CelContent::Linked(target as u32)
        }
        CEL_TYPE_COMPRESSED_IMAGE => {
            let (compressed, (width, height)) = run(pair(le_u16, le_u16)(rest))?;
            let len =
                width as usize * height as usize * canvas_mode.bytes_per_pixel();
            let data = inflate(compressed, len)?;

            CelContent::Data(CelData {
                image: Image::from_data(width, height, canvas_mode, data)?,
            })
        }
        CEL_TYPE_COMPRESSED_TILEMAP => {
            let (i, (width, height)) = run(pair(le_u16, le_u16)(rest))?;
            let (i, bits_per_tile) = run(le_u16(i))?;
            // declared masks; interpretation uses the canonical ones
            let (i, _masks) = run(take(16usize)(i))?;
            let (compressed, _) = run(take(10usize)(i))?;

            if bits_per_tile != BITS_PER_TILE {
                return Err(AseError::InvalidData {
                    detail: format!("unsupported bits per tile: {}", bits_per_tile),
                });
            }

            let len = width as usize * height as usize * 4;
            let data = inflate(compressed, len)?;

            CelContent::Data(CelData {
                image: Image::from_data(width, height, ColorMode::Tilemap, data)?,
            })
        }
        unknown => {
            return Err(AseError::InvalidData {
                detail: format!("unknown cel type {}", unknown),
            })
        }
    };

    let Some(path) = decoder.layer_paths.get(raw.layer_index as usize).cloned() else {
        warn!(
            layer_index = raw.layer_index,
            "cel chunk references a layer that was never declared, dropping"
        );
        return Ok(());
    };

    let Some(layer) = sprite.layer_at_path_mut(&path) else {
        return Ok(());
    };

    if let CelContent::Data(data) = &content {
        let wants_tilemap = matches!(layer, Layer::Tilemap(_));
        let has_tilemap = data.image.color_mode() == ColorMode::Tilemap;

        if wants_tilemap != has_tilemap {
            return Err(AseError::InvalidData {
                detail: "cel pixel encoding does not match its layer".to_string(),
            });
        }
    }

    let cel = Cel {
        x: raw.x,
        y: raw.y,
        opacity: raw.opacity,
        z_index: raw.z_index,
        user_data: UserData::default(),
        content,
    };

    if !layer.set_cel(frame, cel) {
        return Err(AseError::InvalidData {
            detail: "cel chunk targets a group layer".to_string(),
        });
    }

    decoder.last_target = Target::Cel(path, frame);

    Ok(())
}

/// Read and discard: precise bounds are not kept in the model.
fn handle_cel_extra(body: &[u8]) -> Result<(), AseError> {
    let (i, _flags) = run(le_u32(body))?;
    let (i, _x) = run(fixed(i))?;
    let (i, _y) = run(fixed(i))?;
    let (i, _width) = run(fixed(i))?;
    let (_, _height) = run(fixed(i))?;
    // 16 reserved bytes follow; the dispatcher skips them

    Ok(())
}

fn parse_tag(i: &[u8]) -> IResult<Tag> {
    let (i, from_frame) = le_u16(i)?;
    let (i, to_frame) = le_u16(i)?;
    let (i, ani_dir) = le_u8(i)?;
    let (i, repeat) = le_u16(i)?;
    let (i, _) = take(6usize)(i)?;
    let (i, (r, g, b)) = tuple((le_u8, le_u8, le_u8))(i)?;
    let (i, _) = take(1usize)(i)?;
    let (i, name) = string(i)?;

    let mut tag = Tag::new(name, from_frame as u32, to_frame as u32);
    tag.ani_dir = AniDir::from_u8(ani_dir);
    tag.repeat = repeat;
    tag.color = Rgba32::new(r, g, b, 255);

    Ok((i, tag))
}

fn handle_tags(sprite: &mut Sprite, decoder: &mut Decoder, body: &[u8]) -> Result<(), AseError> {
    let (i, tag_count) = run(le_u16(body))?;
    let (mut i, _) = run(take(8usize)(i))?;

    for _ in 0..tag_count {
        let (j, tag) = run(parse_tag(i))?;

        sprite.add_tag(tag);
        decoder
            .pending_tag_user_data
            .push_back(sprite.tags.len() - 1);
        i = j;
    }

    // the next user data chunk must bind to the first tag, not to
    // whatever target came before this chunk
    decoder.last_target = Target::None;

    Ok(())
}

fn handle_palette(
    sprite: &mut Sprite,
    decoder: &mut Decoder,
    body: &[u8],
    frame: u32,
) -> Result<(), AseError> {
    let (i, new_size) = run(le_u32(body))?;
    let (i, from_index) = run(le_u32(i))?;
    let (i, to_index) = run(le_u32(i))?;
    let (mut i, _) = run(take(8usize)(i))?;

    if new_size as usize > MAX_PALETTE_SIZE {
        return Err(AseError::InvalidData {
            detail: format!("palette of {} entries", new_size),
        });
    }

    let palette = sprite.palette_at_mut_or_insert(frame);

    if palette.len() != new_size as usize {
        palette.resize(new_size as usize);
    }

    if new_size > 0 {
        for index in from_index..=to_index {
            let (j, entry_flags) = run(le_u16(i))?;
            let (j, color) = run(rgba(j))?;
            // entry names are accepted and dropped
            let (j, _name) = run(cond(entry_flags & 1 != 0, string)(j))?;

            palette.set_color(index as usize, color);
            i = j;
        }
    }

    decoder.found_new_palette = true;

    Ok(())
}

fn handle_user_data(
    sprite: &mut Sprite,
    decoder: &mut Decoder,
    body: &[u8],
) -> Result<(), AseError> {
    let (i, flags) = run(le_u32(body))?;
    let (i, text) = run(cond(flags & USER_DATA_FLAG_TEXT != 0, string)(i))?;
    let (_, color) = run(cond(flags & USER_DATA_FLAG_COLOR != 0, rgba)(i))?;

    if flags & USER_DATA_FLAG_PROPERTIES != 0 {
        // property trees are not modelled; the dispatcher skips them
        debug!("dropping user data property tree");
    }

    let user_data = UserData { text, color };

    if let Some(tag_index) = decoder.pending_tag_user_data.pop_front() {
        if let Some(tag) = sprite.tags.get_mut(tag_index) {
            tag.user_data = user_data;
        }

        return Ok(());
    }

    match &decoder.last_target {
        Target::None => {
            debug!("user data chunk with nothing to attach to, dropping");
        }
        Target::Layer(path) => {
            if let Some(layer) = sprite.layer_at_path_mut(path) {
                layer.props_mut().user_data = user_data;
            }
        }
        Target::Cel(path, frame) => {
            if let Some(cel) = sprite
                .layer_at_path_mut(path)
                .and_then(|layer| layer.cel_at_mut(*frame))
            {
                cel.user_data = user_data;
            }
        }
        Target::Slice(at) => {
            if let Some(slice) = sprite.slices.get_mut(*at) {
                slice.user_data = user_data;
            }
        }
        Target::Tileset(at) => {
            if let Some(tileset) = sprite.tilesets.get_mut(*at) {
                tileset.user_data = user_data;
            }
        }
    }

    Ok(())
}

fn handle_slice(sprite: &mut Sprite, decoder: &mut Decoder, body: &[u8]) -> Result<(), AseError> {
    let (i, key_count) = run(le_u32(body))?;
    let (i, flags) = run(le_u32(i))?;
    let (i, _) = run(take(4usize)(i))?;
    let (mut i, name) = run(string(i))?;

    let mut slice = Slice::new(name);

    for _ in 0..key_count {
        let (j, frame) = run(le_u32(i))?;
        let (j, x) = run(le_i32(j))?;
        let (j, y) = run(le_i32(j))?;
        let (j, width) = run(le_u32(j))?;
        let (j, height) = run(le_u32(j))?;

        let (j, center) = run(cond(
            flags & SLICE_FLAG_NINE_SLICES != 0,
            map(
                tuple((le_i32, le_i32, le_u32, le_u32)),
                |(x, y, width, height)| SliceCenter {
                    x,
                    y,
                    width,
                    height,
                },
            ),
        )(j))?;

        let (j, pivot) = run(cond(
            flags & SLICE_FLAG_PIVOT != 0,
            map(pair(le_i32, le_i32), |(x, y)| SlicePivot { x, y }),
        )(j))?;

        slice.add_key(SliceKey {
            frame,
            x,
            y,
            width,
            height,
            center,
            pivot,
        });

        i = j;
    }

    sprite.add_slice(slice);
    decoder.last_target = Target::Slice(sprite.slices.len() - 1);

    Ok(())
}

fn handle_tileset(sprite: &mut Sprite, decoder: &mut Decoder, body: &[u8]) -> Result<(), AseError> {
    let (i, declared_index) = run(le_u32(body))?;
    let (i, flags) = run(le_u32(i))?;
    let (i, tile_count) = run(le_u32(i))?;
    let (i, tile_width) = run(le_u16(i))?;
    let (i, tile_height) = run(le_u16(i))?;
    let (i, base_index) = run(le_i16(i))?;
    let (i, _) = run(take(14usize)(i))?;
    let (i, name) = run(string(i))?;

    // external references are accepted and dropped
    let (i, _external) = run(cond(
        flags & TILESET_FLAG_EXTERNAL_LINK != 0,
        pair(le_u32, le_u32),
    )(i))?;

    let mode = sprite.color_mode();
    let mut tiles = vec![];

    if flags & TILESET_FLAG_EMBED_TILES != 0 {
        let (i, data_len) = run(le_u32(i))?;
        let compressed = i
            .get(..data_len as usize)
            .ok_or(AseError::UnexpectedEof)?;

        let tile_len =
            tile_width as usize * tile_height as usize * mode.bytes_per_pixel();
        let data = inflate(compressed, tile_count as usize * tile_len)?;

        for tile in 0..tile_count as usize {
            tiles.push(Image::from_data(
                tile_width,
                tile_height,
                mode,
                data[tile * tile_len..(tile + 1) * tile_len].to_vec(),
            )?);
        }
    }

    let mut tileset = Tileset::from_tiles(name, tile_width, tile_height, mode, tiles)?;
    tileset.base_index = base_index;

    let at = sprite.add_tileset(tileset);

    if at != declared_index as usize {
        warn!(
            declared = declared_index,
            actual = at,
            "tileset declares an index other than its position"
        );
    }

    decoder.last_target = Target::Tileset(at);

    Ok(())
}

/// Every link must point at a data-owning cel on the same layer.
fn validate_linked_cels(sprite: &Sprite) -> Result<(), AseError> {
    for (_, layer) in sprite.flattened_layers() {
        let cels = match layer {
            Layer::Image(layer) => &layer.cels,
            Layer::Tilemap(layer) => &layer.cels,
            Layer::Group(_) => continue,
        };

        for (&frame, cel) in cels {
            let Some(target) = cel.linked_frame() else {
                continue;
            };

            if target == frame {
                return Err(AseError::InvalidData {
                    detail: format!("cel at frame {} links to itself", frame),
                });
            }

            match cels.get(&target) {
                Some(target_cel) if !target_cel.is_linked() => {}
                _ => {
                    return Err(AseError::InvalidData {
                        detail: format!(
                            "cel at frame {} links to frame {} which owns no data",
                            frame, target
                        ),
                    })
                }
            }
        }
    }

    Ok(())
}
