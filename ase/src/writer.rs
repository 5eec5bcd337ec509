use std::io::Write;

use byte_writer::ByteWriter;

use crate::constants::*;
use crate::error::AseError;
use crate::types::{Cel, CelContent, ColorMode, Layer, Palette, Slice, Sprite, Tag, Tileset, UserData};

fn append_string(writer: &mut ByteWriter, s: &str) {
    writer.append_u16(s.len() as u16);
    writer.append_u8_slice(s.as_bytes());
}

fn deflate(bytes: &[u8]) -> Result<Vec<u8>, AseError> {
    let mut encoder =
        flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());

    encoder.write_all(bytes)?;

    Ok(encoder.finish()?)
}

/// Appends the chunk header with a placeholder size, returning the
/// offset [`end_chunk`] patches.
fn begin_chunk(writer: &mut ByteWriter, chunk_type: u16) -> usize {
    let start = writer.get_offset();

    writer.append_u32(0);
    writer.append_u16(chunk_type);

    start
}

fn end_chunk(writer: &mut ByteWriter, start: usize) {
    let size = writer.get_offset() - start;

    writer.replace_with_u32(start, size as u32);
}

impl Sprite {
    /// Serialises the sprite into a fresh `.ase` byte buffer.
    pub fn write_to_bytes(&self) -> Result<Vec<u8>, AseError> {
        let mut writer = ByteWriter::new();

        writer.append_zeros(FILE_HEADER_SIZE);

        let flat = self.flattened_layers();

        for frame in 0..self.frame_count() {
            let frame_start = writer.get_offset();
            writer.append_zeros(FRAME_HEADER_SIZE);

            let mut chunk_count = 0u32;

            if frame == 0 {
                // tilesets first so layer chunks can reference them
                for (at, tileset) in self.tilesets.iter().enumerate() {
                    write_tileset_chunk(&mut writer, at, tileset)?;
                    chunk_count += 1;

                    if !tileset.user_data.is_empty() {
                        write_user_data_chunk(&mut writer, &tileset.user_data);
                        chunk_count += 1;
                    }
                }

                for &(level, layer) in &flat {
                    write_layer_chunk(&mut writer, level, layer);
                    chunk_count += 1;

                    if !layer.props().user_data.is_empty() {
                        write_user_data_chunk(&mut writer, &layer.props().user_data);
                        chunk_count += 1;
                    }
                }

                write_palette_chunk(&mut writer, self.palette_at(0));
                chunk_count += 1;

                if !self.tags.is_empty() {
                    write_tags_chunk(&mut writer, &self.tags);
                    chunk_count += 1;

                    // one user data chunk per tag, empty or not, so
                    // the decoder's pending queue stays aligned
                    for tag in &self.tags {
                        write_user_data_chunk(&mut writer, &tag.user_data);
                        chunk_count += 1;
                    }
                }

                for slice in &self.slices {
                    write_slice_chunk(&mut writer, slice);
                    chunk_count += 1;

                    if !slice.user_data.is_empty() {
                        write_user_data_chunk(&mut writer, &slice.user_data);
                        chunk_count += 1;
                    }
                }
            } else {
                for palette in self.palettes() {
                    if palette.frame == frame {
                        write_palette_chunk(&mut writer, palette);
                        chunk_count += 1;
                    }
                }
            }

            for (layer_index, _, cel) in self.cels_at(frame) {
                write_cel_chunk(&mut writer, layer_index, cel)?;
                chunk_count += 1;

                if !cel.user_data.is_empty() {
                    write_user_data_chunk(&mut writer, &cel.user_data);
                    chunk_count += 1;
                }
            }

            let frame_bytes = writer.get_offset() - frame_start;

            writer.replace_with_u32(frame_start, frame_bytes as u32);
            writer.replace_with_u16(frame_start + 4, FRAME_MAGIC);
            // 0xFFFF in the legacy count means "use the 32-bit count"
            writer.replace_with_u16(frame_start + 6, 0xFFFF);
            writer.replace_with_u16(frame_start + 8, self.frame_duration(frame));
            writer.replace_with_u32(frame_start + 12, chunk_count);
        }

        patch_file_header(&mut writer, self);

        Ok(writer.data)
    }
}

fn patch_file_header(writer: &mut ByteWriter, sprite: &Sprite) {
    let file_size = writer.get_offset();

    writer.replace_with_u32(0, file_size as u32);
    writer.replace_with_u16(4, FILE_MAGIC);
    writer.replace_with_u16(6, sprite.frame_count() as u16);
    writer.replace_with_u16(8, sprite.width());
    writer.replace_with_u16(10, sprite.height());
    writer.replace_with_u16(12, sprite.color_mode().color_depth());
    writer.replace_with_u32(
        14,
        HEADER_FLAG_LAYER_OPACITY_VALID | HEADER_FLAG_GROUP_OPACITY_VALID,
    );
    // deprecated, readers still expect it
    writer.replace_with_u16(18, DEFAULT_SPEED_MS);
    // 20..28 reserved
    writer.replace(28, 1, &[sprite.transparent_index]);
    // 29..32 padding
    writer.replace_with_u16(32, sprite.palette_at(0).len() as u16);
    writer.replace(34, 1, &[sprite.pixel_ratio.width]);
    writer.replace(35, 1, &[sprite.pixel_ratio.height]);
    writer.replace_with_u16(36, sprite.grid.x as u16);
    writer.replace_with_u16(38, sprite.grid.y as u16);
    writer.replace_with_u16(40, sprite.grid.width);
    writer.replace_with_u16(42, sprite.grid.height);
    // 44..128 reserved
}

fn write_layer_chunk(writer: &mut ByteWriter, child_level: u16, layer: &Layer) {
    let start = begin_chunk(writer, CHUNK_LAYER);
    let props = layer.props();

    writer.append_u16(props.flags.bits());

    let layer_type = match layer {
        Layer::Image(_) => LAYER_TYPE_IMAGE,
        Layer::Group(_) => LAYER_TYPE_GROUP,
        Layer::Tilemap(_) => LAYER_TYPE_TILEMAP,
    };

    writer.append_u16(layer_type);
    writer.append_u16(child_level);
    writer.append_zeros(4); // default width/height, ignored by readers
    writer.append_u16(props.blend_mode as u16);
    writer.append_u8(props.opacity);
    writer.append_zeros(3);
    append_string(writer, &props.name);

    if let Layer::Tilemap(layer) = layer {
        writer.append_u32(layer.tileset_index as u32);
    }

    end_chunk(writer, start);
}

fn write_cel_chunk(
    writer: &mut ByteWriter,
    layer_index: usize,
    cel: &Cel,
) -> Result<(), AseError> {
    let start = begin_chunk(writer, CHUNK_CEL);

    writer.append_u16(layer_index as u16);
    writer.append_i16(cel.x);
    writer.append_i16(cel.y);
    writer.append_u8(cel.opacity);

    let cel_type = match &cel.content {
        CelContent::Linked(_) => CEL_TYPE_LINKED,
        CelContent::Data(data) if data.image.color_mode() == ColorMode::Tilemap => {
            CEL_TYPE_COMPRESSED_TILEMAP
        }
        CelContent::Data(_) => CEL_TYPE_COMPRESSED_IMAGE,
    };

    writer.append_u16(cel_type);
    writer.append_i16(cel.z_index);
    writer.append_zeros(5);

    match &cel.content {
        CelContent::Linked(frame) => writer.append_u16(*frame as u16),
        CelContent::Data(data) => {
            let image = &data.image;

            writer.append_u16(image.width());
            writer.append_u16(image.height());

            if image.color_mode() == ColorMode::Tilemap {
                writer.append_u16(BITS_PER_TILE);
                writer.append_u32(TILE_INDEX_MASK);
                writer.append_u32(TILE_FLIP_X_MASK);
                writer.append_u32(TILE_FLIP_Y_MASK);
                writer.append_u32(TILE_ROTATE_90_MASK);
                writer.append_zeros(10);
            }

            writer.append_u8_slice(&deflate(image.data())?);
        }
    }

    end_chunk(writer, start);

    Ok(())
}

fn write_palette_chunk(writer: &mut ByteWriter, palette: &Palette) {
    let start = begin_chunk(writer, CHUNK_PALETTE);
    let size = palette.len() as u32;

    writer.append_u32(size);
    writer.append_u32(0);
    writer.append_u32(size.saturating_sub(1));
    writer.append_zeros(8);

    for color in palette.colors() {
        writer.append_u16(0); // no entry name
        writer.append_u8(color.r);
        writer.append_u8(color.g);
        writer.append_u8(color.b);
        writer.append_u8(color.a);
    }

    end_chunk(writer, start);
}

fn write_tags_chunk(writer: &mut ByteWriter, tags: &[Tag]) {
    let start = begin_chunk(writer, CHUNK_TAGS);

    writer.append_u16(tags.len() as u16);
    writer.append_zeros(8);

    for tag in tags {
        writer.append_u16(tag.from_frame as u16);
        writer.append_u16(tag.to_frame as u16);
        writer.append_u8(tag.ani_dir as u8);
        writer.append_u16(tag.repeat);
        writer.append_zeros(6);
        // deprecated tag color, still written
        writer.append_u8(tag.color.r);
        writer.append_u8(tag.color.g);
        writer.append_u8(tag.color.b);
        writer.append_u8(0);
        append_string(writer, &tag.name);
    }

    end_chunk(writer, start);
}

fn write_slice_chunk(writer: &mut ByteWriter, slice: &Slice) {
    let start = begin_chunk(writer, CHUNK_SLICE);

    let has_nine_slices = slice.has_nine_slices();
    let has_pivot = slice.has_pivot();

    let mut flags = 0u32;
    if has_nine_slices {
        flags |= SLICE_FLAG_NINE_SLICES;
    }
    if has_pivot {
        flags |= SLICE_FLAG_PIVOT;
    }

    writer.append_u32(slice.keys().len() as u32);
    writer.append_u32(flags);
    writer.append_zeros(4);
    append_string(writer, &slice.name);

    for key in slice.keys() {
        writer.append_u32(key.frame);
        writer.append_i32(key.x);
        writer.append_i32(key.y);
        writer.append_u32(key.width);
        writer.append_u32(key.height);

        // the slice-level flags decide the key layout; keys without
        // the feature write zeroed fields
        if has_nine_slices {
            let center = key.center.unwrap_or_default();

            writer.append_i32(center.x);
            writer.append_i32(center.y);
            writer.append_u32(center.width);
            writer.append_u32(center.height);
        }

        if has_pivot {
            let pivot = key.pivot.unwrap_or_default();

            writer.append_i32(pivot.x);
            writer.append_i32(pivot.y);
        }
    }

    end_chunk(writer, start);
}

fn write_tileset_chunk(
    writer: &mut ByteWriter,
    at: usize,
    tileset: &Tileset,
) -> Result<(), AseError> {
    let start = begin_chunk(writer, CHUNK_TILESET);

    writer.append_u32(at as u32);
    writer.append_u32(TILESET_FLAG_EMBED_TILES | TILESET_FLAG_EMPTY_TILE_IS_ID_0);
    writer.append_u32(tileset.len() as u32);
    writer.append_u16(tileset.tile_width());
    writer.append_u16(tileset.tile_height());
    writer.append_i16(tileset.base_index);
    writer.append_zeros(14);
    append_string(writer, &tileset.name);

    // all tile buffers concatenated in index order
    let mut pixels = vec![];
    for tile in tileset.tiles() {
        pixels.extend_from_slice(tile.data());
    }

    let compressed = deflate(&pixels)?;

    writer.append_u32(compressed.len() as u32);
    writer.append_u8_slice(&compressed);

    end_chunk(writer, start);

    Ok(())
}

fn write_user_data_chunk(writer: &mut ByteWriter, user_data: &UserData) {
    let start = begin_chunk(writer, CHUNK_USER_DATA);

    let mut flags = 0u32;
    if user_data.text.is_some() {
        flags |= USER_DATA_FLAG_TEXT;
    }
    if user_data.color.is_some() {
        flags |= USER_DATA_FLAG_COLOR;
    }

    writer.append_u32(flags);

    if let Some(text) = &user_data.text {
        append_string(writer, text);
    }

    if let Some(color) = &user_data.color {
        writer.append_u8(color.r);
        writer.append_u8(color.g);
        writer.append_u8(color.b);
        writer.append_u8(color.a);
    }

    end_chunk(writer, start);
}
