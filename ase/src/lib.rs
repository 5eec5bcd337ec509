//! Aseprite sprite file codec (`.ase` / `.aseprite`).
//!
//! Format reference: https://github.com/aseprite/aseprite/blob/main/docs/ase-file-specs.md
//!
//! Decoding builds a [`Sprite`] document; encoding serialises one
//! back. The two directions round-trip: everything the model keeps
//! is preserved, deprecated and reserved wire data is accepted on
//! read and dropped on write.
//!
//! ```ignore
//! use ase::Sprite;
//!
//! let sprite = Sprite::open_from_file("player.aseprite")?;
//! println!("{}x{}, {} frames", sprite.width(), sprite.height(), sprite.frame_count());
//! ```

mod constants;
pub mod error;
mod parser;
mod types;
mod utils;
mod writer;

pub use error::AseError;
pub use parser::parse_sprite;
pub use types::*;
pub use utils::is_supported;

#[cfg(test)]
mod test {
    use super::*;
    use byte_writer::ByteWriter;

    fn u16_at(bytes: &[u8], at: usize) -> u16 {
        u16::from_le_bytes([bytes[at], bytes[at + 1]])
    }

    fn u32_at(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    }

    fn set_u32(bytes: &mut [u8], at: usize, value: u32) {
        bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn round_trip(sprite: &Sprite) -> Sprite {
        let bytes = sprite.write_to_bytes().unwrap();

        Sprite::open_from_bytes(&bytes).unwrap()
    }

    fn assert_documents_equal(a: &Sprite, b: &Sprite) {
        assert_eq!(a.width(), b.width());
        assert_eq!(a.height(), b.height());
        assert_eq!(a.color_mode(), b.color_mode());
        assert_eq!(a.transparent_index, b.transparent_index);
        assert_eq!(a.pixel_ratio, b.pixel_ratio);
        assert_eq!(a.grid, b.grid);
        assert_eq!(a.frames(), b.frames());
        assert_eq!(a.layers, b.layers);
        assert_eq!(a.palettes(), b.palettes());
        assert_eq!(a.tilesets, b.tilesets);
        assert_eq!(a.tags, b.tags);
        assert_eq!(a.slices, b.slices);
    }

    /// A document exercising every chunk the encoder emits.
    fn rich_sprite() -> Sprite {
        let mut sprite = Sprite::new(16, 16, ColorMode::Rgba).unwrap();
        sprite.add_frame(80);
        sprite.add_frame(120);
        sprite.pixel_ratio = PixelRatio {
            width: 2,
            height: 1,
        };
        sprite.grid = Grid {
            x: -4,
            y: 2,
            width: 8,
            height: 8,
        };

        let mut palette = Palette::new(2, 8);
        for at in 0..8 {
            palette.set_color(at, Rgba32::new(at as u8 * 30, 0, 0, 255));
        }
        sprite.set_palette(palette);

        let mut tileset = Tileset::new("terrain", 4, 4, ColorMode::Rgba).unwrap();
        let mut tile = Image::new(4, 4, ColorMode::Rgba).unwrap();
        tile.data_mut().fill(0xAA);
        tileset.add_tile(tile).unwrap();
        tileset.user_data = UserData::with_text("tiles");
        let tileset_at = sprite.add_tileset(tileset);

        let mut bottom = Layer::Image(ImageLayer::new("bottom"));
        let mut image = Image::new(3, 2, ColorMode::Rgba).unwrap();
        for (at, byte) in image.data_mut().iter_mut().enumerate() {
            *byte = at as u8;
        }
        let mut cel = Cel::from_image(image, -1, 2);
        cel.opacity = 200;
        cel.z_index = -3;
        cel.user_data = UserData::with_text("first cel");
        bottom.set_cel(0, cel);
        bottom.set_cel(1, Cel::new_linked(0));
        bottom.props_mut().user_data = UserData {
            text: Some("bottom layer".to_string()),
            color: Some(Rgba32::new(1, 2, 3, 4)),
        };

        let mut inner = Layer::Image(ImageLayer::new("inner"));
        let mut pixels = Image::new(1, 1, ColorMode::Rgba).unwrap();
        pixels.data_mut().copy_from_slice(&[9, 8, 7, 255]);
        inner.set_cel(2, Cel::from_image(pixels, 4, 4));

        let mut group = GroupLayer::new("group");
        group.props.flags |= LayerFlags::COLLAPSED;
        group.props.opacity = 128;
        group.push_child(inner);

        let mut tiles = TilemapLayer::new("tiles", tileset_at);
        tiles.grid = Grid {
            x: 0,
            y: 0,
            width: 4,
            height: 4,
        };
        let mut map = Image::new(2, 2, ColorMode::Tilemap).unwrap();
        map.set_cell(0, 0, TileRef::new(1).encode());
        map.set_cell(1, 1, TileRef::with_flags(1, TileFlags::FLIP_Y).encode());
        let mut tiles = Layer::Tilemap(tiles);
        tiles.set_cel(1, Cel::from_image(map, 0, 0));

        sprite.add_layer(bottom);
        sprite.add_layer(Layer::Group(group));
        sprite.add_layer(tiles);

        let mut walk = Tag::new("walk", 0, 1);
        walk.ani_dir = AniDir::PingPong;
        walk.repeat = 3;
        walk.color = Rgba32::new(10, 20, 30, 255);
        walk.user_data = UserData::with_text("cycle");
        sprite.add_tag(walk);
        sprite.add_tag(Tag::new("idle", 2, 2));

        let mut slice = Slice::new("window");
        let mut key = SliceKey::new(0, 1, 1, 10, 10);
        key.center = Some(SliceCenter {
            x: 2,
            y: 2,
            width: 6,
            height: 6,
        });
        key.pivot = Some(SlicePivot { x: 5, y: 5 });
        slice.add_key(key);
        slice.user_data = UserData::with_text("ui");
        sprite.add_slice(slice);

        sprite
    }

    #[test]
    fn rgba_2x2_single_cel_round_trip() {
        let mut sprite = Sprite::new(2, 2, ColorMode::Rgba).unwrap();

        let pixels = vec![
            255, 0, 0, 255, //
            0, 255, 0, 255, //
            0, 0, 255, 255, //
            255, 255, 255, 255,
        ];
        let image = Image::from_data(2, 2, ColorMode::Rgba, pixels.clone()).unwrap();

        let mut layer = Layer::Image(ImageLayer::new("L"));
        layer.set_cel(0, Cel::from_image(image, 0, 0));
        sprite.add_layer(layer);

        let bytes = sprite.write_to_bytes().unwrap();

        assert_eq!(u16_at(&bytes, 4), 0xA5E0);
        // the first frame starts at 128; its magic follows the size
        assert_eq!(u16_at(&bytes, 132), 0xF1FA);
        assert_eq!(u32_at(&bytes, 0) as usize, bytes.len());

        let decoded = Sprite::open_from_bytes(&bytes).unwrap();
        let cel = decoded.layers[0].cel_at(0).unwrap();

        assert_eq!(decoded.layers[0].name(), "L");
        assert_eq!(decoded.frame_duration(0), 100);
        assert_eq!(cel.image().unwrap().data(), pixels.as_slice());
    }

    #[test]
    fn linked_cel_round_trip() {
        let mut sprite = Sprite::new(1, 1, ColorMode::Rgba).unwrap();
        sprite.add_frame(100);

        let red = Image::from_data(1, 1, ColorMode::Rgba, vec![255, 0, 0, 255]).unwrap();
        let mut layer = Layer::Image(ImageLayer::new("L"));
        layer.set_cel(0, Cel::from_image(red, 0, 0));
        layer.set_cel(1, Cel::new_linked(0));
        sprite.add_layer(layer);

        let decoded = round_trip(&sprite);
        let layer = &decoded.layers[0];

        assert_eq!(layer.cel_at(1).unwrap().linked_frame(), Some(0));
        assert_eq!(
            layer.resolve_cel(1).unwrap().image().unwrap().data(),
            &[255, 0, 0, 255]
        );
    }

    #[test]
    fn palette_change_at_frame() {
        let mut sprite = Sprite::new(1, 1, ColorMode::Indexed).unwrap();
        sprite.add_frame(100);

        let mut first = Palette::new(0, 2);
        first.set_color(1, Rgba32::new(0, 0, 0, 255));
        sprite.set_palette(first);

        let mut second = Palette::new(1, 2);
        second.set_color(1, Rgba32::new(255, 255, 255, 255));
        sprite.set_palette(second);

        let mut layer = Layer::Image(ImageLayer::new("L"));
        for frame in 0..2 {
            let image = Image::from_data(1, 1, ColorMode::Indexed, vec![1]).unwrap();
            layer.set_cel(frame, Cel::from_image(image, 0, 0));
        }
        sprite.add_layer(layer);

        let decoded = round_trip(&sprite);

        assert_eq!(decoded.palettes().len(), 2);
        assert_eq!(
            decoded.palette_at(0).color(1),
            Some(Rgba32::new(0, 0, 0, 255))
        );
        assert_eq!(
            decoded.palette_at(1).color(1),
            Some(Rgba32::new(255, 255, 255, 255))
        );
    }

    #[test]
    fn tag_user_data_chain() {
        let mut sprite = Sprite::new(1, 1, ColorMode::Rgba).unwrap();
        sprite.add_frame(100);

        let mut intro = Tag::new("intro", 0, 0);
        intro.user_data = UserData::with_text("intro");
        sprite.add_tag(intro);

        let mut animation = Tag::new("loop", 1, 1);
        animation.user_data = UserData::with_text("loop");
        sprite.add_tag(animation);

        let decoded = round_trip(&sprite);

        assert_eq!(decoded.tags[0].user_data.text.as_deref(), Some("intro"));
        assert_eq!(decoded.tags[1].user_data.text.as_deref(), Some("loop"));
    }

    #[test]
    fn tilemap_cel_round_trip() {
        let mut sprite = Sprite::new(16, 8, ColorMode::Rgba).unwrap();

        let mut tileset = Tileset::new("terrain", 8, 8, ColorMode::Rgba).unwrap();
        let mut checker = Image::new(8, 8, ColorMode::Rgba).unwrap();
        for (at, byte) in checker.data_mut().iter_mut().enumerate() {
            *byte = if (at / 4) % 2 == 0 { 255 } else { 0 };
        }
        tileset.add_tile(checker).unwrap();
        let mut solid = Image::new(8, 8, ColorMode::Rgba).unwrap();
        solid.data_mut().fill(255);
        tileset.add_tile(solid).unwrap();
        let tileset_at = sprite.add_tileset(tileset);

        let mut layer = TilemapLayer::new("tiles", tileset_at);
        layer.grid = Grid {
            x: 0,
            y: 0,
            width: 8,
            height: 8,
        };

        let mut map = Image::new(2, 1, ColorMode::Tilemap).unwrap();
        map.set_cell(0, 0, TileRef::new(1).encode());
        map.set_cell(1, 0, TileRef::with_flags(2, TileFlags::FLIP_X).encode());

        let mut layer = Layer::Tilemap(layer);
        layer.set_cel(0, Cel::from_image(map, 0, 0));
        sprite.add_layer(layer);

        let decoded = round_trip(&sprite);
        let tileset = &decoded.tilesets[0];

        assert_eq!(tileset.len(), 3);
        assert_eq!(tileset.base_index, 1);
        assert_eq!(tileset.tile(0).unwrap().data(), vec![0u8; 256].as_slice());

        let map = decoded.layers[0].cel_at(0).unwrap().image().unwrap();

        let first = TileRef::decode(map.cell(0, 0).unwrap());
        assert_eq!(first.index, 1);
        assert!(first.flags.is_empty());

        let second = TileRef::decode(map.cell(1, 0).unwrap());
        assert_eq!(second.index, 2);
        assert!(second.flags.contains(TileFlags::FLIP_X));
        assert!(!second.flags.intersects(TileFlags::FLIP_Y | TileFlags::ROTATE_90));
    }

    #[test]
    fn slice_flags_are_or_of_keys() {
        let mut sprite = Sprite::new(8, 8, ColorMode::Rgba).unwrap();
        sprite.add_frame(100);
        sprite.add_frame(100);

        let mut slice = Slice::new("patchy");

        let mut key0 = SliceKey::new(0, 1, 1, 6, 6);
        key0.center = Some(SliceCenter {
            x: 2,
            y: 2,
            width: 2,
            height: 2,
        });
        slice.add_key(key0);

        let mut key2 = SliceKey::new(2, 0, 0, 8, 8);
        key2.pivot = Some(SlicePivot { x: 4, y: 4 });
        slice.add_key(key2);

        sprite.add_slice(slice);

        let decoded = round_trip(&sprite);
        let slice = &decoded.slices[0];

        assert!(slice.has_nine_slices());
        assert!(slice.has_pivot());

        // the wire stores every key with both field groups once the
        // slice-level flags are set; the unused group reads back zeroed
        let key0 = slice.key_at(0).unwrap();
        assert_eq!(
            key0.center,
            Some(SliceCenter {
                x: 2,
                y: 2,
                width: 2,
                height: 2
            })
        );
        assert_eq!(key0.pivot, Some(SlicePivot::default()));

        let key2 = slice.key_at(2).unwrap();
        assert_eq!(key2.center, Some(SliceCenter::default()));
        assert_eq!(key2.pivot, Some(SlicePivot { x: 4, y: 4 }));
    }

    #[test]
    fn rich_document_round_trip() {
        let sprite = rich_sprite();
        let decoded = round_trip(&sprite);

        assert_documents_equal(&sprite, &decoded);
    }

    #[test]
    fn encoding_is_idempotent() {
        let sprite = rich_sprite();

        let bytes = sprite.write_to_bytes().unwrap();
        let again = Sprite::open_from_bytes(&bytes)
            .unwrap()
            .write_to_bytes()
            .unwrap();

        assert_eq!(bytes, again);
    }

    #[test]
    fn sizes_are_self_consistent() {
        let bytes = rich_sprite().write_to_bytes().unwrap();

        assert_eq!(u32_at(&bytes, 0) as usize, bytes.len());

        let frame_count = u16_at(&bytes, 6) as usize;
        let mut offset = 128;

        for _ in 0..frame_count {
            let frame_bytes = u32_at(&bytes, offset) as usize;
            assert_eq!(u16_at(&bytes, offset + 4), 0xF1FA);

            let chunk_count = u32_at(&bytes, offset + 12);
            let mut cursor = offset + 16;

            for _ in 0..chunk_count {
                // each chunk's size must land exactly on the next one
                cursor += u32_at(&bytes, cursor) as usize;
            }

            assert_eq!(cursor, offset + frame_bytes);
            offset += frame_bytes;
        }

        assert_eq!(offset, bytes.len());
    }

    #[test]
    fn palettes_stay_ordered_after_decode() {
        let decoded = round_trip(&rich_sprite());
        let frames: Vec<u32> = decoded.palettes().iter().map(|p| p.frame).collect();

        assert_eq!(frames, vec![0, 2]);
        assert_eq!(decoded.palette_at(1).frame, 0);
        assert_eq!(decoded.palette_at(2).frame, 2);
    }

    #[test]
    fn one_by_one_indexed_single_color() {
        let mut sprite = Sprite::new(1, 1, ColorMode::Indexed).unwrap();

        let mut palette = Palette::new(0, 1);
        palette.set_color(0, Rgba32::new(40, 40, 40, 255));
        sprite.set_palette(palette);

        let mut layer = Layer::Image(ImageLayer::new("only"));
        let image = Image::from_data(1, 1, ColorMode::Indexed, vec![0]).unwrap();
        layer.set_cel(0, Cel::from_image(image, 0, 0));
        sprite.add_layer(layer);

        let decoded = round_trip(&sprite);

        assert_eq!(decoded.palette_at(0).len(), 1);
        assert_eq!(
            decoded.palette_at(0).color(0),
            Some(Rgba32::new(40, 40, 40, 255))
        );
        assert_eq!(
            decoded.layers[0].cel_at(0).unwrap().image().unwrap().data(),
            &[0]
        );
    }

    #[test]
    fn header_maximum_dimensions() {
        let sprite = Sprite::new(u16::MAX, u16::MAX, ColorMode::Rgba).unwrap();

        let bytes = sprite.write_to_bytes().unwrap();
        assert_eq!(u16_at(&bytes, 8), u16::MAX);
        assert_eq!(u16_at(&bytes, 10), u16::MAX);

        let decoded = Sprite::open_from_bytes(&bytes).unwrap();
        assert_eq!(decoded.width(), u16::MAX);
        assert_eq!(decoded.height(), u16::MAX);
    }

    #[test]
    fn frame_without_cels() {
        let mut sprite = Sprite::new(4, 4, ColorMode::Rgba).unwrap();
        sprite.add_frame(40);

        let mut layer = Layer::Image(ImageLayer::new("L"));
        let image = Image::new(4, 4, ColorMode::Rgba).unwrap();
        layer.set_cel(0, Cel::from_image(image, 0, 0));
        sprite.add_layer(layer);

        let decoded = round_trip(&sprite);

        assert_eq!(decoded.frame_count(), 2);
        assert_eq!(decoded.frame_duration(1), 40);
        assert!(decoded.layers[0].cel_at(0).is_some());
        assert!(decoded.layers[0].cel_at(1).is_none());
    }

    #[test]
    fn unknown_chunk_is_skipped() {
        let mut sprite = Sprite::new(2, 2, ColorMode::Rgba).unwrap();
        let mut layer = Layer::Image(ImageLayer::new("L"));
        let image = Image::from_data(2, 2, ColorMode::Rgba, vec![7; 16]).unwrap();
        layer.set_cel(0, Cel::from_image(image, 0, 0));
        sprite.add_layer(layer);

        let bytes = sprite.write_to_bytes().unwrap();

        // inject a 10-byte chunk of unknown type 0x7777 right after
        // the frame header and fix up the three affected counters
        let unknown = [10, 0, 0, 0, 0x77, 0x77, 0xDE, 0xAD, 0xBE, 0xEF];
        let frame_bytes = u32_at(&bytes, 128);
        let chunk_count = u32_at(&bytes, 140);

        let mut patched = Vec::new();
        patched.extend_from_slice(&bytes[..144]);
        patched.extend_from_slice(&unknown);
        patched.extend_from_slice(&bytes[144..]);
        let patched_len = patched.len() as u32;
        set_u32(&mut patched, 0, patched_len);
        set_u32(&mut patched, 128, frame_bytes + 10);
        set_u32(&mut patched, 140, chunk_count + 1);

        let decoded = Sprite::open_from_bytes(&patched).unwrap();

        assert_eq!(decoded.layers.len(), 1);
        assert_eq!(
            decoded.layers[0].cel_at(0).unwrap().image().unwrap().data(),
            &[7; 16]
        );
    }

    #[test]
    fn old_palette_is_ignored_once_new_palette_seen() {
        let mut sprite = Sprite::new(1, 1, ColorMode::Indexed).unwrap();

        let mut palette = Palette::new(0, 2);
        palette.set_color(1, Rgba32::new(255, 0, 0, 255));
        sprite.set_palette(palette);

        let mut bytes = sprite.write_to_bytes().unwrap();

        // append an old-palette chunk that would recolor entry 1,
        // after the new-palette chunk the encoder already wrote
        let old_palette = vec![
            13, 0, 0, 0, // size
            0x04, 0x00, // type
            1, 0, // one packet
            1, // skip to entry 1
            1, // one color
            0, 255, 0,
        ];
        let frame_bytes = u32_at(&bytes, 128);
        let chunk_count = u32_at(&bytes, 140);
        bytes.extend_from_slice(&old_palette);
        let bytes_len = bytes.len() as u32;
        set_u32(&mut bytes, 0, bytes_len);
        set_u32(&mut bytes, 128, frame_bytes + 13);
        set_u32(&mut bytes, 140, chunk_count + 1);

        let decoded = Sprite::open_from_bytes(&bytes).unwrap();

        assert_eq!(
            decoded.palette_at(0).color(1),
            Some(Rgba32::new(255, 0, 0, 255))
        );
    }

    #[test]
    fn old_palette_applies_when_no_new_palette_exists() {
        let mut writer = ByteWriter::new();

        writer.append_u32(0); // file size, patched below
        writer.append_u16(0xA5E0);
        writer.append_u16(1); // frames
        writer.append_u16(1);
        writer.append_u16(1);
        writer.append_u16(8); // indexed
        writer.append_u32(1);
        writer.append_u16(100); // speed
        writer.append_zeros(8);
        writer.append_u8(0);
        writer.append_zeros(3);
        writer.append_u16(0); // color count
        writer.append_u8(1);
        writer.append_u8(1);
        writer.append_i16(0);
        writer.append_i16(0);
        writer.append_u16(16);
        writer.append_u16(16);
        writer.append_zeros(84);
        assert_eq!(writer.get_offset(), 128);

        let frame_start = writer.get_offset();
        writer.append_u32(0); // frame bytes, patched below
        writer.append_u16(0xF1FA);
        writer.append_u16(1); // legacy chunk count
        writer.append_u16(100);
        writer.append_zeros(2);
        writer.append_u32(0);

        // 6-bit old palette with two entries at full red and green
        let chunk_start = writer.get_offset();
        writer.append_u32(0);
        writer.append_u16(0x0011);
        writer.append_u16(1); // one packet
        writer.append_u8(0); // no skip
        writer.append_u8(2); // two colors
        writer.append_u8(63);
        writer.append_u8(0);
        writer.append_u8(0);
        writer.append_u8(0);
        writer.append_u8(63);
        writer.append_u8(0);

        let chunk_size = writer.get_offset() - chunk_start;
        writer.replace_with_u32(chunk_start, chunk_size as u32);
        let frame_bytes = writer.get_offset() - frame_start;
        writer.replace_with_u32(frame_start, frame_bytes as u32);
        let file_size = writer.get_offset();
        writer.replace_with_u32(0, file_size as u32);

        let decoded = Sprite::open_from_bytes(&writer.data).unwrap();

        assert_eq!(
            decoded.palette_at(0).color(0),
            Some(Rgba32::new(255, 0, 0, 255))
        );
        assert_eq!(
            decoded.palette_at(0).color(1),
            Some(Rgba32::new(0, 255, 0, 255))
        );
    }

    #[test]
    fn decode_failures() {
        let sprite = Sprite::new(2, 2, ColorMode::Rgba).unwrap();
        let good = sprite.write_to_bytes().unwrap();

        let mut bad_magic = good.clone();
        bad_magic[4] = 0;
        assert!(matches!(
            Sprite::open_from_bytes(&bad_magic),
            Err(AseError::InvalidFileMagic { found: 0xA500 })
        ));

        let mut bad_frame = good.clone();
        bad_frame[132] = 0;
        assert!(matches!(
            Sprite::open_from_bytes(&bad_frame),
            Err(AseError::BadFrameMagic { frame: 0 })
        ));

        let mut bad_depth = good.clone();
        bad_depth[12] = 12;
        bad_depth[13] = 0;
        assert!(matches!(
            Sprite::open_from_bytes(&bad_depth),
            Err(AseError::UnknownColorDepth { bits: 12 })
        ));

        assert!(matches!(
            Sprite::open_from_bytes(&good[..60]),
            Err(AseError::UnexpectedEof)
        ));
    }

    #[test]
    fn decoder_rejects_links_to_linked_cels() {
        let mut sprite = Sprite::new(1, 1, ColorMode::Rgba).unwrap();
        sprite.add_frame(100);

        // the model does not stop this, the decoder must
        let mut layer = Layer::Image(ImageLayer::new("L"));
        layer.set_cel(0, Cel::new_linked(1));
        layer.set_cel(1, Cel::new_linked(0));
        sprite.add_layer(layer);

        let bytes = sprite.write_to_bytes().unwrap();

        assert!(matches!(
            Sprite::open_from_bytes(&bytes),
            Err(AseError::InvalidData { .. })
        ));
    }

    #[test]
    fn decoder_rejects_dangling_tileset_reference() {
        let mut sprite = Sprite::new(8, 8, ColorMode::Rgba).unwrap();
        sprite.add_layer(Layer::Tilemap(TilemapLayer::new("tiles", 5)));

        let bytes = sprite.write_to_bytes().unwrap();

        assert!(matches!(
            Sprite::open_from_bytes(&bytes),
            Err(AseError::InvalidData { .. })
        ));
    }

    #[test]
    fn decoded_group_tree_matches_child_levels() {
        let sprite = rich_sprite();
        let decoded = round_trip(&sprite);

        let flat: Vec<(u16, &str)> = decoded
            .flattened_layers()
            .into_iter()
            .map(|(level, layer)| (level, layer.name()))
            .collect();

        assert_eq!(
            flat,
            vec![(0, "bottom"), (0, "group"), (1, "inner"), (0, "tiles")]
        );
    }
}
