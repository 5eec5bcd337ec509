use std::path::{Path, PathBuf};

use crate::constants::{DEFAULT_FRAME_DURATION_MS, MAX_PALETTE_SIZE};
use crate::error::AseError;
use crate::types::{Cel, ColorMode, Layer, Palette, Slice, Tag, Tileset, UserData};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Always positive.
    pub duration_ms: u16,
}

/// Pixel aspect ratio; both sides positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRatio {
    pub width: u8,
    pub height: u8,
}

impl Default for PixelRatio {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
        }
    }
}

/// Display grid: cell size plus origin offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            width: 16,
            height: 16,
        }
    }
}

/// The root aggregate: canvas, frames, the layer tree, palettes,
/// tilesets, tags and slices.
///
/// The hidden root group of the original document model is implicit
/// here: [`Sprite::layers`] is the root's child list, so every other
/// layer has an owning group.
#[derive(Debug)]
pub struct Sprite {
    width: u16,
    height: u16,
    color_mode: ColorMode,
    /// Palette index meaning "transparent" in indexed sprites.
    pub transparent_index: u8,
    pub pixel_ratio: PixelRatio,
    pub grid: Grid,
    frames: Vec<FrameInfo>,
    pub layers: Vec<Layer>,
    palettes: Vec<Palette>,
    pub tilesets: Vec<Tileset>,
    pub tags: Vec<Tag>,
    pub slices: Vec<Slice>,
    pub user_data: UserData,
    path: Option<PathBuf>,
    modified: bool,
}

impl Sprite {
    /// Seeds one 100 ms frame and a 256-entry palette at frame 0.
    pub fn new(width: u16, height: u16, color_mode: ColorMode) -> Result<Sprite, AseError> {
        if width == 0 || height == 0 {
            return Err(AseError::InvalidData {
                detail: format!("canvas dimensions must be positive, got {}x{}", width, height),
            });
        }

        if color_mode == ColorMode::Tilemap {
            return Err(AseError::InvalidData {
                detail: "tilemap is a cel encoding, not a canvas mode".to_string(),
            });
        }

        Ok(Sprite {
            width,
            height,
            color_mode,
            transparent_index: 0,
            pixel_ratio: PixelRatio::default(),
            grid: Grid::default(),
            frames: vec![FrameInfo {
                duration_ms: DEFAULT_FRAME_DURATION_MS,
            }],
            layers: vec![],
            palettes: vec![Palette::new(0, MAX_PALETTE_SIZE)],
            tilesets: vec![],
            tags: vec![],
            slices: vec![],
            user_data: UserData::default(),
            path: None,
            modified: false,
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

    //
    // frames
    //

    pub fn frame_count(&self) -> u32 {
        self.frames.len() as u32
    }

    pub fn frames(&self) -> &[FrameInfo] {
        &self.frames
    }

    pub fn frame_duration(&self, frame: u32) -> u16 {
        self.frames
            .get(frame as usize)
            .map(|info| info.duration_ms)
            .unwrap_or(DEFAULT_FRAME_DURATION_MS)
    }

    pub fn set_frame_duration(&mut self, frame: u32, duration_ms: u16) {
        if let Some(info) = self.frames.get_mut(frame as usize) {
            info.duration_ms = duration_ms.max(1);
        }
    }

    pub fn add_frame(&mut self, duration_ms: u16) {
        self.frames.push(FrameInfo {
            duration_ms: duration_ms.max(1),
        });
    }

    /// Appends a frame with the previous frame's duration, the way
    /// the decoder materialises frames before reading their headers.
    pub fn add_frame_like_last(&mut self) {
        let duration_ms = self
            .frames
            .last()
            .map(|info| info.duration_ms)
            .unwrap_or(DEFAULT_FRAME_DURATION_MS);

        self.frames.push(FrameInfo { duration_ms });
    }

    /// Inserts before `frame`, shifting later cels up by one.
    pub fn insert_frame(&mut self, frame: u32, duration_ms: u16) {
        let at = (frame as usize).min(self.frames.len());
        self.frames.insert(
            at,
            FrameInfo {
                duration_ms: duration_ms.max(1),
            },
        );

        for layer in &mut self.layers {
            shift_layer_tree(layer, frame, 1);
        }
    }

    /// Fails on the last remaining frame.
    pub fn remove_frame(&mut self, frame: u32) -> Result<(), AseError> {
        if self.frames.len() <= 1 {
            return Err(AseError::InvalidData {
                detail: "cannot remove the last frame".to_string(),
            });
        }

        if frame as usize >= self.frames.len() {
            return Err(AseError::InvalidData {
                detail: format!("no frame {}", frame),
            });
        }

        self.frames.remove(frame as usize);

        for layer in &mut self.layers {
            remove_frame_from_layer_tree(layer, frame);
        }

        Ok(())
    }

    //
    // palettes
    //

    pub fn palettes(&self) -> &[Palette] {
        &self.palettes
    }

    /// The palette in effect at the frame: greatest `frame <= F`.
    /// One palette is always anchored at frame 0.
    pub fn palette_at(&self, frame: u32) -> &Palette {
        self.palettes
            .iter()
            .rev()
            .find(|palette| palette.frame <= frame)
            .unwrap_or(&self.palettes[0])
    }

    /// Inserts keeping ascending frame order; a palette at the same
    /// frame is replaced.
    pub fn set_palette(&mut self, palette: Palette) {
        match self
            .palettes
            .binary_search_by_key(&palette.frame, |p| p.frame)
        {
            Ok(at) => self.palettes[at] = palette,
            Err(at) => self.palettes.insert(at, palette),
        }
    }

    /// The palette snapshot anchored exactly at `frame`, creating it
    /// as a copy of the one currently in effect when missing.
    pub(crate) fn palette_at_mut_or_insert(&mut self, frame: u32) -> &mut Palette {
        let at = match self.palettes.binary_search_by_key(&frame, |p| p.frame) {
            Ok(at) => at,
            Err(at) => {
                // anchor a copy of the palette currently in effect
                let mut snapshot = self.palette_at(frame).clone();
                snapshot.frame = frame;
                self.palettes.insert(at, snapshot);
                at
            }
        };

        &mut self.palettes[at]
    }

    //
    // layers, tilesets, tags, slices
    //

    pub fn add_layer(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    pub fn add_tileset(&mut self, tileset: Tileset) -> usize {
        self.tilesets.push(tileset);
        self.tilesets.len() - 1
    }

    pub fn add_tag(&mut self, tag: Tag) {
        self.tags.push(tag);
    }

    pub fn add_slice(&mut self, slice: Slice) {
        self.slices.push(slice);
    }

    /// Pre-order depth-first walk of the layer tree; groups precede
    /// their contents. The position in the returned list is the
    /// on-wire layer index, the `u16` is the child level (top-level
    /// layers at 0).
    pub fn flattened_layers(&self) -> Vec<(u16, &Layer)> {
        fn walk<'a>(layers: &'a [Layer], level: u16, out: &mut Vec<(u16, &'a Layer)>) {
            for layer in layers {
                out.push((level, layer));

                if let Layer::Group(group) = layer {
                    walk(&group.children, level + 1, out);
                }
            }
        }

        let mut out = vec![];
        walk(&self.layers, 0, &mut out);

        out
    }

    /// Drawable (non-group) layers, bottom-to-top.
    pub fn leaf_layers(&self) -> Vec<&Layer> {
        self.flattened_layers()
            .into_iter()
            .filter(|(_, layer)| !layer.is_group())
            .map(|(_, layer)| layer)
            .collect()
    }

    /// `(flattened layer index, layer, cel)` for every cel present at
    /// the frame, in flattened layer order.
    pub fn cels_at(&self, frame: u32) -> Vec<(usize, &Layer, &Cel)> {
        self.flattened_layers()
            .into_iter()
            .enumerate()
            .filter_map(|(index, (_, layer))| {
                layer.cel_at(frame).map(|cel| (index, layer, cel))
            })
            .collect()
    }

    /// Walks a path of child indices from the root's child list.
    pub(crate) fn layer_at_path(&self, path: &[usize]) -> Option<&Layer> {
        let (&first, rest) = path.split_first()?;
        let mut layer = self.layers.get(first)?;

        for &at in rest {
            let Layer::Group(group) = layer else {
                return None;
            };
            layer = group.children.get(at)?;
        }

        Some(layer)
    }

    pub(crate) fn layer_at_path_mut(&mut self, path: &[usize]) -> Option<&mut Layer> {
        let (&first, rest) = path.split_first()?;
        let mut layer = self.layers.get_mut(first)?;

        for &at in rest {
            let Layer::Group(group) = layer else {
                return None;
            };
            layer = group.children.get_mut(at)?;
        }

        Some(layer)
    }

    //
    // file bookkeeping
    //

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn mark_modified(&mut self) {
        self.modified = true;
    }

    pub(crate) fn set_path_clean(&mut self, path: PathBuf) {
        self.path = Some(path);
        self.modified = false;
    }
}

fn shift_layer_tree(layer: &mut Layer, from_frame: u32, delta: i64) {
    layer.shift_cels(from_frame, delta);

    if let Layer::Group(group) = layer {
        for child in &mut group.children {
            shift_layer_tree(child, from_frame, delta);
        }
    }
}

fn remove_frame_from_layer_tree(layer: &mut Layer, frame: u32) {
    layer.remove_cel(frame);
    layer.shift_cels(frame + 1, -1);

    if let Layer::Group(group) = layer {
        for child in &mut group.children {
            remove_frame_from_layer_tree(child, frame);
        }
    }
}
