use std::collections::BTreeMap;

use crate::types::{Cel, CelContent, Grid, UserData};

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LayerFlags: u16 {
        const VISIBLE = 1;
        const EDITABLE = 2;
        const LOCK_MOVEMENT = 4;
        const BACKGROUND = 8;
        const PREFER_LINKED_CELS = 16;
        const COLLAPSED = 32;
        const REFERENCE = 64;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum BlendMode {
    Normal = 0,
    Multiply = 1,
    Screen = 2,
    Overlay = 3,
    Darken = 4,
    Lighten = 5,
    ColorDodge = 6,
    ColorBurn = 7,
    HardLight = 8,
    SoftLight = 9,
    Difference = 10,
    Exclusion = 11,
    Hue = 12,
    Saturation = 13,
    Color = 14,
    Luminosity = 15,
    Addition = 16,
    Subtract = 17,
    Divide = 18,
}

impl BlendMode {
    /// Unknown wire values clamp to the highest known mode.
    pub fn from_u16(value: u16) -> BlendMode {
        match value {
            0 => BlendMode::Normal,
            1 => BlendMode::Multiply,
            2 => BlendMode::Screen,
            3 => BlendMode::Overlay,
            4 => BlendMode::Darken,
            5 => BlendMode::Lighten,
            6 => BlendMode::ColorDodge,
            7 => BlendMode::ColorBurn,
            8 => BlendMode::HardLight,
            9 => BlendMode::SoftLight,
            10 => BlendMode::Difference,
            11 => BlendMode::Exclusion,
            12 => BlendMode::Hue,
            13 => BlendMode::Saturation,
            14 => BlendMode::Color,
            15 => BlendMode::Luminosity,
            16 => BlendMode::Addition,
            17 => BlendMode::Subtract,
            _ => BlendMode::Divide,
        }
    }
}

/// Fields shared by every layer variant.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerProps {
    pub name: String,
    pub flags: LayerFlags,
    pub opacity: u8,
    pub blend_mode: BlendMode,
    pub user_data: UserData,
}

impl LayerProps {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            flags: LayerFlags::VISIBLE | LayerFlags::EDITABLE,
            opacity: 255,
            blend_mode: BlendMode::Normal,
            user_data: UserData::default(),
        }
    }
}

/// A node of the layer tree. Groups own their children bottom-to-top
/// in display order; image and tilemap layers own one cel per frame
/// at most.
#[derive(Debug, Clone, PartialEq)]
pub enum Layer {
    Image(ImageLayer),
    Group(GroupLayer),
    Tilemap(TilemapLayer),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageLayer {
    pub props: LayerProps,
    pub(crate) cels: BTreeMap<u32, Cel>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupLayer {
    pub props: LayerProps,
    pub children: Vec<Layer>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TilemapLayer {
    pub props: LayerProps,
    /// Position into the sprite's tileset list.
    pub tileset_index: usize,
    pub grid: Grid,
    pub(crate) cels: BTreeMap<u32, Cel>,
}

impl ImageLayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            props: LayerProps::new(name),
            cels: BTreeMap::new(),
        }
    }
}

impl GroupLayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            props: LayerProps::new(name),
            children: vec![],
        }
    }

    pub fn push_child(&mut self, layer: Layer) {
        self.children.push(layer);
    }
}

impl TilemapLayer {
    pub fn new(name: impl Into<String>, tileset_index: usize) -> Self {
        Self {
            props: LayerProps::new(name),
            tileset_index,
            grid: Grid::default(),
            cels: BTreeMap::new(),
        }
    }
}

impl Layer {
    pub fn props(&self) -> &LayerProps {
        match self {
            Layer::Image(layer) => &layer.props,
            Layer::Group(layer) => &layer.props,
            Layer::Tilemap(layer) => &layer.props,
        }
    }

    pub fn props_mut(&mut self) -> &mut LayerProps {
        match self {
            Layer::Image(layer) => &mut layer.props,
            Layer::Group(layer) => &mut layer.props,
            Layer::Tilemap(layer) => &mut layer.props,
        }
    }

    pub fn name(&self) -> &str {
        &self.props().name
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Layer::Group(_))
    }

    fn cel_map(&self) -> Option<&BTreeMap<u32, Cel>> {
        match self {
            Layer::Image(layer) => Some(&layer.cels),
            Layer::Tilemap(layer) => Some(&layer.cels),
            Layer::Group(_) => None,
        }
    }

    fn cel_map_mut(&mut self) -> Option<&mut BTreeMap<u32, Cel>> {
        match self {
            Layer::Image(layer) => Some(&mut layer.cels),
            Layer::Tilemap(layer) => Some(&mut layer.cels),
            Layer::Group(_) => None,
        }
    }

    pub fn cel_at(&self, frame: u32) -> Option<&Cel> {
        self.cel_map()?.get(&frame)
    }

    pub fn cel_at_mut(&mut self, frame: u32) -> Option<&mut Cel> {
        self.cel_map_mut()?.get_mut(&frame)
    }

    /// Overwrites any cel already present at the frame. Returns false
    /// on a group layer, which cannot hold cels.
    pub fn set_cel(&mut self, frame: u32, cel: Cel) -> bool {
        match self.cel_map_mut() {
            Some(cels) => {
                cels.insert(frame, cel);
                true
            }
            None => false,
        }
    }

    pub fn remove_cel(&mut self, frame: u32) -> Option<Cel> {
        self.cel_map_mut()?.remove(&frame)
    }

    /// Re-keys cels at `from_frame` and beyond by `delta` frames, for
    /// frame insertion (positive) or removal (negative). Cels shifted
    /// below frame 0 are dropped; link targets move with their cels.
    pub fn shift_cels(&mut self, from_frame: u32, delta: i64) {
        let Some(cels) = self.cel_map_mut() else {
            return;
        };

        let shifted = std::mem::take(cels)
            .into_iter()
            .filter_map(|(frame, mut cel)| {
                let new_frame = if frame >= from_frame {
                    let moved = frame as i64 + delta;
                    if moved < 0 {
                        return None;
                    }
                    moved as u32
                } else {
                    frame
                };

                if let CelContent::Linked(target) = &mut cel.content {
                    if *target >= from_frame {
                        let moved = *target as i64 + delta;
                        if moved < 0 {
                            return None;
                        }
                        *target = moved as u32;
                    }
                }

                Some((new_frame, cel))
            })
            .collect();

        *cels = shifted;
    }

    /// Follows at most one link to the cel that owns pixel data.
    pub fn resolve_cel(&self, frame: u32) -> Option<&Cel> {
        let cel = self.cel_at(frame)?;

        match cel.content {
            CelContent::Data(_) => Some(cel),
            CelContent::Linked(target) => {
                let target_cel = self.cel_at(target)?;
                target_cel.image().is_some().then_some(target_cel)
            }
        }
    }

    /// An unlinked copy of the cel at the frame: a linked cel's copy
    /// receives a clone of the target's pixels but keeps its own
    /// placement.
    pub fn clone_cel(&self, frame: u32) -> Option<Cel> {
        let cel = self.cel_at(frame)?;

        match cel.content {
            CelContent::Data(_) => Some(cel.clone()),
            CelContent::Linked(_) => {
                let data_cel = self.resolve_cel(frame)?;
                let mut copy = cel.clone();
                copy.content = data_cel.content.clone();
                Some(copy)
            }
        }
    }
}
