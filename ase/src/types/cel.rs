use crate::types::{Image, UserData};

/// The content at one (layer, frame) intersection.
#[derive(Debug, Clone, PartialEq)]
pub struct Cel {
    pub x: i16,
    pub y: i16,
    pub opacity: u8,
    pub z_index: i16,
    pub user_data: UserData,
    pub content: CelContent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CelContent {
    /// The cel owns its pixels.
    Data(CelData),
    /// The cel borrows the pixels of the cel at the given frame on
    /// the same layer. The target must itself own data.
    Linked(u32),
}

/// Sole owner of a cel's pixel buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct CelData {
    pub image: Image,
}

impl Cel {
    pub fn from_image(image: Image, x: i16, y: i16) -> Self {
        Self {
            x,
            y,
            opacity: 255,
            z_index: 0,
            user_data: UserData::default(),
            content: CelContent::Data(CelData { image }),
        }
    }

    pub fn new_linked(frame: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            opacity: 255,
            z_index: 0,
            user_data: UserData::default(),
            content: CelContent::Linked(frame),
        }
    }

    pub fn image(&self) -> Option<&Image> {
        match &self.content {
            CelContent::Data(data) => Some(&data.image),
            CelContent::Linked(_) => None,
        }
    }

    pub fn image_mut(&mut self) -> Option<&mut Image> {
        match &mut self.content {
            CelContent::Data(data) => Some(&mut data.image),
            CelContent::Linked(_) => None,
        }
    }

    pub fn linked_frame(&self) -> Option<u32> {
        match self.content {
            CelContent::Linked(frame) => Some(frame),
            CelContent::Data(_) => None,
        }
    }

    pub fn is_linked(&self) -> bool {
        matches!(self.content, CelContent::Linked(_))
    }
}
