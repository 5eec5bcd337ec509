use crate::types::{Rgba32, UserData};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AniDir {
    Forward = 0,
    Reverse = 1,
    PingPong = 2,
    PingPongReverse = 3,
}

impl AniDir {
    /// Unknown wire values clamp to the highest known direction.
    pub fn from_u8(value: u8) -> AniDir {
        match value {
            0 => AniDir::Forward,
            1 => AniDir::Reverse,
            2 => AniDir::PingPong,
            _ => AniDir::PingPongReverse,
        }
    }
}

/// A named frame range `[from_frame, to_frame]`, both inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub name: String,
    pub from_frame: u32,
    pub to_frame: u32,
    pub ani_dir: AniDir,
    /// 0 means repeat forever.
    pub repeat: u16,
    pub color: Rgba32,
    pub user_data: UserData,
}

impl Tag {
    pub fn new(name: impl Into<String>, from_frame: u32, to_frame: u32) -> Self {
        Self {
            name: name.into(),
            from_frame,
            to_frame,
            ani_dir: AniDir::Forward,
            repeat: 0,
            color: Rgba32::new(0, 0, 0, 255),
            user_data: UserData::default(),
        }
    }
}
