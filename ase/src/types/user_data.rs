use crate::types::Rgba32;

/// Free-form annotation attachable to layers, cels, tags, slices,
/// tilesets and the sprite itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserData {
    pub text: Option<String>,
    pub color: Option<Rgba32>,
}

impl UserData {
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            color: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.color.is_none()
    }
}
