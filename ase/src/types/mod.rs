mod cel;
mod image;
mod layer;
mod palette;
mod slice;
mod sprite;
mod tag;
mod tileset;
mod user_data;

pub use self::cel::*;
pub use self::image::*;
pub use self::layer::*;
pub use self::palette::*;
pub use self::slice::*;
pub use self::sprite::*;
pub use self::tag::*;
pub use self::tileset::*;
pub use self::user_data::*;
