mod point_layout;
pub use self::point_layout::*;
