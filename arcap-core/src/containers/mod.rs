mod point;
pub use self::point::*;

mod ring_buffer;
pub use self::ring_buffer::*;

mod object3d;
pub use self::object3d::*;
