mod header;
pub use self::header::*;

mod metadata;
pub use self::metadata::*;

mod reader;
pub use self::reader::*;

mod writer;
pub use self::writer::*;
