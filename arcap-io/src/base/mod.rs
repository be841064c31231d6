use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use arcap_core::containers::Object3D;

use crate::ply::{PlyFormat, PlyReader, PlyWriter};

mod reader;
pub use self::reader::*;

mod writer;
pub use self::writer::*;

/// Checks that `path` has a file extension that arcap can read and write
fn check_extension(path: &Path) -> Result<()> {
    let extension = path
        .extension()
        .ok_or_else(|| anyhow!("File {} has no file extension", path.display()))?;
    let extension_str = extension.to_str().ok_or_else(|| {
        anyhow!(
            "File extension of path {} is no valid Unicode string",
            path.display()
        )
    })?;
    match extension_str.to_lowercase().as_str() {
        "ply" => Ok(()),
        _ => bail!("Unsupported file format of file {}", path.display()),
    }
}

/// Reads the object stored in the file at `path`
pub fn read_object<P: AsRef<Path>>(path: P) -> Result<Object3D> {
    check_extension(path.as_ref())?;
    let mut reader = PlyReader::from_path(path.as_ref()).context(format!(
        "Could not create reader for file {}",
        path.as_ref().display()
    ))?;
    reader.read()
}

/// Writes `object` into the file at `path`, using the given `format`
pub fn write_object<P: AsRef<Path>>(object: &Object3D, path: P, format: PlyFormat) -> Result<()> {
    check_extension(path.as_ref())?;
    let mut writer = PlyWriter::from_path(path.as_ref(), format).context(format!(
        "Could not create writer for file {}",
        path.as_ref().display()
    ))?;
    writer.write(object).context("Failed to write object")?;
    writer.flush()
}
