//! Runs processing operators in external programs
//!
//! The object is handed over as a binary PLY file in a temporary directory. The program is invoked as
//! `program [args...] <input.ply> <output.ply> <operator> [parameter=value...]` and must write its result to the
//! output path. Triangles the program writes as faces are read back.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use arcap_algorithms::error::{ProcessingError, ProcessingResult};
use arcap_algorithms::pipeline::{GeometryBackend, Operator};
use arcap_core::containers::Object3D;
use log::{info, warn};

use crate::base::{read_object, PointWriter};
use crate::ply::{PlyFormat, PlyWriter};

/// A [GeometryBackend] that delegates every operator to an external program
#[derive(Debug, Clone)]
pub struct CommandBackend {
    program: PathBuf,
    args: Vec<OsString>,
    name: String,
}

impl CommandBackend {
    pub fn new<P: AsRef<Path>>(program: P) -> Self {
        Self {
            name: format!("command ({})", program.as_ref().display()),
            program: program.as_ref().to_owned(),
            args: vec![],
        }
    }

    /// Adds a fixed argument that is passed before the file paths
    pub fn arg<S: Into<OsString>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// The command line arguments describing `operator`
pub fn operator_arguments(operator: &Operator) -> Vec<String> {
    let parameters = match *operator {
        Operator::VoxelDownsample { voxel_size } => vec![format!("voxel_size={}", voxel_size)],
        Operator::StatisticalOutlierRemoval {
            neighbors,
            std_ratio,
        } => vec![
            format!("neighbors={}", neighbors),
            format!("std_ratio={}", std_ratio),
        ],
        Operator::RadiusOutlierRemoval {
            min_neighbors,
            radius,
        } => vec![
            format!("min_neighbors={}", min_neighbors),
            format!("radius={}", radius),
        ],
        Operator::NormalsEstimation {
            radius,
            max_neighbors,
        } => vec![
            format!("radius={}", radius),
            format!("max_neighbors={}", max_neighbors),
        ],
        Operator::PoissonSurfaceReconstruction { depth } => vec![format!("depth={}", depth)],
    };
    std::iter::once(operator.name().to_owned())
        .chain(parameters)
        .collect()
}

/// io errors are failures of the temporary storage, everything else means the tool did not produce a usable result
fn storage_or_unavailable(error: anyhow::Error, what: &str) -> ProcessingError {
    match error.downcast::<io::Error>() {
        Ok(io_error) => ProcessingError::TemporaryStorageFailure(io_error),
        Err(error) => ProcessingError::ProcessingUnavailable(format!("{}: {:#}", what, error)),
    }
}

impl GeometryBackend for CommandBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, operator: &Operator, object: &Object3D) -> ProcessingResult<Object3D> {
        if let Operator::PoissonSurfaceReconstruction { .. } = operator {
            if !object.has_normals() {
                return Err(ProcessingError::MissingNormals);
            }
        }

        let start = Instant::now();
        let directory = tempfile::Builder::new().prefix("arcap-").tempdir()?;
        let input = directory.path().join("input.ply");
        let output = directory.path().join("output.ply");

        let mut writer = PlyWriter::from_path(&input, PlyFormat::BinaryLittleEndian)
            .map_err(|e| storage_or_unavailable(e, "could not create the input file"))?;
        writer.write_faces(true);
        writer
            .write(object)
            .and_then(|_| writer.flush())
            .map_err(|e| storage_or_unavailable(e, "could not write the input file"))?;
        drop(writer);

        let result = Command::new(&self.program)
            .args(&self.args)
            .arg(&input)
            .arg(&output)
            .args(operator_arguments(operator))
            .output()
            .map_err(|e| {
                ProcessingError::ProcessingUnavailable(format!(
                    "could not run {}: {}",
                    self.program.display(),
                    e
                ))
            })?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            warn!("{} failed: {}", self.program.display(), stderr.trim_end());
            return Err(ProcessingError::ProcessingUnavailable(format!(
                "{} exited with {}",
                self.program.display(),
                result.status
            )));
        }
        if !output.exists() {
            return Err(ProcessingError::ProcessingUnavailable(format!(
                "{} did not write {}",
                self.program.display(),
                output.display()
            )));
        }

        let processed = read_object(&output)
            .map_err(|e| storage_or_unavailable(e, "could not read the output file"))?;
        info!(
            "{} on {}: {} -> {} vertices in {:.2?}",
            operator,
            self.name,
            object.len(),
            processed.len(),
            start.elapsed()
        );
        Ok(processed)
    }
}
