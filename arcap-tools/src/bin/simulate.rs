use std::f32::consts::TAU;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use arcap_algorithms::pipeline::{
    GeometryBackend, NativeBackend, ObjectHistory, Operator, Pipeline, ProcessingWorker,
};
use arcap_tools::processing::{export_comments, run_pipeline};
use arcap_capture::config::CaptureConfig;
use arcap_capture::engine::{AccumulationEngine, FrameOutcome};
use arcap_capture::session::CaptureSession;
use arcap_capture::unprojection::CameraIntrinsics;
use arcap_core::containers::ConfidenceThreshold;
use arcap_io::base::PointWriter;
use arcap_io::interop::CommandBackend;
use arcap_io::ply::{PlyFormat, PlyWriter};
use arcap_tools::synthetic::{OrbitCamera, Scene, SyntheticSource};
use clap::{App, Arg};
use log::info;

struct Args {
    pub output_file: PathBuf,
    pub frames: usize,
    pub config: CaptureConfig,
    pub pipeline: Pipeline,
    pub confidence: ConfidenceThreshold,
    pub format: PlyFormat,
    pub tool: Option<PathBuf>,
    pub faces: bool,
    pub seed: u64,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> Result<T> {
    let file = File::open(path).context(format!("Could not open {}", path))?;
    serde_json::from_reader(BufReader::new(file)).context(format!("Could not parse {}", path))
}

fn get_args() -> Result<Args> {
    let matches = App::new("arcap simulate")
        .version("0.1")
        .about("Captures a synthetic scene from an orbiting camera, processes the captured points and writes them as PLY")
        .arg(
            Arg::with_name("OUTPUT")
                .short("o")
                .long("output")
                .takes_value(true)
                .value_name("OUTPUT")
                .help("Output PLY file")
                .required(true),
        )
        .arg(
            Arg::with_name("FRAMES")
                .short("f")
                .long("frames")
                .takes_value(true)
                .default_value("90")
                .help("Number of frames rendered during one orbit"),
        )
        .arg(
            Arg::with_name("CONFIG")
                .short("c")
                .long("config")
                .takes_value(true)
                .help("JSON file with the capture configuration"),
        )
        .arg(
            Arg::with_name("PIPELINE")
                .short("p")
                .long("pipeline")
                .takes_value(true)
                .help("JSON file describing the processing operators, e.g. {\"operators\": [{\"operator\": \"voxel_downsample\", \"voxel_size\": 0.02}]}"),
        )
        .arg(
            Arg::with_name("VOXEL_SIZE")
                .long("voxel-size")
                .takes_value(true)
                .conflicts_with("PIPELINE")
                .help("Downsample the capture with the given voxel size"),
        )
        .arg(
            Arg::with_name("RECONSTRUCT")
                .long("reconstruct")
                .takes_value(true)
                .value_name("DEPTH")
                .conflicts_with("PIPELINE")
                .help("Estimate normals and reconstruct a surface with the given octree depth, see --faces"),
        )
        .arg(
            Arg::with_name("HIGH_CONFIDENCE")
                .long("high-confidence")
                .help("Only keep points with high sensor confidence"),
        )
        .arg(
            Arg::with_name("BINARY")
                .short("b")
                .long("binary")
                .help("Write binary little endian PLY instead of ASCII"),
        )
        .arg(
            Arg::with_name("FACES")
                .long("faces")
                .help("Also write the triangles of the processed object"),
        )
        .arg(
            Arg::with_name("TOOL")
                .long("tool")
                .takes_value(true)
                .help("Run the operators with this external program instead of in process"),
        )
        .arg(
            Arg::with_name("SEED")
                .long("seed")
                .takes_value(true)
                .default_value("0")
                .help("Seed for the depth noise"),
        )
        .get_matches();

    let output_file = PathBuf::from(matches.value_of("OUTPUT").context("OUTPUT is required")?);
    let frames = matches
        .value_of("FRAMES")
        .unwrap_or("90")
        .parse::<usize>()
        .context("FRAMES must be a number")?;
    let config = match matches.value_of("CONFIG") {
        Some(path) => read_json(path)?,
        None => CaptureConfig::default(),
    };

    let pipeline = match matches.value_of("PIPELINE") {
        Some(path) => read_json(path)?,
        None => {
            let mut operators = vec![];
            if let Some(voxel_size) = matches.value_of("VOXEL_SIZE") {
                operators.push(Operator::VoxelDownsample {
                    voxel_size: voxel_size.parse().context("VOXEL_SIZE must be a number")?,
                });
            }
            if let Some(depth) = matches.value_of("RECONSTRUCT") {
                operators.push(Operator::statistical_outlier_removal());
                operators.push(Operator::normals_estimation());
                operators.push(Operator::PoissonSurfaceReconstruction {
                    depth: depth.parse().context("DEPTH must be a number")?,
                });
            }
            Pipeline::new(operators)
        }
    };

    Ok(Args {
        output_file,
        frames,
        config,
        pipeline,
        confidence: if matches.is_present("HIGH_CONFIDENCE") {
            ConfidenceThreshold::High
        } else {
            ConfidenceThreshold::Medium
        },
        format: if matches.is_present("BINARY") {
            PlyFormat::BinaryLittleEndian
        } else {
            PlyFormat::Ascii
        },
        tool: matches.value_of("TOOL").map(PathBuf::from),
        faces: matches.is_present("FACES"),
        seed: matches
            .value_of("SEED")
            .unwrap_or("0")
            .parse()
            .context("SEED must be a number")?,
    })
}

#[derive(Debug, Default)]
struct Statistics {
    accumulated: usize,
    below_threshold: usize,
    skipped_frames: usize,
    skipped_samples: usize,
}

fn main() -> Result<()> {
    pretty_env_logger::init();
    let args = get_args()?;
    if args.frames == 0 {
        bail!("At least one frame is needed");
    }

    let session = Arc::new(CaptureSession::new());
    session.set_confidence_threshold(args.confidence);
    session.start_session();
    session.resume_capture()?;
    let mut engine = AccumulationEngine::new(&args.config, session.clone());

    let statistics = Arc::new(Mutex::new(Statistics::default()));
    let listener_statistics = statistics.clone();
    engine.on_frame_processed(move |report| {
        if let Ok(mut statistics) = listener_statistics.lock() {
            match report.outcome {
                FrameOutcome::Accumulated => statistics.accumulated += 1,
                FrameOutcome::BelowMotionThreshold => statistics.below_threshold += 1,
                _ => statistics.skipped_frames += 1,
            }
            statistics.skipped_samples += report.skipped;
        }
    });

    let intrinsics = CameraIntrinsics::new(200.0, 200.0, 128.0, 96.0, 256, 192);
    let mut source = SyntheticSource::new(Scene::default(), intrinsics, 0.003, args.seed);
    let camera = OrbitCamera::default();
    let t_start = Instant::now();
    for frame in 0..args.frames {
        let angle = TAU * frame as f32 / args.frames as f32;
        source.render(&camera.pose(angle));
        engine.process_frame(&source);
    }
    if let Ok(statistics) = statistics.lock() {
        info!(
            "Captured {} frames in {:.2?}: {:?}",
            args.frames,
            t_start.elapsed(),
            statistics
        );
    }

    let captured = engine.snapshot_object();
    println!(
        "Captured {} points ({} live in the ring buffer)",
        captured.len(),
        engine.reader().live_count()
    );

    let backend: Arc<dyn GeometryBackend> = match &args.tool {
        Some(tool) => Arc::new(CommandBackend::new(tool)),
        None => Arc::new(NativeBackend),
    };
    let worker = ProcessingWorker::new(backend);
    let mut history = ObjectHistory::new(captured);
    let committed = run_pipeline(&worker, &mut history, &args.pipeline)?;
    for operator in &committed {
        println!("{}: done", operator);
    }
    println!("{} vertices after processing", history.current().len());

    let mut writer = PlyWriter::from_path(&args.output_file, args.format)?;
    for comment in export_comments(&session, &committed) {
        writer.add_comment(&comment);
    }
    writer.write_faces(args.faces);
    writer.write(history.current())?;
    writer.flush()?;
    println!("Wrote {}", args.output_file.display());

    Ok(())
}
