use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use arcap_core::containers::Object3D;
use arcap_core::layout::PointLayout;
use arcap_io::base::PointReader;
use arcap_io::ply::PlyReader;
use clap::{App, Arg};

struct Args {
    pub input_file: PathBuf,
    pub detailed: bool,
}

fn get_args() -> Result<Args> {
    let matches = App::new("arcap info")
        .version("0.1")
        .about("Prints information about the given PLY file")
        .arg(
            Arg::with_name("INPUT")
                .short("i")
                .takes_value(true)
                .value_name("INPUT")
                .help("Input PLY file")
                .required(true),
        )
        .arg(
            Arg::with_name("DETAILED")
                .short("d")
                .long("detailed")
                .help("Output a detailed analysis of the file, showing the ranges of all vertex attributes"),
        )
        .get_matches();

    let input_file = PathBuf::from(matches.value_of("INPUT").context("INPUT is required")?);
    let detailed = matches.is_present("DETAILED");

    Ok(Args {
        input_file,
        detailed,
    })
}

fn print_attributes(point_layout: &PointLayout) {
    println!("Attributes");
    for attribute in point_layout.attributes() {
        println!("\t{}", attribute.name());
    }
}

fn analyze_object(object: &Object3D) {
    if let Some(bounds) = object.bounds() {
        let (min, max) = (bounds.min(), bounds.max());
        println!("\tX:                      {}  {}", min.x, max.x);
        println!("\tY:                      {}  {}", min.y, max.y);
        println!("\tZ:                      {}  {}", min.z, max.z);
    }
    if object.has_colors() {
        for (channel, name) in ["R", "G", "B"].iter().enumerate() {
            let values = object.vertex_colors().iter().map(|c| c[channel]);
            let min = values.clone().fold(f32::INFINITY, f32::min);
            let max = values.fold(f32::NEG_INFINITY, f32::max);
            println!("\tColor {}:                {}  {}", name, min, max);
        }
    }
    if object.has_confidence() {
        let mut histogram = [0usize; 3];
        for level in object.vertex_confidence() {
            histogram[(*level as usize).min(2)] += 1;
        }
        println!(
            "\tConfidence:             low {}  medium {}  high {}",
            histogram[0], histogram[1], histogram[2]
        );
    }
    if object.has_normals() {
        let upwards = object.vertex_normals().iter().filter(|n| n.z >= 0.0).count();
        println!("\tNormals pointing up:    {} of {}", upwards, object.len());
    }
    println!("\tTriangles:              {}", object.triangles().len());
}

fn main() -> Result<()> {
    pretty_env_logger::init();
    let args = get_args()?;
    let mut reader = PlyReader::from_path(&args.input_file)?;
    println!("arcap info report for {}", args.input_file.display());
    println!("{}", reader.get_metadata());
    print_attributes(reader.get_default_point_layout());

    if args.detailed {
        let t_start = Instant::now();
        println!("Analyzing all vertex attributes...");
        let object = reader.read()?;
        analyze_object(&object);
        println!("Took {:.2}s", t_start.elapsed().as_secs_f64());
    }

    Ok(())
}
