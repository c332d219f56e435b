//! CLI application for landmark-driven face swapping.
//!
//! Usage:
//!   face-graft <source> <dest>                   # Swap onto every face
//!   face-graft <source> <dest> -o out.png        # Choose the output file
//!   face-graft <source> <dest> --json            # JSON summary on stdout
//!
//! Landmarks are read from JSON sidecars (`photo.png.landmarks.json`)
//! unless explicit landmark files are given.

use clap::Parser;
use face_graft::{
    faces_from_json, DetectedFace, FaceSwapper, LandmarkDetector, SidecarDetector, SourceFace,
    SwapOutcome,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "face-graft")]
#[command(author, version, about = "Swap a source face onto every face in an image", long_about = None)]
struct Args {
    /// Source face image
    #[arg(required = true)]
    source: PathBuf,

    /// Destination image whose faces get replaced
    #[arg(required = true)]
    dest: PathBuf,

    /// Landmark file for the source image (default: its sidecar)
    #[arg(long)]
    source_landmarks: Option<PathBuf>,

    /// Landmark file for the destination image (default: its sidecar)
    #[arg(long)]
    dest_landmarks: Option<PathBuf>,

    /// Output image file
    #[arg(short, long, default_value = "swapped.png")]
    output: PathBuf,

    /// Print a JSON summary instead of text
    #[arg(short, long)]
    json: bool,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Output structure for JSON serialization
#[derive(Serialize)]
struct Output {
    source: String,
    destination: String,
    width: u32,
    height: u32,
    faces_swapped: usize,
    faces: Vec<FaceOutput>,
    output: Option<String>,
}

#[derive(Serialize)]
struct FaceOutput {
    /// Face index (1-based)
    index: usize,
    /// Landmark extent in the destination image
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    match run(&args) {
        Ok(true) => {}
        // The destination held no faces; nothing was written.
        Ok(false) => std::process::exit(2),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn run(args: &Args) -> Result<bool, Box<dyn std::error::Error>> {
    // Prepare the source face
    if args.verbose {
        eprintln!("Loading source face from {:?}...", args.source);
    }
    let source_image = image::open(&args.source)?.to_rgb8();
    let source_faces = load_faces(&args.source, args.source_landmarks.as_deref())?;
    let source_face = single_source_face(source_faces)?;
    let swapper = FaceSwapper::new(SourceFace::new(source_image, source_face.landmarks)?);

    // Load the destination and its faces
    if args.verbose {
        eprintln!("Loading destination image {:?}...", args.dest);
    }
    let dest_image = image::open(&args.dest)?.to_rgb8();
    let (width, height) = dest_image.dimensions();
    let faces = load_faces(&args.dest, args.dest_landmarks.as_deref())?;

    if args.verbose {
        eprintln!("Found {} face(s), swapping...", faces.len());
    }
    let outcome = swapper.apply(&dest_image, &faces)?;

    let swapped = match &outcome {
        SwapOutcome::Swapped(result) => {
            result.save(&args.output)?;
            if args.verbose {
                eprintln!("Output written to {:?}", args.output);
            }
            true
        }
        SwapOutcome::NoFaces => false,
    };

    let face_outputs = faces
        .iter()
        .enumerate()
        .map(|(i, face)| FaceOutput {
            index: i + 1,
            x: face.rect.x,
            y: face.rect.y,
            width: face.rect.width,
            height: face.rect.height,
        })
        .collect();

    let output = Output {
        source: args.source.display().to_string(),
        destination: args.dest.display().to_string(),
        width,
        height,
        faces_swapped: faces.len(),
        faces: face_outputs,
        output: swapped.then(|| args.output.display().to_string()),
    };

    let output_str = if args.json {
        serde_json::to_string_pretty(&output)?
    } else {
        format_human_readable(&output)
    };
    println!("{}", output_str);

    Ok(swapped)
}

/// Faces for an image, from an explicit landmark file or the sidecar.
fn load_faces(
    image: &Path,
    landmark_file: Option<&Path>,
) -> Result<Vec<DetectedFace>, Box<dyn std::error::Error>> {
    let faces = match landmark_file {
        Some(path) => faces_from_json(&std::fs::read_to_string(path)?)?,
        None => SidecarDetector::new().detect(image)?,
    };
    Ok(faces)
}

/// The source image must hold exactly one face; anything else is refused
/// rather than silently resolved to the first.
fn single_source_face(mut faces: Vec<DetectedFace>) -> Result<DetectedFace, String> {
    if faces.len() > 1 {
        return Err(format!(
            "Found {} faces in the source image; need exactly one",
            faces.len()
        ));
    }
    faces
        .pop()
        .ok_or_else(|| "No face found in the source image".to_string())
}

fn format_human_readable(output: &Output) -> String {
    let mut s = String::new();

    s.push_str(&format!("Source: {}\n", output.source));
    s.push_str(&format!(
        "Destination: {} ({}x{})\n",
        output.destination, output.width, output.height
    ));

    if output.faces.is_empty() {
        s.push_str("\nNo faces found in the destination image.\n");
        return s;
    }

    s.push_str(&format!("Faces swapped: {}\n", output.faces_swapped));
    for face in &output.faces {
        s.push_str(&format!(
            "  Face {}: {}x{} at ({}, {})\n",
            face.index, face.width, face.height, face.x, face.y
        ));
    }
    if let Some(ref path) = output.output {
        s.push_str(&format!("\nOutput written to {}\n", path));
    }

    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use face_graft::{Landmarks, Point, LANDMARK_COUNT};

    fn face_at(cx: f32) -> DetectedFace {
        let points = (0..LANDMARK_COUNT)
            .map(|i| {
                let angle = i as f32 / LANDMARK_COUNT as f32 * std::f32::consts::TAU;
                Point::new(cx + 30.0 * angle.cos(), 80.0 + 40.0 * angle.sin())
            })
            .collect();
        DetectedFace::from_landmarks(Landmarks::new(points).unwrap())
    }

    #[test]
    fn source_needs_exactly_one_face() {
        assert!(single_source_face(vec![]).is_err());
        assert!(single_source_face(vec![face_at(60.0)]).is_ok());

        let err = single_source_face(vec![face_at(60.0), face_at(160.0)]).unwrap_err();
        assert!(err.contains("need exactly one"), "unexpected message: {}", err);
    }
}
