use std::env;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use image::imageops::FilterType;
use image::{GrayImage, Luma};
use rand::rngs::StdRng;
use rand::SeedableRng;
use scribble::{scribble, Canvas, Options, Point, Source};

const WORKING_WIDTH: u32 = 400;
const CANVAS_SCALE: f64 = 4.0;

// White canvas at a multiple of the working resolution; segments land at
// scaled coordinates so the drawing comes out crisper than the buffer the
// walk actually ran on.
struct ImageCanvas {
    image: GrayImage,
    scale: f64,
}

impl ImageCanvas {
    fn new(width: u32, height: u32, scale: f64) -> Self {
        Self {
            image: GrayImage::from_pixel(
                (f64::from(width) * scale) as u32,
                (f64::from(height) * scale) as u32,
                Luma([255]),
            ),
            scale,
        }
    }
}

impl Canvas for ImageCanvas {
    fn segment(&mut self, start: Point, finish: Point) {
        let (sx, sy) = start.coords(self.scale);
        let (fx, fy) = finish.coords(self.scale);
        imageproc::drawing::draw_line_segment_mut(
            &mut self.image,
            (sx as f32, sy as f32),
            (fx as f32, fy as f32),
            Luma([0]),
        );
    }
}

fn run(input: &Path) -> Result<(), Box<dyn Error>> {
    let decoded = image::open(input)?.to_luma8();
    let gray = if decoded.width() > WORKING_WIDTH {
        let height = decoded.height() * WORKING_WIDTH / decoded.width();
        image::imageops::resize(&decoded, WORKING_WIDTH, height, FilterType::Triangle)
    } else {
        decoded
    };

    let (width, height) = gray.dimensions();
    let source = Source::new(width, height, gray.into_raw());
    let mut canvas = ImageCanvas::new(width, height, CANVAS_SCALE);

    let squiggles = scribble(
        source,
        &mut canvas,
        StdRng::from_entropy(),
        Options::default(),
    );
    log::info!("finished after {squiggles} squiggles");

    let output = output_path(input);
    canvas.image.save(&output)?;
    println!("{}", output.display());
    Ok(())
}

fn output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".to_owned());
    input.with_file_name(format!("{stem}.scribble.png"))
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        let name = args.first().map_or("scribble", String::as_str);
        eprintln!("usage: {name} <image>");
        return ExitCode::FAILURE;
    }

    match run(Path::new(&args[1])) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("scribble: {err}");
            ExitCode::FAILURE
        }
    }
}
