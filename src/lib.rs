//! Turns a grayscale image into one continuous "scribble": a greedy walk
//! that keeps heading for locally dark pixels, lightening the buffer behind
//! itself until the whole image is bright enough to stop.

use auto_impl::auto_impl;
use genawaiter::rc::Gen;
use rand::Rng;
use std::ops::RangeInclusive;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Clamps each coordinate independently into its closed interval,
    /// leaving an axis untouched when no bound is given.
    #[must_use]
    pub fn constrain(
        self,
        x: Option<RangeInclusive<i32>>,
        y: Option<RangeInclusive<i32>>,
    ) -> Self {
        fn clamp(v: i32, bound: Option<RangeInclusive<i32>>) -> i32 {
            match bound {
                Some(bound) => v.max(*bound.start()).min(*bound.end()),
                None => v,
            }
        }
        Self {
            x: clamp(self.x, x),
            y: clamp(self.y, y),
        }
    }

    /// Coordinates scaled for rendering at a different resolution than the
    /// working buffer, truncated to integers.
    pub fn coords(self, scale: f64) -> (i32, i32) {
        (
            (f64::from(self.x) * scale) as i32,
            (f64::from(self.y) * scale) as i32,
        )
    }
}

/// Bresenham walk from `start` towards `finish`, yielding `start` first.
///
/// Iteration stops as soon as *either* axis lands on the target, so
/// axis-aligned segments yield only `start` and the final point is not
/// guaranteed to be `finish`. The darkest-neighbor search and the lighten
/// pass are tuned to this exact stop rule; keep it.
pub fn bresenham(start: Point, finish: Point) -> impl Iterator<Item = Point> {
    Gen::new(move |co| async move {
        let dx = (finish.x - start.x).abs();
        let dy = (finish.y - start.y).abs();
        let sx = if start.x < finish.x { 1 } else { -1 };
        let sy = if start.y < finish.y { 1 } else { -1 };
        let mut err = dx - dy;

        let mut loc = start;
        co.yield_(loc).await;

        while loc.x != finish.x && loc.y != finish.y {
            if err * 2 > -dy {
                err -= dy;
                loc.x += sx;
            }
            if err * 2 < dx {
                err += dx;
                loc.y += sy;
            }
            co.yield_(loc).await;
        }
    })
    .into_iter()
}

/// Picks the opening angle for a darkest-neighbor fan of test rays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AngleMethod {
    /// Random degrees in `[-72, -52]`. The bias is intentional; it gives the
    /// walk a consistent slant instead of a symmetric fan.
    #[default]
    Spitfire,
}

impl AngleMethod {
    pub fn start_angle<R: Rng>(self, rng: &mut R) -> i32 {
        match self {
            AngleMethod::Spitfire => rng.gen_range(-72..=-52),
        }
    }
}

/// The working buffer: a single-channel intensity grid the walk reads and
/// lightens in place. Distinct from the output canvas.
#[derive(Clone, Debug)]
pub struct Source {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Source {
    /// Row-major intensities, `0` black through `255` white.
    ///
    /// # Panics
    ///
    /// Panics if the dimensions are zero or don't match `data.len()`.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        assert!(width > 0 && height > 0, "empty source");
        assert_eq!(
            (width * height) as usize,
            data.len(),
            "data length doesn't match dimensions"
        );
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Intensity at `pt`, which must be in bounds (see [`Source::clamp`]).
    pub fn pixel(&self, pt: Point) -> u8 {
        self.data[pt.y as usize * self.width as usize + pt.x as usize]
    }

    fn set_pixel(&mut self, pt: Point, value: u8) {
        self.data[pt.y as usize * self.width as usize + pt.x as usize] = value;
    }

    /// Clamps a point into this buffer's bounds.
    pub fn clamp(&self, pt: Point) -> Point {
        pt.constrain(
            Some(0..=self.width as i32 - 1),
            Some(0..=self.height as i32 - 1),
        )
    }

    /// Exact arithmetic mean over every pixel.
    pub fn average_brightness(&self) -> f64 {
        let total: u64 = self.data.iter().map(|&v| u64::from(v)).sum();
        total as f64 / self.data.len() as f64
    }

    /// Box downsample by an integer factor (dimensions truncate).
    pub fn shrunk(&self, factor: u32) -> Source {
        let width = self.width / factor;
        let height = self.height / factor;
        let mut data = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                let mut sum = 0u32;
                for dy in 0..factor {
                    for dx in 0..factor {
                        let row = (y * factor + dy) as usize;
                        let col = (x * factor + dx) as usize;
                        sum += u32::from(self.data[row * self.width as usize + col]);
                    }
                }
                data.push((sum / (factor * factor)) as u8);
            }
        }
        Source {
            width,
            height,
            data,
        }
    }

    /// Finds a fresh dark region to restart the walk from.
    ///
    /// Scans a `down_sample`-times-shrunk copy of the buffer for its darkest
    /// cell. Each new minimum is recorded with `random[0, 1)` added to the
    /// value to beat, so equally dark regions don't always lose to the first
    /// one scanned. The winning cell maps back to working coordinates with
    /// per-axis jitter of the same magnitude, which can land past the edge;
    /// callers clamp.
    pub fn darkest_area<R: Rng>(&self, rng: &mut R, down_sample: u32) -> Point {
        let condensed = self.shrunk(down_sample);

        let mut darkest_value = f64::INFINITY;
        let mut darkest_loc = Point::new(0, 0);
        for x in 0..condensed.width as i32 {
            for y in 0..condensed.height as i32 {
                let value = f64::from(condensed.pixel(Point::new(x, y)));
                if value < darkest_value {
                    darkest_value = value + rng.gen::<f64>();
                    darkest_loc = Point::new(x, y);
                }
            }
        }

        Point::new(
            (f64::from(darkest_loc.x) * (f64::from(down_sample) + rng.gen::<f64>())) as i32,
            (f64::from(darkest_loc.y) * (f64::from(down_sample) + rng.gen::<f64>())) as i32,
        )
    }

    /// Picks the next walk point: the pixel with the lowest running mean
    /// brightness along any of `tests` rays of `line_length` fanned out from
    /// `start` at `360 / tests` degree steps.
    ///
    /// The running mean is recomputed after every rasterized pixel and the
    /// best is tracked per pixel across the whole fan, so the winner is
    /// usually an interior point of some ray rather than an endpoint.
    /// Returns `None` only if no pixel was visited at all, which takes
    /// degenerate geometry (the sentinel, 256, is brighter than any pixel).
    pub fn darkest_neighbor<R: Rng>(
        &self,
        rng: &mut R,
        start: Point,
        line_length: u32,
        tests: u32,
        angle_method: AngleMethod,
    ) -> Option<Point> {
        let start_angle = angle_method.start_angle(rng);
        let start = self.clamp(start);

        let mut darkest_value = 256.0_f64;
        let mut darkest_point = None;

        for step in 0..tests {
            let angle = (f64::from(start_angle) + 360.0 / f64::from(tests) * f64::from(step))
                .to_radians();
            let finish = self.clamp(Point::new(
                start.x + (angle.cos() * f64::from(line_length)) as i32,
                start.y + (angle.sin() * f64::from(line_length)) as i32,
            ));

            let mut bright_sum = 0u32;
            let mut bright_count = 0u32;
            for pt in bresenham(start, finish) {
                bright_sum += u32::from(self.pixel(pt));
                bright_count += 1;
                let mean = f64::from(bright_sum) / f64::from(bright_count);
                if mean < darkest_value {
                    darkest_value = mean;
                    darkest_point = Some(pt);
                }
            }
        }

        darkest_point
    }

    /// Raises every pixel on the rasterized segment by `amount`, saturating
    /// at white. This is how the walk erases ink behind itself so the greedy
    /// search doesn't retrace the same region forever.
    pub fn lighten(&mut self, start: Point, finish: Point, amount: u8) {
        for pt in bresenham(start, finish) {
            let value = self.pixel(pt).saturating_add(amount);
            self.set_pixel(pt, value);
        }
    }
}

/// Sink for the drawn segments. Consecutive segments of one squiggle share
/// an endpoint, so the sink sees a connected polyline per squiggle.
#[auto_impl(&mut, Box)]
pub trait Canvas {
    fn segment(&mut self, start: Point, finish: Point);
}

#[derive(Clone, Debug)]
pub struct Options {
    /// Stop once [`Source::average_brightness`] reaches this.
    pub threshold: f64,
    /// Greedy steps per squiggle before relocating.
    pub squiggle_length: usize,
    /// Test ray length for the darkest-neighbor fan.
    pub line_length: u32,
    /// Number of test rays per fan.
    pub tests: u32,
    /// Shrink factor for darkest-area relocation.
    pub down_sample: u32,
    /// Brightness added along each drawn segment.
    pub lighten_amount: u8,
    pub angle_method: AngleMethod,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            threshold: 240.0,
            squiggle_length: 500,
            line_length: 20,
            tests: 13,
            down_sample: 10,
            lighten_amount: 10,
            angle_method: AngleMethod::default(),
        }
    }
}

/// The driver: relocate to a dark region, walk greedily, repeat until the
/// source is light enough. Owns the source and an injected RNG so runs can
/// be made deterministic by seeding.
pub struct Scribbler<R> {
    source: Source,
    rng: R,
    options: Options,
}

impl<R: Rng> Scribbler<R> {
    pub fn new(source: Source, rng: R, options: Options) -> Self {
        Self {
            source,
            rng,
            options,
        }
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    /// One squiggle: relocate via [`Source::darkest_area`], then up to
    /// `squiggle_length` greedy segments, each lightened into the source and
    /// recorded on the canvas. Breaks early if the neighbor search comes up
    /// empty.
    pub fn squiggle(&mut self, canvas: &mut impl Canvas) {
        let start = self
            .source
            .darkest_area(&mut self.rng, self.options.down_sample);
        let mut cursor = self.source.clamp(start);

        for _ in 0..self.options.squiggle_length {
            let Some(next) = self.source.darkest_neighbor(
                &mut self.rng,
                cursor,
                self.options.line_length,
                self.options.tests,
                self.options.angle_method,
            ) else {
                break;
            };
            self.source.lighten(cursor, next, self.options.lighten_amount);
            canvas.segment(cursor, next);
            cursor = next;
        }
    }

    /// Runs squiggles until the brightness threshold is met, returning how
    /// many were drawn. An already-light source draws nothing.
    pub fn run(&mut self, canvas: &mut impl Canvas) -> u32 {
        let mut squiggles = 0;
        while self.source.average_brightness() < self.options.threshold {
            squiggles += 1;
            self.squiggle(canvas);
            log::info!(
                "squiggles = {}, brightness = {:.2}",
                squiggles,
                self.source.average_brightness()
            );
        }
        squiggles
    }
}

/// Scribbles `source` onto `canvas`, returning the squiggle count.
pub fn scribble(
    source: Source,
    canvas: &mut impl Canvas,
    rng: impl Rng,
    options: Options,
) -> u32 {
    Scribbler::new(source, rng, options).run(canvas)
}
