//! Software 2D surface the effects engine draws into.
//!
//! Pixels are stored as premultiplied RGBA floats so that additive
//! (`Lighter`) and alpha (`SourceOver`) compositing share one code path, and
//! the bloom pass can composite one canvas onto another without conversions.
//! Storage, resampling and file encoding go through `image`.

use std::{borrow::Cow, fmt, path::Path};

use image::{
    imageops::{self, FilterType},
    RgbImage, Rgba32FImage,
};
use serde::{Deserialize, Serialize};

/// 8-bit sRGB colour. Serialised as a `#rrggbb` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn from_u32(value: u32) -> Self {
        Self::new(
            ((value >> 16) & 0xff) as u8,
            ((value >> 8) & 0xff) as u8,
            (value & 0xff) as u8,
        )
    }

    /// Parses `#rrggbb`, `rgb(r, g, b)` or `rgba(r, g, b, a)` (alpha ignored).
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if let Some(hex) = value.strip_prefix('#') {
            if hex.len() != 6 {
                return None;
            }
            return u32::from_str_radix(hex, 16).ok().map(Self::from_u32);
        }

        let inner = value
            .strip_prefix("rgba(")
            .or_else(|| value.strip_prefix("rgb("))?
            .strip_suffix(')')?;
        let mut parts = inner.split(',').map(|part| part.trim().parse::<u8>());
        let r = parts.next()?.ok()?;
        let g = parts.next()?.ok()?;
        let b = parts.next()?.ok()?;
        Some(Self::new(r, g, b))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Rotates the hue by `shift` radians around the grey axis.
    pub fn shift_hue(self, shift: f32) -> Self {
        let (sin, cos) = shift.sin_cos();
        let (r, g, b) = (self.r as f32, self.g as f32, self.b as f32);
        let diag = 0.667 + cos * 0.333;
        let plus = 0.333 - cos * 0.333 + sin * 0.577;
        let minus = 0.333 - cos * 0.333 - sin * 0.577;
        let channel = |value: f32| value.clamp(0.0, 255.0).round() as u8;
        Self::new(
            channel(r * diag + g * plus + b * minus),
            channel(r * minus + g * diag + b * plus),
            channel(r * plus + g * minus + b * diag),
        )
    }

    /// Halfway blend towards white.
    pub fn mix_white(self) -> Self {
        let mix = |value: u8| ((255 + value as u16 + 1) / 2) as u8;
        Self::new(mix(self.r), mix(self.g), mix(self.b))
    }

    pub fn with_alpha(self, alpha: f32) -> Rgba {
        Rgba {
            r: self.r as f32 / 255.0,
            g: self.g as f32 / 255.0,
            b: self.b as f32 / 255.0,
            a: alpha.clamp(0.0, 1.0),
        }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl TryFrom<String> for Rgb {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Rgb::parse(&value).ok_or_else(|| format!("invalid colour `{value}`"))
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_hex()
    }
}

/// Straight (non-premultiplied) colour with channels in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    fn lerp(self, other: Rgba, t: f32) -> Rgba {
        Rgba {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
            a: self.a + (other.a - self.a) * t,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Blend {
    #[default]
    SourceOver,
    /// Additive compositing.
    Lighter,
}

/// Fill style sampled per pixel centre.
#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    Solid(Rgba),
    Linear {
        from: (f32, f32),
        to: (f32, f32),
        stops: Vec<(f32, Rgba)>,
    },
    Radial {
        center: (f32, f32),
        radius: f32,
        stops: Vec<(f32, Rgba)>,
    },
}

impl Paint {
    /// Vertical gradient from `top` to `bottom`.
    pub fn vertical(top: f32, bottom: f32, stops: Vec<(f32, Rgba)>) -> Self {
        Paint::Linear {
            from: (0.0, top),
            to: (0.0, bottom),
            stops,
        }
    }

    pub fn sample(&self, x: f32, y: f32) -> Rgba {
        match self {
            Paint::Solid(color) => *color,
            Paint::Linear { from, to, stops } => {
                let (dx, dy) = (to.0 - from.0, to.1 - from.1);
                let len_sq = dx * dx + dy * dy;
                let t = if len_sq <= f32::EPSILON {
                    0.0
                } else {
                    ((x - from.0) * dx + (y - from.1) * dy) / len_sq
                };
                sample_stops(stops, t)
            }
            Paint::Radial {
                center,
                radius,
                stops,
            } => {
                let dist = ((x - center.0).powi(2) + (y - center.1).powi(2)).sqrt();
                let t = if *radius <= f32::EPSILON {
                    1.0
                } else {
                    dist / radius
                };
                sample_stops(stops, t)
            }
        }
    }
}

fn sample_stops(stops: &[(f32, Rgba)], t: f32) -> Rgba {
    let Some(first) = stops.first() else {
        return Rgba::TRANSPARENT;
    };
    let t = t.clamp(0.0, 1.0);
    if t <= first.0 {
        return first.1;
    }
    for pair in stops.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if t <= b.0 {
            let span = b.0 - a.0;
            let local = if span <= f32::EPSILON {
                1.0
            } else {
                (t - a.0) / span
            };
            return a.1.lerp(b.1, local);
        }
    }
    stops[stops.len() - 1].1
}

/// RGBA float raster with premultiplied alpha.
#[derive(Clone)]
pub struct Canvas {
    buf: Rgba32FImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buf: Rgba32FImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.buf.width()
    }

    pub fn height(&self) -> u32 {
        self.buf.height()
    }

    /// Reallocates to the new size if it changed. Contents are cleared.
    pub fn resize(&mut self, width: u32, height: u32) {
        if (width, height) != self.buf.dimensions() {
            *self = Canvas::new(width, height);
        } else {
            self.clear();
        }
    }

    pub fn clear(&mut self) {
        for pixel in self.buf.pixels_mut() {
            pixel.0 = [0.0; 4];
        }
    }

    /// Premultiplied pixel value, or `None` outside the canvas.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[f32; 4]> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        Some(self.buf.get_pixel(x, y).0)
    }

    /// Fills pixels whose centre lies in `[x, x + w) x [y, y + h)`.
    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, paint: &Paint, blend: Blend, alpha: f32) {
        if w <= 0.0 || h <= 0.0 || alpha <= 0.0 {
            return;
        }
        let Some((x0, x1, y0, y1)) = self.pixel_span(x, x + w, y, y + h) else {
            return;
        };
        for py in y0..y1 {
            for px in x0..x1 {
                let color = paint.sample(px as f32 + 0.5, py as f32 + 0.5);
                self.blend_straight(px, py, color, blend, alpha);
            }
        }
    }

    /// Fills a convex polygon given in either winding order.
    pub fn fill_polygon(&mut self, points: &[(f32, f32)], paint: &Paint, blend: Blend, alpha: f32) {
        if points.len() < 3 || alpha <= 0.0 {
            return;
        }
        let (mut min_x, mut max_x) = (f32::MAX, f32::MIN);
        let (mut min_y, mut max_y) = (f32::MAX, f32::MIN);
        for &(x, y) in points {
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
        let Some((x0, x1, y0, y1)) = self.pixel_span(min_x, max_x, min_y, max_y) else {
            return;
        };

        let n = points.len();
        for py in y0..y1 {
            let cy = py as f32 + 0.5;
            for px in x0..x1 {
                let cx = px as f32 + 0.5;
                let mut positive = false;
                let mut negative = false;
                for i in 0..n {
                    let (ax, ay) = points[i];
                    let (bx, by) = points[(i + 1) % n];
                    let edge = edge_function(ax, ay, bx, by, cx, cy);
                    positive |= edge > 0.0;
                    negative |= edge < 0.0;
                }
                if positive && negative {
                    continue;
                }
                let color = paint.sample(cx, cy);
                self.blend_straight(px, py, color, blend, alpha);
            }
        }
    }

    /// Ring of `line_width` centred on the circle of `radius`.
    pub fn stroke_circle(
        &mut self,
        cx: f32,
        cy: f32,
        radius: f32,
        line_width: f32,
        color: Rgba,
        blend: Blend,
        alpha: f32,
    ) {
        if radius <= 0.0 || line_width <= 0.0 || alpha <= 0.0 {
            return;
        }
        let half = line_width * 0.5;
        let outer = radius + half;
        let Some((x0, x1, y0, y1)) = self.pixel_span(cx - outer, cx + outer, cy - outer, cy + outer)
        else {
            return;
        };
        for py in y0..y1 {
            for px in x0..x1 {
                let dx = px as f32 + 0.5 - cx;
                let dy = py as f32 + 0.5 - cy;
                let dist = (dx * dx + dy * dy).sqrt();
                if (dist - radius).abs() <= half {
                    self.blend_straight(px, py, color, blend, alpha);
                }
            }
        }
    }

    /// Copy of this canvas resampled to `width` x `height` with a triangle
    /// filter.
    pub fn resized(&self, width: u32, height: u32) -> Canvas {
        if (width, height) == self.buf.dimensions() {
            return self.clone();
        }
        if width == 0 || height == 0 || self.width() == 0 || self.height() == 0 {
            return Canvas::new(width, height);
        }
        Canvas {
            buf: imageops::resize(&self.buf, width, height, FilterType::Triangle),
        }
    }

    /// Composites `source` scaled into `[dx, dx + dw) x [dy, dy + dh)`.
    pub fn draw_canvas(
        &mut self,
        source: &Canvas,
        dx: f32,
        dy: f32,
        dw: f32,
        dh: f32,
        blend: Blend,
        alpha: f32,
    ) {
        if source.width() == 0 || source.height() == 0 || dw <= 0.0 || dh <= 0.0 || alpha <= 0.0 {
            return;
        }
        let Some((x0, x1, y0, y1)) = self.pixel_span(dx, dx + dw, dy, dy + dh) else {
            return;
        };
        let (rw, rh) = (dw.round().max(1.0) as u32, dh.round().max(1.0) as u32);
        let scaled = if (rw, rh) == source.buf.dimensions() {
            Cow::Borrowed(source)
        } else {
            Cow::Owned(source.resized(rw, rh))
        };
        let sx = rw as f32 / dw;
        let sy = rh as f32 / dh;
        for py in y0..y1 {
            let v = ((py as f32 + 0.5 - dy) * sy).floor().clamp(0.0, (rh - 1) as f32) as u32;
            for px in x0..x1 {
                let u = ((px as f32 + 0.5 - dx) * sx).floor().clamp(0.0, (rw - 1) as f32) as u32;
                let src = scaled.buf.get_pixel(u, v).0.map(|channel| channel * alpha);
                self.blend_premultiplied(px, py, src, blend);
            }
        }
    }

    /// Resamples `source` into this canvas at its current size, replacing
    /// its contents.
    pub fn downsample_from(&mut self, source: &Canvas) {
        let (width, height) = self.buf.dimensions();
        *self = source.resized(width, height);
    }

    /// Frame composited over black as 8-bit RGBA bytes.
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.buf.pixels().flat_map(|p| p.0.map(to_byte)).collect()
    }

    /// Opaque frame composited over black.
    pub fn to_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width(), self.height(), |x, y| {
            let p = self.buf.get_pixel(x, y).0;
            image::Rgb([to_byte(p[0]), to_byte(p[1]), to_byte(p[2])])
        })
    }

    /// Encodes the frame to `path`; the format follows the file extension.
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        self.to_image().save(path)?;
        Ok(())
    }

    fn pixel_span(&self, left: f32, right: f32, top: f32, bottom: f32) -> Option<(u32, u32, u32, u32)> {
        if ![left, right, top, bottom].iter().all(|v| v.is_finite()) {
            return None;
        }
        // Pixel `p` is covered when its centre `p + 0.5` lies in [left, right).
        let x0 = (left - 0.5).ceil().max(0.0);
        let x1 = (right - 0.5).ceil().min(self.width() as f32);
        let y0 = (top - 0.5).ceil().max(0.0);
        let y1 = (bottom - 0.5).ceil().min(self.height() as f32);
        if !(x0 < x1 && y0 < y1) {
            return None;
        }
        Some((x0 as u32, x1 as u32, y0 as u32, y1 as u32))
    }

    fn blend_straight(&mut self, x: u32, y: u32, color: Rgba, blend: Blend, alpha: f32) {
        let a = (color.a * alpha).clamp(0.0, 1.0);
        if a <= 0.0 {
            return;
        }
        self.blend_premultiplied(x, y, [color.r * a, color.g * a, color.b * a, a], blend);
    }

    fn blend_premultiplied(&mut self, x: u32, y: u32, src: [f32; 4], blend: Blend) {
        let dst = &mut self.buf.get_pixel_mut(x, y).0;
        match blend {
            Blend::Lighter => {
                for c in 0..4 {
                    dst[c] = (dst[c] + src[c]).min(1.0);
                }
            }
            Blend::SourceOver => {
                let inv = 1.0 - src[3].clamp(0.0, 1.0);
                for c in 0..4 {
                    dst[c] = src[c] + dst[c] * inv;
                }
            }
        }
    }
}

impl fmt::Debug for Canvas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Canvas")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

fn to_byte(value: f32) -> u8 {
    value.clamp(0.0, 1.0).mul_add(255.0, 0.5) as u8
}

#[inline(always)]
fn edge_function(x0: f32, y0: f32, x1: f32, y1: f32, px: f32, py: f32) -> f32 {
    (px - x0).mul_add(y1 - y0, -((py - y0) * (x1 - x0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgb = Rgb::new(255, 0, 0);

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn parses_hex_and_rgb_functions() {
        assert_eq!(Rgb::parse("#38bdf8"), Some(Rgb::new(0x38, 0xbd, 0xf8)));
        assert_eq!(Rgb::parse("rgb(1, 2, 3)"), Some(Rgb::new(1, 2, 3)));
        assert_eq!(Rgb::parse("rgba(10,20,30,0.5)"), Some(Rgb::new(10, 20, 30)));
        assert_eq!(Rgb::parse("#fff"), None);
        assert_eq!(Rgb::parse("teal"), None);
        assert_eq!(Rgb::new(0x22, 0xc5, 0x5e).to_hex(), "#22c55e");
    }

    #[test]
    fn serialises_as_hex_string() {
        let json = serde_json::to_string(&RED).unwrap();
        assert_eq!(json, "\"#ff0000\"");
        let back: Rgb = serde_json::from_str(&json).unwrap();
        assert_eq!(back, RED);
        assert!(serde_json::from_str::<Rgb>("\"nope\"").is_err());
    }

    #[test]
    fn zero_hue_shift_is_near_identity() {
        let color = Rgb::new(200, 100, 50);
        let shifted = color.shift_hue(0.0);
        assert!((shifted.r as i32 - 200).abs() <= 1);
        assert!((shifted.g as i32 - 100).abs() <= 1);
        assert!((shifted.b as i32 - 50).abs() <= 1);
    }

    #[test]
    fn mixes_towards_white() {
        assert_eq!(Rgb::BLACK.mix_white(), Rgb::new(128, 128, 128));
        assert_eq!(Rgb::WHITE.mix_white(), Rgb::WHITE);
    }

    #[test]
    fn fill_rect_covers_pixel_centres() {
        let mut canvas = Canvas::new(4, 4);
        canvas.fill_rect(1.0, 1.0, 2.0, 1.0, &Paint::Solid(RED.with_alpha(1.0)), Blend::SourceOver, 1.0);
        assert_eq!(canvas.pixel(1, 1), Some([1.0, 0.0, 0.0, 1.0]));
        assert_eq!(canvas.pixel(2, 1), Some([1.0, 0.0, 0.0, 1.0]));
        assert_eq!(canvas.pixel(3, 1), Some([0.0; 4]));
        assert_eq!(canvas.pixel(1, 2), Some([0.0; 4]));
        assert_eq!(canvas.pixel(4, 0), None);
    }

    #[test]
    fn lighter_accumulates_and_saturates() {
        let mut canvas = Canvas::new(1, 1);
        let paint = Paint::Solid(RED.with_alpha(0.6));
        canvas.fill_rect(0.0, 0.0, 1.0, 1.0, &paint, Blend::Lighter, 1.0);
        assert!(approx(canvas.pixel(0, 0).unwrap()[0], 0.6));
        canvas.fill_rect(0.0, 0.0, 1.0, 1.0, &paint, Blend::Lighter, 1.0);
        assert!(approx(canvas.pixel(0, 0).unwrap()[0], 1.0));
    }

    #[test]
    fn source_over_mixes_by_alpha() {
        let mut canvas = Canvas::new(1, 1);
        canvas.fill_rect(0.0, 0.0, 1.0, 1.0, &Paint::Solid(Rgb::WHITE.with_alpha(1.0)), Blend::SourceOver, 1.0);
        canvas.fill_rect(0.0, 0.0, 1.0, 1.0, &Paint::Solid(Rgb::BLACK.with_alpha(1.0)), Blend::SourceOver, 0.25);
        let p = canvas.pixel(0, 0).unwrap();
        assert!(approx(p[0], 0.75));
        assert!(approx(p[3], 1.0));
    }

    #[test]
    fn gradients_interpolate_between_stops() {
        let paint = Paint::vertical(
            0.0,
            10.0,
            vec![(0.0, Rgb::BLACK.with_alpha(0.0)), (1.0, Rgb::WHITE.with_alpha(1.0))],
        );
        assert!(approx(paint.sample(0.0, 5.0).a, 0.5));
        assert!(approx(paint.sample(0.0, 20.0).a, 1.0));

        let radial = Paint::Radial {
            center: (0.0, 0.0),
            radius: 4.0,
            stops: vec![(0.0, RED.with_alpha(1.0)), (1.0, RED.with_alpha(0.0))],
        };
        assert!(approx(radial.sample(2.0, 0.0).a, 0.5));
        assert!(approx(radial.sample(9.0, 9.0).a, 0.0));
    }

    #[test]
    fn polygon_fill_respects_edges_in_either_winding() {
        for points in [
            [(0.0, 0.0), (8.0, 0.0), (0.0, 8.0)],
            [(0.0, 0.0), (0.0, 8.0), (8.0, 0.0)],
        ] {
            let mut canvas = Canvas::new(8, 8);
            canvas.fill_polygon(&points, &Paint::Solid(RED.with_alpha(1.0)), Blend::SourceOver, 1.0);
            assert_eq!(canvas.pixel(1, 1).unwrap()[3], 1.0);
            assert_eq!(canvas.pixel(7, 7).unwrap()[3], 0.0);
        }
    }

    #[test]
    fn stroke_circle_draws_a_ring() {
        let mut canvas = Canvas::new(21, 21);
        canvas.stroke_circle(10.5, 10.5, 6.0, 2.0, RED.with_alpha(1.0), Blend::Lighter, 1.0);
        assert_eq!(canvas.pixel(10, 10).unwrap()[3], 0.0);
        assert_eq!(canvas.pixel(16, 10).unwrap()[3], 1.0);
        assert_eq!(canvas.pixel(0, 0).unwrap()[3], 0.0);
    }

    #[test]
    fn downsample_keeps_energy_local() {
        let mut source = Canvas::new(4, 4);
        source.fill_rect(0.0, 0.0, 1.0, 1.0, &Paint::Solid(Rgb::WHITE.with_alpha(1.0)), Blend::SourceOver, 1.0);
        let mut small = Canvas::new(2, 2);
        small.downsample_from(&source);
        let corner = small.pixel(0, 0).unwrap()[0];
        assert!(corner > 0.1 && corner < 0.5, "corner = {corner}");
        assert_eq!(small.pixel(1, 1).unwrap(), [0.0; 4]);
        assert_eq!((small.width(), small.height()), (2, 2));
    }

    #[test]
    fn draw_canvas_scales_and_fades() {
        let mut source = Canvas::new(1, 1);
        source.fill_rect(0.0, 0.0, 1.0, 1.0, &Paint::Solid(Rgb::WHITE.with_alpha(1.0)), Blend::SourceOver, 1.0);
        let mut target = Canvas::new(4, 4);
        target.draw_canvas(&source, 0.0, 0.0, 4.0, 4.0, Blend::Lighter, 0.5);
        for y in 0..4 {
            for x in 0..4 {
                assert!(approx(target.pixel(x, y).unwrap()[0], 0.5));
            }
        }
    }

    #[test]
    fn draw_canvas_offset_shifts_columns() {
        let mut source = Canvas::new(4, 1);
        source.fill_rect(0.0, 0.0, 1.0, 1.0, &Paint::Solid(RED.with_alpha(1.0)), Blend::SourceOver, 1.0);
        let mut target = Canvas::new(4, 1);
        target.draw_canvas(&source, 1.0, 0.0, 4.0, 1.0, Blend::Lighter, 1.0);
        assert_eq!(target.pixel(0, 0).unwrap(), [0.0; 4]);
        assert_eq!(target.pixel(1, 0).unwrap(), [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn exports_rgba_and_png() {
        let mut canvas = Canvas::new(2, 1);
        canvas.fill_rect(0.0, 0.0, 1.0, 1.0, &Paint::Solid(RED.with_alpha(1.0)), Blend::SourceOver, 1.0);
        assert_eq!(canvas.to_rgba8(), vec![255, 0, 0, 255, 0, 0, 0, 0]);

        let mut png = std::io::Cursor::new(Vec::new());
        canvas.to_image().write_to(&mut png, image::ImageFormat::Png).unwrap();
        let decoded = image::load_from_memory(png.get_ref()).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (2, 1));
        assert_eq!(decoded.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(decoded.get_pixel(1, 0).0, [0, 0, 0]);
    }

    #[test]
    fn resize_reallocates_and_clears() {
        let mut canvas = Canvas::new(2, 2);
        canvas.fill_rect(0.0, 0.0, 2.0, 2.0, &Paint::Solid(RED.with_alpha(1.0)), Blend::SourceOver, 1.0);
        canvas.resize(2, 2);
        assert_eq!(canvas.pixel(0, 0), Some([0.0; 4]));
        canvas.resize(3, 1);
        assert_eq!((canvas.width(), canvas.height()), (3, 1));
        assert_eq!(canvas.to_rgba8().len(), 12);
    }
}
