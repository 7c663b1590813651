//! Art-mode effects.
//!
//! `apply_effect` is a pure function of the image and the chosen effect. All
//! randomness lives in `EffectPicker`, which can be seeded so a session (or a
//! test) replays the same sequence of effects.

use image::{DynamicImage, Rgba, RgbaImage};
use std::time::{SystemTime, UNIX_EPOCH};

const EDGE_ENHANCE: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 10.0, -1.0, -1.0, -1.0, -1.0];
const CONTOUR: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 8.0, -1.0, -1.0, -1.0, -1.0];
const EMBOSS: [f32; 9] = [-1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArtEffect {
    EdgeEnhance,
    Contour,
    Emboss,
    /// 0.0 = greyscale, 1.0 = unchanged, 2.0 = doubled saturation.
    Saturation(f32),
    Blur(f32),
    HueRotate(i32),
}

pub fn apply_effect(img: DynamicImage, effect: ArtEffect) -> DynamicImage {
    match effect {
        ArtEffect::EdgeEnhance => {
            DynamicImage::ImageRgb8(img.to_rgb8()).filter3x3(&scaled(EDGE_ENHANCE, 2.0))
        }
        ArtEffect::Contour => {
            // RGB only: a zero-sum kernel would wipe the alpha channel.
            let mut edges = DynamicImage::ImageRgb8(img.to_rgb8()).filter3x3(&CONTOUR);
            edges.invert();
            edges
        }
        ArtEffect::Emboss => emboss(&img.to_rgba8()),
        ArtEffect::Saturation(factor) => saturate(img.to_rgba8(), factor),
        ArtEffect::Blur(sigma) => img.blur(sigma),
        ArtEffect::HueRotate(degrees) => img.huerotate(degrees),
    }
}

fn scaled(kernel: [f32; 9], divisor: f32) -> [f32; 9] {
    kernel.map(|k| k / divisor)
}

// Emboss is centred on mid-grey; filter3x3 would clamp the negative half away.
fn emboss(src: &RgbaImage) -> DynamicImage {
    let (w, h) = src.dimensions();
    let mut out = RgbaImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let mut acc = [128.0f32; 3];
            for (i, k) in EMBOSS.iter().enumerate() {
                if *k == 0.0 {
                    continue;
                }
                let sx = (x as i64 + (i % 3) as i64 - 1).clamp(0, w as i64 - 1) as u32;
                let sy = (y as i64 + (i / 3) as i64 - 1).clamp(0, h as i64 - 1) as u32;
                let p = src.get_pixel(sx, sy);
                for c in 0..3 {
                    acc[c] += k * p[c] as f32;
                }
            }
            let alpha = src.get_pixel(x, y)[3];
            out.put_pixel(x, y, Rgba([clamp_u8(acc[0]), clamp_u8(acc[1]), clamp_u8(acc[2]), alpha]));
        }
    }
    DynamicImage::ImageRgba8(out)
}

fn saturate(mut img: RgbaImage, factor: f32) -> DynamicImage {
    for px in img.pixels_mut() {
        let [r, g, b, a] = px.0;
        let grey = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        let mix = |c: u8| clamp_u8(grey + (c as f32 - grey) * factor);
        *px = Rgba([mix(r), mix(g), mix(b), a]);
    }
    DynamicImage::ImageRgba8(img)
}

fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

// ---------------------------------------------------------------------------
// Effect selection
// ---------------------------------------------------------------------------

/// Seedable source of effect choices (SplitMix64).
#[derive(Debug, Clone)]
pub struct EffectPicker {
    state: u64,
}

impl EffectPicker {
    pub fn seeded(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Seeded from the wall clock.
    pub fn from_time() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x9E37_79B9_7F4A_7C15);
        Self::seeded(nanos)
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform in [lo, hi].
    fn uniform(&mut self, lo: f32, hi: f32) -> f32 {
        let unit = (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32;
        lo + (hi - lo) * unit
    }

    pub fn pick(&mut self) -> ArtEffect {
        match self.next_u64() % 6 {
            0 => ArtEffect::EdgeEnhance,
            1 => ArtEffect::Contour,
            2 => ArtEffect::Emboss,
            3 => ArtEffect::Saturation(self.uniform(0.0, 2.0)),
            4 => ArtEffect::Blur(self.uniform(0.5, 2.0)),
            _ => ArtEffect::HueRotate((self.next_u64() % 21) as i32 - 10),
        }
    }
}
