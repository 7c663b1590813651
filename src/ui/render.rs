use std::sync::Arc;

use crate::loader::DecodedImage;

pub const BG_COLOR: [u8; 3] = [0, 0, 0];
const CELL_MARGIN: u32 = 2;

/// Draw target for the viewer. The core never touches pixels itself.
pub trait Renderer {
    /// Surface size in pixels.
    fn size(&self) -> (u32, u32);

    fn draw(&mut self, image: &DecodedImage, zoom: f32, pan: (i32, i32));

    /// Row-major grid; `None` cells are not loaded yet.
    fn draw_grid(&mut self, cells: &[Option<Arc<DecodedImage>>], cell_size: (u32, u32));
}

/// Pack RGB into softbuffer u32 format: 0x00RRGGBB.
pub fn rgb(r: u8, g: u8, b: u8) -> u32 {
    (r as u32) << 16 | (g as u32) << 8 | b as u32
}

fn unpack_rgb(v: u32) -> (u8, u8, u8) {
    ((v >> 16) as u8, (v >> 8) as u8, v as u8)
}

/// Scale that fits the image in the window, never enlarging it.
pub fn fit_scale(img_w: f32, img_h: f32, win_w: f32, win_h: f32) -> f32 {
    (win_w / img_w).min(win_h / img_h).min(1.0)
}

/// Nearest-neighbour blit of an RGBA image at (x0, y0) with the given scale,
/// alpha-blended over the destination and clipped to `clip` (x, y, w, h).
pub fn blit_scaled(
    dst: &mut [u32], dst_w: u32, dst_h: u32,
    img: &DecodedImage,
    x0: f32, y0: f32, scale: f32,
    clip: (u32, u32, u32, u32),
) {
    if img.width == 0 || img.height == 0 || scale <= 0.0 {
        return;
    }
    let draw_w = img.width as f32 * scale;
    let draw_h = img.height as f32 * scale;

    let (cx, cy, cw, ch) = clip;
    let dx_start = x0.max(cx as f32).max(0.0) as u32;
    let dy_start = y0.max(cy as f32).max(0.0) as u32;
    let dx_end = ((x0 + draw_w).ceil().max(0.0) as u32).min(cx + cw).min(dst_w);
    let dy_end = ((y0 + draw_h).ceil().max(0.0) as u32).min(cy + ch).min(dst_h);

    let inv_scale = 1.0 / scale;
    let src = &img.rgba_bytes;

    for dy in dy_start..dy_end {
        let sy = ((dy as f32 - y0) * inv_scale) as u32;
        if sy >= img.height {
            continue;
        }
        for dx in dx_start..dx_end {
            let sx = ((dx as f32 - x0) * inv_scale) as u32;
            if sx >= img.width {
                continue;
            }

            let si = (sy as usize * img.width as usize + sx as usize) * 4;
            let di = dy as usize * dst_w as usize + dx as usize;

            let sa = src[si + 3] as u32;
            if sa == 255 {
                dst[di] = rgb(src[si], src[si + 1], src[si + 2]);
            } else if sa > 0 {
                let inv = 255 - sa;
                let (dr, dg, db) = unpack_rgb(dst[di]);
                let r = ((src[si] as u32 * sa + dr as u32 * inv) / 255) as u8;
                let g = ((src[si + 1] as u32 * sa + dg as u32 * inv) / 255) as u8;
                let b = ((src[si + 2] as u32 * sa + db as u32 * inv) / 255) as u8;
                dst[di] = rgb(r, g, b);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// softbuffer framebuffer
// ---------------------------------------------------------------------------

/// Renders into a 0x00RRGGBB framebuffer such as a softbuffer buffer.
pub struct FrameRenderer<'a> {
    frame: &'a mut [u32],
    width: u32,
    height: u32,
}

impl<'a> FrameRenderer<'a> {
    pub fn new(frame: &'a mut [u32], width: u32, height: u32) -> Self {
        Self { frame, width, height }
    }

    pub fn clear(&mut self) {
        self.frame.fill(rgb(BG_COLOR[0], BG_COLOR[1], BG_COLOR[2]));
    }

    fn full_clip(&self) -> (u32, u32, u32, u32) {
        (0, 0, self.width, self.height)
    }
}

impl Renderer for FrameRenderer<'_> {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn draw(&mut self, image: &DecodedImage, zoom: f32, pan: (i32, i32)) {
        self.clear();
        let sw = self.width as f32;
        let sh = self.height as f32;
        let scale = fit_scale(image.width as f32, image.height as f32, sw, sh) * zoom;
        let x0 = (sw - image.width as f32 * scale) / 2.0 + pan.0 as f32;
        let y0 = (sh - image.height as f32 * scale) / 2.0 + pan.1 as f32;
        let clip = self.full_clip();
        blit_scaled(self.frame, self.width, self.height, image, x0, y0, scale, clip);
    }

    fn draw_grid(&mut self, cells: &[Option<Arc<DecodedImage>>], cell_size: (u32, u32)) {
        self.clear();
        let (cell_w, cell_h) = cell_size;
        if cell_w <= CELL_MARGIN * 2 || cell_h <= CELL_MARGIN * 2 {
            return;
        }
        let cols = (self.width / cell_w).max(1) as usize;
        let inner_w = cell_w - CELL_MARGIN * 2;
        let inner_h = cell_h - CELL_MARGIN * 2;

        for (i, cell) in cells.iter().enumerate() {
            let Some(img) = cell else { continue };
            let x = (i % cols) as u32 * cell_w + CELL_MARGIN;
            let y = (i / cols) as u32 * cell_h + CELL_MARGIN;
            if y >= self.height {
                break;
            }
            let scale = (inner_w as f32 / img.width as f32).min(inner_h as f32 / img.height as f32);
            let x0 = x as f32 + (inner_w as f32 - img.width as f32 * scale) / 2.0;
            let y0 = y as f32 + (inner_h as f32 - img.height as f32 * scale) / 2.0;
            blit_scaled(
                self.frame, self.width, self.height,
                img,
                x0, y0, scale,
                (x, y, inner_w, inner_h),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: [u8; 4] = [255, 0, 0, 255];

    #[test]
    fn test_fit_scale_never_enlarges() {
        assert_eq!(fit_scale(100.0, 50.0, 400.0, 400.0), 1.0);
        assert_eq!(fit_scale(800.0, 400.0, 400.0, 400.0), 0.5);
    }

    #[test]
    fn test_draw_centres_image() {
        let mut buf = vec![0xFFFFFF; 10 * 10];
        let img = DecodedImage::filled(2, 2, RED);
        FrameRenderer::new(&mut buf, 10, 10).draw(&img, 1.0, (0, 0));

        assert_eq!(buf[4 * 10 + 4], rgb(255, 0, 0));
        assert_eq!(buf[5 * 10 + 5], rgb(255, 0, 0));
        assert_eq!(buf[0], rgb(0, 0, 0));
        assert_eq!(buf.iter().filter(|&&p| p == rgb(255, 0, 0)).count(), 4);
    }

    #[test]
    fn test_draw_zoom_and_pan() {
        let mut buf = vec![0; 10 * 10];
        let img = DecodedImage::filled(2, 2, RED);
        FrameRenderer::new(&mut buf, 10, 10).draw(&img, 2.0, (3, -3));
        // 4x4 square centred at (5,5), shifted to x 6..10, y 0..4
        assert_eq!(buf.iter().filter(|&&p| p == rgb(255, 0, 0)).count(), 16);
        assert_eq!(buf[6], rgb(255, 0, 0));
        assert_eq!(buf[3 * 10 + 9], rgb(255, 0, 0));
    }

    #[test]
    fn test_draw_fully_off_screen_is_fine() {
        let mut buf = vec![0; 10 * 10];
        let img = DecodedImage::filled(2, 2, RED);
        FrameRenderer::new(&mut buf, 10, 10).draw(&img, 1.0, (-500, 900));
        assert!(buf.iter().all(|&p| p == 0));
    }

    #[test]
    fn test_grid_skips_missing_cells() {
        let mut buf = vec![0; 20 * 20];
        let img = Arc::new(DecodedImage::filled(4, 4, RED));
        let cells = vec![Some(Arc::clone(&img)), None, None, Some(img)];
        FrameRenderer::new(&mut buf, 20, 20).draw_grid(&cells, (10, 10));

        // first and last cells painted inside their margins
        assert_eq!(buf[2 * 20 + 2], rgb(255, 0, 0));
        assert_eq!(buf[17 * 20 + 17], rgb(255, 0, 0));
        assert_eq!(buf[0], 0);
        assert_eq!(buf[2 * 20 + 12], 0);
    }
}
