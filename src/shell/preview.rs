use std::{
    fs,
    path::{Path, PathBuf},
};

use image::{imageops::FilterType, Rgba, RgbaImage};
use thiserror::Error;

pub const PREVIEW_WIDTH: u32 = 720;
pub const PREVIEW_HEIGHT: u32 = 220;

const BACKGROUND: [u8; 3] = [255, 255, 255];
const GLYPH: [u8; 3] = [200, 200, 200];

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("could not decode '{}': {cause}", .path.display())]
    DecodeFailed { path: PathBuf, cause: String },
}

/// Pixels ready for display, already scaled to the preview region.
///
/// Rows are top-down BGRX (alpha composited onto white), which is what a
/// 32-bit top-down DIB expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewImage {
    width: u32,
    height: u32,
    bgrx: Vec<u8>,
    placeholder: bool,
}

impl PreviewImage {
    pub fn load(path: &Path) -> Result<Self, PreviewError> {
        Self::load_within(path, PREVIEW_WIDTH, PREVIEW_HEIGHT)
    }

    /// Reads the whole file up front so no handle outlives this call.
    pub fn load_within(path: &Path, max_width: u32, max_height: u32) -> Result<Self, PreviewError> {
        let decode_failed = |cause: String| PreviewError::DecodeFailed {
            path: path.to_path_buf(),
            cause,
        };

        let bytes = fs::read(path).map_err(|e| decode_failed(e.to_string()))?;
        let decoded = image::load_from_memory(&bytes).map_err(|e| decode_failed(e.to_string()))?;

        let (width, height) = fit_within(decoded.width(), decoded.height(), max_width, max_height);
        let scaled = decoded.resize_exact(width, height, FilterType::Triangle).to_rgba8();
        Ok(Self::from_rgba(&scaled, false))
    }

    /// A neutral picture glyph shown when nothing (decodable) is selected.
    pub fn placeholder(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);

        let icon_w = 96.min(width);
        let icon_h = 72.min(height);
        let x0 = (width - icon_w) / 2;
        let y0 = (height - icon_h) / 2;

        let img = RgbaImage::from_fn(width, height, |x, y| {
            let inside = x >= x0 && x < x0 + icon_w && y >= y0 && y < y0 + icon_h;
            if inside && in_glyph(x - x0, y - y0, icon_w, icon_h) {
                Rgba([GLYPH[0], GLYPH[1], GLYPH[2], 255])
            } else {
                Rgba([BACKGROUND[0], BACKGROUND[1], BACKGROUND[2], 255])
            }
        });

        Self::from_rgba(&img, true)
    }

    fn from_rgba(img: &RgbaImage, placeholder: bool) -> Self {
        let mut bgrx = Vec::with_capacity(img.as_raw().len());
        for Rgba([r, g, b, a]) in img.pixels().copied() {
            bgrx.push(blend(b, BACKGROUND[2], a));
            bgrx.push(blend(g, BACKGROUND[1], a));
            bgrx.push(blend(r, BACKGROUND[0], a));
            bgrx.push(0);
        }

        Self {
            width: img.width(),
            height: img.height(),
            bgrx,
            placeholder,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.bgrx
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    /// Top-left corner that centres this image in a region of the given size.
    pub fn origin_in(&self, region_width: u32, region_height: u32) -> (i32, i32) {
        (
            (region_width as i32 - self.width as i32) / 2,
            (region_height as i32 - self.height as i32) / 2,
        )
    }
}

/// Largest size with the source aspect ratio that fits `max_w` x `max_h`.
/// Small images are scaled up, the same as a zoom-mode picture box.
pub fn fit_within(src_w: u32, src_h: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    if src_w == 0 || src_h == 0 || max_w == 0 || max_h == 0 {
        return (max_w.max(1), max_h.max(1));
    }

    let scale = (max_w as f64 / src_w as f64).min(max_h as f64 / src_h as f64);
    let w = ((src_w as f64 * scale).round() as u32).clamp(1, max_w);
    let h = ((src_h as f64 * scale).round() as u32).clamp(1, max_h);
    (w, h)
}

fn blend(fg: u8, bg: u8, alpha: u8) -> u8 {
    let a = alpha as u32;
    ((fg as u32 * a + bg as u32 * (255 - a) + 127) / 255) as u8
}

// Frame, sun and mountain inside a w x h box.
fn in_glyph(x: u32, y: u32, w: u32, h: u32) -> bool {
    let border = 2;
    if x < border || y < border || x + border >= w || y + border >= h {
        return true;
    }

    let (xf, yf) = (x as f32, y as f32);
    let (wf, hf) = (w as f32, h as f32);

    let (sun_x, sun_y, sun_r) = (wf * 0.72, hf * 0.3, hf * 0.11);
    if (xf - sun_x).powi(2) + (yf - sun_y).powi(2) <= sun_r * sun_r {
        return true;
    }

    let (apex_x, apex_y) = (wf * 0.38, hf * 0.35);
    let base_y = hf - 8.0;
    let half_base = wf * 0.28;
    if yf >= apex_y && yf <= base_y {
        let spread = (yf - apex_y) / (base_y - apex_y) * half_base;
        return (xf - apex_x).abs() <= spread;
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn save_png(dir: &tempfile::TempDir, name: &str, img: &RgbaImage) -> PathBuf {
        let path = dir.path().join(name);
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn wide_images_are_width_limited() {
        assert_eq!(fit_within(1920, 1080, 720, 220), (391, 220));
        assert_eq!(fit_within(4000, 500, 720, 220), (720, 90));
    }

    #[test]
    fn small_images_are_scaled_up() {
        assert_eq!(fit_within(10, 10, 720, 220), (220, 220));
    }

    #[test]
    fn degenerate_sizes_do_not_panic() {
        assert_eq!(fit_within(0, 10, 720, 220), (720, 220));
        assert_eq!(fit_within(1, 100_000, 720, 220), (1, 220));
    }

    #[test]
    fn loads_and_scales_a_png() {
        let dir = tempfile::tempdir().unwrap();
        let img = RgbaImage::from_pixel(40, 20, Rgba([255, 0, 0, 255]));
        let path = save_png(&dir, "red.png", &img);

        let preview = PreviewImage::load(&path).unwrap();
        assert_eq!((preview.width(), preview.height()), (440, 220));
        assert_eq!(preview.pixels().len(), 440 * 220 * 4);
        assert!(!preview.is_placeholder());

        let px = &preview.pixels()[..4];
        assert!(px[0] < 5 && px[1] < 5 && px[2] > 250, "expected red in BGRX, got {px:?}");
    }

    #[test]
    fn transparency_is_composited_onto_white() {
        let dir = tempfile::tempdir().unwrap();
        let img = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 0]));
        let path = save_png(&dir, "clear.png", &img);

        let preview = PreviewImage::load_within(&path, 4, 4).unwrap();
        assert!(preview
            .pixels()
            .chunks_exact(4)
            .all(|px| px[..3] == [255, 255, 255]));
    }

    #[test]
    fn file_is_released_after_loading() {
        let dir = tempfile::tempdir().unwrap();
        let img = RgbaImage::from_pixel(8, 8, Rgba([0, 128, 0, 255]));
        let path = save_png(&dir, "green.png", &img);

        let preview = PreviewImage::load(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert!(preview.width() > 0);
    }

    #[test]
    fn corrupt_file_is_decode_failed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        fs::write(&path, b"definitely not a jpeg").unwrap();

        let err = PreviewImage::load(&path).unwrap_err();
        let PreviewError::DecodeFailed { path: failed, .. } = &err;
        assert_eq!(failed, &path);
        assert!(err.to_string().starts_with("could not decode"));
    }

    #[test]
    fn missing_file_is_decode_failed() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            PreviewImage::load(&dir.path().join("nope.png")),
            Err(PreviewError::DecodeFailed { .. })
        ));
    }

    #[test]
    fn placeholder_fills_the_region_and_draws_a_glyph() {
        let preview = PreviewImage::placeholder(PREVIEW_WIDTH, PREVIEW_HEIGHT);
        assert!(preview.is_placeholder());
        assert_eq!((preview.width(), preview.height()), (PREVIEW_WIDTH, PREVIEW_HEIGHT));
        assert_eq!(preview.origin_in(PREVIEW_WIDTH, PREVIEW_HEIGHT), (0, 0));

        let pixels = preview.pixels();
        assert_eq!(&pixels[..3], &[255, 255, 255]);
        assert!(pixels.chunks_exact(4).any(|px| px[..3] == [200, 200, 200]));
    }

    #[test]
    fn origin_centres_smaller_images() {
        let preview = PreviewImage::placeholder(100, 50);
        assert_eq!(preview.origin_in(720, 220), (310, 85));
    }
}
