//! Glyph painting.
//!
//! The compositor only talks to [`GlyphPainter`]; [`FontPainter`] is the
//! real implementation backed by TrueType faces.

use std::path::Path;

use image::{Rgba, RgbaImage};
use rusttype::{point, Font, Scale};
use versereel_common::{FontConfig, VersereelError, VersereelResult};

use crate::shaping::prepare_line;

/// Which face a run of text is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontFace {
    /// Sentence text.
    Primary,
    /// Corner labels.
    Label,
    Translation,
}

/// Measures and rasterizes single lines of text.
pub trait GlyphPainter: Send + Sync {
    /// Advance width of `text` in pixels at `size` px.
    fn measure(&self, face: FontFace, size: f32, text: &str) -> f32;

    /// Draw `text` with its left edge at `left` and baseline at `baseline`,
    /// blending `color` over what is already on the canvas.
    #[allow(clippy::too_many_arguments)]
    fn draw(
        &self,
        canvas: &mut RgbaImage,
        face: FontFace,
        size: f32,
        text: &str,
        left: f32,
        baseline: f32,
        color: Rgba<u8>,
    );
}

/// Painter backed by three loaded font files.
pub struct FontPainter {
    primary: Font<'static>,
    label: Font<'static>,
    translation: Font<'static>,
}

impl FontPainter {
    /// Load the configured faces. Every file must exist and parse.
    pub fn load(fonts: &FontConfig) -> VersereelResult<Self> {
        Ok(Self {
            primary: load_font(&fonts.primary)?,
            label: load_font(&fonts.label)?,
            translation: load_font(&fonts.translation)?,
        })
    }

    fn font(&self, face: FontFace) -> &Font<'static> {
        match face {
            FontFace::Primary => &self.primary,
            FontFace::Label => &self.label,
            FontFace::Translation => &self.translation,
        }
    }
}

fn load_font(path: &Path) -> VersereelResult<Font<'static>> {
    if !path.exists() {
        return Err(VersereelError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let data = std::fs::read(path)?;
    let font = Font::try_from_vec(data).ok_or_else(|| {
        VersereelError::render(format!("Not a usable font file: {}", path.display()))
    })?;
    tracing::debug!(path = %path.display(), glyphs = font.glyph_count(), "Loaded font");
    Ok(font)
}

impl GlyphPainter for FontPainter {
    fn measure(&self, face: FontFace, size: f32, text: &str) -> f32 {
        let line = prepare_line(text);
        self.font(face)
            .layout(&line, Scale::uniform(size), point(0.0, 0.0))
            .last()
            .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
            .unwrap_or(0.0)
    }

    fn draw(
        &self,
        canvas: &mut RgbaImage,
        face: FontFace,
        size: f32,
        text: &str,
        left: f32,
        baseline: f32,
        color: Rgba<u8>,
    ) {
        let line = prepare_line(text);
        let (width, height) = canvas.dimensions();
        for glyph in self
            .font(face)
            .layout(&line, Scale::uniform(size), point(left, baseline))
        {
            let Some(bb) = glyph.pixel_bounding_box() else {
                continue;
            };
            glyph.draw(|gx, gy, coverage| {
                let x = bb.min.x + gx as i32;
                let y = bb.min.y + gy as i32;
                if x >= 0 && y >= 0 && (x as u32) < width && (y as u32) < height {
                    blend_pixel(canvas.get_pixel_mut(x as u32, y as u32), color, coverage);
                }
            });
        }
    }
}

/// Source-over blend of `color` at `coverage` onto `dst`.
pub fn blend_pixel(dst: &mut Rgba<u8>, color: Rgba<u8>, coverage: f32) {
    let sa = (color[3] as f32 / 255.0) * coverage.clamp(0.0, 1.0);
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return;
    }
    for c in 0..3 {
        let s = color[c] as f32;
        let d = dst[c] as f32;
        dst[c] = ((s * sa + d * da * (1.0 - sa)) / out_a).round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}
