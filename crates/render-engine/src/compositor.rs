//! Frame compositor: background, legibility gradient, labels, sentence text
//! and translation.
//!
//! Layout is a pure function of the render state and frame geometry
//! ([`layout_frame`]); [`FrameRenderer`] turns a layout into pixels. All
//! positions are specified on a 1080x1920 reference canvas and scaled to
//! the output size.

use std::path::Path;
use std::sync::{Arc, OnceLock};

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use versereel_common::VersereelResult;
use versereel_project_model::{Background, Collection, RenderState, TextPosition};

use crate::color::{parse_color, with_alpha};
use crate::text::{FontFace, GlyphPainter};

/// Reference canvas width.
pub const REFERENCE_WIDTH: f32 = 1080.0;
/// Reference canvas height.
pub const REFERENCE_HEIGHT: f32 = 1920.0;

/// Primary glyph size is the configured font size times this.
pub const LINE_SPACING: f32 = 1.6;

const GRADIENT_TOP_ALPHA: f32 = 0.35;
const GRADIENT_BOTTOM_ALPHA: f32 = 0.45;

const LABEL_SIZE: f32 = 40.0;
const LABEL_MARGIN_X: f32 = 60.0;
const LABEL_BASELINE: f32 = 90.0;
const LABEL_COLOR: Rgba<u8> = Rgba([245, 211, 125, 242]);

const ANCHOR_TOP: f32 = 300.0;
const ANCHOR_BOTTOM_OFFSET: f32 = 500.0;

const SHADOW_ALPHA: f32 = 0.85;

const TRANSLATION_SIZE: f32 = 28.0;
const TRANSLATION_GAP: f32 = 40.0;
const TRANSLATION_STEP: f32 = 40.0;
const TRANSLATION_MAX_LINES: usize = 6;
const TRANSLATION_COLOR: Rgba<u8> = Rgba([255, 255, 255, 199]);
const TRANSLATION_SHADOW_BLUR: f32 = 6.0;
const TRANSLATION_SHADOW_ALPHA: f32 = 0.8;

/// Shown in place of a missing translation when translations are enabled.
pub const TRANSLATION_FALLBACK: &str =
    "الترجمة غير متوفرة تلقائيًا لهذا المقطع في المصدر الحالي.";

/// Output frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
}

impl FrameGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// 1080x1920 portrait.
    pub fn portrait_hd() -> Self {
        Self::new(REFERENCE_WIDTH as u32, REFERENCE_HEIGHT as u32)
    }

    /// Uniform factor from reference pixels to output pixels.
    pub fn scale(&self) -> f32 {
        (self.width as f32 / REFERENCE_WIDTH).min(self.height as f32 / REFERENCE_HEIGHT)
    }
}

/// Horizontal alignment of a run relative to its `x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

/// Blurred drop shadow under a text run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowSpec {
    pub color: Rgba<u8>,
    /// Blur radius in output pixels.
    pub blur: f32,
    pub offset_y: f32,
}

/// One line of text at its final position.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedText {
    pub face: FontFace,
    pub size: f32,
    pub text: String,
    pub x: f32,
    pub baseline: f32,
    pub align: Align,
    pub color: Rgba<u8>,
    pub shadow: Option<ShadowSpec>,
}

/// Everything drawn on top of the background.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameLayout {
    pub labels: Vec<PlacedText>,
    pub primary: Vec<PlacedText>,
    pub translation: Vec<PlacedText>,
}

impl FrameLayout {
    pub fn runs(&self) -> impl Iterator<Item = &PlacedText> {
        self.labels
            .iter()
            .chain(self.primary.iter())
            .chain(self.translation.iter())
    }
}

/// Split text into display lines on newlines, dropping empty ones.
pub fn split_display_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect()
}

/// Place every text run for a frame.
///
/// `time_secs` is the frame's offset within the clip. The current layout
/// does not depend on it.
pub fn layout_frame(
    state: &RenderState,
    geometry: FrameGeometry,
    _time_secs: f64,
) -> VersereelResult<FrameLayout> {
    let style = &state.style;
    let s = geometry.scale();
    let w = geometry.width as f32;
    let h = geometry.height as f32;

    let mut labels = Vec::new();
    if style.show_collection_label {
        labels.push(PlacedText {
            face: FontFace::Label,
            size: LABEL_SIZE * s,
            text: Collection::label(state.collection_number),
            x: w - LABEL_MARGIN_X * s,
            baseline: LABEL_BASELINE * s,
            align: Align::Right,
            color: LABEL_COLOR,
            shadow: None,
        });
    }
    if style.show_reader_name {
        if let Some(name) = state.reader_name.as_deref().filter(|n| !n.trim().is_empty()) {
            labels.push(PlacedText {
                face: FontFace::Label,
                size: LABEL_SIZE * s,
                text: name.to_string(),
                x: LABEL_MARGIN_X * s,
                baseline: LABEL_BASELINE * s,
                align: Align::Left,
                color: LABEL_COLOR,
                shadow: None,
            });
        }
    }

    let text_color = parse_color(&style.text_color)?;
    let shadow_offset = style.shadow.offset() * s;
    let primary_shadow = style.shadow.enabled.then(|| ShadowSpec {
        color: with_alpha(Rgba([0, 0, 0, 255]), SHADOW_ALPHA),
        blur: style.shadow.strength.max(0.0) * s,
        offset_y: shadow_offset,
    });

    let glyph_size = style.font_size.max(1.0) * LINE_SPACING * s;
    let advance = glyph_size * style.line_height.max(0.1);
    let lines = split_display_lines(&state.text);
    let anchor = match style.position {
        TextPosition::Top => ANCHOR_TOP * s,
        TextPosition::Center => h / 2.0,
        TextPosition::Bottom => h - ANCHOR_BOTTOM_OFFSET * s,
    };
    let total = lines.len() as f32 * advance;
    let start = anchor - total / 2.0;

    let primary: Vec<PlacedText> = lines
        .iter()
        .enumerate()
        .map(|(i, line)| PlacedText {
            face: FontFace::Primary,
            size: glyph_size,
            text: (*line).to_string(),
            x: w / 2.0,
            baseline: start + i as f32 * advance,
            align: Align::Center,
            color: text_color,
            shadow: primary_shadow,
        })
        .collect();

    let mut translation = Vec::new();
    if style.show_translation {
        let block_end = start + total;
        let source = state.translation.as_deref().unwrap_or(TRANSLATION_FALLBACK);
        let translation_shadow = style.shadow.enabled.then(|| ShadowSpec {
            color: with_alpha(Rgba([0, 0, 0, 255]), TRANSLATION_SHADOW_ALPHA),
            blur: TRANSLATION_SHADOW_BLUR * s,
            offset_y: shadow_offset,
        });
        for (i, line) in split_display_lines(source)
            .into_iter()
            .take(TRANSLATION_MAX_LINES)
            .enumerate()
        {
            translation.push(PlacedText {
                face: FontFace::Translation,
                size: TRANSLATION_SIZE * s,
                text: line.to_string(),
                x: w / 2.0,
                baseline: block_end + (TRANSLATION_GAP + i as f32 * TRANSLATION_STEP) * s,
                align: Align::Center,
                color: TRANSLATION_COLOR,
                shadow: translation_shadow,
            });
        }
    }

    Ok(FrameLayout {
        labels,
        primary,
        translation,
    })
}

/// Fill the frame with the configured background.
///
/// An image that cannot be read falls back to its solid colour.
pub fn render_background(
    background: &Background,
    geometry: FrameGeometry,
) -> VersereelResult<RgbaImage> {
    match background {
        Background::Solid { color } => Ok(RgbaImage::from_pixel(
            geometry.width,
            geometry.height,
            opaque(parse_color(color)?),
        )),
        Background::Image {
            path,
            fallback_color,
        } => match cover_image(path, geometry) {
            Ok(img) => Ok(img),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Background image unusable, using fallback colour"
                );
                Ok(RgbaImage::from_pixel(
                    geometry.width,
                    geometry.height,
                    opaque(parse_color(fallback_color)?),
                ))
            }
        },
    }
}

fn opaque(color: Rgba<u8>) -> Rgba<u8> {
    with_alpha(color, 1.0)
}

/// Scale an image to cover the frame, cropping the overflow around the centre.
fn cover_image(path: &Path, geometry: FrameGeometry) -> Result<RgbaImage, image::ImageError> {
    let img = image::open(path)?;
    Ok(img
        .resize_to_fill(geometry.width, geometry.height, FilterType::Triangle)
        .to_rgba8())
}

/// Darken the top and bottom of the frame, leaving the middle untouched.
pub fn apply_gradient(canvas: &mut RgbaImage) {
    let height = canvas.height();
    let denom = (height.max(2) - 1) as f32;
    for (y, row) in canvas.enumerate_rows_mut() {
        let alpha = gradient_alpha(y as f32 / denom);
        if alpha <= 0.0 {
            continue;
        }
        let keep = 1.0 - alpha;
        for (_, _, px) in row {
            for c in 0..3 {
                px[c] = (px[c] as f32 * keep).round() as u8;
            }
        }
    }
}

/// Overlay opacity at relative height `t` in `[0, 1]`.
pub fn gradient_alpha(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t <= 0.5 {
        GRADIENT_TOP_ALPHA * (1.0 - t / 0.5)
    } else {
        GRADIENT_BOTTOM_ALPHA * ((t - 0.5) / 0.5)
    }
}

/// Left edge of a run after alignment.
fn left_edge(painter: &dyn GlyphPainter, run: &PlacedText) -> f32 {
    let width = painter.measure(run.face, run.size, &run.text);
    match run.align {
        Align::Left => run.x,
        Align::Center => run.x - width / 2.0,
        Align::Right => run.x - width,
    }
}

fn draw_runs(canvas: &mut RgbaImage, painter: &dyn GlyphPainter, runs: &[PlacedText]) {
    // Shadows for a group share one blurred layer beneath the group's text.
    if let Some(shadow) = runs.iter().find_map(|r| r.shadow) {
        let mut layer = RgbaImage::new(canvas.width(), canvas.height());
        for run in runs {
            let left = left_edge(painter, run);
            painter.draw(
                &mut layer,
                run.face,
                run.size,
                &run.text,
                left,
                run.baseline + shadow.offset_y,
                shadow.color,
            );
        }
        let sigma = shadow.blur / 2.0;
        let layer = if sigma > 0.0 {
            imageproc::filter::gaussian_blur_f32(&layer, sigma)
        } else {
            layer
        };
        imageops::overlay(canvas, &layer, 0, 0);
    }

    for run in runs {
        let left = left_edge(painter, run);
        painter.draw(canvas, run.face, run.size, &run.text, left, run.baseline, run.color);
    }
}

/// Draws frames for one render state.
///
/// Frames do not vary with time, so the first composed frame is cached and
/// returned for every later request.
pub struct FrameRenderer {
    layout: FrameLayout,
    background: RgbaImage,
    painter: Arc<dyn GlyphPainter>,
    cached: OnceLock<RgbaImage>,
}

impl FrameRenderer {
    /// Resolve colours, load the background and lay out the text.
    pub fn new(
        state: &RenderState,
        geometry: FrameGeometry,
        painter: Arc<dyn GlyphPainter>,
    ) -> VersereelResult<Self> {
        let layout = layout_frame(state, geometry, 0.0)?;
        let background = render_background(&state.style.background, geometry)?;
        tracing::debug!(
            width = geometry.width,
            height = geometry.height,
            primary_lines = layout.primary.len(),
            translation_lines = layout.translation.len(),
            labels = layout.labels.len(),
            "Frame renderer prepared"
        );
        Ok(Self {
            layout,
            background,
            painter,
            cached: OnceLock::new(),
        })
    }

    pub fn geometry(&self) -> FrameGeometry {
        FrameGeometry::new(self.background.width(), self.background.height())
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    /// Whether every frame time yields the same image.
    pub fn is_static(&self) -> bool {
        true
    }

    /// Frame at `time_secs` into the clip.
    pub fn render_frame(&self, time_secs: f64) -> &RgbaImage {
        self.cached.get_or_init(|| self.compose(time_secs))
    }

    /// Compose a frame from scratch, bypassing the cache.
    pub fn compose(&self, _time_secs: f64) -> RgbaImage {
        let painter = self.painter.as_ref();
        let mut canvas = self.background.clone();
        apply_gradient(&mut canvas);
        draw_runs(&mut canvas, painter, &self.layout.labels);
        draw_runs(&mut canvas, painter, &self.layout.primary);
        draw_runs(&mut canvas, painter, &self.layout.translation);
        canvas
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use versereel_project_model::{RenderStyle, SelectionWindow, ShadowStyle};

    /// Draws every character as a solid block `size / 2` wide.
    pub(crate) struct BlockPainter;

    impl GlyphPainter for BlockPainter {
        fn measure(&self, _face: FontFace, size: f32, text: &str) -> f32 {
            text.chars().count() as f32 * size / 2.0
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
            let width = self.measure(face, size, text);
            let top = (baseline - size * 0.7).max(0.0) as u32;
            let bottom = baseline.max(0.0) as u32;
            let x0 = left.max(0.0) as u32;
            let x1 = (left + width).max(0.0) as u32;
            for y in top..bottom.min(canvas.height()) {
                for x in x0..x1.min(canvas.width()) {
                    crate::text::blend_pixel(canvas.get_pixel_mut(x, y), color, 1.0);
                }
            }
        }
    }

    pub(crate) fn sample_state() -> RenderState {
        RenderState {
            collection_number: 2,
            reader_name: Some("Reader One".to_string()),
            text: "السطر الأول\n\nالسطر الثاني".to_string(),
            translation: None,
            style: RenderStyle::default(),
            window: Some(SelectionWindow {
                start_secs: 10.0,
                end_secs: 18.4,
            }),
        }
    }

    #[test]
    fn test_geometry_scale() {
        assert_eq!(FrameGeometry::portrait_hd().scale(), 1.0);
        assert_eq!(FrameGeometry::new(540, 960).scale(), 0.5);
        assert_eq!(FrameGeometry::new(0, 0).width, 1);
    }

    #[test]
    fn test_center_layout_matches_reference_metrics() {
        let layout = layout_frame(&sample_state(), FrameGeometry::portrait_hd(), 0.0).unwrap();

        assert_eq!(layout.primary.len(), 2);
        let glyph = 46.0 * 1.6;
        let advance = glyph * 1.4;
        let start = 960.0 - advance;
        assert!((layout.primary[0].size - glyph).abs() < 1e-3);
        assert!((layout.primary[0].baseline - start).abs() < 1e-3);
        assert!((layout.primary[1].baseline - (start + advance)).abs() < 1e-3);
        assert_eq!(layout.primary[0].align, Align::Center);
        assert_eq!(layout.primary[0].x, 540.0);

        let shadow = layout.primary[0].shadow.unwrap();
        assert_eq!(shadow.blur, 35.0);
        assert_eq!(shadow.offset_y, 3.0);

        assert_eq!(layout.labels.len(), 2);
        assert_eq!(layout.labels[0].text, "الحزب 2");
        assert_eq!(layout.labels[0].align, Align::Right);
        assert_eq!(layout.labels[0].x, 1020.0);
        assert_eq!(layout.labels[1].text, "Reader One");
        assert_eq!(layout.labels[1].x, 60.0);
        assert!(layout.translation.is_empty());
    }

    #[test]
    fn test_position_anchors() {
        let mut state = sample_state();
        state.text = "سطر".to_string();
        let advance = 46.0 * 1.6 * 1.4;

        state.style.position = TextPosition::Top;
        let top = layout_frame(&state, FrameGeometry::portrait_hd(), 0.0).unwrap();
        assert!((top.primary[0].baseline - (300.0 - advance / 2.0)).abs() < 1e-3);

        state.style.position = TextPosition::Bottom;
        let bottom = layout_frame(&state, FrameGeometry::portrait_hd(), 0.0).unwrap();
        assert!((bottom.primary[0].baseline - (1420.0 - advance / 2.0)).abs() < 1e-3);
    }

    #[test]
    fn test_shadow_disabled_applies_to_all_text() {
        let mut state = sample_state();
        state.style.shadow = ShadowStyle {
            enabled: false,
            strength: 35.0,
        };
        state.style.show_translation = true;
        let layout = layout_frame(&state, FrameGeometry::portrait_hd(), 0.0).unwrap();
        assert!(layout.runs().all(|r| r.shadow.is_none()));
    }

    #[test]
    fn test_translation_fallback_and_line_limit() {
        let mut state = sample_state();
        state.style.show_translation = true;
        let layout = layout_frame(&state, FrameGeometry::portrait_hd(), 0.0).unwrap();
        assert_eq!(layout.translation.len(), 1);
        assert_eq!(layout.translation[0].text, TRANSLATION_FALLBACK);

        let block_end = layout.primary[1].baseline + 46.0 * 1.6 * 1.4;
        assert!((layout.translation[0].baseline - (block_end + 40.0)).abs() < 1e-3);
        let shadow = layout.translation[0].shadow.unwrap();
        assert_eq!(shadow.blur, 6.0);
        assert_eq!(shadow.color[3], 204);

        state.translation = Some((1..=9).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n\n"));
        let layout = layout_frame(&state, FrameGeometry::portrait_hd(), 0.0).unwrap();
        assert_eq!(layout.translation.len(), 6);
        assert_eq!(layout.translation[5].text, "line 6");
        assert!(
            (layout.translation[1].baseline - layout.translation[0].baseline - 40.0).abs() < 1e-3
        );
    }

    #[test]
    fn test_hidden_labels_and_missing_reader() {
        let mut state = sample_state();
        state.style.show_collection_label = false;
        state.reader_name = None;
        let layout = layout_frame(&state, FrameGeometry::portrait_hd(), 0.0).unwrap();
        assert!(layout.labels.is_empty());
    }

    #[test]
    fn test_invalid_text_colour_is_error() {
        let mut state = sample_state();
        state.style.text_color = "not-a-colour".to_string();
        assert!(layout_frame(&state, FrameGeometry::portrait_hd(), 0.0).is_err());
    }

    #[test]
    fn test_gradient_profile() {
        assert!((gradient_alpha(0.0) - 0.35).abs() < 1e-6);
        assert_eq!(gradient_alpha(0.5), 0.0);
        assert!((gradient_alpha(1.0) - 0.45).abs() < 1e-6);
        assert!(gradient_alpha(0.25) > gradient_alpha(0.4));
    }

    #[test]
    fn test_gradient_darkens_edges_only() {
        let mut canvas = RgbaImage::from_pixel(4, 101, Rgba([200, 200, 200, 255]));
        apply_gradient(&mut canvas);
        assert_eq!(canvas.get_pixel(0, 0)[0], 130);
        assert_eq!(canvas.get_pixel(0, 50)[0], 200);
        assert_eq!(canvas.get_pixel(0, 100)[0], 110);
        assert_eq!(canvas.get_pixel(0, 0)[3], 255);
    }

    #[test]
    fn test_image_background_falls_back_to_colour() {
        let background = Background::Image {
            path: "/nonexistent/bg.png".into(),
            fallback_color: "#102030".to_string(),
        };
        let img = render_background(&background, FrameGeometry::new(8, 16)).unwrap();
        assert_eq!(*img.get_pixel(3, 3), Rgba([0x10, 0x20, 0x30, 255]));
    }

    #[test]
    fn test_image_background_covers_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bg.png");
        RgbaImage::from_pixel(40, 10, Rgba([0, 255, 0, 255]))
            .save(&path)
            .unwrap();
        let background = Background::Image {
            path,
            fallback_color: "#000".to_string(),
        };
        let img = render_background(&background, FrameGeometry::new(9, 16)).unwrap();
        assert_eq!(img.dimensions(), (9, 16));
        assert_eq!(img.get_pixel(4, 8)[1], 255);
    }

    #[test]
    fn test_renderer_draws_text_and_caches() {
        let geometry = FrameGeometry::new(216, 384);
        let renderer =
            FrameRenderer::new(&sample_state(), geometry, Arc::new(BlockPainter)).unwrap();

        let first = renderer.render_frame(0.0).clone();
        assert_eq!(first.dimensions(), (216, 384));

        // Text colour lands on the first primary line near the centre.
        let line = &renderer.layout().primary[0];
        let y = (line.baseline - 1.0) as u32;
        let px = first.get_pixel(108, y);
        assert_eq!((px[0], px[1], px[2]), (0xF5, 0xD3, 0x7D));

        // The gradient midpoint keeps the background colour where no text is.
        let bg = first.get_pixel(2, 192);
        assert_eq!((bg[0], bg[1], bg[2]), (0x0E, 0x1A, 0x16));

        assert!(renderer.is_static());
        assert_eq!(renderer.render_frame(3.5), &first);
        assert_eq!(renderer.compose(7.0), first);
    }

    proptest::proptest! {
        #[test]
        fn prop_gradient_alpha_bounded(t in -1.0f32..2.0) {
            let a = gradient_alpha(t);
            proptest::prop_assert!((0.0..=GRADIENT_BOTTOM_ALPHA).contains(&a));
        }

        #[test]
        fn prop_primary_block_is_centred_on_anchor(lines in 1usize..8, font_size in 12.0f32..120.0) {
            let mut state = sample_state();
            state.text = vec!["سطر"; lines].join("\n\n");
            state.style.font_size = font_size;
            let layout = layout_frame(&state, FrameGeometry::portrait_hd(), 0.0).unwrap();
            proptest::prop_assert_eq!(layout.primary.len(), lines);

            let advance = font_size * LINE_SPACING * state.style.line_height;
            let first = layout.primary[0].baseline;
            let block_mid = first + lines as f32 * advance / 2.0;
            proptest::prop_assert!((block_mid - 960.0).abs() < 1e-2);
            for pair in layout.primary.windows(2) {
                proptest::prop_assert!((pair[1].baseline - pair[0].baseline - advance).abs() < 1e-2);
            }
        }
    }
}
