//! CSS-style colour strings.

use image::Rgba;
use versereel_common::{VersereelError, VersereelResult};

/// Parse `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(r,g,b)` or `rgba(r,g,b,a)`.
///
/// In the functional forms `a` is a fraction in `[0, 1]`.
pub fn parse_color(input: &str) -> VersereelResult<Rgba<u8>> {
    let s = input.trim();
    let parsed = if let Some(hex) = s.strip_prefix('#') {
        parse_hex(hex)
    } else if let Some(body) = functional_body(s, "rgba") {
        parse_functional(body, true)
    } else if let Some(body) = functional_body(s, "rgb") {
        parse_functional(body, false)
    } else {
        None
    };
    parsed.ok_or_else(|| VersereelError::render(format!("Invalid colour '{input}'")))
}

/// Replace a colour's alpha with a fraction in `[0, 1]`.
pub fn with_alpha(color: Rgba<u8>, alpha: f32) -> Rgba<u8> {
    let [r, g, b, _] = color.0;
    Rgba([r, g, b, unit_to_byte(alpha)])
}

pub(crate) fn unit_to_byte(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn functional_body<'a>(s: &'a str, name: &str) -> Option<&'a str> {
    let lower = s.get(..name.len())?;
    if !lower.eq_ignore_ascii_case(name) {
        return None;
    }
    s[name.len()..]
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
}

fn parse_hex(hex: &str) -> Option<Rgba<u8>> {
    let digit = |i: usize| -> Option<u8> { u8::from_str_radix(hex.get(i..i + 1)?, 16).ok() };
    let pair = |i: usize| -> Option<u8> { u8::from_str_radix(hex.get(i..i + 2)?, 16).ok() };
    match hex.len() {
        3 => Some(Rgba([digit(0)? * 17, digit(1)? * 17, digit(2)? * 17, 255])),
        6 => Some(Rgba([pair(0)?, pair(2)?, pair(4)?, 255])),
        8 => Some(Rgba([pair(0)?, pair(2)?, pair(4)?, pair(6)?])),
        _ => None,
    }
}

fn parse_functional(body: &str, with_alpha: bool) -> Option<Rgba<u8>> {
    let parts: Vec<&str> = body.split(',').map(str::trim).collect();
    let expected = if with_alpha { 4 } else { 3 };
    if parts.len() != expected {
        return None;
    }
    let channel = |s: &str| -> Option<u8> {
        let v: f32 = s.parse().ok()?;
        Some(v.clamp(0.0, 255.0).round() as u8)
    };
    let alpha = if with_alpha {
        unit_to_byte(parts[3].parse().ok()?)
    } else {
        255
    };
    Some(Rgba([
        channel(parts[0])?,
        channel(parts[1])?,
        channel(parts[2])?,
        alpha,
    ]))
}
