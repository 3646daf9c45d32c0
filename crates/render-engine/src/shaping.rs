//! Minimal Arabic shaping for glyph-by-glyph rasterization.
//!
//! `rusttype` lays glyphs out left to right with no contextual forms, so
//! primary-language lines are rewritten before drawing: letters are mapped
//! to their presentation forms (isolated, final, initial, medial), lam-alef
//! pairs become ligatures, and the result is reordered into visual
//! (right-to-left) order with Latin and digit runs kept intact.

/// How a letter connects to its neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Joining {
    /// Joins on both sides.
    Dual,
    /// Joins only to the preceding letter.
    Right,
    /// Combining mark; ignored when looking for neighbours.
    Transparent,
    None,
}

/// Presentation forms: isolated, final, initial, medial. Zero means absent.
fn forms(c: char) -> Option<[u32; 4]> {
    let f = match c {
        '\u{0621}' => [0xFE80, 0, 0, 0],
        '\u{0622}' => [0xFE81, 0xFE82, 0, 0],
        '\u{0623}' => [0xFE83, 0xFE84, 0, 0],
        '\u{0624}' => [0xFE85, 0xFE86, 0, 0],
        '\u{0625}' => [0xFE87, 0xFE88, 0, 0],
        '\u{0626}' => [0xFE89, 0xFE8A, 0xFE8B, 0xFE8C],
        '\u{0627}' => [0xFE8D, 0xFE8E, 0, 0],
        '\u{0628}' => [0xFE8F, 0xFE90, 0xFE91, 0xFE92],
        '\u{0629}' => [0xFE93, 0xFE94, 0, 0],
        '\u{062A}' => [0xFE95, 0xFE96, 0xFE97, 0xFE98],
        '\u{062B}' => [0xFE99, 0xFE9A, 0xFE9B, 0xFE9C],
        '\u{062C}' => [0xFE9D, 0xFE9E, 0xFE9F, 0xFEA0],
        '\u{062D}' => [0xFEA1, 0xFEA2, 0xFEA3, 0xFEA4],
        '\u{062E}' => [0xFEA5, 0xFEA6, 0xFEA7, 0xFEA8],
        '\u{062F}' => [0xFEA9, 0xFEAA, 0, 0],
        '\u{0630}' => [0xFEAB, 0xFEAC, 0, 0],
        '\u{0631}' => [0xFEAD, 0xFEAE, 0, 0],
        '\u{0632}' => [0xFEAF, 0xFEB0, 0, 0],
        '\u{0633}' => [0xFEB1, 0xFEB2, 0xFEB3, 0xFEB4],
        '\u{0634}' => [0xFEB5, 0xFEB6, 0xFEB7, 0xFEB8],
        '\u{0635}' => [0xFEB9, 0xFEBA, 0xFEBB, 0xFEBC],
        '\u{0636}' => [0xFEBD, 0xFEBE, 0xFEBF, 0xFEC0],
        '\u{0637}' => [0xFEC1, 0xFEC2, 0xFEC3, 0xFEC4],
        '\u{0638}' => [0xFEC5, 0xFEC6, 0xFEC7, 0xFEC8],
        '\u{0639}' => [0xFEC9, 0xFECA, 0xFECB, 0xFECC],
        '\u{063A}' => [0xFECD, 0xFECE, 0xFECF, 0xFED0],
        '\u{0640}' => [0x0640, 0x0640, 0x0640, 0x0640],
        '\u{0641}' => [0xFED1, 0xFED2, 0xFED3, 0xFED4],
        '\u{0642}' => [0xFED5, 0xFED6, 0xFED7, 0xFED8],
        '\u{0643}' => [0xFED9, 0xFEDA, 0xFEDB, 0xFEDC],
        '\u{0644}' => [0xFEDD, 0xFEDE, 0xFEDF, 0xFEE0],
        '\u{0645}' => [0xFEE1, 0xFEE2, 0xFEE3, 0xFEE4],
        '\u{0646}' => [0xFEE5, 0xFEE6, 0xFEE7, 0xFEE8],
        '\u{0647}' => [0xFEE9, 0xFEEA, 0xFEEB, 0xFEEC],
        '\u{0648}' => [0xFEED, 0xFEEE, 0, 0],
        '\u{0649}' => [0xFEEF, 0xFEF0, 0, 0],
        '\u{064A}' => [0xFEF1, 0xFEF2, 0xFEF3, 0xFEF4],
        _ => return None,
    };
    Some(f)
}

fn joining(c: char) -> Joining {
    if is_mark(c) {
        return Joining::Transparent;
    }
    match forms(c) {
        Some([_, 0, _, _]) => Joining::None,
        Some([_, _, 0, _]) => Joining::Right,
        Some(_) => Joining::Dual,
        None => Joining::None,
    }
}

fn is_mark(c: char) -> bool {
    matches!(c,
        '\u{0300}'..='\u{036F}'
        | '\u{0610}'..='\u{061A}'
        | '\u{064B}'..='\u{065F}'
        | '\u{0670}'
        | '\u{06D6}'..='\u{06DC}'
        | '\u{06DF}'..='\u{06E4}'
        | '\u{06E7}'..='\u{06E8}'
        | '\u{06EA}'..='\u{06ED}'
        | '\u{08D3}'..='\u{08FF}')
}

fn is_rtl(c: char) -> bool {
    matches!(c,
        '\u{0590}'..='\u{08FF}'
        | '\u{FB1D}'..='\u{FDFF}'
        | '\u{FE70}'..='\u{FEFF}')
}

/// Lam-alef ligature (isolated, final) for the alef variant following a lam.
fn lam_alef(alef: char) -> Option<(u32, u32)> {
    match alef {
        '\u{0622}' => Some((0xFEF5, 0xFEF6)),
        '\u{0623}' => Some((0xFEF7, 0xFEF8)),
        '\u{0625}' => Some((0xFEF9, 0xFEFA)),
        '\u{0627}' => Some((0xFEFB, 0xFEFC)),
        _ => None,
    }
}

fn from_code(code: u32, fallback: char) -> char {
    char::from_u32(code).unwrap_or(fallback)
}

/// Replace Arabic letters with contextual presentation forms.
pub fn shape_arabic(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let neighbour = |from: usize, step: isize| -> Option<usize> {
        let mut i = from as isize + step;
        while i >= 0 && (i as usize) < chars.len() {
            if joining(chars[i as usize]) != Joining::Transparent {
                return Some(i as usize);
            }
            i += step;
        }
        None
    };

    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let Some(table) = forms(c) else {
            out.push(c);
            i += 1;
            continue;
        };

        let prev = neighbour(i, -1);
        let next = neighbour(i, 1);
        let joins_prev = prev.is_some_and(|p| joining(chars[p]) == Joining::Dual)
            && matches!(joining(c), Joining::Dual | Joining::Right);

        if c == '\u{0644}' {
            if let Some((n, (isolated, final_form))) =
                next.and_then(|n| lam_alef(chars[n]).map(|l| (n, l)))
            {
                out.push(from_code(if joins_prev { final_form } else { isolated }, c));
                // Marks between the lam and the alef stay with the ligature.
                out.extend(&chars[i + 1..n]);
                i = n + 1;
                continue;
            }
        }

        let joins_next = joining(c) == Joining::Dual
            && next.is_some_and(|n| matches!(joining(chars[n]), Joining::Dual | Joining::Right));

        let [isolated, final_form, initial, medial] = table;
        let code = match (joins_prev, joins_next) {
            (true, true) if medial != 0 => medial,
            (true, _) if final_form != 0 => final_form,
            (false, true) if initial != 0 => initial,
            _ => isolated,
        };
        out.push(from_code(code, c));
        i += 1;
    }
    out
}

/// Reorder a mostly right-to-left line into visual order.
///
/// Left-to-right runs (ASCII letters and digits, with inner spaces and
/// punctuation between them) keep their internal order; everything else is
/// reversed cluster by cluster, with combining marks kept after their base.
pub fn visual_order(text: &str) -> String {
    if !text.chars().any(is_rtl) {
        return text.to_string();
    }

    let chars: Vec<char> = text.chars().collect();
    let mut segments: Vec<String> = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_alphanumeric() {
            let start = i;
            let mut end = i + 1;
            while end < chars.len() {
                if chars[end].is_ascii_alphanumeric() {
                    end += 1;
                } else if matches!(chars[end], ' ' | '.' | ',' | ':' | '-' | '/')
                    && chars.get(end + 1).is_some_and(|n| n.is_ascii_alphanumeric())
                {
                    end += 2;
                } else {
                    break;
                }
            }
            segments.push(chars[start..end].iter().collect());
            i = end;
        } else {
            let mut cluster = String::new();
            cluster.push(mirror(c));
            i += 1;
            while i < chars.len() && is_mark(chars[i]) {
                cluster.push(chars[i]);
                i += 1;
            }
            segments.push(cluster);
        }
    }
    segments.reverse();
    segments.concat()
}

fn mirror(c: char) -> char {
    match c {
        '(' => ')',
        ')' => '(',
        '[' => ']',
        ']' => '[',
        '{' => '}',
        '}' => '{',
        '«' => '»',
        '»' => '«',
        '<' => '>',
        '>' => '<',
        other => other,
    }
}

/// Shape and reorder a line for left-to-right glyph drawing.
pub fn prepare_line(text: &str) -> String {
    if text.chars().any(is_rtl) {
        visual_order(&shape_arabic(text))
    } else {
        text.to_string()
    }
}
