//! Aspect ratio math for the crop functionality.
//!
//! Pure, deterministic functions shared by the crop-filter construction and
//! interactive crop manipulation: ratio parsing and simplification, dependent
//! dimension calculation, and constrained-rectangle fitting. One solver, two
//! call sites.
//!
//! All produced dimensions are rounded down to even values (encoder
//! requirement for 4:2:0 output) with a floor of [`MIN_CROP_DIMENSION`].

use crate::error::{CoreError, CoreResult};

/// Smallest crop width/height the solver will produce.
pub const MIN_CROP_DIMENSION: u32 = 32;

/// Relative tolerance used when matching dimensions against preset ratios.
const PRESET_RATIO_TOLERANCE: f64 = 0.02;

/// Integer crop rectangle.
///
/// Every producer in this crate keeps x/y/width/height even, width/height at
/// least [`MIN_CROP_DIMENSION`], and the rectangle inside its image bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    #[must_use]
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Which corner (or the center) stays put when a rectangle is resized to
/// satisfy a ratio constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Anchor {
    #[default]
    Center,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Greatest common divisor (Euclidean algorithm).
fn gcd(a: u32, b: u32) -> u32 {
    let (mut a, mut b) = (a, b);
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Simplifies an aspect ratio to its smallest integer components.
///
/// Returns `(0, 0)` when either input is zero.
///
/// ```
/// use timeslap_core::aspect::simplify;
/// assert_eq!(simplify(1920, 1080), (16, 9));
/// assert_eq!(simplify(1080, 1080), (1, 1));
/// ```
#[must_use]
pub fn simplify(width: u32, height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (0, 0);
    }
    let divisor = gcd(width, height);
    (width / divisor, height / divisor)
}

/// Parses a ratio string like `"16:9"` or `"2.39:1"` into simplified integer
/// components. Decimal components are scaled to integers using the maximum
/// decimal-place count on either side.
///
/// ```
/// use timeslap_core::aspect::parse_ratio;
/// assert_eq!(parse_ratio("16:9").unwrap(), (16, 9));
/// assert_eq!(parse_ratio("2.39:1").unwrap(), (239, 100));
/// ```
pub fn parse_ratio(text: &str) -> CoreResult<(u32, u32)> {
    let malformed = || CoreError::RatioParse(format!("invalid ratio format: {text}"));

    let mut parts = text.split(':');
    let (w_str, h_str) = match (parts.next(), parts.next(), parts.next()) {
        (Some(w), Some(h), None) => (w.trim(), h.trim()),
        _ => return Err(malformed()),
    };

    let w_float: f64 = w_str.parse().map_err(|_| malformed())?;
    let h_float: f64 = h_str.parse().map_err(|_| malformed())?;
    if !w_float.is_finite() || !h_float.is_finite() || w_float < 0.0 || h_float < 0.0 {
        return Err(malformed());
    }

    let decimals = |s: &str| s.split('.').nth(1).map_or(0, str::len);
    let scale = 10u64.pow(decimals(w_str).max(decimals(h_str)).min(9) as u32) as f64;

    let w_scaled = (w_float * scale).round() as u64;
    let h_scaled = (h_float * scale).round() as u64;
    let w_int = u32::try_from(w_scaled).map_err(|_| malformed())?;
    let h_int = u32::try_from(h_scaled).map_err(|_| malformed())?;

    Ok(simplify(w_int, h_int))
}

/// Calculates the height matching `width` under the given ratio, rounded down
/// to even with a floor of [`MIN_CROP_DIMENSION`]. A zero `ratio_w` yields the
/// floor value.
#[must_use]
pub fn height_from_width(width: u32, ratio_w: u32, ratio_h: u32) -> u32 {
    if ratio_w == 0 {
        return MIN_CROP_DIMENSION;
    }
    let height = (f64::from(width) * f64::from(ratio_h) / f64::from(ratio_w)).round() as u32;
    (height / 2 * 2).max(MIN_CROP_DIMENSION)
}

/// Mirror of [`height_from_width`].
#[must_use]
pub fn width_from_height(height: u32, ratio_w: u32, ratio_h: u32) -> u32 {
    if ratio_h == 0 {
        return MIN_CROP_DIMENSION;
    }
    let width = (f64::from(height) * f64::from(ratio_w) / f64::from(ratio_h)).round() as u32;
    (width / 2 * 2).max(MIN_CROP_DIMENSION)
}

/// Constrains a rectangle to an aspect ratio while staying within bounds.
///
/// Computes candidates using width-as-base and height-as-base and picks
/// whichever fits both bounds; when neither fits, the more constraining bound
/// wins and the other dimension is recomputed from it. The anchor decides how
/// the (possibly smaller) result is repositioned relative to the original.
/// Output is rounded to even and clamped into the bounds.
#[must_use]
pub fn constrain_rect(
    rect: Rect,
    ratio_w: u32,
    ratio_h: u32,
    max_w: u32,
    max_h: u32,
    anchor: Anchor,
) -> Rect {
    let Rect {
        x,
        y,
        width: w,
        height: h,
    } = rect;

    let h_candidate = height_from_width(w, ratio_w, ratio_h);
    let w_candidate = width_from_height(h, ratio_w, ratio_h);

    let (mut new_w, mut new_h) = if h_candidate <= max_h && w <= max_w {
        (w, h_candidate)
    } else if w_candidate <= max_w && h <= max_h {
        (w_candidate, h)
    } else {
        // Neither fits; scale down from the more constrained axis.
        let width_ratio = if w > 0 { f64::from(max_w) / f64::from(w) } else { 1.0 };
        let height_ratio = if h > 0 { f64::from(max_h) / f64::from(h) } else { 1.0 };

        if width_ratio < height_ratio {
            let mut nw = max_w;
            let mut nh = height_from_width(nw, ratio_w, ratio_h);
            if nh > max_h {
                nh = max_h;
                nw = width_from_height(nh, ratio_w, ratio_h);
            }
            (nw, nh)
        } else {
            let mut nh = max_h;
            let mut nw = width_from_height(nh, ratio_w, ratio_h);
            if nw > max_w {
                nw = max_w;
                nh = height_from_width(nw, ratio_w, ratio_h);
            }
            (nw, nh)
        }
    };

    new_w = (new_w / 2 * 2).max(MIN_CROP_DIMENSION);
    new_h = (new_h / 2 * 2).max(MIN_CROP_DIMENSION);

    // Reposition relative to the original rectangle; signed math because the
    // anchored corner can push the origin negative before clamping.
    let (x, y, w, h) = (
        i64::from(x),
        i64::from(y),
        i64::from(w),
        i64::from(h),
    );
    let (nw, nh) = (i64::from(new_w), i64::from(new_h));

    let (mut new_x, mut new_y) = match anchor {
        Anchor::Center => (x + w / 2 - nw / 2, y + h / 2 - nh / 2),
        Anchor::TopLeft => (x, y),
        Anchor::TopRight => (x + w - nw, y),
        Anchor::BottomLeft => (x, y + h - nh),
        Anchor::BottomRight => (x + w - nw, y + h - nh),
    };

    new_x = new_x.clamp(0, (i64::from(max_w) - nw).max(0));
    new_y = new_y.clamp(0, (i64::from(max_h) - nh).max(0));

    Rect {
        x: (new_x as u32) / 2 * 2,
        y: (new_y as u32) / 2 * 2,
        width: new_w,
        height: new_h,
    }
}

/// Finds the preset ratio closest to the given dimensions.
///
/// Compares `width / height` against each preset's decimal value and returns
/// the preset with the smallest absolute difference within a 2% tolerance;
/// ties resolve to the first-seen preset. Invalid preset strings are skipped.
#[must_use]
pub fn closest_preset<'a>(width: u32, height: u32, presets: &[&'a str]) -> Option<&'a str> {
    if width == 0 || height == 0 {
        return None;
    }

    let actual = f64::from(width) / f64::from(height);
    let mut best: Option<&str> = None;
    let mut min_diff = f64::INFINITY;

    for preset in presets {
        let Ok((rw, rh)) = parse_ratio(preset) else {
            continue;
        };
        if rh == 0 {
            continue;
        }
        let diff = (actual - f64::from(rw) / f64::from(rh)).abs();
        if diff < min_diff && diff < PRESET_RATIO_TOLERANCE {
            min_diff = diff;
            best = Some(preset);
        }
    }

    best
}
