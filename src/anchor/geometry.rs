//! PDF-space to screen-space coordinate mapping
//!
//! Transforms are stored in the usual six-element PDF form `[a, b, c, d, e, f]`,
//! mapping `(x, y)` to `(a*x + c*y + e, b*x + d*y + f)`.

use serde::{Deserialize, Serialize};

/// Affine transform in PDF matrix order
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform(pub [f64; 6]);

impl Transform {
    pub const IDENTITY: Self = Self([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    #[must_use]
    pub const fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self([a, b, c, d, e, f])
    }

    /// Concatenate two transforms; `inner` is applied first, then `self`.
    #[must_use]
    pub fn then_apply_to(&self, inner: &Transform) -> Transform {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = inner.0;
        Transform([
            a1 * a2 + c1 * b2,
            b1 * a2 + d1 * b2,
            a1 * c2 + c1 * d2,
            b1 * c2 + d1 * d2,
            a1 * e2 + c1 * f2 + e1,
            b1 * e2 + d1 * f2 + f1,
        ])
    }

    #[must_use]
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Page viewport: page box, zoom and rotation folded into one transform.
///
/// The y axis is flipped so that PDF's bottom-left origin lands at the
/// top-left corner of the rendered page.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// Rendered width in pixels (after rotation)
    pub width: f64,
    /// Rendered height in pixels (after rotation)
    pub height: f64,
    pub scale: f64,
    /// Rotation in degrees, one of 0, 90, 180, 270
    pub rotation: u16,
    pub transform: Transform,
}

impl Viewport {
    /// Build a viewport for a page of `page_width` x `page_height` PDF units.
    #[must_use]
    pub fn new(page_width: f64, page_height: f64, scale: f64, rotation: i32) -> Self {
        let rotation = normalize_rotation(rotation);
        let (rotate_a, rotate_b, rotate_c, rotate_d) = match rotation {
            90 => (0.0, 1.0, 1.0, 0.0),
            180 => (-1.0, 0.0, 0.0, 1.0),
            270 => (0.0, -1.0, -1.0, 0.0),
            _ => (1.0, 0.0, 0.0, -1.0),
        };

        let center_x = page_width / 2.0;
        let center_y = page_height / 2.0;

        let (offset_x, offset_y, width, height) = if rotate_a == 0.0 {
            (
                center_y * scale,
                center_x * scale,
                page_height * scale,
                page_width * scale,
            )
        } else {
            (
                center_x * scale,
                center_y * scale,
                page_width * scale,
                page_height * scale,
            )
        };

        let transform = Transform::new(
            rotate_a * scale,
            rotate_b * scale,
            rotate_c * scale,
            rotate_d * scale,
            offset_x - rotate_a * scale * center_x - rotate_c * scale * center_y,
            offset_y - rotate_b * scale * center_x - rotate_d * scale * center_y,
        );

        Self {
            width,
            height,
            scale,
            rotation,
            transform,
        }
    }
}

/// Page box in PDF units
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    #[must_use]
    pub fn viewport(&self, scale: f64, rotation: i32) -> Viewport {
        Viewport::new(self.width, self.height, scale, rotation)
    }
}

/// Snap an arbitrary rotation to the nearest quarter turn in `[0, 360)`.
#[must_use]
pub fn normalize_rotation(degrees: i32) -> u16 {
    let wrapped = degrees.rem_euclid(360);
    let quarter = ((wrapped + 45) / 90) % 4;
    (quarter * 90) as u16
}

/// Screen placement of a glyph run's origin
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenPosition {
    /// Baseline origin, x
    pub x: f64,
    /// Baseline origin, y
    pub y: f64,
    pub font_size_px: f64,
    pub rotation_rad: f64,
}

impl ScreenPosition {
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.font_size_px.is_finite()
            && self.rotation_rad.is_finite()
    }
}

/// Map a glyph run's PDF-space transform onto the screen.
///
/// Rotation follows the transformed text direction (x basis), font size the
/// length of the transformed vertical basis. Non-finite inputs produce
/// non-finite outputs; callers filter them.
#[must_use]
pub fn to_screen(glyph: &Transform, viewport: &Transform) -> ScreenPosition {
    let [a, b, c, d, e, f] = viewport.then_apply_to(glyph).0;
    ScreenPosition {
        x: e,
        y: f,
        font_size_px: c.hypot(d),
        rotation_rad: b.atan2(a),
    }
}
