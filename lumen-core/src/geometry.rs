//! Spatial vocabulary shared across the Lumen crates.
//!
//! Pixel-space boxes with the edge-inclusive semantics the output layout
//! relies on, the eight-way output transform, and the 24.8 fixed-point
//! representation used for surface coordinates on the wire.

use serde::Deserialize;

/// The eight output transforms, wire-encoded 0–7.
///
/// Odd encodings are the 90°/270° family and swap an output's effective
/// width and height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum Transform {
    /// No transform.
    #[default]
    Normal = 0,
    /// Rotated 90° counter-clockwise.
    Rotated90 = 1,
    /// Rotated 180°.
    Rotated180 = 2,
    /// Rotated 270° counter-clockwise.
    Rotated270 = 3,
    /// Flipped around the vertical axis.
    Flipped = 4,
    /// Flipped, then rotated 90°.
    Flipped90 = 5,
    /// Flipped, then rotated 180°.
    Flipped180 = 6,
    /// Flipped, then rotated 270°.
    Flipped270 = 7,
}

impl Transform {
    /// Decode a wire value.
    pub fn from_raw(raw: i32) -> Option<Transform> {
        Some(match raw {
            0 => Transform::Normal,
            1 => Transform::Rotated90,
            2 => Transform::Rotated180,
            3 => Transform::Rotated270,
            4 => Transform::Flipped,
            5 => Transform::Flipped90,
            6 => Transform::Flipped180,
            7 => Transform::Flipped270,
            _ => return None,
        })
    }

    /// The wire encoding.
    pub fn raw(self) -> i32 {
        self as i32
    }

    /// Whether this transform swaps width and height.
    pub fn is_odd(self) -> bool {
        self.raw() % 2 == 1
    }

    /// Number of 90° counter-clockwise rotation steps (0–3).
    pub fn rotation_steps(self) -> i32 {
        self.raw() % 4
    }

    /// Whether the transform mirrors around the vertical axis.
    pub fn is_flipped(self) -> bool {
        self.raw() >= 4
    }
}

impl<'de> Deserialize<'de> for Transform {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        match name.as_str() {
            "normal" => Ok(Transform::Normal),
            "90" => Ok(Transform::Rotated90),
            "180" => Ok(Transform::Rotated180),
            "270" => Ok(Transform::Rotated270),
            "flipped" => Ok(Transform::Flipped),
            "flipped-90" => Ok(Transform::Flipped90),
            "flipped-180" => Ok(Transform::Flipped180),
            "flipped-270" => Ok(Transform::Flipped270),
            other => Err(serde::de::Error::custom(format!(
                "unknown transform {other:?}"
            ))),
        }
    }
}

/// A pixel-space rectangle in layout coordinates.
///
/// Point queries treat all four edges as part of the box. The layout's
/// tie-break behavior at output seams depends on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl PBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        PBox {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the box has no area.
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Edge-inclusive point containment.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.x as f64
            && x <= (self.x + self.width) as f64
            && y >= self.y as f64
            && y <= (self.y + self.height) as f64
    }

    /// The point on (or in) the box closest to `(x, y)`, clamped to the
    /// edge-inclusive extent.
    pub fn closest_point(&self, x: f64, y: f64) -> (f64, f64) {
        let cx = x.clamp(self.x as f64, (self.x + self.width) as f64);
        let cy = y.clamp(self.y as f64, (self.y + self.height) as f64);
        (cx, cy)
    }

    /// The overlap of two boxes, or `None` when they do not meet.
    pub fn intersection(&self, other: &PBox) -> Option<PBox> {
        if self.is_empty() || other.is_empty() {
            return None;
        }
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);
        let result = PBox::new(x1, y1, x2 - x1, y2 - y1);
        if result.is_empty() {
            None
        } else {
            Some(result)
        }
    }

    /// Whether two boxes overlap.
    pub fn intersects(&self, other: &PBox) -> bool {
        self.intersection(other).is_some()
    }
}

/// A 24.8 fixed-point coordinate, the wire representation of surface-local
/// positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fixed(i32);

impl Fixed {
    /// Wrap a raw wire value.
    pub fn from_raw(raw: i32) -> Fixed {
        Fixed(raw)
    }

    /// The raw wire value, 1/256ths of a unit.
    pub fn raw(self) -> i32 {
        self.0
    }

    pub fn from_f64(value: f64) -> Fixed {
        Fixed((value * 256.0).round() as i32)
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / 256.0
    }

    pub fn from_int(value: i32) -> Fixed {
        Fixed(value * 256)
    }
}
