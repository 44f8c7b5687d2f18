//! Screen geometry for display items
//!
//! All coordinates are pixels on the e-ink panel, origin top left.
//! Configured values may be negative or missing; both collapse to 0.

use serde::{Deserialize, Serialize};

/// Position of an item on the panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Build a point from signed configuration values, clamping negatives to 0.
    pub fn clamped(x: i64, y: i64) -> Self {
        Self {
            x: force_positive(x),
            y: force_positive(y),
        }
    }

    /// Shift this point to the right.
    pub fn offset_x(self, dx: u32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y,
        }
    }

    /// Shift this point down.
    pub fn offset_y(self, dy: u32) -> Self {
        Self {
            x: self.x,
            y: self.y.saturating_add(dy),
        }
    }
}

/// Footprint of an item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub height: u32,
    pub width: u32,
}

impl Size {
    pub fn new(height: u32, width: u32) -> Self {
        Self { height, width }
    }

    pub fn clamped(height: i64, width: i64) -> Self {
        Self {
            height: force_positive(height),
            width: force_positive(width),
        }
    }
}

/// Distance kept around an item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spacing {
    pub top: u32,
    pub left: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Spacing {
    /// Same spacing on every side.
    pub fn uniform(all: u32) -> Self {
        Self {
            top: all,
            left: all,
            right: all,
            bottom: all,
        }
    }

    pub fn horizontal(&self) -> u32 {
        self.left.saturating_add(self.right)
    }
}

/// Clamp a signed configuration value into pixel range.
pub fn force_positive(value: i64) -> u32 {
    if value < 0 {
        0
    } else {
        u32::try_from(value).unwrap_or(u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_negative_coordinates_clamp_to_zero() {
        assert_eq!(Point::clamped(-10, 200), Point::new(0, 200));
        assert_eq!(Point::clamped(100, -1), Point::new(100, 0));
        assert_eq!(Size::clamped(-5, -5), Size::default());
    }

    #[test]
    fn test_offsets() {
        let p = Point::new(10, 20).offset_x(100).offset_y(5);
        assert_eq!(p, Point::new(110, 25));
    }

    #[test]
    fn test_uniform_spacing() {
        let s = Spacing::uniform(10);
        assert_eq!(s.top, 10);
        assert_eq!(s.bottom, 10);
        assert_eq!(s.horizontal(), 20);
    }

    proptest! {
        #[test]
        fn prop_force_positive_never_negative(v in any::<i64>()) {
            let clamped = force_positive(v);
            if v <= 0 {
                prop_assert_eq!(clamped, 0);
            } else if v <= u32::MAX as i64 {
                prop_assert_eq!(clamped as i64, v);
            } else {
                prop_assert_eq!(clamped, u32::MAX);
            }
        }
    }
}
