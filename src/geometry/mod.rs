//! Rectangles in PDF user space.
//!
//! PDF user space has its origin at the bottom-left of the page and `y`
//! growing upwards, so a rectangle is given by its lower-left corner plus
//! width and height.

/// A rectangle in PDF user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// X coordinate of the lower-left corner
    pub x: f32,
    /// Y coordinate of the lower-left corner
    pub y: f32,
    /// Width of rectangle
    pub width: f32,
    /// Height of rectangle
    pub height: f32,
}

impl Rect {
    /// Create a new rectangle from position and dimensions.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdfseal::geometry::Rect;
    ///
    /// let rect = Rect::new(50.0, 775.0, 200.0, 55.0);
    /// assert_eq!(rect.right(), 250.0);
    /// ```
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a rectangle from two corner points.
    ///
    /// The corners may be given in any order.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdfseal::geometry::Rect;
    ///
    /// let rect = Rect::from_points(250.0, 830.0, 50.0, 775.0);
    /// assert_eq!(rect.x, 50.0);
    /// assert_eq!(rect.height, 55.0);
    /// ```
    pub fn from_points(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x: x0.min(x1),
            y: y0.min(y1),
            width: (x1 - x0).abs(),
            height: (y1 - y0).abs(),
        }
    }

    /// Get the left edge x-coordinate.
    pub fn left(&self) -> f32 {
        self.x
    }

    /// Get the right edge x-coordinate.
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Get the bottom edge y-coordinate.
    pub fn bottom(&self) -> f32 {
        self.y
    }

    /// Get the top edge y-coordinate.
    pub fn top(&self) -> f32 {
        self.y + self.height
    }

    /// `[llx lly urx ury]` as used by `/Rect` and `/BBox`.
    pub fn to_pdf_array(&self) -> [f32; 4] {
        [self.left(), self.bottom(), self.right(), self.top()]
    }

    /// Parse a PDF rectangle array, normalising the corner order.
    pub fn from_pdf_array(values: &[f64]) -> Option<Self> {
        match values {
            [x0, y0, x1, y1] => Some(Self::from_points(*x0 as f32, *y0 as f32, *x1 as f32, *y1 as f32)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_points_normalises() {
        let rect = Rect::from_points(250.0, 830.0, 50.0, 775.0);
        assert_eq!(rect, Rect::new(50.0, 775.0, 200.0, 55.0));
    }

    #[test]
    fn test_pdf_array() {
        let rect = Rect::from_points(50.0, 775.0, 250.0, 830.0);
        assert_eq!(rect.to_pdf_array(), [50.0, 775.0, 250.0, 830.0]);
        assert_eq!(Rect::from_pdf_array(&[50.0, 775.0, 250.0, 830.0]), Some(rect));
        assert_eq!(Rect::from_pdf_array(&[1.0, 2.0]), None);
    }
}
