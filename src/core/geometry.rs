use serde::{Deserialize, Serialize};
use crate::common::{FaceRollError, Result};

/// Axis-aligned face box in pixel coordinates, `(x1, y1)` top-left and `(x2, y2)` bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Zero for inverted or degenerate boxes.
    pub fn area(&self) -> f32 {
        if self.is_degenerate() {
            return 0.0;
        }
        self.width() * self.height()
    }

    fn is_degenerate(&self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }

    pub fn validate(&self) -> Result<()> {
        let coords = [self.x1, self.y1, self.x2, self.y2];
        if coords.iter().any(|c| !c.is_finite()) {
            return Err(FaceRollError::InvalidArgument(format!(
                "Bounding box has non-finite coordinates: {:?}", self
            )));
        }
        if self.is_degenerate() {
            return Err(FaceRollError::InvalidArgument(format!(
                "Bounding box must have positive width and height, got {}x{}",
                self.width(), self.height()
            )));
        }
        Ok(())
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let area1 = self.area();
        let area2 = other.area();
        if area1 <= 0.0 || area2 <= 0.0 {
            return 0.0;
        }

        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = area1 + area2 - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from(c: [f32; 4]) -> Self {
        Self::new(c[0], c[1], c[2], c[3])
    }
}
