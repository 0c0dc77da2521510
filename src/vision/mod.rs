//! Vision post-processing: letterbox resize, YOLO-v8 layout decoding, and
//! CRAFT-style heatmap-to-region text detection.

pub mod craft;
pub mod yolo;

/// A single detected object: box in original-image coordinates, label
/// index, and confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub box_xyxy: [f32; 4],
    pub class_index: usize,
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }
    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }
    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextRegion {
    pub box_xyxy: [f32; 4],
    pub confidence: f32,
}

/// Result of letterboxing: resize preserving aspect ratio, gray-padded to
/// a square target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scaled_width: u32,
    pub scaled_height: u32,
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

/// `scale = min(target/W, target/H)`; pad centers the scaled image in a
/// `target x target` canvas.
pub fn letterbox(source_width: u32, source_height: u32, target: u32) -> Letterbox {
    let scale = (target as f32 / source_width as f32).min(target as f32 / source_height as f32);
    let scaled_width = (source_width as f32 * scale).round() as u32;
    let scaled_height = (source_height as f32 * scale).round() as u32;
    let pad_x = (target as f32 - scaled_width as f32) / 2.0;
    let pad_y = (target as f32 - scaled_height as f32) / 2.0;

    Letterbox {
        scaled_width,
        scaled_height,
        scale,
        pad_x,
        pad_y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letterbox_640x480_to_320() {
        let lb = letterbox(640, 480, 320);
        assert_eq!(lb.scale, 0.5);
        assert_eq!(lb.scaled_width, 320);
        assert_eq!(lb.scaled_height, 240);
        assert_eq!(lb.pad_x, 0.0);
        assert_eq!(lb.pad_y, 40.0);
    }

    #[test]
    fn bounding_box_derives_width_height_area() {
        let b = BoundingBox { x1: 10.0, y1: 10.0, x2: 30.0, y2: 50.0 };
        assert_eq!(b.width(), 20.0);
        assert_eq!(b.height(), 40.0);
        assert_eq!(b.area(), 800.0);
    }
}
