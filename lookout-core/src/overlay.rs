//! Drawing boxes, labels and the status line onto frames.
//!
//! Text uses a built-in 5x7 bitmap font covering digits, ASCII letters
//! (lowercase is drawn as uppercase) and the punctuation the overlay needs.
//! Anything else is drawn as a blank cell.

use image::{Rgb, RgbImage};

use crate::detect::{BoundingBox, Detection};

pub const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const STATUS_COLOR: Rgb<u8> = Rgb([255, 255, 0]);

const BOX_THICKNESS: u32 = 2;
const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
const LABEL_SCALE: u32 = 2;
const STATUS_SCALE: u32 = 2;
const STATUS_ORIGIN: (i64, i64) = (10, 10);

/// Text shown in the top-left corner of every frame.
pub fn status_text(detection_enabled: bool, count: usize) -> String {
    if detection_enabled {
        format!("Detection: ON | Detected: {count}")
    } else {
        "Detection: OFF | Detected: 0".to_string()
    }
}

/// Label drawn above the `index`-th (1-based) accepted detection.
pub fn detection_label(label: &str, index: usize, confidence: f32) -> String {
    format!("{label} {index}: {confidence:.2}")
}

/// Draw one box and label per detection, in order.
pub fn annotate_detections(image: &mut RgbImage, detections: &[Detection], label: &str) {
    for (i, detection) in detections.iter().enumerate() {
        draw_box(image, &detection.bbox, BOX_COLOR);
        let text = detection_label(label, i + 1, detection.confidence);
        let text_height = (GLYPH_HEIGHT * LABEL_SCALE) as i64;
        let x = detection.bbox.x1 as i64;
        let y = (detection.bbox.y1 as i64 - 10 - text_height).max(0);
        draw_text(image, &text, x, y, LABEL_SCALE, BOX_COLOR);
    }
}

pub fn draw_status(image: &mut RgbImage, detection_enabled: bool, count: usize) {
    let text = status_text(detection_enabled, count);
    draw_text(
        image,
        &text,
        STATUS_ORIGIN.0,
        STATUS_ORIGIN.1,
        STATUS_SCALE,
        STATUS_COLOR,
    );
}

/// Hollow rectangle, clipped to the frame.
pub fn draw_box(image: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>) {
    let x1 = bbox.x1.round() as i64;
    let y1 = bbox.y1.round() as i64;
    let x2 = bbox.x2.round() as i64;
    let y2 = bbox.y2.round() as i64;
    let t = BOX_THICKNESS as i64;

    fill_rect(image, x1, y1, x2, y1 + t, color);
    fill_rect(image, x1, y2 - t, x2, y2, color);
    fill_rect(image, x1, y1, x1 + t, y2, color);
    fill_rect(image, x2 - t, y1, x2, y2, color);
}

/// Render `text` with its top-left corner at (`x`, `y`).
pub fn draw_text(image: &mut RgbImage, text: &str, x: i64, y: i64, scale: u32, color: Rgb<u8>) {
    let scale = scale.max(1) as i64;
    let advance = (GLYPH_WIDTH as i64 + 1) * scale;

    for (i, ch) in text.chars().enumerate() {
        let origin_x = x + i as i64 * advance;
        let rows = glyph(ch);
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH as i64 {
                if bits & (1 << (GLYPH_WIDTH as i64 - 1 - col)) == 0 {
                    continue;
                }
                let px = origin_x + col * scale;
                let py = y + row as i64 * scale;
                fill_rect(image, px, py, px + scale, py + scale, color);
            }
        }
    }
}

/// Fill the half-open rectangle [x1, x2) x [y1, y2), clipped to the frame.
fn fill_rect(image: &mut RgbImage, x1: i64, y1: i64, x2: i64, y2: i64, color: Rgb<u8>) {
    let (width, height) = (image.width() as i64, image.height() as i64);
    let (x1, x2) = (x1.clamp(0, width), x2.clamp(0, width));
    let (y1, y2) = (y1.clamp(0, height), y2.clamp(0, height));
    for y in y1..y2 {
        for x in x1..x2 {
            image.put_pixel(x as u32, y as u32, color);
        }
    }
}

fn glyph(ch: char) -> [u8; 7] {
    match ch.to_ascii_uppercase() {
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1E],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        ':' => [0x00, 0x0C, 0x0C, 0x00, 0x0C, 0x0C, 0x00],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        '|' => [0x04, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        _ => [0; 7],
    }
}
