//! Reassembly of classified glyphs into a page layout.
//!
//! Boxes are shifted so the bottom-left corner of the glyph cloud becomes
//! the origin and the row axis is flipped, giving plotting coordinates where
//! `y` grows upward.

use serde::{Deserialize, Serialize};

use crate::models::candidate::{BoundingBox, ClassifiedSet};
use glyphscan_model::Label;

/// A glyph placed in layout coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutGlyph {
    pub label: Label,
    /// Left edge.
    pub x: i64,
    /// Baseline (bottom edge).
    pub y: i64,
    /// Transformed box `[top, left, bottom, right]`.
    pub coords: [i64; 4],
}

impl LayoutGlyph {
    pub fn width(&self) -> i64 {
        self.coords[3] - self.coords[1]
    }
}

/// Glyphs in layout coordinates plus the layout extent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub glyphs: Vec<LayoutGlyph>,
    pub x_max: i64,
    pub y_max: i64,
}

/// Place every classified candidate of `set` in layout coordinates.
pub fn reassemble(set: &ClassifiedSet) -> Layout {
    let boxes: Vec<BoundingBox> = set.items().iter().map(|i| i.candidate.bbox).collect();
    let (Some(origin_row), Some(origin_col)) = (
        boxes.iter().map(|b| b.row_max).max(),
        boxes.iter().map(|b| b.col_min).min(),
    ) else {
        return Layout::default();
    };

    let (r, c) = (origin_row as i64, origin_col as i64);
    let glyphs: Vec<LayoutGlyph> = set
        .items()
        .iter()
        .zip(&boxes)
        .map(|(item, b)| {
            let coords = [
                r - b.row_min as i64,
                b.col_min as i64 - c,
                r - b.row_max as i64,
                b.col_max as i64 - c,
            ];
            LayoutGlyph {
                label: item.label,
                x: coords[1],
                y: coords[2],
                coords,
            }
        })
        .collect();

    let y_max = glyphs.iter().map(|g| g.coords[0]).max().unwrap_or(0);
    let x_max = glyphs.iter().map(|g| g.coords[3]).max().unwrap_or(0);

    Layout { glyphs, x_max, y_max }
}

impl Layout {
    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// Render as text lines, top line first.
    ///
    /// Glyphs whose baselines lie within `line_tolerance` of a line's first
    /// baseline share that line. A space separates glyphs whose gap is wider
    /// than the median glyph width.
    pub fn to_text(&self, line_tolerance: f32) -> String {
        if self.glyphs.is_empty() {
            return String::new();
        }

        let mut widths: Vec<i64> = self.glyphs.iter().map(LayoutGlyph::width).collect();
        widths.sort_unstable();
        let median_width = widths[widths.len() / 2];

        let mut ordered: Vec<&LayoutGlyph> = self.glyphs.iter().collect();
        ordered.sort_by(|a, b| b.y.cmp(&a.y).then(a.x.cmp(&b.x)));

        let mut lines: Vec<Vec<&LayoutGlyph>> = Vec::new();
        for glyph in ordered {
            match lines.last_mut() {
                Some(line) if ((line[0].y - glyph.y) as f32).abs() <= line_tolerance => line.push(glyph),
                _ => lines.push(vec![glyph]),
            }
        }

        lines
            .iter_mut()
            .map(|line| {
                line.sort_by_key(|g| g.x);
                let mut text = String::new();
                let mut right: Option<i64> = None;
                for glyph in line.iter() {
                    if right.is_some_and(|r| glyph.x - r > median_width) {
                        text.push(' ');
                    }
                    text.push(glyph.label);
                    right = Some(glyph.coords[3]);
                }
                text
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
