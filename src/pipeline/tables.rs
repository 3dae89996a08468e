//! Heuristic table detection from positioned text cells.
//!
//! pdfium reports page text as segments with bounding boxes. A table shows
//! up as several consecutive lines that each break into the same number of
//! horizontally separated cells. The detector:
//!
//! 1. clusters cells into lines by vertical centre,
//! 2. groups consecutive lines with a compatible cell count into regions,
//! 3. derives column boundaries from the left edges seen in a region,
//! 4. assigns each cell to a column and emits one [`TableRow`] per line.
//!
//! Columns are labelled by 0-based position (`"0"`, `"1"`, …); the first
//! line of a region is data, not a header.

use crate::output::{Table, TableRow};
use std::cmp::Ordering;

/// A text run with its bounding box, top-left origin, in points.
#[derive(Debug, Clone)]
pub struct TextCell {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl TextCell {
    pub fn new(text: impl Into<String>, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            text: text.into(),
            x,
            y,
            width,
            height,
        }
    }

    fn center_x(&self) -> f32 {
        self.x + self.width / 2.0
    }

    fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    fn right(&self) -> f32 {
        self.x + self.width
    }
}

/// Tunables for [`TableDetector`].
#[derive(Debug, Clone)]
pub struct TableDetector {
    /// Cells whose vertical centres are within this distance share a line.
    pub row_tolerance: f32,
    /// Left edges closer than this belong to the same column.
    pub col_tolerance: f32,
    /// Minimum consecutive lines for a region to count as a table.
    pub min_rows: usize,
    /// Minimum cells per line.
    pub min_cols: usize,
}

impl Default for TableDetector {
    fn default() -> Self {
        Self {
            row_tolerance: 5.0,
            col_tolerance: 10.0,
            min_rows: 2,
            min_cols: 2,
        }
    }
}

impl TableDetector {
    /// Find tables among `cells`, top to bottom.
    pub fn detect(&self, cells: &[TextCell]) -> Vec<Table> {
        let cells: Vec<&TextCell> = cells.iter().filter(|c| !c.text.trim().is_empty()).collect();
        if cells.len() < self.min_rows * self.min_cols {
            return Vec::new();
        }

        let lines = self.cluster_lines(&cells);
        self.find_regions(&lines)
            .iter()
            .filter_map(|region| self.build_table(region))
            .collect()
    }

    fn cluster_lines<'a>(&self, cells: &[&'a TextCell]) -> Vec<Vec<&'a TextCell>> {
        let mut sorted = cells.to_vec();
        sorted.sort_by(|a, b| cmp_f32(a.center_y(), b.center_y()));

        let mut lines: Vec<Vec<&TextCell>> = Vec::new();
        for cell in sorted {
            match lines.last_mut() {
                Some(line)
                    if (cell.center_y() - line[0].center_y()).abs() <= self.row_tolerance =>
                {
                    line.push(cell)
                }
                _ => lines.push(vec![cell]),
            }
        }
        for line in &mut lines {
            line.sort_by(|a, b| cmp_f32(a.x, b.x));
        }
        lines
    }

    fn find_regions<'a>(&self, lines: &[Vec<&'a TextCell>]) -> Vec<Vec<Vec<&'a TextCell>>> {
        let mut regions = Vec::new();
        let mut current: Vec<Vec<&TextCell>> = Vec::new();
        let mut expected: Option<usize> = None;

        for line in lines {
            let n = line.len();
            if n < self.min_cols {
                if current.len() >= self.min_rows {
                    regions.push(std::mem::take(&mut current));
                }
                current.clear();
                expected = None;
                continue;
            }
            match expected {
                // Allow one merged or missing cell per line.
                Some(cols) if n.abs_diff(cols) <= 1 => current.push(line.clone()),
                _ => {
                    if current.len() >= self.min_rows {
                        regions.push(std::mem::take(&mut current));
                    }
                    current.clear();
                    current.push(line.clone());
                    expected = Some(n);
                }
            }
        }
        if current.len() >= self.min_rows {
            regions.push(current);
        }
        regions
    }

    fn build_table(&self, region: &[Vec<&TextCell>]) -> Option<Table> {
        let boundaries = self.column_boundaries(region);
        let num_cols = boundaries.len().saturating_sub(1);
        if num_cols < self.min_cols {
            return None;
        }

        let rows = region
            .iter()
            .map(|line| {
                let mut cols = vec![String::new(); num_cols];
                for cell in line {
                    let idx = column_index(cell, &boundaries).min(num_cols - 1);
                    let text = cell.text.trim();
                    if cols[idx].is_empty() {
                        cols[idx] = text.to_string();
                    } else {
                        cols[idx].push(' ');
                        cols[idx].push_str(text);
                    }
                }
                TableRow::from_positional(cols)
            })
            .collect();
        Some(rows)
    }

    fn column_boundaries(&self, region: &[Vec<&TextCell>]) -> Vec<f32> {
        let mut xs: Vec<f32> = region.iter().flatten().map(|c| c.x).collect();
        xs.sort_by(|a, b| cmp_f32(*a, *b));
        let Some(&first) = xs.first() else {
            return Vec::new();
        };

        let mut boundaries = vec![first];
        for &x in &xs[1..] {
            if boundaries.last().is_some_and(|&last| x - last > self.col_tolerance) {
                boundaries.push(x);
            }
        }
        if let Some(right) = region
            .iter()
            .flatten()
            .map(|c| c.right())
            .max_by(|a, b| cmp_f32(*a, *b))
        {
            boundaries.push(right);
        }
        boundaries
    }
}

fn column_index(cell: &TextCell, boundaries: &[f32]) -> usize {
    let cx = cell.center_x();
    boundaries
        .windows(2)
        .position(|w| cx >= w[0] && cx < w[1])
        .unwrap_or_else(|| boundaries.len().saturating_sub(2))
}

fn cmp_f32(a: f32, b: f32) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]], top: f32) -> Vec<TextCell> {
        let mut cells = Vec::new();
        for (r, row) in rows.iter().enumerate() {
            for (c, text) in row.iter().enumerate() {
                cells.push(TextCell::new(
                    *text,
                    72.0 + c as f32 * 120.0,
                    top + r as f32 * 14.0,
                    60.0,
                    10.0,
                ));
            }
        }
        cells
    }

    #[test]
    fn detects_simple_grid() {
        let cells = grid(
            &[&["Name", "Qty", "Price"], &["Apple", "3", "1.20"], &["Pear", "5", "0.80"]],
            100.0,
        );
        let tables = TableDetector::default().detect(&cells);
        assert_eq!(tables.len(), 1);
        let table = &tables[0];
        assert_eq!(table.len(), 3);
        assert_eq!(table[0].get("0"), Some("Name"));
        assert_eq!(table[1].get("2"), Some("1.20"));
        assert_eq!(table[2].labels().collect::<Vec<_>>(), vec!["0", "1", "2"]);
    }

    #[test]
    fn paragraph_text_is_not_a_table() {
        let cells = vec![
            TextCell::new("A single line of prose.", 72.0, 100.0, 400.0, 10.0),
            TextCell::new("Another line of prose.", 72.0, 114.0, 380.0, 10.0),
            TextCell::new("And a third.", 72.0, 128.0, 120.0, 10.0),
        ];
        assert!(TableDetector::default().detect(&cells).is_empty());
    }

    #[test]
    fn prose_splits_two_tables() {
        let mut cells = grid(&[&["a", "b"], &["c", "d"]], 100.0);
        cells.push(TextCell::new("Interlude paragraph", 72.0, 160.0, 300.0, 10.0));
        cells.extend(grid(&[&["e", "f", "g"], &["h", "i", "j"]], 200.0));
        let tables = TableDetector::default().detect(&cells);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0][1].get("1"), Some("d"));
        assert_eq!(tables[1][0].len(), 3);
    }

    #[test]
    fn missing_cell_leaves_empty_column() {
        let mut cells = grid(&[&["x", "y", "z"], &["1", "2", "3"]], 100.0);
        // Third line lacks the middle cell.
        cells.push(TextCell::new("4", 72.0, 128.0, 60.0, 10.0));
        cells.push(TextCell::new("6", 312.0, 128.0, 60.0, 10.0));
        let tables = TableDetector::default().detect(&cells);
        assert_eq!(tables.len(), 1);
        let last = &tables[0][2];
        assert_eq!(last.get("0"), Some("4"));
        assert_eq!(last.get("1"), Some(""));
        assert_eq!(last.get("2"), Some("6"));
    }
}
