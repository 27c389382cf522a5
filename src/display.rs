//! Human-readable matrix rendering.
//!
//! Values are aligned on their decimal point column by column:
//!
//! ```text
//! [[  1.0, -2.25],
//!  [ 10.0,   3.0]]
//! ```
//!
//! Matrices with [`ELIDE_AT`] or more rows (or columns) show only the first and
//! last [`EDGE`] of them, with `***` standing in for the rest.

use core::fmt;

use crate::matrix::Matrix;

/// Extent at which rows or columns are elided.
pub const ELIDE_AT: usize = 32;

/// Rows or columns kept on each side of an elision.
pub const EDGE: usize = 3;

const MARKER: &str = "***";

/// Indices shown along an axis of length `n`; `None` marks the elision.
fn visible(n: usize) -> Vec<Option<usize>> {
    if n < ELIDE_AT {
        (0..n).map(Some).collect()
    } else {
        (0..EDGE)
            .map(Some)
            .chain(core::iter::once(None))
            .chain((n - EDGE..n).map(Some))
            .collect()
    }
}

/// A value split at its decimal point.
struct Cell {
    whole: String,
    frac: String,
}

impl Cell {
    fn new(value: f64) -> Self {
        let text = format!("{value:?}");
        match text.find('.') {
            Some(dot) => Self {
                whole: text[..dot].to_owned(),
                frac: text[dot..].to_owned(),
            },
            None => Self {
                whole: text,
                frac: String::new(),
            },
        }
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = visible(self.rows());
        let cols = visible(self.cols());

        let cells: Vec<Vec<Option<Cell>>> = rows
            .iter()
            .map(|r| {
                cols.iter()
                    .map(|c| match (r, c) {
                        (Some(i), Some(j)) => Some(Cell::new(self[(*i, *j)])),
                        _ => None,
                    })
                    .collect()
            })
            .collect();

        let marker_row = rows.contains(&None);
        let mut whole_width: Vec<usize> = cols
            .iter()
            .map(|c| if c.is_none() || marker_row { MARKER.len() } else { 0 })
            .collect();
        let mut frac_width = vec![0; cols.len()];
        for row in &cells {
            for (j, cell) in row.iter().enumerate() {
                if let Some(cell) = cell {
                    whole_width[j] = whole_width[j].max(cell.whole.len());
                    frac_width[j] = frac_width[j].max(cell.frac.len());
                }
            }
        }

        f.write_str("[")?;
        for (i, row) in cells.iter().enumerate() {
            if i > 0 {
                f.write_str(",\n ")?;
            }
            f.write_str("[")?;
            for (j, cell) in row.iter().enumerate() {
                if j > 0 {
                    f.write_str(", ")?;
                }
                let (whole, frac) = cell
                    .as_ref()
                    .map_or((MARKER, ""), |c| (c.whole.as_str(), c.frac.as_str()));
                write!(
                    f,
                    "{whole:>ww$}{frac:<fw$}",
                    ww = whole_width[j],
                    fw = frac_width[j]
                )?;
            }
            f.write_str("]")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use crate::backend;
    use crate::matrix::Matrix;

    #[test]
    fn aligns_on_the_decimal_point() {
        backend::set_default_threads(1).unwrap();
        let m = Matrix::from_rows(vec![vec![1.0, -2.25], vec![10.0, 3.0]]).unwrap();
        assert_eq!(m.to_string(), "[[ 1.0, -2.25],\n [10.0,  3.0 ]]");
    }

    #[test]
    fn elides_large_matrices() {
        backend::set_default_threads(1).unwrap();
        let mut m = Matrix::new(40, 2).unwrap();
        m.fill_ascending();
        let text = m.to_string();
        assert_eq!(text.lines().count(), 7);
        assert!(text.lines().nth(3).unwrap().contains("***"));
        assert!(text.ends_with("79.0]]"));

        let wide = Matrix::new(1, 32).unwrap();
        let text = wide.to_string();
        assert_eq!(text.matches("0.0").count(), 6);
        assert!(text.contains("***"));
    }
}
