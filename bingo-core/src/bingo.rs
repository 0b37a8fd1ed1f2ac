//! Bingo line detection
//!
//! Detection is a full recomputation over the approved cells, diffed against
//! the lines already awarded. No incremental state is kept.

use crate::types::Coordinate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;

/// A row, column, or diagonal of the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LineId {
    /// Row `y`
    Row(u8),
    /// Column `x`
    Col(u8),
    /// Cells (i, i)
    DiagMain,
    /// Cells (i, N-1-i)
    DiagAnti,
}

impl LineId {
    /// Every line of an `n` x `n` grid
    pub fn all(n: u8) -> impl Iterator<Item = LineId> {
        (0..n)
            .map(LineId::Row)
            .chain((0..n).map(LineId::Col))
            .chain([LineId::DiagMain, LineId::DiagAnti])
    }

    /// The `n` cells making up this line
    pub fn cells(&self, n: u8) -> Vec<Coordinate> {
        match *self {
            LineId::Row(y) => (0..n).map(|x| Coordinate::new(x, y)).collect(),
            LineId::Col(x) => (0..n).map(|y| Coordinate::new(x, y)).collect(),
            LineId::DiagMain => (0..n).map(|i| Coordinate::new(i, i)).collect(),
            LineId::DiagAnti => (0..n).map(|i| Coordinate::new(i, n - 1 - i)).collect(),
        }
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineId::Row(y) => write!(f, "row_{}", y),
            LineId::Col(x) => write!(f, "col_{}", x),
            LineId::DiagMain => f.write_str("diag_main"),
            LineId::DiagAnti => f.write_str("diag_anti"),
        }
    }
}

/// Lines fully covered by `approved`
pub fn complete_lines(n: u8, approved: &HashSet<Coordinate>) -> BTreeSet<LineId> {
    LineId::all(n)
        .filter(|line| line.cells(n).iter().all(|c| approved.contains(c)))
        .collect()
}

/// Lines complete in `approved` that are not yet in `already_awarded`
pub fn detect_new_lines(
    n: u8,
    approved: &HashSet<Coordinate>,
    already_awarded: &BTreeSet<LineId>,
) -> BTreeSet<LineId> {
    complete_lines(n, approved)
        .into_iter()
        .filter(|line| !already_awarded.contains(line))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(list: &[(u8, u8)]) -> HashSet<Coordinate> {
        list.iter().map(|&(x, y)| Coordinate::new(x, y)).collect()
    }

    #[test]
    fn test_line_ids_display_distinct() {
        let names: HashSet<String> = LineId::all(3).map(|l| l.to_string()).collect();
        assert_eq!(names.len(), 8);
        assert_eq!(LineId::Row(2).to_string(), "row_2");
        assert_eq!(LineId::DiagAnti.to_string(), "diag_anti");
    }

    #[test]
    fn test_anti_diagonal_cells() {
        let anti = LineId::DiagAnti.cells(3);
        assert_eq!(
            anti,
            vec![Coordinate::new(0, 2), Coordinate::new(1, 1), Coordinate::new(2, 0)]
        );
    }

    #[test]
    fn test_row_complete() {
        let approved = cells(&[(0, 2), (1, 2), (2, 2), (3, 2), (4, 2)]);
        let lines = detect_new_lines(5, &approved, &BTreeSet::new());
        assert_eq!(lines, BTreeSet::from([LineId::Row(2)]));
    }

    #[test]
    fn test_incomplete_row() {
        let approved = cells(&[(0, 2), (1, 2), (2, 2), (3, 2)]);
        assert!(detect_new_lines(5, &approved, &BTreeSet::new()).is_empty());
    }

    #[test]
    fn test_already_awarded_filtered() {
        let approved = cells(&[(0, 0), (1, 0), (2, 0), (0, 1), (0, 2)]);
        let awarded = BTreeSet::from([LineId::Row(0)]);
        let lines = detect_new_lines(3, &approved, &awarded);
        assert_eq!(lines, BTreeSet::from([LineId::Col(0)]));
    }

    #[test]
    fn test_full_board_completes_every_line() {
        let approved = cells(&[
            (0, 0),
            (2, 0),
            (1, 1),
            (0, 2),
            (2, 2),
            (0, 1),
            (2, 1),
            (1, 0),
            (1, 2),
        ]);
        let lines = detect_new_lines(3, &approved, &BTreeSet::new());
        assert_eq!(lines.len(), 8);
    }

    #[test]
    fn test_diagonals() {
        let approved = cells(&[(0, 0), (1, 1), (2, 2), (0, 2), (2, 0)]);
        let lines = detect_new_lines(3, &approved, &BTreeSet::new());
        assert_eq!(lines, BTreeSet::from([LineId::DiagMain, LineId::DiagAnti]));
    }
}
