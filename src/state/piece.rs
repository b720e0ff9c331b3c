/// Cell coordinate on a puzzle grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    /// Zero-based row (the `y` axis on the wire).
    pub row: usize,
    /// Zero-based column (the `x` axis on the wire).
    pub col: usize,
}

impl Position {
    /// Build a position from its row and column.
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Row-major index of this position in a grid with `cols` columns.
    pub fn index(self, cols: usize) -> usize {
        self.row * cols + self.col
    }

    /// Inverse of [`Position::index`].
    pub fn from_index(index: usize, cols: usize) -> Self {
        Self {
            row: index / cols,
            col: index % cols,
        }
    }
}

/// A single puzzle piece and where it currently sits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Piece {
    /// Stable identifier, `row * cols + col` of the destination cell.
    pub id: usize,
    /// Cell the piece belongs to once solved.
    pub dest: Position,
    /// Cell the piece occupies right now.
    pub current: Position,
    /// User currently holding the piece, if any.
    pub held_by: Option<String>,
    /// Opaque asset reference produced by the image slicer.
    pub asset: String,
}

impl Piece {
    /// A piece is correct when it sits on its destination cell.
    pub fn is_correct(&self) -> bool {
        self.current == self.dest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_round_trips_through_row_major_layout() {
        let pos = Position::new(2, 3);
        assert_eq!(pos.index(4), 11);
        assert_eq!(Position::from_index(11, 4), pos);
    }

    #[test]
    fn piece_is_correct_only_on_destination() {
        let mut piece = Piece {
            id: 0,
            dest: Position::new(0, 0),
            current: Position::new(0, 0),
            held_by: None,
            asset: "a.png".into(),
        };
        assert!(piece.is_correct());
        piece.current = Position::new(1, 0);
        assert!(!piece.is_correct());
    }
}
