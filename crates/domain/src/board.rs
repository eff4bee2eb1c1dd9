//! Board and cell value objects shared by both games.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Supported board sizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoardSize {
    /// 2x2
    Small,
    /// 3x3
    #[default]
    Classic,
    /// 4x4
    Large,
}

impl BoardSize {
    pub fn cells(self) -> usize {
        match self {
            BoardSize::Small => 4,
            BoardSize::Classic => 9,
            BoardSize::Large => 16,
        }
    }

    pub fn side(self) -> usize {
        match self {
            BoardSize::Small => 2,
            BoardSize::Classic => 3,
            BoardSize::Large => 4,
        }
    }

    pub fn from_len(len: usize) -> Result<Self, DomainError> {
        match len {
            4 => Ok(BoardSize::Small),
            9 => Ok(BoardSize::Classic),
            16 => Ok(BoardSize::Large),
            other => Err(DomainError::InvalidBoardSize(other)),
        }
    }
}

/// What a cell can hold: a strategy mark or a hidden memory number.
///
/// On the wire every symbol is a string (`"X"`, `"O"`, `"7"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Symbol {
    X,
    O,
    Number(u32),
}

impl Symbol {
    /// The other strategy mark. Numbers have no opponent.
    pub fn opponent(self) -> Option<Symbol> {
        match self {
            Symbol::X => Some(Symbol::O),
            Symbol::O => Some(Symbol::X),
            Symbol::Number(_) => None,
        }
    }

    pub fn as_number(self) -> Option<u32> {
        match self {
            Symbol::Number(n) => Some(n),
            _ => None,
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::X => f.write_str("X"),
            Symbol::O => f.write_str("O"),
            Symbol::Number(n) => write!(f, "{}", n),
        }
    }
}

impl FromStr for Symbol {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "X" | "x" => Ok(Symbol::X),
            "O" | "o" => Ok(Symbol::O),
            other => other
                .parse::<u32>()
                .map(Symbol::Number)
                .map_err(|_| DomainError::parse(format!("Unknown symbol: {}", other))),
        }
    }
}

impl TryFrom<String> for Symbol {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Symbol> for String {
    fn from(value: Symbol) -> Self {
        value.to_string()
    }
}

/// A single board cell. `position` is fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    position: usize,
    value: Option<Symbol>,
    revealed: bool,
}

impl Cell {
    pub fn empty(position: usize) -> Self {
        Self {
            position,
            value: None,
            revealed: false,
        }
    }

    pub fn from_parts(position: usize, value: Option<Symbol>, revealed: bool) -> Self {
        Self {
            position,
            value,
            revealed,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn value(&self) -> Option<Symbol> {
        self.value
    }

    pub fn is_revealed(&self) -> bool {
        self.revealed
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }
}

/// Ordered cells of one session. Length never changes after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    cells: Vec<Cell>,
}

impl Board {
    pub fn new(size: BoardSize) -> Self {
        Self {
            cells: (0..size.cells()).map(Cell::empty).collect(),
        }
    }

    /// Rebuild a board from cells in any order.
    ///
    /// Positions must be exactly `0..len` and the length a supported size.
    pub fn from_cells(mut cells: Vec<Cell>) -> Result<Self, DomainError> {
        BoardSize::from_len(cells.len())?;
        cells.sort_by_key(Cell::position);
        for (expected, cell) in cells.iter().enumerate() {
            if cell.position != expected {
                return Err(DomainError::position_out_of_range(
                    cell.position,
                    cells.len(),
                ));
            }
        }
        Ok(Self { cells })
    }

    pub fn size(&self) -> BoardSize {
        // Length is validated in every constructor
        BoardSize::from_len(self.cells.len()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn get(&self, position: usize) -> Option<&Cell> {
        self.cells.get(position)
    }

    pub fn value_at(&self, position: usize) -> Option<Symbol> {
        self.cells.get(position).and_then(Cell::value)
    }

    /// Positions without a value, in document order.
    pub fn free_positions(&self) -> Vec<usize> {
        self.cells
            .iter()
            .filter(|c| c.is_empty())
            .map(Cell::position)
            .collect()
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|c| !c.is_empty())
    }

    pub fn all_revealed(&self) -> bool {
        self.cells.iter().all(Cell::is_revealed)
    }

    /// Place a mark on an empty cell. Returns false if the cell is taken or missing.
    pub fn place(&mut self, position: usize, symbol: Symbol) -> bool {
        match self.cells.get_mut(position) {
            Some(cell) if cell.value.is_none() => {
                cell.value = Some(symbol);
                cell.revealed = true;
                true
            }
            _ => false,
        }
    }

    /// Reveal a hidden cell. Returns false if already revealed or missing.
    pub fn reveal(&mut self, position: usize) -> bool {
        match self.cells.get_mut(position) {
            Some(cell) if !cell.revealed => {
                cell.revealed = true;
                true
            }
            _ => false,
        }
    }

    pub fn hide_all(&mut self) {
        for cell in &mut self.cells {
            cell.revealed = false;
        }
    }

    /// Assign hidden values in position order.
    pub(crate) fn with_values(size: BoardSize, values: &[u32]) -> Self {
        Self {
            cells: (0..size.cells())
                .map(|position| Cell {
                    position,
                    value: values.get(position).copied().map(Symbol::Number),
                    revealed: false,
                })
                .collect(),
        }
    }
}

impl Default for Board {
    fn default() -> Self {
        Board::new(BoardSize::Classic)
    }
}
