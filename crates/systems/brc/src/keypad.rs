//! Button matrix
//!
//! 8 columns by 4 rows. Columns are the coprocessor's P1 lines (shared with
//! the display grids); rows come back on P2 bits 4..=7 through inverters.
//!
//! ```text
//!  column:  A   B   C   D     E   F   G   H
//!  P1 bit:  7   6   5   4     3   2   1   0
//!         -------------------------------
//!  row 0 -  RE  SP  CL  EN    J   Q   K   A
//!  row 1 -  BR  PB  DB  SC    7   8   9  10
//!  row 2 -  DL  CV  VL  PL    3   4   5   6
//!  row 3 -  cl  di  he  sp   NT   P   1   2
//! ```
//!
//! SP is the speaker button. RE (reset) sits at column A row 0 on the
//! panel but is wired straight to both reset pins, not into the matrix.

use serde::{Deserialize, Serialize};

pub const COLUMNS: usize = 8;
pub const ROWS: usize = 4;

/// Buttons wired into the matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Ace,
    King,
    Queen,
    Jack,
    Ten,
    Nine,
    Eight,
    Seven,
    Six,
    Five,
    Four,
    Three,
    Two,
    One,
    /// P (pass/quit, depending on the model)
    P,
    /// NT (no trump)
    NoTrump,
    Enter,
    Score,
    Player,
    Clear,
    Double,
    Value,
    Speaker,
    PlayBack,
    Convention,
    Bridge,
    Dealer,
    Spades,
    Hearts,
    Diamonds,
    Clubs,
}

impl Key {
    /// (column, row) in the matrix; column = P1 bit
    pub const fn position(self) -> (u8, u8) {
        match self {
            Key::Ace => (0, 0),
            Key::Ten => (0, 1),
            Key::Six => (0, 2),
            Key::Two => (0, 3),
            Key::King => (1, 0),
            Key::Nine => (1, 1),
            Key::Five => (1, 2),
            Key::One => (1, 3),
            Key::Queen => (2, 0),
            Key::Eight => (2, 1),
            Key::Four => (2, 2),
            Key::P => (2, 3),
            Key::Jack => (3, 0),
            Key::Seven => (3, 1),
            Key::Three => (3, 2),
            Key::NoTrump => (3, 3),
            Key::Enter => (4, 0),
            Key::Score => (4, 1),
            Key::Player => (4, 2),
            Key::Spades => (4, 3),
            Key::Clear => (5, 0),
            Key::Double => (5, 1),
            Key::Value => (5, 2),
            Key::Hearts => (5, 3),
            Key::Speaker => (6, 0),
            Key::PlayBack => (6, 1),
            Key::Convention => (6, 2),
            Key::Diamonds => (6, 3),
            Key::Bridge => (7, 1),
            Key::Dealer => (7, 2),
            Key::Clubs => (7, 3),
        }
    }
}

/// Snapshot of which buttons are held, one row mask per column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keypad {
    /// Bit n set = row n held (active high)
    columns: [u8; COLUMNS],
}

impl Keypad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key(&mut self, key: Key, pressed: bool) {
        let (column, row) = key.position();
        let mask = 1 << row;
        if pressed {
            self.columns[column as usize] |= mask;
        } else {
            self.columns[column as usize] &= !mask;
        }
    }

    pub fn is_pressed(&self, key: Key) -> bool {
        let (column, row) = key.position();
        self.columns[column as usize] & (1 << row) != 0
    }

    /// Held rows of one column (active high, 4 bits)
    pub fn column(&self, column: usize) -> u8 {
        self.columns.get(column).copied().unwrap_or(0)
    }

    pub fn release_all(&mut self) {
        self.columns = [0; COLUMNS];
    }
}
