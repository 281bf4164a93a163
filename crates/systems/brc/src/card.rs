//! Playing cards and their printed barcodes
//!
//! Every card of the deck carries a 9-bit barcode near one edge of its
//! face. The outermost bits are sync bits shared by all cards, which leaves
//! a 7-bit payload:
//!
//! ```text
//!  bit:   8    7 6 5 4 3 2 1    0
//!        [0] [  payload (7)  ] [1]
//! ```
//!
//! The payload packs two suit bits, four value bits and one parity bit.
//! Cards are printed so that every payload has **odd weight**: the parity
//! bit (payload bit 6) is the complement of the XOR of payload bits 0..=5.
//! That way a card swiped backwards reads as garbage instead of another
//! valid card. The scanner does not check parity; that is the game
//! program's business. The table below reproduces the printed codes as-is.
//!
//! Red and blue decks carry the same set of barcodes.

use serde::{Deserialize, Serialize};

/// Seven-bit card payload (0..=127)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct CardCode(u8);

impl CardCode {
    /// Highest payload value
    pub const MAX: u8 = 0x7F;

    /// Create a card code, rejecting values wider than 7 bits
    pub const fn new(code: u8) -> Option<Self> {
        if code <= Self::MAX {
            Some(Self(code))
        } else {
            None
        }
    }

    /// Create a card code from the low 7 bits of `code`
    pub const fn truncate(code: u8) -> Self {
        Self(code & Self::MAX)
    }

    pub const fn value(self) -> u8 {
        self.0
    }

    /// Full 9-bit barcode including both sync bits
    pub const fn barcode(self) -> u16 {
        ((self.0 as u16) << 1) | 1
    }

    /// Recover the payload from a 9-bit barcode, if both sync bits match
    pub const fn from_barcode(barcode: u16) -> Option<Self> {
        if barcode & 0x101 == 0x001 {
            Some(Self(((barcode >> 1) & 0x7F) as u8))
        } else {
            None
        }
    }

    /// The parity bit as printed (payload bit 6)
    pub const fn parity_bit(self) -> bool {
        self.0 & 0x40 != 0
    }

    /// Whether the payload follows the odd-parity convention
    pub const fn has_valid_parity(self) -> bool {
        self.0.count_ones() % 2 == 1
    }

    /// Look up the card printed with this code, if any
    pub fn card(self) -> Option<Card> {
        DECK.iter()
            .find(|(_, code)| *code == self.0)
            .map(|(card, _)| *card)
    }
}

impl TryFrom<u8> for CardCode {
    type Error = crate::BrcError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        CardCode::new(code).ok_or(crate::BrcError::InvalidCardCode(code))
    }
}

impl From<CardCode> for u8 {
    fn from(code: CardCode) -> u8 {
        code.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Suit {
    Spades,
    Hearts,
    Clubs,
    Diamonds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rank {
    Ace,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    Jack,
    Queen,
    King,
}

impl Rank {
    pub const ALL: [Rank; 13] = [
        Rank::Ace,
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
    ];
}

/// One physical card of the deck
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Card {
    Suited(Suit, Rank),
    /// Jokers are numbered 1 and 2
    Joker(u8),
}

impl Card {
    /// Barcode payload printed on this card
    pub fn code(self) -> Option<CardCode> {
        DECK.iter()
            .find(|(card, _)| *card == self)
            .map(|(_, code)| CardCode(*code))
    }
}

macro_rules! suit_row {
    ($suit:expr, [$($code:expr),* $(,)?]) => {{
        let codes = [$($code),*];
        let mut row = [(Card::Joker(0), 0u8); 13];
        let mut i = 0;
        while i < 13 {
            row[i] = (Card::Suited($suit, Rank::ALL[i]), codes[i]);
            i += 1;
        }
        row
    }};
}

const SPADES: [(Card, u8); 13] = suit_row!(
    Suit::Spades,
    [0x37, 0x23, 0x6B, 0x13, 0x5B, 0x3B, 0x73, 0x07, 0x4F, 0x2F, 0x67, 0x1F, 0x57]
);
const HEARTS: [(Card, u8); 13] = suit_row!(
    Suit::Hearts,
    [0x3D, 0x29, 0x61, 0x19, 0x51, 0x31, 0x79, 0x0D, 0x45, 0x25, 0x6D, 0x15, 0x5D]
);
const CLUBS: [(Card, u8); 13] = suit_row!(
    Suit::Clubs,
    [0x34, 0x4A, 0x68, 0x49, 0x58, 0x38, 0x70, 0x43, 0x4C, 0x2C, 0x64, 0x1C, 0x54]
);
const DIAMONDS: [(Card, u8); 13] = suit_row!(
    Suit::Diamonds,
    [0x3E, 0x2A, 0x62, 0x1A, 0x52, 0x32, 0x7A, 0x0E, 0x46, 0x26, 0x6E, 0x16, 0x5E]
);

/// Complete deck: 52 suited cards followed by the two jokers
pub static DECK: [(Card, u8); 54] = {
    let mut deck = [(Card::Joker(0), 0u8); 54];
    let mut i = 0;
    while i < 13 {
        deck[i] = SPADES[i];
        deck[13 + i] = HEARTS[i];
        deck[26 + i] = CLUBS[i];
        deck[39 + i] = DIAMONDS[i];
        i += 1;
    }
    deck[52] = (Card::Joker(1), 0x7C);
    deck[53] = (Card::Joker(2), 0x76);
    deck
};
