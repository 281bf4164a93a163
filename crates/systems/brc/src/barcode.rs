//! Optical card scanner
//!
//! The sensor sits on the coprocessor's T0 input (high = bright/reflective,
//! low = dark). A card swiped past it produces a burst of edges, one per
//! half-bit, at a rate fixed by the swipe rather than by any processor
//! clock. We model the swipe as a shift register loaded the instant the
//! swipe starts and shifted by one half-bit on every scanner tick.
//!
//! # Encoding
//!
//! Each of the 9 barcode bits becomes two half-bits that always differ, so
//! the line toggles once per bit no matter what the data is:
//!
//! ```text
//! logical 1 -> bright, dark
//! logical 0 -> dark, bright
//! ```
//!
//! Bits are read most significant first (the `0` sync bit leads, the `1`
//! sync bit trails). One bright guard half-bit precedes the data so a
//! shift landing right after the swipe does not eat the first edge, and
//! one bright guard half-bit follows it:
//!
//! ```text
//! tick:   0     1..=18            19      20..
//!       guard  9 x (half, half)  guard   idle (bright)
//! ```
//!
//! A new swipe always replaces whatever is left of the previous one.

use emu_core::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};

use crate::card::CardCode;

/// Number of half-bits in one swipe, guards included
pub const SWIPE_HALF_BITS: u8 = 20;

/// Build the shift register image for one swipe.
///
/// Bit 0 is the first half-bit presented to the sensor; a set bit is dark.
pub fn encode(code: CardCode) -> u32 {
    let barcode = code.barcode();
    let mut stream = 0u32;

    // Least significant barcode bit first, so it ends up read last
    for bit in 0..9 {
        stream <<= 2;
        stream |= if (barcode >> bit) & 1 != 0 { 0b10 } else { 0b01 };
    }

    // Leading guard
    stream << 1
}

/// Sensor levels (true = bright) seen on each tick of a complete swipe
pub fn levels(code: CardCode) -> [bool; SWIPE_HALF_BITS as usize] {
    let stream = encode(code);
    let mut out = [true; SWIPE_HALF_BITS as usize];
    for (tick, level) in out.iter_mut().enumerate() {
        *level = (stream >> tick) & 1 == 0;
    }
    out
}

/// Recover a card code from the levels of a complete swipe.
///
/// Returns `None` when a half-bit pair fails to toggle or a sync bit is
/// wrong. Parity is left to the caller.
pub fn decode(levels: &[bool]) -> Option<CardCode> {
    if levels.len() < 19 {
        return None;
    }
    let mut barcode = 0u16;
    for pair in levels[1..19].chunks_exact(2) {
        if pair[0] == pair[1] {
            return None;
        }
        barcode = (barcode << 1) | u16::from(pair[0]);
    }
    CardCode::from_barcode(barcode)
}

/// Card scanner state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarcodeScanner {
    /// Remaining half-bits, current one in bit 0 (1 = dark)
    stream: u32,
    /// Ticks left before the swipe is over
    remaining: u8,
    /// Card of the swipe in progress (or the last one)
    card: Option<CardCode>,
}

impl BarcodeScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Start a swipe, discarding any swipe still in progress
    pub fn start_scan(&mut self, code: CardCode) {
        if self.remaining > 0 {
            log(LogCategory::Input, LogLevel::Debug, || {
                format!(
                    "Scanner: re-swipe {:02X} preempts {:02X} at half-bit {}",
                    code.value(),
                    self.card.map_or(0, CardCode::value),
                    self.position()
                )
            });
        } else {
            log(LogCategory::Input, LogLevel::Debug, || {
                format!("Scanner: swipe {:02X}", code.value())
            });
        }

        self.stream = encode(code);
        self.remaining = SWIPE_HALF_BITS;
        self.card = Some(code);
    }

    /// Advance by one half-bit
    pub fn tick(&mut self) {
        if self.remaining == 0 {
            return;
        }
        self.stream >>= 1;
        self.remaining -= 1;
    }

    /// Sensor level: true = bright (T0 high), false = dark
    pub fn sense(&self) -> bool {
        self.stream & 1 == 0
    }

    pub fn is_scanning(&self) -> bool {
        self.remaining > 0
    }

    /// Half-bits consumed since the swipe started
    pub fn position(&self) -> u8 {
        SWIPE_HALF_BITS - self.remaining
    }

    pub fn card(&self) -> Option<CardCode> {
        self.card
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::{Card, Rank, Suit};

    fn code(value: u8) -> CardCode {
        CardCode::new(value).unwrap()
    }

    fn sample(scanner: &mut BarcodeScanner, ticks: usize) -> Vec<bool> {
        let mut out = Vec::with_capacity(ticks);
        for _ in 0..ticks {
            out.push(scanner.sense());
            scanner.tick();
        }
        out
    }

    #[test]
    fn test_idle_scanner_reads_bright() {
        let mut scanner = BarcodeScanner::new();
        assert!(scanner.sense());
        scanner.tick();
        assert!(scanner.sense());
        assert!(!scanner.is_scanning());
    }

    #[test]
    fn test_code_zero_exact_pattern() {
        // Barcode 0 0000000 1: guard, eight zeros, the one, guard
        let mut expected = vec![true];
        for _ in 0..8 {
            expected.extend([false, true]);
        }
        expected.extend([true, false]);
        expected.push(true);

        let mut scanner = BarcodeScanner::new();
        scanner.start_scan(code(0x00));
        assert_eq!(sample(&mut scanner, 20), expected);

        // Exhausted: idle from now on
        assert!(!scanner.is_scanning());
        assert!(scanner.sense());
        scanner.tick();
        assert!(scanner.sense());
    }

    #[test]
    fn test_ace_of_spades_pattern() {
        let ace = Card::Suited(Suit::Spades, Rank::Ace).code().unwrap();
        // 0 0110111 1, msb first
        let bits = [0, 0, 1, 1, 0, 1, 1, 1, 1];
        let mut expected = vec![true];
        for bit in bits {
            if bit == 1 {
                expected.extend([true, false]);
            } else {
                expected.extend([false, true]);
            }
        }
        expected.push(true);

        assert_eq!(levels(ace).to_vec(), expected);
    }

    #[test]
    fn test_every_code_decodes_back() {
        for value in 0..=CardCode::MAX {
            let c = code(value);
            let mut scanner = BarcodeScanner::new();
            scanner.start_scan(c);
            let seen = sample(&mut scanner, SWIPE_HALF_BITS as usize);
            assert_eq!(seen, levels(c).to_vec());
            assert_eq!(decode(&seen), Some(c), "code {:02X}", value);
        }
    }

    #[test]
    fn test_data_half_bits_always_toggle() {
        for value in 0..=CardCode::MAX {
            let seen = levels(code(value));
            for pair in seen[1..19].chunks_exact(2) {
                assert_ne!(pair[0], pair[1]);
            }
        }
    }

    #[test]
    fn test_reswipe_discards_old_stream() {
        let first = code(0x37);
        let second = code(0x4A);

        let mut scanner = BarcodeScanner::new();
        scanner.start_scan(first);
        sample(&mut scanner, 7);
        assert_eq!(scanner.position(), 7);

        scanner.start_scan(second);
        assert_eq!(scanner.position(), 0);
        assert_eq!(scanner.card(), Some(second));

        // The whole remainder is the new card, with no trace of the old one
        let seen = sample(&mut scanner, 24);
        assert_eq!(&seen[..20], &levels(second)[..]);
        assert!(seen[20..].iter().all(|&bright| bright));
    }

    #[test]
    fn test_sense_is_stable_between_ticks() {
        let mut scanner = BarcodeScanner::new();
        scanner.start_scan(code(0x55));
        scanner.tick();
        let level = scanner.sense();
        for _ in 0..10 {
            assert_eq!(scanner.sense(), level);
        }
    }

    #[test]
    fn test_decode_rejects_broken_pairs() {
        let mut seen = levels(code(0x23)).to_vec();
        seen[4] = seen[3];
        assert_eq!(decode(&seen), None);
        assert_eq!(decode(&seen[..10]), None);
    }
}
