use thiserror::Error;

use crate::constants::{Address, MEMORY_WORDS, WORD_CELLS};

/// One machine word: exactly [`WORD_CELLS`] symbol cells.
///
/// A freshly cleared word holds NUL in every cell; the filler word holds `*`
/// in every cell and doubles as the "unmapped" sentinel in the page table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Word(pub(crate) [u8; WORD_CELLS]);

impl Word {
    pub const ZERO: Word = Word([0; WORD_CELLS]);
    pub const FILLER: Word = Word([b'*'; WORD_CELLS]);

    /// Build a word from up to [`WORD_CELLS`] bytes, filler-padded on the
    /// right when the chunk runs short.
    pub fn from_cells(chunk: &[u8]) -> Word {
        let mut cells = [b'*'; WORD_CELLS];
        for (cell, byte) in cells.iter_mut().zip(chunk) {
            *cell = *byte;
        }
        Word(cells)
    }

    /// Encode a single-digit frame number as a page table entry
    pub(crate) fn from_frame(frame: usize) -> Word {
        debug_assert!(frame < 10);
        let mut cells = [0; WORD_CELLS];
        cells[0] = b'0' + u8::try_from(frame).unwrap_or(0);
        Word(cells)
    }

    /// Decode a page table entry. Anything that is not an encoded frame
    /// number (the filler sentinel included) reads as unmapped.
    pub(crate) fn frame(&self) -> Option<usize> {
        let Word([digit, rest @ ..]) = self;
        if digit.is_ascii_digit() && rest.iter().all(|&cell| cell == 0) {
            Some(usize::from(digit - b'0'))
        } else {
            None
        }
    }

    pub fn cells(&self) -> &[u8; WORD_CELLS] {
        &self.0
    }
}

impl std::fmt::Display for Word {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &cell in &self.0 {
            let rendered = if cell == 0 { '*' } else { char::from(cell) };
            write!(f, "{rendered}")?;
        }
        Ok(())
    }
}

/// Represents errors related to memory manipulations
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    /// The given address was outside the memory
    #[error("invalid address {0}")]
    InvalidAddress(Address),
}

/// Holds the memory words of the machine.
///
/// It has [`MEMORY_WORDS`] words, all cleared between jobs.
pub struct Memory {
    inner: Box<[Word; MEMORY_WORDS]>,
}

impl Default for Memory {
    fn default() -> Self {
        Self {
            inner: Box::new([Word::ZERO; MEMORY_WORDS]),
        }
    }
}

impl Memory {
    /// Get the word at an address
    ///
    /// # Errors
    ///
    /// It fails if the address is out of bounds.
    pub fn get(&self, address: Address) -> Result<&Word, MemoryError> {
        self.inner
            .get(address)
            .ok_or(MemoryError::InvalidAddress(address))
    }

    /// Get a mutable reference to the word at an address
    ///
    /// # Errors
    ///
    /// It fails if the address is out of bounds.
    pub fn get_mut(&mut self, address: Address) -> Result<&mut Word, MemoryError> {
        self.inner
            .get_mut(address)
            .ok_or(MemoryError::InvalidAddress(address))
    }

    /// Reset every word to the zero sentinel
    pub fn clear(&mut self) {
        self.inner.fill(Word::ZERO);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_from_short_chunk_pads_with_filler() {
        assert_eq!(Word::from_cells(b"H"), Word(*b"H***"));
        assert_eq!(Word::from_cells(b""), Word::FILLER);
        assert_eq!(Word::from_cells(b"ABCD"), Word(*b"ABCD"));
    }

    #[test]
    fn frame_entries_round_trip() {
        for frame in 0..10 {
            assert_eq!(Word::from_frame(frame).frame(), Some(frame));
        }
        assert_eq!(Word::FILLER.frame(), None);
        assert_eq!(Word::ZERO.frame(), None);
        assert_eq!(Word(*b"12**").frame(), None);
    }

    #[test]
    fn display_renders_nul_cells_as_placeholder() {
        assert_eq!(Word(*b"AB\0D").to_string(), "AB*D");
        assert_eq!(Word::ZERO.to_string(), "****");
    }

    #[test]
    fn out_of_bounds_access_is_an_error() {
        let mut memory = Memory::default();
        assert!(memory.get(MEMORY_WORDS - 1).is_ok());
        assert_eq!(
            memory.get(MEMORY_WORDS),
            Err(MemoryError::InvalidAddress(MEMORY_WORDS))
        );
        assert!(memory.get_mut(MEMORY_WORDS).is_err());
    }

    #[test]
    fn clear_resets_every_word() {
        let mut memory = Memory::default();
        *memory.get_mut(42).unwrap() = Word(*b"DATA");
        memory.clear();
        assert_eq!(memory.get(42).unwrap(), &Word::ZERO);
    }
}
