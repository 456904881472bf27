use crate::constants::Address;

use super::memory::Word;

/// The machine registers.
///
/// Everything here is reset between jobs; the page table base is only
/// meaningful after the table has been rebuilt for the next job.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Registers {
    /// General purpose register
    pub r: Word,

    /// Instruction register, holds the word fetched last
    pub ir: Word,

    /// Comparison toggle, set by `CR` and consumed by `BT`
    pub toggle: bool,

    /// Instruction counter
    pub ic: Address,

    /// Page table base register
    pub ptr: Address,
}

impl Registers {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl std::fmt::Display for Registers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "r = {} | ir = {} | toggle = {} | ic = {} | ptr = {}",
            self.r, self.ir, self.toggle, self.ic, self.ptr
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_restores_defaults() {
        let mut registers = Registers {
            r: Word(*b"ABCD"),
            ir: Word(*b"LR05"),
            toggle: true,
            ic: 7,
            ptr: 30,
        };
        registers.reset();
        assert_eq!(registers, Registers::default());
    }
}
