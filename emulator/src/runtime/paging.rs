//! Address translation and frame allocation.
//!
//! The page table is an ordinary region of memory: ten word slots anchored
//! by the page table base register. A slot holds either the filler sentinel
//! (unmapped) or an encoded single-digit frame number.

use rand::Rng;
use tracing::debug;

use crate::constants::{Address, ALLOC_ATTEMPTS, FRAME_COUNT, MEMORY_WORDS, PAGE_SIZE, PAGE_TABLE_WORDS};

use super::interrupt::Fault;
use super::memory::{MemoryError, Word};
use super::Machine;

impl Machine {
    /// Rebuild the page table for a new job: pick a fresh block-aligned base
    /// at random and mark every slot unmapped.
    ///
    /// # Errors
    ///
    /// Fails only if the base register points outside memory, which cannot
    /// happen for a base drawn from the frame pool.
    pub fn init_page_table(&mut self) -> Result<(), MemoryError> {
        let frame = self.rng.gen_range(0..FRAME_COUNT);
        self.registers.ptr = frame * PAGE_SIZE;
        debug!(ptr = self.registers.ptr, "page table rebuilt");
        for slot in self.registers.ptr..self.registers.ptr + PAGE_TABLE_WORDS {
            *self.memory.get_mut(slot)? = Word::FILLER;
        }
        Ok(())
    }

    /// Map a virtual address to a physical one through the page table.
    ///
    /// Pure with respect to the machine: reads the base register and the
    /// table, mutates nothing.
    ///
    /// # Errors
    ///
    /// An unmapped slot is a page fault; a slot index outside memory is an
    /// operand fault.
    pub(crate) fn translate(&self, address: Address) -> Result<Address, Fault> {
        let page = address / PAGE_SIZE;
        let slot = self.registers.ptr + page;
        let entry = self.memory.get(slot).map_err(|_| Fault::OperandError)?;
        let frame = entry.frame().ok_or(Fault::PageFault { page })?;
        Ok(frame * PAGE_SIZE + address % PAGE_SIZE)
    }

    /// Translate for an operand that does not demand-allocate: a page fault
    /// here is terminal and reads as a bad operand.
    pub(crate) fn translate_operand(&self, address: Address) -> Result<Address, Fault> {
        self.translate(address).map_err(Fault::demoted)
    }

    /// Translate, binding a fresh frame to the page on a miss.
    pub(crate) fn translate_demand(&mut self, address: Address) -> Result<Address, Fault> {
        match self.translate(address) {
            Err(Fault::PageFault { page }) => {
                self.allocate(page)?;
                self.translate(address)
            }
            result => result,
        }
    }

    /// Bind a random free-enough frame to a virtual page and record it in
    /// the page table.
    ///
    /// The collision check is deliberately shallow: a candidate is rejected
    /// if it is the table's own frame or the frame recorded in table slot 0,
    /// nothing else. Exhausting the attempt budget is a terminal page fault.
    pub(crate) fn allocate(&mut self, page: usize) -> Result<usize, Fault> {
        let table_frame = self.registers.ptr / PAGE_SIZE;
        let first_mapped = self
            .memory
            .get(self.registers.ptr)
            .ok()
            .and_then(Word::frame);

        for attempt in 0..ALLOC_ATTEMPTS {
            let frame = self.rng.gen_range(0..FRAME_COUNT);
            if frame == table_frame || Some(frame) == first_mapped {
                continue;
            }
            let slot = self.registers.ptr + page;
            *self.memory.get_mut(slot).map_err(|_| Fault::OperandError)? = Word::from_frame(frame);
            debug!(page, frame, attempt, "bound frame to page");
            return Ok(frame);
        }
        debug!(page, "no distinct frame found");
        Err(Fault::PageFault { page })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine_with_table(ptr: Address) -> Machine {
        let mut machine = Machine::with_seed(0x5bb);
        machine.registers.ptr = ptr;
        for slot in ptr..ptr + PAGE_TABLE_WORDS {
            *machine.memory.get_mut(slot).unwrap() = Word::FILLER;
        }
        machine
    }

    #[test]
    fn rebuilt_table_is_block_aligned_and_unmapped() {
        let mut machine = Machine::with_seed(7);
        machine.init_page_table().unwrap();

        let ptr = machine.registers.ptr;
        assert_eq!(ptr % PAGE_SIZE, 0);
        assert!(ptr < MEMORY_WORDS);
        for slot in ptr..ptr + PAGE_TABLE_WORDS {
            assert_eq!(machine.memory.get(slot).unwrap(), &Word::FILLER);
        }
    }

    #[test]
    fn translation_is_deterministic_within_a_page() {
        let mut machine = machine_with_table(90);
        *machine.memory.get_mut(90).unwrap() = Word::from_frame(3);

        for offset in 0..PAGE_SIZE {
            assert_eq!(machine.translate(offset), Ok(30 + offset));
            assert_eq!(machine.translate(offset), Ok(30 + offset));
        }
    }

    #[test]
    fn unmapped_pages_raise_page_faults() {
        let machine = machine_with_table(90);
        assert_eq!(machine.translate(25), Err(Fault::PageFault { page: 2 }));
        assert_eq!(machine.translate_operand(25), Err(Fault::OperandError));
    }

    #[test]
    fn out_of_table_slots_are_operand_faults() {
        let machine = machine_with_table(90);
        // page 10 would need table slot 100, one past the end of memory
        assert_eq!(machine.translate(100), Err(Fault::OperandError));
    }

    #[test]
    fn allocation_records_the_mapping() {
        let mut machine = machine_with_table(90);
        let frame = machine.allocate(4).unwrap();
        assert_eq!(machine.memory.get(94).unwrap().frame(), Some(frame));
        assert_eq!(machine.translate(42), Ok(frame * PAGE_SIZE + 2));
    }

    #[test]
    fn allocation_avoids_the_table_and_the_first_mapping() {
        let mut machine = machine_with_table(50);
        let first = machine.allocate(0).unwrap();
        assert_ne!(first, 5);

        for page in 1..PAGE_TABLE_WORDS {
            let frame = machine.allocate(page).unwrap();
            assert_ne!(frame, 5, "page {page} landed on the table frame");
            assert_ne!(frame, first, "page {page} collided with slot 0");
        }
    }

    #[test]
    fn demand_translation_allocates_once() {
        let mut machine = machine_with_table(90);
        let physical = machine.translate_demand(17).unwrap();
        // the mapping must now be stable
        assert_eq!(machine.translate(17), Ok(physical));
        assert_eq!(machine.translate_demand(17), Ok(physical));
    }
}
