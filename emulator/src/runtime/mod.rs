//! The machine itself: registers, memory, and the fetch-decode-execute
//! loop that drives one job to completion.
//!
//! Faults and service requests travel as values up the call chain; the end
//! of every cycle resolves them in a fixed precedence order: program fault
//! first, quota second, and only then the actual transfer.

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{debug, info};

use crate::constants::{Address, PAGE_SIZE, TRANSFER_LADDER, WORD_CELLS};
use crate::io::{DataReader, RecordWriter};

mod instructions;
mod interrupt;
mod memory;
mod paging;
mod pcb;
mod registers;

pub use self::interrupt::{Diagnostic, Fault, Report};
pub use self::memory::{Memory, MemoryError, Word};
pub use self::pcb::ProcessControlBlock;
pub use self::registers::Registers;

use self::instructions::Instruction;
use self::interrupt::Service;

/// Failures outside the machine model: the job diagnostics never surface
/// here, only real device and integrity errors.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("output device error: {0}")]
    Output(#[from] std::io::Error),

    #[error("machine integrity error: {0}")]
    Memory(#[from] MemoryError),
}

// Memory overruns inside the paged paths read as bad operands
impl From<MemoryError> for Fault {
    fn from(_: MemoryError) -> Self {
        Fault::OperandError
    }
}

/// Why a cycle ended before its service could be considered
enum Abort {
    Fault(Fault),
    LineLimit,
}

impl From<Fault> for Abort {
    fn from(fault: Fault) -> Self {
        Abort::Fault(fault)
    }
}

impl From<MemoryError> for Abort {
    fn from(error: MemoryError) -> Self {
        Abort::Fault(error.into())
    }
}

/// Round a byte length up the transfer ladder, in words.
fn block_words(bytes: usize) -> Option<usize> {
    TRANSFER_LADDER
        .into_iter()
        .find(|&words| bytes <= words * WORD_CELLS)
}

pub struct Machine {
    pub registers: Registers,
    pub memory: Memory,
    rng: StdRng,
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Machine {{ registers: {:?}, memory: [...] }}", self.registers)
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            registers: Registers::default(),
            memory: Memory::default(),
            rng: StdRng::from_entropy(),
        }
    }

    /// A machine with a deterministic frame allocator, for reproducible runs
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            registers: Registers::default(),
            memory: Memory::default(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Make the machine ready for a new job: registers to defaults, memory
    /// to the zero sentinel.
    pub fn clean(&mut self) {
        self.registers.reset();
        self.memory.clear();
    }

    /// Load one program card at a logical address through the regular
    /// demand-paged transfer path, returning the number of words consumed.
    ///
    /// # Errors
    ///
    /// Load-time faults (frame pool exhaustion, oversized cards) surface as
    /// the same faults the running job would see.
    #[tracing::instrument(skip(self, card), level = "debug")]
    pub fn load_card(&mut self, address: Address, card: &str) -> Result<usize, Fault> {
        let words = block_words(card.len()).ok_or(Fault::OperandError)?;
        self.read_transfer(address, card)?;
        Ok(words)
    }

    /// Drive one job to completion and produce its report.
    ///
    /// # Errors
    ///
    /// Only device failures escape; every machine-level outcome, faults
    /// included, lands in the returned [`Report`].
    #[tracing::instrument(skip_all, fields(job = %pcb.job_id()))]
    pub fn run<I, O>(
        &mut self,
        pcb: &mut ProcessControlBlock,
        input: &mut I,
        output: &mut O,
    ) -> Result<Report, RunError>
    where
        I: DataReader,
        O: RecordWriter,
    {
        loop {
            if let Some(report) = self.step(pcb, input, output)? {
                info!(
                    cycles = pcb.time_used(),
                    lines = pcb.lines_used(),
                    report = %report.primary(),
                    "job terminated"
                );
                return Ok(report);
            }
        }
    }

    /// One full cycle. `Some(report)` means the job is over.
    fn step<I, O>(
        &mut self,
        pcb: &mut ProcessControlBlock,
        input: &mut I,
        output: &mut O,
    ) -> Result<Option<Report>, RunError>
    where
        I: DataReader,
        O: RecordWriter,
    {
        let outcome = self.execute_cycle(pcb);
        pcb.tick();
        let time_up = pcb.time_exceeded();

        match (outcome, time_up) {
            // fault precedence: report it, compounded when the quota fell in
            // the same cycle
            (Err(Abort::Fault(fault)), true) => Ok(Some(Report::compound(
                Diagnostic::TimeLimitExceeded,
                fault.diagnostic(),
            ))),
            (Err(Abort::Fault(fault)), false) => Ok(Some(Report::fault(fault))),

            (Err(Abort::LineLimit), _) => {
                Ok(Some(Report::terminal(Diagnostic::LineLimitExceeded)))
            }

            (Ok(None), false) => Ok(None),
            (Ok(None), true) => Ok(Some(Report::terminal(Diagnostic::TimeLimitExceeded))),

            // quota exhausted with a service pending: reads are aborted,
            // writes still flush, halts end the job; one code for all three
            (Ok(Some(service)), true) => {
                if let Service::Write { target } = service {
                    match self.collect_record(target) {
                        Ok(record) => output.write_record(&record)?,
                        Err(fault) => debug!(%fault, "record dropped at quota"),
                    }
                }
                Ok(Some(Report::terminal(Diagnostic::TimeLimitExceeded)))
            }

            (Ok(Some(service)), false) => self.dispatch(service, input, output),
        }
    }

    /// Fetch, decode and execute one instruction. Service operations are
    /// returned as pending rather than performed.
    fn execute_cycle(&mut self, pcb: &mut ProcessControlBlock) -> Result<Option<Service>, Abort> {
        let physical = self.translate(self.registers.ic)?;
        self.registers.ir = *self.memory.get(physical)?;
        self.registers.ic += 1;

        let instruction = Instruction::decode(&self.registers.ir)?;
        debug!(ic = self.registers.ic - 1, %instruction, "executing");

        match instruction {
            Instruction::GetData(target) => Ok(Some(Service::Read { target })),

            Instruction::PutData(target) => {
                pcb.record_line();
                if pcb.lines_exceeded() {
                    Err(Abort::LineLimit)
                } else {
                    Ok(Some(Service::Write { target }))
                }
            }

            Instruction::LoadRegister(address) => {
                let physical = self.translate_operand(address)?;
                self.registers.r = *self.memory.get(physical)?;
                Ok(None)
            }

            Instruction::StoreRegister(address) => {
                let physical = self.translate_demand(address)?;
                *self.memory.get_mut(physical)? = self.registers.r;
                Ok(None)
            }

            Instruction::CompareRegister(address) => {
                let physical = self.translate_operand(address)?;
                self.registers.toggle = self.memory.get(physical)? == &self.registers.r;
                Ok(None)
            }

            Instruction::BranchOnTrue(target) => {
                if self.registers.toggle {
                    self.registers.ic = target;
                }
                Ok(None)
            }

            Instruction::Halt => Ok(Some(Service::Halt)),
        }
    }

    /// Resolve a pending service once faults and quotas are out of the way.
    fn dispatch<I, O>(
        &mut self,
        service: Service,
        input: &mut I,
        output: &mut O,
    ) -> Result<Option<Report>, RunError>
    where
        I: DataReader,
        O: RecordWriter,
    {
        match service {
            Service::Read { target } => {
                let Some(data) = input.read_data() else {
                    return Ok(Some(Report::terminal(Diagnostic::OutOfData)));
                };
                match self.read_transfer(target, &data) {
                    Ok(()) => Ok(None),
                    Err(fault) => Ok(Some(Report::fault(fault))),
                }
            }

            Service::Write { target } => match self.collect_record(target) {
                Ok(record) => {
                    output.write_record(&record)?;
                    Ok(None)
                }
                Err(fault) => Ok(Some(Report::fault(fault))),
            },

            Service::Halt => Ok(Some(Report::clean())),
        }
    }

    /// Copy one card into memory, word by word, demand-allocating every
    /// page the transfer touches. Words past the payload get the filler
    /// sentinel.
    pub(crate) fn read_transfer(&mut self, target: Address, data: &str) -> Result<(), Fault> {
        let words = block_words(data.len()).ok_or(Fault::OperandError)?;
        debug!(address = target, bytes = data.len(), words, "read transfer");

        let mut chunks = data.as_bytes().chunks(WORD_CELLS);
        let mut physical = self.translate_demand(target)?;
        for index in 0..words {
            if index > 0 && index % PAGE_SIZE == 0 {
                // next sub-block: bind its page so the address resolves
                physical = self.translate_demand(target + index)?;
            }
            let word = chunks.next().map(Word::from_cells).unwrap_or(Word::FILLER);
            *self.memory.get_mut(physical)? = word;
            physical += 1;
        }
        Ok(())
    }

    /// Concatenate one block starting at the translated target into a
    /// record of symbol cells.
    fn collect_record(&self, target: Address) -> Result<Vec<u8>, Fault> {
        let start = self.translate_operand(target)?;
        let mut record = Vec::with_capacity(PAGE_SIZE * WORD_CELLS);
        for offset in 0..PAGE_SIZE {
            let word = self.memory.get(start + offset)?;
            record.extend_from_slice(word.cells());
        }
        Ok(record)
    }
}
