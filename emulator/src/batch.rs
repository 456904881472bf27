//! The batch driver: runs every job of a deck to completion, one at a time.
//!
//! Jobs are isolated by construction. Before each one the machine is
//! cleaned, the page table rebuilt at a fresh random base, and the program
//! cards loaded through the same demand-paged transfer path the running job
//! uses.

use tracing::{debug, info, warn};

use crate::io::{DataStream, RecordWriter};
use crate::parser::{Deck, Job};
use crate::runtime::{Fault, Machine, ProcessControlBlock, Report, RunError};

/// What one finished job looked like, for the operator log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    pub job_id: String,
    pub report: Report,
    pub cycles: usize,
    pub lines: usize,
}

pub struct Batch {
    machine: Machine,
}

impl Default for Batch {
    fn default() -> Self {
        Self::new()
    }
}

impl Batch {
    #[must_use]
    pub fn new() -> Self {
        Self {
            machine: Machine::new(),
        }
    }

    /// A batch whose frame allocator is deterministic, for reproducible runs
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            machine: Machine::with_seed(seed),
        }
    }

    /// Run the whole deck, writing job output and per-job diagnostics to the
    /// output device.
    ///
    /// # Errors
    ///
    /// Only device failures abort the batch; a job that dies on a fault is
    /// reported and the next one still runs.
    pub fn run<W: RecordWriter>(
        &mut self,
        deck: &Deck,
        output: &mut W,
    ) -> Result<Vec<JobSummary>, RunError> {
        deck.jobs
            .iter()
            .map(|job| self.run_job(job, output))
            .collect()
    }

    fn run_job<W: RecordWriter>(
        &mut self,
        job: &Job,
        output: &mut W,
    ) -> Result<JobSummary, RunError> {
        info!(job = %job.id, "starting job");
        self.machine.clean();
        self.machine.init_page_table()?;

        let mut pcb = ProcessControlBlock::new(&job.id, job.time_limit, job.line_limit);
        let mut input = DataStream::new(job.data.clone());

        let report = match self.load_program(job) {
            Ok(()) => self.machine.run(&mut pcb, &mut input, output)?,
            Err(fault) => {
                warn!(job = %job.id, %fault, "program load failed");
                Report::fault(fault)
            }
        };

        output.write_record(report.primary().to_string().as_bytes())?;
        if let Some(secondary) = report.secondary() {
            output.write_record(secondary.to_string().as_bytes())?;
        }
        output.write_record(b"")?;

        info!(
            job = %job.id,
            cycles = pcb.time_used(),
            lines = pcb.lines_used(),
            report = %report.primary(),
            "job complete"
        );
        Ok(JobSummary {
            job_id: job.id.clone(),
            report,
            cycles: pcb.time_used(),
            lines: pcb.lines_used(),
        })
    }

    fn load_program(&mut self, job: &Job) -> Result<(), Fault> {
        let mut address = 0;
        for card in &job.program {
            debug!(address, card = %card, "loading program card");
            address += self.machine.load_card(address, card)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::io::LinePrinter;
    use crate::runtime::Diagnostic;

    fn run_deck(source: &str) -> (Vec<JobSummary>, String) {
        let deck = Deck::parse(source).unwrap();
        let mut batch = Batch::with_seed(1);
        let mut output = LinePrinter::new(Vec::new());
        let summaries = batch.run(&deck, &mut output).unwrap();
        (summaries, String::from_utf8(output.into_inner()).unwrap())
    }

    #[test]
    fn echo_job_copies_its_data_card_to_the_output() {
        let (summaries, output) = run_deck(indoc! {"
            $AMJ000100100005
            GD10PD10H
            $DTA
            HELLO WORLD
            $END0001
        "});

        assert_eq!(
            output,
            format!("HELLO WORLD{}\nNo Error\n\n", "*".repeat(29))
        );
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].job_id, "0001");
        assert!(summaries[0].report.is_clean());
        assert_eq!(summaries[0].cycles, 3);
        assert_eq!(summaries[0].lines, 1);
    }

    #[test]
    fn a_faulting_job_does_not_poison_the_next_one() {
        let (summaries, output) = run_deck(indoc! {"
            $AMJ000200050001
            XX00
            $DTA
            $END0002

            $AMJ000300050001
            H
            $DTA
            $END0003
        "});

        assert_eq!(output, "Operation Code Error\n\nNo Error\n\n");
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].report.primary(), Diagnostic::OpcodeError);
        assert!(summaries[1].report.is_clean());
    }

    #[test]
    fn quota_exhaustion_is_reported_per_job() {
        let (summaries, output) = run_deck(indoc! {"
            $AMJ000400010001
            LR00LR00H
            $DTA
            $END0004
        "});

        assert_eq!(output, "Time Limit Exceeded\n\n");
        assert_eq!(summaries[0].report.primary(), Diagnostic::TimeLimitExceeded);
    }

    #[test]
    fn out_of_data_surfaces_when_the_deck_is_short() {
        let (summaries, output) = run_deck(indoc! {"
            $AMJ000500100002
            GD20GD30H
            $DTA
            ONLY ONE CARD
            $END0005
        "});

        assert_eq!(output, "Out of Data\n\n");
        assert_eq!(summaries[0].report.primary(), Diagnostic::OutOfData);
    }
}
