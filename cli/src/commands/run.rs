use std::fs::File;
use std::io::BufWriter;
use std::process::exit;

use camino::Utf8PathBuf;
use clap::{Parser, ValueHint};
use sbm_emulator::io::LinePrinter;
use sbm_emulator::{Batch, Deck};
use tracing::{debug, info};

#[derive(Parser, Debug)]
pub struct RunOpt {
    /// Input deck file
    #[clap(value_parser, value_hint = ValueHint::FilePath)]
    input: Utf8PathBuf,

    /// Write the job output to a file instead of standard output
    #[clap(short, long, value_hint = ValueHint::FilePath)]
    output: Option<Utf8PathBuf>,

    /// Seed the frame allocator for reproducible runs
    #[clap(long)]
    seed: Option<u64>,
}

impl RunOpt {
    pub fn exec(self) -> anyhow::Result<()> {
        info!(path = %self.input, "reading deck");
        let source = std::fs::read_to_string(&self.input)?;

        let deck = match Deck::parse(&source) {
            Ok(deck) => deck,
            Err(e) => {
                let report = miette::Report::new(e).with_source_code(source);
                eprintln!("{report:?}");
                exit(1);
            }
        };
        debug!(jobs = deck.jobs.len(), "deck parsed");

        let mut batch = match self.seed {
            Some(seed) => Batch::with_seed(seed),
            None => Batch::new(),
        };

        let summaries = match &self.output {
            Some(path) => {
                let file = BufWriter::new(File::create(path)?);
                let mut output = LinePrinter::new(file);
                batch.run(&deck, &mut output)?
            }
            None => {
                let stdout = std::io::stdout().lock();
                let mut output = LinePrinter::new(stdout);
                batch.run(&deck, &mut output)?
            }
        };

        for summary in &summaries {
            info!(
                job = %summary.job_id,
                cycles = summary.cycles,
                lines = summary.lines,
                report = %summary.report.primary(),
                "job finished"
            );
        }

        Ok(())
    }
}
