use std::process::exit;

use camino::Utf8PathBuf;
use clap::{Parser, ValueHint};
use sbm_emulator::Deck;
use tracing::info;

#[derive(Parser, Debug)]
pub struct PrintOpt {
    /// Input deck file
    #[clap(value_parser, value_hint = ValueHint::FilePath)]
    input: Utf8PathBuf,
}

impl PrintOpt {
    pub fn exec(&self) -> anyhow::Result<()> {
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

        print!("{deck}");
        Ok(())
    }
}
