mod completion;
mod print;
mod run;

#[derive(clap::Subcommand)]
pub enum Subcommand {
    /// Parse a deck and run its jobs
    Run(self::run::RunOpt),

    /// Show a deck as parsed, without running it
    Print(self::print::PrintOpt),

    /// Generate shell completions
    Completion(self::completion::CompletionOpt),
}

impl Subcommand {
    /// Run a subcommand
    pub fn exec(self) -> anyhow::Result<()> {
        match self {
            Subcommand::Run(opt) => opt.exec(),
            Subcommand::Print(opt) => opt.exec(),
            Subcommand::Completion(opt) => opt.exec(),
        }
    }
}
