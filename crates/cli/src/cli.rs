use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sourcefinder", version, about = "Find sources on any topic from the terminal")]
pub struct Cli {
    /// Run a single search for this topic and exit
    #[arg(short, long)]
    pub topic: Option<String>,

    /// Check each source link and show whether it is reachable
    #[arg(long)]
    pub probe: bool,

    /// With --probe, also check whether the link serves a PDF
    #[arg(long, requires = "probe")]
    pub pdf: bool,

    /// Path to config file (overrides default search)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Log filter for the requested verbosity
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}
