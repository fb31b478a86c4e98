use std::path::PathBuf;

use bitcoin::Network;
use clap::Parser;

use crate::source::Source;

/// Verify that a mining pool's work templates pay the coinbase
/// reward to the addresses you expect.
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// Log files to scan for mining.notify lines (repeatable).
    #[arg(long = "file")]
    pub files: Vec<PathBuf>,

    /// Miners as HOST[:PORT] whose websocket log (`/api/ws`) is read
    /// (repeatable or comma separated; the port defaults to 80).
    #[arg(long = "miner", env = "POOLCHECK_MINER", value_delimiter = ',')]
    pub miners: Vec<String>,

    /// Stratum pool endpoints as HOST:PORT (repeatable or comma separated).
    #[arg(long = "stratum", env = "POOLCHECK_STRATUM", value_delimiter = ',')]
    pub stratum: Vec<String>,

    /// Worker name for mining.authorize on Stratum endpoints.
    /// If omitted, only mining.subscribe is sent.
    #[arg(long, env = "POOLCHECK_WORKER")]
    pub worker: Option<String>,

    /// Worker password for mining.authorize.
    #[arg(long, env = "POOLCHECK_PASSWORD", default_value = "x")]
    pub password: String,

    /// Addresses that are expected to receive the coinbase reward.
    #[arg(long, env = "POOLCHECK_EXPECTED", value_delimiter = ',')]
    pub expected: Vec<String>,

    /// Number of mining.notify messages to inspect per source (0 means 1).
    #[arg(long, default_value = "0")]
    pub count: usize,

    /// Network used to encode payout addresses.
    #[arg(long, env = "POOLCHECK_NETWORK", default_value = "bitcoin")]
    pub network: Network,

    /// Print each decoded notify as a JSON line on stdout.
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// All configured sources; stdin when none were given.
    pub fn sources(&self) -> Vec<Source> {
        let sources: Vec<Source> = self
            .files
            .iter()
            .cloned()
            .map(Source::File)
            .chain(endpoints(&self.miners).map(Source::Miner))
            .chain(endpoints(&self.stratum).map(Source::Stratum))
            .collect();

        if sources.is_empty() {
            vec![Source::Stdin]
        } else {
            sources
        }
    }
}

fn endpoints(raw: &[String]) -> impl Iterator<Item = String> + '_ {
    raw.iter()
        .map(|addr| addr.trim())
        .filter(|addr| !addr.is_empty())
        .map(str::to_owned)
}
