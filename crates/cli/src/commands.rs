use clap::{Args, Subcommand, ValueEnum};
use model::{
    core::entity::{Direction, Entity},
    execution::run::parse_filter,
};

#[derive(Subcommand)]
pub enum Commands {
    /// Perform a single tick (at most one batch)
    Tick {
        #[arg(help = "Entity to synchronize: products, customers or orders")]
        entity: Entity,

        #[command(flatten)]
        run: RunArgs,
    },
    /// Drive ticks until the run completes, is cancelled or fails
    Run {
        #[arg(help = "Entity to synchronize: products, customers or orders")]
        entity: Entity,

        #[command(flatten)]
        run: RunArgs,

        #[arg(long, default_value_t = 250, help = "Pause between ticks in milliseconds")]
        interval_ms: u64,
    },
    /// Request cancellation; it takes effect at the start of the next tick
    Cancel { entity: Entity },
    /// Acknowledge a cancelled run and drop its progress snapshot
    Ack { entity: Entity },
    Progress {
        entity: Entity,

        #[arg(
            long,
            help = "If set, prints the progress information as JSON instead of a table"
        )]
        json: bool,
    },
    /// List per-item failures of a run
    Errors {
        entity: Entity,

        #[arg(long, help = "Run ID to inspect; defaults to the current run")]
        run: Option<String>,

        #[arg(long, help = "Delete the listed records after printing them")]
        purge: bool,

        #[arg(long, help = "Print records as JSON")]
        json: bool,
    },
    /// Show checkpoint, lock and progress for one or all entities
    Status {
        entity: Option<Entity>,

        #[arg(long, help = "Print the overview as JSON")]
        json: bool,
    },
}

#[derive(Args, Clone)]
pub struct RunArgs {
    #[arg(long, default_value = "erp-to-store", help = "erp-to-store or store-to-erp")]
    pub direction: Direction,

    #[arg(
        long = "filter",
        value_parser = parse_filter,
        help = "ERP filter as key=value; repeatable"
    )]
    pub filters: Vec<(String, String)>,

    #[arg(long, help = "Items per batch; defaults to the configured value")]
    pub batch_size: Option<usize>,

    #[arg(long, help = "Discard the checkpoint and start a new run")]
    pub force_restart: bool,

    #[arg(long, env = "ERPSYNC_TOKEN", help = "Session token forwarded to the ERP")]
    pub token: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum SourceFormat {
    #[default]
    Json,
    Csv,
}

/// Single-byte field separator for CSV exports.
pub fn parse_delimiter(raw: &str) -> Result<u8, String> {
    match raw.as_bytes() {
        [byte] if byte.is_ascii() => Ok(*byte),
        _ => Err(format!("delimiter must be one ASCII character, got '{raw}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimiter_is_a_single_ascii_byte() {
        assert_eq!(parse_delimiter(";"), Ok(b';'));
        assert_eq!(parse_delimiter("\t"), Ok(b'\t'));
        assert!(parse_delimiter(";;").is_err());
        assert!(parse_delimiter("é").is_err());
    }
}
