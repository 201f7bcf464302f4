use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Администрирование защищённых CSV-журналов аудита.
///
/// Ключи keystore запечатываются KEK из CHAINLOG_KEK_HEX / CHAINLOG_KEK_BASE64.
/// Формат CSV и интервал подписи — из CHAINLOG_* (см. ChainLogConfig::from_env).
#[derive(Parser, Debug)]
#[command(name = "chainlog", version, about = "Tamper-evident CSV audit log tool")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Create a signing keyring with a fresh ed25519 pair
    Keygen {
        #[arg(long)]
        signing: PathBuf,
    },
    /// Append JSON records and close the log (writes the final signature)
    ///
    /// Без --record записи читаются из stdin, по одному JSON-объекту на строку:
    ///   {"user":"alice","action":"login"}
    Append {
        #[arg(long)]
        log: PathBuf,
        /// Comma-separated column list (header without HMAC,SIGNATURE)
        #[arg(long)]
        columns: String,
        #[arg(long)]
        signing: PathBuf,
        /// One JSON object; may be repeated
        #[arg(long)]
        record: Vec<String>,
    },
    /// Verify one log file against its keystore
    Verify {
        #[arg(long)]
        log: PathBuf,
        #[arg(long)]
        signing: PathBuf,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Verify every rotated file of a log and the live file (PASS/FAIL per file)
    VerifyArchive {
        #[arg(long)]
        log: PathBuf,
        #[arg(long)]
        signing: PathBuf,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Rotate the live file now
    Rotate {
        #[arg(long)]
        log: PathBuf,
        #[arg(long)]
        columns: String,
        #[arg(long)]
        signing: PathBuf,
    },
    /// Print data rows (chain columns stripped)
    Read {
        #[arg(long)]
        log: PathBuf,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Log file summary and process metrics
    Status {
        #[arg(long)]
        log: Option<PathBuf>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}
