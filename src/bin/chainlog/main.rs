use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};

mod cli;
mod util;
mod cmd_keygen;
mod cmd_append;
mod cmd_verify;
mod cmd_verify_archive;
mod cmd_rotate;
mod cmd_read;
mod cmd_status;

fn init_logger() {
    // Уровень берём из RUST_LOG, иначе дефолт — info.
    // Пример: RUST_LOG=debug ./chainlog verify --log audit.csv --signing signing.keyring
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    init_logger();

    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = cli::Cli::parse();
    match cli.cmd {
        cli::Cmd::Keygen { signing } =>
            cmd_keygen::exec(signing),

        cli::Cmd::Append { log, columns, signing, record } =>
            cmd_append::exec(log, columns, signing, record),

        cli::Cmd::Verify { log, signing, json } =>
            cmd_verify::exec(log, signing, json),

        cli::Cmd::VerifyArchive { log, signing, json } =>
            cmd_verify_archive::exec(log, signing, json),

        cli::Cmd::Rotate { log, columns, signing } =>
            cmd_rotate::exec(log, columns, signing),

        cli::Cmd::Read { log, json } =>
            cmd_read::exec(log, json),

        cli::Cmd::Status { log, json } =>
            cmd_status::exec(log, json),
    }
}
