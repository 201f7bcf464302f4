use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use chainlog::{ChainLogConfig, FileKeyStore, FileRotator, SecureAppendLog};

use crate::util::{parse_columns, sealer, signing_keys};

pub fn exec(log: PathBuf, columns: String, signing: PathBuf) -> Result<()> {
    let columns = parse_columns(&columns)?;
    let sealer = sealer()?;
    let keys = signing_keys(&signing, sealer.as_ref())?;
    let keystore = Arc::new(FileKeyStore::open(&log, keys, sealer)?);

    let cfg = ChainLogConfig::from_env();
    // явный FileRotator: ротация по требованию, даже если политика размера выключена
    let rotator = Box::new(FileRotator::new(cfg.max_file_size).with_retention(cfg.retention()));
    let writer = SecureAppendLog::open_with(&log, columns, keystore, cfg, Some(rotator))
        .with_context(|| format!("open secure log {}", log.display()))?;

    let archived = writer.force_rotation()?;
    writer.close()?;

    match archived {
        Some(p) => println!("rotated: {} -> {}", log.display(), p.display()),
        None => println!("rotated in place: {}", log.display()),
    }
    Ok(())
}
