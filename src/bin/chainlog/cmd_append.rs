use anyhow::{anyhow, Context, Result};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use chainlog::{ChainLogConfig, FileKeyStore, Record, SecureAppendLog};

use crate::util::{parse_columns, sealer, signing_keys};

pub fn exec(log: PathBuf, columns: String, signing: PathBuf, records: Vec<String>) -> Result<()> {
    let columns = parse_columns(&columns)?;
    let sealer = sealer()?;
    let keys = signing_keys(&signing, sealer.as_ref())?;
    if !keys.can_sign() {
        return Err(anyhow!("signing keyring {} has no secret key", signing.display()));
    }

    let mut parsed: Vec<Record> = Vec::new();
    if records.is_empty() {
        let stdin = std::io::stdin();
        for (i, line) in stdin.lock().lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let r: Record = serde_json::from_str(&line)
                .with_context(|| format!("stdin line {}: invalid JSON record", i + 1))?;
            parsed.push(r);
        }
    } else {
        for (i, s) in records.iter().enumerate() {
            let r: Record = serde_json::from_str(s)
                .with_context(|| format!("--record #{}: invalid JSON record", i + 1))?;
            parsed.push(r);
        }
    }

    let keystore = Arc::new(FileKeyStore::open(&log, keys, sealer)?);
    let writer = SecureAppendLog::open(&log, columns, keystore, ChainLogConfig::from_env())
        .with_context(|| format!("open secure log {}", log.display()))?;
    for r in &parsed {
        writer.append(r)?;
    }
    writer.close()?;

    println!("appended {} record(s) to {}", parsed.len(), log.display());
    Ok(())
}
