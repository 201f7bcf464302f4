use anyhow::{anyhow, Result};
use std::path::PathBuf;

use chainlog::{verify_archive, ArchiveSet, ChainLogConfig, SecureKeyStore};

use crate::util::{existing_keystore, or_dash, sealer, signing_keys};

pub fn exec(log: PathBuf, signing: PathBuf, json: bool) -> Result<()> {
    let cfg = ChainLogConfig::from_env();
    let sealer = sealer()?;
    let keys = signing_keys(&signing, sealer.as_ref())?;

    let files = ArchiveSet::with_live(&log)?;
    if files.is_empty() {
        return Err(anyhow!("no log files found for {}", log.display()));
    }

    let report = verify_archive(&files, cfg.csv_format(), |path| {
        let ks = existing_keystore(path, &keys, sealer.clone())
            .map_err(chainlog::AuditLogError::storage)?;
        Ok(Box::new(ks) as Box<dyn SecureKeyStore>)
    });

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for e in &report {
            if e.result.ok {
                println!("PASS {}", e.path.display());
            } else {
                println!(
                    "FAIL {}{}: {}",
                    e.path.display(),
                    e.result.row.map(|r| format!(" (row {})", r)).unwrap_or_default(),
                    or_dash(e.result.reason.as_deref())
                );
            }
        }
    }

    let failed = report.iter().filter(|e| !e.result.ok).count();
    if failed == 0 {
        Ok(())
    } else {
        Err(anyhow!("{} of {} file(s) failed verification", failed, report.len()))
    }
}
