use anyhow::{anyhow, Result};
use std::path::PathBuf;

use chainlog::{ChainLogConfig, ChainVerifier};

use crate::util::{existing_keystore, or_dash, sealer, signing_keys};

pub fn exec(log: PathBuf, signing: PathBuf, json: bool) -> Result<()> {
    let cfg = ChainLogConfig::from_env();
    let sealer = sealer()?;
    let keys = signing_keys(&signing, sealer.as_ref())?;
    let keystore = existing_keystore(&log, &keys, sealer)?;

    let res = ChainVerifier::new(cfg.csv_format()).verify(&log, &keystore)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&res)?);
    } else if res.ok {
        println!("OK {}", log.display());
        println!("  columns        = {}", res.columns().join(","));
        println!("  data rows      = {}", res.data_rows);
        println!("  signature rows = {}", res.signature_rows);
        println!("  last HMAC      = {}", or_dash(res.last_hmac.as_deref()));
    } else {
        println!(
            "TAMPERED {}{}: {}",
            log.display(),
            res.row.map(|r| format!(" (row {})", r)).unwrap_or_default(),
            or_dash(res.reason.as_deref())
        );
    }

    if res.ok {
        Ok(())
    } else {
        Err(anyhow!("verification failed for {}", log.display()))
    }
}
