use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::sync::Arc;

use chainlog::keystore::load_signing_keys;
use chainlog::{EnvKeySealer, FileKeyStore, KeySealer, SigningKeys};

pub fn parse_columns(s: &str) -> Result<Vec<String>> {
    let cols: Vec<String> = s
        .split(',')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    if cols.is_empty() {
        return Err(anyhow!("--columns must name at least one column"));
    }
    Ok(cols)
}

pub fn sealer() -> Result<Arc<dyn KeySealer>> {
    Ok(Arc::new(EnvKeySealer::from_env()?))
}

pub fn signing_keys(signing: &Path, sealer: &dyn KeySealer) -> Result<SigningKeys> {
    load_signing_keys(signing, sealer)
        .with_context(|| format!("load signing keyring {}", signing.display()))
}

/// Keystore существующего лог-файла (для проверки: ничего не создаём).
pub fn existing_keystore(log: &Path, signing: &SigningKeys, sealer: Arc<dyn KeySealer>) -> Result<FileKeyStore> {
    FileKeyStore::open_existing(log, signing.clone(), sealer)
        .with_context(|| format!("open keystore of {}", log.display()))
}

pub fn or_dash(s: Option<&str>) -> &str {
    s.unwrap_or("-")
}
