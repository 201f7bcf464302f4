use anyhow::Result;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chainlog::keystore::{create_signing_keystore, load_signing_keys, KeyRing, ENTRY_SIGNATURE_SECRET};
use chainlog::{
    ChainLogConfig, ChainVerifier, FileKeyStore, KeySealer, Record, SecureAppendLog, SecureKeyStore,
    StaticKeySealer, SymmetricKey,
};

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("chainlog-{}-{}-{}", prefix, pid, t))
}

#[test]
fn signing_keyring_create_load_and_wrong_kek() -> Result<()> {
    let root = unique_root("signing");
    fs::create_dir_all(&root)?;
    let path = root.join("signing.keyring");
    let sealer = StaticKeySealer::new([0x11; 32]);

    let created = create_signing_keystore(&path, &sealer)?;
    assert!(create_signing_keystore(&path, &sealer).is_err(), "must not overwrite");

    let loaded = load_signing_keys(&path, &sealer)?;
    assert!(loaded.can_sign());
    assert_eq!(loaded.public_bytes(), created.public_bytes());
    let sig = loaded.sign(b"chain tip")?;
    assert!(created.verify(b"chain tip", &sig)?);

    // KEK не тот — AEAD не откроется
    let wrong = StaticKeySealer::new([0x22; 32]);
    assert!(load_signing_keys(&path, &wrong).is_err());

    // без секретной записи — только проверка
    KeyRing::open(&path)?.remove(&[ENTRY_SIGNATURE_SECRET])?;
    let verify_only = load_signing_keys(&path, &sealer)?;
    assert!(!verify_only.can_sign());
    assert!(verify_only.verify(b"chain tip", &sig)?);
    assert!(verify_only.sign(b"x").is_err());
    Ok(())
}

#[test]
fn file_keystore_entries_survive_reopen_and_are_sealed() -> Result<()> {
    let root = unique_root("filestore");
    fs::create_dir_all(&root)?;
    let log = root.join("audit.csv");
    let sealer: Arc<dyn KeySealer> = Arc::new(StaticKeySealer::new([0x33; 32]));
    let keys = create_signing_keystore(&root.join("signing.keyring"), sealer.as_ref())?;

    let key = SymmetricKey::from_bytes([9u8; 32]);
    {
        let ks = FileKeyStore::open(&log, keys.clone(), sealer.clone())?;
        ks.write_initial_key(&key)?;
        ks.write_current_signature(b"sig-bytes")?;
    }
    let raw = fs::read(FileKeyStore::keystore_path(&log))?;
    assert!(!raw.windows(32).any(|w| w == key.as_bytes()), "key stored in clear");

    let ks = FileKeyStore::open_existing(&log, keys.clone(), sealer.clone())?;
    assert_eq!(ks.read_initial_key()?, Some(key));
    assert!(ks.read_current_key()?.is_none());
    assert_eq!(ks.read_current_signature()?.as_deref(), Some(&b"sig-bytes"[..]));
    Ok(())
}

#[test]
fn writer_over_file_keystore_resumes_across_instances() -> Result<()> {
    let root = unique_root("filewriter");
    fs::create_dir_all(&root)?;
    let log = root.join("audit.csv");
    let sealer: Arc<dyn KeySealer> = Arc::new(StaticKeySealer::new([0x44; 32]));
    let keys = create_signing_keystore(&root.join("signing.keyring"), sealer.as_ref())?;
    let cfg = ChainLogConfig::default().with_signature_interval_ms(60_000);
    let columns: Vec<String> = vec!["id".into()];

    for batch in 0..3 {
        let ks = Arc::new(FileKeyStore::open(&log, keys.clone(), sealer.clone())?);
        let w = SecureAppendLog::open(&log, columns.clone(), ks, cfg.clone())?;
        for i in 0..4 {
            w.append(&Record::new().with("id", format!("{}-{}", batch, i)))?;
        }
        w.close()?;
    }

    let ks = FileKeyStore::open_existing(&log, keys, sealer)?;
    let res = ChainVerifier::default().verify(&log, &ks)?;
    assert!(res.ok, "reason: {:?}", res.reason);
    assert_eq!(res.data_rows, 12);
    assert_eq!(res.signature_rows, 3);
    Ok(())
}
