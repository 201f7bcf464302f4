use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chainlog::crypto::b64_encode;
use chainlog::{
    verify_archive, ArchiveSet, ChainLogConfig, ChainVerifier, CsvFormat, FileKeyStore, FileRotator,
    KeySealer, MemoryKeyStore, Record, SecureAppendLog, SecureKeyStore, SigningKeys, StaticKeySealer,
};

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("chainlog-{}-{}-{}", prefix, pid, t))
}

fn cols() -> Vec<String> {
    vec!["id".into(), "action".into()]
}

fn rec(i: usize) -> Record {
    Record::new().with("id", i.to_string()).with("action", "update")
}

fn sealer() -> Arc<dyn KeySealer> {
    Arc::new(StaticKeySealer::new([0x5A; 32]))
}

fn open_file_keystore(path: &Path, keys: &SigningKeys, sealer: &Arc<dyn KeySealer>) -> chainlog::Result<Box<dyn SecureKeyStore>> {
    Ok(Box::new(FileKeyStore::open_existing(path, keys.clone(), sealer.clone())?))
}

/// N записей, ротация, M записей: строка 2 нового файла — последняя
/// подпись старого, оба файла проверяются по отдельности.
#[test]
fn rotation_carries_signature_into_new_file() -> Result<()> {
    let root = unique_root("rotate");
    fs::create_dir_all(&root)?;
    let log = root.join("access.csv");
    let keys = SigningKeys::generate();
    let sealer = sealer();
    let ks = Arc::new(FileKeyStore::open(&log, keys.clone(), sealer.clone())?);
    let cfg = ChainLogConfig::default().with_signature_interval_ms(60_000);

    let w = SecureAppendLog::open_with(&log, cols(), ks.clone(), cfg, Some(Box::new(FileRotator::new(0))))?;
    for i in 0..3 {
        w.append(&rec(i))?;
    }
    let archived = w.force_rotation()?.expect("rotator must archive the file");
    assert_eq!(archived, root.join("access.csv.000001"));
    let carried = w.chain_snapshot()?.last_signature.expect("signature before rotation");
    assert!(w.chain_snapshot()?.last_hmac.is_none());

    for i in 3..5 {
        w.append(&rec(i))?;
    }
    w.close()?;

    // архивный файл: свой keystore "<archived>.keystore"
    let old_ks = open_file_keystore(&archived, &keys, &sealer)?;
    let old = ChainVerifier::default().verify(&archived, old_ks.as_ref())?;
    assert!(old.ok, "archived: {:?}", old.reason);
    assert_eq!(old.data_rows, 3);
    assert_eq!(old.last_signature.as_deref(), Some(carried.as_slice()));

    let text = fs::read_to_string(&log)?;
    let row2 = text.lines().nth(1).unwrap();
    assert_eq!(row2, format!("\"\",\"\",\"\",\"{}\"", b64_encode(&carried)));

    let new = ChainVerifier::default().verify(&log, ks.as_ref())?;
    assert!(new.ok, "live: {:?}", new.reason);
    assert_eq!(new.data_rows, 2);
    assert_eq!(new.carried_signature.as_deref(), Some(carried.as_slice()));
    Ok(())
}

#[test]
fn size_policy_rotates_and_archive_verifies() -> Result<()> {
    let root = unique_root("size");
    fs::create_dir_all(&root)?;
    let log = root.join("events.csv");
    let keys = SigningKeys::generate();
    let sealer = sealer();
    let ks = Arc::new(FileKeyStore::open(&log, keys.clone(), sealer.clone())?);
    let cfg = ChainLogConfig::default()
        .with_signature_interval_ms(60_000)
        .with_max_file_size(400);

    let w = SecureAppendLog::open(&log, cols(), ks.clone(), cfg)?;
    for i in 0..40 {
        w.append(&rec(i))?;
    }
    w.close()?;

    let archives = ArchiveSet::list(&log)?;
    assert!(archives.len() >= 2, "expected several rotations, got {}", archives.len());
    let indexes: Vec<u64> = archives.iter().map(|(n, _)| *n).collect();
    let expected: Vec<u64> = (1..=archives.len() as u64).collect();
    assert_eq!(indexes, expected);

    let files = ArchiveSet::with_live(&log)?;
    let report = verify_archive(&files, CsvFormat::default(), |p| open_file_keystore(p, &keys, &sealer));
    assert_eq!(report.len(), archives.len() + 1);
    let total: usize = report.iter().map(|e| e.result.data_rows).sum();
    for e in &report {
        assert!(e.result.ok, "{}: {:?}", e.path.display(), e.result.reason);
    }
    assert_eq!(total, 40);

    // порча архивного файла видна только в его строке отчёта
    let victim = &archives[0].1;
    let text = fs::read_to_string(victim)?.replacen("\"update\"", "\"delete\"", 1);
    fs::write(victim, text)?;
    let report = verify_archive(&files, CsvFormat::default(), |p| open_file_keystore(p, &keys, &sealer));
    assert!(!report[0].result.ok);
    assert!(report[1..].iter().all(|e| e.result.ok));
    Ok(())
}

#[test]
fn soft_rotation_reopens_same_file() -> Result<()> {
    let root = unique_root("soft");
    fs::create_dir_all(&root)?;
    let log = root.join("audit.csv");
    let ks = Arc::new(MemoryKeyStore::new(SigningKeys::generate()));
    let cfg = ChainLogConfig::default().with_signature_interval_ms(60_000);

    let w = SecureAppendLog::open(&log, cols(), ks.clone(), cfg)?;
    w.append(&rec(0))?;
    w.append(&rec(1))?;
    let before = w.chain_snapshot()?;
    assert_eq!(w.force_rotation()?, None);
    let after = w.chain_snapshot()?;
    assert_eq!(before.current_key, after.current_key);
    assert!(after.last_signature.is_some());

    w.append(&rec(2))?;
    w.close()?;
    assert!(ArchiveSet::list(&log)?.is_empty());

    let res = ChainVerifier::default().verify(&log, ks.as_ref())?;
    assert!(res.ok, "reason: {:?}", res.reason);
    assert_eq!(res.data_rows, 3);
    assert_eq!(res.signature_rows, 2);
    Ok(())
}

#[test]
fn memory_keystore_keeps_archived_entries() -> Result<()> {
    let root = unique_root("memrot");
    fs::create_dir_all(&root)?;
    let log = root.join("audit.csv");
    let ks = Arc::new(MemoryKeyStore::new(SigningKeys::generate()));
    let cfg = ChainLogConfig::default().with_signature_interval_ms(60_000);

    let w = SecureAppendLog::open_with(&log, cols(), ks.clone(), cfg, Some(Box::new(FileRotator::new(0))))?;
    w.append(&rec(0))?;
    let archived = w.force_rotation()?.expect("archived path");
    // новый файл помнит перенесённую подпись
    let carried = w.chain_snapshot()?.last_signature;
    assert!(carried.is_some());
    assert_eq!(ks.read_current_signature()?, carried);
    w.close()?;

    let old_ks = ks.archived(&archived).expect("entries moved aside on rotation");
    let old = ChainVerifier::default().verify(&archived, &old_ks)?;
    assert!(old.ok, "reason: {:?}", old.reason);

    // новый файл: заголовок + перенесённая подпись, данных нет
    let res = ChainVerifier::default().verify(&log, ks.as_ref())?;
    assert!(res.ok, "reason: {:?}", res.reason);
    assert_eq!(res.data_rows, 0);
    assert_eq!(res.signature_rows, 1);
    Ok(())
}

#[test]
fn retention_keeps_newest_archives_with_their_keystores() -> Result<()> {
    let root = unique_root("retain");
    fs::create_dir_all(&root)?;
    let log = root.join("events.csv");
    let keys = SigningKeys::generate();
    let sealer = sealer();
    let ks = Arc::new(FileKeyStore::open(&log, keys.clone(), sealer.clone())?);
    let cfg = ChainLogConfig::default()
        .with_signature_interval_ms(60_000)
        .with_max_file_size(400)
        .with_max_history_files(2);

    let w = SecureAppendLog::open(&log, cols(), ks.clone(), cfg)?;
    for i in 0..60 {
        w.append(&rec(i))?;
    }
    w.close()?;

    let archives = ArchiveSet::list(&log)?;
    assert_eq!(archives.len(), 2);
    let newest = archives[1].0;
    assert!(newest > 2, "expected more than two rotations, got {}", newest);
    assert_eq!(archives[0].0, newest - 1);

    for n in 1..newest - 1 {
        let gone = chainlog::journal::archive_path(&log, n);
        assert!(!gone.exists());
        assert!(!FileKeyStore::keystore_path(&gone).exists());
    }
    for (_, p) in &archives {
        let res = ChainVerifier::default().verify(p, open_file_keystore(p, &keys, &sealer)?.as_ref())?;
        assert!(res.ok, "{}: {:?}", p.display(), res.reason);
    }
    Ok(())
}
