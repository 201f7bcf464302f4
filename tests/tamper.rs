use anyhow::Result;
use oorandom::Rand64;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chainlog::{ChainLogConfig, ChainVerifier, MemoryKeyStore, Record, SecureAppendLog, SigningKeys};

fn unique_root(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("chainlog-{}-{}-{}", prefix, pid, t))
}

/// Лог из `n` записей с подписью каждые 4 строки.
fn write_log(log: &Path, ks: Arc<MemoryKeyStore>, n: usize) -> Result<()> {
    let cfg = ChainLogConfig::default().with_signature_interval_ms(60_000);
    let w = SecureAppendLog::open(
        log,
        vec!["user".into(), "action".into()],
        ks,
        cfg,
    )?;
    for i in 0..n {
        w.append(
            &Record::new()
                .with("user", format!("user{:03}", i))
                .with("action", if i % 2 == 0 { "login" } else { "logout" }),
        )?;
        if i % 4 == 3 {
            w.write_signature()?;
        }
    }
    w.close()?;
    Ok(())
}

fn rewrite_lines(log: &Path, lines: &[String]) -> Result<()> {
    let mut out = String::new();
    for l in lines {
        out.push_str(l);
        out.push('\n');
    }
    fs::write(log, out)?;
    Ok(())
}

/// Переворачиваем один символ в значении случайной строки данных:
/// верификатор обязан указать именно эту строку.
#[test]
fn single_byte_flip_is_detected_at_its_row() -> Result<()> {
    let root = unique_root("flip");
    fs::create_dir_all(&root)?;
    let mut rng = Rand64::new(0xC0FFEE);

    for round in 0..16 {
        let log = root.join(format!("audit-{}.csv", round));
        let ks = Arc::new(MemoryKeyStore::new(SigningKeys::generate()));
        write_log(&log, ks.clone(), 12)?;

        let original: Vec<String> = fs::read_to_string(&log)?.lines().map(|s| s.to_string()).collect();
        let data_rows: Vec<usize> = original
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, l)| !l.starts_with("\"\""))
            .map(|(i, _)| i)
            .collect();
        let idx = data_rows[rng.rand_range(0..data_rows.len() as u64) as usize];

        // первая ячейка: "userNNN" — байты 1..8
        let mut bytes = original[idx].clone().into_bytes();
        let pos = 1 + rng.rand_range(0..7) as usize;
        bytes[pos] = if bytes[pos] == b'a' { b'b' } else { b'a' };
        let mut lines = original.clone();
        lines[idx] = String::from_utf8(bytes)?;
        rewrite_lines(&log, &lines)?;

        let res = ChainVerifier::default().verify(&log, ks.as_ref())?;
        assert!(!res.ok, "round {}: flip at line {} not detected", round, idx);
        assert_eq!(res.row, Some(idx + 1), "round {}", round);
        assert_eq!(res.reason.as_deref(), Some("HMAC mismatch"));
    }
    Ok(())
}

#[test]
fn deleting_a_middle_row_is_detected() -> Result<()> {
    let root = unique_root("delete");
    fs::create_dir_all(&root)?;
    let log = root.join("audit.csv");
    let ks = Arc::new(MemoryKeyStore::new(SigningKeys::generate()));
    write_log(&log, ks.clone(), 6)?;

    let original: Vec<String> = fs::read_to_string(&log)?.lines().map(|s| s.to_string()).collect();
    for victim in 1..original.len() - 1 {
        let mut lines = original.clone();
        lines.remove(victim);
        rewrite_lines(&log, &lines)?;

        let res = ChainVerifier::default().verify(&log, ks.as_ref())?;
        assert!(!res.ok, "deleting line {} not detected", victim);
        let reason = res.reason.unwrap_or_default();
        assert!(
            reason == "HMAC mismatch"
                || reason == "final key mismatch"
                || reason == "signature mismatch"
                || reason == "signature without a preceding data row",
            "line {}: unexpected reason {}",
            victim,
            reason
        );
    }
    Ok(())
}

#[test]
fn dropping_final_signature_or_forging_one_is_detected() -> Result<()> {
    let root = unique_root("final");
    fs::create_dir_all(&root)?;
    let log = root.join("audit.csv");
    let ks = Arc::new(MemoryKeyStore::new(SigningKeys::generate()));
    write_log(&log, ks.clone(), 5)?;

    let original: Vec<String> = fs::read_to_string(&log)?.lines().map(|s| s.to_string()).collect();

    let mut lines = original.clone();
    lines.pop();
    rewrite_lines(&log, &lines)?;
    let res = ChainVerifier::default().verify(&log, ks.as_ref())?;
    assert_eq!(res.reason.as_deref(), Some("missing final signature"));

    // подпись чужим ключом
    let other = SigningKeys::generate();
    let forged = other.sign(b"anything")?;
    let mut lines = original.clone();
    let last = lines.len() - 1;
    lines[last] = format!(
        "\"\",\"\",\"\",\"{}\"",
        chainlog::crypto::b64_encode(&forged)
    );
    rewrite_lines(&log, &lines)?;
    let res = ChainVerifier::default().verify(&log, ks.as_ref())?;
    assert!(!res.ok);
    assert_eq!(res.row, Some(last + 1));
    assert_eq!(res.reason.as_deref(), Some("signature mismatch"));

    // строка с лишней ячейкой
    let mut lines = original;
    lines[1].push_str(",\"x\"");
    rewrite_lines(&log, &lines)?;
    let res = ChainVerifier::default().verify(&log, ks.as_ref())?;
    assert_eq!(res.row, Some(2));
    assert!(res.reason.unwrap_or_default().starts_with("malformed row"));
    Ok(())
}
