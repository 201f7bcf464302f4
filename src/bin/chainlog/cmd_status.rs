use anyhow::Result;
use serde_json::json;
use std::path::PathBuf;

use chainlog::metrics;
use chainlog::verify::read_header;
use chainlog::{read_events, ArchiveSet, ChainLogConfig};

pub fn exec(log: Option<PathBuf>, json: bool) -> Result<()> {
    let cfg = ChainLogConfig::from_env();
    let ms = metrics::snapshot();

    let file = match &log {
        Some(path) => {
            let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
            let header = if size > 0 { read_header(path, cfg.csv_format())? } else { Vec::new() };
            let events = if size > 0 { read_events(path, cfg.csv_format())?.1.len() } else { 0 };
            let archives = ArchiveSet::list(path)?.len();
            Some((path.clone(), size, header, events, archives))
        }
        None => None,
    };

    if json {
        let file_json = file.as_ref().map(|(p, size, header, events, archives)| {
            json!({
                "path": p.display().to_string(),
                "size": size,
                "header": header,
                "events": events,
                "archives": archives,
            })
        });
        let out = json!({
            "config": {
                "signature_interval_ms": cfg.signature_interval_ms,
                "delimiter": (cfg.delimiter as char).to_string(),
                "quote": (cfg.quote as char).to_string(),
                "max_file_size": cfg.max_file_size,
                "fsync": cfg.fsync,
            },
            "file": file_json,
            "metrics": ms,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{}", cfg);
    if let Some((p, size, header, events, archives)) = &file {
        println!("log:      {}", p.display());
        println!("  size     = {} B", size);
        println!("  header   = {}", header.join(","));
        println!("  events   = {}", events);
        println!("  archives = {}", archives);
    }
    println!("metrics:");
    println!("  records_appended     = {}", ms.records_appended);
    println!("  bytes_written        = {}", ms.bytes_written);
    println!("  append_failures      = {}", ms.append_failures);
    println!("  signatures_written   = {}", ms.signatures_written);
    println!("  signature_failures   = {}", ms.signature_failures);
    println!("  rotations            = {}", ms.rotations);
    println!("  verifications_passed = {}", ms.verifications_passed);
    println!("  verifications_failed = {}", ms.verifications_failed);
    println!("  records/signature    = {:.2}", ms.records_per_signature());
    Ok(())
}
