use anyhow::Result;
use std::path::PathBuf;

use chainlog::{read_events, ChainLogConfig};

pub fn exec(log: PathBuf, json: bool) -> Result<()> {
    let cfg = ChainLogConfig::from_env();
    let (columns, events) = read_events(&log, cfg.csv_format())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }

    println!("{}", columns.join("\t"));
    for e in &events {
        let line: Vec<&str> = columns.iter().map(|c| e.get(c).unwrap_or("")).collect();
        println!("{}", line.join("\t"));
    }
    eprintln!("{} event(s)", events.len());
    Ok(())
}
