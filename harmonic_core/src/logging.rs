//! JSON-lines log of completed transforms.
//!
//! One record per `map2alm`, `map2alm_spin` or `anafast` call, appended to
//! the file named by `EngineConfig::log_path`.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

fn ensure_parent<P: AsRef<Path>>(path: P) -> io::Result<()> {
    match path.as_ref().parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir),
        _ => Ok(()),
    }
}

fn append_json_line<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    serde_json::to_writer(&mut file, value)
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
    file.write_all(b"\n")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformLogEntry {
    pub operation: String,
    pub nside: usize,
    pub lmax: usize,
    pub spin: Option<i32>,
    pub elapsed_ms: f64,
    pub timestamp_ms: u128,
}

impl TransformLogEntry {
    pub fn new(
        operation: &str,
        nside: usize,
        lmax: usize,
        spin: Option<i32>,
        elapsed: Duration,
    ) -> Self {
        Self {
            operation: operation.to_string(),
            nside,
            lmax,
            spin,
            elapsed_ms: elapsed.as_secs_f64() * 1e3,
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis(),
        }
    }
}

pub fn log_transform<P: AsRef<Path>>(path: P, entry: &TransformLogEntry) -> io::Result<()> {
    ensure_parent(&path)?;
    append_json_line(path, entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_transform_appends_lines() {
        let dir = std::env::temp_dir().join(format!("sht_log_{}", std::process::id()));
        let path = dir.join("nested").join("transforms.jsonl");
        let _ = fs::remove_dir_all(&dir);

        let first = TransformLogEntry::new("map2alm", 4, 11, None, Duration::from_millis(3));
        let second = TransformLogEntry::new("anafast", 4, 11, Some(2), Duration::from_millis(5));
        log_transform(&path, &first).unwrap();
        log_transform(&path, &second).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed["operation"], "anafast");
        assert_eq!(parsed["spin"], 2);
        assert_eq!(parsed["lmax"], 11);

        fs::remove_dir_all(&dir).unwrap();
    }
}
