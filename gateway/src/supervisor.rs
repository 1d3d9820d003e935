//! Agent process supervision for `/agent/start|stop|restart` (§4.5): the
//! circuit breaker and an optional available-memory guard in front of
//! `VlmManager::ensure_ready`.

use std::path::Path;

/// Reads `MemAvailable` from `/proc/meminfo` in MiB. `None` when the file is
/// absent/unparseable or on non-Linux platforms; callers skip the guard then.
/// No crate in this workspace's stack exposes this, so it's read directly
/// rather than pulling in a dependency for one `/proc` field.
#[cfg(target_os = "linux")]
pub fn available_memory_mb() -> Option<u64> {
    available_memory_mb_from_path(Path::new("/proc/meminfo"))
}

#[cfg(not(target_os = "linux"))]
pub fn available_memory_mb() -> Option<u64> {
    None
}

fn available_memory_mb_from_path(path: &Path) -> Option<u64> {
    let content = std::fs::read_to_string(path).ok()?;
    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("MemAvailable:") {
            let kb: u64 = rest.trim().trim_end_matches("kB").trim().parse().ok()?;
            return Some(kb / 1024);
        }
    }
    None
}

/// Whether `/agent/start` should proceed: `floor_mb == 0` disables the guard
/// (the default); an unreadable `/proc/meminfo` fails open rather than
/// blocking startup outright.
pub fn memory_guard_allows(floor_mb: u64) -> bool {
    if floor_mb == 0 {
        return true;
    }
    match available_memory_mb() {
        Some(available) => available >= floor_mb,
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_mem_available_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "MemTotal:       16384000 kB").unwrap();
        writeln!(file, "MemAvailable:    8192000 kB").unwrap();
        let mb = available_memory_mb_from_path(file.path()).unwrap();
        assert_eq!(mb, 8000);
    }

    #[test]
    fn missing_mem_available_line_yields_none() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "MemTotal:       16384000 kB").unwrap();
        assert!(available_memory_mb_from_path(file.path()).is_none());
    }

    #[test]
    fn zero_floor_always_allows() {
        assert!(memory_guard_allows(0));
    }
}
