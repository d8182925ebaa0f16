//! Small standalone helpers shared across modules.

use sysinfo::System;

/// Current process resident memory usage, in bytes.
pub fn get_memory_usage() -> u64 {
    let mut system = System::new_all();
    system.refresh_memory();
    let pid = match sysinfo::get_current_pid() {
        Ok(pid) => pid,
        Err(_) => return 0,
    };
    system
        .process(pid)
        .map(|process| process.memory())
        .unwrap_or(0)
}

/// Format a byte count as a human-readable string (`"1.50 MB"`).
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_bytes_picks_the_right_unit() {
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1024 * 1024), "1.00 MB");
        assert_eq!(format_bytes(512), "512.00 B");
    }

    #[test]
    fn memory_usage_returns_a_nonzero_reading() {
        assert!(get_memory_usage() > 0 || cfg!(target_os = "none"));
    }
}
