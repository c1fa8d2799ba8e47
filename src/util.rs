/// Compute download progress as a percentage.
#[must_use]
pub fn progress_percent(downloaded: u64, total: Option<u64>) -> f32 {
    match total {
        Some(total) if total > 0 => (downloaded as f32 / total as f32) * 100.0,
        _ => 0.0,
    }
}

/// Render a byte count the way the progress label shows it.
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = KIB * 1024.0;

    let bytes = bytes as f64;
    if bytes < KIB {
        format!("{bytes:.0} B")
    } else if bytes < MIB {
        format!("{:.1} KB", bytes / KIB)
    } else {
        format!("{:.1} MB", bytes / MIB)
    }
}

/// Collapse the doubled backslashes that appear when a Windows path has been
/// written out as an escaped string, and strip surrounding quotes/spaces.
#[must_use]
pub fn normalize_path_text(raw: &str) -> String {
    let trimmed = raw.trim_matches(|c: char| c == '"' || c.is_whitespace());
    let mut normalized = trimmed.to_owned();
    while normalized.contains(r"\\") {
        normalized = normalized.replace(r"\\", r"\");
    }
    normalized
}
