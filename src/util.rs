//! Small helpers shared across modules.

/// Milliseconds since the Unix epoch.
///
/// Liveness records store and compare epoch millis; everything that needs
/// "now" goes through here so tests exercise the same clock the relay uses.
pub fn epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
