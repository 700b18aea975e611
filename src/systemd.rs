//! systemd unit naming
//!
//! Implements `systemd-escape --path` so that templated units can be
//! instantiated for a device path.

/// Escape a filesystem path into a unit instance name
///
/// `/dev/xapi/cd/sr0` becomes `dev-xapi-cd-sr0`; the root path becomes `-`.
pub fn escape_path(path: &str) -> String {
    let trimmed: Vec<&str> = path.split('/').filter(|part| !part.is_empty()).collect();
    if trimmed.is_empty() {
        return "-".to_string();
    }

    let joined = trimmed.join("/");
    let mut escaped = String::with_capacity(joined.len());
    for (i, byte) in joined.bytes().enumerate() {
        match byte {
            b'/' => escaped.push('-'),
            b'.' if i == 0 => escaped.push_str("\\x2e"),
            b if b.is_ascii_alphanumeric() || b == b':' || b == b'_' || b == b'.' => {
                escaped.push(b as char)
            }
            b => escaped.push_str(&format!("\\x{:02x}", b)),
        }
    }
    escaped
}

/// Full unit name for a template such as `cdrommon@`
pub fn instance_unit(template: &str, instance: &str) -> String {
    format!("{}{}.service", template, instance)
}
