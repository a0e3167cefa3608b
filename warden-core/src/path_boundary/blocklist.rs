//! File names and extensions that may never be read or written.

/// Credentials and server configuration files, compared case-insensitively.
const BLOCKED_FILE_NAMES: &[&str] = &[
    ".htaccess",
    ".htpasswd",
    "id_rsa",
    "id_dsa",
    "id_ecdsa",
    "id_ed25519",
    "shadow",
    "passwd",
    "sudoers",
    "authorized_keys",
    "known_hosts",
];

/// Reserved device names on Windows. `NUL.txt` is as special as `NUL`.
const RESERVED_DEVICE_NAMES: &[&str] = &[
    "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7", "com8",
    "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

const BLOCKED_EXTENSIONS: &[&str] = &[
    "exe", "bat", "cmd", "com", "scr", "pif", "vbs", "js", "jse", "jar", "app", "deb", "rpm", "dmg",
    "pkg", "msi",
];

/// The reason `file_name` is refused, if it is.
pub fn blocked_reason(file_name: &str) -> Option<String> {
    let lowered = file_name.to_ascii_lowercase();

    if BLOCKED_FILE_NAMES.contains(&lowered.as_str()) {
        return Some(format!("Access to '{file_name}' is not allowed"));
    }

    let stem = lowered.split('.').next().unwrap_or(&lowered);
    if RESERVED_DEVICE_NAMES.contains(&stem) {
        return Some(format!("'{file_name}' is a reserved device name"));
    }

    if let Some((_, extension)) = lowered.rsplit_once('.') {
        if BLOCKED_EXTENSIONS.contains(&extension) {
            return Some(format!("Files with extension '.{extension}' are not allowed"));
        }
    }

    None
}
