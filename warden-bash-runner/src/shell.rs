use std::path::{Path, PathBuf};

/// Shell families the runner knows how to drive with `-c`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShellKind {
    Bash,
    Sh,
}

impl ShellKind {
    pub fn program(self) -> &'static str {
        match self {
            Self::Bash => "bash",
            Self::Sh => "sh",
        }
    }

    /// Prefer bash when it resolves on `search_path`, otherwise fall back to sh.
    pub fn detect(search_path: &str) -> Self {
        if find_utility("bash", search_path).is_some() {
            Self::Bash
        } else {
            Self::Sh
        }
    }

    /// Absolute path of this shell on `search_path`, or the bare program name
    /// when it cannot be resolved.
    pub fn resolve(self, search_path: &str) -> PathBuf {
        find_utility(self.program(), search_path)
            .unwrap_or_else(|| PathBuf::from(self.program()))
    }
}

/// Look up an executable on an explicit search path, ignoring the caller's
/// own `PATH`.
pub fn find_utility(name: &str, search_path: &str) -> Option<PathBuf> {
    which::which_in(name, Some(search_path), Path::new("/")).ok()
}

/// Names from `required` that do not resolve on `search_path`.
pub fn missing_utilities(required: &[&str], search_path: &str) -> Vec<String> {
    required
        .iter()
        .filter(|name| find_utility(name, search_path).is_none())
        .map(|name| (*name).to_owned())
        .collect()
}
