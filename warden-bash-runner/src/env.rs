//! Environment construction for sandboxed children.
//!
//! The parent environment is never inherited. Children start from an empty
//! environment and receive only the variables built here, with the dynamic
//! loader hooks explicitly blanked so a wrapper shell cannot resurrect them.

use std::collections::HashMap;
use std::path::Path;

/// Loader variables forced to an empty value in every child.
pub const NEUTRALIZED_LOADER_VARS: &[&str] = &[
    "LD_PRELOAD",
    "LD_LIBRARY_PATH",
    "DYLD_INSERT_LIBRARIES",
    "DYLD_LIBRARY_PATH",
];

/// Inputs for [`build_sandbox_env`].
#[derive(Debug, Clone)]
pub struct SandboxEnv<'a> {
    /// Value for `PATH`.
    pub search_path: &'a str,
    /// Value for `LANG` and `LC_ALL`.
    pub locale: &'a str,
    /// Value for `USER`.
    pub user: &'a str,
    /// Shell program exposed as `SHELL`.
    pub shell: &'a Path,
    /// Workspace used as `HOME`, `PWD` and working directory.
    pub workspace: &'a Path,
    /// Scratch directory exposed as `TMPDIR` and `TMP`.
    pub tmp_dir: &'a Path,
}

/// Build the complete environment for a sandboxed child.
pub fn build_sandbox_env(settings: &SandboxEnv<'_>) -> HashMap<String, String> {
    let workspace = settings.workspace.display().to_string();
    let tmp_dir = settings.tmp_dir.display().to_string();

    let mut env = HashMap::new();
    env.insert("PATH".to_owned(), settings.search_path.to_owned());
    env.insert("USER".to_owned(), settings.user.to_owned());
    env.insert("SHELL".to_owned(), settings.shell.display().to_string());
    env.insert("PWD".to_owned(), workspace.clone());
    env.insert("HOME".to_owned(), workspace);
    env.insert("TMPDIR".to_owned(), tmp_dir.clone());
    env.insert("TMP".to_owned(), tmp_dir);
    env.insert("LANG".to_owned(), settings.locale.to_owned());
    env.insert("LC_ALL".to_owned(), settings.locale.to_owned());
    for key in NEUTRALIZED_LOADER_VARS {
        env.insert((*key).to_owned(), String::new());
    }
    env.insert("PYTHONDONTWRITEBYTECODE".to_owned(), "1".to_owned());
    env.insert("PYTHONUNBUFFERED".to_owned(), "1".to_owned());
    env
}

/// Login name of the invoking user, if the parent environment exposes one.
pub fn inherited_user() -> Option<String> {
    std::env::var("USER")
        .ok()
        .map(|user| user.trim().to_owned())
        .filter(|user| !user.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HashMap<String, String> {
        build_sandbox_env(&SandboxEnv {
            search_path: "/usr/bin:/bin",
            locale: "C",
            user: "alice",
            shell: Path::new("/bin/sh"),
            workspace: Path::new("/srv/ws/alice"),
            tmp_dir: Path::new("/srv/ws/alice/.tmp"),
        })
    }

    #[test]
    fn workspace_becomes_home_and_pwd() {
        let env = sample();
        assert_eq!(env.get("HOME").map(String::as_str), Some("/srv/ws/alice"));
        assert_eq!(env.get("PWD").map(String::as_str), Some("/srv/ws/alice"));
        assert_eq!(
            env.get("TMPDIR").map(String::as_str),
            Some("/srv/ws/alice/.tmp")
        );
        assert_eq!(env.get("TMP"), env.get("TMPDIR"));
    }

    #[test]
    fn loader_variables_are_blanked() {
        let env = sample();
        for key in NEUTRALIZED_LOADER_VARS {
            assert_eq!(env.get(*key).map(String::as_str), Some(""), "{key}");
        }
    }

    #[test]
    fn nothing_is_inherited_from_parent() {
        let env = sample();
        assert!(!env.contains_key("CARGO_HOME"));
        assert!(!env.contains_key("RUST_LOG"));
        assert_eq!(env.len(), 15);
    }
}
