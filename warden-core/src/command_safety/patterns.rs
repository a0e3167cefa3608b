//! Regex catalogues used by the command validator.
//!
//! The sources are kept next to their compiled forms because rejection
//! reasons quote the pattern text verbatim.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use tracing::error;

/// Command shapes that are rejected outright. Matched case-insensitively,
/// with `^`/`$` anchoring at line boundaries.
pub const DANGEROUS_PATTERNS: &[&str] = &[
    // ──── Destructive filesystem operations ────
    r"rm\s+-rf\s+/",
    r"rm\s+-rf\s+~",
    r"rm\s+--recursive\s+--force\s+/",
    r"rm\s+-rf\s+/[a-z]",
    r"rm\s+-rf\s+\$HOME",
    r"rm\s+-rf\s+\*",
    r"\bdd\b.*of=/dev/",
    // ──── Fork bombs and exhaustion ────
    r":\(\)\{.*\|.*&\};",
    r".*\|.*&.*\|.*&",
    r"while\s+true.*do",
    r"for\s+\(\(;;\)\)",
    r"yes\s+.*\|",
    r"\.\*/dev/(zero|null|random).*>",
    // ──── Remote code execution ────
    r"curl.*\|.*sh",
    r"wget.*\|.*sh",
    r"curl.*\|.*bash",
    r"wget.*\|.*bash",
    r"curl.*\|.*zsh",
    r"wget.*\|.*zsh",
    r"curl.*\|.*python[0-9]*",
    r"wget.*\|.*python[0-9]*",
    r"curl.*-s.*\|.*sh",
    r"fetch.*\|.*sh",
    r"lynx.*-dump.*\|.*sh",
    // ──── Privilege escalation ────
    r"sudo\s+",
    r"su\s+",
    r"su\s*$",
    // ──── Permissions ────
    r"chmod\s+777",
    r"chmod\s+-R\s+777",
    r"chmod\s+a\+rwx",
    // ──── Process control ────
    r"kill\s+-9\s+-1",
    r"killall\s+-9",
    r"pkill\s+-9\s+-f",
    // ──── System control ────
    r"shutdown",
    r"reboot",
    r"halt",
    r"poweroff",
    r"init\s+[06]",
    r"systemctl\s+(poweroff|reboot|halt)",
    r"service\s+.*\s+(stop|restart)",
    r"/sbin/(shutdown|reboot|halt)",
    r"telinit\s+[06]",
    // ──── Disk ────
    r"dd\s+if=/dev/(zero|random|urandom)",
    r"mkfs\.",
    r"fdisk",
    r"parted",
    // ──── Network ────
    r"nc\s+.*-e",
    r"netcat\s+.*-e",
    r"ncat\s+.*-e",
    r"telnet\s+.*\|",
    r"socat.*exec",
    r#"ssh\s+.*".*[;&]"#,
    r"rsync\s+.*--rsh",
    r"scp\s+.*`",
    // ──── Mount ────
    r"mount\s+",
    r"umount\s+",
    r"fsck\s+",
    // ──── Environment ────
    r"export\s+PATH\s*=",
    r"export\s+LD_",
    r"export\s+DYLD_",
    r"export\s+PYTHONPATH\s*=",
    r"unset\s+PATH",
    r"setenv\s+PATH",
    r"alias\s+(ls|rm|cp|mv)\s*=",
    r"hash\s+-r",
];

/// Traversal and home-directory references. Searched anywhere in the raw
/// command, and matched at the start of every argument.
pub const PATH_ESCAPE_PATTERNS: &[&str] = &[
    r"^/",
    r"\.\./",
    r"/\.\.",
    r"~/",
    r"\$HOME",
    r"\$\{HOME\}",
];

/// A compiled pattern together with the source text used in reasons.
#[derive(Debug)]
pub struct CompiledPattern {
    pub source: &'static str,
    pub regex: Regex,
}

/// Every regex the validator needs, compiled once per process.
#[derive(Debug)]
pub struct PatternSet {
    pub dangerous: Vec<CompiledPattern>,
    pub path_escape: Vec<CompiledPattern>,
    /// `PATH_ESCAPE_PATTERNS` anchored at the start of the haystack.
    pub argument_escape: Vec<CompiledPattern>,
}

pub static PATTERNS: Lazy<PatternSet> = Lazy::new(|| PatternSet {
    dangerous: compile_all(DANGEROUS_PATTERNS, |source| {
        RegexBuilder::new(source)
            .case_insensitive(true)
            .multi_line(true)
            .build()
    }),
    path_escape: compile_all(PATH_ESCAPE_PATTERNS, Regex::new),
    argument_escape: compile_all(PATH_ESCAPE_PATTERNS, |source| {
        Regex::new(&format!(r"\A(?:{source})"))
    }),
});

fn compile_all<F>(sources: &'static [&'static str], build: F) -> Vec<CompiledPattern>
where
    F: Fn(&'static str) -> Result<Regex, regex::Error>,
{
    sources
        .iter()
        .filter_map(|&source| match build(source) {
            Ok(regex) => Some(CompiledPattern { source, regex }),
            Err(err) => {
                error!(pattern = source, error = %err, "Failed to compile safety pattern");
                None
            }
        })
        .collect()
}
