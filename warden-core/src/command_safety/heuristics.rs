//! Structural, obfuscation and resource heuristics.
//!
//! Each check returns the rejection reason for the first rule that fires.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use tracing::error;

const MAX_CHAIN_OPERATORS: usize = 10;
const MAX_PIPES: usize = 20;
const MAX_NESTING_DEPTH: usize = 10;
/// A character followed by this many copies of itself is suspicious.
const MAX_REPEATS: usize = 50;
const MAX_ESCAPE_CHARS: usize = 20;
const MAX_DD_COUNT_DIGITS: usize = 6;
const MAX_REDIRECT_DIGITS: usize = 2;

const MEMORY_INTENSIVE_COMMANDS: &[&str] = &["stress", "stress-ng", "memtester", "yes"];

/// Commands that make a substitution dangerous when they appear anywhere in
/// the text.
const SUBSTITUTION_BLOCKLIST: &[&str] = &[
    "rm", "dd", "mkfs", "sudo", "su", "curl", "wget", "nc", "netcat", "ssh", "scp", "rsync",
];

const SENSITIVE_PREFIXES: &[&str] = &["/dev/", "/proc/", "/sys/", "/boot/", "/etc/"];
const REDIRECT_OPERATORS: &[&str] = &[">", ">>", "<"];

fn compile(source: &str, case_insensitive: bool) -> Option<Regex> {
    match RegexBuilder::new(source)
        .case_insensitive(case_insensitive)
        .build()
    {
        Ok(regex) => Some(regex),
        Err(err) => {
            error!(pattern = source, error = %err, "Failed to compile heuristic pattern");
            None
        }
    }
}

static BASE64_DECODE: Lazy<Option<Regex>> =
    Lazy::new(|| compile(r"base64\s+(-d|--decode)", true));
static XXD_REVERSE: Lazy<Option<Regex>> = Lazy::new(|| compile(r"xxd\s+-r", false));
static HEX_TOOLS: Lazy<Option<Regex>> = Lazy::new(|| compile(r"hex(dump|2bin)", false));
static ENCODING_TOOLS: Lazy<Option<Regex>> = Lazy::new(|| compile(r"iconv|recode|uconv", false));

// Everything up to and including `count=` / `--max-redirect=`, ending at the
// end of the haystack. The digits that follow are inspected by hand.
static DD_PREFIX: Lazy<Option<Regex>> = Lazy::new(|| compile(r"dd\s+.*bs=.*count=\z", false));
static DD_COUNT: Lazy<Option<Regex>> = Lazy::new(|| compile(r"count=(\d+)", false));
static REDIRECT_PREFIX: Lazy<Option<Regex>> =
    Lazy::new(|| compile(r"(wget|curl)\s+.*--max-redirect=\z", false));
static REDIRECT_LIMIT: Lazy<Option<Regex>> = Lazy::new(|| compile(r"--max-redirect=(\d+)", false));

static MEMORY_INTENSIVE: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    MEMORY_INTENSIVE_COMMANDS
        .iter()
        .filter_map(|&name| {
            compile(&format!(r"\b{}\b", regex::escape(name)), false).map(|regex| (name, regex))
        })
        .collect()
});

static SHELL_PIPE: Lazy<Option<Regex>> = Lazy::new(|| compile(r"\|\s*(sh|bash|zsh|fish)\b", false));
static BACKTICK_SUBSTITUTION: Lazy<Option<Regex>> = Lazy::new(|| compile(r"`[^`]*`", false));
static DOLLAR_SUBSTITUTION: Lazy<Option<Regex>> = Lazy::new(|| compile(r"\$\([^)]*\)", false));

static REDIRECT_TARGETS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    REDIRECT_OPERATORS
        .iter()
        .filter_map(|&op| {
            compile(&format!(r"{}\s*([^\s;&|]+)", regex::escape(op)), false).map(|regex| (op, regex))
        })
        .collect()
});

fn hit(regex: &Lazy<Option<Regex>>, haystack: &str) -> bool {
    regex
        .as_ref()
        .is_some_and(|regex| regex.is_match(haystack))
}

/// Chaining, pipe, nesting and repetition limits.
pub fn check_structure(command: &str) -> Option<&'static str> {
    let chain_count =
        command.matches(';').count() + command.matches("&&").count() + command.matches("||").count();
    if chain_count > MAX_CHAIN_OPERATORS {
        return Some("Excessive command chaining detected (potential DoS)");
    }

    if command.matches('|').count() > MAX_PIPES {
        return Some("Excessive pipe usage detected (potential resource exhaustion)");
    }

    if max_nesting_depth(command) > MAX_NESTING_DEPTH {
        return Some("Excessive command nesting detected");
    }

    if longest_repeat_run(command) > MAX_REPEATS {
        return Some("Suspicious character repetition detected");
    }

    None
}

fn max_nesting_depth(command: &str) -> usize {
    let mut depth = 0usize;
    let mut max_depth = 0usize;
    for ch in command.chars() {
        match ch {
            '(' => {
                depth += 1;
                max_depth = max_depth.max(depth);
            }
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    max_depth
}

/// Length of the longest run of one repeated character. Newlines never form
/// a run.
fn longest_repeat_run(command: &str) -> usize {
    let mut longest = 0usize;
    let mut current = 0usize;
    let mut previous: Option<char> = None;

    for ch in command.chars() {
        if ch == '\n' {
            current = 0;
            previous = None;
            continue;
        }
        if previous == Some(ch) {
            current += 1;
        } else {
            current = 1;
            previous = Some(ch);
        }
        longest = longest.max(current);
    }

    longest
}

/// Encoded payloads and heavy escaping.
pub fn check_obfuscation(command: &str) -> Option<&'static str> {
    if hit(&BASE64_DECODE, command) {
        return Some("Base64 decoding detected (potential obfuscated command)");
    }

    if hit(&XXD_REVERSE, command) || hit(&HEX_TOOLS, command) {
        return Some("Hex decoding detected (potential obfuscated command)");
    }

    let escape_count = command
        .chars()
        .filter(|&ch| matches!(ch, '\\' | '"' | '\''))
        .count();
    if escape_count > MAX_ESCAPE_CHARS {
        return Some("Excessive character escaping detected (potential obfuscation)");
    }

    if hit(&ENCODING_TOOLS, command) {
        return Some("Character encoding manipulation detected");
    }

    None
}

/// Commands that are likely to exhaust memory, disk or network.
pub fn check_resources(command: &str) -> Option<String> {
    if has_oversized_number(command, &DD_PREFIX, &DD_COUNT, MAX_DD_COUNT_DIGITS) {
        return Some("Large dd operation without reasonable limits".to_owned());
    }

    if let Some((name, _)) = MEMORY_INTENSIVE
        .iter()
        .find(|(_, regex)| regex.is_match(command))
    {
        return Some(format!("Memory-intensive command '{name}' not allowed"));
    }

    if has_oversized_number(command, &REDIRECT_PREFIX, &REDIRECT_LIMIT, MAX_REDIRECT_DIGITS) {
        return Some("Network operation with excessive redirects".to_owned());
    }

    None
}

/// True when some `key=<digits>` occurrence preceded by `prefix` on the same
/// line carries a number that is too long, or runs straight into a word
/// character (`count=10k`).
fn has_oversized_number(
    command: &str,
    prefix: &Lazy<Option<Regex>>,
    number: &Lazy<Option<Regex>>,
    max_digits: usize,
) -> bool {
    let (Some(prefix), Some(number)) = (prefix.as_ref(), number.as_ref()) else {
        return false;
    };

    number.captures_iter(command).any(|caps| {
        let Some(digits) = caps.get(1) else {
            return false;
        };
        let oversized = digits.as_str().chars().count() > max_digits
            || command
                .get(digits.end()..)
                .and_then(|rest| rest.chars().next())
                .is_some_and(|next| next.is_alphanumeric() || next == '_');
        oversized
            && command
                .get(..digits.start())
                .is_some_and(|head| prefix.is_match(head))
    })
}

/// Output piped straight into a shell interpreter.
pub fn pipes_into_shell(joined_tokens: &str) -> bool {
    hit(&SHELL_PIPE, joined_tokens)
}

/// Command substitution whose text names a blocklisted program.
pub fn has_dangerous_substitution(command: &str) -> bool {
    let substitutes =
        hit(&BACKTICK_SUBSTITUTION, command) || hit(&DOLLAR_SUBSTITUTION, command);
    substitutes
        && SUBSTITUTION_BLOCKLIST
            .iter()
            .any(|needle| command.contains(needle))
}

/// First redirect whose target sits under a sensitive system directory.
pub fn sensitive_redirect_target(command: &str) -> Option<String> {
    REDIRECT_TARGETS
        .iter()
        .filter(|(op, _)| command.contains(op))
        .flat_map(|(_, regex)| regex.captures_iter(command))
        .filter_map(|caps| caps.get(1))
        .map(|target| target.as_str())
        .find(|target| {
            SENSITIVE_PREFIXES
                .iter()
                .any(|prefix| target.starts_with(prefix))
        })
        .map(str::to_owned)
}
