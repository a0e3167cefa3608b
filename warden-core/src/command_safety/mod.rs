//! Command safety validation
//!
//! Every command passes a fixed pipeline before it may run. The first stage
//! that objects decides the verdict and its reason:
//!
//! 1. Dangerous-pattern scan (destructive, exhausting or escalating shapes)
//! 2. Raw path-escape scan (`../`, `~/`, `$HOME`, leading `/`)
//! 3. POSIX tokenisation (malformed quoting is refused)
//! 4. Privileged binaries (`sudo`, package managers, `systemctl`, ...)
//! 5. Per-command flag blocklists (`rm -r`, `find -exec`, ...)
//! 6. Per-argument path escapes
//! 7. Structural limits (chaining, pipes, nesting, repetition)
//! 8. Obfuscation (base64/hex decoding, heavy escaping, re-encoding)
//! 9. Resource heuristics (`dd`, memory hogs, redirect loops)
//! 10. Pipes into a shell interpreter
//! 11. Command substitution naming a dangerous program
//! 12. Redirects into system directories
//!
//! The validator is pure: the same command always gets the same verdict.

pub mod audit;
pub mod heuristics;
pub mod patterns;
pub mod privileged;
pub mod shell_parser;

#[cfg(test)]
mod tests;

use once_cell::sync::Lazy;

pub use audit::{AuditEntry, SafetyAuditLogger};
pub use patterns::{DANGEROUS_PATTERNS, PATH_ESCAPE_PATTERNS};
pub use privileged::{DANGEROUS_COMMAND_FLAGS, PRIVILEGED_COMMANDS};

use crate::validation::{ValidationResult, ViolationCategory};
use patterns::{PatternSet, PATTERNS};

static DEFAULT_VALIDATOR: Lazy<CommandSafetyValidator> = Lazy::new(CommandSafetyValidator::new);

/// Stateless command validator backed by process-wide compiled patterns.
#[derive(Debug, Clone, Copy)]
pub struct CommandSafetyValidator {
    patterns: &'static PatternSet,
}

impl Default for CommandSafetyValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandSafetyValidator {
    pub fn new() -> Self {
        Self {
            patterns: &PATTERNS,
        }
    }

    /// Run the full pipeline. Blank commands are safe.
    pub fn validate(&self, command: &str) -> ValidationResult {
        let command = command.trim();
        if command.is_empty() {
            return ValidationResult::Safe;
        }

        if let Some(pattern) = self
            .patterns
            .dangerous
            .iter()
            .find(|pattern| pattern.regex.is_match(command))
        {
            return ValidationResult::unsafe_because(
                ViolationCategory::DangerousPattern,
                format!("Dangerous command pattern detected: {}", pattern.source),
            );
        }

        if let Some(pattern) = self
            .patterns
            .path_escape
            .iter()
            .find(|pattern| pattern.regex.is_match(command))
        {
            return ValidationResult::unsafe_because(
                ViolationCategory::PathEscape,
                format!("Path escape attempt detected: {}", pattern.source),
            );
        }

        let parts = match shell_parser::tokenize(command) {
            Ok(parts) => parts,
            Err(err) => {
                return ValidationResult::unsafe_because(
                    ViolationCategory::MalformedQuoting,
                    format!("Command parsing failed (possibly malformed quotes): {err}"),
                );
            }
        };

        let Some((first, args)) = parts.split_first() else {
            return ValidationResult::Safe;
        };

        let name = shell_parser::command_name(first);
        if privileged::is_privileged(name) {
            return ValidationResult::unsafe_because(
                ViolationCategory::PrivilegedCommand,
                format!("Privileged command not allowed: {name}"),
            );
        }

        if let Some(flag) = privileged::find_dangerous_flag(name, &args.join(" ")) {
            return ValidationResult::unsafe_because(
                ViolationCategory::DangerousFlag,
                format!("Dangerous flag '{flag}' not allowed with command '{name}'"),
            );
        }

        if let Some(arg) = args.iter().find(|arg| {
            self.patterns
                .argument_escape
                .iter()
                .any(|pattern| pattern.regex.is_match(arg))
        }) {
            return ValidationResult::unsafe_because(
                ViolationCategory::PathEscape,
                format!("Path escape attempt in argument: {arg}"),
            );
        }

        if let Some(reason) = heuristics::check_structure(command) {
            return ValidationResult::unsafe_because(ViolationCategory::Structure, reason);
        }

        if let Some(reason) = heuristics::check_obfuscation(command) {
            return ValidationResult::unsafe_because(ViolationCategory::Obfuscation, reason);
        }

        if let Some(reason) = heuristics::check_resources(command) {
            return ValidationResult::unsafe_because(ViolationCategory::ResourceHeuristic, reason);
        }

        if heuristics::pipes_into_shell(&parts.join(" ")) {
            return ValidationResult::unsafe_because(
                ViolationCategory::ShellPipe,
                "Piping to shell interpreter not allowed",
            );
        }

        if heuristics::has_dangerous_substitution(command) {
            return ValidationResult::unsafe_because(
                ViolationCategory::CommandSubstitution,
                "Dangerous command substitution detected",
            );
        }

        if let Some(target) = heuristics::sensitive_redirect_target(command) {
            return ValidationResult::unsafe_because(
                ViolationCategory::SensitiveRedirect,
                format!("Redirection to sensitive path: {target}"),
            );
        }

        ValidationResult::Safe
    }
}

/// Validate with the shared default validator.
pub fn validate_command(command: &str) -> ValidationResult {
    DEFAULT_VALIDATOR.validate(command)
}

/// Shorthand for `!validate_command(command).is_safe()`.
pub fn is_dangerous_operation(command: &str) -> bool {
    !validate_command(command).is_safe()
}
