use super::*;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn reject(command: &str) -> (ViolationCategory, String) {
    match CommandSafetyValidator::new().validate(command) {
        ValidationResult::Unsafe { category, reason } => (category, reason),
        ValidationResult::Safe => panic!("expected `{command}` to be rejected"),
    }
}

fn assert_safe(command: &str) {
    assert_eq!(
        CommandSafetyValidator::new().validate(command),
        ValidationResult::Safe,
        "expected `{command}` to be allowed"
    );
}

#[test]
fn ordinary_commands_are_allowed() {
    assert_safe("echo hello");
    assert_safe("ls -la");
    assert_safe("grep -n foo notes.txt | sort | uniq -c");
    assert_safe("cat a.txt | wc -l");
    assert_safe("echo $(date)");
}

#[test]
fn blank_commands_are_safe() {
    assert_safe("");
    assert_safe("   \n\t");
}

#[test]
fn rm_rf_root_reports_the_pattern() {
    let (category, reason) = reject("rm -rf /");
    assert_eq!(category, ViolationCategory::DangerousPattern);
    assert_eq!(reason, r"Dangerous command pattern detected: rm\s+-rf\s+/");
}

#[test]
fn dangerous_patterns_ignore_case() {
    let (category, reason) = reject("SHUTDOWN -h now");
    assert_eq!(category, ViolationCategory::DangerousPattern);
    assert_eq!(reason, "Dangerous command pattern detected: shutdown");
}

#[test]
fn sudo_is_caught_by_the_pattern_scan() {
    let (category, _) = reject("sudo ls");
    assert_eq!(category, ViolationCategory::DangerousPattern);
}

#[test]
fn raw_path_escapes() {
    assert_eq!(
        reject("cat ../secret.txt"),
        (
            ViolationCategory::PathEscape,
            r"Path escape attempt detected: \.\./".to_owned()
        )
    );
    assert_eq!(
        reject("/bin/ls").1,
        "Path escape attempt detected: ^/".to_owned()
    );
    assert_eq!(
        reject("echo $HOME").1,
        r"Path escape attempt detected: \$HOME".to_owned()
    );
}

#[test]
fn malformed_quotes_are_rejected() {
    let (category, reason) = reject("echo 'unterminated");
    assert_eq!(category, ViolationCategory::MalformedQuoting);
    assert!(reason.starts_with("Command parsing failed (possibly malformed quotes): "));
}

#[test]
fn privileged_binaries_are_rejected_with_or_without_prefix() {
    assert_eq!(
        reject("doas ls"),
        (
            ViolationCategory::PrivilegedCommand,
            "Privileged command not allowed: doas".to_owned()
        )
    );
    assert_eq!(
        reject("bin/cargo build").1,
        "Privileged command not allowed: cargo"
    );
}

#[test]
fn dangerous_flags_are_rejected() {
    assert_eq!(
        reject("rm -r build"),
        (
            ViolationCategory::DangerousFlag,
            "Dangerous flag '-r' not allowed with command 'rm'".to_owned()
        )
    );
    assert_eq!(
        reject("find . -name tmp -delete").1,
        "Dangerous flag '-delete' not allowed with command 'find'"
    );
}

#[test]
fn rm_flag_matching_is_substring_based() {
    // File names containing a flag spelling are refused too.
    assert_eq!(
        reject("rm notes-final.txt").1,
        "Dangerous flag '-f' not allowed with command 'rm'"
    );
    assert_safe("rm notes.txt");
}

#[test]
fn absolute_arguments_are_rejected() {
    assert_eq!(
        reject("cat /etc/passwd"),
        (
            ViolationCategory::PathEscape,
            "Path escape attempt in argument: /etc/passwd".to_owned()
        )
    );
    assert_eq!(
        reject(r#"cat "/tmp/notes""#).1,
        "Path escape attempt in argument: /tmp/notes"
    );
}

#[test]
fn chaining_limit_is_ten_operators() {
    let ten = (1..=11)
        .map(|n| format!("echo {n}"))
        .collect::<Vec<_>>()
        .join("; ");
    let eleven = (1..=12)
        .map(|n| format!("echo {n}"))
        .collect::<Vec<_>>()
        .join("; ");

    assert_safe(&ten);
    assert_eq!(
        reject(&eleven),
        (
            ViolationCategory::Structure,
            "Excessive command chaining detected (potential DoS)".to_owned()
        )
    );
}

#[test]
fn pipe_limit_is_twenty() {
    let twenty = format!("echo a{}", " | cat".repeat(20));
    let twenty_one = format!("echo a{}", " | cat".repeat(21));

    assert_safe(&twenty);
    assert_eq!(
        reject(&twenty_one),
        (
            ViolationCategory::Structure,
            "Excessive pipe usage detected (potential resource exhaustion)".to_owned()
        )
    );
}

#[test]
fn nesting_limit_is_ten() {
    assert_safe(&format!("echo {}{}", "(".repeat(10), ")".repeat(10)));
    assert_eq!(
        reject(&format!("echo {}{}", "(".repeat(11), ")".repeat(11))).1,
        "Excessive command nesting detected"
    );
}

#[test]
fn obfuscation_is_rejected() {
    assert_eq!(
        reject("echo aGk= | base64 -d"),
        (
            ViolationCategory::Obfuscation,
            "Base64 decoding detected (potential obfuscated command)".to_owned()
        )
    );
    assert_eq!(
        reject("iconv -f utf8 notes.txt").1,
        "Character encoding manipulation detected"
    );

    let quoted = format!("echo{}", r#" "x""#.repeat(11));
    assert_eq!(
        reject(&quoted).1,
        "Excessive character escaping detected (potential obfuscation)"
    );
}

#[test]
fn resource_heuristics() {
    assert_eq!(
        reject("dd if=in.bin of=out.bin bs=1M count=10000000"),
        (
            ViolationCategory::ResourceHeuristic,
            "Large dd operation without reasonable limits".to_owned()
        )
    );
    assert_safe("dd if=in.bin of=out.bin bs=1M count=10");
    assert_eq!(
        reject("stress --cpu 8").1,
        "Memory-intensive command 'stress' not allowed"
    );
}

#[test]
fn piping_into_a_shell_is_rejected() {
    assert_eq!(
        reject("cat install.txt | sh"),
        (
            ViolationCategory::ShellPipe,
            "Piping to shell interpreter not allowed".to_owned()
        )
    );
    assert_safe("cat notes.txt | sha256sum");
}

#[test]
fn substitutions_naming_dangerous_programs_are_rejected() {
    assert_eq!(
        reject("echo $(cat rmlist)"),
        (
            ViolationCategory::CommandSubstitution,
            "Dangerous command substitution detected".to_owned()
        )
    );
}

#[test]
fn redirects_into_system_directories_are_rejected() {
    assert_eq!(
        reject("echo hi>/dev/null"),
        (
            ViolationCategory::SensitiveRedirect,
            "Redirection to sensitive path: /dev/null".to_owned()
        )
    );
    assert_safe("echo hi > out.txt");
}

#[test]
fn free_functions_use_the_default_validator() {
    assert_eq!(
        validate_command("ls"),
        CommandSafetyValidator::new().validate("ls")
    );
    assert!(is_dangerous_operation("rm -rf /"));
    assert!(!is_dangerous_operation("echo hello"));
}

proptest! {
    #[test]
    fn verdicts_are_deterministic(command in ".{0,80}") {
        let validator = CommandSafetyValidator::new();
        prop_assert_eq!(validator.validate(&command), validator.validate(&command));
    }

    #[test]
    fn unsafe_verdicts_always_explain_themselves(command in ".{0,80}") {
        let verdict = validate_command(&command);
        prop_assert_eq!(verdict.is_safe(), verdict.reason().is_none());
        if let Some(reason) = verdict.reason() {
            prop_assert!(!reason.is_empty());
        }
    }
}
