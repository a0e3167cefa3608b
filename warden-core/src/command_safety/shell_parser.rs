//! POSIX word splitting for command validation.

/// Split a command into words the way a POSIX shell would, honouring quotes
/// and backslash escapes.
pub fn tokenize(command: &str) -> Result<Vec<String>, shell_words::ParseError> {
    shell_words::split(command)
}

/// The program name with any directory prefix removed.
pub fn command_name(token: &str) -> &str {
    token.rsplit('/').next().unwrap_or(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_quoted_words() {
        let parts = tokenize(r#"grep "hello world" 'a b' c\ d"#).unwrap();
        assert_eq!(parts, vec!["grep", "hello world", "a b", "c d"]);
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        assert!(tokenize("echo 'oops").is_err());
        assert!(tokenize("echo \"oops").is_err());
    }

    #[test]
    fn strips_directory_prefix() {
        assert_eq!(command_name("/usr/bin/sudo"), "sudo");
        assert_eq!(command_name("bin/ls"), "ls");
        assert_eq!(command_name("ls"), "ls");
        assert_eq!(command_name("dir/"), "");
    }
}
