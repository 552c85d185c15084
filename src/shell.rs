// ABOUTME: POSIX shell quoting for remote command construction.
// ABOUTME: Every path or user-supplied word interpolated into a remote command goes through `quote`.

/// Quote a word for a POSIX shell using single quotes.
pub fn quote(word: &str) -> String {
    if !word.is_empty()
        && word
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"/._-:@%+=,".contains(&b))
    {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', "'\\''"))
}

/// Join a parent directory and a child name with exactly one slash.
pub fn join(parent: &str, child: &str) -> String {
    format!("{}/{}", parent.trim_end_matches('/'), child.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_words_pass_through() {
        assert_eq!(quote("/srv/app/releases/20240101000000"), "/srv/app/releases/20240101000000");
        assert_eq!(quote("main"), "main");
    }

    #[test]
    fn specials_are_single_quoted() {
        assert_eq!(quote(""), "''");
        assert_eq!(quote("a b"), "'a b'");
        assert_eq!(quote("it's"), "'it'\\''s'");
        assert_eq!(quote("$(reboot)"), "'$(reboot)'");
    }

    #[test]
    fn join_normalises_slashes() {
        assert_eq!(join("/srv/app/", "releases"), "/srv/app/releases");
        assert_eq!(join("/srv/app", "/current"), "/srv/app/current");
    }
}
