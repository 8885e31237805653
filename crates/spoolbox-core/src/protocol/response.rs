//! Reply generation
//!
//! Replies are plain newline-terminated UTF-8 text.

/// Reply builder
pub struct Reply;

impl Reply {
    /// Banner sent once per connection, before the first command
    pub fn greeting() -> String {
        "Welcome to spoolbox!\nCommands: LOGIN, SEND, LIST, READ, DEL, QUIT\n".to_string()
    }

    /// Positive reply
    pub fn ok() -> String {
        "OK\n".to_string()
    }

    /// Negative reply
    pub fn err() -> String {
        "ERR\n".to_string()
    }

    /// READ reply: status line followed by the stored body
    pub fn ok_with_body(body: &str) -> String {
        format!("OK\n{}\n", body)
    }

    /// LIST reply: message count followed by one subject per line
    pub fn listing(subjects: &[String]) -> String {
        let mut out = format!("{}\n", subjects.len());
        for subject in subjects {
            out.push_str(subject);
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ok_err() {
        assert_eq!(Reply::ok(), "OK\n");
        assert_eq!(Reply::err(), "ERR\n");
    }

    #[test]
    fn test_ok_with_body() {
        assert_eq!(Reply::ok_with_body("Hi"), "OK\nHi\n");
        assert_eq!(Reply::ok_with_body("a\nb"), "OK\na\nb\n");
    }

    #[test]
    fn test_listing() {
        assert_eq!(Reply::listing(&[]), "0\n");
        assert_eq!(Reply::listing(&["Hello".to_string()]), "1\nHello\n");
        assert_eq!(
            Reply::listing(&["a".to_string(), "b".to_string()]),
            "2\na\nb\n"
        );
    }

    #[test]
    fn test_greeting_is_two_lines() {
        assert_eq!(Reply::greeting().matches('\n').count(), 2);
    }
}
