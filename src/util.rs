use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

// the irc tag escape for a space, which sometimes leaks into display names
static ESCAPED_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\s").expect("valid regex"));

pub fn unescape_spaces(input: &str) -> Cow<'_, str> {
    ESCAPED_SPACE.replace_all(input, " ")
}
