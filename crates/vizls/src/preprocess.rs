//
// preprocess.rs
//
// Line preprocessing for the statement recognizer and chain parser: string
// literals are blanked in place (equal length, so column offsets survive) and
// comments are cut. Metadata blocks are an out-of-band channel delimited by
// comment markers; their contents never reach symbol extraction.
//

/// Marker opening a metadata comment block.
pub const METADATA_START: &str = "VSCODE-META-START";
/// Marker closing a metadata comment block.
pub const METADATA_END: &str = "VSCODE-META-END";

/// Replace every string literal span with spaces of equal length. `""` inside
/// a string is the escaped quote. An unterminated literal blanks the rest of
/// the line; malformed quoting never errors.
pub fn blank_strings(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    let mut in_string = false;
    while let Some(ch) = chars.next() {
        if in_string {
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    // Escaped quote stays inside the literal.
                    chars.next();
                    out.push(' ');
                    out.push(' ');
                } else {
                    in_string = false;
                    out.push('"');
                }
            } else {
                out.push(' ');
            }
        } else if ch == '"' {
            in_string = true;
            out.push('"');
        } else {
            out.push(ch);
        }
    }
    out
}

/// Blank string literals, then truncate at the first unquoted `'`. The
/// returned prefix keeps the original column positions of everything kept.
pub fn strip_line(line: &str) -> String {
    let blanked = blank_strings(line);
    match blanked.find('\'') {
        Some(idx) => blanked[..idx].to_string(),
        None => blanked,
    }
}

/// The comment text of a pure comment line (leading `'` removed), if the line
/// is nothing but a comment.
pub fn comment_text(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    trimmed.strip_prefix('\'').map(|rest| rest.trim())
}

/// True if this line opens a metadata block.
pub fn opens_metadata(line: &str) -> bool {
    comment_text(line).is_some_and(|c| c.contains(METADATA_START))
}

/// True if this line closes a metadata block.
pub fn closes_metadata(line: &str) -> bool {
    comment_text(line).is_some_and(|c| c.contains(METADATA_END))
}

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// The identifier under `column`, with its start and end columns. Expands in
/// both directions from the cursor; a cursor just past the last character of
/// a word still hits that word.
pub fn word_at(line: &str, column: usize) -> Option<(String, usize, usize)> {
    let chars: Vec<char> = line.chars().collect();
    if chars.is_empty() {
        return None;
    }
    let mut idx = column.min(chars.len());
    if idx >= chars.len() || !is_word_char(chars[idx]) {
        // Allow the cursor to sit one past the word's end.
        if idx == 0 || !is_word_char(chars[idx - 1]) {
            return None;
        }
        idx -= 1;
    }
    let mut start = idx;
    while start > 0 && is_word_char(chars[start - 1]) {
        start -= 1;
    }
    let mut end = idx + 1;
    while end < chars.len() && is_word_char(chars[end]) {
        end += 1;
    }
    Some((chars[start..end].iter().collect(), start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn blanks_simple_string() {
        assert_eq!(
            blank_strings("dim s = \"hello\" ' tail"),
            "dim s = \"     \" ' tail"
        );
    }

    #[test]
    fn blanks_escaped_quotes() {
        // `a""b` is four in-string characters, all blanked.
        assert_eq!(blank_strings("x(\"a\"\"b\")"), format!("x(\"{}\")", " ".repeat(4)));
    }

    #[test]
    fn unterminated_string_blanks_rest_of_line() {
        assert_eq!(
            blank_strings("s = \"oops, no close"),
            format!("s = \"{}", " ".repeat("oops, no close".len()))
        );
    }

    #[test]
    fn strip_line_cuts_comment_but_not_quoted_apostrophe() {
        assert_eq!(strip_line("dim x as Integer ' counter"), "dim x as Integer ");
        // The apostrophe inside the string was blanked, so only the real
        // comment truncates.
        assert_eq!(strip_line("s = \"it's\" ' note"), "s = \"    \" ");
    }

    #[test]
    fn metadata_markers_only_match_comment_lines() {
        assert!(opens_metadata("' VSCODE-META-START"));
        assert!(closes_metadata("  ' VSCODE-META-END"));
        assert!(!opens_metadata("dim VSCODE_META_START as Integer"));
    }

    #[test]
    fn word_at_expands_identifier() {
        assert_eq!(
            word_at("System.Scene", 8),
            Some((String::from("Scene"), 7, 12))
        );
        // Cursor at end of word.
        assert_eq!(word_at("dim abc", 7), Some((String::from("abc"), 4, 7)));
        assert_eq!(word_at("   ", 1), None);
    }

    proptest! {
        /// Blanking never changes the character length of a line, so every
        /// later column computation stays valid.
        #[test]
        fn blanking_preserves_length(line in "[ -~]{0,60}") {
            prop_assert_eq!(blank_strings(&line).chars().count(), line.chars().count());
        }

        /// A stripped line is always a prefix-length cut of the blanked line.
        #[test]
        fn strip_never_grows(line in "[ -~]{0,60}") {
            prop_assert!(strip_line(&line).chars().count() <= line.chars().count());
        }
    }
}
