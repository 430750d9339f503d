//! Comment pre-pass: strips `//` and `/* */` comments the way `rc.exe` does,
//! which is *not* the same as a C preprocessor's comment handling — it is
//! string/char-literal aware and happens on text that has already been
//! through the external preprocessor.

/// State of the byte-level scanner. All state-driving bytes are ASCII, so we
/// can scan raw bytes rather than decoded codepoints even though the source
/// may carry a non-ASCII-superset code page; non-ASCII bytes never change
/// state and are copied through unmodified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    SawSlash,
    LineComment,
    BlockComment,
    BlockCommentStar,
    InSingleQuote,
    InSingleQuoteEscape,
    InDoubleQuote,
    InDoubleQuoteEscape,
}

/// Strips comments from `source`, returning the resulting bytes.
///
/// The output is never longer than the input (`remove_comments` only ever
/// drops or shrinks comment runs), so callers that want an in-place
/// transform can overwrite the front of their buffer with the result and
/// truncate to `output.len()`.
pub fn remove_comments(source: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(source.len());
    let mut state = State::Start;
    // Set when a block comment contained at least one newline, so we know
    // whether to fold it into a single space or drop it entirely.
    let mut block_had_newline = false;
    // Set while in `LineComment` when the immediately preceding dropped
    // byte was `\r`, so a CRLF line ending survives comment stripping as
    // `\r\n` rather than just `\n` (spec.md §4.1).
    let mut line_comment_pending_cr = false;

    let mut i = 0;
    while i < source.len() {
        let b = source[i];
        match state {
            State::Start => match b {
                b'/' => state = State::SawSlash,
                b'"' => {
                    state = State::InDoubleQuote;
                    out.push(b);
                }
                b'\'' => {
                    state = State::InSingleQuote;
                    out.push(b);
                }
                _ => out.push(b),
            },
            State::SawSlash => match b {
                b'/' => {
                    state = State::LineComment;
                    line_comment_pending_cr = false;
                }
                b'*' => {
                    state = State::BlockComment;
                    block_had_newline = false;
                }
                _ => {
                    out.push(b'/');
                    // Re-evaluate this byte from `Start`, since it might
                    // itself open a literal or another comment.
                    state = State::Start;
                    continue;
                }
            },
            State::LineComment => {
                if b == b'\n' {
                    // Preserve a preceding \r (it was already dropped along
                    // with the rest of the comment run, so re-emit it) and
                    // the newline itself.
                    if line_comment_pending_cr {
                        out.push(b'\r');
                    }
                    out.push(b'\n');
                    state = State::Start;
                    line_comment_pending_cr = false;
                } else {
                    // Drop the byte, stay in LineComment; remember only
                    // whether it was a `\r` directly preceding the `\n`.
                    line_comment_pending_cr = b == b'\r';
                }
            }
            State::BlockComment => match b {
                b'*' => state = State::BlockCommentStar,
                b'\n' => block_had_newline = true,
                _ => {}
            },
            State::BlockCommentStar => match b {
                b'/' => {
                    if block_had_newline {
                        out.push(b' ');
                    }
                    state = State::Start;
                }
                b'*' => { /* still inside a run of stars, stay here */ }
                b'\n' => {
                    block_had_newline = true;
                    state = State::BlockComment;
                }
                _ => state = State::BlockComment,
            },
            State::InDoubleQuote => match b {
                b'\\' => {
                    state = State::InDoubleQuoteEscape;
                    out.push(b);
                }
                b'"' => {
                    state = State::Start;
                    out.push(b);
                }
                b'\n' => {
                    // A bare newline terminates the literal at the lexical
                    // layer, per rc.exe's quirky behavior.
                    state = State::Start;
                    out.push(b);
                }
                _ => out.push(b),
            },
            State::InDoubleQuoteEscape => {
                out.push(b);
                state = State::InDoubleQuote;
            }
            State::InSingleQuote => match b {
                b'\\' => {
                    state = State::InSingleQuoteEscape;
                    out.push(b);
                }
                b'\'' => {
                    state = State::Start;
                    out.push(b);
                }
                b'\n' => {
                    state = State::Start;
                    out.push(b);
                }
                _ => out.push(b),
            },
            State::InSingleQuoteEscape => {
                out.push(b);
                state = State::InSingleQuote;
            }
        }
        i += 1;
    }

    // A dangling `/` at EOF (never resolved into `//` or `/*`) is just a
    // literal slash.
    if state == State::SawSlash {
        out.push(b'/');
    }

    debug_assert!(out.len() <= source.len());
    out
}

#[cfg(test)]
mod tests {
    use super::remove_comments;

    fn strip(s: &str) -> String {
        String::from_utf8(remove_comments(s.as_bytes())).unwrap()
    }

    #[test]
    fn same_line_block_comment_drops_entirely() {
        assert_eq!(strip("blah/**/blah"), "blahblah");
    }

    #[test]
    fn multi_line_block_comment_folds_to_space() {
        assert_eq!(strip("blah/*\n*/blah"), "blah blah");
    }

    #[test]
    fn line_comment_preserves_newline() {
        assert_eq!(strip("//c\nA RCDATA {1}"), "\nA RCDATA {1}");
    }

    #[test]
    fn line_comment_preserves_preceding_cr() {
        let out = remove_comments(b"foo//c\r\nbar");
        assert_eq!(out, b"foo\r\nbar");
    }

    #[test]
    fn comment_markers_inert_inside_double_quoted_string() {
        assert_eq!(strip(r#""a // b /* c */ d""#), r#""a // b /* c */ d""#);
    }

    #[test]
    fn comment_markers_inert_inside_single_quoted_literal() {
        assert_eq!(strip("'// not a comment'"), "'// not a comment'");
    }

    #[test]
    fn backslash_escapes_next_byte_in_string() {
        assert_eq!(strip(r#""a\"b" // tail"#), "\"a\\\"b\" ");
    }

    #[test]
    fn bare_newline_terminates_string_literal() {
        // The closing quote is missing because the newline already reset
        // the state back to Start; a `//` after the (implicitly closed)
        // literal is then treated as a real comment.
        assert_eq!(strip("\"abc\n// comment\nrest"), "\"abc\n\nrest");
    }

    #[test]
    fn output_never_exceeds_input_length() {
        for s in [
            "",
            "no comments here",
            "/* unterminated",
            "// unterminated",
            "a/*b*/c/*\nd*/e//f",
        ] {
            assert!(remove_comments(s.as_bytes()).len() <= s.len());
        }
    }

    #[test]
    fn idempotent() {
        for s in ["a/*b*/c", "x//y\nz", "\"lit // not comment\""] {
            let once = remove_comments(s.as_bytes());
            let twice = remove_comments(&once);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn dangling_slash_at_eof_is_preserved() {
        assert_eq!(strip("abc/"), "abc/");
    }
}
