//! Terminal text sanitization.
//!
//! Everything shown in the transcript ultimately comes from a `tmux
//! capture-pane` of a process we do not control. Raw captures can carry
//! escape sequences that move the cursor, switch screens, touch the
//! clipboard (OSC 52) or restyle the UI, so captured text is scrubbed
//! before it reaches a widget.
//!
//! The scrubber is a single-pass state machine over the input. Plain text
//! takes a fast path and is returned borrowed.

use std::borrow::Cow;

#[derive(Clone, Copy, PartialEq)]
enum ScanState {
    /// Ordinary text; printable characters are kept.
    Plain,
    /// Saw ESC; the next character decides the sequence family.
    Escape,
    /// Inside a CSI sequence; ends at a final byte in `0x40..=0x7E`.
    Csi,
    /// Inside an OSC/DCS/PM/APC/SOS payload; ends at BEL or ST.
    StringSeq,
    /// Saw ESC inside a string payload (possible `ESC \` terminator).
    StringEscape,
}

/// Remove escape sequences and non-printing control characters.
///
/// Keeps `\n` and `\t`. Strips `\r` (a stray carriage return would ride
/// along into transcript cells), every other C0 byte, `DEL`, the C1 range,
/// and complete CSI/OSC/DCS/PM/APC sequences in both their ESC and C1
/// forms. Input with nothing to remove is returned borrowed.
#[must_use]
pub fn sanitize_terminal_text(input: &str) -> Cow<'_, str> {
    if input.chars().all(is_plain) {
        return Cow::Borrowed(input);
    }

    let mut cleaned = String::with_capacity(input.len());
    let mut state = ScanState::Plain;

    for ch in input.chars() {
        state = match state {
            ScanState::Plain => match ch {
                '\u{1b}' => ScanState::Escape,
                // C1 CSI
                '\u{9b}' => ScanState::Csi,
                // C1 DCS / SOS / OSC / PM / APC
                '\u{90}' | '\u{98}' | '\u{9d}' | '\u{9e}' | '\u{9f}' => ScanState::StringSeq,
                _ => {
                    if is_plain(ch) {
                        cleaned.push(ch);
                    }
                    ScanState::Plain
                }
            },
            ScanState::Escape => match ch {
                '[' => ScanState::Csi,
                ']' | 'P' | 'X' | '^' | '_' => ScanState::StringSeq,
                // Intermediate byte: charset designation and similar
                // two-byte tails (`ESC ( B`). Stay and drop the final too.
                '(' | ')' | '*' | '+' | '#' | '%' => ScanState::Escape,
                // Any other single-character sequence ends here.
                _ => ScanState::Plain,
            },
            ScanState::Csi => {
                if ('\u{40}'..='\u{7e}').contains(&ch) {
                    ScanState::Plain
                } else {
                    ScanState::Csi
                }
            }
            ScanState::StringSeq => match ch {
                '\u{07}' | '\u{9c}' => ScanState::Plain,
                '\u{1b}' => ScanState::StringEscape,
                _ => ScanState::StringSeq,
            },
            ScanState::StringEscape => match ch {
                '\\' => ScanState::Plain,
                '\u{1b}' => ScanState::StringEscape,
                _ => ScanState::StringSeq,
            },
        };
    }

    Cow::Owned(cleaned)
}

const fn is_plain(ch: char) -> bool {
    match ch {
        '\n' | '\t' => true,
        '\u{00}'..='\u{1f}' | '\u{7f}'..='\u{9f}' => false,
        _ => true,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_borrowed() {
        let input = "hello world";
        assert!(matches!(
            sanitize_terminal_text(input),
            Cow::Borrowed("hello world")
        ));
    }

    #[test]
    fn keeps_newlines_and_tabs() {
        let input = "line one\n\tindented\n";
        assert!(matches!(sanitize_terminal_text(input), Cow::Borrowed(_)));
    }

    #[test]
    fn strips_carriage_returns() {
        assert_eq!(
            sanitize_terminal_text("line one\roverwrite"),
            "line oneoverwrite"
        );
        assert_eq!(sanitize_terminal_text("crlf\r\nnext"), "crlf\nnext");
    }

    #[test]
    fn strips_color_codes() {
        assert_eq!(
            sanitize_terminal_text("\x1b[31mred\x1b[0m text"),
            "red text"
        );
    }

    #[test]
    fn strips_cursor_movement() {
        assert_eq!(sanitize_terminal_text("a\x1b[2;5Hb\x1b[1Ac"), "abc");
    }

    #[test]
    fn strips_private_mode_sequences() {
        assert_eq!(
            sanitize_terminal_text("\x1b[?1049hswitched\x1b[?1049l"),
            "switched"
        );
    }

    #[test]
    fn strips_osc_title_with_bel_terminator() {
        assert_eq!(sanitize_terminal_text("\x1b]0;evil title\x07safe"), "safe");
    }

    #[test]
    fn strips_osc_with_st_terminator() {
        assert_eq!(
            sanitize_terminal_text("\x1b]52;c;aGVsbG8=\x1b\\after"),
            "after"
        );
    }

    #[test]
    fn strips_dcs_payload() {
        assert_eq!(sanitize_terminal_text("\x1bPq#payload\x1b\\done"), "done");
    }

    #[test]
    fn strips_c1_csi_form() {
        assert_eq!(sanitize_terminal_text("a\u{9b}31mb"), "ab");
    }

    #[test]
    fn strips_c1_osc_form() {
        assert_eq!(sanitize_terminal_text("a\u{9d}0;title\u{9c}b"), "ab");
    }

    #[test]
    fn strips_charset_designation() {
        assert_eq!(sanitize_terminal_text("\x1b(Bplain"), "plain");
    }

    #[test]
    fn strips_single_character_escapes() {
        assert_eq!(sanitize_terminal_text("up\x1bMdown"), "updown");
    }

    #[test]
    fn strips_bare_control_bytes() {
        assert_eq!(sanitize_terminal_text("bell\x07back\x08del\x7f"), "bellbackdel");
    }

    #[test]
    fn escaped_escape_inside_string_still_terminates() {
        assert_eq!(
            sanitize_terminal_text("\x1b]0;x\x1b\x1b\\after"),
            "after"
        );
    }

    #[test]
    fn keeps_box_drawing_and_reply_markers() {
        let input = "╭───╮\n│ ● done │\n╰───╯\n✦ ok";
        assert!(matches!(sanitize_terminal_text(input), Cow::Borrowed(_)));
    }

    #[test]
    fn empty_input_is_borrowed() {
        assert!(matches!(sanitize_terminal_text(""), Cow::Borrowed("")));
    }

    #[test]
    fn mixed_content_keeps_only_text() {
        let input = "\x1b[1mbold\x1b[22m and \x1b]8;;http://x\x07link\x1b]8;;\x07 end";
        assert_eq!(sanitize_terminal_text(input), "bold and link end");
    }
}
