//! Removal of terminal decoration from journal messages.
//!
//! ethminer writes colour codes and a glyph column (`ℹ`, `m`, `✘` ...)
//! in front of every line. None of it carries meaning, so templates are
//! written against the text that remains after [`strip`].

const ESC: char = '\u{1b}';
const CSI: char = '\u{9b}';
const BEL: char = '\u{07}';

/// Longest token (in chars) treated as a decoration glyph.
const MAX_GLYPH_CHARS: usize = 2;

/// Strips escape sequences and the leading glyph column.
pub fn strip(message: &str) -> String {
    let plain = strip_ansi(message);
    strip_glyph_column(&plain).trim_end().to_string()
}

/// Removes ANSI escape sequences and other control characters.
pub fn strip_ansi(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    let mut chars = message.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            ESC => match chars.next() {
                Some('[') => skip_csi(&mut chars),
                Some(']') => skip_osc(&mut chars),
                // Two-byte escape; the second char is consumed.
                Some(_) | None => {}
            },
            CSI => skip_csi(&mut chars),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }

    out
}

/// CSI: parameter and intermediate bytes, then one final byte in `@..=~`.
fn skip_csi(chars: &mut impl Iterator<Item = char>) {
    for c in chars {
        if ('@'..='~').contains(&c) {
            break;
        }
    }
}

/// OSC: terminated by BEL or by `ESC \`.
fn skip_osc(chars: &mut std::iter::Peekable<impl Iterator<Item = char>>) {
    while let Some(c) = chars.next() {
        match c {
            BEL => break,
            ESC => {
                if chars.peek() == Some(&'\\') {
                    chars.next();
                }
                break;
            }
            _ => {}
        }
    }
}

fn strip_glyph_column(line: &str) -> &str {
    let trimmed = line.trim_start();
    let token_end = trimmed
        .find(char::is_whitespace)
        .unwrap_or(trimmed.len());
    let token = &trimmed[..token_end];
    let rest = trimmed[token_end..].trim_start();

    if !rest.is_empty() && !token.contains('|') && token.chars().count() <= MAX_GLYPH_CHARS {
        rest
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(strip_ansi("hello world"), "hello world");
    }

    #[test]
    fn test_color_codes_removed() {
        let raw = "\u{1b}[32m  m \u{1b}[0m 12:00:01|\u{1b}[1;35methminer\u{1b}[0m";
        assert_eq!(strip_ansi(raw), "  m  12:00:01|ethminer");
    }

    #[test]
    fn test_osc_and_controls_removed() {
        let raw = "\u{1b}]0;title\u{07}a\tb\u{1b}]2;x\u{1b}\\c";
        assert_eq!(strip_ansi(raw), "abc");
    }

    #[test]
    fn test_glyph_column_removed() {
        assert_eq!(
            strip("  ℹ  12:00:03|stratum    B-) Submitted and accepted."),
            "12:00:03|stratum    B-) Submitted and accepted."
        );
        assert_eq!(
            strip("  m  12:00:01|ethminer  Speed"),
            "12:00:01|ethminer  Speed"
        );
    }

    #[test]
    fn test_timestamp_token_kept() {
        assert_eq!(strip("12:00:01|ethminer x"), "12:00:01|ethminer x");
    }

    #[test]
    fn test_long_first_word_kept() {
        assert_eq!(strip("Starting miner"), "Starting miner");
    }

    #[test]
    fn test_lone_token_kept() {
        assert_eq!(strip("  ok  "), "ok");
    }
}
