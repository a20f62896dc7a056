// SPDX-License-Identifier: MIT

use once_cell::sync::Lazy;
use regex::Regex;

static INLINE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\u{00A0}]+").unwrap());
static BLANK_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Normalise extracted text before segmentation.
///
/// Line endings become `\n`, control characters are dropped, runs of
/// spaces collapse to one, trailing spaces are trimmed per line and more
/// than one blank line in a row collapses to a single blank line.
/// The result is trimmed and always ends without a newline.
pub fn clean_text(raw: &str) -> String {
    let normalised = raw.replace("\r\n", "\n").replace('\r', "\n");
    let printable: String = normalised
        .chars()
        .filter(|c| *c == '\n' || *c == '\t' || !c.is_control())
        .collect();

    let lines: Vec<String> = printable
        .lines()
        .map(|line| INLINE_SPACES.replace_all(line, " ").trim().to_string())
        .collect();

    BLANK_RUNS
        .replace_all(&lines.join("\n"), "\n\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_normalises_whitespace() {
        let raw = "  Jane   Doe\r\n\r\n\r\n\r\nEDUCATION\t:\u{0007}\n  MIT  ";
        assert_eq!(clean_text(raw), "Jane Doe\n\nEDUCATION :\nMIT");
    }

    #[test]
    fn test_clean_text_is_idempotent() {
        let raw = "A\n\n\n\nB   C\r\nD";
        let once = clean_text(raw);
        assert_eq!(clean_text(&once), once);
    }
}
