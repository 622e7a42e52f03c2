//! Text normalization helpers shared by the splitter and the generation layer.

/// Bold markup delimiter stripped from generated answers.
pub const BOLD_MARKUP: &str = "**";

/// Remove every newline, carriage return and space from a structural element.
pub fn normalize_element(element: &str) -> String {
    element
        .chars()
        .filter(|c| !matches!(c, '\n' | '\r' | ' '))
        .collect()
}

/// Strip literal `**` delimiters from generated text.
pub fn strip_bold_markup(text: &str) -> String {
    text.replace(BOLD_MARKUP, "")
}

/// Collapse blank-line paragraph breaks into single newlines.
pub fn collapse_blank_lines(text: &str) -> String {
    let mut out = text.to_string();
    while out.contains("\n\n") {
        out = out.replace("\n\n", "\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_element() {
        assert_eq!(normalize_element(" a b\nc\r\n "), "abc");
        assert_eq!(normalize_element("   \n"), "");
        assert_eq!(normalize_element("國內 生產\n毛額"), "國內生產毛額");
    }

    #[test]
    fn test_strip_bold_markup() {
        assert_eq!(strip_bold_markup("**GDP** is **gross**"), "GDP is gross");
        assert_eq!(strip_bold_markup("a * b"), "a * b");
        assert_eq!(strip_bold_markup("***"), "*");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\nb"), "a\nb");
        assert_eq!(collapse_blank_lines("a\n\n\n\nb\nc"), "a\nb\nc");
        assert_eq!(collapse_blank_lines("plain"), "plain");
    }
}
