/// Tidies printed source: trailing whitespace is trimmed from every line, runs of blank lines
/// collapse to one, leading and trailing blank lines are dropped, and non-empty output ends in
/// exactly one newline. Also applied to the raw input when it cannot be parsed.
pub(crate) fn normalize(source: &str) -> String {
    let mut output = String::with_capacity(source.len());
    let mut pending_blank = false;

    for line in source.lines().map(str::trim_end) {
        if line.is_empty() {
            pending_blank = !output.is_empty();
            continue;
        }
        if pending_blank {
            output.push('\n');
            pending_blank = false;
        }
        output.push_str(line);
        output.push('\n');
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("\n \n\t\n"), "");
    }

    #[test]
    fn test_normalize_collapses_blank_lines() {
        assert_eq!(normalize("\n\na = 1  \n\n\n\nb = 2\n\n"), "a = 1\n\nb = 2\n");
    }

    #[test]
    fn test_normalize_adds_trailing_newline() {
        assert_eq!(normalize("{{{"), "{{{\n");
    }

    #[test]
    fn test_normalize_handles_crlf() {
        assert_eq!(normalize("a = 1\r\n\r\nb = 2\r\n"), "a = 1\n\nb = 2\n");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize("x\n\n\n  \ny   \n");
        assert_eq!(normalize(&once), once);
    }
}
