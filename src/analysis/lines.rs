/// The source split on `\n`, kept verbatim. Line numbers are 1-based.
#[derive(Debug, Clone)]
pub struct SourceLines {
    lines: Vec<String>,
}

impl SourceLines {
    pub fn new(source: &str) -> Self {
        Self {
            lines: source.split('\n').map(str::to_string).collect(),
        }
    }

    pub fn get(&self, line: usize) -> Option<&str> {
        line.checked_sub(1)
            .and_then(|i| self.lines.get(i))
            .map(String::as_str)
    }

    /// `(line number, text)` pairs in order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.lines
            .iter()
            .enumerate()
            .map(|(i, line)| (i + 1, line.as_str()))
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Text after the first `#` that is not inside a string literal on the
/// same line.
pub fn comment_portion(line: &str) -> Option<&str> {
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in line.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '#' => return Some(&line[i + 1..]),
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_are_verbatim_and_one_based() {
        let lines = SourceLines::new("a = 1  \n\nb\r\n");
        assert_eq!(lines.len(), 4);
        assert_eq!(lines.get(1), Some("a = 1  "));
        assert_eq!(lines.get(3), Some("b\r"));
        assert_eq!(lines.get(0), None);
        assert_eq!(lines.iter().last(), Some((4, "")));
    }

    #[test]
    fn test_comment_portion() {
        assert_eq!(comment_portion("x = 1  # note"), Some(" note"));
        assert_eq!(comment_portion("s = '# not a comment'"), None);
        assert_eq!(comment_portion("s = \"a\\\"#\"  #real"), Some("real"));
        assert_eq!(comment_portion("#"), Some(""));
    }
}
