//! Line splitting shared by the three CSV layouts.
//!
//! Quoting is minimal: a double quote toggles "inside quotes", where the delimiter is
//! literal, and the quote itself is dropped. Doubled quotes are not unescaped.

use super::ImportError;

/// Split one data line on `delimiter`, honouring quotes; fields are trimmed
pub fn split_line(line: &str, delimiter: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in line.chars() {
        if ch == '"' {
            in_quotes = !in_quotes;
        } else if ch == delimiter && !in_quotes {
            fields.push(current.trim().to_string());
            current.clear();
        } else {
            current.push(ch);
        }
    }
    fields.push(current.trim().to_string());
    fields
}

/// Header cells: split on every `delimiter`, quotes removed
pub fn split_header(line: &str, delimiter: char) -> Vec<String> {
    line.split(delimiter).map(|h| h.replace('"', "").trim().to_string()).collect()
}

/// Case-insensitive, same length, same order
pub fn header_matches(found: &[String], expected: &[&str]) -> bool {
    found.len() == expected.len() && found.iter().zip(expected).all(|(f, e)| f.eq_ignore_ascii_case(e))
}

/// The header line and the non-blank data lines with their 1-based line numbers
pub struct CsvText<'t> {
    pub header: &'t str,
    pub rows: Vec<(usize, &'t str)>,
}

impl<'t> CsvText<'t> {
    /// # Errors
    ///
    /// `ImportError::TooFewLines` without a header and at least one more line.
    pub fn parse(text: &'t str) -> Result<Self, ImportError> {
        let text = text.trim_start_matches('\u{feff}').trim();
        let lines: Vec<&str> = text.split('\n').collect();
        if lines.len() < 2 {
            return Err(ImportError::TooFewLines);
        }
        let rows = lines
            .iter()
            .enumerate()
            .skip(1)
            .map(|(idx, line)| (idx + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty())
            .collect();
        Ok(Self {
            header: lines[0].trim(),
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_delimiter_is_literal() {
        assert_eq!(
            split_line(r#"01/07/2024,"1.50×120; 2.00×100","Acme, Co",200"#, ','),
            vec!["01/07/2024", "1.50×120; 2.00×100", "Acme, Co", "200"]
        );
    }

    #[test]
    fn test_doubled_quotes_are_not_unescaped() {
        assert_eq!(split_line(r#"a,"say ""hi""",b"#, ','), vec!["a", "say hi", "b"]);
    }

    #[test]
    fn test_tab_delimiter_and_trailing_empty_field() {
        assert_eq!(split_line("a\t b \t", '\t'), vec!["a", "b", ""]);
    }

    #[test]
    fn test_header_matching() {
        let found = split_header(r#""Entry Date", s.no"#, ',');
        assert!(header_matches(&found, &["Entry Date", "S.No"]));
        assert!(!header_matches(&found, &["Entry Date"]));
    }

    #[test]
    fn test_rows_keep_line_numbers() {
        let csv = CsvText::parse("\u{feff}h1,h2\r\na,b\r\n\r\nc,d\r\n").unwrap();
        assert_eq!(csv.header, "h1,h2");
        assert_eq!(csv.rows, vec![(2, "a,b"), (4, "c,d")]);
        assert!(matches!(CsvText::parse("only header\n"), Err(ImportError::TooFewLines)));
    }
}
