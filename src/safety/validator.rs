//! Read-only validation rules.
//!
//! Rules run in a fixed order and the first failure wins:
//! emptiness, leading keyword, keyword deny-list, single statement.
//! Accepted queries are then normalized with a row cap.

use super::lexer::{self, has_unicode_escape, leading_word, words, Scan};
use super::{Rejection, Verdict, BLOCKED_KEYWORDS, MAX_ROWS};

/// Deny-list entry reported for `U&` Unicode-escape literals, which can
/// spell any identifier without its letters appearing in the text.
const UNICODE_ESCAPE: &str = "U&";

/// Validator that decides whether SQL text is a single read-only statement.
#[derive(Debug, Clone)]
pub struct QueryValidator {
    /// Deny-list entries as upper-cased adjacent-word sequences.
    blocked: Vec<Vec<String>>,
}

impl Default for QueryValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryValidator {
    /// Creates a validator with the built-in deny-list.
    pub fn new() -> Self {
        Self {
            blocked: BLOCKED_KEYWORDS.iter().map(|k| split_keyword(k)).collect(),
        }
    }

    /// Extends the deny-list with additional keywords.
    ///
    /// Keywords containing whitespace are matched as adjacent words.
    pub fn with_extra_keywords<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for keyword in extra {
            let parts = split_keyword(keyword.as_ref());
            if !parts.is_empty() && !self.blocked.contains(&parts) {
                self.blocked.push(parts);
            }
        }
        self
    }

    /// Returns the deny-list as display strings.
    pub fn blocked_keywords(&self) -> impl Iterator<Item = String> + '_ {
        self.blocked.iter().map(|parts| parts.join(" "))
    }

    /// Validates SQL text, returning the normalized query or the failed rule.
    pub fn validate(&self, sql: &str) -> Verdict {
        match self.check(sql) {
            Ok(query) => Verdict::Accepted(query),
            Err(rejection) => Verdict::Rejected(rejection),
        }
    }

    fn check(&self, sql: &str) -> Result<String, Rejection> {
        let trimmed = sql.trim();
        if trimmed.is_empty() {
            return Err(Rejection::Empty);
        }

        if !starts_with_read_keyword(trimmed) {
            return Err(Rejection::NotReadStatement);
        }

        if has_unicode_escape(trimmed) {
            return Err(Rejection::BlockedKeyword(UNICODE_ESCAPE.to_string()));
        }

        if let Some(keyword) = self.first_blocked_keyword(trimmed) {
            return Err(Rejection::BlockedKeyword(keyword));
        }

        let scan = lexer::scan(trimmed);
        if scan.unterminated {
            return Err(Rejection::UnterminatedLiteral);
        }

        // Only a semicolon in the very last position is allowed
        let last = trimmed.len() - 1;
        if scan.semicolons.iter().any(|&pos| pos != last) {
            return Err(Rejection::MultipleStatements);
        }

        Ok(apply_row_cap(trimmed, &scan))
    }

    /// Finds the first deny-listed keyword in text order.
    fn first_blocked_keyword(&self, sql: &str) -> Option<String> {
        let words: Vec<&str> = words(sql).collect();

        (0..words.len()).find_map(|start| {
            self.blocked
                .iter()
                .find(|parts| {
                    let window = &words[start..];
                    window.len() >= parts.len()
                        && parts
                            .iter()
                            .zip(window)
                            .all(|(part, word)| word.eq_ignore_ascii_case(part))
                })
                .map(|parts| parts.join(" "))
        })
    }
}

/// Validates SQL text with the built-in deny-list.
pub fn validate_query(sql: &str) -> Verdict {
    QueryValidator::new().validate(sql)
}

fn split_keyword(keyword: &str) -> Vec<String> {
    keyword
        .split_whitespace()
        .map(|part| part.to_ascii_uppercase())
        .collect()
}

fn starts_with_read_keyword(sql: &str) -> bool {
    matches!(
        leading_word(sql),
        Some(word) if word.eq_ignore_ascii_case("SELECT") || word.eq_ignore_ascii_case("WITH")
    )
}

/// Strips a trailing semicolon and appends the row cap unless one exists.
fn apply_row_cap(trimmed: &str, scan: &Scan) -> String {
    let body = match scan.semicolons.last() {
        Some(&pos) if pos == trimmed.len() - 1 => trimmed[..pos].trim_end(),
        _ => trimmed,
    };

    let body_scan = lexer::scan(body);
    if body_scan.has_top_level_word("LIMIT") || body_scan.has_top_level_word("FETCH") {
        return body.to_string();
    }

    // A space would leave the cap inside a trailing line comment
    let separator = if body_scan.ends_in_line_comment {
        "\n"
    } else {
        " "
    };
    format!("{body}{separator}LIMIT {MAX_ROWS}")
}
