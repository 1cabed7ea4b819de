//! Character-level SQL scanner.
//!
//! Tracks just enough PostgreSQL lexical state to tell statement separators
//! and top-level keywords apart from the contents of string literals, quoted
//! identifiers, dollar-quoted bodies and comments. It builds no tokens beyond
//! bare words and never fails: malformed input is reported through the
//! `unterminated` flag.

/// Lexical facts about a piece of SQL text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Scan {
    /// Byte offsets of semicolons outside literals and comments.
    pub semicolons: Vec<usize>,
    /// Bare words outside literals and comments, with their paren depth.
    pub words: Vec<(usize, String)>,
    /// Paren depth at the end of the text.
    pub final_depth: usize,
    /// The text ends inside a literal, quoted identifier or block comment.
    pub unterminated: bool,
    /// The text ends inside a `--` comment.
    pub ends_in_line_comment: bool,
}

impl Scan {
    /// Returns true if `keyword` appears as a bare word at the nesting level
    /// the text ends at (depth zero for balanced text).
    pub fn has_top_level_word(&self, keyword: &str) -> bool {
        self.words.iter().any(|(depth, word)| {
            *depth == self.final_depth && word.eq_ignore_ascii_case(keyword)
        })
    }
}

/// Returns true for characters that may continue an identifier or keyword.
///
/// PostgreSQL treats every byte at or above 0x80 as an identifier byte, so
/// any non-ASCII character counts, symbols and punctuation included.
pub(crate) fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || !c.is_ascii()
}

/// Splits text into whole words at every non-identifier character.
///
/// This ignores quoting entirely, so words inside literals and comments are
/// yielded too.
pub(crate) fn words(sql: &str) -> impl Iterator<Item = &str> {
    sql.split(|c: char| !is_identifier_char(c))
        .filter(|word| !word.is_empty())
}

/// Returns the leading word of the text, if it starts with one.
pub(crate) fn leading_word(sql: &str) -> Option<&str> {
    let end = sql
        .find(|c: char| !is_identifier_char(c))
        .unwrap_or(sql.len());
    (end > 0).then(|| &sql[..end])
}

/// Returns true if the text contains a `U&'..'` or `U&".."` Unicode-escape
/// literal, quoted or not. Whitespace between `&` and the quote is tolerated.
pub(crate) fn has_unicode_escape(sql: &str) -> bool {
    sql.match_indices('&').any(|(i, _)| {
        sql[..i].ends_with(|c: char| c.eq_ignore_ascii_case(&'u'))
            && sql[i + 1..].trim_start().starts_with(|c: char| c == '\'' || c == '"')
    })
}

/// Scans SQL text, recording separators and top-level words.
pub(crate) fn scan(sql: &str) -> Scan {
    let mut scan = Scan::default();
    let mut depth: usize = 0;
    let mut i = 0;

    while let Some(c) = sql[i..].chars().next() {
        let rest = &sql[i..];
        match c {
            '-' if rest.starts_with("--") => match rest.find(is_newline) {
                Some(end) => i += end + 1,
                None => {
                    scan.ends_in_line_comment = true;
                    break;
                }
            },
            '/' if rest.starts_with("/*") => match block_comment_len(rest) {
                Some(len) => i += len,
                None => {
                    scan.unterminated = true;
                    break;
                }
            },
            '\'' => match quoted_len(rest, '\'', false) {
                Some(len) => i += len,
                None => {
                    scan.unterminated = true;
                    break;
                }
            },
            // Only reached at a token boundary, so this is an E'' prefix and
            // not the tail of an identifier
            'E' | 'e' if rest[1..].starts_with('\'') => match escape_string_len(&rest[1..]) {
                Some(len) => i += 1 + len,
                None => {
                    scan.unterminated = true;
                    break;
                }
            },
            '"' => match quoted_len(rest, '"', false) {
                Some(len) => i += len,
                None => {
                    scan.unterminated = true;
                    break;
                }
            },
            '$' => match dollar_tag(rest) {
                Some(tag) => match rest[tag.len()..].find(tag) {
                    Some(pos) => i += tag.len() + pos + tag.len(),
                    None => {
                        scan.unterminated = true;
                        break;
                    }
                },
                // Positional parameter ($1) or stray dollar
                None => i += 1,
            },
            ';' => {
                scan.semicolons.push(i);
                i += 1;
            }
            '(' => {
                depth += 1;
                i += 1;
            }
            ')' => {
                depth = depth.saturating_sub(1);
                i += 1;
            }
            c if c.is_ascii_digit() => i += number_len(rest),
            c if is_identifier_char(c) => {
                // `$` may continue an identifier (foo$bar) but never start a tag there
                let len = rest
                    .find(|ch: char| !is_identifier_char(ch) && ch != '$')
                    .unwrap_or(rest.len());
                scan.words.push((depth, rest[..len].to_ascii_uppercase()));
                i += len;
            }
            c => i += c.len_utf8(),
        }
    }

    scan.final_depth = depth;
    scan
}

/// Length of a quoted run starting at `rest[0]`, including both quotes.
///
/// A doubled quote inside the run is an escaped quote. With
/// `backslash_escapes`, a backslash escapes the following character.
fn quoted_len(rest: &str, quote: char, backslash_escapes: bool) -> Option<usize> {
    let mut chars = rest.char_indices().skip(1);
    while let Some((idx, ch)) = chars.next() {
        if backslash_escapes && ch == '\\' {
            chars.next();
            continue;
        }
        if ch == quote {
            if rest[idx + 1..].starts_with(quote) {
                chars.next();
                continue;
            }
            return Some(idx + 1);
        }
    }
    None
}

/// Length of a (possibly nested) block comment starting at `rest[0]`.
fn block_comment_len(rest: &str) -> Option<usize> {
    let bytes = rest.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i + 1 < bytes.len() {
        match (bytes[i], bytes[i + 1]) {
            (b'/', b'*') => {
                depth += 1;
                i += 2;
            }
            (b'*', b'/') => {
                depth -= 1;
                i += 2;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => i += 1,
        }
    }
    None
}

/// Returns the opening dollar-quote tag (`$$` or `$name$`) at `rest[0]`.
fn dollar_tag(rest: &str) -> Option<&str> {
    let body = rest.strip_prefix('$')?;
    let end = body.find('$')?;
    let valid = body[..end].chars().enumerate().all(|(n, ch)| {
        is_identifier_char(ch) && !(n == 0 && ch.is_ascii_digit())
    });
    valid.then(|| &rest[..end + 2])
}

/// Length of an `E'..'` body starting at the quote, including any
/// continuation segments.
///
/// A quote that follows the closing quote across whitespace containing a
/// newline continues the same literal, backslash escapes included.
fn escape_string_len(rest: &str) -> Option<usize> {
    let mut len = quoted_len(rest, '\'', true)?;
    while let Some(gap) = continuation_gap(&rest[len..]) {
        len += gap + quoted_len(&rest[len + gap..], '\'', true)?;
    }
    Some(len)
}

/// Offset of the quote that continues a string literal after `rest[0]`.
fn continuation_gap(rest: &str) -> Option<usize> {
    let mut newline = false;
    let mut i = 0;
    loop {
        let tail = &rest[i..];
        match tail.chars().next()? {
            ' ' | '\t' | '\x0c' => i += 1,
            '\x0b' if newline => i += 1,
            '\n' | '\r' => {
                newline = true;
                i += 1;
            }
            // A comment only counts when a newline ends it
            '-' if tail.starts_with("--") => i += tail.find(is_newline)?,
            '\'' if newline => return Some(i),
            _ => return None,
        }
    }
}

/// Length of the numeric literal at `rest[0]`.
///
/// Stops before any trailing letters, so `1e'..'` leaves an `E''` prefix
/// behind and `1$a$` leaves a dollar quote.
fn number_len(rest: &str) -> usize {
    let bytes = rest.as_bytes();
    let radix = match bytes {
        [b'0', b'x' | b'X', ..] => 16,
        [b'0', b'o' | b'O', ..] => 8,
        [b'0', b'b' | b'B', ..] => 2,
        _ => 10,
    };
    if radix != 10 {
        let digits = span(&bytes[2..], |b| b == b'_' || char::from(b).is_digit(radix));
        if digits > 0 {
            return 2 + digits;
        }
    }

    let mut len = span(bytes, |b| b.is_ascii_digit() || b == b'_');
    if bytes.get(len) == Some(&b'.') {
        len += 1;
        len += span(&bytes[len..], |b| b.is_ascii_digit() || b == b'_');
    }
    if matches!(bytes.get(len), Some(b'e' | b'E')) {
        let sign = usize::from(matches!(bytes.get(len + 1), Some(b'+' | b'-')));
        if bytes.get(len + 1 + sign).is_some_and(u8::is_ascii_digit) {
            len += 1 + sign;
            len += span(&bytes[len..], |b| b.is_ascii_digit());
        }
    }
    len
}

fn span(bytes: &[u8], pred: impl Fn(u8) -> bool) -> usize {
    bytes.iter().take_while(|&&b| pred(b)).count()
}

fn is_newline(c: char) -> bool {
    c == '\n' || c == '\r'
}
