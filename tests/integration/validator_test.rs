//! Validator and envelope tests through the public API.

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use supaguard::query::ExecutionEnvelope;
use supaguard::safety::{validate_query, QueryValidator, Rejection, Verdict, BLOCKED_KEYWORDS};

fn accepted(sql: &str) -> String {
    match validate_query(sql) {
        Verdict::Accepted(query) => query,
        Verdict::Rejected(reason) => panic!("expected {sql:?} to be accepted, got: {reason}"),
    }
}

fn rejected(sql: &str) -> Rejection {
    match validate_query(sql) {
        Verdict::Rejected(reason) => reason,
        Verdict::Accepted(query) => panic!("expected {sql:?} to be rejected, got: {query}"),
    }
}

#[test]
fn test_substring_of_keyword_is_not_blocked() {
    assert_eq!(
        accepted("SELECT updated_at FROM accounts"),
        "SELECT updated_at FROM accounts LIMIT 500"
    );
}

#[test]
fn test_stacked_statement_is_rejected() {
    // DROP is caught by the deny-list before the statement count
    assert_eq!(
        rejected("SELECT 1; DROP TABLE accounts"),
        Rejection::BlockedKeyword("DROP".to_string())
    );
    assert_eq!(
        rejected("SELECT 1; SELECT 2"),
        Rejection::MultipleStatements
    );
}

#[test]
fn test_semicolon_in_literal_is_not_a_separator() {
    assert_eq!(accepted("SELECT 'a;b' AS x"), "SELECT 'a;b' AS x LIMIT 500");
    assert_eq!(
        accepted("SELECT * FROM t WHERE x = 'it''s; fine'"),
        "SELECT * FROM t WHERE x = 'it''s; fine' LIMIT 500"
    );
    assert_eq!(accepted("SELECT $$a;b$$"), "SELECT $$a;b$$ LIMIT 500");
}

#[test]
fn test_single_trailing_semicolon() {
    assert_eq!(
        accepted("SELECT * FROM accounts;"),
        "SELECT * FROM accounts LIMIT 500"
    );
    assert_eq!(
        rejected("SELECT 1; -- trailing"),
        Rejection::MultipleStatements
    );
}

#[test]
fn test_keyword_in_comment_is_rejected() {
    assert_eq!(
        rejected("SELECT 1 -- drop"),
        Rejection::BlockedKeyword("DROP".to_string())
    );
}

#[test]
fn test_unterminated_literal() {
    assert_eq!(rejected("SELECT 'abc"), Rejection::UnterminatedLiteral);
}

#[test]
fn test_subquery_limit_still_gets_outer_cap() {
    assert_eq!(
        accepted("SELECT * FROM (SELECT * FROM t LIMIT 5) s"),
        "SELECT * FROM (SELECT * FROM t LIMIT 5) s LIMIT 500"
    );
}

#[test]
fn test_trailing_line_comment_gets_cap_on_new_line() {
    let query = accepted("SELECT * FROM t -- newest first");
    assert_eq!(query, "SELECT * FROM t -- newest first\nLIMIT 500");

    let envelope = ExecutionEnvelope::wrap(&query);
    assert!(envelope.as_str().contains("-- newest first\nLIMIT 500;\nCOMMIT;"));
}

#[test]
fn test_row_cap_is_idempotent() {
    let once = accepted("select * from users");
    assert_eq!(once, "select * from users LIMIT 500");
    assert_eq!(accepted(&once), once);
}

#[test]
fn test_extra_keywords_from_config() {
    let validator = QueryValidator::new().with_extra_keywords(["vacuum", "SET CONFIG"]);

    assert_eq!(
        validator.validate("SELECT vacuum FROM t").rejection(),
        Some(&Rejection::BlockedKeyword("VACUUM".to_string()))
    );
    assert_eq!(
        validator
            .validate("SELECT set   config('x', 'y', false)")
            .rejection(),
        Some(&Rejection::BlockedKeyword("SET CONFIG".to_string()))
    );
    assert!(validator.validate("SELECT set_config('x', 'y', false)").is_accepted());
}

fn simple_select() -> impl Strategy<Value = String> {
    let column = prop::sample::select(vec!["id", "email", "created_at", "count(*)", "1"]);
    let table = prop::sample::select(vec!["users", "accounts", "public.orders", "events"]);
    let tail = prop::sample::select(vec![
        "",
        " WHERE id > 10",
        " ORDER BY id DESC",
        " LIMIT 20",
        ";",
        " -- note",
        " WHERE note = 'a;b'",
    ]);
    let lead = prop::sample::select(vec!["SELECT", "select", "Select"]);
    (lead, column, table, tail).prop_map(|(lead, c, t, tail)| format!("{lead} {c} FROM {t}{tail}"))
}

fn non_ascii_char() -> impl Strategy<Value = char> {
    prop_oneof![
        prop::sample::select(vec!['€', '©', '¬', '«', '»', '—', '…', '\u{a0}', '中', '😀']),
        any::<char>().prop_filter("non-ASCII", |c| !c.is_ascii()),
    ]
}

fn quote_after(c: char) -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        format!("SELECT 1 AS {c}$t$; SELECT 2; SELECT '$t$' -- '"),
        format!("SELECT 1 AS {c}$$; SELECT 2; SELECT '$$' -- '"),
        format!(r"SELECT 1 AS {c}E'\'; SELECT 2; --'"),
        format!(r"SELECT 1 AS {c}e'\'; SELECT 2; --'"),
        format!("SELECT {c}'a'; SELECT 2; --'"),
    ])
}

proptest! {
    #[test]
    fn prop_non_ascii_symbol_never_hides_separator(
        sql in non_ascii_char().prop_flat_map(quote_after),
    ) {
        prop_assert_eq!(validate_query(&sql), Verdict::Rejected(Rejection::MultipleStatements));
    }

    #[test]
    fn prop_envelope_parts_in_order(sql in simple_select()) {
        let query = accepted(&sql);
        let envelope = ExecutionEnvelope::wrap(&query);
        let text = envelope.as_str();

        let timeout = text.find("SET statement_timeout = '10s';").unwrap();
        let begin = text.find("BEGIN READ ONLY;").unwrap();
        let body = text.find(query.as_str()).unwrap();
        let commit = text.rfind("COMMIT;").unwrap();

        prop_assert!(timeout < begin && begin < body && body < commit);
        prop_assert!(!text.contains(";;"));
        prop_assert!(text.ends_with("COMMIT;"));
    }

    #[test]
    fn prop_deny_listed_word_in_cte_is_rejected(
        index in 0..BLOCKED_KEYWORDS.len(),
        upper in any::<bool>(),
    ) {
        let keyword = BLOCKED_KEYWORDS[index];
        let keyword = if upper { keyword.to_string() } else { keyword.to_lowercase() };
        let sql = format!("WITH x AS (SELECT 1) SELECT * FROM x WHERE {keyword} IS NULL");

        prop_assert!(
            matches!(validate_query(&sql), Verdict::Rejected(Rejection::BlockedKeyword(_))),
            "{} was accepted",
            sql
        );
    }
}
