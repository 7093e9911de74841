//! Lightweight scan of statement text. Finds the kind of statement and a trailing
//! `WHERE CURRENT OF <cursor>` clause. This is not a parser; it only needs to look past comments,
//! string literals and quoted identifiers.

/// Kind of statement, derived from its first keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
    Call,
    Other,
}

impl QueryType {
    /// Statements which may be executed as a single bulk array operation.
    pub fn supports_bulk(self) -> bool {
        matches!(self, QueryType::Insert | QueryType::Update)
    }
}

/// `WHERE CURRENT OF <cursor>` at the end of a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionedClause {
    /// Name of the cursor, unquoted.
    pub cursor_name: String,
    /// Byte offset of `WHERE` within the statement text.
    pub where_offset: usize,
}

/// Statement text together with what the scan found out about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub text: String,
    pub query_type: QueryType,
    pub positioned: Option<PositionedClause>,
}

impl Query {
    pub fn new(text: &str) -> Self {
        let tokens = tokenize(text);
        let query_type = tokens
            .iter()
            .find(|token| !token.quoted)
            .map(|token| classify(token.text))
            .unwrap_or(QueryType::Other);
        let positioned = positioned_clause(&tokens);
        Query {
            text: text.to_owned(),
            query_type,
            positioned,
        }
    }

    /// Statement text without the positioned clause.
    pub fn text_before_positioned_clause(&self) -> &str {
        match &self.positioned {
            Some(clause) => self.text[..clause.where_offset].trim_end(),
            None => &self.text,
        }
    }
}

fn classify(keyword: &str) -> QueryType {
    const KEYWORDS: [(&str, QueryType); 6] = [
        ("SELECT", QueryType::Select),
        ("WITH", QueryType::Select),
        ("INSERT", QueryType::Insert),
        ("UPDATE", QueryType::Update),
        ("DELETE", QueryType::Delete),
        ("CALL", QueryType::Call),
    ];
    KEYWORDS
        .iter()
        .find(|(word, _)| word.eq_ignore_ascii_case(keyword))
        .map(|&(_, query_type)| query_type)
        .unwrap_or(QueryType::Other)
}

fn positioned_clause(tokens: &[Token<'_>]) -> Option<PositionedClause> {
    let [.., where_, current, of, name] = tokens else {
        return None;
    };
    let is_keyword =
        |token: &Token<'_>, keyword: &str| !token.quoted && token.text.eq_ignore_ascii_case(keyword);
    if is_keyword(where_, "WHERE") && is_keyword(current, "CURRENT") && is_keyword(of, "OF") {
        Some(PositionedClause {
            cursor_name: name.text.to_owned(),
            where_offset: where_.offset,
        })
    } else {
        None
    }
}

/// A word or a backtick quoted identifier.
#[derive(Debug)]
struct Token<'a> {
    text: &'a str,
    offset: usize,
    quoted: bool,
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\'' | b'"' => pos = skip_literal(bytes, pos),
            b'`' => {
                let end = skip_literal(bytes, pos);
                let close = if bytes.get(end - 1) == Some(&b'`') && end - 1 > pos {
                    end - 1
                } else {
                    end
                };
                tokens.push(Token {
                    text: &text[pos + 1..close],
                    offset: pos,
                    quoted: true,
                });
                pos = end;
            }
            b'#' => pos = skip_line(bytes, pos),
            b'-' if bytes.get(pos + 1) == Some(&b'-') => pos = skip_line(bytes, pos),
            b'/' if bytes.get(pos + 1) == Some(&b'*') => {
                pos = match text[pos + 2..].find("*/") {
                    Some(end) => pos + 2 + end + 2,
                    None => bytes.len(),
                };
            }
            byte if is_word_byte(byte) => {
                let start = pos;
                while pos < bytes.len() && is_word_byte(bytes[pos]) {
                    pos += 1;
                }
                tokens.push(Token {
                    text: &text[start..pos],
                    offset: start,
                    quoted: false,
                });
            }
            _ => pos += 1,
        }
    }
    tokens
}

fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'$' || byte >= 0x80
}

/// Position just past the literal starting at `start`. Handles backslash escapes and doubled
/// quotes.
fn skip_literal(bytes: &[u8], start: usize) -> usize {
    let quote = bytes[start];
    let mut pos = start + 1;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' if quote != b'`' => pos += 2,
            byte if byte == quote => {
                if bytes.get(pos + 1) == Some(&quote) {
                    pos += 2;
                } else {
                    return pos + 1;
                }
            }
            _ => pos += 1,
        }
    }
    bytes.len()
}

fn skip_line(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&byte| byte == b'\n')
        .map_or(bytes.len(), |end| start + end + 1)
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::{Query, QueryType};

    #[test_case("SELECT * FROM t", QueryType::Select; "select")]
    #[test_case("  insert into t VALUES (1)", QueryType::Insert; "leading whitespace")]
    #[test_case("/* comment */ UPDATE t SET a=1", QueryType::Update; "block comment")]
    #[test_case("-- line\nDELETE FROM t", QueryType::Delete; "line comment")]
    #[test_case("WITH x AS (SELECT 1) SELECT * FROM x", QueryType::Select; "common table expression")]
    #[test_case("CALL proc(?)", QueryType::Call; "procedure call")]
    #[test_case("CREATE TABLE t (a INT)", QueryType::Other; "ddl")]
    fn classify_statement(text: &str, expected: QueryType) {
        assert_eq!(expected, Query::new(text).query_type);
    }

    #[test]
    fn positioned_update() {
        let query = Query::new("UPDATE t SET a=? WHERE CURRENT OF my_cursor");

        let clause = query.positioned.as_ref().unwrap();
        assert_eq!("my_cursor", clause.cursor_name);
        assert_eq!("UPDATE t SET a=?", query.text_before_positioned_clause());
    }

    #[test]
    fn quoted_cursor_name() {
        let query = Query::new("DELETE FROM t where current of `SQL_CUR1`");

        assert_eq!("SQL_CUR1", query.positioned.unwrap().cursor_name);
    }

    #[test]
    fn clause_within_literal_is_not_positioned() {
        let query = Query::new("UPDATE t SET a='WHERE CURRENT OF c'");

        assert!(query.positioned.is_none());
    }
}
