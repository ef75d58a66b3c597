//! Parsing of raw model completions.
//!
//! The model is asked to answer with either a bare SQL statement or a
//! single question prefixed `CLARIFICATION:`, optionally preceded by a
//! `CONFIDENCE: <0..1>` line. Models drift from that protocol in the usual
//! ways (code fences, a sentence of preamble, a trailing semicolon), so
//! parsing is lenient about wrapping and strict about nothing else.

/// What the model answered.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    Clarification(String),
    Sql {
        sql: String,
        /// Self-reported confidence, when the model gave one.
        confidence: Option<f64>,
    },
}

const CLARIFICATION_PREFIX: &str = "clarification:";
const CONFIDENCE_PREFIX: &str = "confidence:";
const FALLBACK_QUESTION: &str = "Could you rephrase your question with more detail?";

/// Case-insensitive `strip_prefix`.
fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &text[prefix.len()..])
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Byte offset where the statement starts: the first `SELECT`, or a `WITH`
/// that opens a line, whichever comes first.
fn statement_start(text: &str) -> Option<usize> {
    let upper = text.to_ascii_uppercase();
    let bytes = upper.as_bytes();
    let keyword_at = |i: usize, keyword: &str| {
        upper[i..].starts_with(keyword)
            && (i == 0 || !is_word_byte(bytes[i - 1]))
            && bytes
                .get(i + keyword.len())
                .is_none_or(|b| !is_word_byte(*b))
    };

    (0..upper.len())
        .filter(|&i| upper.is_char_boundary(i))
        .find(|&i| {
            keyword_at(i, "SELECT")
                || (keyword_at(i, "WITH")
                    && upper[..i].trim_end_matches([' ', '\t']).ends_with('\n'))
                || (i == 0 && keyword_at(0, "WITH"))
        })
}

/// Extract the statement text from a completion that is not a clarification.
#[must_use]
pub fn extract_sql(text: &str) -> String {
    let unfenced: String = text
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n");
    let body = unfenced.trim();
    let statement = statement_start(body).map_or(body, |start| &body[start..]);
    let statement = statement.trim_end();
    statement
        .strip_suffix(';')
        .unwrap_or(statement)
        .trim_end()
        .to_string()
}

/// Parse one completion.
#[must_use]
pub fn parse_reply(text: &str) -> ModelReply {
    let mut rest = text.trim();
    let mut confidence = None;

    if let Some(after) = strip_prefix_ci(rest, CONFIDENCE_PREFIX) {
        let (value, tail) = after.split_once('\n').unwrap_or((after, ""));
        confidence = value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|c| c.is_finite())
            .map(|c| c.clamp(0.0, 1.0));
        rest = tail.trim();
    }

    if let Some(question) = strip_prefix_ci(rest, CLARIFICATION_PREFIX) {
        let question = question.trim();
        let question = if question.is_empty() {
            FALLBACK_QUESTION
        } else {
            question
        };
        return ModelReply::Clarification(question.to_string());
    }

    ModelReply::Sql {
        sql: extract_sql(rest),
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("SELECT * FROM branches", "SELECT * FROM branches")]
    #[case("SELECT * FROM branches;", "SELECT * FROM branches")]
    #[case("```sql\nSELECT id FROM loans;\n```", "SELECT id FROM loans")]
    #[case("Here is the query:\nSELECT id FROM loans", "SELECT id FROM loans")]
    #[case(
        "WITH t AS (SELECT 1 AS x)\nSELECT x FROM t",
        "WITH t AS (SELECT 1 AS x)\nSELECT x FROM t"
    )]
    #[case("The answer with joins:\nSELECT 1", "SELECT 1")]
    #[case("DELETE FROM transactions", "DELETE FROM transactions")]
    #[case("select name from customers", "select name from customers")]
    fn extracts_statement(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(extract_sql(input), expected);
    }

    #[test]
    fn keyword_inside_identifier_is_ignored() {
        assert_eq!(extract_sql("UPDATE t SET selected = 1"), "UPDATE t SET selected = 1");
    }

    #[test]
    fn clarification_prefix_is_case_insensitive() {
        assert_eq!(
            parse_reply("Clarification: What timeframe do you consider 'recent'?"),
            ModelReply::Clarification("What timeframe do you consider 'recent'?".into())
        );
        assert_eq!(
            parse_reply("CLARIFICATION:"),
            ModelReply::Clarification(FALLBACK_QUESTION.into())
        );
    }

    #[test]
    fn reads_confidence_line() {
        assert_eq!(
            parse_reply("CONFIDENCE: 0.35\nSELECT 1"),
            ModelReply::Sql {
                sql: "SELECT 1".into(),
                confidence: Some(0.35),
            }
        );
        assert_eq!(
            parse_reply("confidence: high\nSELECT 1"),
            ModelReply::Sql {
                sql: "SELECT 1".into(),
                confidence: None,
            }
        );
    }

    #[test]
    fn confidence_then_clarification() {
        assert_eq!(
            parse_reply("CONFIDENCE: 0.2\nCLARIFICATION: Which branch?"),
            ModelReply::Clarification("Which branch?".into())
        );
    }
}
