//! Detection of references the question cannot resolve on its own.
//!
//! A pronoun ("them", "those") needs an earlier turn to point at, and a
//! relative period ("this quarter", "recently") needs a concrete date
//! anchor. When neither the question nor the conversation supplies one,
//! the translator asks instead of letting the model pick a range.

use tellr_core::context::{ConversationContext, TurnResolution};
use tellr_core::schema::SchemaDescriptor;

const PRONOUNS: [&str; 4] = ["them", "they", "those", "these"];
const PRONOUN_PHRASES: [&str; 1] = ["that one"];

const PERIOD_PHRASES: [&str; 4] = ["this quarter", "that quarter", "last quarter", "this period"];
const PERIOD_WORDS: [&str; 3] = ["recent", "recently", "lately"];

// "may" is left out: as a modal verb it would anchor far too much.
const MONTHS: [&str; 23] = [
    "january", "february", "march", "april", "june", "july", "august", "september", "october",
    "november", "december", "jan", "feb", "mar", "apr", "jun", "jul", "aug", "sep", "sept", "oct",
    "nov", "dec",
];

const SPAN_UNITS: [&str; 8] = ["day", "days", "week", "weeks", "month", "months", "year", "years"];

/// A reference that needs clarification before translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReference {
    /// A pronoun with no earlier turn to refer to.
    Pronoun(String),
    /// A relative time period with no date anchor.
    RelativePeriod(String),
}

impl UnresolvedReference {
    /// A specific follow-up question for the user.
    #[must_use]
    pub fn clarifying_question(&self) -> String {
        match self {
            Self::Pronoun(word) => format!(
                "Who or what does \"{word}\" refer to? Please name the customers, accounts \
                 or other records you mean."
            ),
            Self::RelativePeriod(phrase) => format!(
                "Which date range do you mean by \"{phrase}\"? For example \"Q1 2024\" or \
                 \"2024-01-01 to 2024-03-31\"."
            ),
        }
    }
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_ascii_alphanumeric() && c != '-')
        .filter(|w| !w.is_empty())
        .map(str::to_ascii_lowercase)
        .collect()
}

fn contains_phrase(words: &[String], phrase: &str) -> bool {
    let parts: Vec<&str> = phrase.split(' ').collect();
    words
        .windows(parts.len())
        .any(|w| w.iter().zip(&parts).all(|(a, b)| a == b))
}

fn is_iso_date(word: &str) -> bool {
    let parts: Vec<&str> = word.split('-').collect();
    parts.len() >= 2
        && parts[0].len() == 4
        && parts.iter().all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

fn is_year(word: &str) -> bool {
    word.len() == 4 && word.parse::<u32>().is_ok_and(|y| (1900..=2100).contains(&y))
}

fn is_quarter_label(word: &str) -> bool {
    matches!(word, "q1" | "q2" | "q3" | "q4")
}

/// Whether the words pin the period to concrete dates.
fn has_date_anchor(words: &[String]) -> bool {
    let single = words.iter().any(|w| {
        is_iso_date(w)
            || is_year(w)
            || is_quarter_label(w)
            || w.split('-').any(|part| is_year(part) || is_quarter_label(part))
            || MONTHS.contains(&w.as_str())
    });
    // "last 30 days", "past 6 months"
    let span = words.windows(3).any(|w| {
        matches!(w[0].as_str(), "last" | "past" | "previous")
            && w[1].chars().all(|c| c.is_ascii_digit())
            && SPAN_UNITS.contains(&w[2].as_str())
    });
    single || span
}

fn first_period(words: &[String]) -> Option<String> {
    PERIOD_PHRASES
        .iter()
        .find(|p| contains_phrase(words, p))
        .map(|p| (*p).to_string())
        .or_else(|| {
            words
                .iter()
                .find(|w| PERIOD_WORDS.contains(&w.as_str()))
                .cloned()
        })
}

fn first_pronoun(words: &[String]) -> Option<String> {
    words
        .iter()
        .find(|w| PRONOUNS.contains(&w.as_str()))
        .cloned()
        .or_else(|| {
            PRONOUN_PHRASES
                .iter()
                .find(|p| contains_phrase(words, p))
                .map(|p| (*p).to_string())
        })
}

/// Find the first reference in `question` that neither the conversation
/// nor the schema resolves.
#[must_use]
pub fn unresolved_reference(
    question: &str,
    context: &ConversationContext,
    schema: &SchemaDescriptor,
) -> Option<UnresolvedReference> {
    let question_words = words(question);

    if context.is_empty()
        && let Some(pronoun) = first_pronoun(&question_words)
    {
        return Some(UnresolvedReference::Pronoun(pronoun));
    }

    let period = first_period(&question_words)?;
    if schema.has_column_named("quarter") || has_date_anchor(&question_words) {
        return None;
    }
    let anchored_by_context = context.turns().any(|turn| {
        let mut text = turn.question.clone();
        if let TurnResolution::Sql(sql) = &turn.resolution {
            text.push(' ');
            text.push_str(sql);
        }
        has_date_anchor(&words(&text))
    });
    if anchored_by_context {
        return None;
    }
    Some(UnresolvedReference::RelativePeriod(period))
}
