use once_cell::sync::Lazy;
use regex::Regex;

/// Recognizer-internal control tokens, e.g. `<|nospeech|>`.
static CONTROL_TOKENS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<\|[^>]*\|>").expect("valid control token regex"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Punctuation and symbols, folded to whitespace during normalization so
/// that "угу," and "угу" compare equal.
static PUNCT_OR_SYMBOL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\p{P}\p{S}]+").expect("valid punctuation regex"));

static HAS_ALNUM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-zа-я0-9]").expect("valid alphanumeric regex"));

/// A bracketed noise tag standing alone: "[музыка]", "[music]", ...
/// Checked against the cleaned text, before punctuation is stripped.
static NOISE_TAG_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*\[(music|applause|laughter|silence|noise|музыка|аплодисменты|смех|тишина|шум)\]\s*$")
        .expect("valid noise tag regex")
});

/// Structural patterns applied to the normalized text.
static BANNED_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // caption-credit sentences naming a subtitling role
        r"\bсубтитры\b.*\b(создал|создавал|подогнал|подогнала|подогнали)\b",
        r"\b(редактор|корректор)\b.*\b(субтитров|перевода)\b",
        // a line that is nothing but interjections / filler words, possibly repeated
        r"^(э+|м+|а+|у+|угу|ага|ну|вот|типа|как бы|короче|значит|это самое|um+|uh+|uhm|hm+|mhm|er+|ah+|oh+|yeah)( +(э+|м+|а+|у+|угу|ага|ну|вот|типа|um+|uh+|uhm|hm+|mhm|er+|ah+|oh+|yeah))*$",
        // purely numeric / timecode-looking lines
        r"^\d+([:., ]\d+)*$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid noise pattern"))
    .collect()
});

/// Filler, credit and noise fragments dropped wherever they appear.
/// Matched against the normalized form (lowercase, no punctuation).
const BANNED_SUBSTRINGS: &[&str] = &[
    // trailers, sponsor lines and channel boilerplate
    "продолжение следует",
    "при поддержке",
    "спасибо за просмотр",
    "подписывайтесь",
    "подпишитесь",
    "ставьте лайк",
    "колокольчик",
    "ссылка в описании",
    "наш канал",
    "заставка",
    // noises
    "музыка",
    "аплодисменты",
    "смех",
    "шум",
    // subtitle credits
    "субтитры создал",
    "субтитры создавал",
    "субтитры подогнал",
    "редактор субтитров",
    "корректор",
    // english markers that slip through
    "music",
    "applause",
    "laughter",
    "credits",
    "thanks for watching",
];

/// Decides whether recognized text is worth keeping, and normalizes it for
/// storage. Pure text classification; no I/O, no state.
pub struct NoiseFilter;

impl NoiseFilter {
    /// Light cleanup for the text that is actually stored: strip recognizer
    /// control tokens, collapse whitespace runs, trim the edges.
    pub fn sanitize(text: &str) -> String {
        let stripped = CONTROL_TOKENS.replace_all(text, "");
        WHITESPACE.replace_all(&stripped, " ").trim().to_string()
    }

    /// Whether a recognized line should be discarded as noise.
    ///
    /// Cheap checks run before the regex checks; the decision itself is a
    /// disjunction, so evaluation order only affects cost, not outcome.
    pub fn should_drop(text: &str) -> bool {
        let cleaned = CONTROL_TOKENS.replace_all(text, "");
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            return true;
        }
        if NOISE_TAG_LINE.is_match(cleaned) {
            return true;
        }

        let normalized = normalize(cleaned);
        if normalized.is_empty() {
            return true;
        }
        if !HAS_ALNUM.is_match(&normalized) {
            return true;
        }
        if normalized.chars().count() <= 2 {
            return true;
        }
        if BANNED_SUBSTRINGS.iter().any(|b| normalized.contains(b)) {
            return true;
        }
        BANNED_PATTERNS.iter().any(|re| re.is_match(&normalized))
    }
}

/// Stricter normalization used only for the drop checks: case-fold, fold
/// ё -> е, collapse punctuation and symbols to whitespace, collapse
/// whitespace, trim.
fn normalize(text: &str) -> String {
    let lowered: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c == 'ё' { 'е' } else { c })
        .collect();
    let spaced = PUNCT_OR_SYMBOL.replace_all(&lowered, " ");
    WHITESPACE.replace_all(&spaced, " ").trim().to_string()
}
