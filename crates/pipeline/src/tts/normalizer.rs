//! Text normalization for speech synthesis

use once_cell::sync::Lazy;
use regex::Regex;

static BRACKETED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]*\]").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d+)\.(\d+)\b").expect("valid regex"));
static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d+\b").expect("valid regex"));
static REPEATED_BANG: Lazy<Regex> = Lazy::new(|| Regex::new(r"!{2,}").expect("valid regex"));
static REPEATED_QUESTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\?{2,}").expect("valid regex"));
static REPEATED_DOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.{2,}").expect("valid regex"));
static SENTENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^.!?]+[.!?]*").expect("valid regex"));
static CLAUSE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,;:]+").expect("valid regex"));

static ABBREVIATIONS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"\bMr\.", "Mister"),
        (r"\bMrs\.", "Missus"),
        (r"\bDr\.", "Doctor"),
        (r"\bProf\.", "Professor"),
        (r"\bSt\.", "Street"),
        (r"\bLtd\.", "Limited"),
        (r"\bInc\.", "Incorporated"),
        (r"\bCorp\.", "Corporation"),
        (r"\bCo\.", "Company"),
        (r"\bvs\.", "versus"),
        (r"\betc\.", "etcetera"),
        (r"\bi\.e\.", "that is"),
        (r"\be\.g\.", "for example"),
    ]
    .into_iter()
    .map(|(pattern, expansion)| (Regex::new(pattern).expect("valid regex"), expansion))
    .collect()
});

const ONES: [&str; 10] = [
    "", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine",
];
const TEENS: [&str; 10] = [
    "ten", "eleven", "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen",
    "eighteen", "nineteen",
];
const TENS: [&str; 10] = [
    "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];

/// Spell out integers below 1000; larger values are returned as digits
pub fn number_to_words(n: u64) -> String {
    match n {
        0 => "zero".to_string(),
        1..=9 => ONES[n as usize].to_string(),
        10..=19 => TEENS[(n - 10) as usize].to_string(),
        20..=99 => {
            let tens = TENS[(n / 10) as usize];
            match n % 10 {
                0 => tens.to_string(),
                ones => format!("{} {}", tens, ONES[ones as usize]),
            }
        }
        100..=999 => {
            let hundreds = format!("{} hundred", ONES[(n / 100) as usize]);
            match n % 100 {
                0 => hundreds,
                rest => format!("{} {}", hundreds, number_to_words(rest)),
            }
        }
        _ => n.to_string(),
    }
}

fn spell_number(digits: &str) -> String {
    digits
        .parse::<u64>()
        .map(number_to_words)
        .unwrap_or_else(|_| digits.to_string())
}

/// Clean text before it is sent to a synthesis backend
pub fn clean_text_for_tts(text: &str) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    let text = BRACKETED.replace_all(text, "");
    let mut text = WHITESPACE.replace_all(&text, " ").trim().to_string();

    for (pattern, expansion) in ABBREVIATIONS.iter() {
        text = pattern.replace_all(&text, *expansion).into_owned();
    }

    let text = DECIMAL.replace_all(&text, |caps: &regex::Captures| {
        let fraction: Vec<String> = caps[2]
            .chars()
            .filter_map(|c| c.to_digit(10))
            .map(|d| number_to_words(d as u64))
            .collect();
        format!("{} point {}", spell_number(&caps[1]), fraction.join(" "))
    });
    let text = INTEGER.replace_all(&text, |caps: &regex::Captures| spell_number(&caps[0]));

    let text = REPEATED_BANG.replace_all(&text, "!");
    let text = REPEATED_QUESTION.replace_all(&text, "?");
    let mut text = REPEATED_DOT.replace_all(&text, "...").trim().to_string();

    if text.is_empty() {
        return text;
    }
    if !text.ends_with(['.', '!', '?']) {
        text.push('.');
    }
    text
}

/// Split text into segments of at most `max_chars` characters
///
/// Sentences are kept whole when they fit; longer ones are split on clause
/// punctuation and, as a last resort, on word boundaries.
pub fn split_into_segments(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut segments = Vec::new();

    for sentence in SENTENCE.find_iter(text) {
        let sentence = sentence.as_str().trim();
        if sentence.is_empty() {
            continue;
        }
        if sentence.chars().count() <= max_chars {
            segments.push(sentence.to_string());
            continue;
        }

        let mut current = String::new();
        for part in CLAUSE_BREAK.split(sentence) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let candidate_len = if current.is_empty() {
                part.chars().count()
            } else {
                current.chars().count() + 2 + part.chars().count()
            };
            if candidate_len <= max_chars {
                if !current.is_empty() {
                    current.push_str(", ");
                }
                current.push_str(part);
                continue;
            }
            if !current.is_empty() {
                segments.push(std::mem::take(&mut current));
            }
            if part.chars().count() <= max_chars {
                current.push_str(part);
            } else {
                segments.extend(split_on_words(part, max_chars));
            }
        }
        if !current.is_empty() {
            segments.push(current);
        }
    }

    segments
}

fn split_on_words(text: &str, max_chars: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > max_chars && !current.is_empty() {
            out.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}
