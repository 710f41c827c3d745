//! Normalisation applied to raw values before they are accepted into a record.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"0[1-9](?:[\s.-]?\d{2}){4}|\+?\d[\d\s.-]{9,}").unwrap());

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap());

const MIN_PHONE_DIGITS: usize = 10;

/// Collapse whitespace runs (newlines included) to one space and trim.
pub fn collapse_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Strip decorative glyphs that map widgets put in front of addresses.
pub fn clean_address(raw: &str, bullets: &str) -> String {
    let text = collapse_whitespace(raw);
    let stripped = text
        .trim_start_matches(|c: char| bullets.contains(c) || c.is_whitespace() || c == '-')
        .trim_start_matches(|c: char| !c.is_alphanumeric())
        .trim();

    let mut cleaned = stripped.to_string();
    if cleaned.starts_with(|c: char| !is_word(c)) {
        let tokens: Vec<&str> = cleaned.split(' ').collect();
        if tokens.len() > 1 {
            cleaned = tokens[1..].join(" ");
        }
    }

    cleaned.trim_start_matches(|c: char| !is_word(c)).trim().to_string()
}

/// Digits of the first phone-shaped run, separators removed.
pub fn clean_phone(raw: &str) -> Option<String> {
    PHONE_RE.find_iter(raw).find_map(|found| {
        let phone: String = found
            .as_str()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '.' && *c != '-')
            .collect();
        let digits = phone.chars().filter(char::is_ascii_digit).count();
        (digits >= MIN_PHONE_DIGITS).then_some(phone)
    })
}

/// `name.tld` with an alphabetic TLD, so numbers like `3.5` stay out.
fn looks_like_domain(value: &str) -> bool {
    let host = value.split(['/', '?', '#']).next().unwrap_or_default();
    let Some((_, tld)) = host.rsplit_once('.') else {
        return false;
    };
    !value.contains('@')
        && value.starts_with(|c: char| c.is_ascii_alphanumeric())
        && tld.len() >= 2
        && tld.chars().all(|c| c.is_ascii_alphabetic())
}

/// Absolute website URL, unless it points back at the directory itself.
pub fn clean_website(raw: &str, own_domain: &str) -> Option<String> {
    let value = collapse_whitespace(raw);
    if value.is_empty() || value.contains(' ') {
        return None;
    }

    let candidate = if value.starts_with("http://") || value.starts_with("https://") {
        value
    } else if looks_like_domain(&value) {
        format!("http://{}", value)
    } else {
        return None;
    };

    let url = Url::parse(&candidate).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    let own = own_domain.to_ascii_lowercase();
    if host == own || host.ends_with(&format!(".{}", own)) {
        return None;
    }

    Some(candidate)
}

/// First email-shaped substring.
pub fn find_email(raw: &str) -> Option<String> {
    EMAIL_RE.find(raw).map(|m| m.as_str().to_string())
}

/// Marker phrases present in `text`, each once, in vocabulary order.
pub fn detect_services(text: &str, vocabulary: &[String]) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for phrase in vocabulary {
        if !phrase.is_empty() && text.contains(phrase.as_str()) && !found.contains(phrase) {
            found.push(phrase.clone());
        }
    }
    found
}
