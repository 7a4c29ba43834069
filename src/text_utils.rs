use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use unidecode::unidecode;

lazy_static! {
    static ref SCRIPT_RE: Regex = Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap();
    static ref STYLE_RE: Regex = Regex::new(r"(?is)<style[^>]*>.*?</style>").unwrap();
    static ref TAG_RE: Regex = Regex::new(r"<[^>]*>").unwrap();
    static ref ENTITY_RE: Regex = Regex::new(r"&[#\w]+;").unwrap();

    static ref MD_HEADER_RE: Regex = Regex::new(r"(?m)^#{1,6}\s+").unwrap();
    static ref MD_BOLD_ITALIC_RE: Regex = Regex::new(r"\*\*\*([^*]+)\*\*\*").unwrap();
    static ref MD_BOLD_RE: Regex = Regex::new(r"\*\*([^*]+)\*\*").unwrap();
    static ref MD_ITALIC_RE: Regex = Regex::new(r"\*([^*]+)\*").unwrap();
    static ref MD_U_BOLD_ITALIC_RE: Regex = Regex::new(r"___([^_]+)___").unwrap();
    static ref MD_U_BOLD_RE: Regex = Regex::new(r"__([^_]+)__").unwrap();
    static ref MD_U_ITALIC_RE: Regex = Regex::new(r"_([^_]+)_").unwrap();
    static ref MD_STRIKE_RE: Regex = Regex::new(r"~~([^~]+)~~").unwrap();
    static ref MD_LINK_RE: Regex = Regex::new(r"\[([^\]]+)\]\([^)]+\)").unwrap();
    static ref MD_CODE_RE: Regex = Regex::new(r"`([^`]+)`").unwrap();
    static ref MD_FENCE_RE: Regex = Regex::new(r"(?s)```.*?```").unwrap();
    static ref MD_TILDE_FENCE_RE: Regex = Regex::new(r"(?s)~~~.*?~~~").unwrap();
    static ref MD_QUOTE_RE: Regex = Regex::new(r"(?m)^>\s+").unwrap();
    static ref MD_HR_RE: Regex = Regex::new(r"(?m)^[-*_]{3,}\s*$").unwrap();
    static ref MD_BULLET_RE: Regex = Regex::new(r"(?m)^[-*+]\s+").unwrap();
    static ref MD_NUMBERED_RE: Regex = Regex::new(r"(?m)^\d+\.\s+").unwrap();
    static ref MD_TABLE_SEP_RE: Regex = Regex::new(r"(?m)^[-:|\s]+$").unwrap();

    static ref BLANK_LINES_RE: Regex = Regex::new(r"\n\s*\n").unwrap();
    static ref MANY_NEWLINES_RE: Regex = Regex::new(r"\n{3,}").unwrap();
    static ref SPACE_RUN_RE: Regex = Regex::new(r"[ \t]+").unwrap();
    static ref ANY_WS_RE: Regex = Regex::new(r"\s+").unwrap();
    static ref ARTIFACT_RE: Regex = Regex::new(r#"[^\w\s.,!?;:()\-'"]"#).unwrap();
}

/// Removes HTML from content: script/style blocks including their bodies,
/// then every remaining tag (replaced by a space so word boundaries
/// survive), then entities. The six common entities decode to their
/// characters; anything else `&...;`-shaped is dropped outright.
pub fn strip_html(content: &str) -> String {
    let text = SCRIPT_RE.replace_all(content, "");
    let text = STYLE_RE.replace_all(&text, "");
    let text = TAG_RE.replace_all(&text, " ");

    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'");

    ENTITY_RE.replace_all(&text, "").into_owned()
}

/// Reduces mixed HTML/Markdown content to plain text. Lossy and
/// approximate: syntax is stripped by pattern, not parsed. The closing
/// artifact sweep drops anything outside word characters, whitespace and
/// plain punctuation, so no angle brackets, ampersands or markdown control
/// characters survive.
pub fn markdown_to_text(content: &str) -> String {
    let text = strip_html(content);

    let text = MD_HEADER_RE.replace_all(&text, "");

    // Longest match first, otherwise ** eats ***
    let text = MD_BOLD_ITALIC_RE.replace_all(&text, "$1");
    let text = MD_BOLD_RE.replace_all(&text, "$1");
    let text = MD_ITALIC_RE.replace_all(&text, "$1");
    let text = MD_U_BOLD_ITALIC_RE.replace_all(&text, "$1");
    let text = MD_U_BOLD_RE.replace_all(&text, "$1");
    let text = MD_U_ITALIC_RE.replace_all(&text, "$1");

    let text = MD_STRIKE_RE.replace_all(&text, "$1");
    let text = MD_LINK_RE.replace_all(&text, "$1");
    let text = MD_CODE_RE.replace_all(&text, "$1");
    let text = MD_FENCE_RE.replace_all(&text, "");
    let text = MD_TILDE_FENCE_RE.replace_all(&text, "");
    let text = MD_QUOTE_RE.replace_all(&text, "");
    let text = MD_HR_RE.replace_all(&text, "");
    let text = MD_BULLET_RE.replace_all(&text, "");
    let text = MD_NUMBERED_RE.replace_all(&text, "");
    let text = text.replace('|', " ");
    let text = MD_TABLE_SEP_RE.replace_all(&text, "");

    let text = BLANK_LINES_RE.replace_all(&text, "\n\n");
    let text = MANY_NEWLINES_RE.replace_all(&text, "\n\n");
    let text = SPACE_RUN_RE.replace_all(&text, " ");
    let text = ARTIFACT_RE.replace_all(&text, "");

    text.trim().to_string()
}

/// Plain-text excerpt, at most `max_length` characters plus the `...`
/// suffix. Truncation prefers the last space when it falls in the final
/// 20% of the limit, so words are not split mid-way unless unavoidable.
pub fn clean_excerpt(content: &str, max_length: usize) -> String {
    let plain = markdown_to_text(content);
    let plain = ANY_WS_RE.replace_all(&plain, " ");
    let plain = plain.trim();

    if plain.chars().count() <= max_length {
        return plain.to_string();
    }

    let truncated: String = plain.chars().take(max_length).collect();
    if let Some(last_space) = truncated.rfind(' ') {
        let head = &truncated[..last_space];
        if head.chars().count() * 5 > max_length * 4 {
            return format!("{}...", head);
        }
    }

    format!("{}...", truncated)
}

/// Estimated reading time in minutes at 200 words per minute, HTML tags
/// excluded from the count. Never below one minute.
pub fn read_time(content: &str) -> u32 {
    let text = TAG_RE.replace_all(content, " ");
    let words = text.split_whitespace().count();
    words.div_ceil(200).max(1) as u32
}

/// Builds a URL slug from a title: transliterate to ASCII, lowercase,
/// keep `[a-z0-9 -]`, collapse whitespace runs to single hyphens.
pub fn slug_from_title(title: &str) -> String {
    let ascii = unidecode(title).to_lowercase();
    let kept: String = ascii
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == ' ' || *c == '-')
        .collect();

    let slug = ANY_WS_RE.replace_all(kept.trim(), "-").into_owned();
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}

/// Parses the timestamp shapes seen across document generations: RFC 3339,
/// `YYYY-MM-DD HH:MM:SS[.mmm]`, and bare dates.
pub fn parse_timestamp(buf: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(buf) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(buf, fmt) {
            return Some(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(buf, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }

    None
}

pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}
