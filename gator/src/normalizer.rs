use crate::types::{AggregatorError, NewPost, Result, RssItem};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use uuid::Uuid;

/// Layouts tried for strings that carry an explicit numeric offset.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M%z",
    "%Y-%m-%dT%H:%M%z",
    "%A, %d-%b-%y %H:%M:%S %z",
    "%a %b %e %H:%M:%S %z %Y",
    "%d %b %Y %H:%M:%S %z",
    "%a, %d %b %Y %H:%M %z",
];

/// Layouts without any zone information, read as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%a %b %e %H:%M:%S %Y",
    "%a, %d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d %b %Y", "%B %d, %Y"];

/// Zone names mapped to numeric offsets before layout matching.
const ZONES: &[(&str, &str)] = &[
    ("UT", "+0000"),
    ("UTC", "+0000"),
    ("GMT", "+0000"),
    ("Z", "+0000"),
    ("EST", "-0500"),
    ("EDT", "-0400"),
    ("CST", "-0600"),
    ("CDT", "-0500"),
    ("MST", "-0700"),
    ("MDT", "-0600"),
    ("PST", "-0800"),
    ("PDT", "-0700"),
    ("BST", "+0100"),
    ("CET", "+0100"),
    ("CEST", "+0200"),
    ("EET", "+0200"),
    ("EEST", "+0300"),
    ("IST", "+0530"),
    ("JST", "+0900"),
    ("KST", "+0900"),
    ("AEST", "+1000"),
    ("AEDT", "+1100"),
];

/// Turns a feed item into a post for `feed_id`.
pub fn normalize(item: &RssItem, feed_id: Uuid) -> Result<NewPost> {
    let url = item.link.trim();
    if url.is_empty() {
        return Err(AggregatorError::MissingLink);
    }

    let published_at = parse_pub_date(&item.pub_date)?;
    let now = Utc::now();

    Ok(NewPost {
        id: Uuid::new_v4(),
        created_at: now,
        updated_at: now,
        title: item.title.clone(),
        url: url.to_string(),
        description: item.description.clone(),
        published_at,
        feed_id,
    })
}

/// Parses the publish dates found in the wild without a format hint.
pub fn parse_pub_date(value: &str) -> Result<DateTime<Utc>> {
    let input = value.trim();
    if input.is_empty() {
        return Err(date_error(value));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Some(dt) = parse_timestamp(input) {
        return Ok(dt);
    }

    let input = replace_zone_names(&expand_zulu(input));

    if let Ok(dt) = DateTime::parse_from_rfc2822(&input) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::<FixedOffset>::parse_from_str(&input, format) {
            return Ok(dt.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&input, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&input, format) {
            if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                return Ok(Utc.from_utc_datetime(&naive));
            }
        }
    }

    Err(date_error(value))
}

fn date_error(value: &str) -> AggregatorError {
    AggregatorError::DateParse {
        value: value.to_string(),
    }
}

/// Unix seconds (10 digits) or milliseconds (13 digits).
fn parse_timestamp(input: &str) -> Option<DateTime<Utc>> {
    if !input.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n: i64 = input.parse().ok()?;
    match input.len() {
        10 => DateTime::from_timestamp(n, 0),
        13 => DateTime::from_timestamp_millis(n),
        _ => None,
    }
}

/// A `Z` glued to the time (`2006-01-02T15:04Z`) as a numeric offset.
fn expand_zulu(input: &str) -> String {
    match input.strip_suffix('Z') {
        Some(rest) if rest.ends_with(|c: char| c.is_ascii_digit()) => format!("{}+0000", rest),
        _ => input.to_string(),
    }
}

/// Rewrites known zone names as numeric offsets. An unknown all-caps name
/// in last position is dropped, leaving the time to be read as UTC.
fn replace_zone_names(input: &str) -> String {
    let tokens: Vec<&str> = input.split_whitespace().collect();
    let last = tokens.len().saturating_sub(1);

    tokens
        .iter()
        .enumerate()
        .filter_map(|(i, token)| {
            let upper = token.to_ascii_uppercase();
            if let Some((_, offset)) = ZONES.iter().find(|(name, _)| *name == upper) {
                return Some(offset.to_string());
            }
            if i > 0 && i == last && looks_like_zone(token) {
                return None;
            }
            Some(token.to_string())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn looks_like_zone(token: &str) -> bool {
    (2..=5).contains(&token.len()) && token.chars().all(|c| c.is_ascii_uppercase())
}
