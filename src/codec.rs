// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Post file format.
//!
//! A Hexo post is a single text file: a YAML __frontmatter__ block fenced by
//! `---` lines, a blank line, then free-form Markdown.
//!
//! ```text
//! ---
//! title: Hello World
//! date: 2024-03-01T09:30:00+00:00
//! tags:
//! - rust
//! categories: []
//! draft: true
//! ---
//!
//! Markdown body goes here.
//! ```
//!
//! Hexcms understands a handful of frontmatter keys. Every other key a theme
//! or plugin put there is carried along untouched, so decoding and encoding a
//! post never loses metadata.
//!
//! This module also derives file names from titles. File names look like
//! `{YYYY-MM-DD}-{slug}.md`. Two posts created on the same day with the same
//! title map to the same file name. No de-duplication is attempted, the
//! second create simply fails with a conflict.

use crate::config::HexoLayout;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::{Mapping, Value};
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Extension of post files.
pub const POST_EXTENSION: &str = "md";

const FENCE: &str = "---";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// Frontmatter of a post.
///
/// Keys without a dedicated field are kept in [`Frontmatter::extra`] in the
/// order they were read, with their original key type and YAML tags. `extra`
/// must never hold a key that has a dedicated field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Frontmatter {
    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,

    pub tags: Vec<String>,
    pub categories: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub permalink: Option<String>,

    /// Keys hexcms does not interpret.
    #[serde(flatten)]
    pub extra: Mapping,
}

#[derive(Debug, Deserialize)]
struct KnownFields {
    #[serde(default, deserialize_with = "lenient_string")]
    title: String,

    #[serde(default, deserialize_with = "lenient_opt_string")]
    date: Option<String>,

    #[serde(default, deserialize_with = "lenient_opt_string")]
    updated: Option<String>,

    #[serde(default, deserialize_with = "lenient_list")]
    tags: Vec<String>,

    #[serde(default, deserialize_with = "lenient_list")]
    categories: Vec<String>,

    #[serde(default, deserialize_with = "lenient_bool")]
    draft: Option<bool>,

    #[serde(default, deserialize_with = "lenient_opt_string")]
    description: Option<String>,

    #[serde(default, deserialize_with = "lenient_opt_string")]
    cover: Option<String>,

    #[serde(default, deserialize_with = "lenient_opt_string")]
    slug: Option<String>,

    #[serde(default, deserialize_with = "lenient_opt_string")]
    permalink: Option<String>,
}

const KNOWN_KEYS: [&str; 10] = [
    "title",
    "date",
    "updated",
    "tags",
    "categories",
    "draft",
    "description",
    "cover",
    "slug",
    "permalink",
];

/// Split post text into frontmatter and body.
///
/// Text without a fenced frontmatter block decodes to empty frontmatter and
/// the whole text as body. One blank line after the closing fence belongs to
/// the format, not the body.
///
/// # Errors
///
/// - Return [`CodecError::InvalidFrontmatter`] if the fenced block is not a
///   YAML mapping.
pub fn decode(text: &str) -> Result<(Frontmatter, String)> {
    let Some((yaml, body)) = split_fenced(text) else {
        return Ok((Frontmatter::default(), text.to_string()));
    };

    let frontmatter = if yaml.trim().is_empty() {
        Frontmatter::default()
    } else {
        parse_frontmatter(yaml)?
    };

    Ok((frontmatter, body.to_string()))
}

// INVARIANT: Unknown keys are copied from the parsed mapping as-is. Going
// through serde's flatten buffer would stringify non-string keys and reject
// tagged values.
fn parse_frontmatter(yaml: &str) -> Result<Frontmatter> {
    let mapping: Mapping = serde_yaml::from_str(yaml).map_err(CodecError::InvalidFrontmatter)?;

    let known = mapping
        .iter()
        .filter(|(key, _)| is_known_key(key))
        .map(|(key, value)| (key.clone(), untag(value.clone())))
        .collect::<Mapping>();
    let fields: KnownFields =
        serde_yaml::from_value(Value::Mapping(known)).map_err(CodecError::InvalidFrontmatter)?;
    let extra = mapping
        .into_iter()
        .filter(|(key, _)| !is_known_key(key))
        .collect();

    Ok(Frontmatter {
        title: fields.title,
        date: fields.date,
        updated: fields.updated,
        tags: fields.tags,
        categories: fields.categories,
        draft: fields.draft,
        description: fields.description,
        cover: fields.cover,
        slug: fields.slug,
        permalink: fields.permalink,
        extra,
    })
}

fn is_known_key(key: &Value) -> bool {
    key.as_str().is_some_and(|key| KNOWN_KEYS.contains(&key))
}

fn untag(value: Value) -> Value {
    match value {
        Value::Tagged(tagged) => untag(tagged.value),
        Value::Sequence(items) => Value::Sequence(items.into_iter().map(untag).collect()),
        Value::Mapping(entries) => Value::Mapping(
            entries
                .into_iter()
                .map(|(key, value)| (untag(key), untag(value)))
                .collect(),
        ),
        scalar => scalar,
    }
}

/// Join frontmatter and body into post text.
///
/// # Errors
///
/// - Return [`CodecError::Serialize`] if frontmatter cannot be written as YAML.
pub fn encode(frontmatter: &Frontmatter, body: &str) -> Result<String> {
    let yaml = serde_yaml::to_string(frontmatter).map_err(CodecError::Serialize)?;
    let mut text = String::with_capacity(yaml.len() + body.len() + 10);
    text.push_str(FENCE);
    text.push('\n');
    text.push_str(&yaml);
    if !yaml.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(FENCE);
    text.push_str("\n\n");
    text.push_str(body);

    Ok(text)
}

fn split_fenced(text: &str) -> Option<(&str, &str)> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let rest = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == FENCE {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            let body = body
                .strip_prefix("\r\n")
                .or_else(|| body.strip_prefix('\n'))
                .unwrap_or(body);
            return Some((yaml, body));
        }
        offset += line.len();
    }

    None
}

/// Normalize title into URL-safe slug.
///
/// Lowercases, strips diacritics, turns every run of whitespace or
/// punctuation into a single `-`, and trims `-` from both ends. Letters and
/// digits of any script survive, including combining marks that count as
/// letters, like Indic vowel signs. Only non-alphanumeric marks such as
/// accents are dropped after NFD decomposition.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_separator = false;

    for c in title
        .to_lowercase()
        .nfd()
        .filter(|c| c.is_alphanumeric() || !is_combining_mark(*c))
    {
        if c.is_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c);
        } else {
            pending_separator = true;
        }
    }

    slug
}

/// File name of post with title created on date.
pub fn filename_for(title: &str, date: NaiveDate) -> String {
    format!(
        "{}-{}.{POST_EXTENSION}",
        date.format("%Y-%m-%d"),
        slugify(title)
    )
}

/// Store path of post with title created on date.
pub fn post_path(layout: &HexoLayout, title: &str, is_draft: bool, date: NaiveDate) -> String {
    format!(
        "{}/{}",
        layout.post_dir(is_draft).trim_end_matches('/'),
        filename_for(title, date)
    )
}

/// Recover slug from file name like `2024-03-01-hello-world.md`.
pub fn slug_from_filename(filename: &str) -> String {
    let stem = filename
        .strip_suffix(".md")
        .unwrap_or(filename);

    match date_prefix(stem) {
        Some(_) => stem[11..].to_string(),
        None => stem.to_string(),
    }
}

/// Parse leading `YYYY-MM-DD-` of file name.
pub fn date_prefix(filename: &str) -> Option<NaiveDate> {
    let bytes = filename.as_bytes();
    if bytes.len() < 11 {
        return None;
    }

    let shape_ok = bytes[..11].iter().enumerate().all(|(i, b)| match i {
        4 | 7 | 10 => *b == b'-',
        _ => b.is_ascii_digit(),
    });
    if !shape_ok {
        return None;
    }

    NaiveDate::parse_from_str(&filename[..10], "%Y-%m-%d").ok()
}

/// Creation date of post.
///
/// Prefers the frontmatter `date`, falls back to the date prefix of the file
/// name (midnight UTC), and finally to `now`. Malformed dates are skipped,
/// never reported.
pub fn resolve_date(
    frontmatter: &Frontmatter,
    filename: &str,
    now: DateTime<FixedOffset>,
) -> DateTime<FixedOffset> {
    frontmatter
        .date
        .as_deref()
        .and_then(parse_timestamp)
        .or_else(|| date_prefix(filename).map(midnight_utc))
        .unwrap_or(now)
}

/// Parse timestamp in any of the shapes Hexo accepts.
///
/// Timestamps without offset are taken as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    if let Ok(stamp) = DateTime::parse_from_rfc3339(text) {
        return Some(stamp);
    }

    for format in ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S %:z"] {
        if let Ok(stamp) = DateTime::parse_from_str(text, format) {
            return Some(stamp);
        }
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(stamp) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&stamp).fixed_offset());
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .map(midnight_utc)
}

/// Render timestamp the way hexcms writes it into frontmatter.
pub fn format_timestamp(stamp: &DateTime<FixedOffset>) -> String {
    stamp.format(TIMESTAMP_FORMAT).to_string()
}

fn midnight_utc(date: NaiveDate) -> DateTime<FixedOffset> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
        .fixed_offset()
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

fn collect_strings(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Sequence(items) => {
            for item in items {
                collect_strings(item, out);
            }
        }
        other => out.extend(scalar_to_string(other)),
    }
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_opt_string(deserializer)?.unwrap_or_default())
}

fn lenient_opt_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(scalar_to_string(&value))
}

fn lenient_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let mut items = Vec::new();
    collect_strings(&value, &mut items);
    Ok(items)
}

fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(flag) => Some(flag),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    })
}

/// Post format error types.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Frontmatter block is not a YAML mapping.
    #[error("frontmatter is not valid YAML")]
    InvalidFrontmatter(#[source] serde_yaml::Error),

    /// Frontmatter could not be written as YAML.
    #[error("failed to write frontmatter")]
    Serialize(#[source] serde_yaml::Error),
}

/// Friendly result alias :3
pub type Result<T, E = CodecError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    fn at(text: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(text).unwrap()
    }

    #[test]
    fn decode_hexo_post() -> anyhow::Result<()> {
        let text = indoc! {r#"
            ---
            title: "Hello: World"
            date: 2024-03-01 09:30:00
            tags: rust
            categories:
              - [notes, rust]
            layout: post
            comments: false
            ---

            # Heading

            Body text.
        "#};

        let (frontmatter, body) = decode(text)?;
        assert_eq!(frontmatter.title, "Hello: World");
        assert_eq!(frontmatter.date.as_deref(), Some("2024-03-01 09:30:00"));
        assert_eq!(frontmatter.tags, vec!["rust".to_string()]);
        assert_eq!(
            frontmatter.categories,
            vec!["notes".to_string(), "rust".to_string()]
        );
        assert_eq!(frontmatter.draft, None);
        assert_eq!(frontmatter.extra.len(), 2);
        assert_eq!(
            frontmatter.extra.get("layout"),
            Some(&Value::String("post".into()))
        );
        assert_eq!(body, "# Heading\n\nBody text.\n");

        Ok(())
    }

    #[test]
    fn decode_without_frontmatter() -> anyhow::Result<()> {
        let (frontmatter, body) = decode("just text\n---\nmore\n")?;
        assert_eq!(frontmatter, Frontmatter::default());
        assert_eq!(body, "just text\n---\nmore\n");

        let (frontmatter, body) = decode("---\ntitle: unterminated\n")?;
        assert_eq!(frontmatter, Frontmatter::default());
        assert_eq!(body, "---\ntitle: unterminated\n");

        Ok(())
    }

    #[test]
    fn decode_keeps_tagged_and_non_string_keys() -> anyhow::Result<()> {
        let text = indoc! {"
            ---
            title: !label Tagged Title
            weird: !custom value
            1: first
            ---

            body
        "};

        let (frontmatter, _) = decode(text)?;
        assert_eq!(frontmatter.title, "Tagged Title");
        assert!(matches!(frontmatter.extra.get("weird"), Some(Value::Tagged(_))));
        assert_eq!(frontmatter.extra.get(Value::from(1)), Some(&Value::String("first".into())));
        assert_eq!(frontmatter.extra.get("1"), None);

        let encoded = encode(&frontmatter, "body\n")?;
        assert!(encoded.contains("weird: !custom value"));
        let (decoded, _) = decode(&encoded)?;
        assert_eq!(decoded, frontmatter);

        Ok(())
    }

    #[test]
    fn round_trip_preserves_integer_keys() -> anyhow::Result<()> {
        let mut extra = Mapping::new();
        extra.insert(1.into(), "one".into());
        extra.insert(Value::Bool(true), "yes".into());
        let frontmatter = Frontmatter {
            title: "Keys".into(),
            extra,
            ..Frontmatter::default()
        };

        let (decoded, body) = decode(&encode(&frontmatter, "b")?)?;
        assert_eq!(decoded, frontmatter);
        assert_eq!(body, "b");

        Ok(())
    }

    #[test]
    fn decode_rejects_non_mapping_frontmatter() {
        let result = decode("---\n- just\n- a list\n---\nbody");
        assert!(matches!(result, Err(CodecError::InvalidFrontmatter(_))));
    }

    #[test]
    fn encode_layout() -> anyhow::Result<()> {
        let mut extra = Mapping::new();
        extra.insert("layout".into(), "post".into());
        let frontmatter = Frontmatter {
            title: "Hello World".into(),
            tags: vec!["rust".into(), "hexo".into()],
            draft: Some(true),
            extra,
            ..Frontmatter::default()
        };

        let result = encode(&frontmatter, "Body.\n")?;
        let expect = indoc! {r#"
            ---
            title: Hello World
            tags:
            - rust
            - hexo
            categories: []
            draft: true
            layout: post
            ---

            Body.
        "#};
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn round_trip_preserves_metadata_and_body() -> anyhow::Result<()> {
        let mut extra = Mapping::new();
        extra.insert("layout".into(), "post".into());
        extra.insert("toc".into(), true.into());
        extra.insert(
            "gallery".into(),
            Value::Sequence(vec!["a.png".into(), "b.png".into()]),
        );
        let frontmatter = Frontmatter {
            title: "2024".into(),
            date: Some("2024-03-01T09:30:00+08:00".into()),
            updated: Some("2024-03-02T10:00:00+08:00".into()),
            tags: vec!["a".into(), "b: c".into()],
            categories: vec!["notes".into()],
            draft: Some(false),
            description: Some("Line one\nline two".into()),
            cover: Some("https://example.com/c.png".into()),
            slug: Some("custom".into()),
            permalink: Some("/p/custom/".into()),
            extra,
        };

        for body in ["", "plain", "\nleading blank\n", "---\nfence in body\n---\n"] {
            let text = encode(&frontmatter, body)?;
            let (decoded, decoded_body) = decode(&text)?;
            assert_eq!(decoded, frontmatter);
            assert_eq!(decoded_body, body);
        }

        Ok(())
    }

    #[test_case("Hello World", "hello-world"; "basic")]
    #[test_case("  Crème Brûlée!  ", "creme-brulee"; "diacritics and trim")]
    #[test_case("Rust -- the   Good_Parts", "rust-the-good-parts"; "collapse separators")]
    #[test_case("C++ & Rust: 2024", "c-rust-2024"; "punctuation")]
    #[test_case("日本語 タイトル", "日本語-タイトル"; "non latin script")]
    #[test_case("!!!", ""; "no alphanumerics")]
    #[test_case("\u{0345}", "\u{0345}"; "alphabetic combining mark")]
    #[test]
    fn slugify_titles(title: &str, expect: &str) {
        pretty_assertions::assert_eq!(slugify(title), expect);
    }

    #[test]
    fn slugify_is_idempotent() {
        for title in ["Hello World", "Ærøskøbing Ünïcödé", "İstanbul", "a--b__c", "ß Straße"] {
            let once = slugify(title);
            assert_eq!(slugify(&once), once);
            assert!(!once.chars().any(char::is_whitespace));
            assert!(!once.is_empty());
        }
    }

    #[test]
    fn slugify_keeps_every_alphanumeric_scalar() {
        for c in ('\0'..=char::MAX).filter(|c| c.is_alphanumeric()) {
            let slug = slugify(&c.to_string());
            assert!(!slug.is_empty(), "U+{:04X} slugged to nothing", c as u32);
            assert_eq!(slugify(&slug), slug, "U+{:04X} is not stable", c as u32);
        }
    }

    #[test]
    fn slugify_keeps_indic_vowel_signs() {
        let slug = slugify("हिंदी ब्लॉग");
        assert!(slug.starts_with("हिंदी-"));
        assert!(slug.contains('\u{0949}'));
    }

    #[test]
    fn filenames_and_paths() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(filename_for("Hello World", date), "2024-03-01-hello-world.md");
        assert_eq!(
            post_path(&HexoLayout::default(), "Hello World", true, date),
            "source/_drafts/2024-03-01-hello-world.md"
        );
        assert_eq!(slug_from_filename("2024-03-01-hello-world.md"), "hello-world");
        assert_eq!(slug_from_filename("about.md"), "about");
        assert_eq!(slug_from_filename("2024-13-01-bad-month.md"), "2024-13-01-bad-month");
    }

    #[test]
    fn resolve_date_fallbacks() {
        let now = at("2030-01-01T00:00:00+00:00");
        let mut frontmatter = Frontmatter {
            date: Some("2024-03-01T09:30:00+08:00".into()),
            ..Frontmatter::default()
        };
        assert_eq!(
            resolve_date(&frontmatter, "2020-01-01-a.md", now),
            at("2024-03-01T09:30:00+08:00")
        );

        frontmatter.date = Some("yesterday-ish".into());
        assert_eq!(
            resolve_date(&frontmatter, "2020-01-01-a.md", now),
            at("2020-01-01T00:00:00+00:00")
        );

        assert_eq!(resolve_date(&frontmatter, "about.md", now), now);
    }

    #[test]
    fn parse_hexo_timestamps() {
        assert_eq!(
            parse_timestamp("2024-03-01 09:30:00"),
            Some(at("2024-03-01T09:30:00+00:00"))
        );
        assert_eq!(
            parse_timestamp("2024-03-01"),
            Some(at("2024-03-01T00:00:00+00:00"))
        );
        assert_eq!(parse_timestamp("March 1st"), None);
        assert_eq!(
            format_timestamp(&at("2024-03-01T09:30:00+08:00")),
            "2024-03-01T09:30:00+08:00"
        );
    }
}
