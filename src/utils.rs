//! Utility functions for URL templates, date tokens and file naming

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

/// Date tokens embedded in URL paths: `/2025/12/20/`, `2025-12-20`, `20251220`
///
/// Anchored at the slice start; [`url_dates`] tries it at every digit that
/// follows a non-digit, so adjacent tokens sharing a separator are all found.
#[allow(clippy::expect_used)]
static URL_DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        ^(?:
            (?P<y1>20[0-9]{2})/(?P<m1>[01][0-9])/(?P<d1>[0-3][0-9])(?:/|$)
          | (?P<y2>20[0-9]{2})[-_](?P<m2>[01][0-9])[-_](?P<d2>[0-3][0-9])(?:[^0-9]|$)
          | (?P<y3>20[0-9]{2})(?P<m3>[01][0-9])(?P<d3>[0-3][0-9])(?:[^0-9]|$)
        )",
    )
    .expect("URL date pattern is valid")
});

/// Values substituted into source URL templates
#[derive(Clone, Debug, Default)]
pub struct TemplateVars<'a> {
    /// Requested date
    pub date: Option<NaiveDate>,
    /// Publisher country code
    pub country: Option<&'a str>,
    /// CDN slug variant
    pub slug: Option<&'a str>,
    /// Publisher id
    pub id: Option<&'a str>,
    /// CDN size suffix
    pub size: Option<&'a str>,
    /// Social media handle
    pub handle: Option<&'a str>,
}

/// Expand `{placeholder}` tokens in a URL template
///
/// Unknown placeholders, and placeholders without a value, are left untouched.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use frontpage_dl::utils::{expand_template, TemplateVars};
///
/// let vars = TemplateVars {
///     date: NaiveDate::from_ymd_opt(2025, 12, 20),
///     country: Some("es"),
///     slug: Some("elpais"),
///     size: Some("750"),
///     ..Default::default()
/// };
/// assert_eq!(
///     expand_template("https://img.kiosko.net/{yyyy}/{mm}/{dd}/{country}/{slug}.{size}.jpg", &vars),
///     "https://img.kiosko.net/2025/12/20/es/elpais.750.jpg"
/// );
/// ```
#[must_use]
pub fn expand_template(template: &str, vars: &TemplateVars<'_>) -> String {
    let mut out = template.to_string();
    if let Some(date) = vars.date {
        out = out
            .replace("{yyyy}", &format!("{:04}", date.year()))
            .replace("{mm}", &format!("{:02}", date.month()))
            .replace("{dd}", &format!("{:02}", date.day()))
            .replace("{date}", &date.format("%Y-%m-%d").to_string());
    }
    let simple = [
        ("{country}", vars.country),
        ("{slug}", vars.slug),
        ("{id}", vars.id),
        ("{size}", vars.size),
        ("{handle}", vars.handle),
    ];
    for (token, value) in simple {
        if let Some(value) = value {
            out = out.replace(token, value);
        }
    }
    out
}

/// Extract every date token embedded in a URL
///
/// Only well-formed calendar dates are returned; `20251340` is ignored.
#[must_use]
pub fn url_dates(url: &str) -> Vec<NaiveDate> {
    let bytes = url.as_bytes();
    let starts = (0..bytes.len())
        .filter(|&i| bytes[i].is_ascii_digit() && (i == 0 || !bytes[i - 1].is_ascii_digit()));
    let mut dates = Vec::new();
    for start in starts {
        let Some(caps) = URL_DATE_PATTERN.captures(&url[start..]) else {
            continue;
        };
        let parts = [("y1", "m1", "d1"), ("y2", "m2", "d2"), ("y3", "m3", "d3")]
            .iter()
            .find_map(|(y, m, d)| Some((caps.name(y)?, caps.name(m)?, caps.name(d)?)));
        let Some((y, m, d)) = parts else {
            continue;
        };
        let (Ok(y), Ok(m), Ok(d)) = (
            y.as_str().parse::<i32>(),
            m.as_str().parse::<u32>(),
            d.as_str().parse::<u32>(),
        ) else {
            continue;
        };
        if let Some(date) = NaiveDate::from_ymd_opt(y, m, d)
            && !dates.contains(&date)
        {
            dates.push(date);
        }
    }
    dates
}

/// Raster extension from a URL path, normalized (`jpeg` becomes `jpg`)
#[must_use]
pub fn extension_from_url(url: &str) -> Option<&'static str> {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_ascii_lowercase(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .unwrap_or(url)
            .to_ascii_lowercase(),
    };
    let ext = path.rsplit_once('.').map(|(_, ext)| ext)?;
    match ext {
        "jpg" | "jpeg" => Some("jpg"),
        "png" => Some("png"),
        "webp" => Some("webp"),
        "gif" => Some("gif"),
        "avif" => Some("avif"),
        _ => None,
    }
}

/// File extension for an image content type
#[must_use]
pub fn extension_from_content_type(content_type: &str) -> Option<&'static str> {
    match normalize_content_type(content_type).as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/avif" => Some("avif"),
        _ => None,
    }
}

/// Lowercased MIME type without parameters (`image/JPEG; q=1` becomes `image/jpeg`)
#[must_use]
pub fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Whether a content type denotes a raster image (`image/*` except SVG)
#[must_use]
pub fn is_raster_content_type(content_type: &str) -> bool {
    let normalized = normalize_content_type(content_type);
    normalized.starts_with("image/") && !normalized.starts_with("image/svg")
}

/// Resolve a possibly relative reference against a page URL
///
/// Returns None for `data:` URIs, fragments, and anything that does not end
/// up as an http(s) URL.
#[must_use]
pub fn absolutize(base: &url::Url, reference: &str) -> Option<String> {
    let reference = decode_html_entities(reference.trim());
    if reference.is_empty() || reference.starts_with("data:") || reference.starts_with('#') {
        return None;
    }
    let joined = base.join(&reference).ok()?;
    match joined.scheme() {
        "http" | "https" => Some(joined.to_string()),
        _ => None,
    }
}

/// Decode the handful of HTML entities that show up inside attribute values
#[must_use]
pub fn decode_html_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    s.replace("&amp;", "&")
        .replace("&#38;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&#x2F;", "/")
        .replace("&#47;", "/")
}

/// Lowercase, accent-folded alphanumeric tokens of a text
///
/// Tokens shorter than `min_len` are dropped.
///
/// # Examples
///
/// ```
/// use frontpage_dl::utils::tokenize;
///
/// assert_eq!(tokenize("El País - Edición", 2), vec!["el", "pais", "edicion"]);
/// ```
#[must_use]
pub fn tokenize(text: &str, min_len: usize) -> Vec<String> {
    let folded: String = text.chars().map(fold_char).collect();
    folded
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| t.len() >= min_len)
        .map(str::to_string)
        .collect()
}

fn fold_char(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'Á' | 'À' | 'Â' | 'Ä' | 'Ã' => 'a',
        'é' | 'è' | 'ê' | 'ë' | 'É' | 'È' | 'Ê' | 'Ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' | 'Í' | 'Ì' | 'Î' | 'Ï' => 'i',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' | 'Ó' | 'Ò' | 'Ô' | 'Ö' | 'Õ' => 'o',
        'ú' | 'ù' | 'û' | 'ü' | 'Ú' | 'Ù' | 'Û' | 'Ü' => 'u',
        'ñ' | 'Ñ' => 'n',
        'ç' | 'Ç' => 'c',
        other => other.to_ascii_lowercase(),
    }
}

/// Deterministic file stem for a (publisher, date) cover
#[must_use]
pub fn cover_file_stem(publisher_id: &str, date: NaiveDate) -> String {
    let safe: String = publisher_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_{}", safe, date.format("%Y-%m-%d"))
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn expand_template_leaves_missing_values() {
        let vars = TemplateVars {
            country: Some("pt"),
            ..Default::default()
        };
        assert_eq!(
            expand_template("https://{country}.example/{date}/{slug}", &vars),
            "https://pt.example/{date}/{slug}"
        );
    }

    #[test]
    fn expand_template_formats_iso_date() {
        let vars = TemplateVars {
            date: Some(date(2025, 1, 5)),
            ..Default::default()
        };
        assert_eq!(expand_template("/{date}/", &vars), "/2025-01-05/");
        assert_eq!(expand_template("{yyyy}{mm}{dd}", &vars), "20250105");
    }

    #[test]
    fn url_dates_finds_slash_separated_path() {
        let dates = url_dates("https://img.kiosko.net/2025/12/19/es/elpais.750.jpg");
        assert_eq!(dates, vec![date(2025, 12, 19)]);
    }

    #[test]
    fn url_dates_finds_iso_and_compact_forms() {
        assert_eq!(
            url_dates("https://cdn.example.com/portada-2025-12-20.jpg"),
            vec![date(2025, 12, 20)]
        );
        assert_eq!(
            url_dates("https://cdn.example.com/covers/20251220_front.jpg"),
            vec![date(2025, 12, 20)]
        );
    }

    #[test]
    fn url_dates_finds_adjacent_tokens_sharing_a_separator() {
        assert_eq!(
            url_dates("https://cdn.example.com/2025/12/20/20251219.jpg"),
            vec![date(2025, 12, 20), date(2025, 12, 19)]
        );
        assert_eq!(
            url_dates("https://cdn.example.com/2025-12-20_2025-12-19.jpg"),
            vec![date(2025, 12, 20), date(2025, 12, 19)]
        );
        assert_eq!(
            url_dates("https://cdn.example.com/2025/12/20/2025/12/19/p.jpg"),
            vec![date(2025, 12, 20), date(2025, 12, 19)]
        );
    }

    #[test]
    fn url_dates_ignores_invalid_and_embedded_numbers() {
        assert!(url_dates("https://example.com/img/20251340.jpg").is_empty());
        assert!(url_dates("https://example.com/img/12345678901.jpg").is_empty());
        assert!(url_dates("https://example.com/cover.jpg").is_empty());
    }

    #[test]
    fn extension_from_url_ignores_query() {
        assert_eq!(
            extension_from_url("https://example.com/a/b.JPEG?w=100"),
            Some("jpg")
        );
        assert_eq!(extension_from_url("https://example.com/a/b.php?img=1.png"), None);
        assert_eq!(extension_from_url("https://example.com/image"), None);
    }

    #[test]
    fn content_type_helpers() {
        assert_eq!(extension_from_content_type("image/webp"), Some("webp"));
        assert_eq!(extension_from_content_type("IMAGE/JPEG; charset=x"), Some("jpg"));
        assert!(is_raster_content_type("image/png"));
        assert!(!is_raster_content_type("image/svg+xml"));
        assert!(!is_raster_content_type("text/html; charset=utf-8"));
    }

    #[test]
    fn absolutize_resolves_relative_and_rejects_data_uris() {
        let base = url::Url::parse("https://es.kiosko.net/es/np/elpais.html").unwrap();
        assert_eq!(
            absolutize(&base, "/img/a.jpg").as_deref(),
            Some("https://es.kiosko.net/img/a.jpg")
        );
        assert_eq!(
            absolutize(&base, "//img.kiosko.net/x.jpg?a=1&amp;b=2").as_deref(),
            Some("https://img.kiosko.net/x.jpg?a=1&b=2")
        );
        assert_eq!(absolutize(&base, "data:image/png;base64,AAAA"), None);
        assert_eq!(absolutize(&base, "javascript:void(0)"), None);
    }

    #[test]
    fn tokenize_folds_accents_and_drops_short_tokens() {
        assert_eq!(
            tokenize("Jornal de Notícias", 3),
            vec!["jornal", "noticias"]
        );
    }

    #[test]
    fn cover_file_stem_sanitizes_id() {
        assert_eq!(
            cover_file_stem("le monde/fr", date(2025, 12, 20)),
            "le_monde_fr_2025-12-20"
        );
    }
}
