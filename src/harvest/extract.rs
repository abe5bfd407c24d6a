//! Image URL extraction from HTML pages
//!
//! Pages are scanned with a prioritized signal chain: explicit cover
//! containers, Open Graph / Twitter meta tags, JSON-LD blocks, every `<img>`
//! on the page, and finally a raw URL regex over the page text when nothing
//! else produced a result. The scan is regex-based and tolerant of broken
//! markup; it never fails, it just finds fewer URLs.

use crate::utils::{absolutize, decode_html_entities, extension_from_url};
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

#[allow(clippy::expect_used)]
static START_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<([a-zA-Z][a-zA-Z0-9-]*)((?:\s[^>]*)?)>").expect("start tag pattern is valid")
});

#[allow(clippy::expect_used)]
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)([a-zA-Z_:][-a-zA-Z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
        .expect("attribute pattern is valid")
});

#[allow(clippy::expect_used)]
static JSON_LD_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]*type\s*=\s*["']?application/ld\+json["']?[^>]*>(.*?)</script>"#)
        .expect("JSON-LD pattern is valid")
});

#[allow(clippy::expect_used)]
static MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("markup pattern is valid"));

#[allow(clippy::expect_used)]
static RAW_IMAGE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)https?://[^\s"'<>()\\]+?\.(?:jpe?g|png|webp)(?:\?[^\s"'<>()\\]*)?"#)
        .expect("raw image URL pattern is valid")
});

/// Containers that conventionally hold a front page on kiosk-style sites
const COVER_CONTAINERS: &[&str] = &[
    "#portada",
    ".portada",
    "#frontpage",
    ".frontpage",
    ".front-page",
    "#cover",
    ".cover",
    ".tapa",
];

static COVER_SELECTORS: LazyLock<Vec<SimpleSelector>> = LazyLock::new(|| {
    COVER_CONTAINERS
        .iter()
        .filter_map(|s| SimpleSelector::parse(s))
        .collect()
});

const META_IMAGE_KEYS: &[&str] = &[
    "og:image",
    "og:image:url",
    "og:image:secure_url",
    "twitter:image",
    "twitter:image:src",
];

const VOID_ELEMENTS: &[&str] = &["img", "meta", "link", "source", "br", "hr", "input"];

/// Which signal produced an extracted URL
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signal {
    /// Explicit or conventional cover container
    Selector,
    /// `og:image` / `twitter:image` meta tag
    Meta,
    /// JSON-LD `image`, `contentUrl` or `thumbnailUrl`
    StructuredData,
    /// Any `<img>` or `<source>` on the page
    ImageTag,
    /// Bare image URL found in the page text
    RawUrl,
}

/// An absolute image URL found on a page
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageImage {
    /// Absolute http(s) URL
    pub url: String,
    /// Signal that found it
    pub signal: Signal,
}

/// Extract up to `limit` distinct image URLs from a page, best signals first
///
/// When `selector` is given and matches images, only those are returned;
/// otherwise the generic chain runs.
pub fn extract_image_urls(
    html: &str,
    page_url: &Url,
    selector: Option<&SimpleSelector>,
    limit: usize,
) -> Vec<PageImage> {
    let mut found = Collector::new(page_url, limit);

    if let Some(selector) = selector {
        found.extend(Signal::Selector, selector.image_refs(html));
        if !found.is_empty() {
            return found.images;
        }
        tracing::debug!(page = %page_url, "Explicit selector matched no images");
    }

    for selector in COVER_SELECTORS.iter() {
        found.extend(Signal::Selector, selector.image_refs(html));
    }
    found.extend(Signal::Meta, meta_image_refs(html));
    found.extend(Signal::StructuredData, json_ld_image_refs(html));
    found.extend(
        Signal::ImageTag,
        tags(html)
            .filter(|t| t.name == "img" || t.name == "source")
            .flat_map(|t| image_tag_refs(&t)),
    );

    if found.is_empty() {
        let unescaped = html.replace("\\/", "/");
        found.extend(
            Signal::RawUrl,
            RAW_IMAGE_URL
                .find_iter(&unescaped)
                .map(|m| m.as_str().to_string())
                .collect::<Vec<_>>(),
        );
    }

    found.images
}

/// A linked image tile on an index page
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tile {
    /// Link target, titles, image alt texts and visible text, space separated
    pub text: String,
    /// Absolute URL of the tile's image
    pub image: String,
}

/// Every `<a>` element that wraps an image
pub fn linked_tiles(html: &str, page_url: &Url) -> Vec<Tile> {
    let lower = html.to_ascii_lowercase();
    tags(html)
        .filter(|t| t.name == "a")
        .filter_map(|anchor| {
            let inner = inner_html(html, &lower, &anchor);
            let mut text: Vec<String> = ["href", "title", "aria-label"]
                .iter()
                .filter_map(|attr| anchor.attr(attr).map(str::to_string))
                .collect();
            let mut image = None;
            for nested in tags(inner).filter(|t| t.name == "img" || t.name == "source") {
                text.extend(
                    ["alt", "title"]
                        .iter()
                        .filter_map(|attr| nested.attr(attr).map(str::to_string)),
                );
                if image.is_none() {
                    image = image_tag_refs(&nested)
                        .iter()
                        .find_map(|r| absolutize(page_url, r));
                }
            }
            text.push(decode_html_entities(MARKUP.replace_all(inner, " ").trim()));
            Some(Tile {
                text: text.join(" "),
                image: image?,
            })
        })
        .collect()
}

struct Collector<'a> {
    base: &'a Url,
    limit: usize,
    seen: HashSet<String>,
    images: Vec<PageImage>,
}

impl<'a> Collector<'a> {
    fn new(base: &'a Url, limit: usize) -> Self {
        Self {
            base,
            limit,
            seen: HashSet::new(),
            images: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    fn extend(&mut self, signal: Signal, refs: impl IntoIterator<Item = String>) {
        for reference in refs {
            if self.images.len() >= self.limit {
                return;
            }
            let Some(url) = absolutize(self.base, &reference) else {
                continue;
            };
            if self.seen.insert(url.clone()) {
                self.images.push(PageImage { url, signal });
            }
        }
    }
}

/// A parsed start tag
#[derive(Debug)]
struct Tag {
    name: String,
    attrs: Vec<(String, String)>,
    self_closing: bool,
    end: usize,
}

impl Tag {
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.trim().is_empty())
    }

    fn is_void(&self) -> bool {
        self.self_closing || VOID_ELEMENTS.contains(&self.name.as_str())
    }
}

fn tags(html: &str) -> impl Iterator<Item = Tag> + '_ {
    START_TAG.captures_iter(html).filter_map(|caps| {
        let end = caps.get(0)?.end();
        let raw_attrs = caps.get(2).map_or("", |m| m.as_str());
        let attrs = ATTRIBUTE
            .captures_iter(raw_attrs)
            .filter_map(|a| {
                let name = a.get(1)?.as_str().to_ascii_lowercase();
                let value = a.get(2).or(a.get(3)).or(a.get(4))?.as_str();
                Some((name, decode_html_entities(value)))
            })
            .collect();
        Some(Tag {
            name: caps.get(1)?.as_str().to_ascii_lowercase(),
            attrs,
            self_closing: raw_attrs.trim_end().ends_with('/'),
            end,
        })
    })
}

/// Content between a start tag and its matching end tag
///
/// Unclosed elements extend to the end of the document.
fn inner_html<'h>(html: &'h str, lower: &str, tag: &Tag) -> &'h str {
    if tag.is_void() {
        return "";
    }
    let open = format!("<{}", tag.name);
    let close = format!("</{}", tag.name);
    let mut depth = 1usize;
    let mut pos = tag.end;
    loop {
        let Some(close_at) = lower[pos..].find(&close).map(|i| pos + i) else {
            return &html[tag.end..];
        };
        let nested_open = find_open_tag(&lower[pos..close_at], &open).map(|i| pos + i);
        if let Some(open_at) = nested_open {
            depth += 1;
            pos = open_at + open.len();
            continue;
        }
        depth -= 1;
        if depth == 0 {
            return &html[tag.end..close_at];
        }
        pos = close_at + close.len();
    }
}

/// Position of `<name` followed by whitespace, `>` or `/`
fn find_open_tag(haystack: &str, open: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(i) = haystack[from..].find(open) {
        let at = from + i;
        match haystack[at + open.len()..].chars().next() {
            Some(c) if c.is_ascii_whitespace() || c == '>' || c == '/' => return Some(at),
            _ => from = at + open.len(),
        }
    }
    None
}

/// URLs an `<img>` or `<source>` tag points at, best resolution first
fn image_tag_refs(tag: &Tag) -> Vec<String> {
    let mut refs = Vec::new();
    for attr in ["srcset", "data-srcset"] {
        if let Some(best) = tag.attr(attr).and_then(largest_srcset_entry) {
            refs.push(best);
        }
    }
    for attr in ["data-src", "data-original", "data-lazy-src", "src"] {
        if let Some(value) = tag.attr(attr) {
            refs.push(value.trim().to_string());
        }
    }
    refs
}

/// Largest entry of a `srcset` (by `w` or `x` descriptor)
fn largest_srcset_entry(srcset: &str) -> Option<String> {
    srcset
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split_whitespace();
            let url = parts.next()?;
            let weight = parts
                .next()
                .and_then(|d| d.trim_end_matches(['w', 'x']).parse::<f64>().ok())
                .unwrap_or(1.0);
            Some((url, weight))
        })
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(url, _)| url.to_string())
}

fn meta_image_refs(html: &str) -> Vec<String> {
    tags(html)
        .filter(|t| t.name == "meta")
        .filter(|t| {
            t.attr("property")
                .or(t.attr("name"))
                .is_some_and(|key| META_IMAGE_KEYS.contains(&key.to_ascii_lowercase().as_str()))
        })
        .filter_map(|t| t.attr("content").map(str::to_string))
        .collect()
}

fn json_ld_image_refs(html: &str) -> Vec<String> {
    let mut refs = Vec::new();
    for caps in JSON_LD_BLOCK.captures_iter(html) {
        let Some(body) = caps.get(1) else {
            continue;
        };
        match serde_json::from_str::<Value>(body.as_str().trim()) {
            Ok(value) => collect_structured_images(&value, &mut refs),
            Err(e) => tracing::trace!(error = %e, "Skipping malformed JSON-LD block"),
        }
    }
    refs
}

fn collect_structured_images(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if matches!(key.as_str(), "image" | "contentUrl" | "thumbnailUrl") {
                    push_structured_image(child, out);
                }
                collect_structured_images(child, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_structured_images(item, out);
            }
        }
        _ => {}
    }
}

fn push_structured_image(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(url) => out.push(url.clone()),
        Value::Array(items) => items.iter().for_each(|v| push_structured_image(v, out)),
        Value::Object(map) => {
            if let Some(Value::String(url)) = map.get("url") {
                out.push(url.clone());
            }
        }
        _ => {}
    }
}

/// One step of a [`SimpleSelector`]: `tag`, `#id`, `.class` or a combination
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl Compound {
    fn parse(text: &str) -> Option<Self> {
        let mut compound = Compound::default();
        let mut rest = text;
        let tag_len = rest
            .find(['#', '.'])
            .unwrap_or(rest.len());
        if tag_len > 0 {
            let tag = &rest[..tag_len];
            if tag != "*" {
                if !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                    return None;
                }
                compound.tag = Some(tag.to_ascii_lowercase());
            }
            rest = &rest[tag_len..];
        }
        while let Some(kind) = rest.chars().next() {
            let body = &rest[1..];
            let len = body.find(['#', '.']).unwrap_or(body.len());
            let name = &body[..len];
            if name.is_empty()
                || !name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return None;
            }
            match kind {
                '#' => compound.id = Some(name.to_string()),
                _ => compound.classes.push(name.to_string()),
            }
            rest = &body[len..];
        }
        Some(compound)
    }

    fn matches(&self, tag: &Tag) -> bool {
        if let Some(name) = &self.tag
            && *name != tag.name
        {
            return false;
        }
        if let Some(id) = &self.id
            && tag.attr("id") != Some(id.as_str())
        {
            return false;
        }
        if self.classes.is_empty() {
            return true;
        }
        let classes: Vec<&str> = tag
            .attr("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default();
        self.classes.iter().all(|c| classes.contains(&c.as_str()))
    }
}

/// Minimal CSS selector: comma-separated groups of descendant compounds
///
/// Supports `tag`, `#id`, `.class`, their combinations (`div.cover`,
/// `img#portada.big`) and the descendant combinator (`.portada img`).
/// Attribute selectors, pseudo-classes and `>`/`+`/`~` are rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimpleSelector {
    groups: Vec<Vec<Compound>>,
}

impl SimpleSelector {
    /// Parse a selector, returning None for unsupported syntax
    pub fn parse(selector: &str) -> Option<Self> {
        let groups = selector
            .split(',')
            .map(|group| {
                group
                    .split_whitespace()
                    .map(Compound::parse)
                    .collect::<Option<Vec<_>>>()
                    .filter(|steps| !steps.is_empty())
            })
            .collect::<Option<Vec<_>>>()?;
        (!groups.is_empty()).then_some(Self { groups })
    }

    /// Raw image references inside (or on) the matched elements
    fn image_refs(&self, html: &str) -> Vec<String> {
        let mut refs = Vec::new();
        for steps in &self.groups {
            let mut scopes: Vec<&str> = vec![html];
            let mut matched: Vec<(Tag, &str)> = Vec::new();
            for (i, step) in steps.iter().enumerate() {
                matched = scopes
                    .iter()
                    .flat_map(|&scope| {
                        let lower = scope.to_ascii_lowercase();
                        tags(scope)
                            .filter(|t| step.matches(t))
                            .map(|t| {
                                let inner = inner_html(scope, &lower, &t);
                                (t, inner)
                            })
                            .collect::<Vec<_>>()
                    })
                    .collect();
                if i + 1 < steps.len() {
                    scopes = matched.iter().map(|(_, inner)| *inner).collect();
                }
            }
            for (tag, inner) in &matched {
                refs.extend(element_image_refs(tag, inner));
            }
        }
        refs
    }
}

fn element_image_refs(tag: &Tag, inner: &str) -> Vec<String> {
    let mut refs = Vec::new();
    let mut visit = |t: &Tag| match t.name.as_str() {
        "img" | "source" => refs.extend(image_tag_refs(t)),
        "a" => {
            if let Some(href) = t.attr("href")
                && extension_from_url(href).is_some()
            {
                refs.push(href.to_string());
            }
        }
        "meta" => {
            if let Some(content) = t.attr("content") {
                refs.push(content.to_string());
            }
        }
        _ => {}
    };
    visit(tag);
    for nested in tags(inner) {
        visit(&nested);
    }
    refs
}
