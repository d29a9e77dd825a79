//! Small helpers shared by the scraping adapters.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Attributes that carry an image location, lazy-loading variants included.
pub const IMG_SRC_ATTRS: &[&str] = &["src", "data-src", "data-lazy-src", "data-original", "data-url"];

static SEL_IMG: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").unwrap());
static SEL_BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").unwrap());

/// Whitespace-collapsed text content of an element.
pub fn text_of(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(|t| t.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

/// First non-empty attribute among `names`.
pub fn attr_of(el: ElementRef<'_>, names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|n| el.value().attr(n))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

/// Nearest card-like ancestor of a result link (list item, article, or an
/// `item`/`card` div), or the link itself when it stands alone.
pub fn card_of(anchor: ElementRef<'_>) -> ElementRef<'_> {
    anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .take(4)
        .find(|el| {
            let value = el.value();
            match value.name() {
                "li" | "article" => true,
                "div" => value
                    .attr("class")
                    .is_some_and(|c| c.contains("item") || c.contains("card")),
                _ => false,
            }
        })
        .unwrap_or(anchor)
}

/// Inline, vector and placeholder images never make a usable poster.
///
/// Only the scheme, the extension and the file name are inspected, so a
/// directory such as `/svg-covers/` does not disqualify a raster poster.
pub fn is_placeholder_image(src: &str) -> bool {
    let src = src.trim();
    let lower = src.to_lowercase();
    if src.len() < 5
        || lower.starts_with("data:")
        || lower.starts_with("<svg")
        || lower.contains(";base64,")
    {
        return true;
    }
    let path = lower.split(['?', '#']).next().unwrap_or_default();
    let file = path.rsplit('/').next().unwrap_or_default();
    let stem = file.split('.').next().unwrap_or_default();
    path.ends_with(".svg")
        || file.starts_with("dual-")
        || stem == "placeholder"
        || stem.starts_with("placeholder-")
        || stem.starts_with("placeholder_")
}

/// Poster of a result card: the first real source of the first image, else
/// any image that looks like an uploaded raster file.
pub fn card_poster(card: ElementRef<'_>) -> Option<String> {
    let first = card.select(&SEL_IMG).next().and_then(|img| {
        IMG_SRC_ATTRS
            .iter()
            .filter_map(|name| img.value().attr(name))
            .map(str::trim)
            .find(|src| !is_placeholder_image(src))
            .map(str::to_string)
    });
    if first.is_some() {
        return first;
    }
    card.select(&SEL_IMG)
        .filter_map(|img| attr_of(img, &IMG_SRC_ATTRS[..3]))
        .find(|src| {
            (src.contains("/uploads/")
                || src.contains(".jpg")
                || src.contains(".png")
                || src.contains(".webp"))
                && !is_placeholder_image(src)
        })
}

/// Whitespace-collapsed text of the whole `<body>`.
pub fn page_text(doc: &Html) -> String {
    doc.select(&SEL_BODY)
        .next()
        .map(text_of)
        .unwrap_or_default()
}

/// Resolve `href` against `base`. Already-absolute links come back unchanged.
pub fn absolute_url(base: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    match Url::parse(base).and_then(|b| b.join(href)) {
        Ok(url) => url.to_string(),
        Err(_) => href.to_string(),
    }
}

/// Path (plus query) of `href`, with a leading `/`, whether it was absolute or relative.
pub fn path_of(href: &str) -> String {
    if let Ok(url) = Url::parse(href) {
        return match url.query() {
            Some(q) => format!("{}?{q}", url.path()),
            None => url.path().to_string(),
        };
    }
    if href.starts_with('/') {
        href.to_string()
    } else {
        format!("/{href}")
    }
}

/// Host part of `url`, with scheme, e.g. `https://player.example.com`.
pub fn origin_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}://{host}:{port}", parsed.scheme()),
        None => format!("{}://{host}", parsed.scheme()),
    })
}

/// `the-last-of-us-d12` → `The Last Of Us D12`.
pub fn slug_to_title(slug: &str) -> String {
    slug.split('-')
        .filter(|w| !w.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Lowercase and strip Turkish diacritics for loose title matching.
pub fn fold_turkish(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter_map(|c| match c {
            'ç' => Some('c'),
            'ğ' => Some('g'),
            'ı' => Some('i'),
            'ö' => Some('o'),
            'ş' => Some('s'),
            'ü' => Some('u'),
            'â' => Some('a'),
            'î' => Some('i'),
            'û' => Some('u'),
            '\u{307}' => None,
            other => Some(other),
        })
        .collect()
}

/// Folded text with every non-alphanumeric run collapsed to a single space.
pub fn normalize_for_match(text: &str) -> String {
    fold_turkish(text)
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Loose match between a query and a scraped title or slug: either side may
/// contain the other, or every query word appears somewhere in them.
pub fn matches_query(query: &str, title: &str, slug: &str) -> bool {
    let query = normalize_for_match(query);
    if query.is_empty() {
        return true;
    }
    let title = normalize_for_match(title);
    let slug = normalize_for_match(slug);
    let contains = |hay: &str| !hay.is_empty() && (hay.contains(&query) || query.contains(hay));
    if contains(&title) || contains(&slug) {
        return true;
    }
    let haystack = format!("{title} {slug}");
    query
        .split_whitespace()
        .all(|word| haystack.contains(word))
}

/// First number in `text`.
pub fn first_number(text: &str) -> Option<u32> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_links_are_absolutized() {
        assert_eq!(
            absolute_url("https://site.example.com/dizi/a", "/uploads/p.jpg"),
            "https://site.example.com/uploads/p.jpg"
        );
        assert_eq!(
            absolute_url("https://site.example.com", "//cdn.example.com/p.jpg"),
            "https://cdn.example.com/p.jpg"
        );
        assert_eq!(
            absolute_url("https://site.example.com", "https://cdn.example.com/p.jpg"),
            "https://cdn.example.com/p.jpg"
        );
    }

    #[test]
    fn paths_are_extracted_from_any_href() {
        assert_eq!(path_of("https://tv.example.com/gibi-7-bolum-izle"), "/gibi-7-bolum-izle");
        assert_eq!(path_of("gibi-7-bolum-izle"), "/gibi-7-bolum-izle");
        assert_eq!(path_of("/bolum/gibi-1x2"), "/bolum/gibi-1x2");
        assert_eq!(
            path_of("https://x.example.com/iframe.php?v=abc"),
            "/iframe.php?v=abc"
        );
    }

    #[test]
    fn origin_keeps_scheme_and_port() {
        assert_eq!(
            origin_of("https://player.example.com/embed/1").as_deref(),
            Some("https://player.example.com")
        );
        assert_eq!(
            origin_of("http://127.0.0.1:8080/x").as_deref(),
            Some("http://127.0.0.1:8080")
        );
        assert_eq!(origin_of("not a url"), None);
    }

    #[test]
    fn slugs_become_titles() {
        assert_eq!(slug_to_title("kurtlar-vadisi"), "Kurtlar Vadisi");
        assert_eq!(slug_to_title("çukur"), "Çukur");
    }

    #[test]
    fn query_matching_ignores_turkish_diacritics() {
        assert!(matches_query("Çukur", "Cukur", "cukur"));
        assert!(matches_query("gibi", "Gibi", "gibi-d24"));
        assert!(matches_query("kurtlar vadisi", "", "kurtlar-vadisi-pusu"));
        assert!(!matches_query("ezel", "Gibi", "gibi"));
    }

    #[test]
    fn longer_queries_match_shorter_titles() {
        assert!(matches_query("gibi dizisi izle", "Gibi", ""));
        assert_eq!(normalize_for_match("  Şahsiyet: 2.Sezon! "), "sahsiyet 2 sezon");
    }

    #[test]
    fn cards_are_found_around_result_links() {
        let doc = Html::parse_fragment(
            r#"<ul><li class="x"><a href="/dizi/gibi"><span>Gibi</span></a>
                 <img src="data:image/svg+xml;base64,AAA" data-src="/uploads/series/gibi.webp"></li></ul>
               <a id="bare" href="/film/tek"><img src="/img/icon.svg"></a>"#,
        );
        let sel = Selector::parse("a").unwrap();
        let links: Vec<_> = doc.select(&sel).collect();

        let card = card_of(links[0]);
        assert_eq!(card.value().name(), "li");
        assert_eq!(card_poster(card).as_deref(), Some("/uploads/series/gibi.webp"));

        let bare = card_of(links[1]);
        assert_eq!(bare.value().name(), "a");
        assert!(is_placeholder_image("/img/icon.svg"));
        assert!(!is_placeholder_image("/uploads/series/gibi.webp"));
    }

    #[test]
    fn placeholder_checks_ignore_incidental_substrings() {
        for src in [
            "data:image/png;base64,iVBORw0KGgo=",
            "/img/logo.SVG?v=2",
            "https://cdn.example.com/img/dual-poster.jpg",
            "https://cdn.example.com/img/placeholder.png",
            "<svg viewBox='0 0 1 1'></svg>",
            "/a",
        ] {
            assert!(is_placeholder_image(src), "{src}");
        }
        for src in [
            "https://cdn.example.com/svg-covers/gibi.jpg",
            "https://cdn.example.com/uploads/series/placeholders-dizisi.webp",
            "https://cdn.example.com/uploads/individual-poster.jpg",
            "https://cdn.example.com/uploads/base64-dizi.png",
        ] {
            assert!(!is_placeholder_image(src), "{src}");
        }
    }

    #[test]
    fn first_number_in_text() {
        assert_eq!(first_number("Süre: 120 dk"), Some(120));
        assert_eq!(first_number("yok"), None);
    }
}
