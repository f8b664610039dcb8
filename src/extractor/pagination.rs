//! Next-page discovery

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};
use url::Url;

use super::{class_contains, element_text, CARD_SELECTORS};

/// Query parameter carrying the result offset.
pub const OFFSET_PARAM: &str = "start";

const NEXT_TOKENS: &[&str] = &["next", "arrow"];

/// How the next page link was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextPageMethod {
    AriaLabel,
    TestId,
    TextOrClass,
    Synthesized,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextPage {
    pub url: String,
    pub method: NextPageMethod,
}

/// Locate the next results page.
///
/// Explicit navigation markers are tried before textual heuristics. When the
/// page had records but no navigation widget, the canonical URL's offset is
/// advanced by `records_found`, unless `total_hint` says that would run past
/// the end of the result set.
pub fn find_next_page(
    document: &Html,
    base: &Url,
    records_found: usize,
    total_hint: Option<u64>,
) -> Option<NextPage> {
    let found = labeled_link(document, base, "a[aria-label='Next Page']", NextPageMethod::AriaLabel)
        .or_else(|| {
            labeled_link(
                document,
                base,
                "a[data-testid='pagination-page-next']",
                NextPageMethod::TestId,
            )
        })
        .or_else(|| text_or_class_link(document, base))
        .or_else(|| synthesize(document, base, records_found, total_hint));

    match &found {
        Some(next) => info!("Found next page URL ({:?}): {}", next.method, next.url),
        None => info!("No next page URL found - this appears to be the last page"),
    }
    found
}

fn labeled_link(document: &Html, base: &Url, css: &str, method: NextPageMethod) -> Option<NextPage> {
    let selector = Selector::parse(css).ok()?;
    let href = document.select(&selector).find_map(|a| a.value().attr("href"))?;
    let url = base.join(href).ok()?;

    Some(NextPage {
        url: url.into(),
        method,
    })
}

/// Links whose text or class mentions "next"/"arrow". Listing title links
/// are skipped so a posting like "Next.js Developer" is never followed.
fn text_or_class_link(document: &Html, base: &Url) -> Option<NextPage> {
    let selector = Selector::parse("a[href]").ok()?;
    let cards: Vec<Selector> = CARD_SELECTORS
        .iter()
        .filter_map(|css| Selector::parse(css).ok())
        .collect();
    let links: Vec<ElementRef<'_>> = document
        .select(&selector)
        .filter(|a| !inside_card(a, &cards))
        .collect();

    let by_text = links.iter().find(|a| {
        let text = element_text(a).to_lowercase();
        NEXT_TOKENS.iter().any(|token| text.contains(token))
    });
    let by_class = || {
        links
            .iter()
            .find(|a| NEXT_TOKENS.iter().any(|token| class_contains(a, token)))
    };

    let link = by_text.or_else(by_class)?;
    let url = base.join(link.value().attr("href")?).ok()?;

    Some(NextPage {
        url: url.into(),
        method: NextPageMethod::TextOrClass,
    })
}

fn inside_card(anchor: &ElementRef<'_>, cards: &[Selector]) -> bool {
    anchor
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|el| cards.iter().any(|card| card.matches(&el)))
}

fn synthesize(
    document: &Html,
    base: &Url,
    records_found: usize,
    total_hint: Option<u64>,
) -> Option<NextPage> {
    if records_found == 0 {
        return None;
    }

    let selector = Selector::parse("link[rel='canonical']").ok()?;
    let href = document
        .select(&selector)
        .find_map(|link| link.value().attr("href"))?;
    let canonical = base.join(href).ok()?;

    let url = advance_offset(&canonical, records_found as u64, total_hint)?;
    Some(NextPage {
        url: url.into(),
        method: NextPageMethod::Synthesized,
    })
}

/// Return `url` with its offset parameter moved forward by `step`, adding
/// the parameter when missing. `None` if the new offset reaches `total_hint`.
pub fn advance_offset(url: &Url, step: u64, total_hint: Option<u64>) -> Option<Url> {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let current = pairs
        .iter()
        .find(|(key, _)| key == OFFSET_PARAM)
        .and_then(|(_, value)| value.parse::<u64>().ok());
    let next = current.unwrap_or(0) + step;

    if let Some(total) = total_hint
        && next >= total
    {
        debug!("Offset {} reaches the reported total of {}, not paginating", next, total);
        return None;
    }

    match pairs.iter_mut().find(|(key, _)| key == OFFSET_PARAM) {
        Some(pair) => pair.1 = next.to_string(),
        None => pairs.push((OFFSET_PARAM.to_string(), next.to_string())),
    }

    let mut advanced = url.clone();
    advanced.query_pairs_mut().clear().extend_pairs(pairs);
    Some(advanced)
}
