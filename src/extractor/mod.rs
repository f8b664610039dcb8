//! Turns a results page into job records.
//!
//! The site's markup drifts between requests (A/B tests, country variants,
//! partially hydrated pages), so every field is located through an ordered
//! list of [`Probe`]s and the first one that matches wins.

mod pagination;

use scraper::{ElementRef, Html, Selector};
use serde_json::Map;
use tracing::{debug, info, warn};
use url::Url;

use crate::models::{
    JobRecord, PageExtractionResult, NOT_AVAILABLE, NOT_SPECIFIED, UNKNOWN_COUNT,
};

pub use pagination::{find_next_page, NextPage, NextPageMethod};

/// One way of locating an element inside a scope.
#[derive(Debug, Clone, Copy)]
pub enum Probe {
    /// First element matching a CSS selector
    Css(&'static str),
    /// First `tag` element whose class attribute contains `needle`, ignoring case
    ClassContains {
        tag: &'static str,
        needle: &'static str,
    },
}

impl Probe {
    pub fn locate<'a>(&self, scope: ElementRef<'a>) -> Option<ElementRef<'a>> {
        match *self {
            Self::Css(css) => {
                let selector = Selector::parse(css).ok()?;
                scope.select(&selector).next()
            }
            Self::ClassContains { tag, needle } => {
                let selector = Selector::parse(tag).ok()?;
                scope
                    .select(&selector)
                    .find(|el| class_contains(el, needle))
            }
        }
    }
}

/// Ordered probes for one listing field.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub probes: &'static [Probe],
}

impl FieldRule {
    /// Trimmed text of the first probe that matches with non-empty text.
    pub fn text(&self, scope: ElementRef<'_>) -> Option<String> {
        self.probes
            .iter()
            .filter_map(|probe| probe.locate(scope))
            .map(|el| element_text(&el))
            .find(|text| !text.is_empty())
    }

    /// `href` of the first probe that matches an element carrying one.
    pub fn href<'a>(&self, scope: ElementRef<'a>) -> Option<&'a str> {
        self.probes
            .iter()
            .filter_map(|probe| probe.locate(scope))
            .find_map(|el| el.value().attr("href"))
    }
}

pub const TITLE: FieldRule = FieldRule {
    name: "title",
    probes: &[
        Probe::Css("h2.jobTitle"),
        Probe::Css("[data-testid='jobTitle']"),
        Probe::ClassContains { tag: "h2", needle: "jobtitle" },
    ],
};

pub const COMPANY: FieldRule = FieldRule {
    name: "company",
    probes: &[
        Probe::Css("span[data-testid='company-name']"),
        Probe::Css("span.companyName"),
        Probe::ClassContains { tag: "span", needle: "company" },
    ],
};

pub const LOCATION: FieldRule = FieldRule {
    name: "location",
    probes: &[
        Probe::Css("div[data-testid='text-location']"),
        Probe::Css("div.companyLocation"),
        Probe::ClassContains { tag: "div", needle: "location" },
    ],
};

pub const DATE_POSTED: FieldRule = FieldRule {
    name: "date_posted",
    probes: &[
        Probe::Css("span.date"),
        Probe::Css("span[data-testid='myJobsStateDate']"),
    ],
};

pub const JOB_LINK: FieldRule = FieldRule {
    name: "url",
    probes: &[
        Probe::ClassContains { tag: "a", needle: "jobtitle" },
        Probe::Css("a[data-jk]"),
    ],
};

pub const JOB_COUNT: FieldRule = FieldRule {
    name: "job_count",
    probes: &[Probe::Css("div[class*='jobsearch-JobCountAndSortPane-jobCount']")],
};

/// Card selectors, primary first.
pub const CARD_SELECTORS: &[&str] = &["div.job_seen_beacon", "div[data-testid='jobListing']"];

/// Fragments the site mixes into the posting date text.
pub const DATE_NOISE: &[&str] = &["EmployerActive", "Employer Active"];

/// Parse a results page into records, count estimate, and next page link.
pub fn extract_page(html: &str, base: &Url) -> PageExtractionResult {
    let document = Html::parse_document(html);

    let total_count = extract_count(&document);
    let cards = extract_cards(&document);
    if cards.is_empty() {
        return PageExtractionResult::empty(total_count);
    }

    let mut records = Vec::with_capacity(cards.len());
    for (index, card) in cards.iter().enumerate() {
        match extract_one(*card, base) {
            Some(record) => records.push(record),
            None => debug!("Skipping card {} without a title", index + 1),
        }
    }

    let next_page_url = find_next_page(
        &document,
        base,
        records.len(),
        total_count_number(&total_count),
    )
    .map(|next| next.url);

    PageExtractionResult {
        cards_found: cards.len(),
        records,
        next_page_url,
        total_count,
    }
}

/// Best-effort total result count, or the unknown sentinel.
pub fn extract_count(document: &Html) -> String {
    match JOB_COUNT.text(document.root_element()) {
        Some(count) => {
            info!("Found job count: {}", count);
            count
        }
        None => {
            warn!("Could not find job count element");
            UNKNOWN_COUNT.to_string()
        }
    }
}

/// Listing fragments in document order, from the first selector that yields any.
pub fn extract_cards(document: &Html) -> Vec<ElementRef<'_>> {
    for (attempt, css) in CARD_SELECTORS.iter().enumerate() {
        let Ok(selector) = Selector::parse(css) else {
            continue;
        };
        let cards: Vec<_> = document.select(&selector).collect();
        if !cards.is_empty() {
            if attempt == 0 {
                info!("Found {} job cards", cards.len());
            } else {
                info!("Found {} job cards using alternative selector {}", cards.len(), css);
            }
            return cards;
        }
        warn!("No job cards matched {}", css);
    }

    warn!("No job cards found, the page structure might have changed");
    Vec::new()
}

/// Build a record from one card. `None` when no title can be found.
pub fn extract_one(card: ElementRef<'_>, base: &Url) -> Option<JobRecord> {
    let title = TITLE.text(card)?;

    let url = JOB_LINK
        .href(card)
        .and_then(|href| base.join(href).ok())
        .map_or_else(|| NOT_AVAILABLE.to_string(), String::from);

    Some(JobRecord {
        title,
        company: text_or_default(card, &COMPANY),
        location: text_or_default(card, &LOCATION),
        date_posted: clean_date(&text_or_default(card, &DATE_POSTED)),
        url,
        description: String::new(),
        structured_data: Map::new(),
    })
}

/// Digits of the largest number in a count text such as "1,234 jobs".
pub fn total_count_number(text: &str) -> Option<u64> {
    text.split_whitespace()
        .filter_map(|token| {
            let digits = token.trim_end_matches('+').replace(',', "");
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                digits.parse().ok()
            } else {
                None
            }
        })
        .max()
}

fn text_or_default(card: ElementRef<'_>, rule: &FieldRule) -> String {
    rule.text(card).unwrap_or_else(|| {
        debug!("Field {} not found, using default", rule.name);
        NOT_SPECIFIED.to_string()
    })
}

fn clean_date(raw: &str) -> String {
    let cleaned = DATE_NOISE
        .iter()
        .fold(raw.to_string(), |text, noise| text.replace(noise, ""));
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        NOT_SPECIFIED.to_string()
    } else {
        cleaned.to_string()
    }
}

pub(crate) fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn class_contains(el: &ElementRef<'_>, needle: &str) -> bool {
    el.value()
        .attr("class")
        .is_some_and(|class| class.to_lowercase().contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn base() -> Url {
        Url::parse("https://uk.indeed.com").unwrap()
    }

    fn first_card(html: &str) -> Option<JobRecord> {
        let document = Html::parse_document(html);
        let cards = extract_cards(&document);
        cards.first().and_then(|card| extract_one(*card, &base()))
    }

    #[test]
    fn extracts_all_fields_from_primary_selectors() {
        let html = r#"
            <div class="job_seen_beacon">
              <h2 class="jobTitle"><a class="jcs-JobTitle" href="/rc/clk?jk=abc">
                <span>Junior   AI Engineer</span></a></h2>
              <span data-testid="company-name">Acme</span>
              <div data-testid="text-location">London</div>
              <span class="date">EmployerActive 3 days ago</span>
            </div>"#;

        let record = first_card(html).unwrap();
        assert_eq!(
            record,
            JobRecord {
                title: "Junior AI Engineer".to_string(),
                company: "Acme".to_string(),
                location: "London".to_string(),
                date_posted: "3 days ago".to_string(),
                url: "https://uk.indeed.com/rc/clk?jk=abc".to_string(),
                description: String::new(),
                structured_data: Map::new(),
            }
        );
    }

    #[test]
    fn falls_back_to_secondary_company_selector() {
        let html = r#"
            <div class="job_seen_beacon">
              <h2 class="jobTitle">Analyst</h2>
              <span class="companyName">Globex</span>
            </div>"#;

        assert_eq!(first_card(html).unwrap().company, "Globex");
    }

    #[test]
    fn falls_back_to_class_substring_for_location() {
        let html = r#"
            <div class="job_seen_beacon">
              <h2 class="jobTitle">Analyst</h2>
              <div class="css-1restlb eu4oa1w0 JobLocationText">Leeds</div>
            </div>"#;

        assert_eq!(first_card(html).unwrap().location, "Leeds");
    }

    #[test]
    fn missing_fields_become_sentinels() {
        let html = r#"<div class="job_seen_beacon"><h2 class="jobTitle">Analyst</h2></div>"#;

        let record = first_card(html).unwrap();
        assert_eq!(record.company, NOT_SPECIFIED);
        assert_eq!(record.location, NOT_SPECIFIED);
        assert_eq!(record.date_posted, NOT_SPECIFIED);
        assert_eq!(record.url, NOT_AVAILABLE);
        assert_eq!(record.description, "");
    }

    #[test]
    fn link_falls_back_to_data_jk_anchor() {
        let html = r#"
            <div class="job_seen_beacon">
              <h2 class="jobTitle">Analyst</h2>
              <a data-jk="42" href="/viewjob?jk=42">view</a>
            </div>"#;

        assert_eq!(first_card(html).unwrap().url, "https://uk.indeed.com/viewjob?jk=42");
    }

    #[test]
    fn card_without_title_is_skipped_but_others_survive() {
        let html = r#"
            <div class="job_seen_beacon"><span class="companyName">Nameless</span></div>
            <div class="job_seen_beacon"><h2 class="jobTitle">Second</h2></div>
            <div class="job_seen_beacon"><h2 class="jobTitle">Third</h2></div>"#;

        let page = extract_page(html, &base());
        assert_eq!(page.cards_found, 3);
        let titles: Vec<_> = page.records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Second", "Third"]);
    }

    #[test]
    fn alternate_card_selector_is_used() {
        let html = r#"
            <div data-testid="jobListing"><h2 class="jobTitle">One</h2></div>
            <div data-testid="jobListing"><h2 class="jobTitle">Two</h2></div>"#;

        let page = extract_page(html, &base());
        assert_eq!(page.records.len(), 2);
    }

    #[test]
    fn page_without_cards_is_empty_and_final() {
        let html = r#"
            <html><head><link rel="canonical" href="https://uk.indeed.com/jobs?q=x&start=10"></head>
            <body><a aria-label="Next Page" href="/jobs?q=x&start=20">Next</a></body></html>"#;

        let page = extract_page(html, &base());
        assert!(page.records.is_empty());
        assert_eq!(page.next_page_url, None);
        assert_eq!(page.total_count, UNKNOWN_COUNT);
    }

    #[test]
    fn count_is_read_when_present() {
        let html = r#"
            <div class="jobsearch-JobCountAndSortPane-jobCount css-xyz"><span>1,234 jobs</span></div>
            <div class="job_seen_beacon"><h2 class="jobTitle">One</h2></div>"#;

        let page = extract_page(html, &base());
        assert_eq!(page.total_count, "1,234 jobs");
    }

    #[test]
    fn count_number_takes_largest_figure() {
        assert_eq!(total_count_number("1,234 jobs"), Some(1234));
        assert_eq!(total_count_number("Page 2 of 350+ jobs"), Some(350));
        assert_eq!(total_count_number(UNKNOWN_COUNT), None);
    }
}
