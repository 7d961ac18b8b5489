//! Field extraction from listing card markup.
//!
//! Every field has its own rule and fails on its own: a card without an image
//! still yields its title, price and so on. Text-based rules run against the
//! card's flattened text, which is every text node trimmed and concatenated
//! without a separator. Adjacent nodes therefore run together, e.g. a price
//! node `$18,500` followed by a title node `2018 BMW` reads `$18,5002018 BMW`.

use std::sync::LazyLock;

use anyhow::{Result, anyhow, bail};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::trace;

use crate::models::{Fragment, PartialRecord};
use crate::traits::SiteConfig;

/// Amount followed directly by a plausible model year (1950-2029) that starts
/// the title; only the amount is captured.
static PRICE_WITH_YEAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\$\d{1,3}(?:,\d{3})+|\$\d+)(?:19[5-9]\d|20[0-2]\d)\s").unwrap()
});
static PRICE_WITH_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\d{1,3}(?:,\d{3})+").unwrap());
static PRICE_BARE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\d+").unwrap());

static MILEAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?K)\s?(?:km|mi)").unwrap());

static LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Z][a-z]+(?: [A-Z][a-z]+)*), [A-Z]{2}").unwrap());

/// A single way of finding a price in flattened text
pub type PriceStrategy = fn(&str) -> Option<String>;

/// Price strategies in priority order; the first match wins.
pub const PRICE_STRATEGIES: &[(&str, PriceStrategy)] = &[
    ("amount_before_year", price_before_model_year),
    ("amount_with_separator", price_with_separator),
    ("bare_amount", bare_price),
];

pub fn price_before_model_year(text: &str) -> Option<String> {
    PRICE_WITH_YEAR
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn price_with_separator(text: &str) -> Option<String> {
    PRICE_WITH_SEPARATOR.find(text).map(|m| m.as_str().to_string())
}

pub fn bare_price(text: &str) -> Option<String> {
    PRICE_BARE.find(text).map(|m| m.as_str().to_string())
}

pub fn extract_price(text: &str) -> Option<String> {
    PRICE_STRATEGIES.iter().find_map(|(name, strategy)| {
        let price = strategy(text)?;
        trace!(strategy = name, %price, "Matched price");
        Some(price)
    })
}

pub fn extract_mileage(text: &str) -> Option<String> {
    MILEAGE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn extract_location(text: &str) -> Option<String> {
    LOCATION
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Concatenate every trimmed text node under `element`
pub fn flatten_text(element: ElementRef<'_>) -> String {
    element.text().map(str::trim).collect()
}

/// Extracts partial records from listing cards using the site's selectors
pub struct Extractor {
    config: SiteConfig,
    title_selector: Selector,
    image_selector: Selector,
    link_selector: Selector,
}

impl Extractor {
    pub fn new(config: SiteConfig) -> Result<Self> {
        let title_selector = Selector::parse(&config.selectors.title)
            .map_err(|e| anyhow!("Failed to parse title selector: {:?}", e))?;
        let image_selector = Selector::parse(&config.selectors.image)
            .map_err(|e| anyhow!("Failed to parse image selector: {:?}", e))?;
        let link_selector = Selector::parse(&config.selectors.link)
            .map_err(|e| anyhow!("Failed to parse link selector: {:?}", e))?;

        Ok(Self {
            config,
            title_selector,
            image_selector,
            link_selector,
        })
    }

    /// Extract every field of one fragment.
    ///
    /// Fails only when the fragment carries no markup at all; missing fields
    /// are left as `None` for the validator to report.
    pub fn extract(&self, fragment: &Fragment) -> Result<PartialRecord> {
        if fragment.html.trim().is_empty() {
            bail!("listing fragment is empty");
        }

        let document = Html::parse_fragment(&fragment.html);
        let root = document.root_element();
        let text = flatten_text(root);

        Ok(PartialRecord {
            title: self.extract_title(root),
            price: extract_price(&text),
            mileage: extract_mileage(&text),
            location: extract_location(&text),
            url: self.extract_url(root),
            image: self.extract_image(root),
        })
    }

    fn extract_title(&self, root: ElementRef<'_>) -> Option<String> {
        root.select(&self.title_selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|title| !title.is_empty())
    }

    fn extract_image(&self, root: ElementRef<'_>) -> Option<String> {
        root.select(&self.image_selector)
            .next()
            .and_then(|img| img.value().attr("src"))
            .map(str::trim)
            .filter(|src| !src.is_empty())
            .map(str::to_string)
    }

    fn extract_url(&self, root: ElementRef<'_>) -> Option<String> {
        root.select(&self.link_selector)
            .next()
            .and_then(|link| link.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .map(|href| self.config.absolute_url(href))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a card in the shape the marketplace renders
    pub(crate) fn card(
        title: Option<&str>,
        price: Option<&str>,
        location: Option<&str>,
        href: Option<&str>,
        mileage: Option<&str>,
        image: Option<&str>,
    ) -> Fragment {
        let mut html = String::from(
            r#"<div class="x9f619 x78zum5 x1r8uery xdt5ytf x1iyjqo2 xs83m0k x1e558r4 x150jy0e x1iorvi4 xjkvuk6 xnpuxes x291uyu x1uepa24">"#,
        );
        if let Some(href) = href {
            html.push_str(&format!(
                r#"<a class="x1i10hfl xjbqb8w x6umtig x1b1mbwd xaqea5y xav7gou x9f619 x1ypdohk xt0psk2 xe8uvvx xdj266r x11i5rnm xat24cr x1mh8g0r xexx8yu x4uap5 x18d9i69 xkhd6sd x16tdsg8 x1hl2dhg xggy1nq x1a2a7pz x1heor9g x1lku1pv" href="{href}">"#
            ));
        } else {
            html.push_str("<div>");
        }
        if let Some(src) = image {
            html.push_str(&format!(
                r#"<img class="xt7dq6l xl1xv1r x6ikm8r x10wlt62 xh8yej3" src="{src}">"#
            ));
        }
        if let Some(price) = price {
            html.push_str(&format!("<div><span>{price}</span></div>"));
        }
        if let Some(title) = title {
            html.push_str(&format!(
                r#"<div><span class="x1lliihq x6ikm8r x10wlt62 x1n2onr6">{title}</span></div>"#
            ));
        }
        if let Some(location) = location {
            html.push_str(&format!("<div><span>{location}</span></div>"));
        }
        if let Some(mileage) = mileage {
            html.push_str(&format!("<div><span>{mileage}</span></div>"));
        }
        html.push_str(if href.is_some() { "</a>" } else { "</div>" });
        html.push_str("</div>");
        Fragment::new(html)
    }

    fn extractor() -> Extractor {
        Extractor::new(SiteConfig::facebook_marketplace()).unwrap()
    }

    #[test]
    fn test_extracts_full_card() {
        let fragment = card(
            Some("2018 BMW 3 Series"),
            Some("$18,500"),
            Some("Toronto, ON"),
            Some("/marketplace/item/123/"),
            Some("45K km"),
            Some("https://cdn.example.com/a.jpg"),
        );

        let record = extractor().extract(&fragment).unwrap();
        assert_eq!(
            record,
            PartialRecord {
                title: Some("2018 BMW 3 Series".to_string()),
                price: Some("$18,500".to_string()),
                mileage: Some("45K".to_string()),
                location: Some("Toronto".to_string()),
                url: Some("https://www.facebook.com/marketplace/item/123/".to_string()),
                image: Some("https://cdn.example.com/a.jpg".to_string()),
            }
        );
    }

    #[test]
    fn test_missing_field_does_not_affect_others() {
        let fragment = card(
            None,
            Some("$5,000"),
            Some("Etobicoke, ON"),
            Some("/marketplace/item/456/"),
            None,
            None,
        );

        let record = extractor().extract(&fragment).unwrap();
        assert_eq!(record.title, None);
        assert_eq!(record.price.as_deref(), Some("$5,000"));
        assert_eq!(record.location.as_deref(), Some("Etobicoke"));
        assert_eq!(
            record.url.as_deref(),
            Some("https://www.facebook.com/marketplace/item/456/")
        );
        assert_eq!(record.mileage, None);
        assert_eq!(record.image, None);
    }

    #[test]
    fn test_card_without_link_keeps_text_fields() {
        let fragment = card(
            Some("2015 BMW X5"),
            Some("$21,000"),
            Some("Richmond Hill, ON"),
            None,
            Some("120K km"),
            None,
        );

        let record = extractor().extract(&fragment).unwrap();
        assert_eq!(record.url, None);
        assert_eq!(record.title.as_deref(), Some("2015 BMW X5"));
        assert_eq!(record.location.as_deref(), Some("Richmond Hill"));
        assert_eq!(record.mileage.as_deref(), Some("120K"));
    }

    #[test]
    fn test_empty_fragment_is_an_error() {
        assert!(extractor().extract(&Fragment::new("   ")).is_err());
    }

    #[test]
    fn test_noise_fragment_yields_empty_record() {
        let record = extractor()
            .extract(&Fragment::new("<div><span>Sponsored</span></div>"))
            .unwrap();
        assert_eq!(record, PartialRecord::default());
    }

    #[test]
    fn test_price_discards_adjacent_model_year() {
        assert_eq!(extract_price("$18,5002018 BMW 3 Series").as_deref(), Some("$18,500"));
        assert_eq!(extract_price("$50002019 Honda Civic").as_deref(), Some("$5000"));
        assert_eq!(extract_price("$320002018 BMW").as_deref(), Some("$32000"));
        assert_eq!(price_before_model_year("$18,500BMW"), None);
    }

    #[test]
    fn test_bare_price_ending_in_year_digits_is_kept() {
        assert_eq!(extract_price("$32000BMW X5").as_deref(), Some("$32000"));
        assert_eq!(extract_price("$12000").as_deref(), Some("$12000"));
        assert_eq!(extract_price("$22000Toronto, ON").as_deref(), Some("$22000"));
        assert_eq!(price_before_model_year("$12000"), None);
    }

    #[test]
    fn test_price_strategy_order() {
        assert_eq!(price_with_separator("now $12,345 obo").as_deref(), Some("$12,345"));
        assert_eq!(price_with_separator("$900"), None);
        assert_eq!(bare_price("only $900!").as_deref(), Some("$900"));
        assert_eq!(extract_price("$1,234,567").as_deref(), Some("$1,234,567"));
        assert_eq!(extract_price("$2000").as_deref(), Some("$2000"));
        assert_eq!(extract_price("Free"), None);
    }

    #[test]
    fn test_mileage() {
        assert_eq!(extract_mileage("Toronto, ON35K km").as_deref(), Some("35K"));
        assert_eq!(extract_mileage("12.5K mi").as_deref(), Some("12.5K"));
        assert_eq!(extract_mileage("35000 km"), None);
    }

    #[test]
    fn test_location_drops_region_code() {
        assert_eq!(extract_location("2018 BMW 3 SeriesToronto, ON45K km").as_deref(), Some("Toronto"));
        assert_eq!(extract_location("Niagara Falls, ON").as_deref(), Some("Niagara Falls"));
        assert_eq!(extract_location("toronto on"), None);
    }

    #[test]
    fn test_flatten_text_trims_and_concatenates() {
        let html = Html::parse_fragment("<div> <span> $18,500 </span>\n<span>2018 BMW</span></div>");
        assert_eq!(flatten_text(html.root_element()), "$18,5002018 BMW");
    }
}
