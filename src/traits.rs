//! Traits and site configuration shared by the fetcher and the extractor

use async_trait::async_trait;

use crate::models::Fragment;

/// Configuration for the marketplace being watched
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Display name for the website
    pub name: String,
    /// Absolute origin that relative listing links are resolved against
    pub base_url: String,
    /// Search URL pattern with {location} and {query} placeholders
    pub search_url_pattern: String,
    /// CSS selectors for extracting data
    pub selectors: SiteSelectors,
}

/// CSS selectors for the parts of a listing card
#[derive(Debug, Clone)]
pub struct SiteSelectors {
    /// Repeated block representing one listing card
    pub listing_card: String,
    /// Primary heading inside a card
    pub title: String,
    /// Primary image inside a card
    pub image: String,
    /// Primary link inside a card
    pub link: String,
}

impl SiteConfig {
    /// Facebook Marketplace search results, as rendered by the desktop site
    pub fn facebook_marketplace() -> Self {
        Self {
            name: "Facebook Marketplace".to_string(),
            base_url: "https://www.facebook.com".to_string(),
            search_url_pattern:
                "https://www.facebook.com/marketplace/{location}/search/?query={query}&exact=false"
                    .to_string(),
            selectors: SiteSelectors {
                listing_card: "div.x9f619.x78zum5.x1r8uery.xdt5ytf.x1iyjqo2.xs83m0k.x1e558r4.x150jy0e.x1iorvi4.xjkvuk6.xnpuxes.x291uyu.x1uepa24".to_string(),
                title: "span.x1lliihq.x6ikm8r.x10wlt62.x1n2onr6".to_string(),
                image: "img.xt7dq6l.xl1xv1r.x6ikm8r.x10wlt62.xh8yej3".to_string(),
                link: "a.x1i10hfl.xjbqb8w.x1a2a7pz.x1heor9g.x1lku1pv".to_string(),
            },
        }
    }

    /// Build the marketplace search URL for a location slug and query
    pub fn build_search_url(&self, location: &str, query: &str) -> String {
        let encoded_query = urlencoding::encode(query);
        self.search_url_pattern
            .replace("{location}", location)
            .replace("{query}", &encoded_query)
    }

    /// Resolve a link found in a card against the site origin
    pub fn absolute_url(&self, href: &str) -> String {
        if href.starts_with("http") {
            href.to_string()
        } else if href.starts_with("//") {
            format!("https:{href}")
        } else if href.starts_with('/') {
            format!("{}{}", self.base_url, href)
        } else {
            format!("{}/{}", self.base_url, href)
        }
    }
}

/// Source of listing fragments for one (location, query) search.
///
/// Implementations absorb their own failures: an unreachable or misbehaving
/// source yields an empty vector.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Fetch the listing cards currently shown for the search
    async fn fetch(&self, location: &str, query: &str) -> Vec<Fragment>;
}
