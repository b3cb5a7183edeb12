//! DOM field extraction for catalog and detail pages. Pure, no I/O.

use scraper::{Html, Selector};

/// One listing extracted from a catalog page, before category lookup.
#[derive(Debug, Clone)]
pub struct Listing {
    /// Title from the listing's link `title` attribute.
    pub title: String,
    /// Raw price text, currency symbol included.
    pub price_text: String,
    /// Raw availability text, or `"Unknown"` when the element is missing.
    pub availability: String,
    /// Relative href of the product detail page, if present.
    pub detail_href: Option<String>,
}

/// Extract all listings from a catalog page.
///
/// Listings with no title are dropped; other missing fields degrade to empty
/// or `"Unknown"` text and are resolved during enrichment.
pub fn parse_listings(html: &str) -> Vec<Listing> {
    let doc = Html::parse_document(html);

    let pod_sel = Selector::parse("article.product_pod").unwrap();
    let link_sel = Selector::parse("h3 a").unwrap();
    let price_sel = Selector::parse("p.price_color").unwrap();
    let avail_sel = Selector::parse("p.instock.availability").unwrap();

    let mut listings = Vec::new();

    for pod in doc.select(&pod_sel) {
        let Some(link) = pod.select(&link_sel).next() else {
            continue;
        };

        let title = link
            .value()
            .attr("title")
            .map(str::trim)
            .map(String::from)
            .unwrap_or_else(|| link.text().collect::<String>().trim().to_string());

        if title.is_empty() {
            continue;
        }

        let price_text = pod
            .select(&price_sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        let availability = pod
            .select(&avail_sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_else(|| "Unknown".to_string());

        let detail_href = link.value().attr("href").map(String::from);

        listings.push(Listing {
            title,
            price_text,
            availability,
            detail_href,
        });
    }

    listings
}

/// Extract the category from a product detail page's breadcrumb.
///
/// The category is the third breadcrumb link (Home › Books › <category>).
pub fn extract_category(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let crumb_sel = Selector::parse("ul.breadcrumb a").unwrap();

    let category = doc
        .select(&crumb_sel)
        .nth(2)?
        .text()
        .collect::<String>()
        .trim()
        .to_string();

    (!category.is_empty()).then_some(category)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG_PAGE: &str = r#"<html><body>
        <article class="product_pod">
            <h3><a href="a-light-in-the-attic_1000/index.html" title="A Light in the Attic">A Light in ...</a></h3>
            <p class="price_color">£51.77</p>
            <p class="instock availability">
                In stock (22 available)
            </p>
        </article>
        <article class="product_pod">
            <h3><a href="tipping-the-velvet_999/index.html" title="Tipping the Velvet">Tipping the ...</a></h3>
            <p class="price_color">£53.74</p>
            <p class="instock availability">In stock</p>
        </article>
    </body></html>"#;

    #[test]
    fn parses_listings_from_catalog_page() {
        let listings = parse_listings(CATALOG_PAGE);
        assert_eq!(listings.len(), 2);

        assert_eq!(listings[0].title, "A Light in the Attic");
        assert_eq!(listings[0].price_text, "£51.77");
        assert_eq!(listings[0].availability, "In stock (22 available)");
        assert_eq!(
            listings[0].detail_href.as_deref(),
            Some("a-light-in-the-attic_1000/index.html")
        );

        assert_eq!(listings[1].title, "Tipping the Velvet");
    }

    #[test]
    fn missing_availability_degrades_to_unknown() {
        let html = r#"<article class="product_pod">
            <h3><a href="x/index.html" title="Bare Listing">Bare</a></h3>
            <p class="price_color">£10.00</p>
        </article>"#;

        let listings = parse_listings(html);
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].availability, "Unknown");
    }

    #[test]
    fn page_without_listings_is_empty() {
        assert!(parse_listings("<html><body><p>404 Not Found</p></body></html>").is_empty());
    }

    #[test]
    fn extracts_category_from_breadcrumb() {
        let html = r#"<ul class="breadcrumb">
            <li><a href="/">Home</a></li>
            <li><a href="/books">Books</a></li>
            <li><a href="/books/poetry">Poetry</a></li>
            <li class="active">A Light in the Attic</li>
        </ul>"#;

        assert_eq!(extract_category(html).as_deref(), Some("Poetry"));
    }

    #[test]
    fn short_breadcrumb_yields_none() {
        let html = r#"<ul class="breadcrumb"><li><a href="/">Home</a></li></ul>"#;
        assert_eq!(extract_category(html), None);
    }
}
