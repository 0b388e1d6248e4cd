//! Offline product URL identification
//!
//! Maps a product page URL to a brand, product name and confidence using a
//! domain table and the URL's path, without fetching the page.

pub mod domains;
pub mod url_parser;

pub use domains::{domain_trust, lookup_domain, DomainInfo, Tier};
pub use url_parser::{parse_product_url, ParsedUrl, UrlError};
