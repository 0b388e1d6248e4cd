//! Domain to brand table

use crate::types::Category;

/// Price tier of a brand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Luxury,
    Premium,
    Mid,
    Value,
}

/// What a domain tells us about the products it sells
#[derive(Debug)]
pub struct DomainInfo {
    pub domain: &'static str,
    /// `None` for multi-brand retailers
    pub brand: Option<&'static str>,
    pub category: Category,
    pub tier: Tier,
    pub aliases: &'static [&'static str],
    pub is_retailer: bool,
}

macro_rules! brand_site {
    ($domain:expr, $brand:expr, $category:ident, $tier:ident $(, [$($alias:expr),*])?) => {
        DomainInfo {
            domain: $domain,
            brand: Some($brand),
            category: Category::$category,
            tier: Tier::$tier,
            aliases: &[$($($alias),*)?],
            is_retailer: false,
        }
    };
}

macro_rules! retailer {
    ($domain:expr, $category:ident, $tier:ident) => {
        DomainInfo {
            domain: $domain,
            brand: None,
            category: Category::$category,
            tier: Tier::$tier,
            aliases: &[],
            is_retailer: true,
        }
    };
}

pub static DOMAINS: &[DomainInfo] = &[
    // Golf
    brand_site!("pxg.com", "PXG", Golf, Luxury, ["Parsons Xtreme Golf"]),
    brand_site!("scottycameron.com", "Scotty Cameron", Golf, Luxury),
    brand_site!("taylormadegolf.com", "TaylorMade", Golf, Premium, ["TMaG"]),
    brand_site!("callawaygolf.com", "Callaway", Golf, Premium),
    brand_site!("titleist.com", "Titleist", Golf, Premium, ["Acushnet"]),
    brand_site!("vokey.com", "Vokey", Golf, Premium, ["Titleist Vokey"]),
    brand_site!("ping.com", "PING", Golf, Premium),
    brand_site!("clevelandgolf.com", "Cleveland", Golf, Premium, ["Cleveland Golf"]),
    brand_site!("mizunogolf.com", "Mizuno", Golf, Premium),
    brand_site!("cobragolf.com", "Cobra", Golf, Premium, ["Cobra Golf"]),
    brand_site!("footjoy.com", "FootJoy", Golf, Premium, ["FJ"]),
    brand_site!("wilson.com", "Wilson", Tennis, Premium, ["Wilson Sporting Goods"]),
    // Footwear, running and activewear
    brand_site!("nike.com", "Nike", Footwear, Premium),
    brand_site!("adidas.com", "adidas", Footwear, Premium),
    brand_site!("newbalance.com", "New Balance", Footwear, Mid),
    brand_site!("hoka.com", "HOKA", Running, Premium),
    brand_site!("on.com", "On", Footwear, Premium, ["On Running"]),
    brand_site!("allbirds.com", "Allbirds", Footwear, Mid),
    brand_site!("brooksrunning.com", "Brooks", Running, Mid),
    brand_site!("lululemon.com", "Lululemon", Activewear, Premium, ["lulu"]),
    brand_site!("shop.lululemon.com", "Lululemon", Activewear, Premium),
    brand_site!("aloyoga.com", "Alo Yoga", Activewear, Premium),
    brand_site!("vuoriclothing.com", "Vuori", Activewear, Premium),
    brand_site!("gymshark.com", "Gymshark", Activewear, Mid),
    // Outdoor
    brand_site!("patagonia.com", "Patagonia", Outdoor, Premium),
    brand_site!("arcteryx.com", "Arc'teryx", Outdoor, Luxury),
    brand_site!("thenorthface.com", "The North Face", Outdoor, Premium, ["TNF"]),
    brand_site!("yeti.com", "YETI", Outdoor, Premium),
    brand_site!("osprey.com", "Osprey", Outdoor, Premium),
    brand_site!("stanley1913.com", "Stanley", Outdoor, Mid),
    // Tech and audio
    brand_site!("apple.com", "Apple", Tech, Premium),
    brand_site!("samsung.com", "Samsung", Tech, Premium),
    brand_site!("store.google.com", "Google", Tech, Premium),
    brand_site!("sony.com", "Sony", Audio, Premium),
    brand_site!("bose.com", "Bose", Audio, Premium),
    brand_site!("sonos.com", "Sonos", Audio, Premium),
    brand_site!("sennheiser.com", "Sennheiser", Audio, Premium),
    brand_site!("garmin.com", "Garmin", Wearables, Premium),
    brand_site!("logitech.com", "Logitech", Gaming, Mid),
    brand_site!("dji.com", "DJI", Photography, Premium),
    brand_site!("gopro.com", "GoPro", Photography, Mid),
    // Fashion, eyewear, travel
    brand_site!("ray-ban.com", "Ray-Ban", Eyewear, Premium),
    brand_site!("oakley.com", "Oakley", Eyewear, Premium),
    brand_site!("warbyparker.com", "Warby Parker", Eyewear, Mid),
    brand_site!("gucci.com", "Gucci", Fashion, Luxury),
    brand_site!("rimowa.com", "Rimowa", Travel, Luxury),
    brand_site!("awaytravel.com", "Away", Travel, Premium),
    brand_site!("tumi.com", "Tumi", Travel, Luxury),
    // Beauty, home, kitchen
    brand_site!("charlottetilbury.com", "Charlotte Tilbury", Makeup, Luxury),
    brand_site!("fentybeauty.com", "Fenty Beauty", Makeup, Premium),
    brand_site!("glossier.com", "Glossier", Makeup, Mid),
    brand_site!("dyson.com", "Dyson", Haircare, Premium),
    brand_site!("lecreuset.com", "Le Creuset", Kitchen, Premium),
    brand_site!("vitamix.com", "Vitamix", Kitchen, Premium),
    brand_site!("hermanmiller.com", "Herman Miller", Office, Luxury),
    brand_site!("benchmade.com", "Benchmade", Edc, Premium),
    brand_site!("fender.com", "Fender", Music, Premium),
    // Retailers
    retailer!("amazon.com", Other, Value),
    retailer!("amazon.co.uk", Other, Value),
    retailer!("target.com", Other, Value),
    retailer!("walmart.com", Other, Value),
    retailer!("bestbuy.com", Tech, Mid),
    retailer!("rei.com", Outdoor, Mid),
    retailer!("backcountry.com", Outdoor, Mid),
    retailer!("dickssportinggoods.com", Fitness, Mid),
    retailer!("golfgalaxy.com", Golf, Mid),
    retailer!("pgatoursuperstore.com", Golf, Mid),
    retailer!("globalgolf.com", Golf, Value),
    retailer!("nordstrom.com", Fashion, Premium),
    retailer!("ssense.com", Fashion, Luxury),
    retailer!("zappos.com", Footwear, Mid),
    retailer!("runningwarehouse.com", Running, Mid),
    retailer!("sephora.com", Beauty, Premium),
    retailer!("ulta.com", Beauty, Mid),
    retailer!("crateandbarrel.com", Home, Mid),
    retailer!("williams-sonoma.com", Kitchen, Premium),
    retailer!("etsy.com", Other, Value),
    retailer!("ebay.com", Other, Value),
];

/// Strip scheme-less noise from a host: lowercase and drop a leading `www.`
pub fn clean_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('.').to_lowercase();
    host.strip_prefix("www.").map(str::to_string).unwrap_or(host)
}

/// Look up a host, falling back to parent domains ("shop.nike.com" -> nike.com)
pub fn lookup_domain(host: &str) -> Option<&'static DomainInfo> {
    let host = clean_host(host);
    let mut candidate = host.as_str();
    loop {
        if let Some(info) = DOMAINS.iter().find(|d| d.domain == candidate) {
            return Some(info);
        }
        match candidate.split_once('.') {
            Some((_, rest)) if rest.contains('.') => candidate = rest,
            _ => return None,
        }
    }
}

/// The brand's own domain, if known
pub fn brand_domain(brand: &str) -> Option<&'static DomainInfo> {
    let needle = brand.trim().to_lowercase();
    DOMAINS.iter().find(|d| {
        d.brand.map(|b| b.to_lowercase() == needle).unwrap_or(false)
            || d.aliases.iter().any(|a| a.to_lowercase() == needle)
    })
}

/// Trust in a result host for a given brand
///
/// The brand's own site scores 1.0 (any brand site when the brand is unknown),
/// a known retailer 0.8, anything else 0.4.
pub fn domain_trust(host: &str, brand: Option<&str>) -> f32 {
    match lookup_domain(host) {
        Some(info) if info.is_retailer => 0.8,
        Some(info) => match (brand, info.brand) {
            (None, _) => 1.0,
            (Some(wanted), Some(site_brand)) if site_brand.eq_ignore_ascii_case(wanted.trim()) => 1.0,
            (Some(wanted), _) if info.aliases.iter().any(|a| a.eq_ignore_ascii_case(wanted.trim())) => 1.0,
            _ => 0.4,
        },
        None => 0.4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_strips_www_and_subdomains() {
        assert_eq!(lookup_domain("www.nike.com").and_then(|d| d.brand), Some("Nike"));
        assert_eq!(lookup_domain("shop.Patagonia.com").and_then(|d| d.brand), Some("Patagonia"));
        assert!(lookup_domain("example.org").is_none());
    }

    #[test]
    fn test_more_specific_entry_wins() {
        let info = lookup_domain("store.google.com").unwrap();
        assert_eq!(info.brand, Some("Google"));
        assert!(lookup_domain("google.com").is_none());
    }

    #[test]
    fn test_retailer_has_no_brand() {
        let info = lookup_domain("www.amazon.co.uk").unwrap();
        assert!(info.is_retailer);
        assert!(info.brand.is_none());
    }

    #[test]
    fn test_domain_trust() {
        assert_eq!(domain_trust("www.titleist.com", Some("Titleist")), 1.0);
        assert_eq!(domain_trust("titleist.com", None), 1.0);
        assert_eq!(domain_trust("titleist.com", Some("Callaway")), 0.4);
        assert_eq!(domain_trust("golfgalaxy.com", Some("Titleist")), 0.8);
        assert_eq!(domain_trust("someblog.net", Some("Titleist")), 0.4);
    }

    #[test]
    fn test_brand_domain() {
        assert_eq!(brand_domain("arc'teryx").map(|d| d.domain), Some("arcteryx.com"));
        assert_eq!(brand_domain("TNF").map(|d| d.domain), Some("thenorthface.com"));
    }
}
