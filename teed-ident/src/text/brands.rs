//! Brand, category keyword and color dictionaries for free-text parsing

use crate::types::Category;

/// Known brand with the spellings people type
#[derive(Debug)]
pub struct BrandEntry {
    pub name: &'static str,
    /// Lowercase alternate spellings, matched as whole phrases
    pub aliases: &'static [&'static str],
    pub category: Category,
}

macro_rules! brand {
    ($name:expr, $category:ident) => {
        BrandEntry { name: $name, aliases: &[], category: Category::$category }
    };
    ($name:expr, $category:ident, [$($alias:expr),* $(,)?]) => {
        BrandEntry { name: $name, aliases: &[$($alias),*], category: Category::$category }
    };
}

pub static BRANDS: &[BrandEntry] = &[
    // Golf
    brand!("TaylorMade", Golf, ["taylor made", "tmag"]),
    brand!("Callaway", Golf),
    brand!("Titleist", Golf),
    brand!("PING", Golf),
    brand!("Cobra", Golf, ["cobra golf"]),
    brand!("Mizuno", Golf),
    brand!("Scotty Cameron", Golf, ["cameron"]),
    brand!("Cleveland", Golf),
    brand!("Srixon", Golf),
    brand!("Odyssey", Golf),
    brand!("Bushnell", Golf),
    brand!("FootJoy", Golf, ["foot joy", "fj"]),
    // Tennis
    brand!("Babolat", Tennis),
    brand!("Wilson", Tennis),
    brand!("Head", Tennis),
    brand!("Yonex", Tennis),
    // Cycling and running
    brand!("Trek", Cycling),
    brand!("Specialized", Cycling),
    brand!("Cannondale", Cycling),
    brand!("Rapha", Cycling),
    brand!("Garmin", Wearables),
    brand!("HOKA", Running, ["hoka one one"]),
    brand!("Brooks", Running),
    brand!("Saucony", Running),
    brand!("ASICS", Running),
    // Activewear and apparel
    brand!("Nike", Footwear),
    brand!("adidas", Footwear),
    brand!("New Balance", Footwear, ["nb"]),
    brand!("On", Footwear, ["on running", "on cloud"]),
    brand!("Allbirds", Footwear),
    brand!("Lululemon", Activewear, ["lulu"]),
    brand!("Alo Yoga", Activewear, ["alo"]),
    brand!("Vuori", Activewear),
    brand!("Gymshark", Activewear),
    brand!("Under Armour", Apparel, ["ua"]),
    brand!("Patagonia", Outdoor),
    brand!("Arc'teryx", Outdoor, ["arcteryx", "arc teryx"]),
    brand!("The North Face", Outdoor, ["north face", "tnf"]),
    brand!("YETI", Outdoor),
    brand!("Osprey", Outdoor),
    brand!("Stanley", Outdoor),
    // Tech and audio
    brand!("Apple", Tech),
    brand!("Samsung", Tech),
    brand!("Google", Tech),
    brand!("Microsoft", Tech),
    brand!("Anker", Tech),
    brand!("Sony", Audio),
    brand!("Bose", Audio),
    brand!("Sennheiser", Audio),
    brand!("JBL", Audio),
    brand!("Sonos", Audio),
    brand!("Nintendo", Gaming),
    brand!("Razer", Gaming),
    brand!("Logitech", Gaming),
    brand!("Canon", Photography),
    brand!("Nikon", Photography),
    brand!("Fujifilm", Photography, ["fuji"]),
    brand!("DJI", Photography),
    brand!("GoPro", Photography, ["go pro"]),
    // Fashion, eyewear, watches
    brand!("Gucci", Fashion),
    brand!("Louis Vuitton", Fashion, ["lv"]),
    brand!("Ray-Ban", Eyewear, ["rayban", "ray ban"]),
    brand!("Oakley", Eyewear),
    brand!("Warby Parker", Eyewear),
    brand!("Rolex", Watches),
    brand!("Omega", Watches),
    brand!("Seiko", Watches),
    brand!("Tumi", Travel),
    brand!("Rimowa", Travel),
    brand!("Away", Travel),
    // Beauty
    brand!("Charlotte Tilbury", Makeup),
    brand!("Fenty Beauty", Makeup, ["fenty"]),
    brand!("Rare Beauty", Makeup),
    brand!("NARS", Makeup),
    brand!("Glossier", Makeup),
    brand!("Drunk Elephant", Skincare),
    brand!("CeraVe", Skincare),
    brand!("The Ordinary", Skincare),
    brand!("Dyson", Haircare),
    // Home and kitchen
    brand!("Le Creuset", Kitchen),
    brand!("KitchenAid", Kitchen, ["kitchen aid"]),
    brand!("Vitamix", Kitchen),
    brand!("Breville", Coffee),
    brand!("Herman Miller", Office),
    brand!("Steelcase", Office),
    // EDC and music
    brand!("Benchmade", Edc),
    brand!("Leatherman", Edc),
    brand!("Fender", Music),
    brand!("Gibson", Music),
];

/// Keywords that place an item in a category
pub static CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (Category::Golf, &["driver", "putter", "wedge", "irons", "iron", "hybrid", "fairway", "golf", "tee", "tees"]),
    (Category::Tennis, &["racket", "racquet", "tennis"]),
    (Category::Cycling, &["bike", "bicycle", "helmet", "cycling", "jersey"]),
    (Category::Running, &["running", "marathon", "trail"]),
    (Category::Snow, &["ski", "skis", "snowboard", "goggles"]),
    (Category::Fitness, &["dumbbell", "kettlebell", "yoga", "mat", "gym"]),
    (Category::Wearables, &["smartwatch", "tracker", "fitbit"]),
    (Category::Tech, &["laptop", "phone", "iphone", "ipad", "tablet", "charger", "macbook", "keyboard", "monitor"]),
    (Category::Audio, &["headphones", "earbuds", "airpods", "speaker", "soundbar"]),
    (Category::Gaming, &["console", "controller", "switch", "playstation", "xbox"]),
    (Category::Photography, &["camera", "lens", "tripod", "drone"]),
    (Category::Footwear, &["shoe", "shoes", "sneaker", "sneakers", "boot", "boots", "sandals"]),
    (Category::Apparel, &["shirt", "hoodie", "jacket", "pants", "shorts", "sweater", "tee-shirt"]),
    (Category::Eyewear, &["sunglasses", "glasses", "frames"]),
    (Category::Bags, &["backpack", "tote", "duffel", "bag", "handbag"]),
    (Category::Watches, &["watch", "chronograph"]),
    (Category::Makeup, &["lipstick", "mascara", "foundation", "blush", "concealer"]),
    (Category::Skincare, &["serum", "moisturizer", "cleanser", "sunscreen"]),
    (Category::Haircare, &["shampoo", "conditioner", "dryer", "straightener"]),
    (Category::Kitchen, &["blender", "skillet", "pan", "knife-set", "dutch"]),
    (Category::Coffee, &["espresso", "grinder", "coffee"]),
    (Category::Office, &["chair", "desk"]),
    (Category::Outdoor, &["tent", "cooler", "tumbler", "bottle", "camping", "hiking"]),
    (Category::Travel, &["luggage", "suitcase", "carry-on"]),
    (Category::Edc, &["knife", "multitool", "flashlight", "wallet"]),
    (Category::Music, &["guitar", "amp", "pedal", "keyboard-synth"]),
];

/// Color words recognized in free text and URLs
pub static COLORS: &[&str] = &[
    "black", "white", "red", "blue", "green", "navy", "grey", "gray", "brown", "tan", "beige",
    "cream", "olive", "pink", "purple", "orange", "yellow", "silver", "gold", "bronze", "copper",
    "charcoal", "midnight", "onyx", "ivory", "slate", "graphite", "heather",
];

/// Words that never belong in a product name
pub static NOISE_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "of", "for", "with", "in", "on", "at", "my", "new", "brand",
    "genuine", "authentic", "official", "original", "men", "mens", "men's", "women", "womens",
    "women's", "unisex", "buy", "shop", "sale", "discount",
];

/// Popular brands to offer when a category is known but the brand is not
pub fn category_brand_suggestions(category: Category) -> &'static [&'static str] {
    match category {
        Category::Golf => &["TaylorMade", "Callaway", "Titleist", "PING", "Cobra"],
        Category::Tennis => &["Babolat", "Wilson", "Head", "Yonex"],
        Category::Cycling => &["Trek", "Specialized", "Cannondale", "Giant", "Rapha"],
        Category::Snow => &["Burton", "Rossignol", "Atomic", "Lib Tech"],
        Category::Surf => &["Channel Islands", "Rip Curl", "Quiksilver", "Billabong"],
        Category::Tech => &["Apple", "Samsung", "Sony", "Google", "Microsoft"],
        Category::Audio => &["Bose", "Sony", "Sennheiser", "Bang & Olufsen", "JBL"],
        Category::Gaming => &["Sony", "Microsoft", "Nintendo", "Razer", "Logitech"],
        Category::Photography => &["Canon", "Nikon", "Sony", "Fujifilm", "DJI"],
        Category::Fashion => &["Gucci", "Louis Vuitton", "Ralph Lauren", "Burberry"],
        Category::Apparel => &["Nike", "adidas", "Under Armour", "Everlane"],
        Category::Footwear => &["Nike", "New Balance", "HOKA", "On", "Allbirds"],
        Category::Activewear => &["Lululemon", "Alo Yoga", "Vuori", "Rhone", "Gymshark"],
        Category::Watches => &["Rolex", "Omega", "TAG Heuer", "Seiko", "Grand Seiko"],
        Category::Eyewear => &["Ray-Ban", "Oakley", "Warby Parker", "Oliver Peoples"],
        Category::Beauty => &["Charlotte Tilbury", "MAC", "Fenty Beauty", "Rare Beauty", "NARS"],
        Category::Makeup => &["Charlotte Tilbury", "MAC", "Fenty Beauty", "NARS", "Glossier"],
        Category::Skincare => &["La Mer", "Drunk Elephant", "CeraVe", "The Ordinary"],
        Category::Home => &["Restoration Hardware", "West Elm", "Pottery Barn", "Article"],
        Category::Kitchen => &["Le Creuset", "All-Clad", "KitchenAid", "Vitamix"],
        Category::Bedding => &["Brooklinen", "Parachute", "Casper", "Eight Sleep"],
        Category::Office => &["Herman Miller", "Steelcase", "Fully", "Uplift"],
        Category::Outdoor => &["YETI", "Osprey", "Patagonia", "Arc'teryx", "The North Face"],
        Category::Travel => &["Away", "Rimowa", "Tumi", "Briggs & Riley"],
        Category::Edc => &["Benchmade", "Spyderco", "Leatherman", "Ridge", "Olight"],
        Category::Music => &["Fender", "Gibson", "Roland", "Yamaha"],
        _ => &[],
    }
}

/// Find a brand by its display name or alias (case-insensitive)
pub fn find_brand(name: &str) -> Option<&'static BrandEntry> {
    let needle = name.trim().to_lowercase();
    BRANDS.iter().find(|b| {
        b.name.to_lowercase() == needle || b.aliases.iter().any(|a| *a == needle)
    })
}
