//! Source and storage constants shared across the codebase.

/// User-visible name of the one source we scrape today.
pub const BROADWAY_WORLD_SOURCE: &str = "BroadwayWorld Dallas";

/// Listings page fetched on every sync.
pub const BROADWAY_WORLD_LISTINGS_URL: &str =
    "https://www.broadwayworld.com/dallas/regionalshows.cfm";

/// Base used to resolve relative hrefs found in listing markup.
pub const BROADWAY_WORLD_BASE_URL: &str = "https://www.broadwayworld.com";

/// User-Agent sent with upstream fetches.
pub const UPSTREAM_USER_AGENT: &str = "DFWTheatrePersonalUse/1.0";

/// Category assigned to events found in structured-data blocks.
pub const STRUCTURED_CATEGORY: &str = "Theatre";

/// Category assigned to events recovered by the anchor fallback, where
/// the markup gives no classification to go on.
pub const FALLBACK_CATEGORY: &str = "Mixed";

/// City placeholder assigned by the anchor fallback.
pub const FALLBACK_CITY: &str = "DFW";

/// Name of the key-value store holding the snapshot.
pub const STORE_NAME: &str = "dfw-theatre";

/// Key of the single snapshot record within the store.
pub const SNAPSHOT_KEY: &str = "events.json";

/// Localities considered in scope for the aggregator. Matching is
/// case-sensitive and exact; events with an unknown city are kept.
pub const LOCALITY_ALLOW_LIST: &[&str] = &[
    "Dallas",
    "Fort Worth",
    "Arlington",
    "Plano",
    "Irving",
    "Richardson",
    "Addison",
    "Garland",
    "Grand Prairie",
    "Farmers Branch",
    "DFW",
];
