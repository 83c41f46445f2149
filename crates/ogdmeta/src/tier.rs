use std::fmt::{self, Display};

/// Maturity of a distribution according to the 5-star open data
/// model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub(crate) enum Tier {
    Spreadsheet = 1,
    Delimited = 2,
    Structured = 3,
    LinkedData = 4,
    Api = 5,
}

/// Token sets, highest tier first. The first set with a token that
/// occurs in the search string wins.
const RULES: [(Tier, &[&str]); 5] = [
    (
        Tier::Api,
        &[
            "api",
            "odata",
            "sparql",
            "wfs",
            "wms",
            "arcgis/rest",
            "service=wfs",
            "service=wms",
            "/rest",
            "rest/",
        ],
    ),
    (Tier::LinkedData, &["rdf", "turtle", "ttl", "json-ld", "n-triples"]),
    (
        Tier::Structured,
        &["geojson", "json", "application/json", "xml"],
    ),
    (Tier::Delimited, &["csv", "text/csv"]),
    (Tier::Spreadsheet, &["xls", "xlsx", "excel", "spreadsheetml"]),
];

impl Tier {
    /// Nothing matched; most catalog entries without any hint are
    /// plain CSV downloads.
    pub(crate) const FALLBACK: Tier = Tier::Delimited;

    /// Classifies a search string.
    pub(crate) fn classify(haystack: &str) -> Tier {
        let haystack = haystack.to_lowercase();

        RULES
            .iter()
            .find(|(_, tokens)| {
                tokens.iter().any(|token| haystack.contains(token))
            })
            .map(|(tier, _)| *tier)
            .unwrap_or(Self::FALLBACK)
    }

    /// Classifies a distribution by its format, media type, access
    /// URL and download URL.
    pub(crate) fn from_fields(
        format: Option<&str>,
        media_type: Option<&str>,
        access_url: Option<&str>,
        download_url: Option<&str>,
    ) -> Tier {
        let haystack = [format, media_type, access_url, download_url]
            .iter()
            .map(|field| field.unwrap_or_default().trim().to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");

        Self::classify(&haystack)
    }

    #[inline]
    pub(crate) fn value(self) -> u8 {
        self as u8
    }
}

impl Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}
