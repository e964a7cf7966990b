/// Context token used for the suggestions shown under the welcome message.
pub const WELCOME_CONTEXT: &str = "welcome";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickReplySet {
    General,
    Market,
    Weather,
    Crop,
}

const GENERAL: &[&str] = &[
    "Crop recommendations",
    "Market prices",
    "Weather advice",
    "Pest control",
];
const MARKET: &[&str] = &[
    "Maize prices",
    "Best selling season",
    "Value addition",
    "Farmer groups",
];
const WEATHER: &[&str] = &[
    "Drought-resistant crops",
    "Water conservation",
    "Planting calendar",
    "Irrigation tips",
];
const CROP: &[&str] = &[
    "Maize farming",
    "Tea cultivation",
    "Vegetable growing",
    "Organic farming",
];

/// Keyword table, tested in order; the first hit wins.
const RULES: &[(&[&str], QuickReplySet)] = &[
    (&["help"], QuickReplySet::General),
    (&["price", "market"], QuickReplySet::Market),
    (&["weather", "rain"], QuickReplySet::Weather),
    (&["crop", "plant"], QuickReplySet::Crop),
];

impl QuickReplySet {
    pub fn replies(self) -> &'static [&'static str] {
        match self {
            Self::General => GENERAL,
            Self::Market => MARKET,
            Self::Weather => WEATHER,
            Self::Crop => CROP,
        }
    }
}

/// Pick the suggestion set for `context`: the last user message, or
/// [`WELCOME_CONTEXT`] on first load. The welcome token is compared
/// exactly; keywords are a case-insensitive substring test.
pub fn classify(context: &str) -> Option<QuickReplySet> {
    if context == WELCOME_CONTEXT {
        return Some(QuickReplySet::General);
    }
    let lower = context.to_lowercase();
    RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, set)| *set)
}

/// Suggestions for `context`; empty when nothing matches.
pub fn suggestions_for(context: &str) -> &'static [&'static str] {
    classify(context).map(QuickReplySet::replies).unwrap_or(&[])
}
