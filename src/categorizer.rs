use std::fmt;
use std::str::FromStr;

use regex::{Regex, RegexBuilder};
use serde::Serialize;

use crate::error::{Result, StormError};

/// Canonical event type. Only constructible from the static tables in this
/// module, so the set of labels is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EventLabel(&'static str);

pub const OTHER: EventLabel = EventLabel("OTHER");

impl EventLabel {
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for EventLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

// ---------------------------------------------------------------------------
// Keyword rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Contains,
    StartsWith,
    Regex,
}

impl MatchType {
    pub fn key(&self) -> &'static str {
        match self {
            MatchType::Contains => "contains",
            MatchType::StartsWith => "starts_with",
            MatchType::Regex => "regex",
        }
    }
}

pub struct KeywordRule {
    pub pattern: &'static str,
    pub match_type: MatchType,
    pub label: &'static str,
}

const fn rule(pattern: &'static str, match_type: MatchType, label: &'static str) -> KeywordRule {
    KeywordRule { pattern, match_type, label }
}

/// Labels produced by the keyword strategy, in display order. `OTHER` is
/// the catch-all.
pub const KEYWORD_LABELS: &[&str] = &[
    "TORNADO",
    "HURRICANE",
    "STORM SURGE",
    "FLOOD",
    "HEAT",
    "COLD",
    "AVALANCHE",
    "WINTER",
    "RIP CURRENT",
    "HIGH SURF",
    "LIGHTNING",
    "WIND",
    "HAIL",
    "WILDFIRE",
    "DROUGHT",
    "FOG",
    "HEAVY RAIN",
    "DUST STORM",
    "LANDSLIDE",
    "TSUNAMI",
    "OTHER",
];

/// Ordered rules; the first match wins. Patterns are upper case and matched
/// against the upper-cased event text.
pub const KEYWORD_RULES: &[KeywordRule] = &[
    rule("TORNADO", MatchType::Contains, "TORNADO"),
    rule("TORNDAO", MatchType::Contains, "TORNADO"),
    rule("FUNNEL", MatchType::Contains, "TORNADO"),
    rule(r"HURRICANE|TYPHOON|TROPICAL (STORM|DEPRESSION)", MatchType::Regex, "HURRICANE"),
    rule("SURGE", MatchType::Contains, "STORM SURGE"),
    rule(r"FLOO+D|FLD", MatchType::Regex, "FLOOD"),
    rule("URBAN", MatchType::StartsWith, "FLOOD"),
    rule(r"HEAT|WARM|\bHOT\b|HYPERTHERMIA|HIGH TEMP", MatchType::Regex, "HEAT"),
    rule(r"COLD|CHILL|FREEZE|FROST|HYPOTHERMIA|LOW TEMP", MatchType::Regex, "COLD"),
    rule("AVALANC", MatchType::Contains, "AVALANCHE"),
    rule(r"SNOW|BLIZZARD|\bICE\b|\bICY\b|WINTER|WINTRY|SLEET|FREEZING|GLAZE", MatchType::Regex, "WINTER"),
    rule("RIP CURRENT", MatchType::Contains, "RIP CURRENT"),
    rule(r"SURF|(HIGH|ROUGH|HEAVY) SEAS|SWELLS|HIGH WAVES", MatchType::Regex, "HIGH SURF"),
    rule(r"LIGHTN|LIGNTNING|LIGHTING", MatchType::Regex, "LIGHTNING"),
    rule(r"WIND|TSTM|THUNDERSTORM|MICROBURST|DOWNBURST|GUST", MatchType::Regex, "WIND"),
    rule("HAIL", MatchType::Contains, "HAIL"),
    rule("FIRE", MatchType::Contains, "WILDFIRE"),
    rule("DROUGHT", MatchType::Contains, "DROUGHT"),
    rule("FOG", MatchType::Contains, "FOG"),
    rule(r"RAIN|PRECIP|SHOWER", MatchType::Regex, "HEAVY RAIN"),
    rule("DUST", MatchType::Contains, "DUST STORM"),
    rule(r"LANDSLIDE|MUD ?SLIDE|DEBRIS FLOW|LANDSLUMP|ROCK SLIDE", MatchType::Regex, "LANDSLIDE"),
    rule("TSUNAMI", MatchType::Contains, "TSUNAMI"),
];

// ---------------------------------------------------------------------------
// Official vocabulary
// ---------------------------------------------------------------------------

/// The 48 event names of NWS Directive 10-1605.
pub const OFFICIAL_EVENT_TYPES: &[&str] = &[
    "ASTRONOMICAL LOW TIDE",
    "AVALANCHE",
    "BLIZZARD",
    "COASTAL FLOOD",
    "COLD/WIND CHILL",
    "DEBRIS FLOW",
    "DENSE FOG",
    "DENSE SMOKE",
    "DROUGHT",
    "DUST DEVIL",
    "DUST STORM",
    "EXCESSIVE HEAT",
    "EXTREME COLD/WIND CHILL",
    "FLASH FLOOD",
    "FLOOD",
    "FROST/FREEZE",
    "FUNNEL CLOUD",
    "FREEZING FOG",
    "HAIL",
    "HEAT",
    "HEAVY RAIN",
    "HEAVY SNOW",
    "HIGH SURF",
    "HIGH WIND",
    "HURRICANE (TYPHOON)",
    "ICE STORM",
    "LAKE-EFFECT SNOW",
    "LAKESHORE FLOOD",
    "LIGHTNING",
    "MARINE HAIL",
    "MARINE HIGH WIND",
    "MARINE STRONG WIND",
    "MARINE THUNDERSTORM WIND",
    "RIP CURRENT",
    "SEICHE",
    "SLEET",
    "STORM SURGE/TIDE",
    "STRONG WIND",
    "THUNDERSTORM WIND",
    "TORNADO",
    "TROPICAL DEPRESSION",
    "TROPICAL STORM",
    "TSUNAMI",
    "VOLCANIC ASH",
    "WATERSPOUT",
    "WILDFIRE",
    "WINTER STORM",
    "WINTER WEATHER",
];

/// Curated spellings that resolve to an official name. Each target must be
/// an entry of `OFFICIAL_EVENT_TYPES`.
pub const VOCABULARY_ALIASES: &[(&str, &str)] = &[
    ("HURRICANE", "HURRICANE (TYPHOON)"),
    ("TYPHOON", "HURRICANE (TYPHOON)"),
    ("HURRICANE TYPHOON", "HURRICANE (TYPHOON)"),
    ("STORM SURGE", "STORM SURGE/TIDE"),
    ("EXTREME COLD", "EXTREME COLD/WIND CHILL"),
    ("EXTREME WINDCHILL", "EXTREME COLD/WIND CHILL"),
    ("COLD", "COLD/WIND CHILL"),
    ("WIND CHILL", "COLD/WIND CHILL"),
    ("FROST", "FROST/FREEZE"),
    ("FREEZE", "FROST/FREEZE"),
    ("WILD FOREST FIRE", "WILDFIRE"),
    ("WILD FIRE", "WILDFIRE"),
    ("FOG", "DENSE FOG"),
    ("HEAT WAVE", "EXCESSIVE HEAT"),
    ("RIP CURRENTS", "RIP CURRENT"),
    ("LANDSLIDE", "DEBRIS FLOW"),
    ("MUDSLIDE", "DEBRIS FLOW"),
    ("URBAN SMALL STREAM FLOOD", "FLOOD"),
    ("RIVER FLOOD", "FLOOD"),
    ("WINTRY MIX", "WINTER WEATHER"),
    ("WINTER WEATHER MIX", "WINTER WEATHER"),
    ("SNOW", "HEAVY SNOW"),
    ("GLAZE", "ICE STORM"),
];

/// Word-level abbreviations expanded before distance matching.
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("TSTM", "THUNDERSTORM"),
    ("THUNDERSTORMS", "THUNDERSTORM"),
    ("WINDS", "WIND"),
    ("FLD", "FLOOD"),
    ("FLOODING", "FLOOD"),
    ("FLOODS", "FLOOD"),
    ("CSTL", "COASTAL"),
    ("HVY", "HEAVY"),
    ("CURRENTS", "CURRENT"),
    ("FIRES", "FIRE"),
];

pub const DEFAULT_MAX_DISTANCE: usize = 3;

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// Which canonicalization is authoritative for a run. Exactly one applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Strategy {
    Keyword,
    Vocabulary { max_distance: usize },
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Keyword => "keyword",
            Strategy::Vocabulary { .. } => "vocabulary",
        }
    }

    /// Every label this strategy can produce, `OTHER` last.
    pub fn labels(&self) -> Vec<EventLabel> {
        match self {
            Strategy::Keyword => KEYWORD_LABELS.iter().copied().map(EventLabel).collect(),
            Strategy::Vocabulary { .. } => OFFICIAL_EVENT_TYPES
                .iter()
                .copied()
                .map(EventLabel)
                .chain(std::iter::once(OTHER))
                .collect(),
        }
    }
}

impl FromStr for Strategy {
    type Err = StormError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "keyword" => Ok(Strategy::Keyword),
            "vocabulary" => Ok(Strategy::Vocabulary {
                max_distance: DEFAULT_MAX_DISTANCE,
            }),
            other => Err(StormError::InvalidArgument(format!(
                "unknown strategy '{other}' (expected keyword or vocabulary)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Categorizer
// ---------------------------------------------------------------------------

enum Matcher {
    Contains(&'static str),
    StartsWith(&'static str),
    Regex(Regex),
}

impl Matcher {
    fn matches(&self, upper: &str) -> bool {
        match self {
            Matcher::Contains(p) => upper.contains(p),
            Matcher::StartsWith(p) => upper.starts_with(p),
            Matcher::Regex(re) => re.is_match(upper),
        }
    }
}

struct Candidate {
    normalized: String,
    label: EventLabel,
}

enum Compiled {
    Keyword(Vec<(Matcher, EventLabel)>),
    Vocabulary {
        candidates: Vec<Candidate>,
        max_distance: usize,
    },
}

/// Maps free-text event types to canonical labels under one strategy.
pub struct Categorizer {
    strategy: Strategy,
    compiled: Compiled,
}

impl Categorizer {
    pub fn new(strategy: Strategy) -> Result<Self> {
        let compiled = match strategy {
            Strategy::Keyword => {
                let mut rules = Vec::with_capacity(KEYWORD_RULES.len());
                for r in KEYWORD_RULES {
                    let matcher = match r.match_type {
                        MatchType::Contains => Matcher::Contains(r.pattern),
                        MatchType::StartsWith => Matcher::StartsWith(r.pattern),
                        MatchType::Regex => Matcher::Regex(
                            RegexBuilder::new(r.pattern)
                                .case_insensitive(true)
                                .build()
                                .map_err(|e| StormError::InvalidArgument(e.to_string()))?,
                        ),
                    };
                    rules.push((matcher, EventLabel(r.label)));
                }
                Compiled::Keyword(rules)
            }
            Strategy::Vocabulary { max_distance } => {
                let official = OFFICIAL_EVENT_TYPES.iter().map(|name| Candidate {
                    normalized: normalize_event_text(name),
                    label: EventLabel(*name),
                });
                let aliases = VOCABULARY_ALIASES.iter().filter_map(|(alias, target)| {
                    official_label(target).map(|label| Candidate {
                        normalized: normalize_event_text(alias),
                        label,
                    })
                });
                Compiled::Vocabulary {
                    candidates: official.chain(aliases).collect(),
                    max_distance,
                }
            }
        };
        Ok(Self { strategy, compiled })
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Total: every input yields exactly one label.
    pub fn canonicalize(&self, event_type: &str) -> EventLabel {
        match &self.compiled {
            Compiled::Keyword(rules) => {
                let upper = event_type.trim().to_uppercase();
                rules
                    .iter()
                    .find(|(m, _)| m.matches(&upper))
                    .map(|(_, label)| *label)
                    .unwrap_or(OTHER)
            }
            Compiled::Vocabulary {
                candidates,
                max_distance,
            } => {
                let text = normalize_event_text(event_type);
                if text.is_empty() {
                    return OTHER;
                }
                let mut best: Option<(usize, EventLabel)> = None;
                for c in candidates {
                    let d = strsim::osa_distance(&text, &c.normalized);
                    if best.map_or(true, |(bd, _)| d < bd) {
                        best = Some((d, c.label));
                    }
                    if d == 0 {
                        break;
                    }
                }
                match best {
                    Some((d, label)) if d <= *max_distance => label,
                    _ => OTHER,
                }
            }
        }
    }
}

fn official_label(name: &str) -> Option<EventLabel> {
    OFFICIAL_EVENT_TYPES
        .iter()
        .copied()
        .find(|o| *o == name)
        .map(EventLabel)
}

/// Upper-case, punctuation to spaces, collapse whitespace, expand
/// abbreviations word by word.
pub fn normalize_event_text(raw: &str) -> String {
    let cleaned: String = raw
        .to_uppercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    cleaned
        .split_whitespace()
        .map(|word| {
            ABBREVIATIONS
                .iter()
                .find(|(abbr, _)| *abbr == word)
                .map(|(_, full)| *full)
                .unwrap_or(word)
        })
        .collect::<Vec<_>>()
        .join(" ")
}
