use std::str::FromStr;

/// Outcome of mapping a caller's region hint onto a backend region code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRegion {
    /// Caller input verbatim, or `"default"` when none was given.
    pub requested: String,
    /// `xx-xx` region code sent to the backend.
    pub resolved: String,
    /// Set when the input was renamed or unknown.
    pub note: Option<String>,
}

/// Alias table; `None` means "the configured default region".
const ALIASES: &[(&str, Option<&str>)] = &[
    ("global", None),
    ("world", None),
    ("all", None),
    ("wt", None),
    ("ru", Some("ru-ru")),
    ("russia", Some("ru-ru")),
    ("by", Some("ru-by")),
    ("belarus", Some("ru-by")),
    ("belarusian", Some("ru-by")),
    ("ua", Some("ua-uk")),
    ("ukraine", Some("ua-uk")),
    ("us", Some("us-en")),
    ("usa", Some("us-en")),
    ("en", Some("us-en")),
    ("uk", Some("uk-en")),
    ("gb", Some("uk-en")),
    ("germany", Some("de-de")),
    ("de", Some("de-de")),
    ("france", Some("fr-fr")),
    ("fr", Some("fr-fr")),
];

const LANGUAGES: &[(&str, &str)] = &[
    ("wt-wt", "all"),
    ("ru-ru", "ru-RU"),
    ("ru-by", "ru-BY"),
    ("ua-uk", "uk-UA"),
    ("us-en", "en-US"),
    ("uk-en", "en-GB"),
    ("de-de", "de-DE"),
    ("fr-fr", "fr-FR"),
];

pub const DEFAULT_LANGUAGE: &str = "all";

fn is_region_code(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 5
        && b[2] == b'-'
        && b[..2].iter().chain(&b[3..]).all(u8::is_ascii_lowercase)
}

/// Map a free-form region hint (`"Belarus"`, `"de_DE"`, `"us-en"`) to a
/// backend region code, falling back to `default` with a note.
pub fn resolve_region(region: Option<&str>, default: &str) -> ResolvedRegion {
    let fallback = || ResolvedRegion {
        requested: "default".into(),
        resolved: default.to_string(),
        note: None,
    };
    let Some(requested) = region else {
        return fallback();
    };
    let normalized = requested.trim().to_lowercase().replace('_', "-");
    if normalized.is_empty() {
        return fallback();
    }

    if is_region_code(&normalized) {
        return ResolvedRegion {
            requested: requested.to_string(),
            resolved: normalized,
            note: None,
        };
    }

    if let Some((_, target)) = ALIASES.iter().find(|(alias, _)| *alias == normalized) {
        let resolved = target.unwrap_or(default).to_string();
        let note = (resolved != normalized)
            .then(|| format!("Region \"{requested}\" mapped to \"{resolved}\"."));
        return ResolvedRegion {
            requested: requested.to_string(),
            resolved,
            note,
        };
    }

    ResolvedRegion {
        requested: requested.to_string(),
        resolved: default.to_string(),
        note: Some(format!(
            "Unknown region \"{requested}\", fallback to \"{default}\"."
        )),
    }
}

/// Backend `language` parameter for a resolved region code.
pub fn language_for(region: &str) -> &'static str {
    LANGUAGES
        .iter()
        .find(|(code, _)| *code == region)
        .map(|(_, lang)| *lang)
        .unwrap_or(DEFAULT_LANGUAGE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SafeSearch {
    Strict,
    #[default]
    Moderate,
    Off,
}

impl SafeSearch {
    pub fn as_param(self) -> &'static str {
        match self {
            Self::Strict => "2",
            Self::Moderate => "1",
            Self::Off => "0",
        }
    }
}

impl FromStr for SafeSearch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "moderate" => Ok(Self::Moderate),
            "off" => Ok(Self::Off),
            other => Err(format!("unknown safe-search level {other:?} (strict|moderate|off)")),
        }
    }
}
