use rand::prelude::SliceRandom;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Snapshot of user agent, viewport, and locale characteristics.
pub struct UserAgentProfile {
    pub user_agent: String,
    pub viewport: (u32, u32),
    pub platform: String,
    pub languages: Vec<String>,
    pub timezone: String,
}

impl UserAgentProfile {
    /// `Accept-Language` value with descending quality weights.
    pub fn accept_language(&self) -> String {
        self.languages
            .iter()
            .enumerate()
            .map(|(i, lang)| match i {
                0 => lang.clone(),
                _ => format!("{lang};q=0.{}", 10 - i.min(9)),
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn primary_language(&self) -> &str {
        self.languages.first().map(String::as_str).unwrap_or("en-US")
    }
}

/// Language list for a locale such as `ru-BY`: the locale, its bare
/// language, then English.
fn languages_for(locale: &str) -> Vec<String> {
    let mut out = vec![locale.to_string()];
    if let Some((lang, _)) = locale.split_once('-') {
        out.push(lang.to_string());
    }
    if !out.iter().any(|l| l == "en") {
        out.push("en".to_string());
    }
    out
}

#[derive(Debug, Clone)]
/// Maintains a small pool of plausible desktop fingerprint profiles.
pub struct UserAgentManager {
    desktop_profiles: Vec<UserAgentProfile>,
}

impl UserAgentManager {
    /// Built-in desktop profiles advertising `locale`.
    pub fn new(locale: &str) -> Self {
        let languages = languages_for(locale);
        Self {
            desktop_profiles: vec![
                UserAgentProfile {
                    user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36".to_string(),
                    viewport: (1920, 1080),
                    platform: "Win32".to_string(),
                    languages: languages.clone(),
                    timezone: "Europe/Minsk".to_string(),
                },
                UserAgentProfile {
                    user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36".to_string(),
                    viewport: (1440, 900),
                    platform: "MacIntel".to_string(),
                    languages: languages.clone(),
                    timezone: "Europe/Minsk".to_string(),
                },
                UserAgentProfile {
                    user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36".to_string(),
                    viewport: (1366, 768),
                    platform: "Linux x86_64".to_string(),
                    languages,
                    timezone: "Europe/Minsk".to_string(),
                },
            ],
        }
    }

    /// Pick a profile for a new browser session.
    pub fn pick(&self) -> UserAgentProfile {
        let mut rng = rand::thread_rng();
        self.desktop_profiles
            .choose(&mut rng)
            .or_else(|| self.desktop_profiles.first())
            .cloned()
            .unwrap_or_else(|| UserAgentProfile {
                user_agent: "Mozilla/5.0".to_string(),
                viewport: (1280, 800),
                platform: "Win32".to_string(),
                languages: vec!["en-US".to_string()],
                timezone: "UTC".to_string(),
            })
    }

    pub fn profiles(&self) -> &[UserAgentProfile] {
        &self.desktop_profiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_follow_locale() {
        let manager = UserAgentManager::new("ru-BY");
        let profile = manager.pick();
        assert_eq!(profile.languages, vec!["ru-BY", "ru", "en"]);
        assert_eq!(profile.accept_language(), "ru-BY,ru;q=0.9,en;q=0.8");
        assert!(manager.profiles().contains(&profile));
    }

    #[test]
    fn english_locale_is_not_duplicated() {
        assert_eq!(languages_for("en-US"), vec!["en-US", "en"]);
    }
}
