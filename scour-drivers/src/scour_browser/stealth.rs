use super::fingerprint::UserAgentProfile;

/// Flags that reduce automation signals; always appended after the
/// configured launch arguments.
const STEALTH_FLAGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--no-first-run",
    "--no-default-browser-check",
    "--disable-background-networking",
    "--disable-features=TranslateUI",
    "--mute-audio",
    "--hide-scrollbars",
];

/// Construct Chrome command-line arguments from the configured flags and
/// the session fingerprint. Duplicates are dropped, first occurrence wins.
pub fn build_launch_arguments(configured: &[String], profile: &UserAgentProfile) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    let identity = [
        format!("--user-agent={}", profile.user_agent),
        format!("--window-size={},{}", profile.viewport.0, profile.viewport.1),
        format!("--lang={}", profile.primary_language()),
    ];
    let candidates = configured
        .iter()
        .cloned()
        .chain(STEALTH_FLAGS.iter().map(|s| s.to_string()))
        .chain(identity);
    for arg in candidates {
        let name = arg.split('=').next().unwrap_or(&arg).to_string();
        if !args
            .iter()
            .any(|a| a.split('=').next().unwrap_or(a) == name)
        {
            args.push(arg);
        }
    }
    args
}

/// JavaScript evasions installed before any page script runs.
pub struct StealthScripts;

impl StealthScripts {
    fn core_evasions(profile: &UserAgentProfile) -> String {
        let languages = profile
            .languages
            .iter()
            .map(|l| format!("'{}'", l.replace('\'', "")))
            .collect::<Vec<_>>()
            .join(",");
        format!(
            r#"
            Object.defineProperty(navigator, 'webdriver', {{ get: () => undefined }});
            Object.defineProperty(navigator, 'plugins', {{ get: () => [1,2,3,4,5] }});
            Object.defineProperty(navigator, 'languages', {{ get: () => [{languages}] }});
            Object.defineProperty(navigator, 'platform', {{ get: () => '{platform}' }});
            if (!window.chrome) window.chrome = {{ runtime: {{}} }};
            const origQuery = window.navigator.permissions && window.navigator.permissions.query;
            if (origQuery) {{
                window.navigator.permissions.query = (p) =>
                    p && p.name === 'notifications'
                        ? Promise.resolve({{ state: Notification.permission }})
                        : origQuery.call(window.navigator.permissions, p);
            }}
        "#,
            platform = profile.platform.replace('\'', ""),
        )
    }

    fn webgl_evasions() -> &'static str {
        r#"
            if (window.WebGLRenderingContext) {
                const getParameter = WebGLRenderingContext.prototype.getParameter;
                WebGLRenderingContext.prototype.getParameter = function(parameter) {
                    if (parameter === 37445) return 'Intel Inc.';
                    if (parameter === 37446) return 'Intel Iris OpenGL Engine';
                    return getParameter.call(this, parameter);
                };
            }
        "#
    }

    /// The full script for one session.
    pub fn for_profile(profile: &UserAgentProfile) -> String {
        let mut script = Self::core_evasions(profile);
        script.push_str(Self::webgl_evasions());
        script
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scour_browser::fingerprint::UserAgentManager;

    #[test]
    fn configured_flags_win_over_identity_duplicates() {
        let profile = UserAgentManager::new("ru-BY").pick();
        let configured = vec![
            "--no-sandbox".to_string(),
            "--lang=be-BY".to_string(),
        ];
        let args = build_launch_arguments(&configured, &profile);

        assert_eq!(args[0], "--no-sandbox");
        assert!(args.contains(&"--lang=be-BY".to_string()));
        assert_eq!(args.iter().filter(|a| a.starts_with("--lang=")).count(), 1);
        assert!(args.contains(&format!("--user-agent={}", profile.user_agent)));
        assert!(args.contains(&"--disable-blink-features=AutomationControlled".to_string()));
    }

    #[test]
    fn script_masks_webdriver_and_carries_locale() {
        let profile = UserAgentManager::new("ru-BY").pick();
        let script = StealthScripts::for_profile(&profile);
        assert!(script.contains("'webdriver'"));
        assert!(script.contains("'ru-BY','ru','en'"));
        assert!(script.contains(&profile.platform));
    }
}
