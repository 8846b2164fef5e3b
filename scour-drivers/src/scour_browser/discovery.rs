use std::path::{Path, PathBuf};
use std::process::Command;

use super::engine::RenderError;

/// Common Chrome/Chromium installation paths by platform.
fn well_known_paths() -> &'static [&'static str] {
    if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files\Chromium\Application\chrome.exe",
        ]
    } else if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
            "/opt/homebrew/bin/chromium",
        ]
    } else {
        &[
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/usr/bin/google-chrome",
            "/usr/bin/google-chrome-stable",
            "/snap/bin/chromium",
            "/usr/local/bin/chromium",
            "/opt/google/chrome/chrome",
        ]
    }
}

/// Resolve the browser binary: explicit path, then known locations, then `which`.
pub fn find_browser_executable(explicit: Option<&Path>) -> Result<PathBuf, RenderError> {
    if let Some(path) = explicit {
        if path.exists() {
            tracing::info!(target: "browser", path = %path.display(), "browser.executable.configured");
            return Ok(path.to_path_buf());
        }
        tracing::warn!(
            target: "browser",
            path = %path.display(),
            "browser.executable.configured_missing"
        );
    }

    if let Some(found) = well_known_paths()
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
    {
        tracing::info!(target: "browser", path = %found.display(), "browser.executable.found");
        return Ok(found);
    }

    if !cfg!(target_os = "windows") {
        for cmd in ["chromium", "chromium-browser", "google-chrome", "chrome"] {
            let Ok(output) = Command::new("which").arg(cmd).output() else {
                continue;
            };
            if !output.status.success() {
                continue;
            }
            let path_str = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !path_str.is_empty() {
                tracing::info!(target: "browser", path = %path_str, "browser.executable.which");
                return Ok(PathBuf::from(path_str));
            }
        }
    }

    Err(RenderError::Launch(
        "Chrome/Chromium executable not found; set CHROME_PATH".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn existing_explicit_path_is_used() {
        let exe = std::env::current_exe().unwrap();
        assert_eq!(find_browser_executable(Some(&exe)).unwrap(), exe);
    }
}
