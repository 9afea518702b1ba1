use std::path::Path;

use reqwest::Url;
use tracing::{debug, warn};

use super::{after_marker, after_prefix, strip_phrases, trim_leading_words};
use crate::desktop::locate::{find_first, normalize_spoken_path, search_common_roots};
use crate::knowledge::Lookup;
use crate::router::IntentRouter;
use crate::session::SessionState;

const CHROME_PHRASES: &[&str] = &["in google chrome", "in chrome"];
const BROWSER_FAILED: &str = "I couldn't open the browser.";

fn search_url(base: &str, key: &str, query: &str) -> anyhow::Result<Url> {
    Ok(Url::parse_with_params(base, &[(key, query)])?)
}

/// Search words for YouTube: after "search for"/"search"/"find", minus the
/// site and browser words.
pub(crate) fn youtube_keywords(text: &str) -> String {
    let rest = after_marker(text, &["search for", "search", "find"]).unwrap_or(text);
    let cleaned = strip_phrases(rest, &["in google chrome", "in chrome", "on youtube", "youtube"]);
    trim_leading_words(&cleaned, &["for", "on"]).to_string()
}

pub(crate) fn amazon_keywords(text: &str) -> String {
    let rest = after_marker(text, &["search", "find", "for"]).unwrap_or(text);
    let cleaned = strip_phrases(rest, &["on amazon", "in amazon", "amazon"]);
    trim_leading_words(&cleaned, &["for", "on"]).to_string()
}

/// Topic of a Wikipedia request: the text without "wikipedia" and leading
/// filler.
pub(crate) fn wikipedia_topic(text: &str) -> String {
    let without = text.replace("wikipedia", " ");
    let topic = trim_leading_words(
        &without,
        &["search", "look up", "on", "for", "about", "according to"],
    );
    strip_phrases(topic, &["according to"])
        .trim_end_matches(|c: char| c == '?' || c == '.')
        .to_string()
}

impl IntentRouter {
    fn open_or_report(&self, url: &str, in_chrome: bool) -> bool {
        let result = if in_chrome {
            self.deps.launcher.open_in_chrome(url)
        } else {
            self.deps.launcher.open_url(url)
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(url, "Could not open browser: {}", e);
                false
            }
        }
    }

    /// Open `url` and say `reply`, or report that the browser didn't start.
    fn open_and_say(&self, url: &str, in_chrome: bool, reply: &str) {
        if self.open_or_report(url, in_chrome) {
            self.say(reply);
        } else {
            self.say(BROWSER_FAILED);
        }
    }

    pub(in crate::router) fn open_site(&self, url: &str, reply: &str) -> anyhow::Result<()> {
        self.open_and_say(url, false, reply);
        Ok(())
    }

    pub(in crate::router) fn youtube_search(&self, text: &str) -> anyhow::Result<()> {
        let url = search_url(
            "https://www.youtube.com/results",
            "search_query",
            &youtube_keywords(text),
        )?;
        let in_chrome = CHROME_PHRASES.iter().any(|p| text.contains(p));
        self.open_and_say(url.as_str(), in_chrome, "Opening YouTube search");
        Ok(())
    }

    pub(in crate::router) fn amazon_search(&self, text: &str) -> anyhow::Result<()> {
        let url = search_url("https://www.amazon.in/s", "k", &amazon_keywords(text))?;
        self.open_and_say(url.as_str(), false, "Opening Amazon search");
        Ok(())
    }

    pub(in crate::router) fn chrome_open_site(&self, text: &str) -> anyhow::Result<()> {
        let Some(host) = self.extract.chrome_site.captures(text).map(|c| c[1].to_string()) else {
            self.say("Please specify a website to open in Chrome");
            return Ok(());
        };
        let url = if host.starts_with("http") {
            host.clone()
        } else {
            format!("https://{host}")
        };
        self.open_and_say(&url, true, &format!("Opening {host} in Chrome"));
        Ok(())
    }

    pub(in crate::router) fn web_search(&self, text: &str) -> anyhow::Result<()> {
        let query = after_prefix(text, &["search "]);
        let url = search_url("https://www.google.com/search", "q", query)?;
        self.open_and_say(url.as_str(), false, &format!("Searching for {query}"));
        Ok(())
    }

    pub(in crate::router) fn open_browser(&self) -> anyhow::Result<()> {
        let opened = self.deps.launcher.open_url("about:blank").is_ok()
            || self.open_or_report("https://www.google.com", false);
        if opened {
            self.say("Opening your browser");
        } else {
            self.say(BROWSER_FAILED);
        }
        Ok(())
    }

    /// Open a folder path, an application, or a folder found by name, in
    /// that order. Opening a folder also moves the working directory there.
    pub(in crate::router) fn open_app(
        &self,
        text: &str,
        session: &SessionState,
    ) -> anyhow::Result<()> {
        let target = normalize_spoken_path(after_prefix(text, &["open ", "launch "]));
        if target.is_empty() {
            self.say("What should I open?");
            return Ok(());
        }

        let as_path = session.resolve(&target);
        if as_path.is_dir() {
            self.open_folder(&as_path, session);
            self.say(&format!("Opening folder {target}"));
            return Ok(());
        }

        match self.deps.launcher.launch_app(&target) {
            Ok(()) => {
                self.say(&format!("Opening {target}"));
                return Ok(());
            }
            Err(e) => debug!(target = %target, "Not an application: {}", e),
        }

        let wd = session.working_directory();
        let found = find_first(&wd, &target, false)
            .or_else(|| search_common_roots(&target, false, &wd, &self.deps.home));
        match found {
            Some(dir) => {
                self.open_folder(&dir, session);
                let name = dir
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| target.clone());
                self.say(&format!("Opening folder {name}"));
            }
            None => self.say(&format!("I couldn't open {target}.")),
        }
        Ok(())
    }

    fn open_folder(&self, dir: &Path, session: &SessionState) {
        if let Err(e) = self.deps.launcher.open_path(dir) {
            warn!(dir = %dir.display(), "Could not open folder: {}", e);
        }
        session.set_working_directory(dir);
    }

    pub(in crate::router) fn wikipedia(&self, text: &str) -> anyhow::Result<()> {
        let topic = wikipedia_topic(text);
        if topic.is_empty() {
            self.say("What should I search on Wikipedia?");
            return Ok(());
        }
        self.say("Searching Wikipedia...");
        match self.deps.encyclopedia.lookup(&topic) {
            Ok(Lookup::Summary(summary)) => self.say(&summary),
            Ok(Lookup::Ambiguous) => self.say("Multiple results found. Please be more specific."),
            Ok(Lookup::NotFound) => self.say("I couldn't find anything on Wikipedia."),
            Err(e) => {
                warn!(topic = %topic, "Wikipedia lookup failed: {:#}", e);
                self.say("I couldn't find anything on Wikipedia.");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_youtube_keywords() {
        assert_eq!(youtube_keywords("search youtube for lofi beats"), "lofi beats");
        assert_eq!(youtube_keywords("search for cats on youtube in chrome"), "cats");
        assert_eq!(youtube_keywords("find rust talks youtube"), "rust talks");
    }

    #[test]
    fn test_amazon_keywords() {
        assert_eq!(amazon_keywords("search amazon for headphones"), "headphones");
        assert_eq!(amazon_keywords("find usb cable on amazon"), "usb cable");
    }

    #[test]
    fn test_wikipedia_topic() {
        assert_eq!(wikipedia_topic("wikipedia alan turing"), "alan turing");
        assert_eq!(wikipedia_topic("search wikipedia for rust language"), "rust language");
        assert_eq!(wikipedia_topic("alan turing according to wikipedia"), "alan turing");
        assert_eq!(wikipedia_topic("wikipedia"), "");
    }

    #[test]
    fn test_search_url_encodes_query() {
        let url = search_url("https://www.google.com/search", "q", "rust & go").unwrap();
        assert_eq!(url.as_str(), "https://www.google.com/search?q=rust+%26+go");
    }
}
