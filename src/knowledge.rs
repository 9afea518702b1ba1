//! Wikipedia lookups: search for the best-matching article, then fetch its
//! summary and keep the first two sentences.

use reqwest::Url;
use tokio::runtime::Handle;
use tracing::debug;

const SEARCH_URL: &str = "https://en.wikipedia.org/w/api.php";
const SUMMARY_URL: &str = "https://en.wikipedia.org/api/rest_v1/page/summary/";
const SUMMARY_SENTENCES: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Summary(String),
    /// The best match is a disambiguation page.
    Ambiguous,
    NotFound,
}

pub trait Encyclopedia: Send + Sync {
    fn lookup(&self, topic: &str) -> anyhow::Result<Lookup>;
}

pub struct Wikipedia {
    client: reqwest::Client,
    runtime: Handle,
}

impl Wikipedia {
    pub fn new(runtime: Handle) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("jarvis-core/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, runtime })
    }

    async fn best_title(&self, topic: &str) -> anyhow::Result<Option<String>> {
        let url = Url::parse_with_params(
            SEARCH_URL,
            &[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", topic),
                ("srlimit", "1"),
                ("format", "json"),
            ],
        )?;
        let json: serde_json::Value = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(json["query"]["search"][0]["title"].as_str().map(str::to_string))
    }

    async fn fetch(&self, topic: &str) -> anyhow::Result<Lookup> {
        let Some(title) = self.best_title(topic).await? else {
            return Ok(Lookup::NotFound);
        };
        debug!(topic, title = %title, "Wikipedia match");

        let mut url = Url::parse(SUMMARY_URL)?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("summary URL cannot be a base"))?
            .pop_if_empty()
            .push(&title.replace(' ', "_"));

        let resp = self.client.get(url).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Lookup::NotFound);
        }
        let json: serde_json::Value = resp.error_for_status()?.json().await?;
        Ok(interpret_summary(&json))
    }
}

impl Encyclopedia for Wikipedia {
    fn lookup(&self, topic: &str) -> anyhow::Result<Lookup> {
        self.runtime.block_on(self.fetch(topic))
    }
}

fn interpret_summary(json: &serde_json::Value) -> Lookup {
    if json["type"].as_str() == Some("disambiguation") {
        return Lookup::Ambiguous;
    }
    match json["extract"].as_str().map(str::trim) {
        Some(extract) if !extract.is_empty() => {
            Lookup::Summary(first_sentences(extract, SUMMARY_SENTENCES))
        }
        _ => Lookup::NotFound,
    }
}

/// The first `n` sentences of `text`. A sentence ends at `.`, `!` or `?`
/// followed by whitespace or the end of the text.
pub fn first_sentences(text: &str, n: usize) -> String {
    let mut count = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            let at_boundary = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
            if at_boundary {
                count += 1;
                if count == n {
                    return text[..i + c.len_utf8()].trim().to_string();
                }
            }
        }
    }
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sentences() {
        let text = "Rust is a language. It is fast! Version 1.0 shipped in 2015. More text.";
        assert_eq!(first_sentences(text, 2), "Rust is a language. It is fast!");
        assert_eq!(
            first_sentences(text, 3),
            "Rust is a language. It is fast! Version 1.0 shipped in 2015."
        );
        assert_eq!(first_sentences("No terminator", 2), "No terminator");
    }

    #[test]
    fn test_interpret_summary() {
        let page = serde_json::json!({"type": "standard", "extract": "A. B. C."});
        assert_eq!(interpret_summary(&page), Lookup::Summary("A. B.".into()));

        let disambig = serde_json::json!({
            "type": "disambiguation",
            "extract": "Mercury may refer to:"
        });
        assert_eq!(interpret_summary(&disambig), Lookup::Ambiguous);

        assert_eq!(interpret_summary(&serde_json::json!({"type": "standard"})), Lookup::NotFound);
    }
}
