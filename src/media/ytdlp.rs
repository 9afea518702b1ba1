//! Stream search through `yt-dlp`.

use std::process::{Command, Stdio};

use anyhow::Context;
use tracing::debug;

use super::{PlaylistEntry, StreamResolver};

pub struct YtDlpResolver {
    program: String,
}

impl YtDlpResolver {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }
}

impl StreamResolver for YtDlpResolver {
    fn search(&self, query: &str) -> anyhow::Result<PlaylistEntry> {
        let program = which::which(&self.program)
            .with_context(|| format!("{} is not installed", self.program))?;
        debug!(query, "Searching stream");

        let output = Command::new(program)
            .args(["-f", "bestaudio/best", "--no-warnings", "--print", "title", "--print", "urls"])
            .arg(format!("ytsearch1:{query}"))
            .stdin(Stdio::null())
            .output()
            .context("failed to run stream search")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("stream search failed: {}", stderr.trim());
        }

        parse_search_output(&String::from_utf8_lossy(&output.stdout), query)
            .ok_or_else(|| anyhow::anyhow!("no results for {query:?}"))
    }
}

/// Title on the first line, stream URL on the next.
fn parse_search_output(stdout: &str, query: &str) -> Option<PlaylistEntry> {
    let mut lines = stdout.lines().map(str::trim).filter(|l| !l.is_empty());
    let first = lines.next()?;
    let (title, locator) = if first.starts_with("http") {
        (query, first)
    } else {
        (first, lines.find(|l| l.starts_with("http"))?)
    };
    Some(PlaylistEntry {
        locator: locator.to_string(),
        title: if title.is_empty() { query } else { title }.to_string(),
    })
}
