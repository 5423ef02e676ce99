//! Source-host allowlisting
//!
//! Only hosts matching a configured pattern may be fetched. Patterns are
//! hostnames with `*` wildcards ("images.example.com", "*.example.com",
//! "*"). An empty list denies every host.

use tracing::warn;

/// Configured set of allowed host patterns
#[derive(Debug, Clone, Default)]
pub struct HostAllowlist {
    patterns: Vec<String>,
}

impl HostAllowlist {
    /// Build an allowlist from configured patterns
    pub fn new(patterns: Vec<String>) -> Self {
        let patterns = patterns
            .into_iter()
            .map(|p| p.trim().to_ascii_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self { patterns }
    }

    /// Whether a hostname matches any configured pattern
    pub fn is_allowed(&self, hostname: &str) -> bool {
        if hostname.is_empty() {
            return false;
        }
        if self.patterns.is_empty() {
            warn!("no allowed_hosts configured, rejecting {}", hostname);
            return false;
        }

        let hostname = hostname.to_ascii_lowercase();
        self.patterns
            .iter()
            .any(|p| wildcard_match(p, &hostname))
    }
}

/// Match `text` against `pattern`, where `*` matches any run of characters
/// (including none). Both sides are expected lowercased.
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            // Tentatively match zero characters; remember where to backtrack
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((star_pi, star_ti)) = star {
            // Extend the last star by one character and retry
            pi = star_pi + 1;
            ti = star_ti + 1;
            star = Some((star_pi, star_ti + 1));
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}
