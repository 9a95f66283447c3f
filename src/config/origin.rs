/// Allow-list of browser origins for the live channel and CORS.
///
/// Pattern forms:
/// - `*` allows every origin
/// - `*.example.com` allows any origin ending in `.example.com`
/// - anything else must match the origin exactly
#[derive(Debug, Clone, Default)]
pub struct OriginPolicy {
    patterns: Vec<String>,
}

impl OriginPolicy {
    pub fn new(patterns: Vec<String>) -> Self {
        Self { patterns }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn allows(&self, origin: &str) -> bool {
        let origin = origin.trim_end_matches('/');
        self.patterns.iter().any(|pattern| {
            if pattern == "*" {
                return true;
            }
            match pattern.strip_prefix('*') {
                Some(suffix) if suffix.starts_with('.') => origin.ends_with(suffix),
                _ => pattern.trim_end_matches('/') == origin,
            }
        })
    }
}
