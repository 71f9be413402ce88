//! URL activation policy

use crate::collaborators::UrlPolicy;

/// Every URL activates the window except those under a silent prefix
#[derive(Debug, Clone, Default)]
pub struct PrefixUrlPolicy {
    silent_prefixes: Vec<String>,
}

impl PrefixUrlPolicy {
    pub fn new(silent_prefixes: Vec<String>) -> Self {
        Self {
            silent_prefixes: silent_prefixes
                .into_iter()
                .map(|prefix| prefix.to_ascii_lowercase())
                .filter(|prefix| !prefix.is_empty())
                .collect(),
        }
    }
}

impl UrlPolicy for PrefixUrlPolicy {
    fn requires_activation(&self, url: &str) -> bool {
        let url = url.to_ascii_lowercase();
        !self
            .silent_prefixes
            .iter()
            .any(|prefix| url.starts_with(prefix.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_always_activates() {
        assert!(PrefixUrlPolicy::default().requires_activation("tg://anything"));
    }

    #[test]
    fn test_silent_prefix_case_insensitive() {
        let policy = PrefixUrlPolicy::new(vec!["TG://Settings".into(), String::new()]);
        assert!(!policy.requires_activation("tg://settings/themes"));
        assert!(policy.requires_activation("tg://resolve?domain=x"));
    }
}
