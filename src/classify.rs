use std::collections::HashSet;

use anyhow::{anyhow, Result};

/// Labels treated as dangerous when no configuration overrides them.
pub const DEFAULT_DANGEROUS_LABELS: [&str; 4] = ["knife", "scissors", "gun", "sword"];

/// Maps detector labels to a dangerous flag by exact set membership.
///
/// Matching is case-sensitive and whole-label: `"Knife"` and `"knife "` are not
/// `"knife"`. Unknown labels are simply not dangerous. The set is fixed once the
/// classifier is built.
#[derive(Clone, Debug)]
pub struct DangerClassifier {
    labels: HashSet<String>,
}

impl DangerClassifier {
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: HashSet<String> = labels.into_iter().map(Into::into).collect();
        if labels.iter().any(|label| label.trim().is_empty()) {
            return Err(anyhow!("dangerous label set contains a blank label"));
        }
        Ok(Self { labels })
    }

    pub fn is_dangerous(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    /// Configured labels, sorted for stable display.
    pub fn labels(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.labels.iter().map(String::as_str).collect();
        out.sort_unstable();
        out
    }
}

impl Default for DangerClassifier {
    fn default() -> Self {
        Self {
            labels: DEFAULT_DANGEROUS_LABELS
                .iter()
                .map(|label| label.to_string())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_set_flags_members_only() {
        let classifier = DangerClassifier::default();
        for label in DEFAULT_DANGEROUS_LABELS {
            assert!(classifier.is_dangerous(label), "{label} should be dangerous");
        }
        for label in ["person", "cup", "scissor", "", "sword fish"] {
            assert!(!classifier.is_dangerous(label), "{label} should not be dangerous");
        }
    }

    #[test]
    fn matching_is_case_sensitive() {
        let classifier = DangerClassifier::default();
        assert!(classifier.is_dangerous("knife"));
        assert!(!classifier.is_dangerous("Knife"));
        assert!(!classifier.is_dangerous("KNIFE"));
    }

    #[test]
    fn custom_set_replaces_defaults() -> Result<()> {
        let classifier = DangerClassifier::new(["baseball bat", "knife"])?;
        assert!(classifier.is_dangerous("baseball bat"));
        assert!(!classifier.is_dangerous("gun"));
        assert_eq!(classifier.labels(), vec!["baseball bat", "knife"]);
        Ok(())
    }

    #[test]
    fn blank_labels_are_rejected() {
        assert!(DangerClassifier::new(["knife", "  "]).is_err());
    }
}
