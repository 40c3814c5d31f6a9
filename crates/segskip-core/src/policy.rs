use std::collections::HashMap;

use crate::config::SponsorBlockConfig;
use crate::segments::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CategoryRule {
    pub auto_skip: bool,
    pub manual_only: bool,
}

impl CategoryRule {
    pub fn skips_automatically(&self) -> bool {
        self.auto_skip && !self.manual_only
    }
}

/// Per-category skip behaviour.
///
/// Built from a config snapshot on demand; the handler never keeps one
/// between scheduling passes so config edits apply on the next pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryPolicy {
    rules: HashMap<Category, CategoryRule>,
}

impl CategoryPolicy {
    pub fn from_config(config: &SponsorBlockConfig) -> Self {
        let rules = Category::ALL
            .into_iter()
            .map(|category| {
                let rule = CategoryRule {
                    auto_skip: config.categories.get(category),
                    manual_only: config.manual_skips.contains(&category),
                };
                (category, rule)
            })
            .collect();
        Self { rules }
    }

    /// Unknown categories fall back to "do nothing".
    pub fn rule(&self, category: Category) -> CategoryRule {
        self.rules.get(&category).copied().unwrap_or_default()
    }

    pub fn auto_skipped(&self) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|c| self.rule(*c).skips_automatically())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_leave_manual_categories_alone() {
        let policy = CategoryPolicy::from_config(&SponsorBlockConfig::default());
        assert!(policy.rule(Category::Sponsor).skips_automatically());
        assert!(policy.rule(Category::Intro).auto_skip);
        assert!(policy.rule(Category::Intro).manual_only);
        assert!(!policy.rule(Category::Intro).skips_automatically());
        assert!(!policy.rule(Category::Filler).auto_skip);
        assert_eq!(
            policy.auto_skipped(),
            vec![
                Category::Sponsor,
                Category::Interaction,
                Category::SelfPromo,
                Category::Preview,
                Category::MusicOfftopic,
            ]
        );
    }

    #[test]
    fn test_disabled_category_is_never_automatic() {
        let mut config = SponsorBlockConfig::default();
        config.categories.sponsor = false;
        config.manual_skips.clear();
        let policy = CategoryPolicy::from_config(&config);
        assert!(!policy.rule(Category::Sponsor).skips_automatically());
        assert!(policy.rule(Category::Intro).skips_automatically());
    }
}
