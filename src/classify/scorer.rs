// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Weighted keyword scoring

use serde::{Deserialize, Serialize};

use crate::config::{CategoryConfig, ScoringConfig};

/// A destination category with its keyword set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub key: String,
    pub folder: String,
    pub description: String,
    /// Lowercased, de-duplicated, declaration order preserved
    pub keywords: Vec<String>,
}

impl Category {
    pub fn new(key: &str, folder: &str, keywords: &[&str]) -> Self {
        Self::from_config(&CategoryConfig {
            key: key.to_string(),
            folder: folder.to_string(),
            description: String::new(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        })
    }

    pub fn from_config(config: &CategoryConfig) -> Self {
        let mut keywords: Vec<String> = Vec::new();
        for keyword in &config.keywords {
            let keyword = keyword.trim().to_lowercase();
            if !keyword.is_empty() && !keywords.contains(&keyword) {
                keywords.push(keyword);
            }
        }

        Self {
            key: config.key.clone(),
            folder: config.folder.trim().to_string(),
            description: config.description.clone(),
            keywords,
        }
    }
}

/// The ordered category table a classifier scores against
#[derive(Debug, Clone, PartialEq)]
pub struct CategorySet {
    categories: Vec<Category>,
}

impl CategorySet {
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    pub fn from_config(configs: &[CategoryConfig]) -> Self {
        Self::new(configs.iter().map(Category::from_config).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter()
    }

    pub fn get(&self, key: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.key == key)
    }

    /// Folder name for a category key, if the key is mapped
    pub fn folder_for(&self, key: &str) -> Option<&str> {
        self.get(key).map(|c| c.folder.as_str()).filter(|f| !f.is_empty())
    }

    pub fn folders(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.folder.as_str())
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

/// Score of one category for one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: String,
    pub score: f64,
}

/// Computes `W_filename × matches(filename) + W_content × matches(content)`
#[derive(Debug, Clone)]
pub struct Scorer {
    filename_weight: f64,
    content_weight: f64,
}

impl Scorer {
    pub fn new(config: &ScoringConfig) -> Self {
        Self {
            filename_weight: config.filename_weight,
            content_weight: config.content_weight,
        }
    }

    /// Score every category, in declaration order, with no early exit
    pub fn score(&self, categories: &CategorySet, filename_text: &str, content: &str) -> Vec<CategoryScore> {
        let filename_lower = filename_text.to_lowercase();
        let content_lower = content.to_lowercase();

        categories.iter()
            .map(|category| {
                let filename_hits = keyword_matches(&filename_lower, &category.keywords);
                let content_hits = keyword_matches(&content_lower, &category.keywords);
                CategoryScore {
                    category: category.key.clone(),
                    score: self.filename_weight * filename_hits as f64
                        + self.content_weight * content_hits as f64,
                }
            })
            .collect()
    }
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new(&ScoringConfig::default())
    }
}

/// Total non-overlapping occurrences of every keyword in lowercased text
pub fn keyword_matches(text_lower: &str, keywords: &[String]) -> usize {
    keywords.iter()
        .filter(|k| !k.is_empty())
        .map(|k| text_lower.matches(k.as_str()).count())
        .sum()
}

/// Filenames separate words with `_` and `-`; score them as spaces
pub fn filename_text(filename: &str) -> String {
    filename.replace(['_', '-'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_repeated_keyword_counts_each_occurrence() {
        let text = "semester one, semester two, transcript";
        assert_eq!(keyword_matches(text, &keywords(&["semester", "transcript"])), 3);
    }

    #[test]
    fn test_matches_are_substrings() {
        // "course" also hits inside "courses"
        assert_eq!(keyword_matches("courses", &keywords(&["course", "courses"])), 2);
        assert_eq!(keyword_matches("aaaa", &keywords(&["aa"])), 2);
    }

    #[test]
    fn test_category_keywords_are_normalized() {
        let category = Category::new("A", "A Folder", &["GPA", "gpa", " Semester ", ""]);
        assert_eq!(category.keywords, keywords(&["gpa", "semester"]));
    }

    #[test]
    fn test_weighted_score() {
        let set = CategorySet::new(vec![
            Category::new("ACADEMIC", "Academic", &["transcript", "gpa"]),
            Category::new("TECH", "Tech", &["docker"]),
        ]);
        let scores = Scorer::default().score(&set, "Semester Transcript", "GPA 3.9, transcript attached");

        assert_eq!(scores[0].category, "ACADEMIC");
        // filename: 1 × 1.5, content: 2 × 1.0
        assert_eq!(scores[0].score, 3.5);
        assert_eq!(scores[1].score, 0.0);
    }

    #[test]
    fn test_filename_text() {
        assert_eq!(filename_text("Semester_Transcript-2024.pdf"), "Semester Transcript 2024.pdf");
    }

    #[test]
    fn test_folder_lookup() {
        let set = CategorySet::new(vec![Category::new("A", "Alpha", &["a"])]);
        assert_eq!(set.folder_for("A"), Some("Alpha"));
        assert_eq!(set.folder_for("B"), None);
    }
}
