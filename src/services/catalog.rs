// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activity catalog loading and lookup service.

use crate::error::AppError;
use crate::models::{Activity, Badge, Category, ChallengeTemplate, TargetMetric};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

/// On-disk catalog document.
#[derive(Deserialize)]
struct CatalogFile {
    categories: Vec<Category>,
    activities: Vec<Activity>,
    #[serde(default)]
    challenges: Vec<ChallengeTemplate>,
    #[serde(default)]
    badges: Vec<Badge>,
}

/// Read-only reference data: categories, activities, challenge templates
/// and badges. Immutable after loading.
#[derive(Default, Clone)]
pub struct CatalogService {
    categories: Vec<Category>,
    activities: Vec<Activity>,
    templates: Vec<ChallengeTemplate>,
    badges: Vec<Badge>,
    category_index: HashMap<String, usize>,
    activity_index: HashMap<String, usize>,
    template_index: HashMap<String, usize>,
}

impl CatalogService {
    /// Load the catalog from a JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let json_data =
            fs::read_to_string(path.as_ref()).map_err(|e| CatalogError::IoError(e.to_string()))?;
        Self::load_from_json(&json_data)
    }

    /// Load the catalog from a JSON string.
    pub fn load_from_json(json_data: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile =
            serde_json::from_str(json_data).map_err(|e| CatalogError::ParseError(e.to_string()))?;

        let category_index = index_by_id(&file.categories, |c| &c.id, "category")?;
        let activity_index = index_by_id(&file.activities, |a| &a.id, "activity")?;
        let template_index = index_by_id(&file.challenges, |t| &t.id, "challenge")?;
        index_by_id(&file.badges, |b| &b.id, "badge")?;

        for activity in &file.activities {
            if !category_index.contains_key(&activity.category_id) {
                return Err(CatalogError::DanglingCategory {
                    referenced_by: activity.id.clone(),
                    category_id: activity.category_id.clone(),
                });
            }
        }

        for template in &file.challenges {
            if template.target <= Decimal::ZERO || template.duration_days == 0 {
                return Err(CatalogError::InvalidChallenge(template.id.clone()));
            }
            let referenced = match &template.metric {
                TargetMetric::CategoryCount { category_id } => Some(category_id),
                _ => None,
            };
            for category_id in referenced.into_iter().chain([&template.category_id]) {
                if !category_index.contains_key(category_id) {
                    return Err(CatalogError::DanglingCategory {
                        referenced_by: template.id.clone(),
                        category_id: category_id.clone(),
                    });
                }
            }
        }

        tracing::info!(
            categories = file.categories.len(),
            activities = file.activities.len(),
            challenges = file.challenges.len(),
            badges = file.badges.len(),
            "Loaded activity catalog"
        );

        Ok(Self {
            categories: file.categories,
            activities: file.activities,
            templates: file.challenges,
            badges: file.badges,
            category_index,
            activity_index,
            template_index,
        })
    }

    /// All categories in catalog order.
    pub fn list_categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn get_category(&self, id: &str) -> Result<&Category, AppError> {
        self.category_index
            .get(id)
            .map(|&i| &self.categories[i])
            .ok_or_else(|| AppError::NotFound(format!("Category {}", id)))
    }

    pub fn get_activity(&self, id: &str) -> Result<&Activity, AppError> {
        self.activity_index
            .get(id)
            .map(|&i| &self.activities[i])
            .ok_or_else(|| AppError::NotFound(format!("Activity {}", id)))
    }

    /// Activities in catalog order, optionally restricted to one category.
    pub fn list_activities(&self, category_id: Option<&str>) -> Vec<&Activity> {
        self.activities
            .iter()
            .filter(|a| category_id.map_or(true, |c| a.category_id == c))
            .collect()
    }

    pub fn get_template(&self, id: &str) -> Result<&ChallengeTemplate, AppError> {
        self.template_index
            .get(id)
            .map(|&i| &self.templates[i])
            .ok_or_else(|| AppError::NotFound(format!("Challenge template {}", id)))
    }

    pub fn list_templates(&self) -> &[ChallengeTemplate] {
        &self.templates
    }

    pub fn list_badges(&self) -> &[Badge] {
        &self.badges
    }
}

fn index_by_id<T>(
    items: &[T],
    id_of: impl Fn(&T) -> &String,
    kind: &'static str,
) -> Result<HashMap<String, usize>, CatalogError> {
    let mut seen = HashSet::new();
    let mut index = HashMap::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let id = id_of(item);
        if !seen.insert(id.clone()) {
            return Err(CatalogError::DuplicateId {
                kind,
                id: id.clone(),
            });
        }
        index.insert(id.clone(), i);
    }
    Ok(index)
}

/// Errors from catalog loading (startup only).
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read file: {0}")]
    IoError(String),

    #[error("Failed to parse catalog: {0}")]
    ParseError(String),

    #[error("Duplicate {kind} id: {id}")]
    DuplicateId { kind: &'static str, id: String },

    #[error("{referenced_by} references unknown category {category_id}")]
    DanglingCategory {
        referenced_by: String,
        category_id: String,
    },

    #[error("Challenge {0} must have a positive target and duration")]
    InvalidChallenge(String),
}
