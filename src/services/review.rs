// src/services/review.rs
use crate::errors::AdlensError;
use crate::models::*;
use crate::services::features::{self, QualitativeField};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BrandSafetyOverride {
    pub is_safe: Option<bool>,
    pub flags: Option<Vec<String>>,
    pub reasoning: Option<String>,
}

/// Reviewer edits. Determinations are keyed by `"category.field"`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ReviewOverrides {
    pub parent_company: Option<String>,
    pub brand: Option<String>,
    pub product: Option<String>,
    pub brand_safety: Option<BrandSafetyOverride>,
    #[serde(default)]
    pub determinations: BTreeMap<String, Value>,
}

/// Editable copy of an asset's analysis with a modified flag. Saving only
/// moves the baseline; the library entry is never rewritten.
#[derive(Debug, Clone)]
pub struct ReviewDraft {
    baseline: Asset,
    current: Asset,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView<'a> {
    pub asset: &'a Asset,
    pub is_dirty: bool,
    pub modified_fields: Vec<String>,
}

impl ReviewDraft {
    pub fn new(asset: Asset) -> Self {
        Self {
            baseline: asset.clone(),
            current: asset,
        }
    }

    pub fn current(&self) -> &Asset {
        &self.current
    }

    pub fn is_dirty(&self) -> bool {
        self.baseline != self.current
    }

    pub fn view(&self) -> ReviewView<'_> {
        ReviewView {
            asset: &self.current,
            is_dirty: self.is_dirty(),
            modified_fields: self.modified_fields(),
        }
    }

    pub fn modified_fields(&self) -> Vec<String> {
        let (old, new) = (&self.baseline, &self.current);
        let mut changed = Vec::new();

        if old.parent_company != new.parent_company {
            changed.push("parentCompany".to_string());
        }
        if old.brand != new.brand {
            changed.push("brand".to_string());
        }
        if old.product != new.product {
            changed.push("product".to_string());
        }

        let old_safety = old.brand_safety.as_ref();
        let new_safety = new.brand_safety.as_ref();
        if old_safety.map(|s| s.is_safe) != new_safety.map(|s| s.is_safe) {
            changed.push("brandSafety.isSafe".to_string());
        }
        if old_safety.map(|s| &s.flags) != new_safety.map(|s| &s.flags) {
            changed.push("brandSafety.flags".to_string());
        }
        if old_safety.map(|s| &s.reasoning) != new_safety.map(|s| &s.reasoning) {
            changed.push("brandSafety.reasoning".to_string());
        }

        if let (Some(old_analysis), Some(new_analysis)) = (&old.analysis, &new.analysis) {
            for field in QualitativeField::ALL {
                if old_analysis.feature_of(field) != new_analysis.feature_of(field) {
                    changed.push(field.path());
                }
            }
        }

        changed
    }

    /// Applies every override or none of them.
    pub fn apply(&mut self, overrides: ReviewOverrides) -> Result<(), AdlensError> {
        let mut next = self.current.clone();

        if let Some(v) = overrides.parent_company {
            next.parent_company = Some(v);
        }
        if let Some(v) = overrides.brand {
            next.brand = Some(v);
        }
        if let Some(v) = overrides.product {
            next.product = Some(v);
        }

        if let Some(safety) = overrides.brand_safety {
            let target = next.brand_safety.get_or_insert_with(|| BrandSafety {
                is_safe: true,
                flags: Vec::new(),
                reasoning: String::new(),
            });
            if let Some(is_safe) = safety.is_safe {
                target.is_safe = is_safe;
            }
            if let Some(flags) = safety.flags {
                target.flags = flags
                    .into_iter()
                    .map(|f| f.trim().to_string())
                    .filter(|f| !f.is_empty())
                    .collect();
            }
            if let Some(reasoning) = safety.reasoning {
                target.reasoning = reasoning;
            }
        }

        if !overrides.determinations.is_empty() {
            let analysis = next.analysis.as_mut().ok_or_else(|| {
                AdlensError::Validation(format!("asset {} has no analysis to override", next.id))
            })?;
            for (path, value) in overrides.determinations {
                let field = QualitativeField::from_path(&path).ok_or_else(|| {
                    AdlensError::Validation(format!("unknown rubric field '{}'", path))
                })?;
                analysis.override_determination(field, value)?;
            }
            next.ml_ready_features = Some(features::derive_features(analysis));
        }

        self.current = next;
        Ok(())
    }

    pub fn save(&mut self) -> Result<(), AdlensError> {
        if !self.is_dirty() {
            return Err(AdlensError::Validation("no changes to save".to_string()));
        }
        let modified = self.modified_fields();
        log::info!(
            "Saving overrides for asset {}: {}",
            self.current.id,
            modified.join(", ")
        );
        self.baseline = self.current.clone();
        Ok(())
    }
}
