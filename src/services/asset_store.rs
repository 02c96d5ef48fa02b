// src/services/asset_store.rs
use crate::errors::AdlensError;
use crate::models::*;
use crate::services::review::{ReviewDraft, ReviewOverrides};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, RwLock};
use uuid::Uuid;

const SEED_ASSETS: &str = include_str!("../../data/seed_assets.json");

/// Search and multi-select filters of the asset library, combined with AND.
/// Empty parts match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetFilter {
    pub search: String,
    pub statuses: Vec<AssetStatus>,
    pub content_types: Vec<AssetContentType>,
}

impl AssetFilter {
    /// Builds a filter from query parameters; multi-selects are comma separated.
    pub fn from_query(
        search: Option<&str>,
        statuses: Option<&str>,
        content_types: Option<&str>,
    ) -> Result<Self, AdlensError> {
        Ok(Self {
            search: search.unwrap_or_default().trim().to_string(),
            statuses: parse_selection(statuses)?,
            content_types: parse_selection(content_types)?,
        })
    }

    pub fn matches(&self, asset: &Asset) -> bool {
        let matches_search = self.search.is_empty() || {
            let needle = self.search.to_lowercase();
            asset.name.to_lowercase().contains(&needle)
                || asset.content_sn_id.to_lowercase().contains(&needle)
        };
        let matches_status = self.statuses.is_empty() || self.statuses.contains(&asset.status);
        let matches_content_type =
            self.content_types.is_empty() || self.content_types.contains(&asset.content_type);

        matches_search && matches_status && matches_content_type
    }

    pub fn apply(&self, assets: &[Asset]) -> Vec<Asset> {
        assets.iter().filter(|a| self.matches(a)).cloned().collect()
    }
}

fn parse_selection<T>(raw: Option<&str>) -> Result<Vec<T>, AdlensError>
where
    T: std::str::FromStr<Err = String> + PartialEq,
{
    let mut selected = Vec::new();
    for part in raw.unwrap_or_default().split(',') {
        if part.trim().is_empty() {
            continue;
        }
        let value: T = part.parse().map_err(AdlensError::Validation)?;
        if !selected.contains(&value) {
            selected.push(value);
        }
    }
    Ok(selected)
}

/// Builds the library entry for a freshly analyzed upload.
pub fn new_uploaded_asset(
    file_name: &str,
    mime: &str,
    result: AnalysisResult,
    now: DateTime<Utc>,
) -> Asset {
    let suffix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .to_uppercase()
        .chars()
        .take(6)
        .collect();

    Asset {
        id: format!("new-{}", now.timestamp_millis()),
        name: file_name.to_string(),
        creator: "N/A".to_string(),
        format: MediaFormat::from_mime(mime),
        length: "N/A".to_string(),
        tags: "AI Analyzed".to_string(),
        campaign: "New Campaign".to_string(),
        creation_date: now.date_naive(),
        content_sn_id: format!("NEW-ASSET-{}", suffix),
        daypart: "N/A".to_string(),
        spot_length: "N/A".to_string(),
        status: AssetStatus::New,
        content_type: AssetContentType::Branded,
        thumbnail: None,
        content_score: None,
        roas: None,
        parent_company: Some(result.parent_company),
        brand: Some(result.brand),
        product: Some(result.product),
        brand_safety: Some(result.brand_safety),
        analysis: Some(result.analysis),
        ml_ready_features: Some(result.ml_ready_features),
    }
}

/// Session-local asset library plus the reviewer's open drafts. Nothing here
/// outlives the process.
pub struct AssetStore {
    assets: RwLock<Vec<Asset>>,
    drafts: Mutex<HashMap<String, ReviewDraft>>,
}

impl AssetStore {
    pub fn new(assets: Vec<Asset>) -> Self {
        Self {
            assets: RwLock::new(assets),
            drafts: Mutex::new(HashMap::new()),
        }
    }

    pub fn seeded() -> Result<Self, AdlensError> {
        let assets: Vec<Asset> = serde_json::from_str(SEED_ASSETS)?;
        log::info!("Loaded {} seed assets", assets.len());
        Ok(Self::new(assets))
    }

    /// Newest uploads go to the head of the list.
    pub fn prepend(&self, asset: Asset) {
        let mut assets = self.assets.write().unwrap_or_else(PoisonError::into_inner);
        assets.insert(0, asset);
    }

    pub fn all(&self) -> Vec<Asset> {
        self.assets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.assets.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn get(&self, id: &str) -> Option<Asset> {
        self.assets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|a| a.id == id)
            .cloned()
    }

    pub fn find_by_content_sn_id(&self, content_sn_id: &str) -> Option<Asset> {
        self.assets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|a| a.content_sn_id == content_sn_id)
            .cloned()
    }

    pub fn filter(&self, filter: &AssetFilter) -> Vec<Asset> {
        let assets = self.assets.read().unwrap_or_else(PoisonError::into_inner);
        filter.apply(&assets)
    }

    fn with_draft<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut ReviewDraft) -> Result<R, AdlensError>,
    ) -> Result<R, AdlensError> {
        let mut drafts = self.drafts.lock().unwrap_or_else(PoisonError::into_inner);
        if !drafts.contains_key(id) {
            let asset = self
                .get(id)
                .ok_or_else(|| AdlensError::AssetNotFound(id.to_string()))?;
            drafts.insert(id.to_string(), ReviewDraft::new(asset));
        }
        let draft = drafts
            .get_mut(id)
            .ok_or_else(|| AdlensError::AssetNotFound(id.to_string()))?;
        f(draft)
    }

    pub fn draft(&self, id: &str) -> Result<ReviewDraft, AdlensError> {
        self.with_draft(id, |draft| Ok(draft.clone()))
    }

    pub fn apply_overrides(
        &self,
        id: &str,
        overrides: ReviewOverrides,
    ) -> Result<ReviewDraft, AdlensError> {
        self.with_draft(id, |draft| {
            draft.apply(overrides)?;
            Ok(draft.clone())
        })
    }

    pub fn save_draft(&self, id: &str) -> Result<ReviewDraft, AdlensError> {
        self.with_draft(id, |draft| {
            draft.save()?;
            Ok(draft.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::features::{self, QualitativeField, tests::image_result_json};

    fn store() -> AssetStore {
        AssetStore::seeded().expect("seed data parses")
    }

    #[test]
    fn seed_analyses_are_internally_consistent() {
        let assets = store().all();
        assert!(assets.len() >= 5);
        for asset in assets.iter().filter(|a| a.analysis.is_some()) {
            let analysis = asset.analysis.as_ref().unwrap();
            assert_eq!(
                asset.ml_ready_features,
                Some(features::derive_features(analysis)),
                "{}",
                asset.id
            );
            for field in features::inapplicable_fields(asset.format) {
                assert!(analysis.is_not_applicable(*field), "{} {:?}", asset.id, field);
            }
            if let Some(safety) = &asset.brand_safety {
                assert_eq!(safety.is_safe, safety.flags.is_empty(), "{}", asset.id);
            }
        }
    }

    #[test]
    fn empty_filter_returns_everything() {
        let store = store();
        assert_eq!(store.filter(&AssetFilter::default()), store.all());
    }

    #[test]
    fn filtering_is_idempotent() {
        let store = store();
        let filter = AssetFilter::from_query(Some("s"), Some("Approved,In Review"), None).unwrap();
        let once = store.filter(&filter);
        let twice = filter.apply(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn search_matches_name_or_content_id_case_insensitively() {
        let store = store();
        let by_id = AssetFilter::from_query(Some("sn-aud"), None, None).unwrap();
        let hits = store.filter(&by_id);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content_sn_id, "SN-AUD-3003");

        let by_name = AssetFilter::from_query(Some("HOLIDAY"), None, None).unwrap();
        assert!(store.filter(&by_name).iter().all(|a| a.name.contains("Holiday")));
    }

    #[test]
    fn filters_compose_with_and() {
        let store = store();
        let filter = AssetFilter::from_query(None, Some("Approved"), Some("Branded")).unwrap();
        let hits = store.filter(&filter);
        assert!(!hits.is_empty());
        assert!(hits
            .iter()
            .all(|a| a.status == AssetStatus::Approved && a.content_type == AssetContentType::Branded));

        let none = AssetFilter::from_query(None, Some("Rejected"), Some("UGC")).unwrap();
        assert!(store.filter(&none).is_empty());
    }

    #[test]
    fn unknown_filter_value_is_a_validation_error() {
        assert!(matches!(
            AssetFilter::from_query(None, Some("Archived"), None),
            Err(AdlensError::Validation(_))
        ));
    }

    #[test]
    fn uploads_are_prepended_with_defaults() {
        let store = store();
        let before = store.len();
        let result = serde_json::from_value(image_result_json()).unwrap();
        let asset = new_uploaded_asset("banner.png", "image/png", result, Utc::now());

        assert!(asset.id.starts_with("new-"));
        assert!(asset.content_sn_id.starts_with("NEW-ASSET-"));
        let suffix = &asset.content_sn_id["NEW-ASSET-".len()..];
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| matches!(c, '0'..='9' | 'A'..='F')));
        assert_eq!(asset.status, AssetStatus::New);
        assert_eq!(asset.content_type, AssetContentType::Branded);
        assert_eq!(asset.format, MediaFormat::Image);

        store.prepend(asset.clone());
        assert_eq!(store.len(), before + 1);
        assert_eq!(store.all()[0], asset);
        assert_eq!(store.get(&asset.id), Some(asset));
    }

    #[test]
    fn drafts_do_not_touch_the_library() {
        let store = store();
        let overrides: ReviewOverrides = serde_json::from_value(serde_json::json!({
            "brand": "Diet Pepsi",
            "determinations": { "execution.pacing": "Rushed" }
        }))
        .unwrap();

        let draft = store.apply_overrides("asset-001", overrides).unwrap();
        assert!(draft.is_dirty());
        assert_eq!(
            draft
                .current()
                .ml_ready_features
                .map(|f| f.get(QualitativeField::Pacing)),
            Some(2)
        );

        let saved = store.save_draft("asset-001").unwrap();
        assert!(!saved.is_dirty());
        assert_eq!(store.get("asset-001").unwrap().brand.as_deref(), Some("Pepsi"));
        assert_eq!(store.draft("asset-001").unwrap().current().brand.as_deref(), Some("Diet Pepsi"));
    }

    #[test]
    fn draft_for_unknown_asset_is_not_found() {
        assert!(matches!(
            store().draft("missing"),
            Err(AdlensError::AssetNotFound(_))
        ));
    }
}
