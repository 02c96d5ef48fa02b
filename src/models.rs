// src/models.rs
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Literal the model returns for a rubric field that does not apply to the
/// asset's media format.
pub const NOT_APPLICABLE: &str = "Not Applicable";

/// Numeric encoding used for a "Not Applicable" determination.
pub const NOT_APPLICABLE_FEATURE: i32 = -1;

/// Numeric encoding of a single determination for the ML-ready vector.
pub trait FeatureValue {
    fn feature_value(&self) -> i32;
}

impl FeatureValue for bool {
    fn feature_value(&self) -> i32 {
        i32::from(*self)
    }
}

/// Declares a closed set of labelled values. Variants are listed in ordinal
/// order; the ordinal is the numeric feature value.
macro_rules! closed_set {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $label)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            pub fn ordinal(self) -> i32 {
                self as i32
            }
        }

        impl FeatureValue for $name {
            fn feature_value(&self) -> i32 {
                self.ordinal()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.label())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.label().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| format!("unknown {} '{}'", stringify!($name), wanted))
            }
        }
    };
}

closed_set!(MessageComplexity {
    Simple => "Simple",
    Moderate => "Moderate",
    Complex => "Complex",
});

closed_set!(Pacing {
    Slow => "Slow",
    Appropriate => "Appropriate",
    Rushed => "Rushed",
});

closed_set!(PrimaryEmotion {
    Happiness => "Happiness",
    Trust => "Trust",
    Urgency => "Urgency",
    Nostalgia => "Nostalgia",
    Surprise => "Surprise",
    Fear => "Fear",
    Anger => "Anger",
    Sadness => "Sadness",
    Neutral => "Neutral",
});

closed_set!(CreativeNovelty {
    Formulaic => "Formulaic",
    Original => "Original",
    HighlyNovel => "Highly Novel",
});

closed_set!(CallToAction {
    Absent => "None",
    Vague => "Vague",
    Clear => "Clear",
});

closed_set!(
    /// Media format of an asset, as shown in the library's "Format" column.
    MediaFormat {
        Video => "Video",
        Image => "Image",
        Audio => "Audio",
    }
);

closed_set!(AssetStatus {
    New => "New",
    InReview => "In Review",
    Approved => "Approved",
    Rejected => "Rejected",
    ReadyForPublisher => "Ready for Publisher",
    PickedUp => "Picked Up",
});

closed_set!(AssetContentType {
    Branded => "Branded",
    Endorsed => "Endorsed",
    Ugc => "UGC",
    Mixed => "Mixed",
    Unspecified => "N/A",
});

impl MediaFormat {
    /// Anything that is neither video nor image is treated as audio.
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.trim().to_ascii_lowercase();
        if mime.starts_with("video") {
            MediaFormat::Video
        } else if mime.starts_with("image") {
            MediaFormat::Image
        } else {
            MediaFormat::Audio
        }
    }
}

/// A 1-5 rubric score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Score(u8);

impl Score {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Score {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (Self::MIN as i64..=Self::MAX as i64).contains(&value) {
            Ok(Score(value as u8))
        } else {
            Err(format!(
                "score {} outside {}..={}",
                value,
                Self::MIN,
                Self::MAX
            ))
        }
    }
}

impl From<Score> for i64 {
    fn from(score: Score) -> Self {
        score.0 as i64
    }
}

impl FeatureValue for Score {
    fn feature_value(&self) -> i32 {
        self.0 as i32
    }
}

/// A determination that is either a concrete value or explicitly
/// "Not Applicable" for the asset's format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assessed<T> {
    Value(T),
    NotApplicable,
}

impl<T> Assessed<T> {
    pub fn is_not_applicable(&self) -> bool {
        matches!(self, Assessed::NotApplicable)
    }
}

impl<T: FeatureValue> FeatureValue for Assessed<T> {
    fn feature_value(&self) -> i32 {
        match self {
            Assessed::Value(v) => v.feature_value(),
            Assessed::NotApplicable => NOT_APPLICABLE_FEATURE,
        }
    }
}

impl<T: Serialize> Serialize for Assessed<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Assessed::Value(v) => v.serialize(serializer),
            Assessed::NotApplicable => serializer.serialize_str(NOT_APPLICABLE),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Assessed<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        if raw.as_str() == Some(NOT_APPLICABLE) {
            return Ok(Assessed::NotApplicable);
        }
        T::deserialize(raw)
            .map(Assessed::Value)
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "T: Serialize",
    deserialize = "T: DeserializeOwned"
))]
pub struct Determination<T> {
    pub determination: Assessed<T>,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageStrategy {
    pub has_single_message_focus: Determination<bool>,
    pub message_complexity: Determination<MessageComplexity>,
    pub uses_right_brain_elements: Determination<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub music_prominently_featured: Determination<bool>,
    pub is_emotional_storytelling: Determination<bool>,
    pub uses_humor: Determination<bool>,
    pub pacing: Determination<Pacing>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionalImpact {
    pub is_emotion_driven: Determination<bool>,
    pub primary_emotion: Determination<PrimaryEmotion>,
    pub has_positive_tone: Determination<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
    pub has_attention_grabbing_intro: Determination<bool>,
    pub creative_novelty: Determination<CreativeNovelty>,
    pub brand_fit_score: Determination<Score>,
    pub target_audience_alignment_score: Determination<Score>,
    pub has_clear_call_to_action: Determination<CallToAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualitativeAnalysis {
    pub message_strategy: MessageStrategy,
    pub execution: Execution,
    pub emotional_impact: EmotionalImpact,
    pub performance: Performance,
}

/// Flattened numeric form of [`QualitativeAnalysis`], one field per rubric
/// field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MlReadyFeatures {
    pub has_single_message_focus: i32,
    pub message_complexity: i32,
    pub uses_right_brain_elements: i32,
    pub music_prominently_featured: i32,
    pub is_emotional_storytelling: i32,
    pub uses_humor: i32,
    pub pacing: i32,
    pub is_emotion_driven: i32,
    pub primary_emotion: i32,
    pub has_positive_tone: i32,
    pub has_attention_grabbing_intro: i32,
    pub creative_novelty: i32,
    pub brand_fit_score: i32,
    pub target_audience_alignment_score: i32,
    pub has_clear_call_to_action: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandSafety {
    pub is_safe: bool,
    pub flags: Vec<String>,
    pub reasoning: String,
}

/// Structured output of one combined analysis call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub parent_company: String,
    pub brand: String,
    pub product: String,
    pub brand_safety: BrandSafety,
    pub analysis: QualitativeAnalysis,
    pub ml_ready_features: MlReadyFeatures,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManualData {
    pub campaign_name: Option<String>,
    pub creative_agency_name: Option<String>,
    pub platform_aired: Vec<String>,
    pub endorsement_type: Option<String>,
    pub narrator_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuantitativeData {
    pub transcript: Option<String>,
    pub shot_count: Option<u32>,
    pub detected_objects: Vec<String>,
}

/// Optional context a client may send alongside an upload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisContext {
    pub manual_data: ManualData,
    pub quantitative_data: QuantitativeData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    /// Media as a `data:<mime>;base64,<payload>` URI.
    pub media: String,
    #[serde(default)]
    pub manual_data: ManualData,
    #[serde(default)]
    pub quantitative_data: QuantitativeData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub name: String,
    pub creator: String,
    #[serde(rename = "type")]
    pub format: MediaFormat,
    pub length: String,
    pub tags: String,
    pub campaign: String,
    pub creation_date: NaiveDate,
    pub content_sn_id: String,
    pub daypart: String,
    pub spot_length: String,
    pub status: AssetStatus,
    pub content_type: AssetContentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roas: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_safety: Option<BrandSafety>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<QualitativeAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ml_ready_features: Option<MlReadyFeatures>,
}

/// Display band for a content score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreBand {
    Good,
    Fair,
    Poor,
}

impl ScoreBand {
    pub fn for_score(score: u8) -> Self {
        if score > 75 {
            ScoreBand::Good
        } else if score >= 50 {
            ScoreBand::Fair
        } else {
            ScoreBand::Poor
        }
    }
}

/// Row of the asset library table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetSummary {
    pub id: String,
    pub name: String,
    pub content_sn_id: String,
    #[serde(rename = "type")]
    pub format: MediaFormat,
    pub content_type: AssetContentType,
    pub status: AssetStatus,
    pub creation_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_band: Option<ScoreBand>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand_safety: Option<BrandSafety>,
}

impl From<&Asset> for AssetSummary {
    fn from(asset: &Asset) -> Self {
        Self {
            id: asset.id.clone(),
            name: asset.name.clone(),
            content_sn_id: asset.content_sn_id.clone(),
            format: asset.format,
            content_type: asset.content_type,
            status: asset.status,
            creation_date: asset.creation_date,
            thumbnail: asset.thumbnail.clone(),
            content_score: asset.content_score,
            score_band: asset.content_score.map(ScoreBand::for_score),
            brand_safety: asset.brand_safety.clone(),
        }
    }
}

closed_set!(
    /// Ad platforms the publish page can target.
    Platform {
        Google => "Google Ads",
        Meta => "Meta Ads",
        TikTok => "TikTok Ads",
        LinkedIn => "LinkedIn Ads",
    }
);

impl Platform {
    pub fn id(self) -> &'static str {
        match self {
            Platform::Google => "google",
            Platform::Meta => "meta",
            Platform::TikTok => "tiktok",
            Platform::LinkedIn => "linkedin",
        }
    }

    /// Accepts either the short id or the display name.
    pub fn parse(value: &str) -> Option<Self> {
        let wanted = value.trim();
        Self::ALL.iter().copied().find(|p| {
            p.id().eq_ignore_ascii_case(wanted) || p.label().eq_ignore_ascii_case(wanted)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishReceipt {
    pub content_sn_id: String,
    pub asset_name: String,
    pub platform: Platform,
    pub published_at: chrono::DateTime<chrono::Utc>,
    pub message: String,
}
