// src/services/features.rs
//! Rubric field registry: ML feature derivation, format applicability and
//! validation of model output against the analysis schema.

use crate::errors::AdlensError;
use crate::models::*;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Every qualitative rubric field, in ML-feature order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QualitativeField {
    HasSingleMessageFocus,
    MessageComplexity,
    UsesRightBrainElements,
    MusicProminentlyFeatured,
    IsEmotionalStorytelling,
    UsesHumor,
    Pacing,
    IsEmotionDriven,
    PrimaryEmotion,
    HasPositiveTone,
    HasAttentionGrabbingIntro,
    CreativeNovelty,
    BrandFitScore,
    TargetAudienceAlignmentScore,
    HasClearCallToAction,
}

use QualitativeField as F;

impl QualitativeField {
    pub const ALL: [QualitativeField; 15] = [
        F::HasSingleMessageFocus,
        F::MessageComplexity,
        F::UsesRightBrainElements,
        F::MusicProminentlyFeatured,
        F::IsEmotionalStorytelling,
        F::UsesHumor,
        F::Pacing,
        F::IsEmotionDriven,
        F::PrimaryEmotion,
        F::HasPositiveTone,
        F::HasAttentionGrabbingIntro,
        F::CreativeNovelty,
        F::BrandFitScore,
        F::TargetAudienceAlignmentScore,
        F::HasClearCallToAction,
    ];

    pub fn category(self) -> &'static str {
        match self {
            F::HasSingleMessageFocus | F::MessageComplexity | F::UsesRightBrainElements => {
                "messageStrategy"
            }
            F::MusicProminentlyFeatured | F::IsEmotionalStorytelling | F::UsesHumor | F::Pacing => {
                "execution"
            }
            F::IsEmotionDriven | F::PrimaryEmotion | F::HasPositiveTone => "emotionalImpact",
            F::HasAttentionGrabbingIntro
            | F::CreativeNovelty
            | F::BrandFitScore
            | F::TargetAudienceAlignmentScore
            | F::HasClearCallToAction => "performance",
        }
    }

    /// Field name inside its category, also the name of its ML feature.
    pub fn name(self) -> &'static str {
        match self {
            F::HasSingleMessageFocus => "hasSingleMessageFocus",
            F::MessageComplexity => "messageComplexity",
            F::UsesRightBrainElements => "usesRightBrainElements",
            F::MusicProminentlyFeatured => "musicProminentlyFeatured",
            F::IsEmotionalStorytelling => "isEmotionalStorytelling",
            F::UsesHumor => "usesHumor",
            F::Pacing => "pacing",
            F::IsEmotionDriven => "isEmotionDriven",
            F::PrimaryEmotion => "primaryEmotion",
            F::HasPositiveTone => "hasPositiveTone",
            F::HasAttentionGrabbingIntro => "hasAttentionGrabbingIntro",
            F::CreativeNovelty => "creativeNovelty",
            F::BrandFitScore => "brandFitScore",
            F::TargetAudienceAlignmentScore => "targetAudienceAlignmentScore",
            F::HasClearCallToAction => "hasClearCallToAction",
        }
    }

    pub fn path(self) -> String {
        format!("{}.{}", self.category(), self.name())
    }

    /// Resolves `"category.field"` or a bare field name.
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.trim().trim_start_matches("analysis.");
        Self::ALL.iter().copied().find(|f| {
            path == f.name() || path.split_once('.') == Some((f.category(), f.name()))
        })
    }

    /// Allowed determination values as they appear in model output.
    pub fn allowed_values(self) -> Vec<String> {
        fn labels<T: Copy + std::fmt::Display>(all: &[T]) -> Vec<String> {
            all.iter().map(|v| v.to_string()).collect()
        }
        match self {
            F::MessageComplexity => labels(MessageComplexity::ALL),
            F::Pacing => labels(Pacing::ALL),
            F::PrimaryEmotion => labels(PrimaryEmotion::ALL),
            F::CreativeNovelty => labels(CreativeNovelty::ALL),
            F::HasClearCallToAction => labels(CallToAction::ALL),
            F::BrandFitScore | F::TargetAudienceAlignmentScore => {
                (Score::MIN..=Score::MAX).map(|s| s.to_string()).collect()
            }
            _ => vec!["true".to_string(), "false".to_string()],
        }
    }

    /// Value-to-number mapping, rendered for the prompt.
    pub fn mapping(self) -> String {
        fn ordinals<T: Copy + std::fmt::Display + FeatureValue>(all: &[T]) -> String {
            all.iter()
                .map(|v| format!("{}={}", v, v.feature_value()))
                .collect::<Vec<_>>()
                .join(", ")
        }
        match self {
            F::MessageComplexity => ordinals(MessageComplexity::ALL),
            F::Pacing => ordinals(Pacing::ALL),
            F::PrimaryEmotion => ordinals(PrimaryEmotion::ALL),
            F::CreativeNovelty => ordinals(CreativeNovelty::ALL),
            F::HasClearCallToAction => ordinals(CallToAction::ALL),
            F::BrandFitScore | F::TargetAudienceAlignmentScore => {
                format!("score passed through ({}-{})", Score::MIN, Score::MAX)
            }
            _ => format!(
                "true={}, false={}",
                true.feature_value(),
                false.feature_value()
            ),
        }
    }
}

/// Fields that cannot be judged for a given media format.
pub fn inapplicable_fields(format: MediaFormat) -> &'static [QualitativeField] {
    match format {
        MediaFormat::Image => &[
            F::Pacing,
            F::MusicProminentlyFeatured,
            F::HasAttentionGrabbingIntro,
        ],
        MediaFormat::Video | MediaFormat::Audio => &[],
    }
}

impl QualitativeAnalysis {
    pub fn feature_of(&self, field: QualitativeField) -> i32 {
        let (ms, ex, em, pf) = (
            &self.message_strategy,
            &self.execution,
            &self.emotional_impact,
            &self.performance,
        );
        match field {
            F::HasSingleMessageFocus => ms.has_single_message_focus.determination.feature_value(),
            F::MessageComplexity => ms.message_complexity.determination.feature_value(),
            F::UsesRightBrainElements => ms.uses_right_brain_elements.determination.feature_value(),
            F::MusicProminentlyFeatured => ex.music_prominently_featured.determination.feature_value(),
            F::IsEmotionalStorytelling => ex.is_emotional_storytelling.determination.feature_value(),
            F::UsesHumor => ex.uses_humor.determination.feature_value(),
            F::Pacing => ex.pacing.determination.feature_value(),
            F::IsEmotionDriven => em.is_emotion_driven.determination.feature_value(),
            F::PrimaryEmotion => em.primary_emotion.determination.feature_value(),
            F::HasPositiveTone => em.has_positive_tone.determination.feature_value(),
            F::HasAttentionGrabbingIntro => {
                pf.has_attention_grabbing_intro.determination.feature_value()
            }
            F::CreativeNovelty => pf.creative_novelty.determination.feature_value(),
            F::BrandFitScore => pf.brand_fit_score.determination.feature_value(),
            F::TargetAudienceAlignmentScore => {
                pf.target_audience_alignment_score.determination.feature_value()
            }
            F::HasClearCallToAction => pf.has_clear_call_to_action.determination.feature_value(),
        }
    }

    pub fn is_not_applicable(&self, field: QualitativeField) -> bool {
        self.feature_of(field) == NOT_APPLICABLE_FEATURE
    }

    /// Replaces one determination with a reviewer-supplied JSON value. The
    /// value must belong to the field's closed set (or be "Not Applicable").
    pub fn override_determination(
        &mut self,
        field: QualitativeField,
        value: Value,
    ) -> Result<(), AdlensError> {
        fn assign<T: DeserializeOwned>(
            slot: &mut Determination<T>,
            field: QualitativeField,
            value: Value,
        ) -> Result<(), AdlensError> {
            slot.determination = serde_json::from_value(value).map_err(|e| {
                AdlensError::Validation(format!(
                    "invalid value for {}: {} (allowed: {}, {})",
                    field.path(),
                    e,
                    field.allowed_values().join(", "),
                    NOT_APPLICABLE
                ))
            })?;
            Ok(())
        }

        let (ms, ex, em, pf) = (
            &mut self.message_strategy,
            &mut self.execution,
            &mut self.emotional_impact,
            &mut self.performance,
        );
        match field {
            F::HasSingleMessageFocus => assign(&mut ms.has_single_message_focus, field, value),
            F::MessageComplexity => assign(&mut ms.message_complexity, field, value),
            F::UsesRightBrainElements => assign(&mut ms.uses_right_brain_elements, field, value),
            F::MusicProminentlyFeatured => assign(&mut ex.music_prominently_featured, field, value),
            F::IsEmotionalStorytelling => assign(&mut ex.is_emotional_storytelling, field, value),
            F::UsesHumor => assign(&mut ex.uses_humor, field, value),
            F::Pacing => assign(&mut ex.pacing, field, value),
            F::IsEmotionDriven => assign(&mut em.is_emotion_driven, field, value),
            F::PrimaryEmotion => assign(&mut em.primary_emotion, field, value),
            F::HasPositiveTone => assign(&mut em.has_positive_tone, field, value),
            F::HasAttentionGrabbingIntro => {
                assign(&mut pf.has_attention_grabbing_intro, field, value)
            }
            F::CreativeNovelty => assign(&mut pf.creative_novelty, field, value),
            F::BrandFitScore => assign(&mut pf.brand_fit_score, field, value),
            F::TargetAudienceAlignmentScore => {
                assign(&mut pf.target_audience_alignment_score, field, value)
            }
            F::HasClearCallToAction => assign(&mut pf.has_clear_call_to_action, field, value),
        }
    }
}

impl MlReadyFeatures {
    pub fn get(&self, field: QualitativeField) -> i32 {
        match field {
            F::HasSingleMessageFocus => self.has_single_message_focus,
            F::MessageComplexity => self.message_complexity,
            F::UsesRightBrainElements => self.uses_right_brain_elements,
            F::MusicProminentlyFeatured => self.music_prominently_featured,
            F::IsEmotionalStorytelling => self.is_emotional_storytelling,
            F::UsesHumor => self.uses_humor,
            F::Pacing => self.pacing,
            F::IsEmotionDriven => self.is_emotion_driven,
            F::PrimaryEmotion => self.primary_emotion,
            F::HasPositiveTone => self.has_positive_tone,
            F::HasAttentionGrabbingIntro => self.has_attention_grabbing_intro,
            F::CreativeNovelty => self.creative_novelty,
            F::BrandFitScore => self.brand_fit_score,
            F::TargetAudienceAlignmentScore => self.target_audience_alignment_score,
            F::HasClearCallToAction => self.has_clear_call_to_action,
        }
    }
}

/// Derives the ML-ready vector from the qualitative determinations.
pub fn derive_features(analysis: &QualitativeAnalysis) -> MlReadyFeatures {
    let f = |field| analysis.feature_of(field);
    MlReadyFeatures {
        has_single_message_focus: f(F::HasSingleMessageFocus),
        message_complexity: f(F::MessageComplexity),
        uses_right_brain_elements: f(F::UsesRightBrainElements),
        music_prominently_featured: f(F::MusicProminentlyFeatured),
        is_emotional_storytelling: f(F::IsEmotionalStorytelling),
        uses_humor: f(F::UsesHumor),
        pacing: f(F::Pacing),
        is_emotion_driven: f(F::IsEmotionDriven),
        primary_emotion: f(F::PrimaryEmotion),
        has_positive_tone: f(F::HasPositiveTone),
        has_attention_grabbing_intro: f(F::HasAttentionGrabbingIntro),
        creative_novelty: f(F::CreativeNovelty),
        brand_fit_score: f(F::BrandFitScore),
        target_audience_alignment_score: f(F::TargetAudienceAlignmentScore),
        has_clear_call_to_action: f(F::HasClearCallToAction),
    }
}

/// Mapping table embedded in the prompt. Built from the same code that
/// derives features, so the two cannot drift apart.
pub fn mapping_table() -> String {
    let mut lines: Vec<String> = QualitativeField::ALL
        .iter()
        .map(|f| format!("- {}: {}", f.name(), f.mapping()))
        .collect();
    lines.push(format!(
        "- any field whose determination is \"{}\": {}",
        NOT_APPLICABLE, NOT_APPLICABLE_FEATURE
    ));
    lines.join("\n")
}

/// Checks the invariants serde cannot express: brand-safety consistency,
/// format applicability and agreement of the ML vector with the rubric.
pub fn validate_result(result: &AnalysisResult, format: MediaFormat) -> Result<(), AdlensError> {
    let safety = &result.brand_safety;
    if safety.is_safe && !safety.flags.is_empty() {
        return Err(AdlensError::SchemaValidation(format!(
            "brandSafety.flags must be empty for a safe verdict, got {:?}",
            safety.flags
        )));
    }
    if !safety.is_safe {
        if safety.flags.iter().all(|f| f.trim().is_empty()) {
            return Err(AdlensError::SchemaValidation(
                "brandSafety.flags must be non-empty when isSafe is false".to_string(),
            ));
        }
        if safety.reasoning.trim().is_empty() {
            return Err(AdlensError::SchemaValidation(
                "brandSafety.reasoning is required when isSafe is false".to_string(),
            ));
        }
    }

    let inapplicable = inapplicable_fields(format);
    for field in QualitativeField::ALL {
        let expected_na = inapplicable.contains(&field);
        if result.analysis.is_not_applicable(field) != expected_na {
            let rule = if expected_na { "must be" } else { "must not be" };
            return Err(AdlensError::SchemaValidation(format!(
                "{} {} \"{}\" for {} assets",
                field.path(),
                rule,
                NOT_APPLICABLE,
                format
            )));
        }
    }

    let derived = derive_features(&result.analysis);
    for field in QualitativeField::ALL {
        let reported = result.ml_ready_features.get(field);
        let expected = derived.get(field);
        if reported != expected {
            return Err(AdlensError::SchemaValidation(format!(
                "mlReadyFeatures.{} is {} but {} maps to {}",
                field.name(),
                reported,
                field.path(),
                expected
            )));
        }
    }

    Ok(())
}

/// Parses raw model text into a validated [`AnalysisResult`].
pub fn parse_result(raw: &str, format: MediaFormat) -> Result<AnalysisResult, AdlensError> {
    let body = strip_code_fence(raw);
    let result: AnalysisResult = serde_json::from_str(body)
        .map_err(|e| AdlensError::SchemaValidation(format!("model output rejected: {}", e)))?;
    validate_result(&result, format)?;
    Ok(result)
}

// Models sometimes wrap JSON in a markdown fence even in JSON mode.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
