// src/services/analyzer.rs
use crate::errors::AdlensError;
use crate::models::*;
use crate::services::features::{self, QualitativeField};
use crate::services::media::DataUri;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const NO_CONTEXT: &str = "No additional context provided.";

/// What the prompt template actually consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptInput {
    pub media: DataUri,
    pub context: String,
}

/// A hosted model that turns a rendered prompt plus media into raw text.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn complete(&self, input: &PromptInput) -> Result<String, AdlensError>;
    fn name(&self) -> &str;
    fn model(&self) -> &str;
}

fn provided(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Flattens the optional campaign and quantitative metadata into the single
/// context string handed to the model.
pub fn build_context(manual: &ManualData, quantitative: &QuantitativeData) -> String {
    let mut parts = Vec::new();

    if let Some(v) = provided(&manual.campaign_name) {
        parts.push(format!("Campaign Name: {}", v));
    }
    if let Some(v) = provided(&manual.creative_agency_name) {
        parts.push(format!("Agency: {}", v));
    }
    if !manual.platform_aired.is_empty() {
        parts.push(format!("Platforms Aired: {}", manual.platform_aired.join(", ")));
    }
    if let Some(v) = provided(&manual.endorsement_type) {
        parts.push(format!("Endorsement: {}", v));
    }
    if let Some(v) = provided(&manual.narrator_type) {
        parts.push(format!("Narrator: {}", v));
    }
    if let Some(v) = provided(&quantitative.transcript) {
        parts.push(format!("Transcript: {}", v));
    }
    if let Some(count) = quantitative.shot_count.filter(|c| *c > 0) {
        parts.push(format!("Shot Count: {}", count));
    }
    if !quantitative.detected_objects.is_empty() {
        parts.push(format!(
            "Detected Objects: {}",
            quantitative.detected_objects.join(", ")
        ));
    }

    if parts.is_empty() {
        NO_CONTEXT.to_string()
    } else {
        parts.join("\n")
    }
}

fn output_schema_doc() -> String {
    let mut categories: Vec<(&str, Vec<String>)> = Vec::new();
    for field in QualitativeField::ALL {
        let line = format!(
            "      \"{}\": {{ \"determination\": <one of: {} | \"{}\">, \"reasoning\": <string> }}",
            field.name(),
            field.allowed_values().join(", "),
            NOT_APPLICABLE
        );
        match categories.last_mut() {
            Some((name, lines)) if *name == field.category() => lines.push(line),
            _ => categories.push((field.category(), vec![line])),
        }
    }

    let analysis = categories
        .iter()
        .map(|(name, lines)| format!("    \"{}\": {{\n{}\n    }}", name, lines.join(",\n")))
        .collect::<Vec<_>>()
        .join(",\n");
    let features = QualitativeField::ALL
        .iter()
        .map(|f| format!("    \"{}\": <integer>", f.name()))
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        "{{\n  \"parentCompany\": <string>,\n  \"brand\": <string>,\n  \"product\": <string>,\n  \
         \"brandSafety\": {{ \"isSafe\": <boolean>, \"flags\": [<string>], \"reasoning\": <string> }},\n  \
         \"analysis\": {{\n{}\n  }},\n  \"mlReadyFeatures\": {{\n{}\n  }}\n}}",
        analysis, features
    )
}

/// Renders the combined brand-safety and scorecard instructions.
pub fn render_prompt(context: &str) -> String {
    format!(
        r#"You are a senior creative strategist and brand safety reviewer. Analyze the attached creative advertising asset.
Use every piece of context and technical data supplied below.
Answer with a single JSON object that follows the output schema exactly and contains nothing else.

PART 1: BRAND SAFETY AND PRODUCT IDENTIFICATION
1. Study the whole asset: logos, product names, on-screen text, setting and overall context.
2. Work out the parent company of the identified brand from general world knowledge (for example "Dove" belongs to "Unilever").
3. Check for brand safety problems: profanity, violence, sensitive subject matter and subtler contextual risks.
4. Fill in parentCompany, brand, product and brandSafety. When isSafe is false, list every issue in flags and explain it in reasoning. When isSafe is true, flags must be an empty list.

PART 2: QUALITATIVE SCORECARD
1. Decide whether the asset is a VIDEO, an IMAGE or an AUDIO file.
2. Break it down into its visual, audio and text components.
3. Judge every rubric field in the schema. When a field cannot apply to the format (for example pacing, music or an opening hook in a still image) its determination MUST be the exact string "{na}". Never omit a field and never guess.
4. Give a short reasoning string for every determination.
5. Fill in mlReadyFeatures by converting each determination with this fixed mapping:
{mapping}

OUTPUT SCHEMA
{schema}

PROVIDED CONTEXT
{context}
END OF CONTEXT"#,
        na = NOT_APPLICABLE,
        mapping = features::mapping_table(),
        schema = output_schema_doc(),
        context = context,
    )
}

/// Google AI (Gemini) `generateContent` with inline media.
pub struct GeminiProvider {
    api_key: String,
    model: String,
    client: Client,
}

impl GeminiProvider {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self, AdlensError> {
        Ok(Self {
            api_key,
            model,
            client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl ModelProvider for GeminiProvider {
    async fn complete(&self, input: &PromptInput) -> Result<String, AdlensError> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        );

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        { "text": render_prompt(&input.context) },
                        {
                            "inline_data": {
                                "mime_type": input.media.mime(),
                                "data": input.media.payload()
                            }
                        }
                    ]
                }],
                "generationConfig": {
                    "responseMimeType": "application/json",
                    "temperature": 0.2
                }
            }))
            .send()
            .await
            .map_err(|e| AdlensError::ModelCall(format!("Gemini request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AdlensError::ModelCall(format!(
                "Gemini error ({}): {}",
                status, error_text
            )));
        }

        let result: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AdlensError::ModelCall(format!("Failed to read Gemini response: {}", e)))?;

        let text = result["candidates"][0]["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p["text"].as_str())
                    .collect::<String>()
            })
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                let reason = result["candidates"][0]["finishReason"]
                    .as_str()
                    .or_else(|| result["promptFeedback"]["blockReason"].as_str())
                    .unwrap_or("no candidates");
                AdlensError::ModelCall(format!("Gemini returned no content ({})", reason))
            })?;

        Ok(text)
    }

    fn name(&self) -> &str {
        "googleai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// OpenAI chat completions; only still images can be inlined.
pub struct OpenAiProvider {
    api_key: String,
    model: String,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self, AdlensError> {
        Ok(Self {
            api_key,
            model,
            client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    async fn complete(&self, input: &PromptInput) -> Result<String, AdlensError> {
        if input.media.format() != MediaFormat::Image {
            return Err(AdlensError::Validation(format!(
                "provider openai cannot analyze {} media",
                input.media.mime()
            )));
        }

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": self.model,
                "messages": [{
                    "role": "user",
                    "content": [
                        {
                            "type": "text",
                            "text": render_prompt(&input.context)
                        },
                        {
                            "type": "image_url",
                            "image_url": { "url": input.media.to_string() }
                        }
                    ]
                }],
                "max_tokens": 4096,
                "response_format": { "type": "json_object" }
            }))
            .send()
            .await
            .map_err(|e| AdlensError::ModelCall(format!("OpenAI request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AdlensError::ModelCall(format!(
                "OpenAI error ({}): {}",
                status, error_text
            )));
        }

        let result: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AdlensError::ModelCall(format!("Failed to read OpenAI response: {}", e)))?;

        result["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AdlensError::ModelCall("No content in OpenAI response".to_string()))
    }

    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn build_client(timeout: Duration) -> Result<Client, AdlensError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AdlensError::ModelCall(format!("Failed to build HTTP client: {}", e)))
}

/// The prompt + schema pair: one model call per request, validated output.
pub struct AnalysisService {
    providers: HashMap<String, Arc<dyn ModelProvider>>,
    default_provider: String,
}

impl AnalysisService {
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.providers.insert(provider.name().to_string(), provider);
        self
    }

    pub fn has_provider(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    pub fn default_provider(&self) -> &str {
        &self.default_provider
    }

    pub async fn analyze(
        &self,
        request: &AnalysisRequest,
        provider: Option<&str>,
    ) -> Result<AnalysisResult, AdlensError> {
        let name = provider.unwrap_or(&self.default_provider);
        let model = self
            .providers
            .get(name)
            .ok_or_else(|| AdlensError::InvalidProvider(name.to_string()))?;

        let media = DataUri::parse(&request.media)?;
        let format = media.format();
        let input = PromptInput {
            media,
            context: build_context(&request.manual_data, &request.quantitative_data),
        };
        log::debug!("Analysis context: {}", input.context);

        let start = Instant::now();
        log::info!(
            "Running combined analysis via {} ({}) on {} media",
            model.name(),
            model.model(),
            format
        );
        let raw = model.complete(&input).await?;
        let result = features::parse_result(&raw, format)?;
        log::info!(
            "Combined analysis finished in {} ms: brand={} safe={}",
            start.elapsed().as_millis(),
            result.brand,
            result.brand_safety.is_safe
        );

        Ok(result)
    }
}
