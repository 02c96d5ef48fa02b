// src/handlers.rs
use crate::services::asset_store::{AssetFilter, new_uploaded_asset};
use crate::services::media::{DataUri, mime_for_path};
use crate::services::review::ReviewOverrides;
use crate::{AppState, errors::AdlensError, models::*};
use actix_multipart::{Field, Multipart};
use actix_web::{Error, HttpResponse, web};
use futures_util::TryStreamExt;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub provider: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetListQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishBody {
    pub content_sn_id: Option<String>,
    pub platform: Option<String>,
}

struct UploadedFile {
    name: String,
    content_type: String,
    data: Vec<u8>,
}

async fn read_field(field: &mut Field, limit: usize) -> Result<Vec<u8>, Error> {
    let mut data = Vec::new();
    while let Some(chunk) = field.try_next().await? {
        if data.len() + chunk.len() > limit {
            return Err(AdlensError::Validation(format!(
                "upload exceeds the {} byte limit",
                limit
            ))
            .into());
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

/// Accepts one file (plus an optional `context` JSON part), runs the combined
/// analysis and adds the result to the head of the library.
pub async fn upload_asset(
    mut payload: Multipart,
    query: web::Query<UploadQuery>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let _busy = data
        .analysis_busy
        .try_acquire()
        .ok_or(AdlensError::AnalysisInProgress)?;

    let limit = data.config.max_upload_bytes;
    let mut file: Option<UploadedFile> = None;
    let mut context = AnalysisContext::default();

    while let Some(mut field) = payload.try_next().await? {
        let field_name = field.name().to_string();
        let filename = field
            .content_disposition()
            .get_filename()
            .map(|f| f.to_string());
        let content_type = field
            .content_type()
            .map(|ct| ct.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let bytes = read_field(&mut field, limit).await?;

        if field_name == "context" {
            context = serde_json::from_slice(&bytes).map_err(|e| {
                AdlensError::Validation(format!("invalid context JSON: {}", e))
            })?;
        } else if let Some(name) = filename {
            if file.is_some() {
                return Err(
                    AdlensError::Validation("only one file per upload".to_string()).into(),
                );
            }
            file = Some(UploadedFile {
                name,
                content_type,
                data: bytes,
            });
        }
    }

    let file = file.ok_or_else(|| AdlensError::Validation("No file provided".to_string()))?;
    let (media, media_type) = data.media_processor.prepare(&file.data, &file.content_type)?;

    let request = AnalysisRequest {
        media: DataUri::encode(&media_type, &media).to_string(),
        manual_data: context.manual_data,
        quantitative_data: context.quantitative_data,
    };

    let result = match data
        .analysis_service
        .analyze(&request, query.provider.as_deref())
        .await
    {
        Ok(result) => result,
        Err(e) => {
            log::warn!("Analysis of {} failed: {}", file.name, e);
            return Err(e.into());
        }
    };

    let asset = new_uploaded_asset(&file.name, &file.content_type, result, chrono::Utc::now());
    log::info!(
        "{} has been analyzed and added to the library as {}",
        asset.name,
        asset.id
    );
    data.asset_store.prepend(asset.clone());

    Ok(HttpResponse::Created().json(&asset))
}

pub async fn list_assets(
    query: web::Query<AssetListQuery>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let filter = AssetFilter::from_query(
        query.search.as_deref(),
        query.status.as_deref(),
        query.content_type.as_deref(),
    )?;

    let assets = data.asset_store.filter(&filter);
    log::debug!("Asset filter {:?} matched {} assets", filter, assets.len());
    let summaries: Vec<AssetSummary> = assets.iter().map(AssetSummary::from).collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "assets": summaries,
        "count": summaries.len(),
        "total": data.asset_store.len()
    })))
}

pub async fn asset_facets() -> HttpResponse {
    let statuses: Vec<&str> = AssetStatus::ALL.iter().map(|s| s.label()).collect();
    let content_types: Vec<&str> = AssetContentType::ALL.iter().map(|c| c.label()).collect();

    HttpResponse::Ok().json(serde_json::json!({
        "statuses": statuses,
        "contentTypes": content_types
    }))
}

pub async fn get_asset(
    path: web::Path<String>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let asset_id = path.into_inner();

    let asset = data
        .asset_store
        .get(&asset_id)
        .ok_or(AdlensError::AssetNotFound(asset_id))?;

    Ok(HttpResponse::Ok().json(&asset))
}

pub async fn get_review(
    path: web::Path<String>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let draft = data.asset_store.draft(&path.into_inner())?;
    Ok(HttpResponse::Ok().json(draft.view()))
}

pub async fn update_review(
    path: web::Path<String>,
    body: web::Json<ReviewOverrides>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let draft = data
        .asset_store
        .apply_overrides(&path.into_inner(), body.into_inner())?;
    Ok(HttpResponse::Ok().json(draft.view()))
}

pub async fn save_review(
    path: web::Path<String>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let draft = data.asset_store.save_draft(&path.into_inner())?;
    Ok(HttpResponse::Ok().json(draft.view()))
}

pub async fn list_platforms() -> HttpResponse {
    let platforms: Vec<serde_json::Value> = Platform::ALL
        .iter()
        .map(|p| serde_json::json!({ "id": p.id(), "name": p.label() }))
        .collect();

    HttpResponse::Ok().json(serde_json::json!({ "platforms": platforms }))
}

pub async fn publish_asset(
    body: web::Json<PublishBody>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let body = body.into_inner();
    let (Some(content_sn_id), Some(platform)) = (body.content_sn_id, body.platform) else {
        return Err(AdlensError::Validation(
            "Please select an asset and a platform to publish.".to_string(),
        )
        .into());
    };

    let platform = Platform::parse(&platform)
        .ok_or_else(|| AdlensError::Validation(format!("unknown platform '{}'", platform)))?;
    let asset = data
        .asset_store
        .find_by_content_sn_id(&content_sn_id)
        .ok_or(AdlensError::AssetNotFound(content_sn_id))?;

    let receipt = data.publisher.publish(&asset, platform).await?;
    Ok(HttpResponse::Ok().json(&receipt))
}

/// Runs the analyzer against the configured test asset on disk.
pub async fn test_analysis(data: web::Data<AppState>) -> HttpResponse {
    match run_test_analysis(&data).await {
        Ok(result) => HttpResponse::Ok().json(&result),
        Err(e) => {
            log::error!("Error during test analysis: {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to run test analysis.",
                "details": e.to_string()
            }))
        }
    }
}

async fn run_test_analysis(data: &AppState) -> Result<AnalysisResult, AdlensError> {
    let path = &data.config.test_asset_path;
    let bytes = tokio::fs::read(path).await?;
    let media = DataUri::encode(mime_for_path(path), &bytes);

    log::info!("Running analysis on test asset {}", path.display());
    let request = AnalysisRequest {
        media: media.to_string(),
        manual_data: ManualData {
            campaign_name: Some("Test Campaign".to_string()),
            ..ManualData::default()
        },
        quantitative_data: QuantitativeData::default(),
    };

    data.analysis_service.analyze(&request, None).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::services::analyzer::tests::StubProvider;
    use crate::services::analyzer::{AnalysisService, NO_CONTEXT};
    use crate::services::AssetStore;
    use crate::configure_routes;
    use actix_web::http::{StatusCode, header};
    use actix_web::{App, test};
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    const BOUNDARY: &str = "adlens-test-boundary";

    fn test_config() -> Config {
        Config {
            bind_addr: "127.0.0.1:0".to_string(),
            google_api_key: None,
            openai_api_key: None,
            default_provider: "googleai".to_string(),
            gemini_model: "stub".to_string(),
            openai_model: "stub".to_string(),
            model_timeout: Duration::from_secs(5),
            max_image_edge: 2048,
            max_upload_bytes: 1024 * 1024,
            publish_delay: Duration::from_millis(10),
            test_asset_path: PathBuf::from("does/not/exist.png"),
        }
    }

    fn state_with(stub: Arc<StubProvider>) -> AppState {
        let service = AnalysisService::new("googleai").with_provider(stub);
        AppState::new(
            test_config(),
            AssetStore::seeded().unwrap(),
            service,
        )
    }

    fn multipart_body(parts: &[(&str, Option<(&str, &str)>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, file, content) in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match file {
                Some((filename, mime)) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name, filename, mime
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                ),
            }
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn upload_request(body: Vec<u8>) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/v1/assets/upload")
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            ))
            .set_payload(body)
    }

    #[actix_web::test]
    async fn image_upload_adds_new_branded_asset_at_head() {
        let stub = Arc::new(StubProvider::image_answer());
        let state = state_with(stub.clone());
        let before = state.asset_store.len();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(configure_routes),
        )
        .await;

        let body = multipart_body(&[("file", Some(("banner.png", "image/png")), b"not-really-a-png".as_slice())]);
        let resp = test::call_service(&app, upload_request(body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let asset: Asset = test::read_body_json(resp).await;

        assert_eq!(asset.status, AssetStatus::New);
        assert_eq!(asset.content_type, AssetContentType::Branded);
        assert_eq!(asset.format, MediaFormat::Image);
        assert_eq!(asset.name, "banner.png");

        let calls = stub.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].media,
            DataUri::encode("image/png", b"not-really-a-png")
        );
        assert_eq!(calls[0].context, NO_CONTEXT);

        let library = state.asset_store.all();
        assert_eq!(library.len(), before + 1);
        assert_eq!(library[0].id, asset.id);
        assert!(!state.analysis_busy.is_busy());
    }

    #[actix_web::test]
    async fn upload_context_part_reaches_the_model() {
        let stub = Arc::new(StubProvider::image_answer());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state_with(stub.clone())))
                .configure(configure_routes),
        )
        .await;

        let context = br#"{"manualData":{"campaignName":"Holiday"},"quantitativeData":{"shotCount":3}}"#;
        let body = multipart_body(&[
            ("context", None, context.as_slice()),
            ("file", Some(("banner.png", "image/png")), b"img".as_slice()),
        ]);
        let resp = test::call_service(&app, upload_request(body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let calls = stub.calls.lock().unwrap();
        assert_eq!(calls[0].context, "Campaign Name: Holiday\nShot Count: 3");
    }

    #[actix_web::test]
    async fn failed_analysis_adds_nothing_and_releases_busy_flag() {
        let state = state_with(Arc::new(StubProvider::failing("quota exceeded")));
        let before = state.asset_store.len();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(configure_routes),
        )
        .await;

        let body = multipart_body(&[("file", Some(("spot.mp4", "video/mp4")), b"video".as_slice())]);
        let resp = test::call_service(&app, upload_request(body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let error: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(error["error"], "AI service error");

        assert_eq!(state.asset_store.len(), before);
        assert!(!state.analysis_busy.is_busy());
    }

    #[actix_web::test]
    async fn malformed_model_answer_is_a_bad_gateway_and_adds_nothing() {
        let state = state_with(Arc::new(StubProvider::answering("{\"brand\": 7}")));
        let before = state.asset_store.len();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(configure_routes),
        )
        .await;

        let body = multipart_body(&[("file", Some(("banner.png", "image/png")), b"img".as_slice())]);
        let resp = test::call_service(&app, upload_request(body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let error: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(error["error"], "AI output invalid");

        assert_eq!(state.asset_store.len(), before);
        assert!(!state.analysis_busy.is_busy());
    }

    #[actix_web::test]
    async fn upload_is_refused_while_another_analysis_runs() {
        let state = state_with(Arc::new(StubProvider::image_answer()));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(configure_routes),
        )
        .await;

        let _held = state.analysis_busy.try_acquire().unwrap();
        let body = multipart_body(&[("file", Some(("banner.png", "image/png")), b"img".as_slice())]);
        let resp = test::call_service(&app, upload_request(body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn upload_without_file_is_rejected() {
        let stub = Arc::new(StubProvider::image_answer());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state_with(stub.clone())))
                .configure(configure_routes),
        )
        .await;

        let body = multipart_body(&[("context", None, b"{}".as_slice())]);
        let resp = test::call_service(&app, upload_request(body).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(stub.calls.lock().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn list_filters_and_reports_totals() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state_with(Arc::new(StubProvider::image_answer()))))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/assets").to_request();
        let all: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(all["count"], all["total"]);

        let req = test::TestRequest::get()
            .uri("/api/v1/assets?status=Approved,Ready%20for%20Publisher&contentType=Branded")
            .to_request();
        let filtered: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        let rows = filtered["assets"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r["contentType"] == "Branded"));
        assert_eq!(rows[0]["scoreBand"], "good");

        let req = test::TestRequest::get()
            .uri("/api/v1/assets?status=Archived")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn lookup_returns_asset_or_not_found() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state_with(Arc::new(StubProvider::image_answer()))))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/assets/asset-002").to_request();
        let asset: Asset = test::call_and_read_body_json(&app, req).await;
        assert_eq!(asset.brand.as_deref(), Some("Dove"));

        let req = test::TestRequest::get().uri("/api/v1/assets/asset-999").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Asset not found");
    }

    #[actix_web::test]
    async fn review_override_then_save_flow() {
        let state = state_with(Arc::new(StubProvider::image_answer()));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/assets/asset-002/review")
            .to_request();
        let view: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(view["isDirty"], false);

        let req = test::TestRequest::patch()
            .uri("/api/v1/assets/asset-002/review")
            .set_json(serde_json::json!({
                "determinations": { "emotionalImpact.primaryEmotion": "Nostalgia" }
            }))
            .to_request();
        let view: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(view["isDirty"], true);
        assert_eq!(view["asset"]["mlReadyFeatures"]["primaryEmotion"], 3);
        assert_eq!(view["modifiedFields"][0], "emotionalImpact.primaryEmotion");

        let req = test::TestRequest::post()
            .uri("/api/v1/assets/asset-002/review/save")
            .to_request();
        let view: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(view["isDirty"], false);
        assert_eq!(
            view["asset"]["analysis"]["emotionalImpact"]["primaryEmotion"]["determination"],
            "Nostalgia"
        );

        let stored = state.asset_store.get("asset-002").unwrap();
        assert_eq!(
            stored.ml_ready_features.map(|f| f.primary_emotion),
            Some(1)
        );

        let req = test::TestRequest::patch()
            .uri("/api/v1/assets/asset-002/review")
            .set_json(serde_json::json!({ "determinations": { "performance.brandFitScore": 0 } }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn publish_validates_input_and_confirms() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state_with(Arc::new(StubProvider::image_answer()))))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/publish")
            .set_json(serde_json::json!({ "contentSnId": "SN-VID-1001" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/api/v1/publish")
            .set_json(serde_json::json!({ "contentSnId": "SN-NOPE", "platform": "meta" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::post()
            .uri("/api/v1/publish")
            .set_json(serde_json::json!({ "contentSnId": "SN-VID-1001", "platform": "tiktok" }))
            .to_request();
        let receipt: PublishReceipt = test::call_and_read_body_json(&app, req).await;
        assert_eq!(receipt.platform, Platform::TikTok);
        assert_eq!(receipt.asset_name, "Summer Refresh 30s");
    }

    #[actix_web::test]
    async fn test_analysis_reports_missing_asset_file() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state_with(Arc::new(StubProvider::image_answer()))))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/v1/test-analysis")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Failed to run test analysis.");
    }
}
