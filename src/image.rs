use crate::config::Config;
use crate::constants::ERR_IMAGE_NO_OUTPUT;
use crate::errors::{LuminaError, LuminaResult};
use crate::logging::log_api_call;
use crate::models::{ApiCallLog, AspectRatio};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Instant;

/// Client for the text-to-image endpoint. Providers answer either with a
/// JSON envelope carrying base64 bytes or with a raw image body; both are
/// normalized into a displayable `data:` URI.
#[derive(Clone, Debug)]
pub struct ImageClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl ImageClient {
    pub fn new(config: &Config) -> Self {
        ImageClient {
            client: Client::new(),
            api_key: config.image_api_key.clone(),
            base_url: config.image_api_url.trim_end_matches('/').to_string(),
            model: config.image_model.clone(),
        }
    }

    /// Generates one image for `prompt` in the requested shape.
    pub async fn generate(&self, prompt: &str, ratio: AspectRatio) -> LuminaResult<String> {
        let endpoint = format!("{}/{}:predict", self.base_url, self.model);

        let payload = json!({
            "instances": [{ "prompt": prompt }],
            "parameters": {
                "sampleCount": 1,
                "aspectRatio": ratio.as_str(),
            },
        });

        let started = Instant::now();
        let response = self
            .client
            .post(&endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        log_api_call(&ApiCallLog {
            timestamp: Utc::now(),
            endpoint,
            request_summary: format!("image {} {}", ratio.as_str(), prompt),
            response_status: status.as_u16(),
            response_time_ms: started.elapsed().as_millis(),
        });

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LuminaError::api_status_error(
                status.as_u16(),
                format!("Image API returned error: {}", error_text),
            ));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        // Some providers answer with the image bytes directly.
        if content_type.starts_with("image/") {
            let bytes = response.bytes().await?;
            if bytes.is_empty() {
                return Err(LuminaError::generation_error(ERR_IMAGE_NO_OUTPUT));
            }
            return Ok(format!("data:{};base64,{}", content_type, BASE64.encode(&bytes)));
        }

        // Otherwise expect a JSON envelope with base64 bytes inside.
        let body: Value = response
            .json()
            .await
            .map_err(|e| LuminaError::api_error(format!("Failed to parse image response: {}", e)))?;

        let prediction = body["predictions"]
            .as_array()
            .and_then(|p| p.first())
            .ok_or_else(|| LuminaError::generation_error(ERR_IMAGE_NO_OUTPUT))?;

        let data = prediction["bytesBase64Encoded"]
            .as_str()
            .ok_or_else(|| LuminaError::generation_error(ERR_IMAGE_NO_OUTPUT))?;
        let mime = prediction["mimeType"].as_str().unwrap_or("image/jpeg");

        Ok(format!("data:{};base64,{}", mime, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server_uri: &str) -> ImageClient {
        let config = Config {
            image_api_key: "test-image-key".to_string(),
            image_api_url: server_uri.to_string(),
            image_model: "test-imagen".to_string(),
            ..Config::default()
        };
        ImageClient::new(&config)
    }

    #[tokio::test]
    async fn test_generate_from_json_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/test-imagen:predict"))
            .and(body_partial_json(json!({
                "parameters": { "aspectRatio": "16:9" },
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "predictions": [{
                    "bytesBase64Encoded": "YWJj",
                    "mimeType": "image/png",
                }],
            })))
            .mount(&server)
            .await;

        let url = test_client(&server.uri())
            .generate("a red fox", AspectRatio::Widescreen)
            .await
            .unwrap();
        assert_eq!(url, "data:image/png;base64,YWJj");
    }

    #[tokio::test]
    async fn test_generate_from_raw_image_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(b"abc".to_vec(), "image/jpeg"))
            .mount(&server)
            .await;

        let url = test_client(&server.uri())
            .generate("a red fox", AspectRatio::Square)
            .await
            .unwrap();
        assert_eq!(url, "data:image/jpeg;base64,YWJj");
    }

    #[tokio::test]
    async fn test_generate_without_artifacts_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "predictions": [] })))
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .generate("a red fox", AspectRatio::Widescreen)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, LuminaError::Generation(_)));
    }

    #[tokio::test]
    async fn test_generate_surfaces_transport_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .generate("a red fox", AspectRatio::Square)
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            LuminaError::Api {
                status: Some(503),
                ..
            }
        ));
    }
}
