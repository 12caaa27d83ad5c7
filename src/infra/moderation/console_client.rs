use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::core::moderation::{
    CatalogError, CodeBasedExtension, ModelProvider, ModerationCatalogSource,
};

/// Minimal client for the application console API. It only exposes the two
/// lookups the moderation editor needs.
pub struct ConsoleApiClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ExtensionListResponse {
    #[serde(default)]
    data: Vec<CodeBasedExtension>,
}

#[derive(Debug, Deserialize)]
struct ModelProviderListResponse {
    #[serde(default)]
    data: Vec<ModelProvider>,
}

impl ConsoleApiClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, CatalogError> {
        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        headers.insert(
            "User-Agent",
            HeaderValue::from_static("ModerationSettingsBot/0.1"),
        );
        if let Some(token) = token {
            headers.insert(
                "Authorization",
                HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| CatalogError::Api(e.to_string()))?,
            );
        }

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| CatalogError::Api(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, CatalogError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| CatalogError::Api(e.to_string()))?;

        match resp.status() {
            status if status.is_success() => resp
                .json()
                .await
                .map_err(|e| CatalogError::Api(e.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(CatalogError::Api(format!(
                "Console rejected the API token for {}",
                path
            ))),
            status => Err(CatalogError::Api(format!(
                "Console returned {} for {}",
                status, path
            ))),
        }
    }
}

#[async_trait]
impl ModerationCatalogSource for ConsoleApiClient {
    async fn fetch_extensions(&self) -> Result<Vec<CodeBasedExtension>, CatalogError> {
        let resp: ExtensionListResponse = self
            .get_json("/code-based-extension", &[("module", "moderation")])
            .await?;
        tracing::debug!(count = resp.data.len(), "Fetched moderation extensions");
        Ok(resp.data)
    }

    async fn fetch_model_providers(&self) -> Result<Vec<ModelProvider>, CatalogError> {
        let resp: ModelProviderListResponse = self
            .get_json("/workspaces/current/model-providers", &[])
            .await?;
        Ok(resp.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::moderation::{openai_usable, FieldKind};
    use serde_json::json;

    #[test]
    fn test_parse_extension_list() {
        let body = json!({
            "module": "moderation",
            "data": [
                {
                    "name": "cloud_guard",
                    "label": { "en-US": "Cloud Guard", "zh-Hans": "云卫士" },
                    "form_schema": [
                        {
                            "type": "select",
                            "label": { "en-US": "Mode", "zh-Hans": "模式" },
                            "variable": "mode",
                            "required": true,
                            "default": "strict",
                            "placeholder": "",
                            "options": [
                                { "label": { "en-US": "Strict", "zh-Hans": "严格" }, "value": "strict" }
                            ]
                        }
                    ]
                },
                {
                    "name": "bare",
                    "label": { "en-US": "Bare", "zh-Hans": "空" }
                }
            ]
        });

        let resp: ExtensionListResponse = serde_json::from_value(body).unwrap();
        assert_eq!(resp.data.len(), 2);

        let schema = resp.data[0].form_schema.as_ref().unwrap();
        let mode = schema.field("mode").unwrap();
        assert_eq!(mode.kind, FieldKind::Select);
        assert_eq!(mode.options.len(), 1);
        assert!(resp.data[1].form_schema.is_none());
    }

    #[test]
    fn test_parse_model_providers() {
        let body = json!({
            "data": [
                {
                    "provider": "anthropic",
                    "custom_configuration": { "status": "active" }
                },
                {
                    "provider": "openai",
                    "label": { "en-US": "OpenAI" },
                    "system_configuration": {
                        "enabled": true,
                        "current_quota_type": "paid",
                        "quota_configurations": [
                            { "quota_type": "paid", "quota_unit": "credits", "is_valid": true }
                        ]
                    },
                    "custom_configuration": { "status": "no-configure" }
                }
            ]
        });

        let resp: ModelProviderListResponse = serde_json::from_value(body).unwrap();
        assert!(openai_usable(&resp.data));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = ConsoleApiClient::new("https://console.example.com/api/", None).unwrap();
        assert_eq!(client.base_url, "https://console.example.com/api");
    }
}
