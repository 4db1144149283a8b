//! Google REST 客户端
//!
//! 一个 `GoogleClient` 实现全部四个协作者 trait：
//! - `sheets`：Sheets v4 → [`Spreadsheet`](crate::infrastructure::Spreadsheet)
//! - `forms`：Forms v1 → [`FormService`](crate::infrastructure::FormService)
//! - `classroom`：Classroom v1 → [`Classroom`](crate::infrastructure::Classroom)
//! - `drive`：Drive v3 → [`FileStorage`](crate::infrastructure::FileStorage)
//!
//! 鉴权只用配置里的 bearer token，不负责刷新。

pub mod classroom;
pub mod drive;
pub mod forms;
pub mod sheets;

use reqwest::{Client, Method, StatusCode, Url};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::config::Config;
use crate::error::{AppError, AppResult, ServiceError};

/// Google API 客户端
#[derive(Clone)]
pub struct GoogleClient {
    http: Client,
    token: String,
    spreadsheet_id: String,
    watch_topic: String,
    sheets_base: String,
    forms_base: String,
    classroom_base: String,
    drive_base: String,
}

impl GoogleClient {
    pub fn new(config: &Config) -> AppResult<Self> {
        if config.google_access_token.trim().is_empty() {
            return Err(AppError::validation(
                "google_access_token is required to talk to Google APIs.",
            ));
        }
        Ok(Self {
            http: Client::new(),
            token: config.google_access_token.clone(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            watch_topic: config.watch_topic.clone(),
            sheets_base: config.sheets_api_base_url.trim_end_matches('/').to_string(),
            forms_base: config.forms_api_base_url.trim_end_matches('/').to_string(),
            classroom_base: config.classroom_api_base_url.trim_end_matches('/').to_string(),
            drive_base: config.drive_api_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// 拼接 URL，路径段会被转义
    fn url(&self, base: &str, segments: &[&str]) -> AppResult<Url> {
        let mut url = Url::parse(base)
            .map_err(|e| AppError::validation(format!("Invalid API base URL '{base}': {e}")))?;
        url.path_segments_mut()
            .map_err(|_| AppError::validation(format!("API base URL '{base}' cannot be a base")))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// 发送请求并解析 JSON 响应；空响应体返回 `Null`
    async fn send(
        &self,
        service: &'static str,
        method: Method,
        url: Url,
        body: Option<&JsonValue>,
    ) -> AppResult<JsonValue> {
        let endpoint = format!("{} {}", method, url.path());
        debug!("➡️ {} {}", service, endpoint);

        let mut request = self.http.request(method, url).bearer_auth(&self.token);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| AppError::request_failed(service, &endpoint, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::request_failed(service, &endpoint, e))?;
        if !status.is_success() {
            return Err(ServiceError::BadResponse {
                service,
                endpoint,
                status: status.as_u16(),
                message: error_message(&text),
            }
            .into());
        }
        if text.trim().is_empty() {
            return Ok(JsonValue::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// GET 请求，404 时返回 `None`
    async fn get_optional(&self, service: &'static str, url: Url) -> AppResult<Option<JsonValue>> {
        match self.send(service, Method::GET, url, None).await {
            Ok(value) => Ok(Some(value)),
            Err(AppError::Service(ServiceError::BadResponse { status, .. }))
                if status == StatusCode::NOT_FOUND.as_u16() =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// 按 `nextPageToken` 取完所有分页，返回 `items_key` 下的全部元素
    async fn get_paged(
        &self,
        service: &'static str,
        url: Url,
        items_key: &str,
    ) -> AppResult<Vec<JsonValue>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut page_url = url.clone();
            if let Some(token) = &page_token {
                page_url.query_pairs_mut().append_pair("pageToken", token);
            }
            let page = self.send(service, Method::GET, page_url, None).await?;
            if let Some(list) = page.get(items_key).and_then(JsonValue::as_array) {
                items.extend(list.iter().cloned());
            }
            match page.get("nextPageToken").and_then(JsonValue::as_str) {
                Some(token) if !token.is_empty() => page_token = Some(token.to_string()),
                _ => return Ok(items),
            }
        }
    }
}

/// 取出 Google 错误响应里的 `error.message`，取不到就用原文
fn error_message(body: &str) -> String {
    serde_json::from_str::<JsonValue>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(JsonValue::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// 取字符串字段，缺失时为空串
fn str_field(value: &JsonValue, pointer: &str) -> String {
    value
        .pointer(pointer)
        .and_then(JsonValue::as_str)
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GoogleClient {
        let config = Config {
            google_access_token: "token".into(),
            spreadsheet_id: "ss-1".into(),
            ..Default::default()
        };
        GoogleClient::new(&config).unwrap()
    }

    #[test]
    fn test_missing_token_is_rejected() {
        assert!(GoogleClient::new(&Config::default()).is_err());
    }

    #[test]
    fn test_url_segments_are_escaped() {
        let client = client();
        let url = client
            .url(&client.sheets_base, &["v4", "spreadsheets", "ss-1", "values", "'Peer Eval'!A2:A5"])
            .unwrap();
        assert!(url
            .as_str()
            .starts_with("https://sheets.googleapis.com/v4/spreadsheets/ss-1/values/"));
        assert!(url.as_str().contains("Peer%20Eval"));
    }

    #[test]
    fn test_error_message_prefers_google_error() {
        let body = r#"{"error":{"code":404,"message":"Requested entity was not found."}}"#;
        assert_eq!(error_message(body), "Requested entity was not found.");
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn test_str_field_defaults_to_empty() {
        let value = serde_json::json!({"profile": {"name": {"fullName": "Bob Lee"}}});
        assert_eq!(str_field(&value, "/profile/name/fullName"), "Bob Lee");
        assert_eq!(str_field(&value, "/profile/emailAddress"), "");
    }
}
