use std::time::Duration;

use ingest_logging::ingest_debug;
use reqwest::multipart::{Form, Part};
use reqwest::Url;
use serde::Serialize;
use serde_json::Value;

use crate::{
    CombinedOutput, EngineError, FailureKind, HostStatus, InputFile, QualityPreset, RunParams,
    RunToken, StageError, StageKind,
};

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(600),
        }
    }
}

/// The remote stages. Every call races the run token and returns
/// `FailureKind::Cancelled` when the token wins.
#[async_trait::async_trait]
pub trait StageClient: Send + Sync {
    async fn extract(
        &self,
        file: &InputFile,
        quality: QualityPreset,
        token: &RunToken,
    ) -> Result<String, StageError>;

    async fn combined_process(
        &self,
        file: &InputFile,
        params: &RunParams,
        token: &RunToken,
    ) -> Result<CombinedOutput, StageError>;

    async fn parse(
        &self,
        markdown: &str,
        filename: &str,
        params: &RunParams,
        token: &RunToken,
    ) -> Result<Value, StageError>;

    async fn unload(&self, token: &RunToken) -> Result<(), StageError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestStageClient {
    base_url: Url,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct ParseRequest<'a> {
    markdown: &'a str,
    filename: &'a str,
    llm_model: &'a str,
    template: &'a str,
    context_window: u32,
}

impl ReqwestStageClient {
    pub fn new(settings: ClientSettings) -> Result<Self, EngineError> {
        let base_url =
            Url::parse(&settings.base_url).map_err(|err| EngineError::InvalidBaseUrl {
                url: settings.base_url.clone(),
                reason: err.to_string(),
            })?;
        if base_url.cannot_be_a_base() {
            return Err(EngineError::InvalidBaseUrl {
                url: settings.base_url,
                reason: "not a base url".to_string(),
            });
        }
        let http = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self { base_url, http })
    }

    /// Read-only host status query. Not used by the scheduling policies.
    pub async fn host_status(&self) -> Result<HostStatus, StageError> {
        let stage = StageKind::Status;
        let response = self
            .http
            .get(self.endpoint("api/health", &[]))
            .send()
            .await
            .map_err(|err| map_reqwest_error(stage, err))?;
        let body = read_json(stage, response).await?;
        serde_json::from_value(body).map_err(|err| {
            StageError::new(
                stage,
                FailureKind::MalformedResponse,
                format!("{}: {err}", stage.fallback_message()),
            )
        })
    }

    fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Url {
        let mut url = self.base_url.clone();
        let joined = format!("{}/{}", url.path().trim_end_matches('/'), path);
        url.set_path(&joined);
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(key, value)| (*key, value.as_str())));
        }
        url
    }

    async fn post_file(&self, stage: StageKind, url: Url, file: &InputFile) -> Result<Value, StageError> {
        ingest_debug!("{} request for {} ({} bytes)", stage, file.filename, file.size());
        let part = Part::bytes(file.bytes.to_vec()).file_name(file.filename.clone());
        let form = Form::new().part("file", part);
        let response = self
            .http
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|err| map_reqwest_error(stage, err))?;
        read_json(stage, response).await
    }
}

#[async_trait::async_trait]
impl StageClient for ReqwestStageClient {
    async fn extract(
        &self,
        file: &InputFile,
        quality: QualityPreset,
        token: &RunToken,
    ) -> Result<String, StageError> {
        let stage = StageKind::Extract;
        let url = self.endpoint("api/ocr/extract", &[("quality", quality.to_string())]);
        token
            .guard(stage, async {
                let mut body = self.post_file(stage, url, file).await?;
                take_string(stage, &mut body, "markdown")
            })
            .await
    }

    async fn combined_process(
        &self,
        file: &InputFile,
        params: &RunParams,
        token: &RunToken,
    ) -> Result<CombinedOutput, StageError> {
        let stage = StageKind::Combined;
        let url = self.endpoint(
            "api/ocr/process",
            &[
                ("llm_model", params.model.clone()),
                ("template", params.template.clone()),
                ("context_window", params.context_window.to_string()),
                ("quality", params.quality.to_string()),
            ],
        );
        token
            .guard(stage, async {
                let mut body = self.post_file(stage, url, file).await?;
                let markdown = take_string(stage, &mut body, "raw_output")?;
                let structured_data = take_value(stage, &mut body, "parsed_data")?;
                Ok(CombinedOutput {
                    markdown,
                    structured_data,
                })
            })
            .await
    }

    async fn parse(
        &self,
        markdown: &str,
        filename: &str,
        params: &RunParams,
        token: &RunToken,
    ) -> Result<Value, StageError> {
        let stage = StageKind::Parse;
        let request = ParseRequest {
            markdown,
            filename,
            llm_model: &params.model,
            template: &params.template,
            context_window: params.context_window,
        };
        let url = self.endpoint("api/llm/parse", &[]);
        token
            .guard(stage, async {
                ingest_debug!("parse request for {} ({} chars)", filename, markdown.len());
                let response = self
                    .http
                    .post(url)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|err| map_reqwest_error(stage, err))?;
                let mut body = read_json(stage, response).await?;
                take_value(stage, &mut body, "parsed_data")
            })
            .await
    }

    async fn unload(&self, token: &RunToken) -> Result<(), StageError> {
        let stage = StageKind::Unload;
        let url = self.endpoint("api/ocr/unload", &[]);
        token
            .guard(stage, async {
                let response = self
                    .http
                    .post(url)
                    .send()
                    .await
                    .map_err(|err| map_reqwest_error(stage, err))?;
                let status = response.status();
                if status.is_success() {
                    return Ok(());
                }
                let body = response.text().await.unwrap_or_default();
                Err(StageError::new(
                    stage,
                    FailureKind::HttpStatus(status.as_u16()),
                    failure_message(stage, &body),
                ))
            })
            .await
    }
}

async fn read_json(stage: StageKind, response: reqwest::Response) -> Result<Value, StageError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|err| map_reqwest_error(stage, err))?;
    if !status.is_success() {
        return Err(StageError::new(
            stage,
            FailureKind::HttpStatus(status.as_u16()),
            failure_message(stage, &body),
        ));
    }
    serde_json::from_str(&body).map_err(|err| {
        StageError::new(
            stage,
            FailureKind::MalformedResponse,
            format!("{}: invalid JSON response ({err})", stage.fallback_message()),
        )
    })
}

/// Prefers the host's `detail` field, then the raw body, then the stage fallback.
fn failure_message(stage: StageKind, body: &str) -> String {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value.get("detail").and_then(Value::as_str).map(str::to_owned))
        .filter(|detail| !detail.trim().is_empty());
    if let Some(detail) = detail {
        return detail;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        stage.fallback_message().to_string()
    } else {
        trimmed.to_string()
    }
}

fn take_value(stage: StageKind, body: &mut Value, field: &str) -> Result<Value, StageError> {
    match body.get_mut(field).map(Value::take) {
        Some(Value::Null) | None => Err(missing_field(stage, field)),
        Some(value) => Ok(value),
    }
}

fn take_string(stage: StageKind, body: &mut Value, field: &str) -> Result<String, StageError> {
    match take_value(stage, body, field)? {
        Value::String(text) => Ok(text),
        _ => Err(StageError::new(
            stage,
            FailureKind::MalformedResponse,
            format!("{}: field `{field}` is not a string", stage.fallback_message()),
        )),
    }
}

fn missing_field(stage: StageKind, field: &str) -> StageError {
    StageError::new(
        stage,
        FailureKind::MalformedResponse,
        format!("{}: response missing `{field}`", stage.fallback_message()),
    )
}

fn map_reqwest_error(stage: StageKind, err: reqwest::Error) -> StageError {
    let kind = if err.is_timeout() {
        FailureKind::Timeout
    } else {
        FailureKind::Network
    };
    StageError::new(stage, kind, format!("{}: {err}", stage.fallback_message()))
}
