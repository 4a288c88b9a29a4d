#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use ingest_engine::{
    CombinedOutput, FailureKind, InputFile, QualityPreset, RunParams, RunToken, StageClient,
    StageError, StageKind,
};
use serde_json::{json, Value};
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Extract(String),
    Combined(String),
    Parse(String),
    Unload,
}

/// In-memory stage client with per-file scripted outcomes.
#[derive(Default)]
pub struct ScriptedClient {
    failures: HashMap<(StageKind, String), String>,
    malformed: HashSet<(StageKind, String)>,
    hang: Option<(StageKind, String)>,
    hold: Option<(StageKind, String)>,
    unload_fails: bool,
    calls: Mutex<Vec<Call>>,
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(mut self, stage: StageKind, filename: &str, message: &str) -> Self {
        self.failures
            .insert((stage, filename.to_string()), message.to_string());
        self
    }

    pub fn malformed(mut self, stage: StageKind, filename: &str) -> Self {
        self.malformed.insert((stage, filename.to_string()));
        self
    }

    /// The call blocks until the run token fires; `entered` is notified first.
    pub fn hang(mut self, stage: StageKind, filename: &str) -> Self {
        self.hang = Some((stage, filename.to_string()));
        self
    }

    /// Like `hang`, but every unload call blocks.
    pub fn hang_unload(mut self) -> Self {
        self.hang = Some((StageKind::Unload, String::new()));
        self
    }

    /// The call blocks until `release` is notified; `entered` is notified first.
    pub fn hold(mut self, stage: StageKind, filename: &str) -> Self {
        self.hold = Some((stage, filename.to_string()));
        self
    }

    pub fn unload_fails(mut self) -> Self {
        self.unload_fails = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn unload_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| **call == Call::Unload)
            .count()
    }

    async fn outcome<T>(
        &self,
        stage: StageKind,
        filename: &str,
        token: &RunToken,
        ok: T,
    ) -> Result<T, StageError>
    where
        T: Send,
    {
        let key = (stage, filename.to_string());
        if self.hang.as_ref() == Some(&key) {
            let entered = self.entered.clone();
            return token
                .guard(stage, async move {
                    entered.notify_one();
                    std::future::pending::<Result<T, StageError>>().await
                })
                .await;
        }
        if self.hold.as_ref() == Some(&key) {
            let entered = self.entered.clone();
            let release = self.release.clone();
            return token
                .guard(stage, async move {
                    entered.notify_one();
                    release.notified().await;
                    Ok(ok)
                })
                .await;
        }
        let failure = self.failures.get(&key).cloned();
        let malformed = self.malformed.contains(&key);
        token
            .guard(stage, async move {
                tokio::task::yield_now().await;
                if let Some(message) = failure {
                    return Err(StageError::new(stage, FailureKind::HttpStatus(500), message));
                }
                if malformed {
                    return Err(StageError::new(
                        stage,
                        FailureKind::MalformedResponse,
                        format!("{}: response missing field", stage.fallback_message()),
                    ));
                }
                Ok(ok)
            })
            .await
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

pub fn markdown_for(filename: &str) -> String {
    format!("# {filename}")
}

pub fn data_for(filename: &str) -> Value {
    json!({ "source": filename })
}

#[async_trait::async_trait]
impl StageClient for ScriptedClient {
    async fn extract(
        &self,
        file: &InputFile,
        _quality: QualityPreset,
        token: &RunToken,
    ) -> Result<String, StageError> {
        self.record(Call::Extract(file.filename.clone()));
        self.outcome(
            StageKind::Extract,
            &file.filename,
            token,
            markdown_for(&file.filename),
        )
        .await
    }

    async fn combined_process(
        &self,
        file: &InputFile,
        _params: &RunParams,
        token: &RunToken,
    ) -> Result<CombinedOutput, StageError> {
        self.record(Call::Combined(file.filename.clone()));
        let output = CombinedOutput {
            markdown: markdown_for(&file.filename),
            structured_data: data_for(&file.filename),
        };
        self.outcome(StageKind::Combined, &file.filename, token, output)
            .await
    }

    async fn parse(
        &self,
        markdown: &str,
        filename: &str,
        _params: &RunParams,
        token: &RunToken,
    ) -> Result<Value, StageError> {
        assert_eq!(markdown, markdown_for(filename));
        self.record(Call::Parse(filename.to_string()));
        self.outcome(StageKind::Parse, filename, token, data_for(filename))
            .await
    }

    async fn unload(&self, token: &RunToken) -> Result<(), StageError> {
        self.record(Call::Unload);
        if self.unload_fails {
            return Err(StageError::new(
                StageKind::Unload,
                FailureKind::Network,
                "Unload failed: connection refused",
            ));
        }
        self.outcome(StageKind::Unload, "", token, ()).await
    }
}

pub fn files(names: &[&str]) -> Vec<InputFile> {
    names
        .iter()
        .map(|name| InputFile::new(*name, format!("bytes of {name}").into_bytes()))
        .collect()
}
