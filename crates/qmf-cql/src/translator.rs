//! Optional remote ELM translator bridge (spec.md §4.3 "a remote mode posts
//! the CQL to a translator endpoint and merges its ELM annotations into the
//! result"). Trait-based so the default path needs no network access at
//! all; an HTTP-backed implementation is provided for `strict` runs that
//! want a real CQL-to-ELM service in the loop.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ElmAnnotations {
    pub elm_json: Option<serde_json::Value>,
    pub translator_errors: Vec<String>,
    pub translator_warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum TranslatorError {
    NetworkError(String),
    ServerError(String),
}

impl std::fmt::Display for TranslatorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranslatorError::NetworkError(msg) => write!(f, "network error: {msg}"),
            TranslatorError::ServerError(msg) => write!(f, "server error: {msg}"),
        }
    }
}

impl std::error::Error for TranslatorError {}

/// Bridges generated CQL to a remote CQL-to-ELM translator. Implementations
/// must be safe to share across a multi-threaded compile pipeline.
pub trait ElmTranslator: Send + Sync {
    /// Translates `cql` and returns whatever ELM annotations the service
    /// produced. When `strict` is false, implementations may choose to
    /// swallow network failures and return an empty result instead of
    /// propagating an error.
    fn translate(&self, cql: &str, strict: bool) -> Result<ElmAnnotations, TranslatorError>;
}

/// The default translator: never leaves the process, always returns an
/// empty annotation set. Used whenever no remote endpoint is configured.
#[derive(Debug, Clone, Default)]
pub struct NoopTranslator;

impl ElmTranslator for NoopTranslator {
    fn translate(&self, _cql: &str, _strict: bool) -> Result<ElmAnnotations, TranslatorError> {
        Ok(ElmAnnotations::default())
    }
}

/// Posts CQL to a real translator endpoint (e.g. a self-hosted
/// `cql-translation-service`) and parses its ELM response.
pub struct HttpElmTranslator {
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl HttpElmTranslator {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client: reqwest::blocking::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("failed to build HTTP client"),
        }
    }
}

impl ElmTranslator for HttpElmTranslator {
    fn translate(&self, cql: &str, strict: bool) -> Result<ElmAnnotations, TranslatorError> {
        let result = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/cql")
            .body(cql.to_string())
            .send();

        let response = match result {
            Ok(response) => response,
            Err(err) if strict => return Err(TranslatorError::NetworkError(err.to_string())),
            Err(err) => {
                return Ok(ElmAnnotations {
                    elm_json: None,
                    translator_errors: Vec::new(),
                    translator_warnings: vec![format!("translator unreachable, continuing without ELM: {err}")],
                });
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            if strict {
                return Err(TranslatorError::ServerError(format!("translator returned status {status}")));
            }
            return Ok(ElmAnnotations {
                elm_json: None,
                translator_errors: Vec::new(),
                translator_warnings: vec![format!("translator returned status {status}, continuing without ELM")],
            });
        }

        let elm_json: serde_json::Value = response
            .json()
            .map_err(|err| TranslatorError::ServerError(err.to_string()))?;

        let translator_errors = elm_json
            .get("errors")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        Ok(ElmAnnotations {
            elm_json: Some(elm_json),
            translator_errors,
            translator_warnings: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_translator_always_succeeds() {
        let result = NoopTranslator.translate("library Foo version '1.0.0'", true).unwrap();
        assert!(result.elm_json.is_none());
        assert!(result.translator_errors.is_empty());
    }
}
