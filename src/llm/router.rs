// Model router: picks the backend for a model id and forwards the request
//
// Dispatch order:
// 1. explicit per-model overrides registered with `route()`
// 2. the naming heuristic in BackendKind::classify
//
// Backends are injected (`with_backend`), built up front for every configured
// credential (`from_config`), or built on first use from BenchConfig. Either
// way one client per kind is cached for the router's lifetime.

use super::bedrock::BedrockClient;
use super::openrouter::OpenRouterClient;
use super::types::{InvocationRequest, InvocationResult};
use super::Backend;
use crate::config::BenchConfig;
use crate::error::Result;
use crate::tool_executor::ToolExecutor;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Model id prefixes used by Bedrock inference profiles and foundation models
pub const BEDROCK_PREFIXES: &[&str] = &[
    "us.",
    "global.",
    "anthropic.",
    "amazon.",
    "deepseek.",
    "meta.",
    "openai.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendKind {
    OpenRouter,
    Bedrock,
}

impl BackendKind {
    /// Classify a model id by its shape
    ///
    /// OpenRouter ids look like `provider/model` ("openai/gpt-4o"). Bedrock
    /// ids may also contain a slash (inference profile ARNs), so the Bedrock
    /// prefixes win over the slash.
    pub fn classify(model_id: &str) -> Self {
        let bedrock_prefixed = BEDROCK_PREFIXES.iter().any(|p| model_id.starts_with(p));
        if model_id.contains('/') && !bedrock_prefixed {
            Self::OpenRouter
        } else {
            Self::Bedrock
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenRouter => write!(f, "OpenRouter"),
            Self::Bedrock => write!(f, "Bedrock"),
        }
    }
}

pub struct ModelRouter {
    config: BenchConfig,
    overrides: HashMap<String, BackendKind>,
    openrouter: OnceCell<Arc<dyn Backend>>,
    bedrock: OnceCell<Arc<dyn Backend>>,
}

impl ModelRouter {
    pub fn new(config: BenchConfig) -> Self {
        Self {
            config,
            overrides: HashMap::new(),
            openrouter: OnceCell::new(),
            bedrock: OnceCell::new(),
        }
    }

    /// Router with every backend whose credential is configured built up front
    ///
    /// Backends without credentials are left unbuilt; invoking one of their
    /// models reports the missing credential as CONFIG_ERROR.
    pub fn from_config(config: BenchConfig) -> Self {
        let router = Self::new(config);
        for kind in [BackendKind::OpenRouter, BackendKind::Bedrock] {
            match router.build(kind) {
                Ok(backend) => {
                    let _ = router.slot(kind).set(backend);
                }
                Err(e) => tracing::debug!("{} backend not configured: {}", kind, e),
            }
        }
        router
    }

    /// Use this backend for every model of `kind` instead of building one
    pub fn with_backend(mut self, kind: BackendKind, backend: Arc<dyn Backend>) -> Self {
        *self.slot_mut(kind) = OnceCell::new_with(Some(backend));
        self
    }

    /// Pin a model id to a backend, bypassing the heuristic
    pub fn route(mut self, model_id: impl Into<String>, kind: BackendKind) -> Self {
        self.overrides.insert(model_id.into(), kind);
        self
    }

    pub fn resolve(&self, model_id: &str) -> BackendKind {
        self.overrides
            .get(model_id)
            .copied()
            .unwrap_or_else(|| BackendKind::classify(model_id))
    }

    /// Backend for `kind`, constructing it from config on first use
    ///
    /// # Errors
    /// - `BenchError::EnvError` if the backend's credential is not configured
    /// - `BenchError::ReqwestError` if the HTTP client cannot be built
    pub async fn backend(&self, kind: BackendKind) -> Result<Arc<dyn Backend>> {
        let backend = self
            .slot(kind)
            .get_or_try_init(|| async { self.build(kind) })
            .await?;
        Ok(Arc::clone(backend))
    }

    /// Route the request to its backend and run it
    ///
    /// Never fails: a backend that cannot be constructed yields a failed
    /// result with error code CONFIG_ERROR.
    pub async fn invoke(
        &self,
        request: &InvocationRequest,
        executor: Option<&mut ToolExecutor>,
    ) -> InvocationResult {
        let kind = self.resolve(&request.model_id);
        tracing::info!("Using {} API for model: {}", kind, request.model_id);

        match self.backend(kind).await {
            Ok(backend) => backend.invoke(request, executor).await,
            Err(e) => {
                tracing::error!("Cannot build {} backend: {}", kind, e);
                InvocationResult::failure(
                    &request.model_id,
                    e.to_string(),
                    Some("CONFIG_ERROR".to_string()),
                    1,
                )
            }
        }
    }

    fn build(&self, kind: BackendKind) -> Result<Arc<dyn Backend>> {
        let backend: Arc<dyn Backend> = match kind {
            BackendKind::OpenRouter => Arc::new(OpenRouterClient::from_config(&self.config)?),
            BackendKind::Bedrock => Arc::new(BedrockClient::from_config(&self.config)?),
        };
        tracing::debug!("Constructed {} backend", kind);
        Ok(backend)
    }

    fn slot(&self, kind: BackendKind) -> &OnceCell<Arc<dyn Backend>> {
        match kind {
            BackendKind::OpenRouter => &self.openrouter,
            BackendKind::Bedrock => &self.bedrock,
        }
    }

    fn slot_mut(&mut self, kind: BackendKind) -> &mut OnceCell<Arc<dyn Backend>> {
        match kind {
            BackendKind::OpenRouter => &mut self.openrouter,
            BackendKind::Bedrock => &mut self.bedrock,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::Usage;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers with its own name and records the model ids it saw
    struct StubBackend {
        label: &'static str,
        seen: Mutex<Vec<String>>,
    }

    impl StubBackend {
        fn new(label: &'static str) -> Arc<Self> {
            Arc::new(Self {
                label,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Backend for StubBackend {
        fn name(&self) -> &str {
            self.label
        }

        async fn invoke(
            &self,
            request: &InvocationRequest,
            _executor: Option<&mut ToolExecutor>,
        ) -> InvocationResult {
            self.seen.lock().unwrap().push(request.model_id.clone());
            InvocationResult::succeeded(&request.model_id, self.label.to_string(), Usage::default(), 1)
        }
    }

    #[test]
    fn test_classify_openrouter_ids() {
        for id in ["openai/gpt-4o", "anthropic/claude-3.5-sonnet", "meta-llama/llama-3.1-70b-instruct"] {
            assert_eq!(BackendKind::classify(id), BackendKind::OpenRouter, "{}", id);
        }
    }

    #[test]
    fn test_classify_bedrock_ids() {
        for id in [
            "us.anthropic.claude-3-5-sonnet-20241022-v2:0",
            "global.anthropic.claude-sonnet-4-20250514-v1:0",
            "anthropic.claude-3-haiku-20240307-v1:0",
            "amazon.nova-pro-v1:0",
            "meta.llama3-70b-instruct-v1:0",
            "deepseek.r1-v1:0",
            "openai.gpt-oss-120b-1:0",
            "us.meta.llama/with-slash",
            "plain-model-name",
        ] {
            assert_eq!(BackendKind::classify(id), BackendKind::Bedrock, "{}", id);
        }
    }

    #[test]
    fn test_override_beats_heuristic() {
        let router = ModelRouter::new(BenchConfig::default()).route("custom/model", BackendKind::Bedrock);

        assert_eq!(router.resolve("custom/model"), BackendKind::Bedrock);
        assert_eq!(router.resolve("other/model"), BackendKind::OpenRouter);
    }

    #[tokio::test]
    async fn test_dispatches_to_injected_backends() {
        let openrouter = StubBackend::new("openrouter");
        let bedrock = StubBackend::new("bedrock");
        let router = ModelRouter::new(BenchConfig::default())
            .with_backend(BackendKind::OpenRouter, openrouter.clone())
            .with_backend(BackendKind::Bedrock, bedrock.clone());

        let a = router.invoke(&InvocationRequest::new("openai/gpt-4o", "p"), None).await;
        let b = router
            .invoke(&InvocationRequest::new("anthropic.claude-3-haiku-20240307-v1:0", "p"), None)
            .await;

        assert_eq!(a.content, "openrouter");
        assert_eq!(b.content, "bedrock");
        assert_eq!(openrouter.seen(), vec!["openai/gpt-4o".to_string()]);
        assert_eq!(bedrock.seen().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_credential_is_config_error() {
        let router = ModelRouter::new(BenchConfig::default());

        let result = router.invoke(&InvocationRequest::new("openai/gpt-4o", "p"), None).await;

        assert!(!result.success);
        assert_eq!(result.error_code.as_deref(), Some("CONFIG_ERROR"));
        assert_eq!(result.attempt, 1);
        assert!(result.error.unwrap().contains("OPENROUTER_API_KEY"));
    }

    #[tokio::test]
    async fn test_from_config_builds_only_configured_backends() {
        let config = BenchConfig {
            openrouter_api_key: Some("sk-test".to_string()),
            ..BenchConfig::default()
        };
        let router = ModelRouter::from_config(config);

        assert!(router.openrouter.initialized());
        assert!(!router.bedrock.initialized());

        let result = router
            .invoke(&InvocationRequest::new("amazon.nova-pro-v1:0", "p"), None)
            .await;
        assert_eq!(result.error_code.as_deref(), Some("CONFIG_ERROR"));
        assert!(result.error.unwrap().contains("AWS_BEARER_TOKEN_BEDROCK"));
    }

    #[tokio::test]
    async fn test_constructed_backend_is_cached() {
        let config = BenchConfig {
            bedrock_bearer_token: Some("token".to_string()),
            ..BenchConfig::default()
        };
        let router = ModelRouter::new(config);

        let first = router.backend(BackendKind::Bedrock).await.unwrap();
        let second = router.backend(BackendKind::Bedrock).await.unwrap();

        assert_eq!(first.name(), "Bedrock");
        assert!(Arc::ptr_eq(&first, &second));
    }
}
