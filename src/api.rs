//! Framework-agnostic controller adapter.
//!
//! [`ApiController`] sits between a host's HTTP layer and the
//! [`EntityConfigurator`]: it decodes request bodies, drives create/save,
//! renders entities through the [`Serializer`] and turns errors into JSON
//! responses. Routing and the HTTP server itself belong to the host; the
//! adapter only produces [`ApiResponse`] values.
//!
//! Error responses share one body shape:
//!
//! ```json
//! {"error": "VALIDATION_ERROR", "message": "...", "errors": {"email": "must not be blank"}}
//! ```

use crate::configurator::EntityConfigurator;
use crate::error::{ConfiguratorError, ConfiguratorResult};
use crate::error_tree::ErrorTree;
use crate::serializer::{Serializer, Subject};
use crate::storage::{EntityStore, StorageError};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// Request body as received: raw bytes or an already decoded value.
#[derive(Debug, Clone)]
pub enum RequestBody<'a> {
    Raw(&'a [u8]),
    Parsed(Value),
}

impl<'a> From<&'a [u8]> for RequestBody<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Self::Raw(bytes)
    }
}

impl<'a> From<&'a str> for RequestBody<'a> {
    fn from(text: &'a str) -> Self {
        Self::Raw(text.as_bytes())
    }
}

impl From<Value> for RequestBody<'_> {
    fn from(value: Value) -> Self {
        Self::Parsed(value)
    }
}

/// Status, headers and JSON body of a response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Value,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// CORS headers attached to every response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorsConfig {
    #[serde(default = "default_allow_origin")]
    pub allow_origin: String,
    #[serde(default = "default_allow_methods")]
    pub allow_methods: Vec<String>,
    #[serde(default = "default_allow_headers")]
    pub allow_headers: Vec<String>,
    /// Preflight cache lifetime in seconds
    #[serde(default = "default_max_age")]
    pub max_age: u64,
}

fn default_allow_origin() -> String {
    "*".to_string()
}

fn default_allow_methods() -> Vec<String> {
    vec!["POST".to_string(), "GET".to_string(), "OPTIONS".to_string()]
}

fn default_allow_headers() -> Vec<String> {
    vec!["Content-Type".to_string()]
}

fn default_max_age() -> u64 {
    3600
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origin: default_allow_origin(),
            allow_methods: default_allow_methods(),
            allow_headers: default_allow_headers(),
            max_age: default_max_age(),
        }
    }
}

impl CorsConfig {
    pub fn headers(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (
                "Access-Control-Allow-Origin".to_string(),
                self.allow_origin.clone(),
            ),
            (
                "Access-Control-Allow-Methods".to_string(),
                self.allow_methods.join(", "),
            ),
            (
                "Access-Control-Allow-Headers".to_string(),
                self.allow_headers.join(", "),
            ),
            ("Access-Control-Max-Age".to_string(), self.max_age.to_string()),
        ])
    }
}

/// Controller adapter over one configurator.
pub struct ApiController<S: EntityStore> {
    configurator: EntityConfigurator<S>,
    serializer: Serializer,
    cors: CorsConfig,
}

impl<S: EntityStore> ApiController<S> {
    pub fn new(configurator: EntityConfigurator<S>) -> Self {
        let serializer = Serializer::new(configurator.registry().clone());
        Self {
            configurator,
            serializer,
            cors: CorsConfig::default(),
        }
    }

    pub fn with_cors(mut self, cors: CorsConfig) -> Self {
        self.cors = cors;
        self
    }

    pub fn configurator(&self) -> &EntityConfigurator<S> {
        &self.configurator
    }

    pub fn configurator_mut(&mut self) -> &mut EntityConfigurator<S> {
        &mut self.configurator
    }

    pub fn cors(&self) -> &CorsConfig {
        &self.cors
    }

    /// Decode a JSON request body; the top level must be an object.
    pub fn parse_body(body: &[u8]) -> ConfiguratorResult<Value> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| ConfiguratorError::invalid_payload(format!("malformed JSON body: {e}")))?;
        if !value.is_object() {
            return Err(ConfiguratorError::invalid_payload(
                "request body must be a JSON object",
            ));
        }
        Ok(value)
    }

    /// Create an entity from the body. Returns the fill errors.
    pub async fn create_entity<'a>(
        &mut self,
        body: impl Into<RequestBody<'a>>,
        entity_type: &str,
    ) -> ConfiguratorResult<ErrorTree> {
        let payload = Self::payload(body.into())?;
        self.configurator.create(&payload, entity_type).await
    }

    /// Save (update or create) an entity from the body. Returns the fill errors.
    pub async fn save_entity<'a>(
        &mut self,
        body: impl Into<RequestBody<'a>>,
        entity_type: &str,
    ) -> ConfiguratorResult<ErrorTree> {
        let payload = Self::payload(body.into())?;
        self.configurator.save(&payload, entity_type).await
    }

    /// `create_entity`, then either the created entity rendered with
    /// `groups` or an error response.
    pub async fn create_and_respond<'a>(
        &mut self,
        body: impl Into<RequestBody<'a>>,
        entity_type: &str,
        groups: &[&str],
    ) -> ApiResponse {
        let result = self.create_entity(body, entity_type).await;
        self.respond(result, groups)
    }

    /// `save_entity`, then either the saved entity rendered with `groups`
    /// or an error response.
    pub async fn save_and_respond<'a>(
        &mut self,
        body: impl Into<RequestBody<'a>>,
        entity_type: &str,
        groups: &[&str],
    ) -> ApiResponse {
        let result = self.save_entity(body, entity_type).await;
        self.respond(result, groups)
    }

    /// 200 with a JSON body.
    pub fn response(&self, body: Value) -> ApiResponse {
        self.build(200, body)
    }

    /// 200 with entities of the configurator's unit of work rendered for
    /// `groups`.
    pub fn response_entity<'a>(
        &self,
        subject: impl Into<Subject<'a>>,
        groups: &[&str],
    ) -> ConfiguratorResult<ApiResponse> {
        let body = self
            .serializer
            .to_array(self.configurator.unit_of_work(), subject, groups)?;
        Ok(self.response(body))
    }

    /// 204 answer to a CORS preflight request.
    pub fn preflight(&self) -> ApiResponse {
        self.build(204, Value::Null)
    }

    /// Map an error onto a status code and the error body.
    pub fn error_response(&self, error: &ConfiguratorError) -> ApiResponse {
        let (status, code) = match error {
            ConfiguratorError::ValidationFailed(_) => (400, "VALIDATION_ERROR"),
            ConfiguratorError::InvalidPayload { .. } => (400, "INVALID_PAYLOAD"),
            ConfiguratorError::Json(_) => (400, "INVALID_PAYLOAD"),
            ConfiguratorError::DepthLimitExceeded { .. } => (400, "INVALID_PAYLOAD"),
            ConfiguratorError::Setter { .. } => (400, "INVALID_VALUE"),
            ConfiguratorError::UnknownEntityType(_) => (400, "UNKNOWN_ENTITY_TYPE"),
            ConfiguratorError::EntityNotFound { .. } => (404, "ENTITY_NOT_FOUND"),
            ConfiguratorError::Storage(source) => match source.downcast_ref::<StorageError>() {
                Some(storage) if storage.is_conflict() => (409, "CONFLICT"),
                Some(storage) if storage.is_not_found() => (404, "ENTITY_NOT_FOUND"),
                _ => (500, "STORAGE_ERROR"),
            },
            _ => (500, "INTERNAL_ERROR"),
        };

        if status >= 500 {
            warn!("Request failed: {error}");
        } else {
            debug!("Request rejected with {status}: {error}");
        }

        let errors = error.error_tree().cloned().unwrap_or_default();
        self.build(
            status,
            json!({
                "error": code,
                "message": error.to_string(),
                "errors": errors,
            }),
        )
    }

    fn respond(&self, result: ConfiguratorResult<ErrorTree>, groups: &[&str]) -> ApiResponse {
        let errors = match result {
            Ok(errors) => errors,
            Err(error) => return self.error_response(&error),
        };
        if !errors.is_empty() {
            return self.error_response(&ConfiguratorError::ValidationFailed(errors));
        }

        let Some(root) = self.configurator.entity() else {
            return self.error_response(&ConfiguratorError::internal("no root entity after fill"));
        };
        self.response_entity(root, groups)
            .unwrap_or_else(|error| self.error_response(&error))
    }

    fn payload(body: RequestBody<'_>) -> ConfiguratorResult<Value> {
        match body {
            RequestBody::Raw(bytes) => Self::parse_body(bytes),
            RequestBody::Parsed(value) => Ok(value),
        }
    }

    fn build(&self, status: u16, body: Value) -> ApiResponse {
        let mut headers = self.cors.headers();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        ApiResponse {
            status,
            headers,
            body,
        }
    }
}
