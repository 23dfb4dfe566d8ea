//! Validator plugins and the validator chain.
//!
//! Validators run after post-processing, in registration order, over a read-only JSON map of
//! the result. All of them must pass: the first failure stops the chain and fails the
//! extraction with a `Validation` error carrying the structured [`ValidationError`].

use crate::Result;
use crate::core::config::ExtractionConfig;
use crate::plugins::Plugin;
use crate::plugins::registry::{Registry, ScopedRegistration, validate_plugin_name};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// What kind of rule a field broke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    Required,
    InvalidValue,
    TooShort,
    TooLong,
    #[serde(untagged)]
    Other(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ValidationErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<Value>,
    /// Name of the validator that produced the failure. Filled in by the chain when the
    /// validator leaves it empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// A validator's rejection of an extraction result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default)]
    pub details: ValidationDetails,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            details: ValidationDetails::default(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Replace the details. A validator name already set is kept unless `details` names one.
    pub fn with_details(mut self, details: ValidationDetails) -> Self {
        let validator = details.validator.clone().or(self.details.validator.take());
        self.details = ValidationDetails { validator, ..details };
        self
    }

    pub fn with_validator(mut self, validator: impl Into<String>) -> Self {
        self.details.validator = Some(validator.into());
        self
    }

    /// Missing-field failure for `field`.
    pub fn required(field: impl Into<String>) -> Self {
        let field = field.into();
        Self::new(format!("Missing required field: {}", field))
            .with_code("required")
            .with_details(ValidationDetails {
                field: Some(field),
                error: Some(ValidationErrorKind::Required),
                ..Default::default()
            })
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)?;
        if let Some(field) = &self.details.field {
            write!(f, " (field '{}')", field)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = std::result::Result<(), ValidationError>;

/// Checks an extraction result, rendered as a JSON map.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use docweave::plugins::{Plugin, ValidationError, ValidationResult, Validator};
/// use docweave::ExtractionConfig;
/// use serde_json::{Map, Value};
///
/// struct MinLength(usize);
///
/// impl Plugin for MinLength {
///     fn name(&self) -> &str { "min-length" }
///     fn version(&self) -> String { "1.0.0".to_string() }
/// }
///
/// #[async_trait]
/// impl Validator for MinLength {
///     async fn validate(&self, result: &Map<String, Value>, _config: &ExtractionConfig) -> ValidationResult {
///         let len = result.get("content").and_then(Value::as_str).map_or(0, str::len);
///         if len < self.0 {
///             return Err(ValidationError::new(format!("content shorter than {} bytes", self.0)));
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Validator: Plugin {
    async fn validate(&self, result: &Map<String, Value>, config: &ExtractionConfig) -> ValidationResult;

    fn should_validate(&self, _result: &Map<String, Value>, _config: &ExtractionConfig) -> bool {
        true
    }
}

type CheckFn = dyn Fn(&Map<String, Value>) -> ValidationResult + Send + Sync;

/// Adapter registering a closure as a validator.
pub struct FnValidator {
    name: String,
    f: Box<CheckFn>,
}

impl FnValidator {
    /// A validator whose closure returns a structured failure.
    pub fn checked<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> ValidationResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            f: Box::new(f),
        }
    }

    /// A validator whose closure only says pass or fail.
    pub fn predicate<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> bool + Send + Sync + 'static,
    {
        let name = name.into();
        let message = format!("Validation failed in '{}'", name);
        Self::checked(name, move |map| {
            if f(map) {
                Ok(())
            } else {
                Err(ValidationError::new(message.clone()))
            }
        })
    }
}

impl Plugin for FnValidator {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> String {
        "0.0.0".to_string()
    }
}

#[async_trait]
impl Validator for FnValidator {
    async fn validate(&self, result: &Map<String, Value>, _config: &ExtractionConfig) -> ValidationResult {
        (self.f)(result)
    }
}

pub struct ValidatorRegistry {
    inner: Registry<dyn Validator>,
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self {
            inner: Registry::new("validator", validate_plugin_name),
        }
    }
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: &str, validator: Arc<dyn Validator>) -> Result<()> {
        self.inner.add(name, validator)?;
        tracing::info!(validator = name, "registered validator");
        Ok(())
    }

    /// Register a pass/fail closure. `false` fails with a generic error and no details.
    pub fn register_fn<F>(&self, name: &str, f: F) -> Result<()>
    where
        F: Fn(&Map<String, Value>) -> bool + Send + Sync + 'static,
    {
        self.register(name, Arc::new(FnValidator::predicate(name, f)))
    }

    pub fn register_checked<F>(&self, name: &str, f: F) -> Result<()>
    where
        F: Fn(&Map<String, Value>) -> ValidationResult + Send + Sync + 'static,
    {
        self.register(name, Arc::new(FnValidator::checked(name, f)))
    }

    pub fn register_many<I>(&self, validators: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, Arc<dyn Validator>)>,
    {
        self.inner.add_many(validators.into_iter().collect())
    }

    pub fn unregister(&self, name: &str) -> Result<()> {
        self.inner.remove(name)
    }

    pub fn unregister_many<I, S>(&self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            self.inner.remove(name.as_ref())?;
        }
        Ok(())
    }

    pub fn has(&self, name: &str) -> bool {
        self.inner.contains(name)
    }

    pub fn list(&self) -> Vec<String> {
        self.inner.keys()
    }

    pub fn clear(&self) -> Result<()> {
        self.inner.clear()
    }

    pub fn scoped(&self, validators: Vec<(String, Arc<dyn Validator>)>) -> Result<ScopedRegistration<'_, dyn Validator>> {
        ScopedRegistration::new(&self.inner, validators)
    }

    /// Run `work` with `validators` temporarily appended to the chain.
    pub async fn with_validators<F, Fut, R>(&self, validators: Vec<(String, Arc<dyn Validator>)>, work: F) -> Result<R>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        let guard = self.scoped(validators)?;
        let output = work().await;
        drop(guard);
        Ok(output)
    }

    pub(crate) fn snapshot(&self) -> Vec<(String, Arc<dyn Validator>)> {
        self.inner.snapshot()
    }
}

pub fn register_validator(name: &str, validator: Arc<dyn Validator>) -> Result<()> {
    crate::PipelineContext::global().validators().register(name, validator)
}

pub fn unregister_validator(name: &str) -> Result<()> {
    crate::PipelineContext::global().validators().unregister(name)
}

pub fn list_validators() -> Vec<String> {
    crate::PipelineContext::global().validators().list()
}

pub fn clear_validators() -> Result<()> {
    crate::PipelineContext::global().validators().clear()
}
