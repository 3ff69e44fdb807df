//! Drive a [`ProviderService`] the way the IaC host does, without gRPC.
//!
//! [`ProviderTester`] sequences validate, plan, apply and refresh so
//! acceptance tests read as configuration changes:
//!
//! ```ignore
//! let tester = ProviderTester::new(DevlakeProvider::new("test"));
//! tester.configure(json!({"host": server.uri(), "token": "t"})).await?;
//!
//! let state = tester.apply("devlake_apikey", json!({"name": "ci", ...})).await?;
//! let state = tester.apply_update("devlake_apikey", state, json!({...})).await?;
//! tester.destroy("devlake_apikey", state).await?;
//! ```

use serde_json::Value;
use thiserror::Error;

use crate::error::ProviderError;
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::server::ProviderService;
use crate::types::PlanResult;

/// Test harness around a [`ProviderService`].
///
/// Each method makes the same calls, in the same order, that the host makes
/// for the matching user action. Error diagnostics become [`TestError`], so
/// a test can `?` or `unwrap` its way through a lifecycle.
///
/// ```ignore
/// use devlake_provider::testing::{assert_plan_replaces, ProviderTester};
///
/// let tester = ProviderTester::new(DevlakeProvider::new("test"));
/// tester.configure(json!({"host": server.uri(), "token": "Bearer admin-token"})).await?;
///
/// let state = tester.apply("devlake_apikey", config.clone()).await?;
/// let plan = tester.plan("devlake_apikey", Some(state), renamed).await?;
/// assert_plan_replaces(&plan);
/// ```
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Wrap `provider`. Nothing is called until the first operation.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The provider's schema, as `GetSchema` would report it.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Validate and apply the provider block.
    ///
    /// Returns [`TestError::Diagnostics`] when either step reports an error
    /// diagnostic. Warnings are ignored.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config.clone()).await?;
        check_diagnostics(diagnostics)?;
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider and return every diagnostic it reported,
    /// warnings included. Use this to assert on configuration problems.
    pub async fn configure_diagnostics(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        self.provider.configure(config).await
    }

    /// Validate a resource configuration against its schema.
    ///
    /// Returns [`TestError::Diagnostics`] with the error diagnostics, each
    /// carrying the attribute path it is about.
    pub async fn validate_resource_config(&self, resource_type: &str, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_resource_config(resource_type, config).await?;
        check_diagnostics(diagnostics)
    }

    /// Plan `config` against `prior`. The proposed state is the config itself.
    ///
    /// Pass `None` as `prior` to plan a create, or a `null` config to plan a
    /// destroy. No API call is made, so the provider need not be configured.
    pub async fn plan(
        &self,
        resource_type: &str,
        prior: Option<Value>,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider.plan(resource_type, prior, config.clone(), config).await
    }

    /// Validate, plan and create a resource, then refresh it.
    ///
    /// Returns the refreshed state, which is what the host stores after an
    /// apply. Fails if the object cannot be read back.
    pub async fn apply(&self, resource_type: &str, config: Value) -> Result<Value, TestError> {
        self.validate_resource_config(resource_type, config.clone()).await?;
        let plan = self.plan(resource_type, None, config).await?;
        let created = self.provider.create(resource_type, plan.planned_state).await?;
        self.refresh(resource_type, created).await
    }

    /// Apply a changed configuration to existing state.
    ///
    /// A plan without changes returns `prior` untouched. A plan that requires
    /// replacement destroys the old object before creating the new one.
    pub async fn apply_update(&self, resource_type: &str, prior: Value, config: Value) -> Result<Value, TestError> {
        self.validate_resource_config(resource_type, config.clone()).await?;
        let plan = self.plan(resource_type, Some(prior.clone()), config).await?;

        if !plan.has_changes() {
            return Ok(prior);
        }

        let state = if plan.requires_replace {
            self.provider.delete(resource_type, prior).await?;
            self.provider.create(resource_type, plan.planned_state).await?
        } else {
            self.provider.update(resource_type, prior, plan.planned_state).await?
        };
        self.refresh(resource_type, state).await
    }

    /// Refresh state. `None` means the remote object is gone.
    pub async fn read(&self, resource_type: &str, state: Value) -> Result<Option<Value>, ProviderError> {
        match self.provider.read(resource_type, state).await? {
            Value::Null => Ok(None),
            state => Ok(Some(state)),
        }
    }

    /// Delete the object recorded in `state`.
    pub async fn destroy(&self, resource_type: &str, state: Value) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, state).await
    }

    /// Import by identifier and return the single imported state.
    ///
    /// The identifier has the same format a user passes on the command line,
    /// e.g. `3,17` for a scope config of connection 3.
    pub async fn import(&self, resource_type: &str, id: &str) -> Result<Value, TestError> {
        let mut imported = self.provider.import_resource(resource_type, id).await?;
        match imported.len() {
            1 => Ok(imported.remove(0).state),
            n => Err(TestError::Unexpected(format!("expected one imported resource, got {}", n))),
        }
    }

    /// Validate a data source configuration and read it.
    pub async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value, TestError> {
        let diagnostics = self
            .provider
            .validate_data_source_config(data_source_type, config.clone())
            .await?;
        check_diagnostics(diagnostics)?;
        Ok(self.provider.read_data_source(data_source_type, config).await?)
    }

    async fn refresh(&self, resource_type: &str, state: Value) -> Result<Value, TestError> {
        self.read(resource_type, state).await?.ok_or_else(|| {
            TestError::Unexpected(format!("{} disappeared right after being written", resource_type))
        })
    }
}

/// Why a [`ProviderTester`] operation failed.
#[derive(Debug, Error)]
pub enum TestError {
    /// The provider reported error diagnostics. Only errors are kept.
    #[error("{}", describe(.0))]
    Diagnostics(Vec<Diagnostic>),

    /// The provider returned an error.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The provider answered, but not the way the host expects, e.g. an
    /// object that cannot be read back right after it was created.
    #[error("{0}")]
    Unexpected(String),
}

impl TestError {
    /// Error diagnostics, or the provider error rendered as one.
    pub fn summaries(&self) -> Vec<String> {
        match self {
            TestError::Diagnostics(diags) => diags.iter().map(|d| d.summary.clone()).collect(),
            other => vec![other.to_string()],
        }
    }
}

fn describe(diagnostics: &[Diagnostic]) -> String {
    let lines: Vec<String> = diagnostics
        .iter()
        .map(|d| {
            let mut line = format!("[{:?}] {}", d.severity, d.summary);
            if let Some(detail) = &d.detail {
                line.push_str(&format!(": {}", detail));
            }
            if let Some(attr) = &d.attribute {
                line.push_str(&format!(" (at {})", attr));
            }
            line
        })
        .collect();
    format!("{} diagnostic(s): {}", diagnostics.len(), lines.join("; "))
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics
        .into_iter()
        .filter(|d| matches!(d.severity, DiagnosticSeverity::Error))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

/// Assert that applying the plan would do nothing.
///
/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        !plan.has_changes(),
        "Expected no changes, but got {} change(s): {:?}",
        plan.changes.len(),
        plan.changed_paths()
    );
}

/// Assert that the plan destroys and recreates the object.
///
/// # Panics
///
/// Panics if the plan does not require replacement.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(plan.requires_replace, "Expected plan to require replacement, but it does not");
}

/// Assert that the plan keeps the object and updates it.
///
/// # Panics
///
/// Panics if the plan requires replacement.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(
        !plan.requires_replace,
        "Expected plan to update in place, but it requires replacement"
    );
}

/// Assert that the plan changes the attribute at `path`.
///
/// # Panics
///
/// Panics if the plan does not have a change for the given path.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changed_paths().contains(&path),
        "Expected plan to change attribute '{}'. Changed attributes: {:?}",
        path,
        plan.changed_paths()
    );
}

/// Assert that some error diagnostic mentions `substring` in its summary.
///
/// # Panics
///
/// Panics if no error diagnostic summary contains `substring`.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| matches!(d.severity, DiagnosticSeverity::Error))
        .map(|d| &d.summary)
        .collect();

    assert!(
        errors.iter().any(|s| s.contains(substring)),
        "Expected an error containing '{}'. Errors: {:?}",
        substring,
        errors
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DevlakeProvider;
    use serde_json::json;

    #[tokio::test]
    async fn test_configure_surfaces_diagnostics() {
        let tester = ProviderTester::new(DevlakeProvider::new("test"));
        let err = tester
            .configure(json!({"host": "http://devlake:8080", "token": ""}))
            .await
            .unwrap_err();

        assert!(matches!(err, TestError::Diagnostics(_)));
        assert_eq!(err.summaries(), vec!["Missing devlake api token".to_string()]);
    }

    #[tokio::test]
    async fn test_plan_without_configure() {
        let tester = ProviderTester::new(DevlakeProvider::new("test"));
        let plan = tester
            .plan("devlake_apikey", None, json!({"name": "ci", "allowed_path": ".*", "expired_at": "2030-01-01T00:00:00Z"}))
            .await
            .unwrap();
        assert_plan_changes_attribute(&plan, "name");
        assert_plan_updates_in_place(&plan);
    }

    #[test]
    fn test_error_display() {
        let err = TestError::Diagnostics(vec![
            Diagnostic::error("Missing devlake api host").with_attribute("host"),
            Diagnostic::error("Missing devlake api token").with_detail("set DEVLAKE_TOKEN"),
        ]);

        let display = err.to_string();
        assert!(display.starts_with("2 diagnostic(s)"));
        assert!(display.contains("(at host)"));
        assert!(display.contains("set DEVLAKE_TOKEN"));
    }

    #[test]
    #[should_panic(expected = "Expected an error containing")]
    fn test_assert_error_contains_fails() {
        assert_error_contains(&[Diagnostic::warning("Missing devlake api token")], "token");
    }
}
