//! Create/read/update/delete/import of `wings_value` resources.
//!
//! [`ValueResource`] glues the mapper to a [`ValueStore`] and turns every
//! failure into [`Diagnostics`]. An operation that returns diagnostics
//! produces no state.

use async_trait::async_trait;
use tracing::{debug, info, warn};
use wings_api::{ApiError, RequestContext, WingsClient};
use wings_types::Value;

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::mapper::{MappingError, from_value, to_value};
use crate::resource::ValueResourceModel;

pub const CREATE_SUMMARY: &str = "Error creating value";
pub const READ_SUMMARY: &str = "Error reading value";
pub const UPDATE_SUMMARY: &str = "Error updating value";
pub const DELETE_SUMMARY: &str = "Error deleting value";
pub const IMPORT_SUMMARY: &str = "Error importing value";
pub const PLAN_SUMMARY: &str = "Error planning value";

/// Remote persistence used by the lifecycle controller.
#[async_trait]
pub trait ValueStore: Send + Sync {
    async fn get(&self, ctx: &RequestContext, id: &str) -> Result<Value, ApiError>;
    async fn create(&self, ctx: &RequestContext, value: &Value) -> Result<Value, ApiError>;
    async fn update(&self, ctx: &RequestContext, value: &Value) -> Result<Value, ApiError>;
    async fn delete(&self, ctx: &RequestContext, id: &str) -> Result<(), ApiError>;
}

#[async_trait]
impl ValueStore for WingsClient {
    async fn get(&self, ctx: &RequestContext, id: &str) -> Result<Value, ApiError> {
        self.get_value(ctx, id).await
    }

    async fn create(&self, ctx: &RequestContext, value: &Value) -> Result<Value, ApiError> {
        self.create_value(ctx, value).await
    }

    async fn update(&self, ctx: &RequestContext, value: &Value) -> Result<Value, ApiError> {
        self.update_value(ctx, value).await
    }

    async fn delete(&self, ctx: &RequestContext, id: &str) -> Result<(), ApiError> {
        self.delete_value(ctx, id).await
    }
}

/// The five hooks a host runtime invokes for a resource.
#[async_trait]
pub trait ResourceLifecycle: Send + Sync {
    async fn create(&self, ctx: &RequestContext, plan: &ValueResourceModel) -> Result<ValueResourceModel, Diagnostics>;

    /// Refresh state from the remote. `Ok(None)` means the value no longer exists.
    async fn read(
        &self,
        ctx: &RequestContext,
        state: &ValueResourceModel,
    ) -> Result<Option<ValueResourceModel>, Diagnostics>;

    async fn update(
        &self,
        ctx: &RequestContext,
        prior: &ValueResourceModel,
        plan: &ValueResourceModel,
    ) -> Result<ValueResourceModel, Diagnostics>;

    async fn delete(&self, ctx: &RequestContext, state: &ValueResourceModel) -> Result<(), Diagnostics>;

    async fn import(&self, ctx: &RequestContext, id: &str) -> Result<ValueResourceModel, Diagnostics>;
}

/// What applying a configuration requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanAction {
    Create,
    Update,
    /// `value_id` changed: delete the old value, then create the new one.
    Replace,
    NoOp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub action: PlanAction,
    /// Configuration with computed attributes carried over from prior state.
    pub planned: ValueResourceModel,
}

/// Lifecycle controller for `wings_value` resources.
#[derive(Debug, Clone)]
pub struct ValueResource<S = WingsClient> {
    store: S,
}

impl<S: ValueStore> ValueResource<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Plan against `prior` and carry the plan out, returning the new state.
    ///
    /// A replacement deletes the prior value before creating the new one and
    /// stops if the delete fails.
    pub async fn apply(
        &self,
        ctx: &RequestContext,
        prior: Option<&ValueResourceModel>,
        config: &ValueResourceModel,
    ) -> Result<ValueResourceModel, Diagnostics> {
        let plan = plan(prior, config)?;
        info!(value_id = %config.value_id, action = ?plan.action, "planned value");

        let Some(prior) = prior else {
            return self.create(ctx, &plan.planned).await;
        };
        match plan.action {
            PlanAction::Create => self.create(ctx, &plan.planned).await,
            PlanAction::Replace => {
                self.delete(ctx, prior).await?;
                self.create(ctx, &plan.planned).await
            }
            PlanAction::Update => self.update(ctx, prior, &plan.planned).await,
            PlanAction::NoOp => Ok(prior.clone()),
        }
    }
}

/// Decide how to move from `prior` state to `config`.
///
/// Equality is judged on the mapped domain values, so block ordering and
/// JSON formatting differences do not cause updates.
pub fn plan(prior: Option<&ValueResourceModel>, config: &ValueResourceModel) -> Result<Plan, Diagnostics> {
    let mut planned = config.clone();
    let Some(prior) = prior else {
        planned.id = None;
        return Ok(Plan {
            action: PlanAction::Create,
            planned,
        });
    };

    if prior.value_id != config.value_id {
        planned.id = None;
        return Ok(Plan {
            action: PlanAction::Replace,
            planned,
        });
    }

    planned.id = prior.id.clone();
    let desired = map_for(PLAN_SUMMARY, &planned)?;
    let current = map_for(PLAN_SUMMARY, prior)?;
    let action = if desired == current {
        PlanAction::NoOp
    } else {
        PlanAction::Update
    };
    Ok(Plan { action, planned })
}

#[async_trait]
impl<S: ValueStore> ResourceLifecycle for ValueResource<S> {
    async fn create(&self, ctx: &RequestContext, plan: &ValueResourceModel) -> Result<ValueResourceModel, Diagnostics> {
        let value = checked_value(CREATE_SUMMARY, plan)?;
        let created = self
            .store
            .create(ctx, &value)
            .await
            .map_err(|error| api_diagnostic(CREATE_SUMMARY, &error))?;

        info!(value_id = %plan.value_id, id = %created.id, "created value");
        Ok(state_for(&created, &plan.value_id))
    }

    async fn read(
        &self,
        ctx: &RequestContext,
        state: &ValueResourceModel,
    ) -> Result<Option<ValueResourceModel>, Diagnostics> {
        let id = state.remote_id();
        match self.store.get(ctx, id).await {
            Ok(value) => {
                debug!(value_id = %state.value_id, id, "refreshed value");
                Ok(Some(state_for(&value, &state.value_id)))
            }
            Err(error) if error.is_not_found() => {
                warn!(value_id = %state.value_id, id, "value no longer exists remotely");
                Ok(None)
            }
            Err(error) => Err(api_diagnostic(READ_SUMMARY, &error)),
        }
    }

    async fn update(
        &self,
        ctx: &RequestContext,
        prior: &ValueResourceModel,
        plan: &ValueResourceModel,
    ) -> Result<ValueResourceModel, Diagnostics> {
        if prior.value_id != plan.value_id {
            return Err(Diagnostic::error(
                UPDATE_SUMMARY,
                format!(
                    "value_id cannot change from '{}' to '{}'; the value must be replaced",
                    prior.value_id, plan.value_id
                ),
            )
            .with_attribute("value_id")
            .into());
        }

        let mut planned = plan.clone();
        if planned.id.as_deref().is_none_or(str::is_empty) {
            planned.id = prior.id.clone();
        }
        let value = checked_value(UPDATE_SUMMARY, &planned)?;
        let updated = self
            .store
            .update(ctx, &value)
            .await
            .map_err(|error| api_diagnostic(UPDATE_SUMMARY, &error))?;

        info!(value_id = %plan.value_id, id = %updated.id, "updated value");
        Ok(state_for(&updated, &plan.value_id))
    }

    async fn delete(&self, ctx: &RequestContext, state: &ValueResourceModel) -> Result<(), Diagnostics> {
        let id = state.remote_id();
        self.store
            .delete(ctx, id)
            .await
            .map_err(|error| api_diagnostic(DELETE_SUMMARY, &error))?;

        info!(value_id = %state.value_id, id, "deleted value");
        Ok(())
    }

    async fn import(&self, ctx: &RequestContext, id: &str) -> Result<ValueResourceModel, Diagnostics> {
        let value = self
            .store
            .get(ctx, id)
            .await
            .map_err(|error| api_diagnostic(IMPORT_SUMMARY, &error))?;

        info!(id, "imported value");
        Ok(from_value(&value))
    }
}

/// Validate, then map to the domain model.
fn checked_value(summary: &str, model: &ValueResourceModel) -> Result<Value, Diagnostics> {
    let validation = model.validate();
    for warning in validation.warnings() {
        warn!(value_id = %model.value_id, "{warning}");
    }
    if validation.has_error() {
        return Err(validation);
    }
    map_for(summary, model)
}

fn map_for(summary: &str, model: &ValueResourceModel) -> Result<Value, Diagnostics> {
    to_value(model).map_err(|error| mapping_diagnostic(summary, &error))
}

/// Read-path state, keeping the caller's `value_id` even if the server
/// assigned a different `id`.
fn state_for(value: &Value, value_id: &str) -> ValueResourceModel {
    let mut state = from_value(value);
    state.value_id = value_id.to_string();
    state
}

fn mapping_diagnostic(summary: &str, error: &MappingError) -> Diagnostics {
    Diagnostic::error(summary, format!("Invalid Attribute(s): {error}"))
        .with_attribute(error.field())
        .into()
}

fn api_diagnostic(summary: &str, error: &ApiError) -> Diagnostics {
    Diagnostic::error(summary, error.to_string()).into()
}
