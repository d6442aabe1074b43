use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{FormError, FormResult};
use crate::id::FieldId;
use crate::validation::{FieldValidation, Validator};

/// Current value of every mounted field, keyed by field id.
pub type FormValues = BTreeMap<FieldId, Value>;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ValidationTicket(pub u64);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SubmitState {
    Idle,
    Validating,
    Submitting,
    Succeeded,
    Failed,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationMode {
    OnSubmit,
    OnBlur,
    OnChange,
    /// Validates on first blur, then on every change.
    OnTouched,
    All,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RevalidateMode {
    OnChange,
    OnBlur,
    OnSubmit,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FormOptions {
    pub validate_mode: ValidationMode,
    pub revalidate_mode: RevalidateMode,
    pub validate_first_error_only: bool,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            validate_mode: ValidationMode::OnSubmit,
            revalidate_mode: RevalidateMode::OnChange,
            validate_first_error_only: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ValidationPhase {
    #[default]
    Pristine,
    Touched,
    Validated,
    Revalidated,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FieldMeta {
    pub dirty: bool,
    pub touched: bool,
    pub validating: bool,
    pub phase: ValidationPhase,
    pub errors: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct FormSnapshot {
    pub values: FormValues,
    pub submit_state: SubmitState,
    pub submit_count: u32,
    pub is_dirty: bool,
    pub is_valid: bool,
    pub field_meta: BTreeMap<FieldId, FieldMeta>,
    pub warnings: BTreeMap<FieldId, String>,
}

impl FormSnapshot {
    pub fn errors(&self) -> BTreeMap<FieldId, Vec<String>> {
        self.field_meta
            .iter()
            .filter(|(_, meta)| !meta.errors.is_empty())
            .map(|(id, meta)| (id.clone(), meta.errors.clone()))
            .collect()
    }
}

pub(super) type SyncFieldValidatorFn =
    Arc<dyn Fn(&FormValues, Option<&Value>) -> Result<(), String> + Send + Sync>;
pub type BoxedValidationFuture =
    Pin<Box<dyn Future<Output = Result<(), String>> + Send + 'static>>;

pub(super) type AsyncFieldValidatorFn =
    Arc<dyn Fn(FormValues) -> BoxedValidationFuture + Send + Sync>;

#[derive(Clone)]
pub(super) struct AsyncFieldValidatorEntry {
    pub(super) debounce: Duration,
    pub(super) validator: AsyncFieldValidatorFn,
}

pub(super) struct FormState {
    pub(super) defaults: FormValues,
    pub(super) values: FormValues,
    pub(super) registered: BTreeSet<FieldId>,
    pub(super) submit_state: SubmitState,
    pub(super) submit_count: u32,
    pub(super) dirty_fields: BTreeSet<FieldId>,
    pub(super) field_meta: BTreeMap<FieldId, FieldMeta>,
    pub(super) warnings: BTreeMap<FieldId, String>,
    pub(super) tickets: BTreeMap<FieldId, ValidationTicket>,
}

impl FormState {
    pub(super) fn ensure_meta(&mut self, id: &FieldId) -> &mut FieldMeta {
        self.field_meta.entry(id.clone()).or_default()
    }
}

/// Shared value store plus per-field validation lifecycle. Clones share state.
#[derive(Clone)]
pub struct FormController {
    pub(super) options: Arc<RwLock<FormOptions>>,
    pub(super) state: Arc<RwLock<FormState>>,
    pub(super) field_validations: Arc<RwLock<BTreeMap<FieldId, FieldValidation>>>,
    pub(super) sync_field_validators: Arc<RwLock<BTreeMap<FieldId, Vec<SyncFieldValidatorFn>>>>,
    pub(super) async_field_validators:
        Arc<RwLock<BTreeMap<FieldId, Vec<AsyncFieldValidatorEntry>>>>,
    pub(super) validator: Validator,
}

impl FormController {
    pub fn new(options: FormOptions, validator: Validator) -> Self {
        Self {
            options: Arc::new(RwLock::new(options)),
            state: Arc::new(RwLock::new(FormState {
                defaults: FormValues::new(),
                values: FormValues::new(),
                registered: BTreeSet::new(),
                submit_state: SubmitState::Idle,
                submit_count: 0,
                dirty_fields: BTreeSet::new(),
                field_meta: BTreeMap::new(),
                warnings: BTreeMap::new(),
                tickets: BTreeMap::new(),
            })),
            field_validations: Arc::new(RwLock::new(BTreeMap::new())),
            sync_field_validators: Arc::new(RwLock::new(BTreeMap::new())),
            async_field_validators: Arc::new(RwLock::new(BTreeMap::new())),
            validator,
        }
    }

    pub fn options(&self) -> FormResult<FormOptions> {
        Ok(*read_lock(&self.options, "reading form options")?)
    }

    pub fn set_options(&self, options: FormOptions) -> FormResult<()> {
        *write_lock(&self.options, "writing form options")? = options;
        Ok(())
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Mounts a field. The stored value is kept if one exists, otherwise it is
    /// seeded from `default`.
    pub fn register_field(
        &self,
        id: FieldId,
        validation: FieldValidation,
        default: Option<Value>,
    ) -> FormResult<()> {
        write_lock(&self.field_validations, "registering field validation")?
            .insert(id.clone(), validation);

        let mut state = write_lock(&self.state, "registering field")?;
        match default {
            Some(default) => {
                if !state.values.contains_key(&id) {
                    state.values.insert(id.clone(), default.clone());
                }
                state.defaults.insert(id.clone(), default);
            }
            None => {
                state.defaults.remove(&id);
            }
        }
        state.registered.insert(id.clone());
        state.ensure_meta(&id);
        tracing::debug!(field = %id, "field registered");
        Ok(())
    }

    /// Unmounts a field and releases its stored value.
    pub fn unregister_field(&self, id: &FieldId) -> FormResult<()> {
        write_lock(&self.field_validations, "unregistering field validation")?.remove(id);

        let mut state = write_lock(&self.state, "unregistering field")?;
        state.registered.remove(id);
        state.values.remove(id);
        state.dirty_fields.remove(id);
        state.field_meta.remove(id);
        state.warnings.remove(id);
        state.tickets.remove(id);
        tracing::debug!(field = %id, "field unregistered");
        Ok(())
    }

    pub fn is_registered(&self, id: &FieldId) -> FormResult<bool> {
        Ok(read_lock(&self.state, "checking field registration")?
            .registered
            .contains(id))
    }

    pub fn registered_fields(&self) -> FormResult<BTreeSet<FieldId>> {
        Ok(read_lock(&self.state, "reading registered fields")?
            .registered
            .clone())
    }

    pub fn values(&self) -> FormResult<FormValues> {
        Ok(read_lock(&self.state, "reading form values")?.values.clone())
    }

    pub fn value(&self, id: &FieldId) -> FormResult<Option<Value>> {
        Ok(read_lock(&self.state, "reading field value")?
            .values
            .get(id)
            .cloned())
    }

    pub fn submit(&self, f: impl FnOnce(&FormValues) -> FormResult<()>) -> FormResult<()> {
        self.begin_submit("preparing submit")?;

        let is_valid = self.validate_form()?;
        if !is_valid {
            let mut state = write_lock(&self.state, "handling submit validation failure")?;
            transition_submit_state(&mut state, SubmitState::Failed)?;
            return Ok(());
        }

        let values = self.enter_submitting("moving submit state to submitting")?;
        let submit_result = f(&values);
        self.finish_submit(&submit_result, "completing submit")?;
        submit_result
    }

    pub async fn submit_async<F, Fut>(&self, f: F) -> FormResult<()>
    where
        F: FnOnce(FormValues) -> Fut,
        Fut: Future<Output = FormResult<()>>,
    {
        self.begin_submit("preparing async submit")?;

        let is_valid = self.validate_form_async().await?;
        if !is_valid {
            let mut state = write_lock(&self.state, "handling async submit validation failure")?;
            transition_submit_state(&mut state, SubmitState::Failed)?;
            return Ok(());
        }

        let values = self.enter_submitting("moving async submit state to submitting")?;
        let submit_result = f(values).await;
        self.finish_submit(&submit_result, "completing async submit")?;
        submit_result
    }

    fn begin_submit(&self, context: &'static str) -> FormResult<()> {
        let mut state = write_lock(&self.state, context)?;
        if state.submit_state == SubmitState::Submitting {
            return Err(FormError::AlreadySubmitting);
        }
        transition_submit_state(&mut state, SubmitState::Validating)?;
        state.submit_count = state.submit_count.saturating_add(1);
        Ok(())
    }

    fn enter_submitting(&self, context: &'static str) -> FormResult<FormValues> {
        let mut state = write_lock(&self.state, context)?;
        transition_submit_state(&mut state, SubmitState::Submitting)?;
        Ok(state.values.clone())
    }

    fn finish_submit(&self, result: &FormResult<()>, context: &'static str) -> FormResult<()> {
        let mut state = write_lock(&self.state, context)?;
        if result.is_ok() {
            transition_submit_state(&mut state, SubmitState::Succeeded)
        } else {
            transition_submit_state(&mut state, SubmitState::Failed)
        }
    }

    /// Restores every mounted field to its default (absent when it has none)
    /// and clears errors, warnings and submit history.
    pub fn reset(&self) -> FormResult<()> {
        let mut state = write_lock(&self.state, "resetting form")?;
        let values = state
            .registered
            .iter()
            .filter_map(|id| {
                state
                    .defaults
                    .get(id)
                    .map(|value| (id.clone(), value.clone()))
            })
            .collect::<FormValues>();
        state.values = values;
        state.submit_state = SubmitState::Idle;
        state.submit_count = 0;
        state.dirty_fields.clear();
        state.warnings.clear();
        state.tickets.clear();
        for meta in state.field_meta.values_mut() {
            *meta = FieldMeta::default();
        }
        Ok(())
    }

    /// Host-injected annotation shown under a field until its next user edit.
    pub fn set_warning(&self, id: FieldId, message: impl Into<String>) -> FormResult<()> {
        let mut state = write_lock(&self.state, "setting field warning")?;
        state.warnings.insert(id, message.into());
        Ok(())
    }

    pub fn clear_warning(&self, id: &FieldId) -> FormResult<bool> {
        Ok(write_lock(&self.state, "clearing field warning")?
            .warnings
            .remove(id)
            .is_some())
    }

    pub fn warning(&self, id: &FieldId) -> FormResult<Option<String>> {
        Ok(read_lock(&self.state, "reading field warning")?
            .warnings
            .get(id)
            .cloned())
    }

    pub fn snapshot(&self) -> FormResult<FormSnapshot> {
        let state = read_lock(&self.state, "creating form snapshot")?;
        let is_valid = state.field_meta.values().all(|meta| meta.errors.is_empty());
        Ok(FormSnapshot {
            values: state.values.clone(),
            submit_state: state.submit_state,
            submit_count: state.submit_count,
            is_dirty: !state.dirty_fields.is_empty(),
            is_valid,
            field_meta: state.field_meta.clone(),
            warnings: state.warnings.clone(),
        })
    }

    pub fn field_meta(&self, id: &FieldId) -> FormResult<Option<FieldMeta>> {
        Ok(read_lock(&self.state, "reading field meta")?
            .field_meta
            .get(id)
            .cloned())
    }
}

pub(super) fn transition_submit_state(state: &mut FormState, next: SubmitState) -> FormResult<()> {
    let current = state.submit_state;
    if current == next {
        return Ok(());
    }

    let allowed = matches!(
        (current, next),
        (SubmitState::Idle, SubmitState::Validating)
            | (SubmitState::Validating, SubmitState::Submitting)
            | (SubmitState::Validating, SubmitState::Failed)
            | (SubmitState::Submitting, SubmitState::Succeeded)
            | (SubmitState::Submitting, SubmitState::Failed)
            | (SubmitState::Succeeded, SubmitState::Validating)
            | (SubmitState::Failed, SubmitState::Validating)
            | (_, SubmitState::Idle)
    );
    if !allowed {
        return Err(FormError::InvalidStateTransition {
            from: current,
            to: next,
        });
    }
    state.submit_state = next;
    Ok(())
}

pub(crate) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(crate) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}
