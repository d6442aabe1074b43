use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_timer::Delay;
use serde_json::Value;

use super::controller::{
    AsyncFieldValidatorEntry, AsyncFieldValidatorFn, BoxedValidationFuture, FormController,
    FormOptions, FormValues, RevalidateMode, SyncFieldValidatorFn, ValidationMode,
    ValidationPhase, ValidationTicket, read_lock, write_lock,
};
use crate::error::FormResult;
use crate::id::FieldId;

/// What caused a value store interaction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Trigger {
    Change,
    Blur,
}

impl Trigger {
    /// Applies the validation mode before the first submit and the
    /// revalidation mode after it.
    pub fn should_validate(self, options: &FormOptions, submit_count: u32, touched: bool) -> bool {
        if submit_count > 0 {
            return match options.revalidate_mode {
                RevalidateMode::OnChange => self == Trigger::Change,
                RevalidateMode::OnBlur => self == Trigger::Blur,
                RevalidateMode::OnSubmit => false,
            };
        }
        match options.validate_mode {
            ValidationMode::OnSubmit => false,
            ValidationMode::OnBlur => self == Trigger::Blur,
            ValidationMode::OnChange => self == Trigger::Change,
            ValidationMode::OnTouched => self == Trigger::Blur || touched,
            ValidationMode::All => true,
        }
    }
}

impl FormController {
    pub fn register_field_validator<F>(&self, id: FieldId, validator: F) -> FormResult<()>
    where
        F: Fn(&FormValues, Option<&Value>) -> Result<(), String> + Send + Sync + 'static,
    {
        let wrapped: SyncFieldValidatorFn = Arc::new(validator);
        let mut validators =
            write_lock(&self.sync_field_validators, "registering field validator")?;
        validators.entry(id).or_default().push(wrapped);
        Ok(())
    }

    pub fn register_async_field_validator<F, Fut>(
        &self,
        id: FieldId,
        validator: F,
    ) -> FormResult<()>
    where
        F: Fn(FormValues) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        self.register_async_field_validator_with_debounce(id, 0, validator)
    }

    pub fn register_async_field_validator_with_debounce<F, Fut>(
        &self,
        id: FieldId,
        debounce_ms: u64,
        validator: F,
    ) -> FormResult<()>
    where
        F: Fn(FormValues) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), String>> + Send + 'static,
    {
        let wrapped: AsyncFieldValidatorFn =
            Arc::new(move |values: FormValues| -> BoxedValidationFuture {
                Box::pin(validator(values))
            });
        let entry = AsyncFieldValidatorEntry {
            debounce: Duration::from_millis(debounce_ms),
            validator: wrapped,
        };
        let mut validators = write_lock(
            &self.async_field_validators,
            "registering async field validator",
        )?;
        validators.entry(id).or_default().push(entry);
        Ok(())
    }

    /// Writes a value and validates it if the current mode asks for it.
    pub fn set(&self, id: &FieldId, value: Value) -> FormResult<()> {
        let (submit_count, touched) = self.store_value(id, value)?;
        let options = self.options()?;
        if Trigger::Change.should_validate(&options, submit_count, touched) {
            let _ = self.validate_field(id)?;
        }
        Ok(())
    }

    /// Writes a value without running any validation. Used for corrections
    /// the user did not make, like pruning a selection.
    pub fn set_silent(&self, id: &FieldId, value: Value) -> FormResult<()> {
        self.store_value(id, value).map(|_| ())
    }

    fn store_value(&self, id: &FieldId, value: Value) -> FormResult<(u32, bool)> {
        let mut state = write_lock(&self.state, "writing form value")?;
        let is_dirty = state.defaults.get(id) != Some(&value);
        state.values.insert(id.clone(), value);
        if is_dirty {
            state.dirty_fields.insert(id.clone());
        } else {
            state.dirty_fields.remove(id);
        }
        let meta = state.ensure_meta(id);
        meta.dirty = is_dirty;
        let touched = meta.touched;
        Ok((state.submit_count, touched))
    }

    /// Marks a field as touched (blurred) and validates it if the mode asks.
    pub fn touch(&self, id: &FieldId) -> FormResult<()> {
        let submit_count = {
            let mut state = write_lock(&self.state, "touching field")?;
            let meta = state.ensure_meta(id);
            meta.touched = true;
            if meta.phase == ValidationPhase::Pristine {
                meta.phase = ValidationPhase::Touched;
            }
            state.submit_count
        };

        let options = self.options()?;
        if Trigger::Blur.should_validate(&options, submit_count, true) {
            let _ = self.validate_field(id)?;
        }
        Ok(())
    }

    pub async fn set_async(&self, id: &FieldId, value: Value) -> FormResult<()> {
        self.set(id, value)?;
        self.run_async_validators(id, Trigger::Change).await
    }

    pub async fn touch_async(&self, id: &FieldId) -> FormResult<()> {
        self.touch(id)?;
        self.run_async_validators(id, Trigger::Blur).await
    }

    /// Awaits the field's async validators if `trigger` validates under the
    /// current mode.
    pub async fn run_async_validators(&self, id: &FieldId, trigger: Trigger) -> FormResult<()> {
        let (submit_count, touched) = self.trigger_context(id)?;
        if trigger.should_validate(&self.options()?, submit_count, touched) {
            let _ = self.validate_field_async_registered(id).await?;
        }
        Ok(())
    }

    /// Runs the rule list and sync validators of one mounted field and
    /// publishes the result.
    pub fn validate_field(&self, id: &FieldId) -> FormResult<bool> {
        let Some(errors) = self.compute_field_errors(id)? else {
            return Ok(true);
        };

        let mut state = write_lock(&self.state, "writing field validation result")?;
        let meta = state.ensure_meta(id);
        meta.validating = false;
        meta.phase = match meta.phase {
            ValidationPhase::Validated | ValidationPhase::Revalidated => {
                ValidationPhase::Revalidated
            }
            _ => ValidationPhase::Validated,
        };
        meta.errors = errors;
        Ok(meta.errors.is_empty())
    }

    /// Validates every mounted field and publishes the errors.
    pub fn validate_form(&self) -> FormResult<bool> {
        let registered = self.registered_fields()?;
        let mut is_valid = true;
        for id in &registered {
            is_valid &= self.validate_field(id)?;
        }
        Ok(is_valid)
    }

    /// Silent variant of [`validate_form`](Self::validate_form): displayed
    /// errors are left untouched.
    pub fn check_form(&self) -> FormResult<bool> {
        for id in self.registered_fields()? {
            if self
                .compute_field_errors(&id)?
                .is_some_and(|errors| !errors.is_empty())
            {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub async fn validate_form_async(&self) -> FormResult<bool> {
        let _ = self.validate_form()?;
        let registered = self.registered_fields()?;
        let ids = read_lock(
            &self.async_field_validators,
            "reading async validator keys for form validation",
        )?
        .keys()
        .filter(|id| registered.contains(*id))
        .cloned()
        .collect::<Vec<_>>();

        for id in ids {
            let _ = self.validate_field_async_registered(&id).await?;
        }

        Ok(self.snapshot()?.is_valid)
    }

    /// Runs the async validators of one field. A newer call for the same
    /// field supersedes this one: its result is dropped and `None` returned.
    pub async fn validate_field_async_registered(
        &self,
        id: &FieldId,
    ) -> FormResult<Option<ValidationTicket>> {
        let validators = {
            read_lock(
                &self.async_field_validators,
                "reading registered async validators",
            )?
            .get(id)
            .cloned()
            .unwrap_or_default()
        };
        if validators.is_empty() {
            return Ok(None);
        }

        let ticket = {
            let mut state = write_lock(&self.state, "starting registered async validation")?;
            let next = ValidationTicket(
                state
                    .tickets
                    .get(id)
                    .copied()
                    .unwrap_or(ValidationTicket(0))
                    .0
                    + 1,
            );
            state.tickets.insert(id.clone(), next);
            state.ensure_meta(id).validating = true;
            next
        };

        let mut async_errors = Vec::new();
        for entry in validators {
            if !entry.debounce.is_zero() {
                Delay::new(entry.debounce).await;
                if !self.is_latest_ticket(id, ticket)? {
                    return Ok(None);
                }
            }

            let values = self.values()?;
            if let Err(error) = (entry.validator)(values).await {
                async_errors.push(error);
            }
        }

        if self.finish_async_validation(id, ticket, async_errors)? {
            Ok(Some(ticket))
        } else {
            Ok(None)
        }
    }

    fn trigger_context(&self, id: &FieldId) -> FormResult<(u32, bool)> {
        let state = read_lock(&self.state, "reading validation trigger context")?;
        let touched = state.field_meta.get(id).is_some_and(|meta| meta.touched);
        Ok((state.submit_count, touched))
    }

    /// `None` when the field is not mounted.
    fn compute_field_errors(&self, id: &FieldId) -> FormResult<Option<Vec<String>>> {
        let (values, registered) = {
            let state = read_lock(&self.state, "reading values for field validation")?;
            (state.values.clone(), state.registered.contains(id))
        };
        if !registered {
            return Ok(None);
        }
        let first_only = self.options()?.validate_first_error_only;
        let validation = read_lock(&self.field_validations, "reading field validation")?
            .get(id)
            .cloned();
        let validators = read_lock(
            &self.sync_field_validators,
            "reading field validators for key validation",
        )?
        .get(id)
        .cloned()
        .unwrap_or_default();

        let value = values.get(id);
        let mut errors = match &validation {
            Some(validation) => self.validator.validate(validation, value, first_only),
            None => Vec::new(),
        };
        for validator in validators {
            if first_only && !errors.is_empty() {
                break;
            }
            if let Err(error) = validator(&values, value) {
                errors.push(error);
            }
        }
        Ok(Some(errors))
    }

    fn is_latest_ticket(&self, id: &FieldId, ticket: ValidationTicket) -> FormResult<bool> {
        Ok(read_lock(&self.state, "checking latest validation ticket")?
            .tickets
            .get(id)
            .copied()
            == Some(ticket))
    }

    fn finish_async_validation(
        &self,
        id: &FieldId,
        ticket: ValidationTicket,
        async_errors: Vec<String>,
    ) -> FormResult<bool> {
        let sync_errors = self.compute_field_errors(id)?.unwrap_or_default();
        let first_only = self.options()?.validate_first_error_only;

        let mut state = write_lock(&self.state, "finishing async validation")?;
        if state.tickets.get(id).copied() != Some(ticket) || !state.registered.contains(id) {
            return Ok(false);
        }
        let meta = state.ensure_meta(id);
        meta.validating = false;
        meta.errors = sync_errors;
        for error in async_errors {
            if first_only && !meta.errors.is_empty() {
                break;
            }
            meta.errors.push(error);
        }
        Ok(true)
    }
}
