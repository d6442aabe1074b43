//! The form orchestrator: owns the value store, mounts fields as the schema
//! and visibility rules dictate, and exposes the host-facing API.

mod binding;
mod reconcile;
mod render;
mod upload;
mod visibility;


use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use serde::Deserialize;
use serde_json::Value;

use crate::error::{FormError, FormResult};
use crate::events::{FieldEventBus, FieldEventListener, ListenerOptions};
use crate::fields::ImageUploadState;
use crate::form::{
    FormController, FormOptions, FormValues, SubmitState, Trigger, read_lock, write_lock,
};
use crate::id::FieldId;
use crate::messages::{Locale, Messages};
use crate::registry::ComponentRegistry;
use crate::schema::FormDocument;
use crate::validation::{CustomRules, Validator, ValueType};

pub use binding::{ChangeEvent, ChangeTarget, FieldBinding};

use visibility::SchemaState;

pub type ChangeCallback = Arc<dyn Fn(&FormValues, bool) + Send + Sync>;
pub type SubmitCallback = Arc<dyn Fn(&FormValues) + Send + Sync>;
pub type SubmitErrorCallback = Arc<dyn Fn(&BTreeMap<FieldId, Vec<String>>) + Send + Sync>;

#[derive(Clone, Default)]
struct Callbacks {
    on_change: Option<ChangeCallback>,
    on_submit: Option<SubmitCallback>,
    on_submit_error: Option<SubmitErrorCallback>,
}

/// Payload of [`FrontendEngine::set_errors`]: one message, several, or a
/// map addressing nested field ids.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ErrorMessage {
    Single(String),
    Many(Vec<String>),
    Nested(BTreeMap<String, ErrorMessage>),
}

impl From<&str> for ErrorMessage {
    fn from(message: &str) -> Self {
        ErrorMessage::Single(message.to_string())
    }
}

impl From<String> for ErrorMessage {
    fn from(message: String) -> Self {
        ErrorMessage::Single(message)
    }
}

impl ErrorMessage {
    fn flatten_into(self, id: String, flattened: &mut Vec<(FieldId, String)>) {
        match self {
            ErrorMessage::Single(message) => flattened.push((FieldId::from(id), message)),
            ErrorMessage::Many(messages) if messages.is_empty() => {}
            ErrorMessage::Many(messages) => {
                flattened.push((FieldId::from(id), messages.join("\n")));
            }
            ErrorMessage::Nested(nested) => {
                for (nested_id, message) in nested {
                    message.flatten_into(nested_id, flattened);
                }
            }
        }
    }
}

pub struct EngineBuilder {
    document: FormDocument,
    options: Option<FormOptions>,
    registry: ComponentRegistry,
    messages: Messages,
    callbacks: Callbacks,
}

impl EngineBuilder {
    pub fn new(document: FormDocument) -> Self {
        Self {
            document,
            options: None,
            registry: ComponentRegistry::default(),
            messages: Messages::new(),
            callbacks: Callbacks::default(),
        }
    }

    /// Overrides the document's validation modes.
    pub fn options(mut self, options: FormOptions) -> Self {
        self.options = Some(options);
        self
    }

    pub fn registry(mut self, registry: ComponentRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn locale(mut self, locale: impl Into<Locale>) -> Self {
        self.messages = Messages::with_locale(locale);
        self
    }

    pub fn on_change<F>(mut self, callback: F) -> Self
    where
        F: Fn(&FormValues, bool) + Send + Sync + 'static,
    {
        self.callbacks.on_change = Some(Arc::new(callback));
        self
    }

    pub fn on_submit<F>(mut self, callback: F) -> Self
    where
        F: Fn(&FormValues) + Send + Sync + 'static,
    {
        self.callbacks.on_submit = Some(Arc::new(callback));
        self
    }

    pub fn on_submit_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&BTreeMap<FieldId, Vec<String>>) + Send + Sync + 'static,
    {
        self.callbacks.on_submit_error = Some(Arc::new(callback));
        self
    }

    pub fn build(self) -> FormResult<FrontendEngine> {
        let options = self
            .options
            .unwrap_or_else(|| document_options(&self.document));
        let validator = Validator::new(CustomRules::new(), self.messages);
        let schema = SchemaState::build(self.document, &self.registry);
        let engine = FrontendEngine {
            controller: FormController::new(options, validator),
            registry: self.registry,
            schema: Arc::new(RwLock::new(schema)),
            uploads: Arc::new(RwLock::new(BTreeMap::new())),
            events: FieldEventBus::new(),
            callbacks: Arc::new(self.callbacks),
            options_override: self.options,
        };
        engine.refresh_all()?;
        tracing::debug!(
            fields = engine.controller.registered_fields()?.len(),
            "form engine initialized"
        );
        Ok(engine)
    }
}

/// Headless form engine. Clones share state.
#[derive(Clone)]
pub struct FrontendEngine {
    controller: FormController,
    registry: ComponentRegistry,
    schema: Arc<RwLock<SchemaState>>,
    uploads: Arc<RwLock<BTreeMap<FieldId, ImageUploadState>>>,
    events: FieldEventBus,
    callbacks: Arc<Callbacks>,
    options_override: Option<FormOptions>,
}

impl FrontendEngine {
    pub fn builder(document: FormDocument) -> EngineBuilder {
        EngineBuilder::new(document)
    }

    pub fn new(document: FormDocument) -> FormResult<Self> {
        EngineBuilder::new(document).build()
    }

    pub fn from_json(json: &str) -> FormResult<Self> {
        Self::new(FormDocument::from_json(json)?)
    }

    pub fn controller(&self) -> &FormController {
        &self.controller
    }

    pub fn events(&self) -> &FieldEventBus {
        &self.events
    }

    pub fn document(&self) -> FormResult<FormDocument> {
        Ok(read_lock(&self.schema, "reading form document")?
            .document
            .clone())
    }

    /// Snapshot of the value store. Never validates.
    pub fn get_values(&self) -> FormResult<FormValues> {
        self.controller.values()
    }

    /// Validates every mounted field without touching displayed errors.
    pub fn is_valid(&self) -> FormResult<bool> {
        self.controller.check_form()
    }

    /// Programmatic write. Host warnings on the field survive it.
    pub fn set_value(&self, id: impl Into<FieldId>, value: Value) -> FormResult<()> {
        let id = id.into();
        self.ensure_registered(&id)?;
        self.controller.set(&id, value)?;
        self.reseed_upload(&id)?;
        self.after_change(&id)
    }

    /// User edit: clears the host warning of that field before writing.
    pub fn change(&self, id: impl Into<FieldId>, value: Value) -> FormResult<()> {
        let id = id.into();
        self.ensure_registered(&id)?;
        self.controller.clear_warning(&id)?;
        self.controller.set(&id, value)?;
        self.after_change(&id)
    }

    pub fn blur(&self, id: impl Into<FieldId>) -> FormResult<()> {
        let id = id.into();
        self.ensure_registered(&id)?;
        self.controller.touch(&id)
    }

    /// [`change`](Self::change) followed by the field's async validators,
    /// debounced and latest-edit-wins.
    pub async fn change_async(&self, id: impl Into<FieldId>, value: Value) -> FormResult<()> {
        let id = id.into();
        self.change(id.clone(), value)?;
        self.controller
            .run_async_validators(&id, Trigger::Change)
            .await
    }

    pub async fn blur_async(&self, id: impl Into<FieldId>) -> FormResult<()> {
        let id = id.into();
        self.blur(id.clone())?;
        self.controller.run_async_validators(&id, Trigger::Blur).await
    }

    /// Restores defaults, clears errors, warnings and upload workflows.
    pub fn reset(&self) -> FormResult<()> {
        self.events.discard_all_pending()?;
        self.controller.reset()?;
        self.refresh_all()?;
        self.reseed_uploads()?;
        self.notify_change()
    }

    /// Display-only warnings, cleared by the next user edit of each field.
    pub fn set_errors<K, M>(&self, errors: impl IntoIterator<Item = (K, M)>) -> FormResult<()>
    where
        K: Into<String>,
        M: Into<ErrorMessage>,
    {
        let mut flattened = Vec::new();
        for (id, message) in errors {
            message.into().flatten_into(id.into(), &mut flattened);
        }
        for (id, message) in flattened {
            self.controller.set_warning(id, message)?;
        }
        Ok(())
    }

    pub fn add_custom_validation<F>(&self, value_type: ValueType, name: &str, predicate: F)
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.controller
            .validator()
            .add_custom_validation(value_type, name, predicate);
    }

    pub fn add_field_event_listener(
        &self,
        event_type: &str,
        id: impl Into<FieldId>,
        listener: FieldEventListener,
        options: ListenerOptions,
    ) -> FormResult<()> {
        self.events
            .add_listener(event_type, id.into(), listener, options)
    }

    pub fn remove_field_event_listener(
        &self,
        event_type: &str,
        id: impl Into<FieldId>,
        listener: &FieldEventListener,
    ) -> FormResult<bool> {
        self.events
            .remove_listener(event_type, &id.into(), listener)
    }

    pub fn dispatch_field_event(
        &self,
        event_type: &str,
        id: impl Into<FieldId>,
        detail: Value,
    ) -> FormResult<bool> {
        self.events.dispatch(event_type, &id.into(), detail)
    }

    /// Validates and submits. Failures end up in the returned state and the
    /// `on_submit_error` callback, never in an `Err`.
    pub fn submit(&self) -> SubmitState {
        match self.try_submit() {
            Ok(state) => state,
            Err(error) => {
                tracing::error!(%error, "form submit failed");
                SubmitState::Failed
            }
        }
    }

    /// Like [`submit`](Self::submit) but also awaits async field validators.
    pub async fn submit_async(&self) -> SubmitState {
        let mut submitted = None;
        let result = self
            .controller
            .submit_async(|values| {
                submitted = Some(values);
                std::future::ready(Ok(()))
            })
            .await;
        match result.and_then(|()| self.finish_submit(submitted)) {
            Ok(state) => state,
            Err(error) => {
                tracing::error!(%error, "async form submit failed");
                SubmitState::Failed
            }
        }
    }

    fn try_submit(&self) -> FormResult<SubmitState> {
        let mut submitted = None;
        self.controller.submit(|values| {
            submitted = Some(values.clone());
            Ok(())
        })?;
        self.finish_submit(submitted)
    }

    fn finish_submit(&self, submitted: Option<FormValues>) -> FormResult<SubmitState> {
        let snapshot = self.controller.snapshot()?;
        match submitted {
            Some(values) => {
                tracing::debug!(fields = values.len(), "form submitted");
                if let Some(on_submit) = &self.callbacks.on_submit {
                    on_submit(&values);
                }
            }
            None => {
                let errors = snapshot.errors();
                tracing::debug!(fields = errors.len(), "form submit blocked by errors");
                if let Some(on_submit_error) = &self.callbacks.on_submit_error {
                    on_submit_error(&errors);
                }
            }
        }
        Ok(snapshot.submit_state)
    }

    fn ensure_registered(&self, id: &FieldId) -> FormResult<()> {
        if self.controller.is_registered(id)? {
            Ok(())
        } else {
            Err(FormError::FieldNotMounted(id.to_string()))
        }
    }

    fn after_change(&self, id: &FieldId) -> FormResult<()> {
        self.sync_visibility(BTreeSet::from([id.clone()]))?;
        self.notify_change()
    }

    fn notify_change(&self) -> FormResult<()> {
        let Some(on_change) = &self.callbacks.on_change else {
            return Ok(());
        };
        let values = self.controller.values()?;
        let is_valid = self.controller.check_form()?;
        on_change(&values, is_valid);
        Ok(())
    }

    fn reseed_uploads(&self) -> FormResult<()> {
        let ids = read_lock(&self.uploads, "reading upload fields")?
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        for id in ids {
            self.reseed_upload(&id)?;
        }
        Ok(())
    }

    /// Rebuilds an upload workflow from the stored value, dropping any
    /// in-progress review.
    fn reseed_upload(&self, id: &FieldId) -> FormResult<()> {
        let value = self.controller.value(id)?;
        let mut uploads = write_lock(&self.uploads, "reseeding upload state")?;
        if let Some(state) = uploads.get_mut(id) {
            *state = ImageUploadState::from_value(value.as_ref());
        }
        Ok(())
    }
}

fn document_options(document: &FormDocument) -> FormOptions {
    let mut options = FormOptions::default();
    if let Some(mode) = document.validation_mode {
        options.validate_mode = mode;
    }
    if let Some(mode) = document.revalidation_mode {
        options.revalidate_mode = mode;
    }
    options
}
