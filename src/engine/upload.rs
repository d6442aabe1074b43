use serde_json::{Value, json};

use super::FrontendEngine;
use crate::error::{FormError, FormResult};
use crate::events::DispatchOutcome;
use crate::fields::{AddOutcome, ImageFile, ImageUploadState, UploadConfig, event};
use crate::form::{read_lock, write_lock};
use crate::id::FieldId;
use crate::registry::FieldKind;

impl FrontendEngine {
    pub fn upload_state(&self, id: &FieldId) -> FormResult<Option<ImageUploadState>> {
        Ok(read_lock(&self.uploads, "reading upload state")?
            .get(id)
            .cloned())
    }

    pub fn upload_config(&self, id: &FieldId) -> FormResult<UploadConfig> {
        match self.mounted_field(id)? {
            Some(field) if field.field_type.kind() == Some(FieldKind::ImageUpload) => {
                Ok(UploadConfig::from_schema(&field.schema))
            }
            _ => Err(FormError::FieldNotMounted(id.to_string())),
        }
    }

    /// Announces the file picker. Returns `false` if a listener prevented it.
    pub fn open_file_dialog(&self, id: impl Into<FieldId>) -> FormResult<bool> {
        let id = id.into();
        self.upload_config(&id)?;
        self.events.dispatch(event::FILE_DIALOG, &id, Value::Null)
    }

    /// Adds picked files. With `editImage` the accepted files wait in the
    /// review step; otherwise they are committed right away.
    pub fn add_images(&self, id: impl Into<FieldId>, files: Vec<ImageFile>) -> FormResult<AddOutcome> {
        let id = id.into();
        let config = self.upload_config(&id)?;
        let (outcome, detail, committed) = {
            let mut uploads = write_lock(&self.uploads, "adding images")?;
            let state = uploads.entry(id.clone()).or_default();
            let outcome = state.add_files(&config, files);
            (outcome, state.review_detail(), state.committed_value())
        };

        match outcome {
            AddOutcome::Added { review: true, .. } => {
                self.events
                    .dispatch(event::SHOW_REVIEW_MODAL, &id, json!({ "images": detail }))?;
            }
            AddOutcome::Added { .. } => self.commit_if_changed(&id, committed)?,
            AddOutcome::ExceededMaxFiles => {
                tracing::debug!(field = %id, max = config.max_files, "image batch over the limit");
            }
        }
        Ok(outcome)
    }

    pub fn remove_image(&self, id: impl Into<FieldId>, slot: usize) -> FormResult<bool> {
        let id = id.into();
        let committed = {
            let mut uploads = write_lock(&self.uploads, "removing image")?;
            let Some(state) = uploads.get_mut(&id) else {
                return Err(FormError::FieldNotMounted(id.to_string()));
            };
            if state.remove(slot).is_none() {
                return Ok(false);
            }
            state.committed_value()
        };
        self.commit_if_changed(&id, committed)?;
        Ok(true)
    }

    /// Saves the review step through the cancelable `save-review-images`
    /// event. `None` when the field is not reviewing.
    pub fn save_review(&self, id: impl Into<FieldId>) -> FormResult<Option<DispatchOutcome>> {
        let id = id.into();
        let detail = {
            let mut uploads = write_lock(&self.uploads, "starting review save")?;
            let Some(state) = uploads.get_mut(&id) else {
                return Err(FormError::FieldNotMounted(id.to_string()));
            };
            if !state.begin_save() {
                tracing::debug!(field = %id, "no review in progress");
                return Ok(None);
            }
            state.review_detail()
        };

        let engine = self.clone();
        let target = id.clone();
        let outcome = self.events.dispatch_cancelable(
            event::SAVE_REVIEW_IMAGES,
            &id,
            json!({ "images": detail }),
            move || {
                if let Err(error) = engine.commit_review(&target) {
                    tracing::error!(%error, field = %target, "saving reviewed images failed");
                }
            },
        )?;

        if outcome == DispatchOutcome::Cancelled {
            if let Some(state) = write_lock(&self.uploads, "cancelling review save")?.get_mut(&id) {
                state.cancel_save();
            }
        }
        Ok(Some(outcome))
    }

    fn commit_review(&self, id: &FieldId) -> FormResult<()> {
        let committed = {
            let mut uploads = write_lock(&self.uploads, "committing reviewed images")?;
            let Some(state) = uploads.get_mut(id) else {
                return Err(FormError::FieldNotMounted(id.to_string()));
            };
            state.finish_save();
            state.committed_value()
        };
        self.commit_if_changed(id, committed)?;
        self.events.dispatch(event::HIDE_REVIEW_MODAL, id, Value::Null)?;
        Ok(())
    }

    fn commit_if_changed(&self, id: &FieldId, committed: Value) -> FormResult<()> {
        let current = self.controller.value(id)?;
        if current.as_ref() == Some(&committed) {
            return Ok(());
        }
        self.change(id.clone(), committed)
    }
}
