//! Headless image upload workflow: accept/reject files, an optional review
//! step, and the list of images committed to the value store.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::messages::{self, Messages};
use crate::schema::SchemaNode;
use crate::validation::{Rule, RuleDescriptor, as_decimal};

pub const ACCEPTED_FILE_TYPES: [&str; 6] = ["jpg", "gif", "png", "heic", "heif", "webp"];

/// Rule keys that configure the upload instead of validating the value.
const FILE_TYPE_RULE: &str = "fileType";
const MAX_SIZE_RULE: &str = "maxSizeInKb";

pub mod event {
    pub const MOUNT: &str = "mount";
    pub const FILE_DIALOG: &str = "file-dialog";
    pub const SHOW_REVIEW_MODAL: &str = "show-review-modal";
    pub const HIDE_REVIEW_MODAL: &str = "hide-review-modal";
    pub const SAVE_REVIEW_IMAGES: &str = "save-review-images";
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFile {
    #[serde(rename = "fileName")]
    pub name: String,
    pub size_in_bytes: u64,
    #[serde(default, rename = "dataURL", skip_serializing_if = "Option::is_none")]
    pub data_url: Option<String>,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, size_in_bytes: u64) -> Self {
        Self {
            name: name.into(),
            size_in_bytes,
            data_url: None,
        }
    }

    pub fn with_data_url(mut self, data_url: impl Into<String>) -> Self {
        self.data_url = Some(data_url.into());
        self
    }

    /// Lowercased extension, with `jpeg` folded into `jpg`.
    pub fn extension(&self) -> Option<String> {
        let (_, extension) = self.name.rsplit_once('.')?;
        let extension = extension.to_ascii_lowercase();
        Some(if extension == "jpeg" {
            "jpg".to_string()
        } else {
            extension
        })
    }

    fn size_in_kb(&self) -> Decimal {
        Decimal::from(self.size_in_bytes) / Decimal::from(1024)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ImageStatus {
    ErrorFormat,
    ErrorSize,
    /// Accepted, waiting for the review step to be saved.
    Pending,
    Ready,
}

impl ImageStatus {
    pub fn is_error(self) -> bool {
        matches!(self, ImageStatus::ErrorFormat | ImageStatus::ErrorSize)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageEntry {
    pub file: ImageFile,
    pub status: ImageStatus,
    pub slot: usize,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ReviewStep {
    #[default]
    Idle,
    Reviewing,
    Saving,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AddOutcome {
    Added { count: usize, review: bool },
    ExceededMaxFiles,
}

/// Upload settings read from an `image-upload` node.
#[derive(Clone, Debug, PartialEq)]
pub struct UploadConfig {
    pub accepts: Vec<String>,
    pub max_size_in_kb: Option<Decimal>,
    /// `0` means unlimited.
    pub max_files: usize,
    pub max_files_message: Option<String>,
    pub edit_image: bool,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            accepts: ACCEPTED_FILE_TYPES.iter().map(|ext| ext.to_string()).collect(),
            max_size_in_kb: None,
            max_files: 0,
            max_files_message: None,
            edit_image: false,
        }
    }
}

impl UploadConfig {
    pub fn from_schema(node: &SchemaNode) -> Self {
        let mut config = Self {
            edit_image: node.bool_attribute("editImage"),
            ..Self::default()
        };
        for descriptor in &node.validation {
            if let Some(types) = descriptor
                .custom_argument(FILE_TYPE_RULE)
                .and_then(Value::as_array)
            {
                config.accepts = types
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_ascii_lowercase)
                    .collect();
            }
            if let Some(max) = descriptor.custom_argument(MAX_SIZE_RULE).and_then(as_decimal) {
                config.max_size_in_kb = Some(max);
            }
            if let Rule::Max(max) | Rule::Length(max) = &descriptor.rule {
                config.max_files = max.trunc().to_usize().unwrap_or(0);
                config.max_files_message = descriptor.error_message.clone();
            }
        }
        config
    }

    /// The node's rules minus the ones that only configure the upload.
    pub fn value_rules(node: &SchemaNode) -> Vec<RuleDescriptor> {
        node.validation
            .iter()
            .filter(|descriptor| {
                !descriptor.is_named(FILE_TYPE_RULE) && !descriptor.is_named(MAX_SIZE_RULE)
            })
            .cloned()
            .collect()
    }

    pub fn check(&self, file: &ImageFile) -> ImageStatus {
        let accepted = file
            .extension()
            .is_some_and(|extension| self.accepts.iter().any(|accept| *accept == extension));
        if !accepted {
            return ImageStatus::ErrorFormat;
        }
        if self
            .max_size_in_kb
            .is_some_and(|max| file.size_in_kb() > max)
        {
            return ImageStatus::ErrorSize;
        }
        ImageStatus::Pending
    }

    pub fn max_files_error(&self, messages: &Messages) -> String {
        self.max_files_message.clone().unwrap_or_else(|| {
            messages.t_with(
                messages::MAX_FILES,
                &[("max", self.max_files.to_string().as_str())],
            )
        })
    }

    pub fn status_error(&self, status: ImageStatus, messages: &Messages) -> Option<String> {
        match status {
            ImageStatus::ErrorFormat => Some(messages.t_with(
                messages::FILE_TYPE,
                &[("types", self.accepts.join(", ").as_str())],
            )),
            ImageStatus::ErrorSize => {
                let max = self.max_size_in_kb.unwrap_or_default().normalize().to_string();
                Some(messages.t_with(messages::FILE_SIZE, &[("max", max.as_str())]))
            }
            ImageStatus::Pending | ImageStatus::Ready => None,
        }
    }
}

/// Per-field upload state owned by the engine while the field is mounted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImageUploadState {
    entries: Vec<ImageEntry>,
    step: ReviewStep,
    exceeded_max_files: bool,
}

impl ImageUploadState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds committed images from a stored value. Entries that do not parse
    /// as images are skipped.
    pub fn from_value(value: Option<&Value>) -> Self {
        let files = value
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| serde_json::from_value::<ImageFile>(item.clone()).ok())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        Self {
            entries: files
                .into_iter()
                .enumerate()
                .map(|(slot, file)| ImageEntry {
                    file,
                    status: ImageStatus::Ready,
                    slot,
                })
                .collect(),
            ..Self::default()
        }
    }

    pub fn entries(&self) -> &[ImageEntry] {
        &self.entries
    }

    pub fn step(&self) -> ReviewStep {
        self.step
    }

    pub fn exceeded_max_files(&self) -> bool {
        self.exceeded_max_files
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|entry| entry.status.is_error())
    }

    /// The add button disappears once the cap is reached.
    pub fn can_add(&self, config: &UploadConfig) -> bool {
        config.max_files == 0 || self.entries.len() < config.max_files
    }

    /// A batch that would overflow `max_files` is rejected whole.
    pub fn add_files(&mut self, config: &UploadConfig, files: Vec<ImageFile>) -> AddOutcome {
        if config.max_files > 0 && self.entries.len() + files.len() > config.max_files {
            self.exceeded_max_files = true;
            return AddOutcome::ExceededMaxFiles;
        }
        self.exceeded_max_files = false;

        let count = files.len();
        for file in files {
            let status = match config.check(&file) {
                ImageStatus::Pending if !config.edit_image => ImageStatus::Ready,
                status => status,
            };
            let slot = self.next_slot();
            self.entries.push(ImageEntry { file, status, slot });
        }

        let review = config.edit_image
            && self
                .entries
                .iter()
                .any(|entry| entry.status == ImageStatus::Pending);
        if review {
            self.step = ReviewStep::Reviewing;
        }
        AddOutcome::Added { count, review }
    }

    pub fn remove(&mut self, slot: usize) -> Option<ImageEntry> {
        let position = self.entries.iter().position(|entry| entry.slot == slot)?;
        self.exceeded_max_files = false;
        Some(self.entries.remove(position))
    }

    /// Moves the review step to saving. Only valid while reviewing.
    pub fn begin_save(&mut self) -> bool {
        if self.step != ReviewStep::Reviewing {
            return false;
        }
        self.step = ReviewStep::Saving;
        true
    }

    pub fn finish_save(&mut self) {
        for entry in &mut self.entries {
            if entry.status == ImageStatus::Pending {
                entry.status = ImageStatus::Ready;
            }
        }
        self.step = ReviewStep::Idle;
    }

    pub fn cancel_save(&mut self) {
        if self.step == ReviewStep::Saving {
            self.step = ReviewStep::Reviewing;
        }
    }

    /// Images under review, as sent with `save-review-images`.
    pub fn review_detail(&self) -> Value {
        Value::Array(
            self.entries
                .iter()
                .filter(|entry| entry.status == ImageStatus::Pending)
                .filter_map(|entry| serde_json::to_value(&entry.file).ok())
                .collect(),
        )
    }

    pub fn committed_value(&self) -> Value {
        Value::Array(
            self.entries
                .iter()
                .filter(|entry| entry.status == ImageStatus::Ready)
                .filter_map(|entry| serde_json::to_value(&entry.file).ok())
                .collect(),
        )
    }

    /// Inline alert for the field: the max files error wins, then the first
    /// rejected file.
    pub fn alert(&self, config: &UploadConfig, messages: &Messages) -> Option<String> {
        if self.exceeded_max_files {
            return Some(config.max_files_error(messages));
        }
        self.entries
            .iter()
            .find_map(|entry| config.status_error(entry.status, messages))
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn next_slot(&self) -> usize {
        (0..)
            .find(|slot| self.entries.iter().all(|entry| entry.slot != *slot))
            .unwrap_or(self.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(node: Value) -> UploadConfig {
        UploadConfig::from_schema(&SchemaNode::from_value(node).expect("node parses"))
    }

    fn messages() -> Messages {
        Messages::with_locale("en")
    }

    #[test]
    fn config_reads_upload_rules() {
        let config = config(json!({
            "uiType": "image-upload",
            "editImage": true,
            "validation": [
                { "fileType": ["png"] },
                { "maxSizeInKb": 100 },
                { "max": 2, "errorMessage": "Two at most" }
            ]
        }));
        assert_eq!(config.accepts, vec!["png".to_string()]);
        assert_eq!(config.max_size_in_kb, Some(Decimal::from(100)));
        assert_eq!(config.max_files, 2);
        assert!(config.edit_image);
        assert_eq!(config.max_files_error(&messages()), "Two at most");
    }

    #[test]
    fn value_rules_drop_upload_configuration() {
        let node = SchemaNode::from_value(json!({
            "uiType": "image-upload",
            "validation": [{ "required": true }, { "fileType": ["png"] }, { "maxSizeInKb": 1 }]
        }))
        .expect("node parses");
        let rules = UploadConfig::value_rules(&node);
        assert_eq!(rules.len(), 1);
        assert!(rules[0].is_named("required"));
    }

    #[test]
    fn rejected_files_carry_error_status() {
        let config = config(json!({
            "uiType": "image-upload",
            "validation": [{ "maxSizeInKb": 1 }]
        }));
        let mut state = ImageUploadState::new();
        state.add_files(
            &config,
            vec![
                ImageFile::new("notes.pdf", 10),
                ImageFile::new("huge.JPEG", 4096),
                ImageFile::new("ok.png", 512),
            ],
        );
        let statuses = state
            .entries()
            .iter()
            .map(|entry| entry.status)
            .collect::<Vec<_>>();
        assert_eq!(
            statuses,
            vec![ImageStatus::ErrorFormat, ImageStatus::ErrorSize, ImageStatus::Ready]
        );
        assert_eq!(
            state.alert(&config, &messages()).as_deref(),
            Some("Upload failed. Only jpg, gif, png, heic, heif, webp files are accepted.")
        );
        assert_eq!(
            state.committed_value(),
            json!([{ "fileName": "ok.png", "sizeInBytes": 512 }])
        );
    }

    #[test]
    fn overflowing_batch_is_rejected_whole() {
        let config = config(json!({ "uiType": "image-upload", "validation": [{ "max": 1 }] }));
        let mut state = ImageUploadState::new();
        assert_eq!(
            state.add_files(&config, vec![ImageFile::new("a.png", 1)]),
            AddOutcome::Added {
                count: 1,
                review: false
            }
        );
        assert!(!state.can_add(&config));
        assert_eq!(
            state.add_files(&config, vec![ImageFile::new("b.png", 1)]),
            AddOutcome::ExceededMaxFiles
        );
        assert_eq!(state.entries().len(), 1);
        assert_eq!(
            state.alert(&config, &messages()).as_deref(),
            Some("You can only upload up to 1 photos")
        );

        let removed = state.remove(0).expect("slot 0 exists");
        assert_eq!(removed.file.name, "a.png");
        assert!(!state.exceeded_max_files());
        assert!(state.can_add(&config));
    }

    #[test]
    fn review_step_commits_on_save() {
        let config = config(json!({ "uiType": "image-upload", "editImage": true }));
        let mut state = ImageUploadState::new();
        let outcome = state.add_files(&config, vec![ImageFile::new("a.png", 1)]);
        assert_eq!(
            outcome,
            AddOutcome::Added {
                count: 1,
                review: true
            }
        );
        assert_eq!(state.step(), ReviewStep::Reviewing);
        assert_eq!(state.committed_value(), json!([]));

        assert!(state.begin_save());
        assert!(!state.begin_save());
        state.finish_save();
        assert_eq!(state.step(), ReviewStep::Idle);
        assert_eq!(
            state.committed_value(),
            json!([{ "fileName": "a.png", "sizeInBytes": 1 }])
        );
    }

    #[test]
    fn slots_are_reused_after_removal() {
        let config = UploadConfig::default();
        let mut state = ImageUploadState::new();
        state.add_files(
            &config,
            vec![ImageFile::new("a.png", 1), ImageFile::new("b.png", 1)],
        );
        state.remove(0);
        state.add_files(&config, vec![ImageFile::new("c.png", 1)]);
        let slots = state
            .entries()
            .iter()
            .map(|entry| (entry.file.name.as_str(), entry.slot))
            .collect::<Vec<_>>();
        assert_eq!(slots, vec![("b.png", 1), ("c.png", 0)]);
    }

    #[test]
    fn seeds_from_stored_value() {
        let state = ImageUploadState::from_value(Some(&json!([
            { "fileName": "a.png", "sizeInBytes": 3 },
            "garbage"
        ])));
        assert_eq!(state.entries().len(), 1);
        assert_eq!(state.entries()[0].status, ImageStatus::Ready);
    }
}
