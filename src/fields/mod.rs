mod choice;
mod image_upload;

pub use choice::{reconcile, toggle_checkbox};
pub use image_upload::{
    ACCEPTED_FILE_TYPES, AddOutcome, ImageEntry, ImageFile, ImageStatus, ImageUploadState,
    ReviewStep, UploadConfig, event,
};
