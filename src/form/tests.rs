use super::*;
use futures::executor::block_on;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use crate::error::FormError;
use crate::id::FieldId;
use crate::validation::{FieldValidation, RuleDescriptor, Validator, ValueType};

fn id(value: &str) -> FieldId {
    FieldId::new(value)
}

fn rules(value: Value) -> Vec<RuleDescriptor> {
    serde_json::from_value(value).expect("rules parse")
}

fn required_text() -> FieldValidation {
    FieldValidation::new(
        ValueType::String,
        rules(json!([{ "required": true, "errorMessage": "required" }])),
    )
}

fn controller(options: FormOptions) -> FormController {
    let controller = FormController::new(options, Validator::default());
    controller
        .register_field(id("email"), required_text(), Some(json!("user@example.com")))
        .expect("register email");
    controller
        .register_field(
            id("password"),
            FieldValidation::new(ValueType::String, Vec::new()),
            Some(json!("pass")),
        )
        .expect("register password");
    controller
        .register_field(
            id("confirm_password"),
            FieldValidation::new(ValueType::String, Vec::new()),
            Some(json!("pass")),
        )
        .expect("register confirm");
    controller
}

fn shown_error(controller: &FormController, name: &str) -> Option<String> {
    controller.field_state(&id(name)).expect("field state").error
}

fn on_change() -> FormOptions {
    FormOptions {
        validate_mode: ValidationMode::OnChange,
        ..FormOptions::default()
    }
}

#[test]
fn set_updates_value_and_dirty_state() {
    let controller = controller(FormOptions::default());

    controller
        .set(&id("email"), json!("changed@example.com"))
        .expect("set must succeed");
    let snapshot = controller.snapshot().expect("snapshot must succeed");
    assert!(snapshot.is_dirty);
    assert_eq!(snapshot.values[&id("email")], json!("changed@example.com"));
    assert_eq!(snapshot.values[&id("password")], json!("pass"));

    let email_meta = snapshot
        .field_meta
        .get(&id("email"))
        .expect("email meta should exist");
    assert!(email_meta.dirty);
    assert!(
        snapshot
            .field_meta
            .get(&id("password"))
            .is_some_and(|meta| !meta.dirty)
    );
}

#[test]
fn silent_set_skips_validation() {
    let controller = controller(on_change());
    controller
        .set_silent(&id("email"), json!(""))
        .expect("silent set");
    assert_eq!(controller.value(&id("email")).expect("value"), Some(json!("")));
    assert!(
        controller
            .field_meta(&id("email"))
            .expect("meta")
            .is_some_and(|meta| meta.dirty && meta.errors.is_empty())
    );

    controller.set(&id("email"), json!("")).expect("set");
    assert_eq!(shown_error(&controller, "email"), Some("required".to_string()));
}

#[test]
fn registering_keeps_existing_value_over_default() {
    let controller = FormController::new(FormOptions::default(), Validator::default());
    controller
        .set(&id("name"), json!("typed"))
        .expect("set before mount");
    controller
        .register_field(
            id("name"),
            FieldValidation::new(ValueType::String, Vec::new()),
            Some(json!("default")),
        )
        .expect("register");
    assert_eq!(
        controller.value(&id("name")).expect("value"),
        Some(json!("typed"))
    );
}

#[test]
fn unregistering_releases_value() {
    let controller = controller(FormOptions::default());
    controller
        .set_warning(id("email"), "server said no")
        .expect("set warning");
    controller.unregister_field(&id("email")).expect("unregister");

    let snapshot = controller.snapshot().expect("snapshot");
    assert!(!snapshot.values.contains_key(&id("email")));
    assert!(snapshot.warnings.is_empty());
    assert!(!controller.is_registered(&id("email")).expect("registered"));
}

#[test]
fn validation_mode_controls_when_errors_appear() {
    let eager = controller(on_change());
    eager
        .set(&id("email"), json!(""))
        .expect("set should trigger validation");
    assert_eq!(
        eager
            .field_meta(&id("email"))
            .expect("meta")
            .expect("field meta")
            .errors,
        vec!["required".to_string()]
    );

    let lazy = controller(FormOptions::default());
    lazy.set(&id("email"), json!(""))
        .expect("set should not trigger validation immediately");
    assert!(
        lazy.snapshot()
            .expect("snapshot")
            .field_meta
            .get(&id("email"))
            .is_some_and(|meta| meta.errors.is_empty())
    );
    assert!(!lazy.validate_form().expect("validate form"));
}

#[test]
fn on_blur_mode_waits_for_touch() {
    let controller = controller(FormOptions {
        validate_mode: ValidationMode::OnBlur,
        ..FormOptions::default()
    });
    controller.set(&id("email"), json!("")).expect("set");
    assert_eq!(shown_error(&controller, "email"), None);

    controller.touch(&id("email")).expect("touch field");
    assert_eq!(shown_error(&controller, "email"), Some("required".to_string()));
}

#[test]
fn on_touched_mode_validates_changes_after_first_blur() {
    let options = FormOptions {
        validate_mode: ValidationMode::OnTouched,
        ..FormOptions::default()
    };
    assert!(!Trigger::Change.should_validate(&options, 0, false));
    assert!(Trigger::Blur.should_validate(&options, 0, false));
    assert!(Trigger::Change.should_validate(&options, 0, true));
}

#[test]
fn revalidation_mode_applies_after_first_submit() {
    let controller = controller(FormOptions {
        revalidate_mode: RevalidateMode::OnBlur,
        ..FormOptions::default()
    });
    controller.set(&id("email"), json!("")).expect("set");
    controller.submit(|_| Ok(())).expect("submit");
    assert_eq!(
        controller.snapshot().expect("snapshot").submit_state,
        SubmitState::Failed
    );

    controller
        .set(&id("email"), json!("fixed@example.com"))
        .expect("set after submit");
    // onBlur revalidation keeps the stale error until blur
    assert!(shown_error(&controller, "email").is_some());

    controller.touch(&id("email")).expect("touch");
    assert!(shown_error(&controller, "email").is_none());
}

#[test]
fn validation_phase_tracks_lifecycle() {
    let controller = controller(on_change());
    let phase = |controller: &FormController| {
        controller
            .field_meta(&id("email"))
            .expect("meta")
            .expect("meta exists")
            .phase
    };
    assert_eq!(phase(&controller), ValidationPhase::Pristine);
    controller.touch(&id("email")).expect("touch");
    assert_eq!(phase(&controller), ValidationPhase::Touched);
    controller.set(&id("email"), json!("a@b.co")).expect("set");
    assert_eq!(phase(&controller), ValidationPhase::Validated);
    controller.set(&id("email"), json!("")).expect("set again");
    assert_eq!(phase(&controller), ValidationPhase::Revalidated);
}

#[test]
fn field_validators_read_sibling_values() {
    let controller = controller(on_change());
    controller
        .register_field_validator(id("confirm_password"), |values, value| {
            if values.get(&id("password")) != value {
                Err("password mismatch".to_string())
            } else {
                Ok(())
            }
        })
        .expect("register validator");

    controller
        .set(&id("confirm_password"), json!("other"))
        .expect("set mismatching confirmation");
    assert_eq!(
        shown_error(&controller, "confirm_password"),
        Some("password mismatch".to_string())
    );

    controller
        .set(&id("confirm_password"), json!("pass"))
        .expect("set matching confirmation");
    assert_eq!(shown_error(&controller, "confirm_password"), None);
}

#[test]
fn check_form_does_not_publish_errors() {
    let controller = controller(FormOptions::default());
    controller.set(&id("email"), json!("")).expect("set");

    assert!(!controller.check_form().expect("check form"));
    assert!(controller.snapshot().expect("snapshot").errors().is_empty());
}

#[test]
fn submit_state_transitions_are_enforced() {
    let controller = controller(FormOptions::default());
    let submit_count = Arc::new(AtomicUsize::new(0));

    controller
        .set(&id("email"), json!(""))
        .expect("set invalid email");
    {
        let submit_count = submit_count.clone();
        controller
            .submit(move |_values| {
                submit_count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .expect("submit should return Ok when validation fails");
    }
    assert_eq!(submit_count.load(Ordering::SeqCst), 0);
    assert_eq!(
        controller.snapshot().expect("snapshot").submit_state,
        SubmitState::Failed
    );

    controller
        .set(&id("email"), json!("valid@example.com"))
        .expect("set valid email");
    {
        let submit_count = submit_count.clone();
        controller
            .submit(move |values| {
                assert_eq!(values[&id("email")], json!("valid@example.com"));
                submit_count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .expect("submit should succeed");
    }
    assert_eq!(submit_count.load(Ordering::SeqCst), 1);
    let snapshot = controller.snapshot().expect("snapshot");
    assert_eq!(snapshot.submit_state, SubmitState::Succeeded);
    assert_eq!(snapshot.submit_count, 2);
}

#[test]
fn nested_submit_is_rejected() {
    let controller = controller(FormOptions::default());
    let inner = controller.clone();
    controller
        .submit(move |_| {
            assert_eq!(inner.submit(|_| Ok(())), Err(FormError::AlreadySubmitting));
            Ok(())
        })
        .expect("outer submit");
}

#[test]
fn async_registered_validator_is_debounced_with_latest_ticket_wins() {
    let controller = controller(on_change());
    controller
        .register_async_field_validator_with_debounce(id("email"), 30, |values| async move {
            let email = values
                .get(&FieldId::new("email"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if email.contains("bad") {
                Err("email invalid".to_string())
            } else {
                Ok(())
            }
        })
        .expect("register async validator");

    let first = {
        let controller = controller.clone();
        thread::spawn(move || {
            block_on(controller.set_async(&FieldId::new("email"), json!("bad@example.com")))
                .expect("first set");
        })
    };
    thread::sleep(Duration::from_millis(5));
    let second = {
        let controller = controller.clone();
        thread::spawn(move || {
            block_on(controller.set_async(&FieldId::new("email"), json!("good@example.com")))
                .expect("second set");
        })
    };

    first.join().expect("first thread joins");
    second.join().expect("second thread joins");

    let snapshot = controller.snapshot().expect("snapshot");
    let meta = snapshot.field_meta.get(&id("email")).expect("email meta");
    assert!(meta.errors.is_empty());
    assert!(!meta.validating);
    assert_eq!(snapshot.values[&id("email")], json!("good@example.com"));
}

#[test]
fn validate_form_async_runs_registered_async_validators() {
    let controller = controller(FormOptions::default());
    controller
        .register_async_field_validator(id("password"), |values| async move {
            match values.get(&FieldId::new("password")) {
                Some(Value::String(password)) if password.len() >= 8 => Ok(()),
                _ => Err("too weak".to_string()),
            }
        })
        .expect("register async validator");

    let valid = block_on(controller.validate_form_async()).expect("validate async");
    assert!(!valid);
    let snapshot = controller.snapshot().expect("snapshot");
    assert_eq!(
        snapshot
            .field_meta
            .get(&id("password"))
            .expect("password meta")
            .errors,
        vec!["too weak".to_string()]
    );
}

#[test]
fn submit_async_waits_for_async_validation() {
    let controller = controller(FormOptions::default());
    controller
        .register_async_field_validator(id("email"), |_| async {
            futures_timer::Delay::new(Duration::from_millis(5)).await;
            Ok(())
        })
        .expect("register async validator");

    let submitted = Arc::new(AtomicUsize::new(0));
    let counter = submitted.clone();
    block_on(controller.submit_async(move |values| async move {
        assert!(values.contains_key(&FieldId::new("email")));
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }))
    .expect("submit async");
    assert_eq!(submitted.load(Ordering::SeqCst), 1);
}

#[test]
fn reset_restores_defaults_and_clears_annotations() {
    let controller = controller(on_change());
    controller
        .register_field(
            id("nickname"),
            FieldValidation::new(ValueType::String, Vec::new()),
            None,
        )
        .expect("register nickname");

    controller.set(&id("email"), json!("")).expect("set email");
    controller.set(&id("nickname"), json!("ace")).expect("set nickname");
    controller
        .set_warning(id("password"), "reused password")
        .expect("warning");
    controller.submit(|_| Ok(())).expect("submit");

    controller.reset().expect("reset");
    let first = controller.snapshot().expect("snapshot");
    controller.reset().expect("reset twice");
    let second = controller.snapshot().expect("snapshot");

    assert_eq!(first.values, second.values);
    assert_eq!(first.values[&id("email")], json!("user@example.com"));
    assert!(!first.values.contains_key(&id("nickname")));
    assert!(first.warnings.is_empty());
    assert!(first.errors().is_empty());
    assert_eq!(first.submit_count, 0);
    assert_eq!(first.submit_state, SubmitState::Idle);
    assert!(!first.is_dirty);
}

#[test]
fn field_state_exposes_binding_props() {
    let controller = controller(on_change());
    controller.set(&id("email"), json!("")).expect("set");
    controller.set_warning(id("email"), "check spelling").expect("warning");

    let state = controller.field_state(&id("email")).expect("field state");
    assert_eq!(state.value, Some(json!("")));
    assert_eq!(state.error.as_deref(), Some("required"));
    assert_eq!(state.warning.as_deref(), Some("check spelling"));
    assert!(state.dirty);
    assert!(!state.touched);
}

#[test]
fn two_hundred_fields_update_invokes_single_validator_path() {
    let invoke_count = Arc::new(AtomicUsize::new(0));
    let controller = FormController::new(on_change(), Validator::default());

    for index in 0..200 {
        let key = id(&format!("field-{index}"));
        controller
            .register_field(
                key.clone(),
                FieldValidation::new(ValueType::String, Vec::new()),
                Some(json!("")),
            )
            .expect("register field");
        let counter = invoke_count.clone();
        controller
            .register_field_validator(key, move |_values, _value| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .expect("register validator");
    }

    let target = id("field-137");
    controller
        .set(&target, json!("changed"))
        .expect("update single field");

    let snapshot = controller.snapshot().expect("snapshot");
    assert_eq!(invoke_count.load(Ordering::SeqCst), 1);
    assert_eq!(snapshot.field_meta.len(), 200);
    assert!(snapshot.field_meta[&target].errors.is_empty());
    assert_eq!(snapshot.field_meta[&target].phase, ValidationPhase::Validated);
}
