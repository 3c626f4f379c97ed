#![forbid(unsafe_code)]

//! Controller: binds a [`FormStore`] to a form target and routes its events.
//!
//! The binding layer (whatever owns the real form elements) implements
//! [`FormTarget`] and forwards [`FormEvent`]s:
//!
//! ```text
//! FormEvent::Submit          -> Submit, then on_submit if there are no errors
//! FormEvent::Change { name } -> Change scoped to the field named `name`
//! FormEvent::Reset           -> Reset, then on_reset
//! ```
//!
//! Change events whose name belongs to another form are ignored.
//!
//! [`validate_form`] runs the same pipeline once, without a target, for
//! validating submitted data on a server.

use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use formtree_core::{FieldKey, Path, PathKey};

use crate::error::FormError;
use crate::field::Field;
use crate::issue::{Issues, IssuesBuilder};
use crate::state::FormState;
use crate::store::{Action, FieldsUpdate, FormStore, SubscriptionId};
use crate::tree::FieldTree;
use crate::value::{FormData, Value};

/// Called with the validated value and the submitted data.
pub type OnSubmit = Box<dyn FnMut(&Value, &FormData, &mut SubmitOutcome)>;
/// Called after the form was reset.
pub type OnReset = Box<dyn FnMut()>;

// ---------------------------------------------------------------------------
// Target and events
// ---------------------------------------------------------------------------

/// The form element a controller is mounted on.
pub trait FormTarget {
    /// Current entries of the form.
    fn form_data(&self) -> FormData;

    /// Restore the elements to their initial values. The binding layer is
    /// expected to forward a [`FormEvent::Reset`] afterwards.
    fn reset(&self) {}
}

/// Events the binding layer forwards from the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
    /// The target was submitted.
    Submit,
    /// An element named `name` changed.
    Change { name: String },
    /// The target was reset.
    Reset,
}

/// What a submit asked the binding layer to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// Set when the form has errors, or by the handler.
    pub prevent_default: bool,
    /// Set by the handler.
    pub stop_propagation: bool,
    /// Reset the target after submitting.
    pub reset: bool,
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration for a [`FormController`].
pub struct ControllerOptions {
    /// First path key of every field name in this form.
    pub form_name: String,
    /// Tree the store starts from.
    pub initial_fields: FieldTree,
    /// Issues to seed, addressed by form-relative paths.
    pub initial_issues: Option<Issues>,
    /// Runs on every submit of a valid form.
    pub on_submit: Option<OnSubmit>,
    /// Runs after every reset.
    pub on_reset: Option<OnReset>,
    /// Dispatch `Mount` when a target is attached.
    pub validate_on_mount: bool,
}

impl ControllerOptions {
    #[must_use]
    pub fn new(form_name: impl Into<String>, fields: impl Into<FieldTree>) -> Self {
        Self {
            form_name: form_name.into(),
            initial_fields: fields.into(),
            initial_issues: None,
            on_submit: None,
            on_reset: None,
            validate_on_mount: true,
        }
    }

    #[must_use]
    pub fn with_initial_issues(mut self, issues: Issues) -> Self {
        self.initial_issues = Some(issues);
        self
    }

    #[must_use]
    pub fn with_on_submit(
        mut self,
        on_submit: impl FnMut(&Value, &FormData, &mut SubmitOutcome) + 'static,
    ) -> Self {
        self.on_submit = Some(Box::new(on_submit));
        self
    }

    #[must_use]
    pub fn with_on_reset(mut self, on_reset: impl FnMut() + 'static) -> Self {
        self.on_reset = Some(Box::new(on_reset));
        self
    }

    #[must_use]
    pub fn with_validate_on_mount(mut self, enabled: bool) -> Self {
        self.validate_on_mount = enabled;
        self
    }
}

impl fmt::Debug for ControllerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerOptions")
            .field("form_name", &self.form_name)
            .field("initial_fields", &self.initial_fields)
            .field("initial_issues", &self.initial_issues)
            .field("on_submit", &self.on_submit.is_some())
            .field("on_reset", &self.on_reset.is_some())
            .field("validate_on_mount", &self.validate_on_mount)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Outcome of validating the whole form.
///
/// Both variants carry the tree and an [`IssuesBuilder`] over it, so callers
/// can attach their own issues (e.g. "name already taken") after the fact.
#[derive(Debug, Clone)]
pub enum FormResult {
    /// Every field resolved; `value` is the root value.
    Success {
        value: Value,
        fields: FieldTree,
        custom_issues: IssuesBuilder,
    },
    /// Some field is unmounted or has issues.
    Failure {
        issues: Issues,
        fields: FieldTree,
        custom_issues: IssuesBuilder,
    },
}

impl FormResult {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Success { value, .. } => Some(value),
            Self::Failure { .. } => None,
        }
    }

    #[must_use]
    pub fn issues(&self) -> Option<&Issues> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { issues, .. } => Some(issues),
        }
    }

    #[must_use]
    pub fn fields(&self) -> &FieldTree {
        match self {
            Self::Success { fields, .. } | Self::Failure { fields, .. } => fields,
        }
    }

    #[must_use]
    pub fn custom_issues(&self) -> &IssuesBuilder {
        match self {
            Self::Success { custom_issues, .. } | Self::Failure { custom_issues, .. } => {
                custom_issues
            }
        }
    }

    pub fn custom_issues_mut(&mut self) -> &mut IssuesBuilder {
        match self {
            Self::Success { custom_issues, .. } | Self::Failure { custom_issues, .. } => {
                custom_issues
            }
        }
    }
}

// ---------------------------------------------------------------------------
// FormController
// ---------------------------------------------------------------------------

/// Binds a [`FormStore`] to a [`FormTarget`] and routes its events.
pub struct FormController {
    form_name: String,
    store: FormStore,
    target: Option<Rc<dyn FormTarget>>,
    on_submit: Option<OnSubmit>,
    on_reset: Option<OnReset>,
    validate_on_mount: bool,
}

impl fmt::Debug for FormController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormController")
            .field("form_name", &self.form_name)
            .field("store", &self.store)
            .field("mounted", &self.target.is_some())
            .field("validate_on_mount", &self.validate_on_mount)
            .finish()
    }
}

impl FormController {
    /// Fails if `form_name` is not a valid path key or the tree reuses a
    /// field.
    pub fn new(options: ControllerOptions) -> Result<Self, FormError> {
        let ControllerOptions {
            form_name,
            initial_fields,
            initial_issues,
            on_submit,
            on_reset,
            validate_on_mount,
        } = options;
        PathKey::from(form_name.as_str()).validate()?;
        let store = FormStore::new(form_name.clone(), initial_fields, initial_issues.as_ref())?;
        Ok(Self {
            form_name,
            store,
            target: None,
            on_submit,
            on_reset,
            validate_on_mount,
        })
    }

    #[must_use]
    pub fn form_name(&self) -> &str {
        &self.form_name
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &FormStore {
        &self.store
    }

    /// The current snapshot.
    #[must_use]
    pub fn state(&self) -> &Arc<FormState> {
        self.store.state()
    }

    /// See [`FormStore::subscribe`].
    pub fn subscribe(&mut self, listener: impl Fn(&Arc<FormState>) + 'static) -> SubscriptionId {
        self.store.subscribe(listener)
    }

    /// See [`FormStore::unsubscribe`].
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.store.unsubscribe(id)
    }

    /// The current tree, as supplied by the caller.
    #[must_use]
    pub fn fields(&self) -> FieldTree {
        self.store.tree()
    }

    /// A target is attached.
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.target.is_some()
    }

    /// Replace the submit handler.
    pub fn set_on_submit(&mut self, on_submit: impl FnMut(&Value, &FormData, &mut SubmitOutcome) + 'static) {
        self.on_submit = Some(Box::new(on_submit));
    }

    /// Attach external issues (e.g. from a server) by form-relative path.
    pub fn set_issues(&mut self, issues: Issues) {
        self.store.dispatch(Action::SetIssues { issues });
    }

    /// Reshape the tree. Fields that keep their identity keep their state.
    pub fn set_fields(&mut self, update: impl Into<FieldsUpdate>) {
        self.store.dispatch(Action::SetFields(update.into()));
    }

    /// Revalidate `fields` (every field when empty) against the target's
    /// current data, without marking them touched.
    pub fn revalidate(&mut self, fields: &[Field]) -> Result<(), FormError> {
        let data = self.target()?.form_data();
        let keys: Option<Vec<FieldKey>> =
            (!fields.is_empty()).then(|| fields.iter().map(Field::key).collect());
        self.store.dispatch(Action::Change {
            data,
            touched: false,
            fields: keys,
        });
        Ok(())
    }

    /// Validate `data` as a submit and run `on_submit` when it is valid.
    pub fn submit(&mut self, data: FormData) -> Result<SubmitOutcome, FormError> {
        let _span = tracing::debug_span!("form_submit", form = %self.form_name).entered();
        self.store.dispatch(Action::Submit { data: data.clone() });
        let mut outcome = SubmitOutcome::default();
        if self.store.has_errors() {
            tracing::debug!(form = %self.form_name, "submit blocked by errors");
            outcome.prevent_default = true;
            return Ok(outcome);
        }
        let value = self.store.value()?;
        if let Some(on_submit) = self.on_submit.as_mut() {
            on_submit(&value, &data, &mut outcome);
        }
        Ok(outcome)
    }

    /// Flatten `json` into named entries and submit them.
    pub fn ingest(&mut self, json: &serde_json::Value) -> Result<SubmitOutcome, FormError> {
        let data = FormData::from_json(&self.form_name, json);
        self.submit(data)
    }

    /// The validated value, or the issues of every failing field.
    pub fn get_result(&self) -> Result<FormResult, FormError> {
        let fields = self.store.tree();
        let custom_issues = IssuesBuilder::new(fields.clone());
        if !self.store.has_errors() {
            let value = self.store.value()?;
            return Ok(FormResult::Success {
                value,
                fields,
                custom_issues,
            });
        }
        let issues = self.store.issues()?;
        Ok(FormResult::Failure {
            issues,
            fields,
            custom_issues,
        })
    }

    /// Attach to `target`. Mounting the same target twice is a no-op;
    /// mounting another one detaches the previous target first.
    pub fn mount(&mut self, target: Rc<dyn FormTarget>) {
        if let Some(current) = &self.target {
            if Rc::ptr_eq(current, &target) {
                return;
            }
            self.unmount();
        }
        tracing::debug!(form = %self.form_name, "form mounted");
        let data = target.form_data();
        self.target = Some(target);
        if self.validate_on_mount {
            self.store.dispatch(Action::Mount { data });
        }
    }

    pub fn unmount(&mut self) {
        if self.target.take().is_some() {
            tracing::debug!(form = %self.form_name, "form unmounted");
        }
    }

    /// Route an event from the mounted target. Returns the submit outcome
    /// for [`FormEvent::Submit`].
    pub fn handle_event(&mut self, event: FormEvent) -> Result<Option<SubmitOutcome>, FormError> {
        match event {
            FormEvent::Submit => {
                let target = self.target()?;
                let outcome = self.submit(target.form_data())?;
                if outcome.reset {
                    target.reset();
                }
                Ok(Some(outcome))
            }
            FormEvent::Change { name } => {
                self.handle_change(&name)?;
                Ok(None)
            }
            FormEvent::Reset => {
                self.handle_reset()?;
                Ok(None)
            }
        }
    }

    fn handle_change(&mut self, name: &str) -> Result<(), FormError> {
        if name.is_empty() {
            return Ok(());
        }
        let Ok(parsed) = Path::parse(name) else {
            tracing::trace!(form = %self.form_name, name, "change with malformed name ignored");
            return Ok(());
        };
        let (head, path) = parsed.split_head();
        match head {
            Some(PathKey::Name(ref form)) if *form == self.form_name => {}
            _ => {
                tracing::trace!(form = %self.form_name, name, "change for another form ignored");
                return Ok(());
            }
        }
        let data = self.target()?.form_data();
        let root = FieldTree::from(self.store.state().root_field.clone());
        let Some(field) = root.find_by_path(&path) else {
            tracing::warn!(form = %self.form_name, name, "change for unknown field ignored");
            return Ok(());
        };
        self.store.dispatch(Action::Change {
            data,
            touched: true,
            fields: Some(vec![field.key()]),
        });
        Ok(())
    }

    fn handle_reset(&mut self) -> Result<(), FormError> {
        let data = self.target()?.form_data();
        self.store.dispatch(Action::Reset { data });
        if let Some(on_reset) = self.on_reset.as_mut() {
            on_reset();
        }
        Ok(())
    }

    fn target(&self) -> Result<Rc<dyn FormTarget>, FormError> {
        self.target.clone().ok_or_else(|| FormError::MissingFormRef {
            form: self.form_name.clone(),
        })
    }
}

/// Validate submitted `data` once, without a target.
///
/// Entries of other forms are ignored. Repeats are sized from the entry
/// names before validating. `on_submit` is not called.
pub fn validate_form(options: ControllerOptions, data: FormData) -> Result<FormResult, FormError> {
    let _span = tracing::debug_span!("validate_form", form = %options.form_name).entered();
    let mut paths = Vec::new();
    for name in data.keys() {
        let Ok(path) = Path::parse(name) else {
            tracing::trace!(form = %options.form_name, name, "skipping malformed entry name");
            continue;
        };
        if let (Some(PathKey::Name(form)), rest) = path.split_head()
            && form == options.form_name
        {
            paths.push(rest);
        }
    }
    let options = ControllerOptions {
        initial_fields: options.initial_fields.restore_from_paths(&paths),
        on_submit: None,
        ..options
    };
    let mut controller = FormController::new(options)?;
    controller.submit(data)?;
    controller.get_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::{Issue, IssuesItem};
    use serde_json::json;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct MemoryTarget {
        data: RefCell<FormData>,
        resets: Cell<u32>,
    }

    impl MemoryTarget {
        fn with(pairs: &[(&str, &str)]) -> Rc<Self> {
            Rc::new(Self {
                data: RefCell::new(pairs.iter().map(|(k, v)| (*k, *v)).collect()),
                resets: Cell::new(0),
            })
        }

        fn set(&self, pairs: &[(&str, &str)]) {
            *self.data.borrow_mut() = pairs.iter().map(|(k, v)| (*k, *v)).collect();
        }
    }

    impl FormTarget for MemoryTarget {
        fn form_data(&self) -> FormData {
            self.data.borrow().clone()
        }

        fn reset(&self) {
            self.resets.set(self.resets.get() + 1);
        }
    }

    fn demo_fields() -> (FieldTree, Field, Field) {
        let (str_field, num_field) = (Field::string(), Field::number());
        let tree = FieldTree::record([
            ("str", str_field.clone().into()),
            ("num", num_field.clone().into()),
        ]);
        (tree, str_field, num_field)
    }

    #[test]
    fn invalid_form_name_is_rejected() {
        let options = ControllerOptions::new("a.b", Field::string());
        assert!(matches!(FormController::new(options), Err(FormError::Path(_))));
    }

    #[test]
    fn operations_needing_a_target_fail_before_mount() {
        let (tree, _, _) = demo_fields();
        let mut controller = FormController::new(ControllerOptions::new("test", tree)).unwrap();
        assert_eq!(
            controller.revalidate(&[]).unwrap_err(),
            FormError::MissingFormRef { form: "test".into() }
        );
        assert!(controller.handle_event(FormEvent::Reset).is_err());
    }

    #[test]
    fn mount_validates_unless_disabled() {
        let (tree, str_field, _) = demo_fields();
        let target = MemoryTarget::with(&[("test.str", "a"), ("test.num", "1")]);

        let mut eager = FormController::new(ControllerOptions::new("test", tree.clone())).unwrap();
        eager.mount(target.clone());
        assert!(eager.state().field_state(&str_field).unwrap().is_mounted);

        let mut lazy = FormController::new(
            ControllerOptions::new("test", tree).with_validate_on_mount(false),
        )
        .unwrap();
        lazy.mount(target);
        assert!(lazy.is_mounted());
        assert!(!lazy.state().field_state(&str_field).unwrap().is_mounted);
    }

    #[test]
    fn remount_same_target_is_a_no_op() {
        let (tree, _, _) = demo_fields();
        let target = MemoryTarget::with(&[("test.str", "a"), ("test.num", "1")]);
        let mut controller = FormController::new(ControllerOptions::new("test", tree)).unwrap();
        controller.mount(target.clone());
        let before = Arc::clone(controller.state());
        controller.mount(target);
        assert!(Arc::ptr_eq(&before, controller.state()));
        controller.unmount();
        assert!(!controller.is_mounted());
    }

    #[test]
    fn malformed_change_names_are_ignored() {
        let (tree, _, _) = demo_fields();
        let target = MemoryTarget::with(&[("test.str", "a"), ("test.num", "1")]);
        let mut controller = FormController::new(ControllerOptions::new("test", tree)).unwrap();
        controller.mount(target.clone());
        let before = Arc::clone(controller.state());
        for name in ["other..str", "test.[0]", "[1"] {
            let outcome = controller.handle_event(FormEvent::Change { name: name.into() });
            assert!(matches!(outcome, Ok(None)), "{name:?} should be ignored");
        }
        assert!(Arc::ptr_eq(&before, controller.state()));
    }

    #[test]
    fn change_events_are_routed_by_name() {
        let (tree, str_field, num_field) = demo_fields();
        let target = MemoryTarget::with(&[("test.str", "a"), ("test.num", "1")]);
        let mut controller = FormController::new(ControllerOptions::new("test", tree)).unwrap();
        controller.mount(target.clone());

        target.set(&[("test.str", "b"), ("test.num", "2")]);
        controller
            .handle_event(FormEvent::Change {
                name: "test.str".into(),
            })
            .unwrap();
        let state = controller.state();
        assert_eq!(
            state.field_state(&str_field).unwrap().value,
            Some(Value::from("b"))
        );
        assert!(state.field_state(&str_field).unwrap().is_touched);
        assert_eq!(
            state.field_state(&num_field).unwrap().value,
            Some(Value::Number(1.0))
        );
    }

    #[test]
    fn foreign_and_unknown_change_events_are_ignored() {
        let (tree, _, _) = demo_fields();
        let target = MemoryTarget::with(&[("test.str", "a"), ("test.num", "1")]);
        let mut controller = FormController::new(ControllerOptions::new("test", tree)).unwrap();
        controller.mount(target);
        let before = Arc::clone(controller.state());
        for name in ["other.str", "test.missing", "", "[0]"] {
            controller
                .handle_event(FormEvent::Change { name: name.into() })
                .unwrap();
        }
        assert!(Arc::ptr_eq(&before, controller.state()));
    }

    #[test]
    fn revalidate_without_fields_touches_nothing() {
        let (tree, str_field, _) = demo_fields();
        let target = MemoryTarget::with(&[("test.str", "a"), ("test.num", "1")]);
        let mut controller = FormController::new(ControllerOptions::new("test", tree)).unwrap();
        controller.mount(target.clone());
        target.set(&[("test.str", "z"), ("test.num", "1")]);
        controller.revalidate(&[]).unwrap();
        let s = controller.state().field_state(&str_field).unwrap();
        assert_eq!(s.value, Some(Value::from("z")));
        assert!(!s.is_touched);
    }

    #[test]
    fn submit_runs_handler_only_when_valid() {
        let (tree, _, _) = demo_fields();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let target = MemoryTarget::with(&[("test.str", "a")]);
        let mut controller = FormController::new(
            ControllerOptions::new("test", tree).with_on_submit(move |value, _, outcome| {
                sink.borrow_mut().push(value.clone());
                outcome.reset = true;
            }),
        )
        .unwrap();
        controller.mount(target.clone());

        let blocked = controller.handle_event(FormEvent::Submit).unwrap().unwrap();
        assert!(blocked.prevent_default);
        assert!(seen.borrow().is_empty());

        target.set(&[("test.str", "a"), ("test.num", "3")]);
        let outcome = controller.handle_event(FormEvent::Submit).unwrap().unwrap();
        assert!(!outcome.prevent_default);
        assert!(outcome.reset);
        assert_eq!(target.resets.get(), 1);
        assert_eq!(seen.borrow()[0].get("num"), Some(&Value::Number(3.0)));
    }

    #[test]
    fn reset_event_calls_on_reset() {
        let (tree, _, _) = demo_fields();
        let resets = Rc::new(Cell::new(0));
        let counter = Rc::clone(&resets);
        let mut controller = FormController::new(
            ControllerOptions::new("test", tree).with_on_reset(move || counter.set(counter.get() + 1)),
        )
        .unwrap();
        controller.mount(MemoryTarget::with(&[]));
        controller.handle_event(FormEvent::Reset).unwrap();
        assert_eq!(resets.get(), 1);
    }

    #[test]
    fn set_on_submit_replaces_handler() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let mut controller =
            FormController::new(ControllerOptions::new("test", Field::string())).unwrap();
        controller.set_on_submit(move |_, _, _| counter.set(counter.get() + 1));
        controller
            .submit(FormData::new().with("test", "hello"))
            .unwrap();
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn ingest_flattens_json() {
        let (tree, _, _) = demo_fields();
        let mut controller = FormController::new(ControllerOptions::new("test", tree)).unwrap();
        let outcome = controller
            .ingest(&json!({ "str": "hello", "num": 42 }))
            .unwrap();
        assert!(!outcome.prevent_default);
        let result = controller.get_result().unwrap();
        assert_eq!(
            result.value().map(Value::to_json),
            Some(json!({ "str": "hello", "num": 42 }))
        );
    }

    #[test]
    fn initial_issues_are_reported() {
        let (tree, _, _) = demo_fields();
        let issue = Issue::custom("taken", "Already used");
        let mut controller = FormController::new(
            ControllerOptions::new("test", tree).with_initial_issues(vec![IssuesItem::new(
                vec![PathKey::from("str")],
                vec![issue.clone()],
            )]),
        )
        .unwrap();
        controller
            .submit(FormData::new().with("test.str", "x").with("test.num", "1"))
            .unwrap();
        let result = controller.get_result().unwrap();
        let issues = result.issues().unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].issues, vec![issue]);
    }

    #[test]
    fn set_fields_then_fields_round_trips() {
        let (tree, _, _) = demo_fields();
        let mut controller = FormController::new(ControllerOptions::new("test", tree)).unwrap();
        let only = Field::checkbox();
        controller.set_fields(FieldTree::record([("only", only.clone().into())]));
        let fields = controller.fields();
        assert_eq!(fields.get("only").and_then(FieldTree::as_field), Some(&only));
    }
}
