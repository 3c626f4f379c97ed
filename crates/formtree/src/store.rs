#![forbid(unsafe_code)]

//! The form store: one immutable snapshot, replaced by dispatching actions.
//!
//! # Reducer
//!
//! | Action      | Visits                     | Effect per field                                        |
//! |-------------|----------------------------|---------------------------------------------------------|
//! | `Mount`     | every field, children first | unmounted fields: snapshot input, validate             |
//! | `Change`    | targeted fields + ancestors | revalidate unless input and touched state are unchanged |
//! | `Submit`    | every field, children first | revalidate (external issues kept), mark submitted      |
//! | `Reset`     | every field, children first | new initial snapshot, clear flags, revalidate          |
//! | `SetIssues` | every field                 | merge external issues addressed to the field's path    |
//! | `SetFields` | the new tree                | reconcile states by identity, prune removed fields     |
//!
//! A field's input is the entries under its name plus the resolved value of
//! its children. If any child is unresolved the field is not validated and
//! its status is unknown (no value, no issues).
//!
//! `SetFields` unmounts every container whose descendants changed shape, so
//! a removed child's value cannot survive in its parent's value. The next
//! `Change` or `Submit` validates it again.
//!
//! # Failure policy
//!
//! Reducer errors are structural (a field reused at two paths, missing
//! state). [`FormStore::dispatch`] logs them and keeps the previous snapshot;
//! it never returns an error. Subscribers run only when the snapshot changes.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use formtree_core::{FieldKey, KeyedMap, KeyedMapDraft, Path};
use indexmap::IndexMap;

use crate::error::FormError;
use crate::field::{Field, FieldInput, Validation};
use crate::issue::{Issue, Issues, IssuesItem};
use crate::state::{FieldState, FormState};
use crate::tree::FieldTree;
use crate::value::{FormData, Value};

type StatesDraft = KeyedMapDraft<FieldKey, FieldState>;

/// Identifier returned by [`FormStore::subscribe`].
pub type SubscriptionId = u64;

type Listener = Box<dyn Fn(&Arc<FormState>)>;

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// New tree for `SetFields`: a replacement or a function of the current tree.
pub enum FieldsUpdate {
    /// Use this tree as is.
    Replace(FieldTree),
    /// Derive the new tree from the current one.
    Update(Box<dyn FnOnce(&FieldTree) -> FieldTree>),
}

impl FieldsUpdate {
    /// Box `f` as a [`FieldsUpdate::Update`].
    #[must_use]
    pub fn update(f: impl FnOnce(&FieldTree) -> FieldTree + 'static) -> Self {
        Self::Update(Box::new(f))
    }
}

impl From<FieldTree> for FieldsUpdate {
    fn from(tree: FieldTree) -> Self {
        Self::Replace(tree)
    }
}

/// Input to [`FormStore::dispatch`]. Each variant produces a new snapshot,
/// or the same one when nothing changed.
pub enum Action {
    /// Snapshot and validate every field not yet mounted.
    Mount {
        /// Current entries of the form target.
        data: FormData,
    },
    /// Revalidate fields whose input or touched flag changed.
    Change {
        /// Current entries of the form target.
        data: FormData,
        /// Mark the revalidated fields touched.
        touched: bool,
        /// Fields to reconsider (with their ancestors). `None` reconsiders
        /// every field.
        fields: Option<Vec<FieldKey>>,
    },
    /// Revalidate everything and mark every field submitted.
    Submit {
        /// Submitted entries.
        data: FormData,
    },
    /// Take `data` as the new initial snapshot and clear all flags.
    Reset {
        /// Entries after the target was reset.
        data: FormData,
    },
    /// Merge issues from outside (usually a server) into matching fields.
    SetIssues {
        /// Issues addressed by form-relative path.
        issues: Issues,
    },
    /// Replace the field tree and reconcile states by field identity.
    SetFields(FieldsUpdate),
}

impl Action {
    /// Short name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mount { .. } => "Mount",
            Self::Change { .. } => "Change",
            Self::Submit { .. } => "Submit",
            Self::Reset { .. } => "Reset",
            Self::SetIssues { .. } => "SetIssues",
            Self::SetFields(_) => "SetFields",
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mount { data } | Self::Submit { data } | Self::Reset { data } => f
                .debug_struct(self.name())
                .field("entries", &data.len())
                .finish(),
            Self::Change {
                data,
                touched,
                fields,
            } => f
                .debug_struct("Change")
                .field("entries", &data.len())
                .field("touched", touched)
                .field("fields", fields)
                .finish(),
            Self::SetIssues { issues } => f
                .debug_struct("SetIssues")
                .field("items", &issues.len())
                .finish(),
            Self::SetFields(FieldsUpdate::Replace(tree)) => {
                f.debug_tuple("SetFields").field(tree).finish()
            }
            Self::SetFields(FieldsUpdate::Update(_)) => f.write_str("SetFields(<updater>)"),
        }
    }
}

// ---------------------------------------------------------------------------
// FormStore
// ---------------------------------------------------------------------------

/// Holds the current [`FormState`] snapshot and the listeners notified when
/// a dispatch replaces it.
pub struct FormStore {
    form_name: String,
    state: Arc<FormState>,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: SubscriptionId,
}

impl fmt::Debug for FormStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormStore")
            .field("form_name", &self.form_name)
            .field("states", &self.state.states.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl FormStore {
    /// Build the initial snapshot: one unmounted state per field.
    ///
    /// `issues` are matched against form-relative paths and seed the
    /// matching fields as externally issued.
    pub fn new(
        form_name: impl Into<String>,
        fields: FieldTree,
        issues: Option<&Issues>,
    ) -> Result<Self, FormError> {
        let form_name = form_name.into();
        let state = initial_state(&form_name, &fields, issues)?;
        tracing::debug!(form = %form_name, states = state.states.len(), "form store created");
        Ok(Self {
            form_name,
            state: Arc::new(state),
            listeners: Vec::new(),
            next_subscription: 1,
        })
    }

    /// First key of every field name.
    #[must_use]
    pub fn form_name(&self) -> &str {
        &self.form_name
    }

    /// The current snapshot.
    #[must_use]
    pub fn state(&self) -> &Arc<FormState> {
        &self.state
    }

    /// The tree as the caller supplied it (without the implicit root group).
    #[must_use]
    pub fn tree(&self) -> FieldTree {
        self.state.tree()
    }

    /// Run the reducer and return the resulting snapshot.
    ///
    /// On a reducer error the previous snapshot is kept and returned.
    pub fn dispatch(&mut self, action: Action) -> Arc<FormState> {
        let action_name = action.name();
        let _span = tracing::trace_span!(
            "form_dispatch",
            form = %self.form_name,
            action = action_name
        )
        .entered();

        match reduce(&self.form_name, &self.state, action) {
            Ok(next) => {
                if !Arc::ptr_eq(&next, &self.state) {
                    tracing::debug!(
                        form = %self.form_name,
                        action = action_name,
                        states = next.states.len(),
                        "form state committed"
                    );
                    self.state = next;
                    for (_, listener) in &self.listeners {
                        listener(&self.state);
                    }
                }
            }
            Err(error) => {
                tracing::error!(
                    form = %self.form_name,
                    action = action_name,
                    error = %error,
                    "form reducer failed, keeping previous state"
                );
            }
        }
        Arc::clone(&self.state)
    }

    /// Call `listener` after every dispatch that changes the snapshot.
    pub fn subscribe(&mut self, listener: impl Fn(&Arc<FormState>) + 'static) -> SubscriptionId {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sub, _)| *sub != id);
        self.listeners.len() != before
    }

    /// Drop every subscription.
    pub fn remove_all_listeners(&mut self) {
        self.listeners.clear();
    }

    /// True if any field is unmounted or carries issues.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        let found = Cell::new(false);
        let states = &self.state.states;
        FieldTree::from(self.state.root_field.clone()).traverse(|field, _path, next| {
            if found.get() {
                return;
            }
            if states.get(&field.key()).is_none_or(FieldState::has_error) {
                found.set(true);
                return;
            }
            next.descend();
        });
        found.get()
    }

    /// The root value.
    pub fn value(&self) -> Result<Value, FormError> {
        let root = self.root_state()?;
        if !root.is_mounted {
            return Err(FormError::GetValueUnmountedForm {
                form: self.form_name.clone(),
            });
        }
        root.value.clone().ok_or_else(|| FormError::GetValueUnresolved {
            form: self.form_name.clone(),
        })
    }

    /// Issues per field, children before parents. Unmounted fields report
    /// `FieldNotMounted`.
    pub fn issues(&self) -> Result<Issues, FormError> {
        let items = RefCell::new(Vec::new());
        let states = &self.state.states;
        FieldTree::from(self.state.root_field.clone())
            .traverse(|field, path, next| -> Result<(), FormError> {
                next.descend().into_iter().collect::<Result<Vec<()>, _>>()?;
                let state = states
                    .get(&field.key())
                    .ok_or(FormError::MissingFieldState { key: field.key() })?;
                if !state.is_mounted {
                    items
                        .borrow_mut()
                        .push(IssuesItem::new(path.to_raw(), vec![Issue::FieldNotMounted]));
                } else if let Some(issues) = &state.issues {
                    items
                        .borrow_mut()
                        .push(IssuesItem::new(path.to_raw(), issues.clone()));
                }
                Ok(())
            })
            .into_iter()
            .collect::<Result<Vec<()>, _>>()?;
        Ok(items.into_inner())
    }

    /// Every field with its state, in traversal order.
    #[must_use]
    pub fn debug_state(&self) -> Vec<(Field, Option<FieldState>)> {
        FieldTree::from(self.state.root_field.clone())
            .fields()
            .into_iter()
            .map(|(field, _)| {
                let state = self.state.states.get(&field.key()).cloned();
                (field, state)
            })
            .collect()
    }

    /// Emit [`debug_state`](Self::debug_state) as `debug` events.
    pub fn log_debug_state(&self) {
        tracing::debug!(form = %self.form_name, tree = ?self.state.root_field, "form fields");
        for (field, state) in self.debug_state() {
            match state {
                Some(state) => tracing::debug!(
                    form = %self.form_name,
                    key = %field.key(),
                    kind = field.kind(),
                    name = %state.name,
                    mounted = state.is_mounted,
                    touched = state.is_touched,
                    dirty = state.is_dirty,
                    submitted = state.is_submitted,
                    value = ?state.value,
                    issues = ?state.issues,
                    "field state"
                ),
                None => tracing::debug!(
                    form = %self.form_name,
                    key = %field.key(),
                    kind = field.kind(),
                    "field without state"
                ),
            }
        }
    }

    fn root_state(&self) -> Result<&FieldState, FormError> {
        let key = self.state.root_field.key();
        self.state
            .states
            .get(&key)
            .ok_or(FormError::MissingFieldState { key })
    }
}

// ---------------------------------------------------------------------------
// Reducer
// ---------------------------------------------------------------------------

fn reduce(form_name: &str, state: &Arc<FormState>, action: Action) -> Result<Arc<FormState>, FormError> {
    match action {
        Action::Mount { data } => update_states(state, |draft, root| {
            for_each_bottom_up(root, |field| {
                let prev = get_state(draft, field)?;
                if prev.is_mounted {
                    return Ok(());
                }
                let input = get_input(draft, field, &data)?;
                let mut next = (*prev).clone();
                next.initial_raw = input.clone();
                next.raw = input.clone();
                next.is_dirty = false;
                next.is_mounted = true;
                next.is_touched = false;
                if !prev.has_external_issues {
                    apply_outcome(&mut next, run_validate(field, input.as_ref()), false);
                }
                draft.borrow_mut().set(field.key(), Arc::new(next));
                Ok(())
            })
        }),

        Action::Change {
            data,
            touched,
            fields,
        } => {
            let forced: Option<HashSet<FieldKey>> = fields.map(|keys| keys.into_iter().collect());
            update_states(state, |draft, root| {
                FieldTree::from(root.clone())
                    .traverse(|field, _path, next| -> Result<bool, FormError> {
                        let children_updated = next
                            .descend()
                            .into_iter()
                            .collect::<Result<Vec<bool>, _>>()?
                            .contains(&true);
                        let forced_here = forced
                            .as_ref()
                            .is_none_or(|keys| keys.contains(&field.key()));
                        if !forced_here && !children_updated {
                            return Ok(false);
                        }
                        let input = get_input(draft, field, &data)?;
                        let prev = get_state(draft, field)?;
                        if prev.is_mounted && prev.is_touched == touched && prev.raw == input {
                            return Ok(false);
                        }
                        let outcome = run_validate(field, input.as_ref());
                        let mut next = (*prev).clone();
                        next.is_touched = prev.is_touched || touched;
                        next.has_external_issues = false;
                        apply_input(&mut next, input);
                        let is_touched = next.is_touched;
                        apply_outcome(&mut next, outcome, is_touched);
                        draft.borrow_mut().set(field.key(), Arc::new(next));
                        Ok(true)
                    })
                    .into_iter()
                    .collect::<Result<Vec<bool>, _>>()
                    .map(drop)
            })
        }

        Action::Submit { data } => update_states(state, |draft, root| {
            for_each_bottom_up(root, |field| {
                let prev = get_state(draft, field)?;
                if prev.has_external_issues {
                    // External issues stand until the field changes.
                    if !prev.is_mounted {
                        let input = get_input(draft, field, &data)?;
                        let mut next = (*prev).clone();
                        apply_input(&mut next, input);
                        next.is_mounted = true;
                        next.is_submitted = true;
                        draft.borrow_mut().set(field.key(), Arc::new(next));
                    }
                    return Ok(());
                }
                let input = get_input(draft, field, &data)?;
                let outcome = run_validate(field, input.as_ref());
                let mut next = (*prev).clone();
                next.is_submitted = true;
                apply_input(&mut next, input);
                next.is_mounted = true;
                apply_outcome(&mut next, outcome, true);
                draft.borrow_mut().set(field.key(), Arc::new(next));
                Ok(())
            })
        }),

        Action::Reset { data } => update_states(state, |draft, root| {
            for_each_bottom_up(root, |field| {
                let prev = get_state(draft, field)?;
                let input = get_input(draft, field, &data)?;
                let outcome = run_validate(field, input.as_ref());
                let mut next = (*prev).clone();
                next.initial_raw = input.clone();
                next.raw = input;
                next.is_dirty = false;
                next.is_mounted = true;
                next.is_touched = false;
                next.is_submitted = false;
                next.has_external_issues = false;
                apply_outcome(&mut next, outcome, false);
                draft.borrow_mut().set(field.key(), Arc::new(next));
                Ok(())
            })
        }),

        Action::SetIssues { issues } => update_states(state, |draft, root| {
            FieldTree::from(root.clone())
                .traverse(|field, path, next| -> Result<(), FormError> {
                    next.descend().into_iter().collect::<Result<Vec<()>, _>>()?;
                    let Some(incoming) = issues_at(&issues, path) else {
                        return Ok(());
                    };
                    let prev = get_state(draft, field)?;
                    let mut merged = prev.issues.clone().unwrap_or_default();
                    merged.extend(incoming);
                    let mut next = (*prev).clone();
                    next.value = None;
                    next.is_submitted = true;
                    next.is_touched = true;
                    next.touched_issues = Some(merged.clone());
                    next.issues = Some(merged);
                    next.has_external_issues = true;
                    draft.borrow_mut().set(field.key(), Arc::new(next));
                    Ok(())
                })
                .into_iter()
                .collect::<Result<Vec<()>, _>>()
                .map(drop)
        }),

        Action::SetFields(update) => set_fields(form_name, state, update),
    }
}

fn set_fields(
    form_name: &str,
    state: &Arc<FormState>,
    update: FieldsUpdate,
) -> Result<Arc<FormState>, FormError> {
    let prev_tree = state.tree();
    let next_tree = match update {
        FieldsUpdate::Replace(tree) => tree,
        FieldsUpdate::Update(f) => f(&prev_tree),
    };
    if next_tree.ptr_eq(&prev_tree) {
        return Ok(Arc::clone(state));
    }

    // An implicit root group keeps its identity across reshapes.
    let (root, wrapped) = match next_tree {
        FieldTree::Field(field) => (field, false),
        other if state.root_field_wrapped => (state.root_field.replace_children(other), true),
        other => other.wrap(),
    };

    let draft = RefCell::new(state.states.draft());
    // Fields that are new or whose keys or path changed. Children are
    // visited first, so ancestors see every reshaped descendant.
    let reshaped: RefCell<HashSet<FieldKey>> = RefCell::new(HashSet::new());
    let live = traverse_with_keys(form_name, &root, |field, path, keys| {
        let prev = draft.borrow().get(&field.key());
        let next = match prev {
            None => {
                reshaped.borrow_mut().insert(field.key());
                Arc::new(FieldState::new(field, path.clone(), Arc::clone(keys), None))
            }
            Some(prev) => {
                let same_keys = *prev.keys == **keys;
                let same_path = prev.path == *path;
                let below_reshaped = {
                    let reshaped = reshaped.borrow();
                    keys.iter()
                        .any(|key| *key != field.key() && reshaped.contains(key))
                };
                if same_keys && same_path && !below_reshaped {
                    prev
                } else {
                    let mut next = (*prev).clone();
                    if !same_keys {
                        next.keys = Arc::clone(keys);
                    }
                    if !same_path {
                        next.path = path.clone();
                        next.name = path.serialize().to_string();
                    }
                    if !same_keys || below_reshaped {
                        unmount_outcome(&mut next);
                    }
                    if !same_keys || !same_path {
                        reshaped.borrow_mut().insert(field.key());
                    }
                    Arc::new(next)
                }
            }
        };
        draft.borrow_mut().set(field.key(), next);
        Ok(())
    })?;

    let mut draft = draft.into_inner();
    let stale: Vec<FieldKey> = state
        .states
        .keys()
        .filter(|key| !live.contains(key))
        .copied()
        .collect();
    for key in &stale {
        draft.delete(key);
    }
    if !stale.is_empty() {
        tracing::trace!(form = form_name, removed = stale.len(), "pruned field states");
    }

    Ok(Arc::new(FormState {
        root_field: root,
        root_field_wrapped: wrapped,
        states: draft.commit(live.iter().copied()),
    }))
}

fn initial_state(form_name: &str, fields: &FieldTree, issues: Option<&Issues>) -> Result<FormState, FormError> {
    let (root, wrapped) = fields.wrap();
    let draft = RefCell::new(KeyedMap::<FieldKey, FieldState>::new().draft());
    let live = traverse_with_keys(form_name, &root, |field, path, keys| {
        let seeded = issues.and_then(|issues| issues_at(issues, &path.shift()));
        let state = FieldState::new(field, path.clone(), Arc::clone(keys), seeded);
        draft.borrow_mut().set(field.key(), Arc::new(state));
        Ok(())
    })?;
    Ok(FormState {
        root_field: root,
        root_field_wrapped: wrapped,
        states: draft.into_inner().commit(live.iter().copied()),
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Run `update` against a draft of the states and commit. Returns the same
/// snapshot when nothing changed.
fn update_states(
    state: &Arc<FormState>,
    update: impl FnOnce(&RefCell<StatesDraft>, &Field) -> Result<(), FormError>,
) -> Result<Arc<FormState>, FormError> {
    let draft = RefCell::new(state.states.draft());
    update(&draft, &state.root_field)?;
    let draft = draft.into_inner();
    let root_key = state.root_field.key();
    let root = draft
        .get(&root_key)
        .ok_or(FormError::MissingFieldState { key: root_key })?;
    let next = draft.commit(root.keys.iter().copied());
    if next.ptr_eq(&state.states) {
        return Ok(Arc::clone(state));
    }
    Ok(Arc::new(FormState {
        root_field: state.root_field.clone(),
        root_field_wrapped: state.root_field_wrapped,
        states: next,
    }))
}

/// Visit every field below `root` (inclusive), children before parents.
fn for_each_bottom_up(
    root: &Field,
    visit: impl Fn(&Field) -> Result<(), FormError>,
) -> Result<(), FormError> {
    FieldTree::from(root.clone())
        .traverse(|field, _path, next| -> Result<(), FormError> {
            next.descend().into_iter().collect::<Result<Vec<()>, _>>()?;
            visit(field)
        })
        .into_iter()
        .collect()
}

struct Collected {
    path: Path,
    keys: Arc<HashSet<FieldKey>>,
}

/// Traverse with form-prefixed paths, handing each field the set of its own
/// and its descendants' keys. Returns the root's key set.
fn traverse_with_keys(
    form_name: &str,
    root: &Field,
    visit: impl Fn(&Field, &Path, &Arc<HashSet<FieldKey>>) -> Result<(), FormError>,
) -> Result<Arc<HashSet<FieldKey>>, FormError> {
    let collected = FieldTree::from(root.clone())
        .traverse(|field, path, next| -> Result<Collected, FormError> {
            let children = next
                .descend()
                .into_iter()
                .collect::<Result<Vec<Collected>, _>>()?;
            let form_path = path.prepend([form_name]);
            let mut seen: HashMap<FieldKey, Path> = HashMap::new();
            seen.insert(field.key(), form_path.clone());
            for child in &children {
                for key in child.keys.iter() {
                    if let Some(first) = seen.get(key) {
                        return Err(FormError::DuplicateKey {
                            key: *key,
                            first: first.clone(),
                            second: child.path.clone(),
                        });
                    }
                    seen.insert(*key, child.path.clone());
                }
            }
            let keys = Arc::new(seen.into_keys().collect::<HashSet<_>>());
            visit(field, &form_path, &keys)?;
            Ok(Collected {
                path: form_path,
                keys,
            })
        })
        .into_iter()
        .collect::<Result<Vec<Collected>, _>>()?;
    collected
        .into_iter()
        .next()
        .map(|root| root.keys)
        .ok_or(FormError::MissingFieldState { key: root.key() })
}

fn get_state(draft: &RefCell<StatesDraft>, field: &Field) -> Result<Arc<FieldState>, FormError> {
    draft
        .borrow()
        .get(&field.key())
        .ok_or(FormError::MissingFieldState { key: field.key() })
}

/// Resolved value of a subtree, or `None` if any field in it is unresolved.
fn tree_value(draft: &StatesDraft, tree: &FieldTree) -> Result<Option<Value>, FormError> {
    match tree {
        FieldTree::Null => Ok(Some(Value::Null)),
        FieldTree::Field(field) => {
            let state = draft
                .get(&field.key())
                .ok_or(FormError::MissingFieldState { key: field.key() })?;
            Ok(state.resolved_value().cloned())
        }
        FieldTree::List(items) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                match tree_value(draft, item)? {
                    Some(value) => values.push(value),
                    None => return Ok(None),
                }
            }
            Ok(Some(Value::List(values)))
        }
        FieldTree::Record(entries) => {
            let mut values = IndexMap::with_capacity(entries.len());
            for (key, item) in entries {
                match tree_value(draft, item)? {
                    Some(value) => {
                        values.insert(key.clone(), value);
                    }
                    None => return Ok(None),
                }
            }
            Ok(Some(Value::Record(values)))
        }
    }
}

/// The field's input, or `None` while a child is unresolved.
fn get_input(
    draft: &RefCell<StatesDraft>,
    field: &Field,
    data: &FormData,
) -> Result<Option<FieldInput>, FormError> {
    let draft = draft.borrow();
    let state = draft
        .get(&field.key())
        .ok_or(FormError::MissingFieldState { key: field.key() })?;
    let values = data.get_all(&state.name).to_vec();
    Ok(tree_value(&draft, field.children())?.map(|children| FieldInput::new(values, children)))
}

enum Outcome {
    Success(Value),
    Error(Vec<Issue>),
    Unknown,
}

fn run_validate(field: &Field, input: Option<&FieldInput>) -> Outcome {
    let Some(input) = input else {
        return Outcome::Unknown;
    };
    match field.run_guarded(input) {
        Validation::Success(value) => Outcome::Success(value),
        Validation::Failure(issues) if issues.is_empty() => Outcome::Unknown,
        Validation::Failure(issues) => Outcome::Error(issues),
    }
}

fn apply_outcome(state: &mut FieldState, outcome: Outcome, is_touched: bool) {
    match outcome {
        Outcome::Success(value) => {
            state.value = Some(value);
            state.issues = None;
            state.touched_issues = None;
        }
        Outcome::Error(issues) => {
            state.value = None;
            state.touched_issues = is_touched.then(|| issues.clone());
            state.issues = Some(issues);
        }
        Outcome::Unknown => {
            state.value = None;
            state.issues = None;
            state.touched_issues = None;
        }
    }
}

/// Drop a container's outcome after its children changed shape. The field
/// counts as unmounted until the next `Change` or `Submit` revalidates it.
fn unmount_outcome(state: &mut FieldState) {
    state.value = None;
    state.is_mounted = false;
    if !state.has_external_issues {
        state.issues = None;
        state.touched_issues = None;
    }
}

/// Record a new input snapshot. Unresolved input leaves the state as is.
fn apply_input(state: &mut FieldState, input: Option<FieldInput>) {
    let Some(input) = input else {
        return;
    };
    if !state.is_mounted {
        state.is_mounted = true;
        state.initial_raw = Some(input.clone());
        state.raw = Some(input);
        state.is_dirty = false;
        return;
    }
    if state.raw.as_ref() == Some(&input) {
        return;
    }
    state.is_dirty = state.initial_raw.as_ref() != Some(&input);
    state.raw = Some(input);
}

/// Issues addressed exactly at `path`, or `None` if there are none.
fn issues_at(issues: &Issues, path: &Path) -> Option<Vec<Issue>> {
    let found: Vec<Issue> = issues
        .iter()
        .filter(|item| path.matches(&item.path))
        .flat_map(|item| item.issues.iter().cloned())
        .collect();
    (!found.is_empty()).then_some(found)
}
