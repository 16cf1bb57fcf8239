//! Document lifecycle state machine.
//!
//! ```text
//! New ──BeginSave──▶ Saving(Insert) ──SaveSucceeded──▶ Clean
//!  ▲                       │
//!  └──────SaveFailed───────┘
//! Clean ──BeginSave──▶ Saving(Update) ──SaveSucceeded|SaveFailed──▶ Clean
//! New|Clean ──BeginRemove──▶ Removing ──RemoveSucceeded──▶ Removed
//!                               └──RemoveFailed──▶ (state it left)
//! ```
//!
//! Only a failed insert returns to `New`; a failed update leaves the document `Clean`.

use crate::error::{ModelError, ModelResult};

/// The backend write a save translates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Insert,
    Update,
}

impl WriteKind {
    /// Operation name used in errors and logs.
    pub fn operation(self) -> &'static str {
        match self {
            WriteKind::Insert => "insert",
            WriteKind::Update => "update",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentState {
    /// Never successfully persisted.
    #[default]
    New,
    /// A backend write is in flight.
    Saving(WriteKind),
    /// Persisted and unchanged since the last successful write.
    Clean,
    /// A backend remove is in flight; `was_new` records the state to restore on failure.
    Removing { was_new: bool },
    /// Removed from the backend; no further persistence is possible.
    Removed,
}

/// Events driving [`DocumentState::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    BeginSave,
    SaveSucceeded,
    SaveFailed,
    BeginRemove,
    RemoveSucceeded,
    RemoveFailed,
}

impl DocumentState {
    /// `true` only while the document has never been persisted and no insert is in flight.
    pub fn is_new(&self) -> bool {
        matches!(self, DocumentState::New | DocumentState::Removing { was_new: true })
    }

    pub fn is_removed(&self) -> bool {
        matches!(self, DocumentState::Removed)
    }

    /// Applies `transition`, returning the state that results.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidState`] when the transition is not allowed
    /// from the current state; the state is left untouched.
    pub fn apply(&mut self, transition: Transition) -> ModelResult<DocumentState> {
        use DocumentState::*;
        use Transition::*;

        let next = match (*self, transition) {
            (New, BeginSave) => Saving(WriteKind::Insert),
            (Clean, BeginSave) => Saving(WriteKind::Update),
            (Saving(_), SaveSucceeded) => Clean,
            (Saving(WriteKind::Insert), SaveFailed) => New,
            (Saving(WriteKind::Update), SaveFailed) => Clean,
            (New, BeginRemove) => Removing { was_new: true },
            (Clean, BeginRemove) => Removing { was_new: false },
            (Removing { .. }, RemoveSucceeded) => Removed,
            (Removing { was_new: true }, RemoveFailed) => New,
            (Removing { was_new: false }, RemoveFailed) => Clean,
            (current, transition) => {
                return Err(ModelError::InvalidState(format!(
                    "cannot apply {transition:?} to a document in state {current:?}"
                )));
            }
        };

        *self = next;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_success_reaches_clean() {
        let mut state = DocumentState::New;

        assert_eq!(state.apply(Transition::BeginSave), Ok(DocumentState::Saving(WriteKind::Insert)));
        assert!(!state.is_new());
        assert_eq!(state.apply(Transition::SaveSucceeded), Ok(DocumentState::Clean));
    }

    #[test]
    fn failed_insert_resets_to_new() {
        let mut state = DocumentState::New;
        state.apply(Transition::BeginSave).unwrap();
        state.apply(Transition::SaveFailed).unwrap();

        assert!(state.is_new());
    }

    #[test]
    fn failed_update_stays_clean() {
        let mut state = DocumentState::Clean;
        assert_eq!(state.apply(Transition::BeginSave), Ok(DocumentState::Saving(WriteKind::Update)));
        state.apply(Transition::SaveFailed).unwrap();

        assert_eq!(state, DocumentState::Clean);
        assert!(!state.is_new());
    }

    #[test]
    fn failed_remove_restores_previous_state() {
        let mut state = DocumentState::Clean;
        state.apply(Transition::BeginRemove).unwrap();
        state.apply(Transition::RemoveFailed).unwrap();
        assert_eq!(state, DocumentState::Clean);

        let mut state = DocumentState::New;
        state.apply(Transition::BeginRemove).unwrap();
        state.apply(Transition::RemoveFailed).unwrap();
        assert_eq!(state, DocumentState::New);
    }

    #[test]
    fn removed_documents_reject_everything() {
        let mut state = DocumentState::Clean;
        state.apply(Transition::BeginRemove).unwrap();
        state.apply(Transition::RemoveSucceeded).unwrap();

        assert!(state.is_removed());
        assert!(matches!(state.apply(Transition::BeginSave), Err(ModelError::InvalidState(_))));
        assert!(matches!(state.apply(Transition::BeginRemove), Err(ModelError::InvalidState(_))));
        assert_eq!(state, DocumentState::Removed);
    }

    #[test]
    fn saving_twice_is_rejected() {
        let mut state = DocumentState::New;
        state.apply(Transition::BeginSave).unwrap();

        assert!(state.apply(Transition::BeginSave).is_err());
        assert!(state.apply(Transition::BeginRemove).is_err());
    }
}
