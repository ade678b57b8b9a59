//! Settings panel controllers
//!
//! A panel bridges one store slice and one form: it triggers the slice
//! fetch on mount, projects the slice into initial form values, maps
//! submitted values into a backend payload and exposes a serializable view
//! for the templates.

use serde_derive::Serialize;

use crate::form::{FieldErrors, Submission};
use crate::store::{self, Action, ConsoleState, ConsoleStore, Dispatched};

pub mod alt_upstream;
pub mod clients;
pub mod login;
pub mod rewrites;
pub mod version;

/// Blocking yes/no prompt shown before destructive actions.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Result of a panel submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "errors", rename_all = "snake_case")]
pub enum SubmitOutcome {
    Submitted,
    Invalid(FieldErrors),
    /// Nothing was sent: a request is in flight, the form is pristine, or a
    /// submission was already running.
    Suppressed,
}

impl SubmitOutcome {
    pub(crate) fn from_submission(submission: Submission<store::Result<Dispatched>>) -> store::Result<SubmitOutcome> {
        match submission {
            Submission::Submitted(result) => Ok(match result? {
                Dispatched::Completed => SubmitOutcome::Submitted,
                Dispatched::Suppressed => SubmitOutcome::Suppressed,
            }),
            Submission::Invalid(errors) => Ok(SubmitOutcome::Invalid(errors)),
            Submission::Blocked => Ok(SubmitOutcome::Suppressed),
        }
    }
}

/// Outcome of a delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Declined,
    Suppressed,
}

impl From<Dispatched> for DeleteOutcome {
    fn from(dispatched: Dispatched) -> Self {
        match dispatched {
            Dispatched::Completed => DeleteOutcome::Deleted,
            Dispatched::Suppressed => DeleteOutcome::Suppressed,
        }
    }
}

/// Fetches a slice on mount unless it is already loaded. `force` refetches.
pub(crate) fn mount<F>(store: &ConsoleStore, loaded: F, force: bool, fetch: Action) -> store::Result<()>
where
    F: FnOnce(&ConsoleState) -> bool,
{
    if force || !store.select(loaded) {
        store.dispatch(fetch)?;
    }
    Ok(())
}

/// Capitalizes each space separated word: `"youtube"` -> `"Youtube"`.
pub fn capitalize_words(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capitalize_words() {
        assert_eq!(capitalize_words("youtube"), "Youtube");
        assert_eq!(capitalize_words("duck duck go"), "Duck Duck Go");
        assert_eq!(capitalize_words(""), "");
    }

    #[test]
    fn test_closure_confirm() {
        let yes = |_: &str| true;
        let no = |_: &str| false;
        assert!(yes.confirm("Delete?"));
        assert!(!no.confirm("Delete?"));
    }
}
