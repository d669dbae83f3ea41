mod autosave;
mod navigation;
mod progress;
mod state;
mod view;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use autosave::{AutosaveDispatcher, AutosaveReport, ConfirmationGate};
pub use navigation::{NavOutcome, NavigationController};
pub use progress::SessionProgress;
pub use state::SessionState;
pub use view::{QuestionView, RenderFrame};
