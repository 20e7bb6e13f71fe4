mod dashboard;
mod error;
mod selector;

pub use dashboard::{run_dashboard, Action, Dashboard};
pub use error::GuiError;
pub use selector::select_option;
