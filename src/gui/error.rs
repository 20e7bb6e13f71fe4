use std::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum GuiError {
    #[error("terminal io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("event channel closed: {0}")]
    EventsClosed(#[from] mpsc::TryRecvError),
}
