use thiserror::Error;

/// Errors raised by the chat session itself. Transport failures from
/// the model call are propagated as-is and are not wrapped here.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No candidate model matched the selection criteria. Carries the
    /// names of every model the selector knows about so the user can
    /// see what was actually available.
    #[error("No suitable model, available models: [{available}]")]
    NoSuitableModel { available: String },
}
