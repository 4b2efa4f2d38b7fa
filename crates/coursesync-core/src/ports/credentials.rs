//! Credential provider port
//!
//! The OAuth handshake lives outside the pipeline. Orchestrators only need
//! to know whether a bearer is currently held and to drop it when the
//! remote rejects it.

/// Port trait for the process-wide credential holder
pub trait CredentialProvider: Send + Sync {
    /// The bearer token currently held, or `None` when unauthenticated
    fn current_bearer(&self) -> Option<String>;

    /// Drops the held bearer after the remote rejected it.
    ///
    /// Called from inside running units, so implementations must return
    /// promptly and hand any slow work (re-authentication, UI) off to
    /// another task. Calling it more than once is harmless.
    fn invalidate(&self);
}
