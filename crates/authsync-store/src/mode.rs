//! Mode selection.

use authsync_session::SessionMode;

/// How the guest application was loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameContext {
    /// Loaded directly in a tab.
    #[default]
    TopLevel,
    /// Loaded inside another application's frame.
    Framed,
}

/// Picks the store's mode: the caller's explicit flag wins, otherwise the
/// frame context decides.
pub fn resolve_mode(flag: Option<SessionMode>, frame: FrameContext) -> SessionMode {
    match (flag, frame) {
        (Some(mode), _) => mode,
        (None, FrameContext::TopLevel) => SessionMode::Standalone,
        (None, FrameContext::Framed) => SessionMode::Embedded,
    }
}
