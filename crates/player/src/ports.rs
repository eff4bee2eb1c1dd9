//! Collaborators the session layer calls out to.
//!
//! Rendering and navigation belong to the front-end; the session layer only
//! needs these narrow seams.

use rand::distributions::Alphanumeric;
use rand::Rng;

use playtogether_domain::Board;

/// Receives the current board on every change.
#[cfg_attr(test, mockall::automock)]
pub trait BoardRenderer: Send + Sync {
    fn render(&self, board: &Board);
}

/// Front-end navigation. Called when a remote session is lost for good.
#[cfg_attr(test, mockall::automock)]
pub trait Navigator: Send + Sync {
    fn navigate_home(&self);
}

/// Produces a display name for participants who did not pick one.
#[cfg_attr(test, mockall::automock)]
pub trait NameGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// `Guest-` followed by five random lowercase alphanumerics.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuestNameGenerator;

impl NameGenerator for GuestNameGenerator {
    fn generate(&self) -> String {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(5)
            .map(|b| char::from(b).to_ascii_lowercase())
            .collect();
        format!("Guest-{}", suffix)
    }
}

/// Renderer for headless use.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRenderer;

impl BoardRenderer for NoopRenderer {
    fn render(&self, _board: &Board) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate_home(&self) {}
}
