//! Transient status text shown above an agent.
//!
//! [`TransientDisplay`] replaces a coroutine-style "show, wait, hide" with an
//! explicit deadline on the simulation clock:
//!
//! * [`show_transient`][StatusDisplay::show_transient] shows the text at once
//!   and schedules the hide at `now + duration`.
//! * A newer message overrides both the text and the pending hide.
//! * [`advance`][StatusDisplay::advance] moves the display clock forward and
//!   hides the text once its deadline has passed.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use navlink_hal::display::{StatusDisplay, TransientDisplay};
//!
//! let mut display = TransientDisplay::new("scout");
//! display.show_transient("I am stopping", Duration::from_secs(2));
//! assert_eq!(display.visible_text(), Some("I am stopping"));
//!
//! display.advance(Duration::from_secs(2));
//! assert_eq!(display.visible_text(), None);
//! ```

use std::time::Duration;

use tracing::info;

/// Capability to surface a short status line for a limited time.
pub trait StatusDisplay: Send {
    /// Show `text` immediately and hide it after `duration`.
    fn show_transient(&mut self, text: &str, duration: Duration);

    /// Move the display clock to `now` (time since simulation start).
    /// Implementations without their own timers can ignore this.
    fn advance(&mut self, _now: Duration) {}
}

/// Clock-driven [`StatusDisplay`] used by headless runs.
pub struct TransientDisplay {
    owner: String,
    now: Duration,
    text: Option<String>,
    hide_at: Duration,
}

impl TransientDisplay {
    /// Create a hidden display labelled with the owning agent's name.
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            now: Duration::ZERO,
            text: None,
            hide_at: Duration::ZERO,
        }
    }

    /// The text currently on screen, if any.
    pub fn visible_text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

impl StatusDisplay for TransientDisplay {
    fn show_transient(&mut self, text: &str, duration: Duration) {
        info!(agent = %self.owner, text, "status");
        self.text = Some(text.to_string());
        self.hide_at = self.now + duration;
    }

    fn advance(&mut self, now: Duration) {
        self.now = now;
        if self.text.is_some() && now >= self.hide_at {
            self.text = None;
        }
    }
}
