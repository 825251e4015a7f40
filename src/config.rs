//! Configuration surface.
//!
//! ```json
//! {
//!   "scheduler": { "max_pending": 50 },
//!   "session": { "priority": "interactive", "pixel_density": 3.0,
//!                "target_fps": { "num": 30, "den": 1 }, "max_pixel_dimension": 320 }
//! }
//! ```

use std::path::Path;

use crate::foundation::error::{StickerError, StickerResult};
use crate::schedule::scheduler::SchedulerOpts;
use crate::session::animation_session::SessionOpts;

/// Scheduler and default session options, loadable from JSON.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Render queue options.
    pub scheduler: SchedulerOpts,
    /// Defaults for new sessions.
    pub session: SessionOpts,
}

impl RenderConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(s: &str) -> StickerResult<Self> {
        let cfg: Self = serde_json::from_str(s).map_err(|e| StickerError::config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> StickerResult<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .map_err(|e| StickerError::config(format!("read '{}': {e}", path.display())))?;
        Self::from_json_str(&s)
    }

    /// Check every section.
    pub fn validate(&self) -> StickerResult<()> {
        self.scheduler
            .validate()
            .and_then(|()| self.session.validate())
            .map_err(|e| match e {
                StickerError::Validation(msg) => StickerError::config(msg),
                other => other,
            })
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
