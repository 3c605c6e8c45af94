use serde::{Deserialize, Serialize};
use std::fmt;
use streetmetrics_core::error::{Result, StreetmetricsError};

/// Lifecycle of one district refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RefreshState {
    #[default]
    Pending,
    ClippingSegments,
    Clustering,
    Aggregating,
    Complete,
    Failed,
}

impl RefreshState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshState::Pending => "pending",
            RefreshState::ClippingSegments => "clipping_segments",
            RefreshState::Clustering => "clustering",
            RefreshState::Aggregating => "aggregating",
            RefreshState::Complete => "complete",
            RefreshState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RefreshState::Complete | RefreshState::Failed)
    }

    /// The state that follows on success, if any
    pub fn successor(&self) -> Option<RefreshState> {
        match self {
            RefreshState::Pending => Some(RefreshState::ClippingSegments),
            RefreshState::ClippingSegments => Some(RefreshState::Clustering),
            RefreshState::Clustering => Some(RefreshState::Aggregating),
            RefreshState::Aggregating => Some(RefreshState::Complete),
            RefreshState::Complete | RefreshState::Failed => None,
        }
    }

    /// Move to `to`, which must be the successor of the current state
    pub fn advance(&mut self, to: RefreshState) -> Result<()> {
        if self.successor() != Some(to) {
            return Err(self.invalid(to));
        }
        *self = to;
        Ok(())
    }

    /// Move to `Failed` from any non-terminal state
    pub fn fail(&mut self) -> Result<()> {
        if self.is_terminal() {
            return Err(self.invalid(RefreshState::Failed));
        }
        *self = RefreshState::Failed;
        Ok(())
    }

    fn invalid(&self, to: RefreshState) -> StreetmetricsError {
        StreetmetricsError::InvalidTransition {
            from: self.as_str().to_string(),
            to: to.as_str().to_string(),
        }
    }
}

impl fmt::Display for RefreshState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
