use std::fmt;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    /// 已连接：窗口持续更新，但不累积数据
    Connected,
    Recording,
    Exporting,
}

impl SessionState {
    /// Whether incoming readings are admitted into the window
    pub fn accepts_readings(&self) -> bool {
        matches!(self, SessionState::Connected | SessionState::Recording)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, SessionState::Recording)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "Disconnected",
            SessionState::Connected => "Connected",
            SessionState::Recording => "Recording",
            SessionState::Exporting => "Exporting",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected() {
        let state = SessionState::default();
        assert_eq!(state, SessionState::Disconnected);
        assert!(!state.accepts_readings());
        assert!(SessionState::Recording.accepts_readings() && SessionState::Recording.is_recording());
        assert!(!SessionState::Exporting.accepts_readings());
    }
}
