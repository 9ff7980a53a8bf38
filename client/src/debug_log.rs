use std::collections::VecDeque;

use crate::config::DEBUG_PANEL_MAX_LINES;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebugSeverity {
    Info,
    Error,
}

impl DebugSeverity {
    pub const fn color(self) -> &'static str {
        match self {
            Self::Info => "#9a9590",
            Self::Error => "#e0524a",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DebugLine {
    pub text: String,
    pub severity: DebugSeverity,
}

/// Rolling diagnostics shown in the debug panel. Oldest lines drop first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DebugLog {
    lines: VecDeque<DebugLine>,
}

impl DebugLog {
    pub fn push(&mut self, text: impl Into<String>, severity: DebugSeverity) {
        self.lines.push_back(DebugLine {
            text: text.into(),
            severity,
        });
        while self.lines.len() > DEBUG_PANEL_MAX_LINES {
            self.lines.pop_front();
        }
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.push(text, DebugSeverity::Info);
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.push(text, DebugSeverity::Error);
    }

    pub fn lines(&self) -> impl Iterator<Item = &DebugLine> {
        self.lines.iter()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }
}
