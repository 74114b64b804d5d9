//! Interaction mode and colors of one document view.
//!
//! Passed explicitly to gesture handling; nothing here is global.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::annotation::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    None,
    Text,
    Highlight,
    Underline,
    Draw,
}

impl Tool {
    pub fn as_str(self) -> &'static str {
        match self {
            Tool::None => "none",
            Tool::Text => "text",
            Tool::Highlight => "highlight",
            Tool::Underline => "underline",
            Tool::Draw => "draw",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tool {0:?}")]
pub struct UnknownTool(pub String);

impl FromStr for Tool {
    type Err = UnknownTool;

    /// Unrecognized names are an error; callers that want the lenient
    /// behavior map the error to [`Tool::None`].
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "none" => Ok(Tool::None),
            "text" => Ok(Tool::Text),
            "highlight" => Ok(Tool::Highlight),
            "underline" => Ok(Tool::Underline),
            "draw" => Ok(Tool::Draw),
            other => Err(UnknownTool(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolColors {
    pub draw: Color,
    pub highlight: Color,
    pub underline: Color,
}

impl Default for ToolColors {
    fn default() -> Self {
        Self { draw: Color::RED, highlight: Color::YELLOW, underline: Color::BLUE }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Session {
    pub tool: Tool,
    pub colors: ToolColors,
    pub scroll_locked: bool,
    pub page_numbers_enabled: bool,
}

impl Session {
    /// Plain scrolling is only allowed while browsing.
    pub fn can_scroll(&self) -> bool {
        self.tool == Tool::None && !self.scroll_locked
    }

    /// Panning a zoomed page ignores the scroll lock.
    pub fn can_pan(&self) -> bool {
        self.tool == Tool::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_names_round_trip() {
        for tool in [Tool::None, Tool::Text, Tool::Highlight, Tool::Underline, Tool::Draw] {
            assert_eq!(tool.as_str().parse::<Tool>(), Ok(tool));
        }
        assert_eq!("lasso".parse::<Tool>(), Err(UnknownTool("lasso".into())));
    }

    #[test]
    fn scrolling_rules() {
        let mut session = Session::default();
        assert!(session.can_scroll());
        session.scroll_locked = true;
        assert!(!session.can_scroll());
        assert!(session.can_pan());
        session.scroll_locked = false;
        session.tool = Tool::Draw;
        assert!(!session.can_scroll());
        assert!(!session.can_pan());
    }
}
