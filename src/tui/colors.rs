//! Color constants for the terminal user interface.

use ratatui::style::Color;

// Accent colour per filter tab.

/// Used for the "all" view
pub const SLATE: Color = Color::Rgb(40, 60, 90);
/// Used for the "active" view
pub const DARK_GREEN: Color = Color::Rgb(0, 80, 0);
/// Used for the "completed" view
pub const DARK_PURPLE: Color = Color::Rgb(86, 60, 92);
/// Completed task text
pub const DIMMED: Color = Color::DarkGray;
