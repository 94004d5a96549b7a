//! Display formatting for terminal output
//!
//! Provides utilities for formatting events and mirrors for terminal
//! display.

pub mod event;
pub mod mirror;

pub use event::{format_event_details, format_event_list, format_event_row};
pub use mirror::format_mirror_tree;
