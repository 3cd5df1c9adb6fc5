use std::fmt;
use std::io::Error;
use std::time::Duration;

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;

use crate::source::Source;

#[derive(Debug)]
pub enum TVError {
    IoError(Error),
    NetworkError(String),
    ParseError(String),
    LoadingFailed(String),
    FileNotFound,
    PermissionDenied,
}

impl fmt::Display for TVError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TVError::IoError(e) => write!(f, "io error: {e}"),
            TVError::NetworkError(reason) => write!(f, "network error: {reason}"),
            TVError::ParseError(reason) => write!(f, "unexpected payload: {reason}"),
            TVError::LoadingFailed(reason) => write!(f, "loading failed: {reason}"),
            TVError::FileNotFound => write!(f, "file not found"),
            TVError::PermissionDenied => write!(f, "permission denied"),
        }
    }
}

impl std::error::Error for TVError {}

impl From<Error> for TVError {
    fn from(err: Error) -> Self {
        TVError::IoError(err)
    }
}

impl From<reqwest::Error> for TVError {
    fn from(err: reqwest::Error) -> Self {
        TVError::NetworkError(err.to_string())
    }
}

impl From<serde_json::Error> for TVError {
    fn from(err: serde_json::Error) -> Self {
        TVError::ParseError(err.to_string())
    }
}

#[derive(Debug, Clone, Setters)]
pub struct TVConfig {
    /// Milliseconds to wait for a terminal event before redrawing.
    pub event_poll_time: u64,
    pub source: Source,
    /// Additional attempts after the first failed fetch.
    pub fetch_retries: u32,
    pub fetch_timeout: Duration,
}

impl Default for TVConfig {
    fn default() -> Self {
        TVConfig {
            event_poll_time: 100,
            source: Source::default(),
            fetch_retries: 2,
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortColumn {
    #[default]
    Name,
    Population,
    Area,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn flip(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// Ranking metric of the chart panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Metric {
    #[default]
    Population,
    Area,
}

impl Metric {
    pub fn toggle(self) -> Self {
        match self {
            Metric::Population => Metric::Area,
            Metric::Area => Metric::Population,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Metric::Population => "Population",
            Metric::Area => "Area",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    NextPage,
    PreviousPage,
    FirstPage,
    LastPage,
    SortBy(SortColumn),
    ToggleMetric,
    Search,
    Enter,
    Exit,
    Help,
    Retry,
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "\
Navigation
  ↑ / k        previous row
  ↓ / j        next row
  ← / h        previous page
  → / l        next page
  g / G        first / last page

Table
  /            search by country name
  1            sort by name
  2            sort by population
  3            sort by area
               (press again to flip the direction)
  Enter        show country details

Chart
  m            switch metric (population / area)

General
  r            retry a failed fetch
  ?            this help
  Esc          close popup
  q            quit";
