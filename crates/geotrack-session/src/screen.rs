//! Welcome/location screen state machine and the view models a renderer draws.
//!
//! The coordinate travels inside `Screen::Location`; nothing else holds it.

use geotrack_location::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Screen {
    #[default]
    Welcome,
    /// Waiting for a fix after the user asked to start tracking.
    Locating,
    Location {
        coordinate: Coordinate,
    },
}

impl Screen {
    /// True if a start request can be accepted.
    pub fn can_start(self) -> bool {
        matches!(self, Screen::Welcome)
    }

    pub fn coordinate(self) -> Option<Coordinate> {
        match self {
            Screen::Location { coordinate } => Some(coordinate),
            _ => None,
        }
    }

    /// State after a start request.
    pub fn on_start(self) -> Self {
        match self {
            Screen::Welcome => Screen::Locating,
            other => other,
        }
    }

    /// State after a fix arrives. Fixes that arrive when nothing is pending are dropped.
    pub fn on_fix(self, coordinate: Coordinate) -> Self {
        match self {
            Screen::Locating => Screen::Location { coordinate },
            other => other,
        }
    }

    /// State after a failed or cancelled fetch.
    pub fn on_failure(self) -> Self {
        match self {
            Screen::Locating => Screen::Welcome,
            other => other,
        }
    }

    /// State after the user stops tracking.
    pub fn on_stop(self) -> Self {
        Screen::Welcome
    }
}

pub const WELCOME_TITLE: &str = "Track Location";
pub const WELCOME_SUBTITLE: &str = "Real-time location tracking.";
pub const START_LABEL: &str = "Start Tracking";
pub const STOP_LABEL: &str = "Stop Tracking";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WelcomeView {
    pub title: String,
    pub subtitle: String,
    pub button_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationView {
    pub greeting: String,
    /// `None` while the fix is still pending
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub button_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Welcome(WelcomeView),
    Location(LocationView),
}

/// Build the view for `screen`.
pub fn render(screen: Screen, is_tracking: bool, display_name: &str) -> View {
    match screen {
        Screen::Welcome => View::Welcome(WelcomeView {
            title: WELCOME_TITLE.to_string(),
            subtitle: WELCOME_SUBTITLE.to_string(),
            button_label: if is_tracking { STOP_LABEL } else { START_LABEL }.to_string(),
        }),
        Screen::Locating => View::Location(LocationView {
            greeting: format!("Welcome, {}", display_name),
            latitude: None,
            longitude: None,
            button_label: STOP_LABEL.to_string(),
        }),
        Screen::Location { coordinate } => View::Location(LocationView {
            greeting: format!("Welcome, {}", display_name),
            latitude: Some(format!("Latitude: {}", coordinate.latitude())),
            longitude: Some(format!("Longitude: {}", coordinate.longitude())),
            button_label: STOP_LABEL.to_string(),
        }),
    }
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            View::Welcome(view) => {
                writeln!(f, "{}", view.title)?;
                writeln!(f, "{}", view.subtitle)?;
                write!(f, "[ {} ]", view.button_label)
            }
            View::Location(view) => {
                writeln!(f, "{}", view.greeting)?;
                match (&view.latitude, &view.longitude) {
                    (Some(lat), Some(lon)) => {
                        writeln!(f, "{}", lat)?;
                        writeln!(f, "{}", lon)?;
                    }
                    _ => writeln!(f, "Locating...")?,
                }
                write!(f, "[ {} ]", view.button_label)
            }
        }
    }
}
