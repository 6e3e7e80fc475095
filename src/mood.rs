use std::fmt;

use axum::{Json, debug_handler};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Trash,
    Meh,
    Ok,
    Cool,
    Lit,
}

/// How a mood is drawn on the fire screen.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct MoodStyle {
    pub key: Mood,
    pub label: &'static str,
    pub img: &'static str,
    pub flame: &'static str,
    pub halo: &'static str,
}

impl Mood {
    pub const ALL: [Mood; 5] = [Mood::Trash, Mood::Meh, Mood::Ok, Mood::Cool, Mood::Lit];

    pub fn label(&self) -> &'static str {
        use Mood::*;
        match self {
            Trash => "Trash",
            Meh => "Meh",
            Ok => "Ok",
            Cool => "Cool",
            Lit => "Lit",
        }
    }

    pub fn flame(&self) -> &'static str {
        use Mood::*;
        match self {
            Trash => "/purpleflame.gif",
            Meh => "/blueflame.gif",
            Ok => "/greenflame.gif",
            Cool => "/pinkflame.gif",
            Lit => "/redflame.gif",
        }
    }

    pub fn halo(&self) -> &'static str {
        use Mood::*;
        match self {
            Trash => "#a259f7",
            Meh => "#4fc3f7",
            Ok => "#81c784",
            Cool => "#f06292",
            Lit => "#ff5252",
        }
    }

    pub fn style(self) -> MoodStyle {
        let img = match self {
            Mood::Trash => "/trash.png",
            Mood::Meh => "/meh.png",
            Mood::Ok => "/ok.png",
            Mood::Cool => "/cool.png",
            Mood::Lit => "/lit.png",
        };
        MoodStyle {
            key: self,
            label: self.label(),
            img,
            flame: self.flame(),
            halo: self.halo(),
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[debug_handler]
pub async fn palette() -> Json<Vec<MoodStyle>> {
    Json(Mood::ALL.into_iter().map(Mood::style).collect())
}
