//! Stage reports and the progress counter
//!
//! A thesis moves through three stages in order. `progress` counts the stages
//! submitted so far; stage `Pn` can only be submitted when `progress == n - 1`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::{QuireError, Result};

/// Highest progress value (all stages submitted)
pub const FINAL_PROGRESS: u8 = 3;

/// Report stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    P1,
    P2,
    P3,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::P1, Stage::P2, Stage::P3];

    /// 1-based stage number
    pub fn index(self) -> u8 {
        match self {
            Stage::P1 => 1,
            Stage::P2 => 2,
            Stage::P3 => 3,
        }
    }

    /// Progress value that must hold before this stage is accepted
    pub fn required_progress(self) -> u8 {
        self.index() - 1
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::P1 => "P1",
            Stage::P2 => "P2",
            Stage::P3 => "P3",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = QuireError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "P1" => Ok(Stage::P1),
            "P2" => Ok(Stage::P2),
            "P3" => Ok(Stage::P3),
            other => Err(QuireError::validation(format!(
                "Invalid stage '{}', expected P1, P2 or P3",
                other
            ))),
        }
    }
}

/// One value per stage, serialized as `{ "P1": .., "P2": .., "P3": .. }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageSlots<T> {
    #[serde(rename = "P1", default)]
    pub p1: T,
    #[serde(rename = "P2", default)]
    pub p2: T,
    #[serde(rename = "P3", default)]
    pub p3: T,
}

impl<T> StageSlots<T> {
    pub fn get(&self, stage: Stage) -> &T {
        match stage {
            Stage::P1 => &self.p1,
            Stage::P2 => &self.p2,
            Stage::P3 => &self.p3,
        }
    }

    pub fn set(&mut self, stage: Stage, value: T) {
        match stage {
            Stage::P1 => self.p1 = value,
            Stage::P2 => self.p2 = value,
            Stage::P3 => self.p3 = value,
        }
    }
}

/// Check that `stage` is the next one due at `progress`
pub fn ensure_next_stage(progress: u8, stage: Stage) -> Result<()> {
    if progress == stage.required_progress() {
        return Ok(());
    }

    if progress >= stage.index() {
        Err(QuireError::workflow(format!(
            "Stage {} has already been submitted",
            stage
        )))
    } else {
        // progress < required: an earlier stage is still missing
        let missing = Stage::ALL[progress as usize];
        Err(QuireError::workflow(format!(
            "Stage {} must be submitted before {}",
            missing, stage
        )))
    }
}

/// Record a stage report, advancing progress to the stage number
pub fn submit_report(
    progress: &mut u8,
    reports: &mut StageSlots<Option<String>>,
    stage: Stage,
    path: String,
) -> Result<()> {
    ensure_next_stage(*progress, stage)?;
    reports.set(stage, Some(path));
    *progress = stage.index();
    Ok(())
}
