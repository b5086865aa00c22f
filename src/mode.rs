//! Capability tags and capability modes.
//!
//! Every tool carries one [`Capability`]. A [`CapabilityMode`] is the set of
//! capabilities the model may use in the current session; it decides which
//! tools are advertised and which system-prompt variant is sent.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What a tool is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Read,
    Write,
    Execute,
}

impl Capability {
    pub const ALL: [Capability; 3] = [Capability::Read, Capability::Write, Capability::Execute];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Read => "read",
            Capability::Write => "write",
            Capability::Execute => "execute",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(Capability::Read),
            "write" => Ok(Capability::Write),
            "execute" | "exec" => Ok(Capability::Execute),
            other => Err(format!("unknown capability: {other}")),
        }
    }
}

/// A set of capabilities. Equality ignores construction order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CapabilityMode(BTreeSet<Capability>);

impl CapabilityMode {
    pub fn new(capabilities: impl IntoIterator<Item = Capability>) -> Self {
        Self(capabilities.into_iter().collect())
    }

    /// Read, write and execute.
    pub fn all() -> Self {
        Self::new(Capability::ALL)
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0.contains(&capability)
    }

    /// The mode-specific line appended to the base system prompt.
    pub fn prompt_line(&self) -> Option<&'static str> {
        let has = |c| self.contains(c);
        let line = match (has(Capability::Read), has(Capability::Write), has(Capability::Execute)) {
            (false, false, false) => return None,
            (true, false, false) => {
                "You are in read-only mode. Inspect and explain; do not modify files or run commands."
            }
            (false, true, false) => {
                "You are in write mode. You may create and edit files but cannot read or search them first."
            }
            (false, false, true) => {
                "You are in execute mode. Accomplish the task by running shell commands."
            }
            (true, true, false) => {
                "You are in build mode. Read the project, then make focused file edits. You cannot run commands."
            }
            (true, false, true) => {
                "You are in verify mode. Read files and run commands to check behaviour; do not edit files."
            }
            (false, true, true) => {
                "You are in write and execute mode. Edit files and run commands; reading tools are unavailable."
            }
            (true, true, true) => {
                "You are in autonomous mode. Read, edit and run whatever the task requires, then report the result."
            }
        };
        Some(line)
    }
}

impl fmt::Display for CapabilityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("none");
        }
        let names: Vec<&str> = self.0.iter().map(Capability::as_str).collect();
        f.write_str(&names.join(","))
    }
}

impl FromStr for CapabilityMode {
    type Err = String;

    /// Parses `auto`, `build`, `none`, or a comma separated capability list.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "all" => Ok(Self::all()),
            "build" => Ok(Self::new([Capability::Read, Capability::Write])),
            "none" | "" => Ok(Self::default()),
            list => list
                .split(',')
                .filter(|part| !part.trim().is_empty())
                .map(Capability::from_str)
                .collect::<Result<BTreeSet<_>, _>>()
                .map(Self),
        }
    }
}

impl FromIterator<Capability> for CapabilityMode {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        Self::new(iter)
    }
}
