//! Caller roles.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Who is acting.
///
/// Roles are untrusted strings at the process boundary and converted to
/// this closed enumeration on entry; only the enumeration travels
/// internally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Submits and inspects research tasks. Locked out in LOCKDOWN.
    Researcher,
    /// Operates escalations, lockdown, and recovery.
    Director,
    /// The daemons themselves.
    System,
}

impl Role {
    /// Canonical lowercase form stored in the audit log.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Researcher => "researcher",
            Self::Director => "director",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "researcher" => Ok(Self::Researcher),
            "director" => Ok(Self::Director),
            "system" => Ok(Self::System),
            other => Err(Error::MalformedInput(format!("unknown role: {other}"))),
        }
    }
}
