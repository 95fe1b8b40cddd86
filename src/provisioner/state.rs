//! Table lifecycle states

use std::fmt;
use std::time::Duration;

use crate::db::TableStatus;

/// Where the provisioner is in the table lifecycle.
///
/// ```text
/// Unknown --ensure--> Missing --create--> Creating --wait--> Active
///         \--------> Existing                      \------> TimedOut
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableState {
    /// Nothing known yet
    Unknown,
    /// describe-table reported the table absent
    Missing,
    /// The table was already there; no wait is performed
    Existing,
    /// Create request accepted, not yet ACTIVE
    Creating,
    Active,
    /// The waiter ran out of time
    TimedOut {
        waited: Duration,
        last_status: Option<TableStatus>,
    },
}

impl TableState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TableState::Existing | TableState::Active | TableState::TimedOut { .. }
        )
    }
}

impl fmt::Display for TableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableState::Unknown => write!(f, "unknown"),
            TableState::Missing => write!(f, "missing"),
            TableState::Existing => write!(f, "existing"),
            TableState::Creating => write!(f, "creating"),
            TableState::Active => write!(f, "active"),
            TableState::TimedOut { .. } => write!(f, "timed out"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!TableState::Unknown.is_terminal());
        assert!(!TableState::Missing.is_terminal());
        assert!(!TableState::Creating.is_terminal());
        assert!(TableState::Existing.is_terminal());
        assert!(TableState::Active.is_terminal());

        let timed_out = TableState::TimedOut {
            waited: Duration::from_secs(120),
            last_status: Some(TableStatus::Creating),
        };
        assert!(timed_out.is_terminal());
    }
}
