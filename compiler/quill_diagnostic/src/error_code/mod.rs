//! Error codes for back-end diagnostics.
//!
//! The first digit names the stage:
//! - E2xxx: name resolution
//! - E3xxx: partial application
//! - E4xxx: control flow and macro expansion
//! - E9xxx: internal compiler errors

use std::fmt;

/// Error codes for all back-end diagnostics.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ErrorCode {
    // Resolution (E2xxx)
    /// Unresolved symbol
    E2001,
    /// Name imported ambiguously from several origins
    E2002,
    /// Namespace used as a value
    E2003,
    /// Invalid assignment target
    E2004,
    /// Reference to a macro command
    E2005,
    /// Invalid use of a reference (reference with arguments)
    E2006,

    // Partial application (E3xxx)
    /// Duplicate explicit placeholder index
    E3001,
    /// Placeholder index out of range
    E3002,
    /// Too many partial-application arguments
    E3003,
    /// Placeholder outside a partial application
    E3004,

    // Control flow (E4xxx)
    /// Yield or set inside a protected block (warning)
    E4001,
    /// Break or continue outside a loop
    E4002,
    /// Macro expansion failed
    E4003,

    // Internal (E9xxx)
    /// Internal compiler error
    E9001,
}

impl ErrorCode {
    /// All error code variants, for exhaustive testing.
    pub const ALL: &[ErrorCode] = &[
        ErrorCode::E2001,
        ErrorCode::E2002,
        ErrorCode::E2003,
        ErrorCode::E2004,
        ErrorCode::E2005,
        ErrorCode::E2006,
        ErrorCode::E3001,
        ErrorCode::E3002,
        ErrorCode::E3003,
        ErrorCode::E3004,
        ErrorCode::E4001,
        ErrorCode::E4002,
        ErrorCode::E4003,
        ErrorCode::E9001,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::E2001 => "E2001",
            ErrorCode::E2002 => "E2002",
            ErrorCode::E2003 => "E2003",
            ErrorCode::E2004 => "E2004",
            ErrorCode::E2005 => "E2005",
            ErrorCode::E2006 => "E2006",
            ErrorCode::E3001 => "E3001",
            ErrorCode::E3002 => "E3002",
            ErrorCode::E3003 => "E3003",
            ErrorCode::E3004 => "E3004",
            ErrorCode::E4001 => "E4001",
            ErrorCode::E4002 => "E4002",
            ErrorCode::E4003 => "E4003",
            ErrorCode::E9001 => "E9001",
        }
    }

    /// Check if this is a name resolution error (E2xxx range).
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            ErrorCode::E2001
                | ErrorCode::E2002
                | ErrorCode::E2003
                | ErrorCode::E2004
                | ErrorCode::E2005
                | ErrorCode::E2006
        )
    }

    /// Check if this is a partial application error (E3xxx range).
    pub fn is_placeholder_error(&self) -> bool {
        matches!(
            self,
            ErrorCode::E3001 | ErrorCode::E3002 | ErrorCode::E3003 | ErrorCode::E3004
        )
    }

    /// Check if this is a control flow error (E4xxx range).
    pub fn is_control_flow_error(&self) -> bool {
        matches!(self, ErrorCode::E4001 | ErrorCode::E4002 | ErrorCode::E4003)
    }

    /// Check if this is an internal compiler error (E9xxx range).
    pub fn is_internal_error(&self) -> bool {
        matches!(self, ErrorCode::E9001)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parse an error code string like `"E2001"`. Case-insensitive.
impl std::str::FromStr for ErrorCode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_uppercase();
        Self::ALL
            .iter()
            .find(|code| code.as_str() == upper)
            .copied()
            .ok_or(())
    }
}
