// 🚫 Errors - What can go wrong, typed
//
// ValidationError covers the user-correctable conditions the account editor
// reports in a modal message. LedgerError covers lookups and parsing that
// fail on user input (amounts, account types, commodities, account paths).
// Storage and config I/O report through anyhow with context instead.

use thiserror::Error;

/// User-correctable problems found when the account editor's OK is pressed.
///
/// Nothing has been mutated when one of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("The account must be given a name.")]
    EmptyName,

    #[error("You must select an account type.")]
    InvalidType,

    #[error("There is already an account with that name.")]
    DuplicateName,

    #[error("You must choose a valid parent account.")]
    InvalidParent,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("unknown account type: {0}")]
    UnknownAccountType(String),

    #[error("unknown commodity: {0}")]
    UnknownCommodity(String),

    #[error("invalid amount: {0:?}")]
    InvalidAmount(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_messages() {
        assert_eq!(
            ValidationError::EmptyName.to_string(),
            "The account must be given a name."
        );
        assert_eq!(
            ValidationError::DuplicateName.to_string(),
            "There is already an account with that name."
        );
    }

    #[test]
    fn test_ledger_error_messages() {
        assert_eq!(
            LedgerError::UnknownCommodity("ZZZ".to_string()).to_string(),
            "unknown commodity: ZZZ"
        );
        assert_eq!(
            LedgerError::InvalidAmount("12x".to_string()).to_string(),
            "invalid amount: \"12x\""
        );
    }
}
