// 🧾 Transactions and Splits
//
// A transaction owns its splits; each split is one leg referencing a single
// account. `value` is in the transaction's currency, `quantity` is in the
// account's own units (shares for stock accounts, equal to value otherwise).

use super::account::AccountId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// IDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(pub Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SplitId(pub Uuid);

impl TransactionId {
    pub fn new() -> Self {
        TransactionId(Uuid::new_v4())
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl SplitId {
    pub fn new() -> Self {
        SplitId(Uuid::new_v4())
    }
}

impl Default for SplitId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for SplitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// RECONCILE STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ReconcileState {
    #[default]
    New,
    Cleared,
    Reconciled,
}

impl ReconcileState {
    pub fn as_char(&self) -> char {
        match self {
            ReconcileState::New => 'n',
            ReconcileState::Cleared => 'c',
            ReconcileState::Reconciled => 'y',
        }
    }

    pub fn from_char(c: char) -> Self {
        match c {
            'c' => ReconcileState::Cleared,
            'y' => ReconcileState::Reconciled,
            _ => ReconcileState::New,
        }
    }
}

// ============================================================================
// SPLIT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Split {
    pub id: SplitId,

    /// Owning transaction
    pub transaction: TransactionId,

    /// None while the split is being built
    pub account: Option<AccountId>,

    pub memo: String,

    /// Amount in the transaction's currency
    pub value: f64,

    /// Amount in the account's units
    pub quantity: f64,

    pub reconcile_state: ReconcileState,
    pub reconcile_date: Option<NaiveDate>,
}

impl Split {
    pub fn is_reconciled(&self) -> bool {
        self.reconcile_state == ReconcileState::Reconciled
    }
}

// ============================================================================
// TRANSACTION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub num: String,
    pub description: String,
    pub date_posted: NaiveDate,

    /// Ordered splits, owned by this transaction
    pub(crate) splits: Vec<SplitId>,

    #[serde(skip)]
    pub(crate) edit_level: u32,
}

impl Transaction {
    pub fn new(date_posted: NaiveDate, num: &str, description: &str) -> Self {
        Transaction {
            id: TransactionId::new(),
            num: num.to_string(),
            description: description.to_string(),
            date_posted,
            splits: Vec::new(),
            edit_level: 0,
        }
    }

    pub fn splits(&self) -> &[SplitId] {
        &self.splits
    }

    pub fn split_count(&self) -> usize {
        self.splits.len()
    }

    pub fn split_at(&self, index: usize) -> Option<SplitId> {
        self.splits.get(index).copied()
    }

    pub fn is_editing(&self) -> bool {
        self.edit_level > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconcile_state_chars() {
        for state in [
            ReconcileState::New,
            ReconcileState::Cleared,
            ReconcileState::Reconciled,
        ] {
            assert_eq!(ReconcileState::from_char(state.as_char()), state);
        }
        assert_eq!(ReconcileState::from_char('?'), ReconcileState::New);
    }

    #[test]
    fn test_new_transaction_is_empty() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        let tx = Transaction::new(date, "101", "Rent");
        assert_eq!(tx.split_count(), 0);
        assert!(tx.split_at(0).is_none());
        assert!(!tx.is_editing());
    }
}
