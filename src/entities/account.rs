// 💳 Account Entity - A node in the account tree
//
// The account id is identity; everything else (name, type, commodities) is
// a value that the editor may change. Parent/child links and the split
// list are maintained by the Book, never edited directly by callers.

use super::account_type::AccountType;
use super::commodity::Commodity;
use super::transaction::SplitId;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// ACCOUNT ID
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub Uuid);

impl AccountId {
    pub fn new() -> Self {
        AccountId(Uuid::new_v4())
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// ACCOUNT ENTITY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Stable identity
    pub id: AccountId,

    pub name: String,
    pub description: String,
    pub code: String,
    pub notes: String,

    pub account_type: AccountType,

    /// Currency the account's values are kept in
    pub currency: Option<Commodity>,

    /// Traded commodity, only meaningful when the type uses a security
    pub security: Option<Commodity>,

    /// Quote source name, only meaningful for stock and mutual fund accounts
    pub price_source: Option<String>,

    /// None means top level. Maintained by the Book.
    pub(crate) parent: Option<AccountId>,

    /// Maintained by the Book
    pub(crate) children: Vec<AccountId>,

    /// Maintained by the Book, ordered by posted date
    pub(crate) splits: Vec<SplitId>,

    /// Open edit brackets
    #[serde(skip)]
    pub(crate) edit_level: u32,
}

impl Account {
    /// Fresh, detached account. Attach it with `Book::insert_account`.
    pub fn new(name: &str, account_type: AccountType) -> Self {
        Account {
            id: AccountId::new(),
            name: name.to_string(),
            description: String::new(),
            code: String::new(),
            notes: String::new(),
            account_type,
            currency: None,
            security: None,
            price_source: None,
            parent: None,
            children: Vec::new(),
            splits: Vec::new(),
            edit_level: 0,
        }
    }

    pub fn with_currency(mut self, currency: Commodity) -> Self {
        self.currency = Some(currency);
        self
    }

    pub fn with_security(mut self, security: Commodity) -> Self {
        self.security = Some(security);
        self
    }

    pub fn parent(&self) -> Option<AccountId> {
        self.parent
    }

    pub fn children(&self) -> &[AccountId] {
        &self.children
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn splits(&self) -> &[SplitId] {
        &self.splits
    }

    /// Split by position; None past the end
    pub fn split_at(&self, index: usize) -> Option<SplitId> {
        self.splits.get(index).copied()
    }

    pub fn is_editing(&self) -> bool {
        self.edit_level > 0
    }

    /// Security, but only for types that carry one
    pub fn effective_security(&self) -> Option<&Commodity> {
        if self.account_type.uses_security() {
            self.security.as_ref()
        } else {
            None
        }
    }

    /// Price source, but only for types that carry one
    pub fn effective_price_source(&self) -> Option<&str> {
        if self.account_type.uses_price_source() {
            self.price_source.as_deref()
        } else {
            None
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_creation() {
        let account = Account::new("Checking", AccountType::Bank)
            .with_currency(Commodity::currency("USD", "US Dollar"));

        assert_eq!(account.name, "Checking");
        assert_eq!(account.account_type, AccountType::Bank);
        assert_eq!(account.currency.as_ref().unwrap().mnemonic, "USD");
        assert!(account.parent().is_none());
        assert!(!account.has_children());
        assert!(!account.is_editing());
        assert!(account.split_at(0).is_none());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Account::new("A", AccountType::Bank);
        let b = Account::new("A", AccountType::Bank);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_effective_security_depends_on_type() {
        let aapl = Commodity::new("NASDAQ", "AAPL", "Apple Inc.");

        let stock = Account::new("Apple", AccountType::Stock).with_security(aapl.clone());
        assert_eq!(stock.effective_security().unwrap().mnemonic, "AAPL");

        let bank = Account::new("Checking", AccountType::Bank).with_security(aapl);
        assert!(bank.effective_security().is_none());
    }

    #[test]
    fn test_effective_price_source() {
        let mut mutual = Account::new("Index Fund", AccountType::Mutual);
        mutual.price_source = Some("Vanguard".to_string());
        assert_eq!(mutual.effective_price_source(), Some("Vanguard"));

        let mut currency = Account::new("Euros", AccountType::Currency);
        currency.price_source = Some("ECB".to_string());
        assert_eq!(currency.effective_price_source(), None);
    }
}
