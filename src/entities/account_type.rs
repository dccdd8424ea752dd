// 🗂️ Account Types - The closed set of account kinds
//
// Which kinds may nest under which is a fixed relation: balance-sheet kinds
// nest with each other, income/expense nest with each other, and equity
// only with equity. Invalid is the "nothing selected" marker.

use crate::error::LedgerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AccountType {
    Bank,
    Cash,
    Asset,
    Credit,
    Liability,
    Stock,
    Mutual,
    Currency,
    Income,
    Expense,
    Equity,

    /// Unset / nothing selected. Compatible with nothing.
    Invalid,
}

/// How account balances are sign-flipped for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReverseBalance {
    /// Never flip
    None,
    /// Flip income and expense accounts
    IncomeExpense,
    /// Flip credit-normal accounts (income, credit, liability, equity)
    #[default]
    Credit,
}

impl AccountType {
    /// Every selectable type, in list order
    pub const ALL: [AccountType; 11] = [
        AccountType::Bank,
        AccountType::Cash,
        AccountType::Asset,
        AccountType::Credit,
        AccountType::Liability,
        AccountType::Stock,
        AccountType::Mutual,
        AccountType::Currency,
        AccountType::Income,
        AccountType::Expense,
        AccountType::Equity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Bank => "Bank",
            AccountType::Cash => "Cash",
            AccountType::Asset => "Asset",
            AccountType::Credit => "Credit Card",
            AccountType::Liability => "Liability",
            AccountType::Stock => "Stock",
            AccountType::Mutual => "Mutual Fund",
            AccountType::Currency => "Currency",
            AccountType::Income => "Income",
            AccountType::Expense => "Expense",
            AccountType::Equity => "Equity",
            AccountType::Invalid => "Invalid",
        }
    }

    /// Types that trade a security and therefore carry one
    pub fn uses_security(&self) -> bool {
        matches!(
            self,
            AccountType::Stock | AccountType::Mutual | AccountType::Currency
        )
    }

    /// Types that have a quote source for price fetching
    pub fn uses_price_source(&self) -> bool {
        matches!(self, AccountType::Stock | AccountType::Mutual)
    }

    /// Balances are kept in shares rather than value
    pub fn is_share_based(&self) -> bool {
        self.uses_security()
    }

    fn class(&self) -> Option<u8> {
        match self {
            AccountType::Bank
            | AccountType::Cash
            | AccountType::Asset
            | AccountType::Stock
            | AccountType::Mutual
            | AccountType::Currency
            | AccountType::Credit
            | AccountType::Liability => Some(0),
            AccountType::Income | AccountType::Expense => Some(1),
            AccountType::Equity => Some(2),
            AccountType::Invalid => None,
        }
    }

    /// Whether an account of `child` type may sit under `parent` type.
    /// Symmetric; `Invalid` is compatible with nothing.
    pub fn compatible(parent: AccountType, child: AccountType) -> bool {
        match (parent.class(), child.class()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Types selectable under a parent of this type
    pub fn compatible_children(&self) -> Vec<AccountType> {
        Self::ALL
            .iter()
            .copied()
            .filter(|t| Self::compatible(*self, *t))
            .collect()
    }

    pub fn reverses_balance(&self, mode: ReverseBalance) -> bool {
        match mode {
            ReverseBalance::None => false,
            ReverseBalance::IncomeExpense => {
                matches!(self, AccountType::Income | AccountType::Expense)
            }
            ReverseBalance::Credit => matches!(
                self,
                AccountType::Income
                    | AccountType::Credit
                    | AccountType::Liability
                    | AccountType::Equity
            ),
        }
    }

    /// Register-style labels for the (debit, credit) columns
    pub fn debit_credit_labels(&self) -> (&'static str, &'static str) {
        match self {
            AccountType::Bank => ("Deposit", "Withdrawal"),
            AccountType::Cash => ("Receive", "Spend"),
            AccountType::Asset => ("Increase", "Decrease"),
            AccountType::Credit => ("Payment", "Charge"),
            AccountType::Liability => ("Decrease", "Increase"),
            AccountType::Stock | AccountType::Mutual | AccountType::Currency => {
                ("Buy", "Sell")
            }
            AccountType::Income => ("Charge", "Income"),
            AccountType::Expense => ("Expense", "Rebate"),
            AccountType::Equity => ("Decrease", "Increase"),
            AccountType::Invalid => ("Debit", "Credit"),
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', '-'], " ");
        let found = match normalized.as_str() {
            "bank" => AccountType::Bank,
            "cash" => AccountType::Cash,
            "asset" => AccountType::Asset,
            "credit" | "credit card" => AccountType::Credit,
            "liability" => AccountType::Liability,
            "stock" => AccountType::Stock,
            "mutual" | "mutual fund" => AccountType::Mutual,
            "currency" => AccountType::Currency,
            "income" => AccountType::Income,
            "expense" => AccountType::Expense,
            "equity" => AccountType::Equity,
            _ => return Err(LedgerError::UnknownAccountType(s.to_string())),
        };
        Ok(found)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compatibility_is_symmetric_and_total() {
        let mut all = AccountType::ALL.to_vec();
        all.push(AccountType::Invalid);

        for a in &all {
            for b in &all {
                assert_eq!(
                    AccountType::compatible(*a, *b),
                    AccountType::compatible(*b, *a),
                    "{} / {}",
                    a,
                    b
                );
            }
        }
    }

    #[test]
    fn test_compatibility_classes() {
        assert!(AccountType::compatible(AccountType::Bank, AccountType::Stock));
        assert!(AccountType::compatible(AccountType::Liability, AccountType::Credit));
        assert!(AccountType::compatible(AccountType::Income, AccountType::Expense));
        assert!(AccountType::compatible(AccountType::Equity, AccountType::Equity));

        assert!(!AccountType::compatible(AccountType::Bank, AccountType::Income));
        assert!(!AccountType::compatible(AccountType::Expense, AccountType::Equity));
        assert!(!AccountType::compatible(AccountType::Equity, AccountType::Asset));
    }

    #[test]
    fn test_invalid_is_compatible_with_nothing() {
        assert!(!AccountType::compatible(AccountType::Invalid, AccountType::Invalid));
        for t in AccountType::ALL {
            assert!(!AccountType::compatible(AccountType::Invalid, t));
        }
    }

    #[test]
    fn test_compatible_children() {
        assert_eq!(AccountType::Equity.compatible_children(), vec![AccountType::Equity]);
        assert_eq!(AccountType::Income.compatible_children().len(), 2);
        assert_eq!(AccountType::Bank.compatible_children().len(), 8);
        assert!(AccountType::Invalid.compatible_children().is_empty());
    }

    #[test]
    fn test_security_types() {
        assert!(AccountType::Stock.uses_security());
        assert!(AccountType::Currency.uses_security());
        assert!(!AccountType::Currency.uses_price_source());
        assert!(!AccountType::Bank.uses_security());
    }

    #[test]
    fn test_parse() {
        assert_eq!("credit card".parse::<AccountType>().unwrap(), AccountType::Credit);
        assert_eq!("Mutual_Fund".parse::<AccountType>().unwrap(), AccountType::Mutual);
        assert_eq!("BANK".parse::<AccountType>().unwrap(), AccountType::Bank);
        assert!("savings".parse::<AccountType>().is_err());
    }

    #[test]
    fn test_reverse_balance() {
        assert!(AccountType::Credit.reverses_balance(ReverseBalance::Credit));
        assert!(!AccountType::Expense.reverses_balance(ReverseBalance::Credit));
        assert!(AccountType::Expense.reverses_balance(ReverseBalance::IncomeExpense));
        assert!(!AccountType::Income.reverses_balance(ReverseBalance::None));
    }
}
