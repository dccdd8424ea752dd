// 📚 Book - In-memory account tree and transaction store
//
// The Book owns every account, transaction and split. Mutation happens
// inside begin/commit edit brackets; the bracket is advisory (not a lock)
// and exists so dependent views know a change is in flight. Every bracket
// open and close is appended to the edit log.
//
// Lookups of unknown ids return None / empty results rather than failing.

use crate::entities::{
    commodity_equiv, Account, AccountId, Commodity, CommodityTable, ReconcileState, Split,
    SplitId, Transaction, TransactionId,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// EDIT BRACKETS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditTarget {
    Account(AccountId),
    Transaction(TransactionId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditEvent {
    Begin(EditTarget),
    Commit(EditTarget),
}

// ============================================================================
// BOOK
// ============================================================================

#[derive(Debug, Default)]
pub struct Book {
    accounts: HashMap<AccountId, Account>,
    top_level: Vec<AccountId>,
    transactions: HashMap<TransactionId, Transaction>,
    splits: HashMap<SplitId, Split>,
    commodities: CommodityTable,
    edit_log: Vec<EditEvent>,
}

impl Book {
    pub fn new() -> Self {
        Book {
            commodities: CommodityTable::with_iso_currencies(),
            ..Default::default()
        }
    }

    pub fn commodities(&self) -> &CommodityTable {
        &self.commodities
    }

    pub fn commodities_mut(&mut self) -> &mut CommodityTable {
        &mut self.commodities
    }

    // ========================================================================
    // EDIT LOG
    // ========================================================================

    pub fn edit_log(&self) -> &[EditEvent] {
        &self.edit_log
    }

    pub fn clear_edit_log(&mut self) {
        self.edit_log.clear();
    }

    /// Number of completed brackets on an account since the log was cleared
    pub fn commit_count(&self, id: AccountId) -> usize {
        self.edit_log
            .iter()
            .filter(|e| **e == EditEvent::Commit(EditTarget::Account(id)))
            .count()
    }

    pub fn begin_account_edit(&mut self, id: AccountId) -> bool {
        match self.accounts.get_mut(&id) {
            Some(account) => {
                account.edit_level += 1;
                self.edit_log.push(EditEvent::Begin(EditTarget::Account(id)));
                true
            }
            None => false,
        }
    }

    pub fn commit_account_edit(&mut self, id: AccountId) -> bool {
        match self.accounts.get_mut(&id) {
            Some(account) if account.edit_level > 0 => {
                account.edit_level -= 1;
                self.edit_log.push(EditEvent::Commit(EditTarget::Account(id)));
                true
            }
            Some(_) => {
                tracing::warn!(account = %id, "commit without matching begin");
                false
            }
            None => false,
        }
    }

    /// Run `f` on the account inside one edit bracket.
    /// Returns None (and opens nothing) when the account does not exist.
    pub fn edit_account<R, F>(&mut self, id: AccountId, f: F) -> Option<R>
    where
        F: FnOnce(&mut Account) -> R,
    {
        if !self.begin_account_edit(id) {
            return None;
        }
        let result = self.accounts.get_mut(&id).map(f);
        self.commit_account_edit(id);
        result
    }

    pub fn begin_transaction_edit(&mut self, id: TransactionId) -> bool {
        match self.transactions.get_mut(&id) {
            Some(tx) => {
                tx.edit_level += 1;
                self.edit_log
                    .push(EditEvent::Begin(EditTarget::Transaction(id)));
                true
            }
            None => false,
        }
    }

    /// Closes a transaction bracket. A destroyed transaction still logs the
    /// commit so the bracket pairs up.
    pub fn commit_transaction_edit(&mut self, id: TransactionId) -> bool {
        if let Some(tx) = self.transactions.get_mut(&id) {
            if tx.edit_level == 0 {
                return false;
            }
            tx.edit_level -= 1;
        }
        self.edit_log
            .push(EditEvent::Commit(EditTarget::Transaction(id)));
        true
    }

    // ========================================================================
    // ACCOUNTS
    // ========================================================================

    pub fn account(&self, id: AccountId) -> Option<&Account> {
        self.accounts.get(&id)
    }

    /// Mutable access for callers that already opened a bracket
    pub(crate) fn account_mut(&mut self, id: AccountId) -> Option<&mut Account> {
        let account = self.accounts.get_mut(&id)?;
        if account.edit_level == 0 {
            tracing::warn!(account = %id, "mutation outside an edit bracket");
        }
        Some(account)
    }

    pub fn contains_account(&self, id: AccountId) -> bool {
        self.accounts.contains_key(&id)
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn top_level_accounts(&self) -> &[AccountId] {
        &self.top_level
    }

    pub fn children_of(&self, id: AccountId) -> Vec<AccountId> {
        self.account(id)
            .map(|a| a.children.clone())
            .unwrap_or_default()
    }

    pub fn parent_of(&self, id: AccountId) -> Option<AccountId> {
        self.account(id).and_then(|a| a.parent)
    }

    /// Attach a detached account under `parent` (None = top level).
    /// Returns None when the parent is unknown.
    pub fn insert_account(&mut self, mut account: Account, parent: Option<AccountId>) -> Option<AccountId> {
        if let Some(p) = parent {
            if !self.contains_account(p) {
                return None;
            }
        }
        let id = account.id;
        account.parent = None;
        account.children.clear();
        account.splits.clear();
        account.edit_level = 0;
        self.accounts.insert(id, account);
        self.top_level.push(id);
        if parent.is_some() {
            self.move_account(id, parent);
        }
        Some(id)
    }

    /// Re-parent an account (None = top level).
    ///
    /// Refuses to make an account its own ancestor. Brackets the new parent
    /// around the insertion.
    pub fn move_account(&mut self, id: AccountId, new_parent: Option<AccountId>) -> bool {
        if !self.contains_account(id) {
            return false;
        }
        if let Some(p) = new_parent {
            if p == id || !self.contains_account(p) || self.has_ancestor(p, id) {
                return false;
            }
        }
        let old_parent = self.parent_of(id);
        if old_parent == new_parent && (new_parent.is_some() || self.top_level.contains(&id)) {
            return true;
        }

        if let Some(p) = new_parent {
            self.begin_account_edit(p);
        }

        match old_parent {
            Some(old) => {
                if let Some(a) = self.accounts.get_mut(&old) {
                    a.children.retain(|c| *c != id);
                }
            }
            None => self.top_level.retain(|c| *c != id),
        }

        match new_parent {
            Some(p) => {
                if let Some(a) = self.accounts.get_mut(&p) {
                    a.children.push(id);
                }
            }
            None => self.top_level.push(id),
        }
        if let Some(a) = self.accounts.get_mut(&id) {
            a.parent = new_parent;
        }

        if let Some(p) = new_parent {
            self.commit_account_edit(p);
        }
        true
    }

    /// Remove an account that has neither children nor splits
    pub fn remove_account(&mut self, id: AccountId) -> Option<Account> {
        let removable = self
            .account(id)
            .map(|a| a.children.is_empty() && a.splits.is_empty())
            .unwrap_or(false);
        if !removable {
            return None;
        }
        match self.parent_of(id) {
            Some(p) => {
                if let Some(a) = self.accounts.get_mut(&p) {
                    a.children.retain(|c| *c != id);
                }
            }
            None => self.top_level.retain(|c| *c != id),
        }
        self.accounts.remove(&id)
    }

    /// True when `ancestor` is a strict ancestor of `id`
    pub fn has_ancestor(&self, id: AccountId, ancestor: AccountId) -> bool {
        let mut current = self.parent_of(id);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.parent_of(p);
        }
        false
    }

    /// Topmost ancestor (the account itself when top level)
    pub fn root_ancestor(&self, id: AccountId) -> AccountId {
        let mut current = id;
        while let Some(p) = self.parent_of(current) {
            current = p;
        }
        current
    }

    /// All descendants, depth first
    pub fn descendants(&self, id: AccountId) -> Vec<AccountId> {
        let mut out = Vec::new();
        let mut stack: Vec<AccountId> = self.children_of(id).into_iter().rev().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children_of(next).into_iter().rev());
        }
        out
    }

    /// Names from the top level down, joined with `separator`
    pub fn full_name(&self, id: AccountId, separator: char) -> String {
        let mut names = Vec::new();
        let mut current = Some(id);
        while let Some(c) = current {
            match self.account(c) {
                Some(a) => {
                    names.push(a.name.as_str());
                    current = a.parent;
                }
                None => break,
            }
        }
        names.reverse();
        names.join(&separator.to_string())
    }

    /// Child of `parent` (None = top level) with this exact name
    pub fn child_named(&self, parent: Option<AccountId>, name: &str) -> Option<AccountId> {
        let candidates: Vec<AccountId> = match parent {
            Some(p) => self.children_of(p),
            None => self.top_level.clone(),
        };
        candidates
            .into_iter()
            .find(|c| self.account(*c).map(|a| a.name == name).unwrap_or(false))
    }

    pub fn find_by_full_name(&self, full_name: &str, separator: char) -> Option<AccountId> {
        let mut current: Option<AccountId> = None;
        for segment in full_name.split(separator) {
            current = Some(self.child_named(current, segment)?);
        }
        current
    }

    // ========================================================================
    // TRANSACTIONS AND SPLITS
    // ========================================================================

    pub fn transaction(&self, id: TransactionId) -> Option<&Transaction> {
        self.transactions.get(&id)
    }

    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.values()
    }

    pub fn split(&self, id: SplitId) -> Option<&Split> {
        self.splits.get(&id)
    }

    /// Transaction owning the split
    pub fn split_parent(&self, id: SplitId) -> Option<&Transaction> {
        self.split(id).and_then(|s| self.transaction(s.transaction))
    }

    pub fn split_account(&self, id: SplitId) -> Option<AccountId> {
        self.split(id).and_then(|s| s.account)
    }

    /// Splits of an account in ledger order
    pub fn account_splits(&self, id: AccountId) -> Vec<&Split> {
        self.account(id)
            .map(|a| a.splits.iter().filter_map(|s| self.split(*s)).collect())
            .unwrap_or_default()
    }

    pub fn new_transaction(&mut self, date_posted: NaiveDate, num: &str, description: &str) -> TransactionId {
        let tx = Transaction::new(date_posted, num, description);
        let id = tx.id;
        self.transactions.insert(id, tx);
        id
    }

    /// Attach a detached transaction (e.g. one loaded from storage).
    /// Its split list starts empty; add splits with `insert_split`.
    pub fn insert_transaction(&mut self, mut transaction: Transaction) -> TransactionId {
        let id = transaction.id;
        transaction.splits.clear();
        transaction.edit_level = 0;
        self.transactions.insert(id, transaction);
        id
    }

    /// Append a split to a transaction, linking it to `account`.
    /// Returns None when the transaction or the account is unknown.
    pub fn add_split(
        &mut self,
        transaction: TransactionId,
        account: Option<AccountId>,
        value: f64,
        quantity: f64,
        memo: &str,
    ) -> Option<SplitId> {
        self.insert_split(Split {
            id: SplitId::new(),
            transaction,
            account,
            memo: memo.to_string(),
            value,
            quantity,
            reconcile_state: ReconcileState::New,
            reconcile_date: None,
        })
    }

    /// Attach a fully built split to its transaction and account
    pub fn insert_split(&mut self, split: Split) -> Option<SplitId> {
        let transaction = split.transaction;
        let account = split.account;
        let date = self.transaction(transaction)?.date_posted;
        if let Some(a) = account {
            if !self.contains_account(a) {
                return None;
            }
        }

        let id = split.id;
        self.splits.insert(id, split);

        self.begin_transaction_edit(transaction);
        if let Some(tx) = self.transactions.get_mut(&transaction) {
            tx.splits.push(id);
        }
        self.commit_transaction_edit(transaction);

        if let Some(a) = account {
            self.link_split(a, id, date);
        }
        Some(id)
    }

    /// Reorder an account's splits by saved ledger position
    pub(crate) fn restore_split_order(&mut self, account: AccountId, positions: &HashMap<SplitId, i64>) {
        if let Some(a) = self.accounts.get_mut(&account) {
            a.splits.sort_by_key(|s| positions.get(s).copied().unwrap_or(i64::MAX));
        }
    }

    fn link_split(&mut self, account: AccountId, split: SplitId, date: NaiveDate) {
        let mut ordered: Vec<(NaiveDate, SplitId)> = self
            .account(account)
            .map(|a| {
                a.splits
                    .iter()
                    .map(|s| {
                        let d = self.split_parent(*s).map(|t| t.date_posted).unwrap_or(date);
                        (d, *s)
                    })
                    .collect()
            })
            .unwrap_or_default();
        ordered.push((date, split));
        // Stable: same-day splits keep insertion order
        ordered.sort_by_key(|(d, _)| *d);

        if let Some(a) = self.accounts.get_mut(&account) {
            a.splits = ordered.into_iter().map(|(_, s)| s).collect();
        }
    }

    /// Set the reconcile state of a split inside its transaction's bracket
    pub fn set_split_reconcile(&mut self, id: SplitId, state: ReconcileState, date: Option<NaiveDate>) -> bool {
        let tx = match self.split(id) {
            Some(s) => s.transaction,
            None => return false,
        };
        self.begin_transaction_edit(tx);
        if let Some(split) = self.splits.get_mut(&id) {
            split.reconcile_state = state;
            split.reconcile_date = date;
        }
        self.commit_transaction_edit(tx);
        true
    }

    /// Destroy a transaction and its splits. Must be called inside a
    /// transaction bracket. Returns the accounts that lost splits.
    pub fn destroy_transaction(&mut self, id: TransactionId) -> Vec<AccountId> {
        let tx = match self.transactions.get(&id) {
            Some(tx) => tx,
            None => return Vec::new(),
        };
        if tx.edit_level == 0 {
            tracing::warn!(transaction = %id, "destroy outside an edit bracket");
        }
        let split_ids = tx.splits.clone();

        let mut affected = Vec::new();
        for sid in split_ids {
            if let Some(split) = self.splits.remove(&sid) {
                if let Some(a) = split.account {
                    if let Some(account) = self.accounts.get_mut(&a) {
                        account.splits.retain(|s| *s != sid);
                    }
                    if !affected.contains(&a) {
                        affected.push(a);
                    }
                }
            }
        }
        self.transactions.remove(&id);
        affected
    }

    /// True when every split of the transaction other than `excluded` belongs
    /// to an account whose currency or security is `commodity`.
    ///
    /// An unset commodity is never common. Splits without an account are
    /// ignored.
    pub fn is_common_excl_currency(
        &self,
        transaction: TransactionId,
        commodity: Option<&Commodity>,
        excluded: SplitId,
    ) -> bool {
        let commodity = match commodity {
            Some(c) => c,
            None => return false,
        };
        let tx = match self.transaction(transaction) {
            Some(tx) => tx,
            None => return false,
        };

        tx.splits
            .iter()
            .filter(|sid| **sid != excluded)
            .filter_map(|sid| self.split_account(*sid))
            .filter_map(|aid| self.account(aid))
            .all(|a| {
                commodity_equiv(a.currency.as_ref(), Some(commodity))
                    || commodity_equiv(a.security.as_ref(), Some(commodity))
            })
    }

    // ========================================================================
    // BALANCES
    // ========================================================================

    fn sum_splits<F>(&self, id: AccountId, include: F, shares: bool) -> f64
    where
        F: Fn(&Split) -> bool,
    {
        self.account_splits(id)
            .into_iter()
            .filter(|s| include(s))
            .map(|s| if shares { s.quantity } else { s.value })
            .sum()
    }

    pub fn balance(&self, id: AccountId) -> f64 {
        self.sum_splits(id, |_| true, false)
    }

    pub fn share_balance(&self, id: AccountId) -> f64 {
        self.sum_splits(id, |_| true, true)
    }

    pub fn reconciled_balance(&self, id: AccountId) -> f64 {
        self.sum_splits(id, |s| s.is_reconciled(), false)
    }

    pub fn share_reconciled_balance(&self, id: AccountId) -> f64 {
        self.sum_splits(id, |s| s.is_reconciled(), true)
    }
}

// ============================================================================
// TESTS
// ============================================================================
