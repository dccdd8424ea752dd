// 🔁 Propagation - Keeping commodities and types consistent across accounts
//
// Changing an account's currency or security can strand the transactions it
// shares with other accounts. The closure below walks the "shares a
// transaction with" graph from the edited account and schedules the same
// commodity switch on every account still using the old one. Type changes
// cascade down (incompatible children) or across (incompatible new parent).
//
// Nothing is mutated while planning. The plan is shown as diff rows, passed
// to a ChangeVerifier, and only then applied one bracket per account.

use crate::book::Book;
use crate::entities::{optional_printname, AccountId, AccountType, Commodity};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// PLANNED CHANGES
// ============================================================================

/// Scheduled field changes, keyed by account. An account appears at most
/// once per map; the first schedule wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountChanges {
    pub currency: BTreeMap<AccountId, Option<Commodity>>,
    pub security: BTreeMap<AccountId, Option<Commodity>>,
    pub account_type: BTreeMap<AccountId, AccountType>,
}

impl AccountChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.currency.is_empty() && self.security.is_empty() && self.account_type.is_empty()
    }

    /// Total scheduled entries across the three maps
    pub fn len(&self) -> usize {
        self.currency.len() + self.security.len() + self.account_type.len()
    }

    /// Diff rows for confirmation, sorted by account full name then field.
    /// The edited account itself is left out.
    pub fn rows(&self, book: &Book, edited: AccountId, separator: char) -> Vec<ChangeRow> {
        let mut rows = Vec::new();

        for (id, new) in &self.currency {
            if let Some(account) = book.account(*id).filter(|_| *id != edited) {
                rows.push(ChangeRow {
                    full_name: book.full_name(*id, separator),
                    field: AccountField::Currency,
                    old_value: optional_printname(account.currency.as_ref()),
                    new_value: optional_printname(new.as_ref()),
                });
            }
        }

        for (id, new) in &self.security {
            if let Some(account) = book.account(*id).filter(|_| *id != edited) {
                rows.push(ChangeRow {
                    full_name: book.full_name(*id, separator),
                    field: AccountField::Security,
                    old_value: optional_printname(account.security.as_ref()),
                    new_value: optional_printname(new.as_ref()),
                });
            }
        }

        for (id, new) in &self.account_type {
            if let Some(account) = book.account(*id).filter(|_| *id != edited) {
                rows.push(ChangeRow {
                    full_name: book.full_name(*id, separator),
                    field: AccountField::Type,
                    old_value: account.account_type.as_str().to_string(),
                    new_value: new.as_str().to_string(),
                });
            }
        }

        rows.sort_by(|a, b| {
            a.full_name
                .cmp(&b.full_name)
                .then(a.field.cmp(&b.field))
        });
        rows
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AccountField {
    Currency,
    Security,
    Type,
}

impl AccountField {
    pub fn label(&self) -> &'static str {
        match self {
            AccountField::Currency => "Currency",
            AccountField::Security => "Security",
            AccountField::Type => "Type",
        }
    }
}

impl fmt::Display for AccountField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One line of the "these accounts will also change" table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRow {
    pub full_name: String,
    pub field: AccountField,
    pub old_value: String,
    pub new_value: String,
}

// ============================================================================
// SEAMS
// ============================================================================

/// Confirmation primitive. Returning false cancels the whole edit.
pub trait ChangeVerifier {
    fn verify(&mut self, rows: &[ChangeRow]) -> bool;
}

impl<F> ChangeVerifier for F
where
    F: FnMut(&[ChangeRow]) -> bool,
{
    fn verify(&mut self, rows: &[ChangeRow]) -> bool {
        self(rows)
    }
}

/// Open ledger views that must be torn down when an account changes type
pub trait LedgerDisplays {
    fn destroy_ledger_display(&mut self, account: AccountId);
}

/// For callers with no ledger views open
#[derive(Debug, Default)]
pub struct NoLedgerDisplays;

impl LedgerDisplays for NoLedgerDisplays {
    fn destroy_ledger_display(&mut self, _account: AccountId) {}
}

// ============================================================================
// CURRENCY / SECURITY CLOSURE
// ============================================================================

fn matches_old(old: Option<&Commodity>, current: Option<&Commodity>) -> bool {
    match (old, current) {
        (Some(old), Some(current)) => old.equiv(current),
        _ => false,
    }
}

fn differs(a: Option<&Commodity>, b: Option<&Commodity>) -> bool {
    !crate::entities::commodity_equiv(a, b)
}

/// Compute every currency and security change needed so that `account` can
/// switch to `new_currency` / `new_security` without leaving a transaction
/// with mismatched commodities.
///
/// Returns empty maps when both commodities are unchanged or the account is
/// unknown.
pub fn compute_currency_security_changes(
    book: &Book,
    account: AccountId,
    new_currency: Option<&Commodity>,
    new_security: Option<&Commodity>,
) -> AccountChanges {
    let mut changes = AccountChanges::new();

    let edited = match book.account(account) {
        Some(a) => a,
        None => return changes,
    };
    let old_currency = edited.currency.clone();
    let old_security = edited.security.clone();

    let currency_changed = differs(new_currency, old_currency.as_ref());
    let security_changed = differs(new_security, old_security.as_ref());

    if !currency_changed && !security_changed {
        return changes;
    }

    if currency_changed {
        changes.currency.insert(account, new_currency.cloned());
    }
    if security_changed {
        changes.security.insert(account, new_security.cloned());
    }

    let mut stack = vec![account];

    while let Some(current) = stack.pop() {
        let splits = match book.account(current) {
            Some(a) => a.splits().to_vec(),
            None => continue,
        };

        for split_id in splits {
            let tx = match book.split_parent(split_id) {
                Some(tx) => tx,
                None => continue,
            };

            if book.is_common_excl_currency(tx.id, new_currency, split_id)
                || book.is_common_excl_currency(tx.id, new_security, split_id)
            {
                continue;
            }

            for sibling in tx.splits() {
                let other_id = match book.split_account(*sibling) {
                    Some(a) if a != current => a,
                    _ => continue,
                };
                let other = match book.account(other_id) {
                    Some(a) => a,
                    None => continue,
                };

                if changes.currency.contains_key(&other_id)
                    || changes.security.contains_key(&other_id)
                {
                    continue;
                }

                let mut scheduled = false;

                if currency_changed && matches_old(old_currency.as_ref(), other.currency.as_ref()) {
                    changes.currency.entry(other_id).or_insert_with(|| new_currency.cloned());
                    scheduled = true;
                }
                if security_changed && matches_old(old_security.as_ref(), other.currency.as_ref()) {
                    changes.currency.entry(other_id).or_insert_with(|| new_security.cloned());
                    scheduled = true;
                }
                if security_changed && matches_old(old_security.as_ref(), other.security.as_ref()) {
                    changes.security.entry(other_id).or_insert_with(|| new_security.cloned());
                    scheduled = true;
                }
                if currency_changed && matches_old(old_currency.as_ref(), other.security.as_ref()) {
                    changes.security.entry(other_id).or_insert_with(|| new_currency.cloned());
                    scheduled = true;
                }

                if scheduled {
                    stack.push(other_id);
                }
            }
        }
    }

    tracing::debug!(
        account = %account,
        currency_changes = changes.currency.len(),
        security_changes = changes.security.len(),
        "computed commodity propagation"
    );
    changes
}

// ============================================================================
// TYPE CASCADE
// ============================================================================

/// Schedule `new_type` for `root` and all of its descendants, skipping the
/// subtree rooted at `except`.
pub fn change_account_types(
    book: &Book,
    changes: &mut BTreeMap<AccountId, AccountType>,
    root: AccountId,
    except: Option<AccountId>,
    new_type: AccountType,
) {
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        if Some(id) == except || !book.contains_account(id) {
            continue;
        }
        changes.insert(id, new_type);
        stack.extend(book.children_of(id).into_iter().rev());
    }
}

/// Full plan for an account edit: commodity closure plus type cascade.
///
/// `new_parent` of None means top level.
pub fn plan_edit(
    book: &Book,
    account: AccountId,
    new_currency: Option<&Commodity>,
    new_security: Option<&Commodity>,
    new_type: AccountType,
    new_parent: Option<AccountId>,
) -> AccountChanges {
    let mut changes = compute_currency_security_changes(book, account, new_currency, new_security);

    let current = match book.account(account) {
        Some(a) => a,
        None => return changes,
    };

    let change_children =
        current.has_children() && !AccountType::compatible(current.account_type, new_type);

    let change_all = new_parent
        .and_then(|p| book.account(p))
        .map(|p| !AccountType::compatible(p.account_type, new_type))
        .unwrap_or(false);

    if change_children {
        change_account_types(book, &mut changes.account_type, account, None, new_type);
    }

    if let (true, Some(parent)) = (change_all, new_parent) {
        let ancestor = book.root_ancestor(parent);
        change_account_types(book, &mut changes.account_type, ancestor, Some(account), new_type);
    }

    if change_children || change_all {
        tracing::debug!(
            account = %account,
            new_type = %new_type,
            type_changes = changes.account_type.len(),
            "type cascade"
        );
    }
    changes
}

/// Ask the verifier about the rows. No rows means implicit acceptance.
pub fn confirm_changes<V>(
    book: &Book,
    changes: &AccountChanges,
    edited: AccountId,
    separator: char,
    verifier: &mut V,
) -> bool
where
    V: ChangeVerifier + ?Sized,
{
    let rows = changes.rows(book, edited, separator);
    if rows.is_empty() {
        return true;
    }
    verifier.verify(&rows)
}

// ============================================================================
// COMMIT PHASE
// ============================================================================

/// Apply the planned changes: currency entries, then security, then type.
/// Each entry is its own edit bracket; there is no rollback across accounts.
///
/// Returns the number of brackets committed.
pub fn apply_changes<D>(book: &mut Book, changes: &AccountChanges, displays: &mut D) -> usize
where
    D: LedgerDisplays + ?Sized,
{
    let mut committed = 0;

    for (id, currency) in &changes.currency {
        if book
            .edit_account(*id, |a| a.currency = currency.clone())
            .is_some()
        {
            committed += 1;
        }
    }

    for (id, security) in &changes.security {
        if book
            .edit_account(*id, |a| a.security = security.clone())
            .is_some()
        {
            committed += 1;
        }
    }

    for (id, new_type) in &changes.account_type {
        let current = match book.account(*id) {
            Some(a) => a.account_type,
            None => continue,
        };
        if current != *new_type {
            displays.destroy_ledger_display(*id);
        }
        book.edit_account(*id, |a| {
            if a.account_type != *new_type {
                a.account_type = *new_type;
            }
        });
        committed += 1;
    }

    tracing::info!(committed, "applied account changes");
    committed
}

// ============================================================================
// TESTS
// ============================================================================
