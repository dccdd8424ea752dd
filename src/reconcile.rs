// ⚖️ Reconcile Session - Matching an account against a bank statement
//
// The user enters the statement's ending balance and date, then ticks the
// splits that appear on the statement. The session keeps two lists (money
// in, money out) and recalculates:
//
//   reconciled = starting + ticked debits - ticked credits
//   difference = ending - reconciled
//
// Finishing is only "clean" when the difference is zero; otherwise the user
// must confirm. Values are stored with the book's sign convention and only
// flipped for display on reverse-balance accounts.

use crate::amount::{amounts_equal, format_amount, normalize_entry, parse_amount, PrintFlags};
use crate::book::Book;
use crate::config::LedgerConfig;
use crate::entities::{AccountId, AccountType, ReconcileState, SplitId};
use crate::error::LedgerResult;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

pub const UNBALANCED_FINISH_MSG: &str = "The account is not balanced.\nAre you sure you want to finish?";
pub const CANCEL_CHANGES_MSG: &str =
    "You have made changes to this reconcile window.\nAre you sure you want to cancel?";
pub const DELETE_TRANSACTION_MSG: &str = "Are you sure you want to delete the current transaction?";

// ============================================================================
// CONFIRMATION
// ============================================================================

/// Yes/no question put to the user
pub trait Confirm {
    fn confirm(&mut self, message: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, message: &str) -> bool {
        self(message)
    }
}

// ============================================================================
// LISTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ListKind {
    Debit,
    Credit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    /// Date, then num
    #[default]
    Standard,
    Num,
    Description,
    Amount,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileEntry {
    pub split: SplitId,
    pub date: NaiveDate,
    pub num: String,
    pub description: String,
    /// Absolute amount, in shares for share-based accounts
    pub amount: f64,
    pub checked: bool,
}

fn num_key(num: &str) -> (Option<i64>, &str) {
    (num.trim().parse::<i64>().ok(), num)
}

fn compare_entries(order: SortOrder, a: &ReconcileEntry, b: &ReconcileEntry) -> Ordering {
    let by_date = a.date.cmp(&b.date);
    let by_num = || {
        let (na, sa) = num_key(&a.num);
        let (nb, sb) = num_key(&b.num);
        match (na, nb) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => sa.cmp(sb),
        }
    };
    match order {
        SortOrder::Standard => by_date.then_with(by_num),
        SortOrder::Num => by_num().then(by_date),
        SortOrder::Description => a.description.cmp(&b.description).then(by_date),
        SortOrder::Amount => a
            .amount
            .partial_cmp(&b.amount)
            .unwrap_or(Ordering::Equal)
            .then(by_date),
    }
}

/// One side of the reconcile window
#[derive(Debug, Clone)]
pub struct ReconcileList {
    kind: ListKind,
    entries: Vec<ReconcileEntry>,
    sort: SortOrder,
    current: Option<SplitId>,
    changed: bool,
}

impl ReconcileList {
    pub fn new(kind: ListKind) -> Self {
        ReconcileList {
            kind,
            entries: Vec::new(),
            sort: SortOrder::Standard,
            current: None,
            changed: false,
        }
    }

    /// Reload from the book, keeping ticks and the selection for splits that
    /// are still present. Cleared splits start out ticked.
    pub fn refresh(&mut self, book: &Book, account: AccountId, use_shares: bool) {
        let ticked: HashSet<SplitId> = self
            .entries
            .iter()
            .filter(|e| e.checked)
            .map(|e| e.split)
            .collect();
        let known: HashSet<SplitId> = self.entries.iter().map(|e| e.split).collect();

        let mut entries = Vec::new();
        for split in book.account_splits(account) {
            if split.is_reconciled() {
                continue;
            }
            let amount = if use_shares { split.quantity } else { split.value };
            let belongs = match self.kind {
                ListKind::Debit => amount >= 0.0,
                ListKind::Credit => amount < 0.0,
            };
            if !belongs {
                continue;
            }
            let tx = match book.transaction(split.transaction) {
                Some(tx) => tx,
                None => continue,
            };
            let checked = if known.contains(&split.id) {
                ticked.contains(&split.id)
            } else {
                split.reconcile_state == ReconcileState::Cleared
            };
            entries.push(ReconcileEntry {
                split: split.id,
                date: tx.date_posted,
                num: tx.num.clone(),
                description: tx.description.clone(),
                amount: amount.abs(),
                checked,
            });
        }

        self.entries = entries;
        if let Some(current) = self.current {
            if !self.entries.iter().any(|e| e.split == current) {
                self.current = None;
            }
        }
        self.apply_sort();
    }

    fn apply_sort(&mut self) {
        let order = self.sort;
        self.entries.sort_by(|a, b| compare_entries(order, a, b));
    }

    pub fn kind(&self) -> ListKind {
        self.kind
    }

    pub fn entries(&self) -> &[ReconcileEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort
    }

    /// Returns false when the order was already in effect
    pub fn set_sort_order(&mut self, order: SortOrder) -> bool {
        if self.sort == order {
            return false;
        }
        self.sort = order;
        self.apply_sort();
        true
    }

    pub fn current(&self) -> Option<SplitId> {
        self.current
    }

    pub fn select(&mut self, split: SplitId) -> bool {
        if self.entries.iter().any(|e| e.split == split) {
            self.current = Some(split);
            true
        } else {
            false
        }
    }

    pub fn unselect_all(&mut self) {
        self.current = None;
    }

    /// Flip the tick on a split. Returns the new state, None if not listed.
    pub fn toggle(&mut self, split: SplitId) -> Option<bool> {
        let entry = self.entries.iter_mut().find(|e| e.split == split)?;
        entry.checked = !entry.checked;
        self.changed = true;
        Some(entry.checked)
    }

    pub fn is_checked(&self, split: SplitId) -> bool {
        self.entries.iter().any(|e| e.split == split && e.checked)
    }

    pub fn changed(&self) -> bool {
        self.changed
    }

    /// Sum of the ticked amounts (always non-negative)
    pub fn reconciled_total(&self) -> f64 {
        self.entries.iter().filter(|e| e.checked).map(|e| e.amount).sum()
    }

    /// Mark every ticked split reconciled as of `date`
    pub fn commit(&self, book: &mut Book, date: NaiveDate) -> usize {
        let mut count = 0;
        for entry in self.entries.iter().filter(|e| e.checked) {
            if book.set_split_reconcile(entry.split, ReconcileState::Reconciled, Some(date)) {
                count += 1;
            }
        }
        count
    }
}

// ============================================================================
// STATEMENT DIALOG
// ============================================================================

/// The "ending balance / statement date" prompt shown before the window
/// opens and again from "change statement info".
#[derive(Debug, Clone)]
pub struct StatementDialog {
    shares: bool,
    reverse: bool,
    mnemonic: String,
    starting: f64,
    ending_entry: String,
    pub date: NaiveDate,
}

impl StatementDialog {
    pub fn new(
        book: &Book,
        account: AccountId,
        new_ending: f64,
        date: NaiveDate,
        config: &LedgerConfig,
    ) -> Option<Self> {
        let acct = book.account(account)?;
        let shares = acct.account_type.is_share_based();
        let reverse = acct.account_type.reverses_balance(config.reverse_balance);
        let mnemonic = acct.currency.as_ref().map(|c| c.mnemonic.clone()).unwrap_or_default();

        let mut starting = if shares {
            book.share_reconciled_balance(account)
        } else {
            book.reconciled_balance(account)
        };
        let mut ending = new_ending;
        if reverse {
            starting = -starting;
            ending = -ending;
        }

        let ending_entry = format_amount(ending, PrintFlags::for_shares(shares).without_symbol(), &mnemonic);
        Some(StatementDialog {
            shares,
            reverse,
            mnemonic,
            starting,
            ending_entry,
            date,
        })
    }

    /// Starting balance as displayed (sign already flipped when reversed)
    pub fn starting_text(&self) -> String {
        format_amount(self.starting, PrintFlags::for_shares(self.shares), &self.mnemonic)
    }

    pub fn ending_entry(&self) -> &str {
        &self.ending_entry
    }

    pub fn set_ending_entry(&mut self, text: &str) {
        self.ending_entry = text.to_string();
    }

    /// Re-print the entry in normalized form, as on focus-out
    pub fn normalize(&mut self) {
        self.ending_entry = normalize_entry(&self.ending_entry, self.shares, &self.mnemonic);
    }

    /// OK pressed: the ending balance in book sign convention and the date
    pub fn accept(&self) -> LedgerResult<(f64, NaiveDate)> {
        let mut ending = parse_amount(&self.ending_entry)?;
        if self.reverse {
            ending = -ending;
        }
        Ok((ending, self.date))
    }
}

// ============================================================================
// BALANCES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BalanceSummary {
    pub starting: f64,
    pub ending: f64,
    /// Ticked debit total (non-negative)
    pub debit: f64,
    /// Ticked credit total (non-negative)
    pub credit: f64,
    pub reconciled: f64,
    pub difference: f64,
    /// Finish is enabled only when true
    pub balanced: bool,
}

impl BalanceSummary {
    /// Same figures with the sign flipped where the account displays reversed.
    /// Debit and credit totals are never flipped.
    pub fn for_display(&self, reverse: bool) -> BalanceSummary {
        if !reverse {
            return *self;
        }
        BalanceSummary {
            starting: -self.starting,
            ending: -self.ending,
            reconciled: -self.reconciled,
            difference: -self.difference,
            ..*self
        }
    }
}

/// Payment the user is offered after reconciling a credit card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSuggestion {
    /// The credit card account
    pub to_account: AccountId,
    /// Latest bank/cash/asset account that paid into the card
    pub from_account: Option<AccountId>,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FinishOutcome {
    /// The user backed out of an unbalanced finish
    Declined,
    Finished {
        reconciled: usize,
        payment: Option<PaymentSuggestion>,
    },
}

/// Find an account that looks like the one paying this (credit card)
/// account: the most recent incoming split whose transaction also touches a
/// bank, cash or asset account.
pub fn find_payment_account(book: &Book, account: AccountId) -> Option<AccountId> {
    let splits = book.account(account)?.splits().to_vec();

    for split_id in splits.into_iter().rev() {
        let split = match book.split(split_id) {
            Some(s) => s,
            None => continue,
        };
        // purchases
        if split.quantity <= 0.0 {
            continue;
        }
        let tx = match book.transaction(split.transaction) {
            Some(tx) => tx,
            None => continue,
        };

        for sibling in tx.splits() {
            if *sibling == split_id {
                continue;
            }
            let other = match book.split_account(*sibling) {
                Some(a) if a != account => a,
                _ => continue,
            };
            if let Some(a) = book.account(other) {
                if matches!(
                    a.account_type,
                    AccountType::Bank | AccountType::Cash | AccountType::Asset
                ) {
                    return Some(other);
                }
            }
        }
    }
    None
}

// ============================================================================
// SESSION
// ============================================================================

#[derive(Debug, Clone)]
pub struct ReconcileSession {
    account: AccountId,
    account_type: AccountType,
    use_shares: bool,
    reverse: bool,
    mnemonic: String,
    new_ending: f64,
    statement_date: NaiveDate,
    tolerance: f64,
    debit: ReconcileList,
    credit: ReconcileList,
    delete_refresh: bool,
    title: String,
}

impl ReconcileSession {
    /// Default ending balance: the account's current balance (in shares
    /// for share-based accounts)
    pub fn default_ending(book: &Book, account: AccountId) -> f64 {
        match book.account(account) {
            Some(a) if a.account_type.is_share_based() => book.share_balance(account),
            Some(_) => book.balance(account),
            None => 0.0,
        }
    }

    /// Open a session once the statement dialog was accepted
    pub fn open(
        book: &Book,
        account: AccountId,
        new_ending: f64,
        statement_date: NaiveDate,
        config: &LedgerConfig,
    ) -> Option<Self> {
        let acct = book.account(account)?;
        let account_type = acct.account_type;
        let use_shares = account_type.is_share_based();

        let mut session = ReconcileSession {
            account,
            account_type,
            use_shares,
            reverse: account_type.reverses_balance(config.reverse_balance),
            mnemonic: acct.currency.as_ref().map(|c| c.mnemonic.clone()).unwrap_or_default(),
            new_ending,
            statement_date,
            tolerance: config.balance_tolerance,
            debit: ReconcileList::new(ListKind::Debit),
            credit: ReconcileList::new(ListKind::Credit),
            delete_refresh: false,
            title: String::new(),
        };
        session.refresh(book);
        session.refresh_title(book, config.account_separator);

        tracing::debug!(account = %account, ending = new_ending, "reconcile window opened");
        Some(session)
    }

    pub fn account(&self) -> AccountId {
        self.account
    }

    pub fn use_shares(&self) -> bool {
        self.use_shares
    }

    pub fn reverses_balance(&self) -> bool {
        self.reverse
    }

    pub fn new_ending(&self) -> f64 {
        self.new_ending
    }

    pub fn statement_date(&self) -> NaiveDate {
        self.statement_date
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn refresh_title(&mut self, book: &Book, separator: char) {
        self.title = format!("{} - Reconcile", book.full_name(self.account, separator));
    }

    /// Whether the account's ledger needs a refresh when the window closes
    pub fn needs_refresh_on_close(&self) -> bool {
        self.delete_refresh
    }

    pub fn list(&self, kind: ListKind) -> &ReconcileList {
        match kind {
            ListKind::Debit => &self.debit,
            ListKind::Credit => &self.credit,
        }
    }

    fn list_mut(&mut self, kind: ListKind) -> &mut ReconcileList {
        match kind {
            ListKind::Debit => &mut self.debit,
            ListKind::Credit => &mut self.credit,
        }
    }

    /// Reload both lists from the book
    pub fn refresh(&mut self, book: &Book) {
        self.debit.refresh(book, self.account, self.use_shares);
        self.credit.refresh(book, self.account, self.use_shares);
    }

    /// Frame titles for the (debit, credit) lists
    pub fn list_titles(&self, use_accounting_labels: bool) -> (&'static str, &'static str) {
        if use_accounting_labels {
            ("Debits", "Credits")
        } else {
            self.account_type.debit_credit_labels()
        }
    }

    pub fn toggle(&mut self, kind: ListKind, split: SplitId) -> Option<bool> {
        self.list_mut(kind).toggle(split)
    }

    /// Select a split in one list; the other list loses its selection
    pub fn select(&mut self, kind: ListKind, split: SplitId) -> bool {
        let other = match kind {
            ListKind::Debit => ListKind::Credit,
            ListKind::Credit => ListKind::Debit,
        };
        if self.list_mut(kind).select(split) {
            self.list_mut(other).unselect_all();
            true
        } else {
            false
        }
    }

    /// The selected split, debit list first
    pub fn current_split(&self) -> Option<SplitId> {
        self.debit.current().or_else(|| self.credit.current())
    }

    /// Edit and delete actions are enabled only with a selection
    pub fn actions_enabled(&self) -> bool {
        self.current_split().is_some()
    }

    pub fn sort(&mut self, kind: ListKind, order: SortOrder) -> bool {
        self.list_mut(kind).set_sort_order(order)
    }

    pub fn recalculate(&self, book: &Book) -> BalanceSummary {
        let starting = if self.use_shares {
            book.share_reconciled_balance(self.account)
        } else {
            book.reconciled_balance(self.account)
        };
        let debit = self.debit.reconciled_total();
        let credit = self.credit.reconciled_total();
        let reconciled = starting + debit - credit;
        let difference = self.new_ending - reconciled;

        BalanceSummary {
            starting,
            ending: self.new_ending,
            debit,
            credit,
            reconciled,
            difference,
            balanced: amounts_equal(difference, 0.0, self.tolerance),
        }
    }

    /// Display strings for the summary labels:
    /// (starting, ending, debit, credit, reconciled, difference)
    pub fn summary_labels(&self, book: &Book) -> [String; 6] {
        let s = self.recalculate(book).for_display(self.reverse);
        let flags = PrintFlags::for_shares(self.use_shares);
        [
            format_amount(s.starting, flags, &self.mnemonic),
            format_amount(s.ending, flags, &self.mnemonic),
            format_amount(s.debit, flags, &self.mnemonic),
            format_amount(s.credit, flags, &self.mnemonic),
            format_amount(s.reconciled, flags, &self.mnemonic),
            format_amount(s.difference, flags, &self.mnemonic),
        ]
    }

    /// Replace the statement's ending balance and date
    pub fn change_statement(&mut self, book: &Book, new_ending: f64, date: NaiveDate) -> BalanceSummary {
        self.new_ending = new_ending;
        self.statement_date = date;
        self.recalculate(book)
    }

    /// Finish reconciling: confirm if unbalanced, mark ticked splits
    /// reconciled, and maybe suggest a credit card payment.
    pub fn finish<C>(&mut self, book: &mut Book, config: &LedgerConfig, confirm: &mut C) -> FinishOutcome
    where
        C: Confirm + ?Sized,
    {
        let summary = self.recalculate(book);
        if !summary.balanced && !confirm.confirm(UNBALANCED_FINISH_MSG) {
            return FinishOutcome::Declined;
        }

        let date = self.statement_date;
        let reconciled = self.credit.commit(book, date) + self.debit.commit(book, date);
        self.delete_refresh = true;

        let payment = if config.auto_credit_card_payments
            && self.account_type == AccountType::Credit
            && self.new_ending < 0.0
            && !amounts_equal(self.new_ending, 0.0, self.tolerance)
        {
            Some(PaymentSuggestion {
                to_account: self.account,
                from_account: find_payment_account(book, self.account),
                amount: -self.new_ending,
            })
        } else {
            None
        };

        tracing::info!(
            account = %self.account,
            reconciled,
            balanced = summary.balanced,
            payment = payment.is_some(),
            "reconcile finished"
        );
        FinishOutcome::Finished { reconciled, payment }
    }

    /// Returns true when the window may close
    pub fn cancel<C>(&self, confirm: &mut C) -> bool
    where
        C: Confirm + ?Sized,
    {
        if self.debit.changed() || self.credit.changed() {
            return confirm.confirm(CANCEL_CHANGES_MSG);
        }
        true
    }

    /// Delete the selected split's transaction. Returns the accounts that
    /// were touched, or None when nothing was deleted.
    pub fn delete_current_transaction<C>(&mut self, book: &mut Book, confirm: &mut C) -> Option<Vec<AccountId>>
    where
        C: Confirm + ?Sized,
    {
        let split = self.current_split()?;
        let tx = book.split(split)?.transaction;

        if !confirm.confirm(DELETE_TRANSACTION_MSG) {
            return None;
        }

        book.begin_transaction_edit(tx);
        let affected = book.destroy_transaction(tx);
        book.commit_transaction_edit(tx);

        self.delete_refresh = true;
        self.refresh(book);

        tracing::info!(transaction = %tx, affected = affected.len(), "transaction deleted from reconcile window");
        Some(affected)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Account, Commodity};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, d).unwrap()
    }

    fn yes(_: &str) -> bool {
        true
    }

    fn no(_: &str) -> bool {
        false
    }

    struct Fixture {
        book: Book,
        checking: AccountId,
        card: AccountId,
        groceries: AccountId,
    }

    fn fixture() -> Fixture {
        let usd = Commodity::currency("USD", "US Dollar");
        let mut book = Book::new();
        let checking = book
            .insert_account(Account::new("Checking", AccountType::Bank).with_currency(usd.clone()), None)
            .unwrap();
        let card = book
            .insert_account(Account::new("Visa", AccountType::Credit).with_currency(usd.clone()), None)
            .unwrap();
        let groceries = book
            .insert_account(Account::new("Groceries", AccountType::Expense).with_currency(usd), None)
            .unwrap();

        let tx = book.new_transaction(day(1), "100", "Paycheck deposit");
        book.add_split(tx, Some(checking), 1000.0, 1000.0, "");
        book.add_split(tx, None, -1000.0, -1000.0, "");

        let tx = book.new_transaction(day(3), "101", "Market");
        book.add_split(tx, Some(card), -80.0, -80.0, "");
        book.add_split(tx, Some(groceries), 80.0, 80.0, "");

        let tx = book.new_transaction(day(5), "102", "Card payment");
        book.add_split(tx, Some(checking), -50.0, -50.0, "");
        book.add_split(tx, Some(card), 50.0, 50.0, "");

        Fixture { book, checking, card, groceries }
    }

    #[test]
    fn test_lists_split_by_sign() {
        let f = fixture();
        let session = ReconcileSession::open(&f.book, f.checking, 950.0, day(30), &LedgerConfig::default()).unwrap();

        assert_eq!(session.list(ListKind::Debit).len(), 1);
        assert_eq!(session.list(ListKind::Credit).len(), 1);
        assert_eq!(session.list(ListKind::Credit).entries()[0].amount, 50.0);
        assert_eq!(session.title(), "Checking - Reconcile");
    }

    #[test]
    fn test_recalculate_and_balance() {
        let f = fixture();
        let mut session =
            ReconcileSession::open(&f.book, f.checking, 950.0, day(30), &LedgerConfig::default()).unwrap();

        let summary = session.recalculate(&f.book);
        assert_eq!(summary.starting, 0.0);
        assert_eq!(summary.difference, 950.0);
        assert!(!summary.balanced);

        let deposit = session.list(ListKind::Debit).entries()[0].split;
        let payment = session.list(ListKind::Credit).entries()[0].split;
        session.toggle(ListKind::Debit, deposit);
        session.toggle(ListKind::Credit, payment);

        let summary = session.recalculate(&f.book);
        assert_eq!(summary.debit, 1000.0);
        assert_eq!(summary.credit, 50.0);
        assert_eq!(summary.reconciled, 950.0);
        assert!(summary.balanced);
    }

    #[test]
    fn test_finish_marks_splits_reconciled() {
        let mut f = fixture();
        let config = LedgerConfig::default();
        let mut session = ReconcileSession::open(&f.book, f.checking, 1000.0, day(30), &config).unwrap();
        let deposit = session.list(ListKind::Debit).entries()[0].split;
        session.toggle(ListKind::Debit, deposit);

        let outcome = session.finish(&mut f.book, &config, &mut no);
        assert_eq!(
            outcome,
            FinishOutcome::Finished {
                reconciled: 1,
                payment: None
            }
        );
        let split = f.book.split(deposit).unwrap();
        assert!(split.is_reconciled());
        assert_eq!(split.reconcile_date, Some(day(30)));
        assert_eq!(f.book.reconciled_balance(f.checking), 1000.0);
        assert!(session.needs_refresh_on_close());
    }

    #[test]
    fn test_unbalanced_finish_needs_confirmation() {
        let mut f = fixture();
        let config = LedgerConfig::default();
        let mut session = ReconcileSession::open(&f.book, f.checking, 5.0, day(30), &config).unwrap();

        let mut asked = Vec::new();
        let mut decline = |msg: &str| {
            asked.push(msg.to_string());
            false
        };
        assert_eq!(session.finish(&mut f.book, &config, &mut decline), FinishOutcome::Declined);
        assert_eq!(asked, vec![UNBALANCED_FINISH_MSG.to_string()]);
        assert_eq!(f.book.reconciled_balance(f.checking), 0.0);

        assert!(matches!(
            session.finish(&mut f.book, &config, &mut yes),
            FinishOutcome::Finished { reconciled: 0, .. }
        ));
    }

    #[test]
    fn test_credit_card_payment_suggestion() {
        let mut f = fixture();
        let config = LedgerConfig::default();
        let mut session = ReconcileSession::open(&f.book, f.card, -30.0, day(30), &config).unwrap();
        for kind in [ListKind::Debit, ListKind::Credit] {
            let split = session.list(kind).entries()[0].split;
            session.toggle(kind, split);
        }

        let outcome = session.finish(&mut f.book, &config, &mut no);
        match outcome {
            FinishOutcome::Finished { payment: Some(p), .. } => {
                assert_eq!(p.to_account, f.card);
                assert_eq!(p.from_account, Some(f.checking));
                assert_eq!(p.amount, 30.0);
            }
            other => panic!("expected a payment suggestion, got {:?}", other),
        }
    }

    #[test]
    fn test_no_payment_when_disabled() {
        let mut f = fixture();
        let config = LedgerConfig {
            auto_credit_card_payments: false,
            ..Default::default()
        };
        let mut session = ReconcileSession::open(&f.book, f.card, -30.0, day(30), &config).unwrap();
        assert!(matches!(
            session.finish(&mut f.book, &config, &mut yes),
            FinishOutcome::Finished { payment: None, .. }
        ));
    }

    #[test]
    fn test_find_payment_account_ignores_purchases() {
        let f = fixture();
        assert_eq!(find_payment_account(&f.book, f.card), Some(f.checking));
        assert_eq!(find_payment_account(&f.book, f.groceries), None);
    }

    #[test]
    fn test_cancel_confirms_only_after_changes() {
        let f = fixture();
        let mut session =
            ReconcileSession::open(&f.book, f.checking, 0.0, day(30), &LedgerConfig::default()).unwrap();
        assert!(session.cancel(&mut no));

        let deposit = session.list(ListKind::Debit).entries()[0].split;
        session.toggle(ListKind::Debit, deposit);
        assert!(!session.cancel(&mut no));
        assert!(session.cancel(&mut yes));
    }

    #[test]
    fn test_single_selection_and_delete() {
        let mut f = fixture();
        let mut session =
            ReconcileSession::open(&f.book, f.checking, 0.0, day(30), &LedgerConfig::default()).unwrap();
        assert!(!session.actions_enabled());

        let deposit = session.list(ListKind::Debit).entries()[0].split;
        let payment = session.list(ListKind::Credit).entries()[0].split;
        session.select(ListKind::Debit, deposit);
        session.select(ListKind::Credit, payment);
        assert_eq!(session.list(ListKind::Debit).current(), None);
        assert_eq!(session.current_split(), Some(payment));

        assert!(session.delete_current_transaction(&mut f.book, &mut no).is_none());

        let affected = session.delete_current_transaction(&mut f.book, &mut yes).unwrap();
        assert_eq!(affected, vec![f.checking, f.card]);
        assert!(session.list(ListKind::Credit).is_empty());
        assert_eq!(session.current_split(), None);
    }

    #[test]
    fn test_sort_orders() {
        let mut f = fixture();
        let tx = f.book.new_transaction(day(2), "9", "Another deposit");
        f.book.add_split(tx, Some(f.checking), 20.0, 20.0, "");

        let mut session =
            ReconcileSession::open(&f.book, f.checking, 0.0, day(30), &LedgerConfig::default()).unwrap();
        let amounts = |s: &ReconcileSession| -> Vec<f64> {
            s.list(ListKind::Debit).entries().iter().map(|e| e.amount).collect()
        };
        assert_eq!(amounts(&session), vec![1000.0, 20.0]);

        assert!(session.sort(ListKind::Debit, SortOrder::Num));
        assert_eq!(amounts(&session), vec![20.0, 1000.0]);
        assert!(!session.sort(ListKind::Debit, SortOrder::Num));

        assert!(session.sort(ListKind::Debit, SortOrder::Description));
        assert_eq!(amounts(&session), vec![20.0, 1000.0]);

        assert!(session.sort(ListKind::Debit, SortOrder::Amount));
        assert_eq!(amounts(&session), vec![20.0, 1000.0]);
        assert_eq!(session.list(ListKind::Credit).sort_order(), SortOrder::Standard);
    }

    #[test]
    fn test_list_titles() {
        let f = fixture();
        let session =
            ReconcileSession::open(&f.book, f.checking, 0.0, day(30), &LedgerConfig::default()).unwrap();
        assert_eq!(session.list_titles(true), ("Debits", "Credits"));
        assert_eq!(session.list_titles(false), ("Deposit", "Withdrawal"));
    }

    #[test]
    fn test_statement_dialog_reverses_credit_accounts() {
        let f = fixture();
        let config = LedgerConfig::default();

        let mut dialog = StatementDialog::new(&f.book, f.card, -30.0, day(30), &config).unwrap();
        assert_eq!(dialog.ending_entry(), "30.00");
        assert_eq!(dialog.starting_text(), "0.00 USD");

        dialog.set_ending_entry("1234.5");
        dialog.normalize();
        assert_eq!(dialog.ending_entry(), "1,234.50");

        let (ending, date) = dialog.accept().unwrap();
        assert_eq!(ending, -1234.5);
        assert_eq!(date, day(30));
    }

    #[test]
    fn test_summary_labels_display_sign() {
        let f = fixture();
        let session =
            ReconcileSession::open(&f.book, f.card, -30.0, day(30), &LedgerConfig::default()).unwrap();
        let labels = session.summary_labels(&f.book);
        assert_eq!(labels[1], "30.00 USD");
        assert_eq!(labels[5], "30.00 USD");
    }
}
