// 🪟 UI Session - Registry of open dialog windows
//
// One edit window per account, one reconcile window per account, any number
// of new-account windows. The session also carries the small bits of state
// the dialogs share: last picked account type, default currency for new
// accounts, last statement date, and which accounts have a ledger open.

use crate::account_editor::{AccountEditor, EditOutcome};
use crate::book::Book;
use crate::config::LedgerConfig;
use crate::entities::{AccountId, AccountType, Commodity, NAMESPACE_ISO};
use crate::error::ValidationError;
use crate::propagation::{ChangeVerifier, LedgerDisplays};
use crate::reconcile::ReconcileSession;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug)]
pub struct UiSession {
    config: LedgerConfig,
    edit_windows: BTreeMap<AccountId, AccountEditor>,
    new_windows: Vec<AccountEditor>,
    reconcile_windows: BTreeMap<AccountId, ReconcileSession>,
    ledger_displays: BTreeSet<AccountId>,
    last_used_account_type: AccountType,
    default_currency: String,
    last_statement_date: Option<NaiveDate>,
}

impl UiSession {
    pub fn new(config: LedgerConfig) -> Self {
        let default_currency = config.default_currency.clone();
        UiSession {
            config,
            edit_windows: BTreeMap::new(),
            new_windows: Vec::new(),
            reconcile_windows: BTreeMap::new(),
            ledger_displays: BTreeSet::new(),
            last_used_account_type: AccountType::Bank,
            default_currency,
            last_statement_date: None,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn separator(&self) -> char {
        self.config.account_separator
    }

    // ========================================================================
    // SESSION DEFAULTS
    // ========================================================================

    pub fn last_used_account_type(&self) -> AccountType {
        self.last_used_account_type
    }

    pub fn set_default_currency(&mut self, mnemonic: &str) {
        self.default_currency = mnemonic.to_string();
    }

    /// Default currency for new accounts, resolved against the book's
    /// ISO currencies
    pub fn default_currency(&self, book: &Book) -> Option<Commodity> {
        book.commodities()
            .lookup(NAMESPACE_ISO, &self.default_currency)
            .cloned()
    }

    pub fn last_statement_date(&self) -> Option<NaiveDate> {
        self.last_statement_date
    }

    // ========================================================================
    // EDIT WINDOWS
    // ========================================================================

    /// Open the edit window for an account, or return the one already open
    pub fn open_edit_window(&mut self, book: &Book, account: AccountId) -> Option<&mut AccountEditor> {
        if !self.edit_windows.contains_key(&account) {
            let editor = AccountEditor::edit(book, account, self.separator())?;
            tracing::debug!(account = %account, "edit account window opened");
            self.edit_windows.insert(account, editor);
        }
        self.edit_windows.get_mut(&account)
    }

    pub fn find_edit_window(&mut self, account: AccountId) -> Option<&mut AccountEditor> {
        self.edit_windows.get_mut(&account)
    }

    pub fn edit_window_count(&self) -> usize {
        self.edit_windows.len()
    }

    /// Pick a type in an edit or new-account window
    pub fn select_type(&mut self, window: AccountId, account_type: AccountType) -> bool {
        let last_used = &mut self.last_used_account_type;
        if let Some(editor) = self.edit_windows.get_mut(&window) {
            return editor.select_type(account_type, last_used);
        }
        match self.new_windows.iter_mut().find(|e| e.account_id() == window) {
            Some(editor) => editor.select_type(account_type, last_used),
            None => false,
        }
    }

    /// Press OK in an edit window. The window closes on commit and stays
    /// open on a validation failure or a declined confirmation.
    pub fn ok_edit_window<V>(
        &mut self,
        book: &mut Book,
        account: AccountId,
        verifier: &mut V,
    ) -> Option<Result<EditOutcome, ValidationError>>
    where
        V: ChangeVerifier + ?Sized,
    {
        let mut editor = self.edit_windows.remove(&account)?;
        let separator = self.separator();
        let result = editor.ok(book, separator, verifier, self);

        match result {
            Ok(EditOutcome::Committed(id)) => {
                self.refresh_account_windows(book, id);
                for child in book.descendants(id) {
                    self.refresh_account_windows(book, child);
                }
            }
            _ => {
                self.edit_windows.insert(account, editor);
            }
        }
        Some(result)
    }

    pub fn close_edit_window(&mut self, account: AccountId) -> bool {
        let closed = self.edit_windows.remove(&account).is_some();
        if closed {
            tracing::debug!(account = %account, "edit account window closed");
        }
        closed
    }

    // ========================================================================
    // NEW-ACCOUNT WINDOWS
    // ========================================================================

    /// Open a new-account window; returns the id of its pending account
    pub fn open_new_account_window(&mut self, book: &Book, selected: Option<AccountId>) -> AccountId {
        let editor = AccountEditor::create(
            book,
            self.last_used_account_type,
            self.default_currency(book),
            selected,
        );
        let id = editor.account_id();
        self.new_windows.insert(0, editor);
        tracing::debug!(pending = %id, "account add window opened");
        id
    }

    pub fn find_new_account_window(&mut self, pending: AccountId) -> Option<&mut AccountEditor> {
        self.new_windows.iter_mut().find(|e| e.account_id() == pending)
    }

    pub fn new_window_count(&self) -> usize {
        self.new_windows.len()
    }

    pub fn ok_new_account_window<V>(
        &mut self,
        book: &mut Book,
        pending: AccountId,
        verifier: &mut V,
    ) -> Option<Result<EditOutcome, ValidationError>>
    where
        V: ChangeVerifier + ?Sized,
    {
        let index = self.new_windows.iter().position(|e| e.account_id() == pending)?;
        let mut editor = self.new_windows.remove(index);
        let separator = self.separator();
        let result = editor.ok(book, separator, verifier, self);

        if !matches!(result, Ok(EditOutcome::Committed(_))) {
            self.new_windows.insert(index, editor);
        }
        Some(result)
    }

    /// Close a new-account window, discarding its unsaved account
    pub fn close_new_account_window(&mut self, pending: AccountId) -> bool {
        let before = self.new_windows.len();
        self.new_windows.retain(|e| e.account_id() != pending);
        let closed = self.new_windows.len() != before;
        if closed {
            tracing::debug!(pending = %pending, "account add window destroyed");
        }
        closed
    }

    pub fn destroy_account_add_windows(&mut self) {
        let count = self.new_windows.len();
        self.new_windows.clear();
        tracing::debug!(count, "account add windows destroyed");
    }

    // ========================================================================
    // RECONCILE WINDOWS
    // ========================================================================

    /// Open the reconcile window for an account, or return the open one.
    ///
    /// `statement` is the accepted (ending balance, date) from the statement
    /// dialog; None takes the defaults (current balance, last statement date
    /// or `today`).
    pub fn open_reconcile_window(
        &mut self,
        book: &Book,
        account: AccountId,
        statement: Option<(f64, NaiveDate)>,
        today: NaiveDate,
    ) -> Option<&mut ReconcileSession> {
        if !self.reconcile_windows.contains_key(&account) {
            if !book.contains_account(account) {
                return None;
            }
            let (ending, date) = statement.unwrap_or_else(|| self.statement_defaults(book, account, today));
            let session = ReconcileSession::open(book, account, ending, date, &self.config)?;
            self.last_statement_date = Some(date);
            self.reconcile_windows.insert(account, session);
        }
        self.reconcile_windows.get_mut(&account)
    }

    /// Values preloaded into the statement dialog
    pub fn statement_defaults(&self, book: &Book, account: AccountId, today: NaiveDate) -> (f64, NaiveDate) {
        (
            ReconcileSession::default_ending(book, account),
            self.last_statement_date.unwrap_or(today),
        )
    }

    pub fn find_reconcile_window(&mut self, account: AccountId) -> Option<&mut ReconcileSession> {
        self.reconcile_windows.get_mut(&account)
    }

    pub fn reconcile_window_count(&self) -> usize {
        self.reconcile_windows.len()
    }

    /// Close the reconcile window. Returns the accounts whose ledgers need a
    /// refresh.
    pub fn close_reconcile_window(&mut self, account: AccountId) -> Option<Vec<AccountId>> {
        let session = self.reconcile_windows.remove(&account)?;
        if session.needs_refresh_on_close() {
            Some(vec![account])
        } else {
            Some(Vec::new())
        }
    }

    // ========================================================================
    // LEDGERS AND BULK OPERATIONS
    // ========================================================================

    pub fn open_ledger_display(&mut self, account: AccountId) {
        self.ledger_displays.insert(account);
    }

    pub fn has_ledger_display(&self, account: AccountId) -> bool {
        self.ledger_displays.contains(&account)
    }

    /// Recompute the titles of every window showing this account
    pub fn refresh_account_windows(&mut self, book: &Book, account: AccountId) {
        let separator = self.separator();
        if let Some(editor) = self.edit_windows.get_mut(&account) {
            editor.refresh_title(book, separator);
        }
        if let Some(session) = self.reconcile_windows.get_mut(&account) {
            session.refresh_title(book, separator);
            session.refresh(book);
        }
    }

    /// Close every window tied to an account (e.g. before deleting it)
    pub fn destroy_windows_for_account(&mut self, account: AccountId) {
        self.close_edit_window(account);
        self.reconcile_windows.remove(&account);
        self.ledger_displays.remove(&account);
    }

    /// End of session: every window closes
    pub fn close(&mut self) {
        self.edit_windows.clear();
        self.new_windows.clear();
        self.reconcile_windows.clear();
        self.ledger_displays.clear();
        tracing::debug!("ui session closed");
    }
}

impl LedgerDisplays for UiSession {
    fn destroy_ledger_display(&mut self, account: AccountId) {
        if self.ledger_displays.remove(&account) {
            tracing::debug!(account = %account, "ledger display destroyed");
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
