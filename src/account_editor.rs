// ✏️ Account Editor - Form model behind the new/edit account dialog
//
// The form holds plain values. `account_to_form` fills it from an account,
// `form_to_account` writes back only the fields that differ. OK runs
// validation first and touches nothing when validation fails.
//
// Edit flow:  validate → plan propagation + type cascade → confirm → apply
//             → write form
// New flow:   validate (incl. duplicate name) → attach account → write form

use crate::book::Book;
use crate::entities::{commodity_equiv, Account, AccountId, AccountType, Commodity};
use crate::error::ValidationError;
use crate::propagation::{apply_changes, confirm_changes, plan_edit, ChangeVerifier, LedgerDisplays};

// ============================================================================
// FORM
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct AccountForm {
    pub name: String,
    pub description: String,
    pub code: String,
    pub notes: String,
    pub account_type: AccountType,

    /// None leaves the account's currency as it is
    pub currency: Option<Commodity>,

    /// None leaves the account's security as it is
    pub security: Option<Commodity>,

    pub price_source: Option<String>,

    /// None is the top level
    pub parent: Option<AccountId>,
}

impl AccountForm {
    fn blank(account_type: AccountType) -> Self {
        AccountForm {
            name: String::new(),
            description: String::new(),
            code: String::new(),
            notes: String::new(),
            account_type,
            currency: None,
            security: None,
            price_source: None,
            parent: None,
        }
    }
}

/// Copy an account's values into a fresh form
pub fn account_to_form(account: &Account) -> AccountForm {
    AccountForm {
        name: account.name.clone(),
        description: account.description.clone(),
        code: account.code.clone(),
        notes: account.notes.clone(),
        account_type: account.account_type,
        currency: account.currency.clone(),
        security: account.security.clone(),
        price_source: account.effective_price_source().map(str::to_string),
        parent: account.parent(),
    }
}

/// Write the form into the account, one bracket on the account and, when
/// the parent changes, one on the new parent. Unchanged fields are left
/// alone. Returns false when the account is unknown.
pub fn form_to_account(book: &mut Book, id: AccountId, form: &AccountForm) -> bool {
    if !book.begin_account_edit(id) {
        return false;
    }

    if let Some(account) = book.account_mut(id) {
        if account.account_type != form.account_type {
            account.account_type = form.account_type;
        }
        if account.name != form.name {
            account.name = form.name.clone();
        }
        if account.description != form.description {
            account.description = form.description.clone();
        }
        if let Some(currency) = &form.currency {
            if !commodity_equiv(Some(currency), account.currency.as_ref()) {
                account.currency = Some(currency.clone());
            }
        }
        if account.code != form.code {
            account.code = form.code.clone();
        }

        if form.account_type.uses_security() {
            if let Some(security) = &form.security {
                if !commodity_equiv(Some(security), account.security.as_ref()) {
                    account.security = Some(security.clone());
                }
            }
            if form.account_type.uses_price_source() && account.price_source != form.price_source {
                account.price_source = form.price_source.clone();
            }
        }

        if account.notes != form.notes {
            account.notes = form.notes.clone();
        }
    }

    if book.parent_of(id) != form.parent {
        book.move_account(id, form.parent);
    }

    book.commit_account_edit(id);
    true
}

// ============================================================================
// EDITOR
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorMode {
    New,
    Edit,
}

/// What OK did when validation passed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// The user rejected the list of extra changes; nothing was modified
    Declined,
    /// The account was written; the window should close
    Committed(AccountId),
}

#[derive(Debug, Clone)]
enum Target {
    Existing(AccountId),
    /// Detached account owned by a new-account window until OK
    Pending(Account),
}

#[derive(Debug, Clone)]
pub struct AccountEditor {
    target: Target,
    pub form: AccountForm,
    selectable: Vec<AccountType>,
    title: String,
}

impl AccountEditor {
    /// Editor for an existing account; None when the account is unknown
    pub fn edit(book: &Book, id: AccountId, separator: char) -> Option<Self> {
        let account = book.account(id)?;
        let mut editor = AccountEditor {
            target: Target::Existing(id),
            form: account_to_form(account),
            selectable: AccountType::ALL.to_vec(),
            title: String::new(),
        };
        editor.refresh_title(book, separator);
        Some(editor)
    }

    /// Editor for a brand new account, preselecting the session defaults
    pub fn create(
        book: &Book,
        default_type: AccountType,
        default_currency: Option<Commodity>,
        selected_parent: Option<AccountId>,
    ) -> Self {
        let account = Account::new("", default_type);
        let mut form = AccountForm::blank(default_type);
        form.currency = default_currency;

        let mut editor = AccountEditor {
            target: Target::Pending(account),
            form,
            selectable: AccountType::ALL.to_vec(),
            title: "New Account".to_string(),
        };
        let parent = selected_parent.filter(|p| book.contains_account(*p));
        editor.select_parent(book, parent);
        editor
    }

    pub fn mode(&self) -> EditorMode {
        match self.target {
            Target::Existing(_) => EditorMode::Edit,
            Target::Pending(_) => EditorMode::New,
        }
    }

    /// Account this window is for (the pending account's id for new windows)
    pub fn account_id(&self) -> AccountId {
        match &self.target {
            Target::Existing(id) => *id,
            Target::Pending(account) => account.id,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Recompute the window title from the account's current full name
    pub fn refresh_title(&mut self, book: &Book, separator: char) {
        if let Target::Existing(id) = self.target {
            self.title = format!("{} - Edit Account", book.full_name(id, separator));
        }
    }

    pub fn selectable_types(&self) -> &[AccountType] {
        &self.selectable
    }

    /// Select a type from the list. Types greyed out by the parent choice
    /// are refused. A successful pick becomes the session's last used type.
    pub fn select_type(&mut self, account_type: AccountType, last_used: &mut AccountType) -> bool {
        if !self.selectable.contains(&account_type) {
            return false;
        }
        self.form.account_type = account_type;
        *last_used = account_type;
        true
    }

    pub fn unselect_type(&mut self) {
        self.form.account_type = AccountType::Invalid;
    }

    pub fn security_editable(&self) -> bool {
        self.form.account_type.uses_security()
    }

    pub fn price_source_editable(&self) -> bool {
        self.form.account_type.uses_price_source()
    }

    /// Choose the parent (None = top level).
    ///
    /// For new accounts this also narrows the selectable types to those
    /// compatible with the parent, switching the current type to the
    /// parent's when it no longer fits.
    pub fn select_parent(&mut self, book: &Book, parent: Option<AccountId>) {
        self.form.parent = parent;

        if self.mode() == EditorMode::Edit {
            return;
        }

        match parent.and_then(|p| book.account(p)) {
            None => self.selectable = AccountType::ALL.to_vec(),
            Some(p) => {
                let parent_type = p.account_type;
                self.selectable = parent_type.compatible_children();
                if !AccountType::compatible(parent_type, self.form.account_type) {
                    self.form.account_type = parent_type;
                }
            }
        }
    }

    /// Whether `candidate` may be chosen as parent. The top level always
    /// may; the account itself and its descendants may not.
    pub fn valid_parent(&self, book: &Book, candidate: Option<AccountId>) -> bool {
        let candidate = match candidate {
            None => return true,
            Some(c) => c,
        };
        if !book.contains_account(candidate) {
            return false;
        }
        match self.target {
            Target::Existing(id) => candidate != id && !book.has_ancestor(candidate, id),
            Target::Pending(_) => true,
        }
    }

    /// Press OK. Validation failures leave the book untouched.
    pub fn ok<V, D>(
        &mut self,
        book: &mut Book,
        separator: char,
        verifier: &mut V,
        displays: &mut D,
    ) -> Result<EditOutcome, ValidationError>
    where
        V: ChangeVerifier + ?Sized,
        D: LedgerDisplays + ?Sized,
    {
        match self.mode() {
            EditorMode::Edit => self.ok_edit(book, separator, verifier, displays),
            EditorMode::New => self.ok_new(book),
        }
    }

    fn ok_edit<V, D>(
        &mut self,
        book: &mut Book,
        separator: char,
        verifier: &mut V,
        displays: &mut D,
    ) -> Result<EditOutcome, ValidationError>
    where
        V: ChangeVerifier + ?Sized,
        D: LedgerDisplays + ?Sized,
    {
        let id = self.account_id();

        if self.form.name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.form.account_type == AccountType::Invalid {
            return Err(ValidationError::InvalidType);
        }
        if !self.valid_parent(book, self.form.parent) {
            return Err(ValidationError::InvalidParent);
        }

        let (current_type, new_currency, new_security) = match book.account(id) {
            Some(account) => (
                account.account_type,
                self.form.currency.clone().or_else(|| account.currency.clone()),
                self.form.security.clone().or_else(|| account.security.clone()),
            ),
            None => return Err(ValidationError::InvalidParent),
        };

        let changes = plan_edit(
            book,
            id,
            new_currency.as_ref(),
            new_security.as_ref(),
            self.form.account_type,
            self.form.parent,
        );

        if !confirm_changes(book, &changes, id, separator, verifier) {
            tracing::debug!(account = %id, "extra changes declined");
            return Ok(EditOutcome::Declined);
        }

        if current_type != self.form.account_type {
            displays.destroy_ledger_display(id);
        }

        apply_changes(book, &changes, displays);
        form_to_account(book, id, &self.form);

        tracing::info!(account = %id, name = %self.form.name, "account edited");
        Ok(EditOutcome::Committed(id))
    }

    fn ok_new(&mut self, book: &mut Book) -> Result<EditOutcome, ValidationError> {
        if self.form.name.is_empty() {
            return Err(ValidationError::EmptyName);
        }

        let parent = self.form.parent.filter(|p| book.contains_account(*p));
        if book.child_named(parent, &self.form.name).is_some() {
            return Err(ValidationError::DuplicateName);
        }

        if self.form.account_type == AccountType::Invalid {
            return Err(ValidationError::InvalidType);
        }

        let account = match &self.target {
            Target::Pending(account) => account.clone(),
            Target::Existing(_) => return Err(ValidationError::InvalidParent),
        };
        let id = book
            .insert_account(account, parent)
            .ok_or(ValidationError::InvalidParent)?;

        self.form.parent = parent;
        form_to_account(book, id, &self.form);
        self.target = Target::Existing(id);

        tracing::info!(account = %id, name = %self.form.name, "account created");
        Ok(EditOutcome::Committed(id))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::{EditEvent, EditTarget};
    use crate::propagation::{ChangeRow, NoLedgerDisplays};
    use chrono::NaiveDate;

    fn usd() -> Commodity {
        Commodity::currency("USD", "US Dollar")
    }

    fn eur() -> Commodity {
        Commodity::currency("EUR", "Euro")
    }

    fn accept_all(_: &[ChangeRow]) -> bool {
        true
    }

    fn sample_book() -> (Book, AccountId, AccountId) {
        let mut book = Book::new();
        let assets = book
            .insert_account(Account::new("Assets", AccountType::Asset).with_currency(usd()), None)
            .unwrap();
        let checking = book
            .insert_account(
                Account::new("Checking", AccountType::Bank).with_currency(usd()),
                Some(assets),
            )
            .unwrap();
        (book, assets, checking)
    }

    #[test]
    fn test_form_round_trip_is_noop() {
        let (mut book, _, checking) = sample_book();
        let form = account_to_form(book.account(checking).unwrap());
        let before = book.account(checking).unwrap().clone();

        assert!(form_to_account(&mut book, checking, &form));
        let after = book.account(checking).unwrap();
        assert_eq!(after.name, before.name);
        assert_eq!(after.parent(), before.parent());
        assert_eq!(after.currency, before.currency);
    }

    #[test]
    fn test_form_to_account_skips_security_for_bank() {
        let (mut book, _, checking) = sample_book();
        let mut form = account_to_form(book.account(checking).unwrap());
        form.security = Some(Commodity::new("NASDAQ", "AAPL", "Apple"));
        form.price_source = Some("yahoo".to_string());

        form_to_account(&mut book, checking, &form);
        let account = book.account(checking).unwrap();
        assert!(account.security.is_none());
        assert!(account.price_source.is_none());
    }

    #[test]
    fn test_edit_title() {
        let (book, _, checking) = sample_book();
        let editor = AccountEditor::edit(&book, checking, ':').unwrap();
        assert_eq!(editor.title(), "Assets:Checking - Edit Account");
        assert_eq!(editor.mode(), EditorMode::Edit);
    }

    #[test]
    fn test_edit_validation() {
        let (mut book, _, checking) = sample_book();
        let mut editor = AccountEditor::edit(&book, checking, ':').unwrap();

        editor.form.name.clear();
        let err = editor
            .ok(&mut book, ':', &mut accept_all, &mut NoLedgerDisplays)
            .unwrap_err();
        assert_eq!(err, ValidationError::EmptyName);

        editor.form.name = "Checking".to_string();
        editor.unselect_type();
        let err = editor
            .ok(&mut book, ':', &mut accept_all, &mut NoLedgerDisplays)
            .unwrap_err();
        assert_eq!(err, ValidationError::InvalidType);

        let mut last = AccountType::Bank;
        editor.select_type(AccountType::Bank, &mut last);
        editor.form.parent = Some(checking);
        let err = editor
            .ok(&mut book, ':', &mut accept_all, &mut NoLedgerDisplays)
            .unwrap_err();
        assert_eq!(err, ValidationError::InvalidParent);
        assert_eq!(err.to_string(), "You must choose a valid parent account.");
    }

    #[test]
    fn test_valid_parent_excludes_descendants() {
        let (mut book, assets, checking) = sample_book();
        let sub = book
            .insert_account(Account::new("Sub", AccountType::Bank), Some(checking))
            .unwrap();
        let editor = AccountEditor::edit(&book, checking, ':').unwrap();

        assert!(editor.valid_parent(&book, None));
        assert!(editor.valid_parent(&book, Some(assets)));
        assert!(!editor.valid_parent(&book, Some(checking)));
        assert!(!editor.valid_parent(&book, Some(sub)));
    }

    #[test]
    fn test_edit_rename_and_move() {
        let (mut book, assets, checking) = sample_book();
        book.clear_edit_log();

        let mut editor = AccountEditor::edit(&book, checking, ':').unwrap();
        editor.form.name = "Everyday".to_string();
        editor.select_parent(&book, None);

        let outcome = editor
            .ok(&mut book, ':', &mut accept_all, &mut NoLedgerDisplays)
            .unwrap();
        assert_eq!(outcome, EditOutcome::Committed(checking));
        assert_eq!(book.full_name(checking, ':'), "Everyday");
        assert!(book.children_of(assets).is_empty());
        assert_eq!(
            book.edit_log().first(),
            Some(&EditEvent::Begin(EditTarget::Account(checking)))
        );
    }

    #[test]
    fn test_edit_currency_propagates_after_confirmation() {
        let (mut book, assets, checking) = sample_book();
        let date = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        let tx = book.new_transaction(date, "", "sweep");
        book.add_split(tx, Some(checking), 5.0, 5.0, "");
        book.add_split(tx, Some(assets), -5.0, -5.0, "");

        let mut editor = AccountEditor::edit(&book, checking, ':').unwrap();
        editor.form.currency = Some(eur());

        let mut declined = |rows: &[ChangeRow]| {
            assert_eq!(rows[0].full_name, "Assets");
            false
        };
        let outcome = editor
            .ok(&mut book, ':', &mut declined, &mut NoLedgerDisplays)
            .unwrap();
        assert_eq!(outcome, EditOutcome::Declined);
        assert_eq!(book.account(checking).unwrap().currency, Some(usd()));

        editor
            .ok(&mut book, ':', &mut accept_all, &mut NoLedgerDisplays)
            .unwrap();
        assert_eq!(book.account(checking).unwrap().currency, Some(eur()));
        assert_eq!(book.account(assets).unwrap().currency, Some(eur()));
    }

    #[test]
    fn test_new_account_defaults_and_parent_gating() {
        let mut book = Book::new();
        let income = book
            .insert_account(Account::new("Income", AccountType::Income), None)
            .unwrap();

        let editor = AccountEditor::create(&book, AccountType::Bank, Some(usd()), Some(income));
        assert_eq!(editor.mode(), EditorMode::New);
        assert_eq!(editor.form.account_type, AccountType::Income);
        assert_eq!(editor.form.currency, Some(usd()));
        assert_eq!(editor.selectable_types(), &[AccountType::Income, AccountType::Expense]);

        let top = AccountEditor::create(&book, AccountType::Bank, None, None);
        assert_eq!(top.form.account_type, AccountType::Bank);
        assert_eq!(top.selectable_types().len(), AccountType::ALL.len());
    }

    #[test]
    fn test_select_type_respects_gating() {
        let mut book = Book::new();
        let equity = book
            .insert_account(Account::new("Equity", AccountType::Equity), None)
            .unwrap();
        let mut editor = AccountEditor::create(&book, AccountType::Bank, None, Some(equity));
        let mut last = AccountType::Bank;

        assert!(!editor.select_type(AccountType::Stock, &mut last));
        assert_eq!(last, AccountType::Bank);
        assert!(editor.select_type(AccountType::Equity, &mut last));
        assert_eq!(last, AccountType::Equity);

        editor.select_parent(&book, None);
        assert!(editor.select_type(AccountType::Stock, &mut last));
        assert!(editor.security_editable());
        assert!(editor.price_source_editable());
    }

    #[test]
    fn test_new_account_ok() {
        let (mut book, assets, _) = sample_book();
        let mut editor = AccountEditor::create(&book, AccountType::Bank, Some(usd()), Some(assets));

        let err = editor
            .ok(&mut book, ':', &mut accept_all, &mut NoLedgerDisplays)
            .unwrap_err();
        assert_eq!(err, ValidationError::EmptyName);

        editor.form.name = "Checking".to_string();
        let err = editor
            .ok(&mut book, ':', &mut accept_all, &mut NoLedgerDisplays)
            .unwrap_err();
        assert_eq!(err, ValidationError::DuplicateName);
        assert_eq!(book.account_count(), 2);

        editor.form.name = "Savings".to_string();
        let outcome = editor
            .ok(&mut book, ':', &mut accept_all, &mut NoLedgerDisplays)
            .unwrap();
        let id = match outcome {
            EditOutcome::Committed(id) => id,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(book.find_by_full_name("Assets:Savings", ':'), Some(id));
        assert_eq!(book.account(id).unwrap().currency, Some(usd()));
    }
}
