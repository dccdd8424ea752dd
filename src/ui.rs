use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ledger_desk::amount::{format_amount, PrintFlags};
use ledger_desk::reconcile::{
    FinishOutcome, ListKind, ReconcileSession, SortOrder, StatementDialog, CANCEL_CHANGES_MSG,
    DELETE_TRANSACTION_MSG, UNBALANCED_FINISH_MSG,
};
use ledger_desk::{Book, LedgerConfig};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;

/// A yes/no question waiting for an answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pending {
    Finish,
    Delete,
    Cancel,
}

impl Pending {
    fn message(&self) -> &'static str {
        match self {
            Pending::Finish => UNBALANCED_FINISH_MSG,
            Pending::Delete => DELETE_TRANSACTION_MSG,
            Pending::Cancel => CANCEL_CHANGES_MSG,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WindowExit {
    Finished(FinishOutcome),
    Cancelled,
}

pub struct App<'a> {
    pub book: &'a mut Book,
    pub config: &'a LedgerConfig,
    pub session: ReconcileSession,
    pub focus: ListKind,
    pub debit_state: TableState,
    pub credit_state: TableState,
    pub pending: Option<Pending>,

    /// Statement prompt while the user edits the ending balance
    pub statement: Option<StatementDialog>,
    pub message: Option<String>,

    /// True once the book was changed (delete or finish)
    pub modified: bool,
    pub exit: Option<WindowExit>,
}

impl<'a> App<'a> {
    pub fn new(book: &'a mut Book, config: &'a LedgerConfig, session: ReconcileSession) -> Self {
        let mut app = Self {
            book,
            config,
            session,
            focus: ListKind::Debit,
            debit_state: TableState::default(),
            credit_state: TableState::default(),
            pending: None,
            statement: None,
            message: None,
            modified: false,
            exit: None,
        };
        if app.session.list(ListKind::Debit).is_empty() {
            app.focus = ListKind::Credit;
        }
        app.sync_selection();
        app
    }

    fn state_mut(&mut self, kind: ListKind) -> &mut TableState {
        match kind {
            ListKind::Debit => &mut self.debit_state,
            ListKind::Credit => &mut self.credit_state,
        }
    }

    /// Mirror the focused row into the session's single selection
    fn sync_selection(&mut self) {
        let len = self.session.list(self.focus).len();
        let focus = self.focus;
        let state = self.state_mut(focus);
        let index = match state.selected() {
            Some(i) if i < len => Some(i),
            _ if len > 0 => Some(0),
            _ => None,
        };
        state.select(index);

        let other = match focus {
            ListKind::Debit => ListKind::Credit,
            ListKind::Credit => ListKind::Debit,
        };
        self.state_mut(other).select(None);

        if let Some(i) = index {
            if let Some(entry) = self.session.list(focus).entries().get(i) {
                let split = entry.split;
                self.session.select(focus, split);
            }
        }
    }

    pub fn switch_focus(&mut self) {
        self.focus = match self.focus {
            ListKind::Debit => ListKind::Credit,
            ListKind::Credit => ListKind::Debit,
        };
        self.sync_selection();
    }

    pub fn next(&mut self) {
        let len = self.session.list(self.focus).len();
        if len == 0 {
            return;
        }
        let focus = self.focus;
        let state = self.state_mut(focus);
        let i = state.selected().map(|i| (i + 1).min(len - 1)).unwrap_or(0);
        state.select(Some(i));
        self.sync_selection();
    }

    pub fn previous(&mut self) {
        let focus = self.focus;
        let state = self.state_mut(focus);
        let i = state.selected().map(|i| i.saturating_sub(1)).unwrap_or(0);
        state.select(Some(i));
        self.sync_selection();
    }

    pub fn toggle_current(&mut self) {
        if let Some(split) = self.session.current_split() {
            let focus = self.focus;
            self.session.toggle(focus, split);
        }
    }

    pub fn cycle_sort(&mut self) {
        let focus = self.focus;
        let next = match self.session.list(focus).sort_order() {
            SortOrder::Standard => SortOrder::Num,
            SortOrder::Num => SortOrder::Description,
            SortOrder::Description => SortOrder::Amount,
            SortOrder::Amount => SortOrder::Standard,
        };
        self.session.sort(focus, next);
        self.sync_selection();
    }

    pub fn request_finish(&mut self) {
        if self.session.recalculate(self.book).balanced {
            self.finish();
        } else {
            self.pending = Some(Pending::Finish);
        }
    }

    fn finish(&mut self) {
        let outcome = self.session.finish(self.book, self.config, &mut |_: &str| true);
        if let FinishOutcome::Finished { .. } = outcome {
            self.modified = true;
        }
        self.exit = Some(WindowExit::Finished(outcome));
    }

    pub fn request_delete(&mut self) {
        if self.session.actions_enabled() {
            self.pending = Some(Pending::Delete);
        }
    }

    pub fn request_cancel(&mut self) {
        if self.session.cancel(&mut |_: &str| false) {
            self.exit = Some(WindowExit::Cancelled);
        } else {
            self.pending = Some(Pending::Cancel);
        }
    }

    pub fn answer(&mut self, yes: bool) {
        let pending = match self.pending.take() {
            Some(p) => p,
            None => return,
        };
        if !yes {
            return;
        }
        match pending {
            Pending::Finish => self.finish(),
            Pending::Cancel => self.exit = Some(WindowExit::Cancelled),
            Pending::Delete => {
                if self
                    .session
                    .delete_current_transaction(self.book, &mut |_: &str| true)
                    .is_some()
                {
                    self.modified = true;
                    self.sync_selection();
                }
            }
        }
    }

    pub fn open_statement(&mut self) {
        self.statement = StatementDialog::new(
            self.book,
            self.session.account(),
            self.session.new_ending(),
            self.session.statement_date(),
            self.config,
        );
    }

    pub fn accept_statement(&mut self) {
        let dialog = match self.statement.take() {
            Some(d) => d,
            None => return,
        };
        match dialog.accept() {
            Ok((ending, date)) => {
                self.session.change_statement(self.book, ending, date);
                self.message = None;
            }
            Err(err) => self.message = Some(err.to_string()),
        }
    }
}

pub fn run_reconcile_window(
    book: &mut Book,
    config: &LedgerConfig,
    session: ReconcileSession,
) -> Result<(WindowExit, bool)> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(book, config, session);
    let res = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res?;
    let exit = app.exit.take().unwrap_or(WindowExit::Cancelled);
    Ok((exit, app.modified))
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    while app.exit.is_none() {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            if app.pending.is_some() {
                match key.code {
                    KeyCode::Char('y') | KeyCode::Char('Y') => app.answer(true),
                    KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => app.answer(false),
                    _ => {}
                }
                continue;
            }

            if let Some(dialog) = app.statement.as_mut() {
                match key.code {
                    KeyCode::Enter => app.accept_statement(),
                    KeyCode::Esc => app.statement = None,
                    KeyCode::Backspace => {
                        let mut text = dialog.ending_entry().to_string();
                        text.pop();
                        dialog.set_ending_entry(&text);
                    }
                    KeyCode::Char(c) => {
                        let text = format!("{}{}", dialog.ending_entry(), c);
                        dialog.set_ending_entry(&text);
                    }
                    _ => {}
                }
                continue;
            }

            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => app.request_cancel(),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    app.request_cancel()
                }
                KeyCode::Tab | KeyCode::Left | KeyCode::Right => app.switch_focus(),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::Char(' ') | KeyCode::Enter => app.toggle_current(),
                KeyCode::Char('s') => app.cycle_sort(),
                KeyCode::Char('e') => app.open_statement(),
                KeyCode::Char('d') => app.request_delete(),
                KeyCode::Char('f') => app.request_finish(),
                _ => {}
            }
        }
    }
    Ok(())
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Min(0),    // Debit / credit lists
            Constraint::Length(4), // Balances
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    let lists = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[1]);

    let (debit_title, credit_title) = app.session.list_titles(app.config.use_accounting_labels);
    render_list(f, lists[0], app, ListKind::Debit, debit_title);
    render_list(f, lists[1], app, ListKind::Credit, credit_title);

    render_balances(f, chunks[2], app);
    render_status_bar(f, chunks[3], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let spans = vec![
        Span::styled(
            app.session.title().to_string(),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("Statement date: {}", app.session.statement_date()),
            Style::default().fg(Color::White),
        ),
    ];

    let header = Paragraph::new(vec![Line::from(spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_list(f: &mut Frame, area: Rect, app: &mut App, kind: ListKind, title: &str) {
    let header_cells = ["R", "Date", "Num", "Description", "Amount"].iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });
    let header = Row::new(header_cells).style(Style::default().bg(Color::DarkGray)).height(1);

    let flags = PrintFlags::for_shares(app.session.use_shares()).without_symbol();
    let rows: Vec<Row> = app
        .session
        .list(kind)
        .entries()
        .iter()
        .map(|entry| {
            let (mark, color) = if entry.checked {
                ("✓", Color::Green)
            } else {
                (" ", Color::White)
            };
            Row::new(vec![
                Cell::from(mark).style(Style::default().fg(color)),
                Cell::from(entry.date.to_string()),
                Cell::from(entry.num.clone()),
                Cell::from(truncate(&entry.description, 28)),
                Cell::from(format_amount(entry.amount, flags, "")).style(Style::default().fg(color)),
            ])
            .height(1)
        })
        .collect();

    let border = if app.focus == kind { Color::Cyan } else { Color::White };
    let table = Table::new(
        rows,
        [
            Constraint::Length(2),
            Constraint::Length(11),
            Constraint::Length(6),
            Constraint::Min(10),
            Constraint::Length(14),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(format!(" {} ", title)),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    let state = match kind {
        ListKind::Debit => &mut app.debit_state,
        ListKind::Credit => &mut app.credit_state,
    };
    f.render_stateful_widget(table, area, state);
}

fn render_balances(f: &mut Frame, area: Rect, app: &App) {
    let [starting, ending, debit, credit, reconciled, difference] = app.session.summary_labels(app.book);
    let balanced = app.session.recalculate(app.book).balanced;
    let diff_color = if balanced { Color::Green } else { Color::Red };

    let lines = vec![
        Line::from(vec![
            Span::raw(" Starting balance: "),
            Span::styled(starting, Style::default().fg(Color::White)),
            Span::raw("   Ending balance: "),
            Span::styled(ending, Style::default().fg(Color::White)),
            Span::raw("   Reconciled: "),
            Span::styled(reconciled, Style::default().fg(Color::White)),
        ]),
        Line::from(vec![
            Span::raw(" Total debits: "),
            Span::styled(debit, Style::default().fg(Color::White)),
            Span::raw("   Total credits: "),
            Span::styled(credit, Style::default().fg(Color::White)),
            Span::raw("   Difference: "),
            Span::styled(difference, Style::default().fg(diff_color).add_modifier(Modifier::BOLD)),
        ]),
    ];

    let balances = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(" Balances "));
    f.render_widget(balances, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let line = if let Some(pending) = app.pending {
        Line::from(vec![
            Span::styled(
                format!(" {} ", pending.message().replace('\n', " ")),
                Style::default().fg(Color::Yellow),
            ),
            Span::styled("y", Style::default().fg(Color::Green)),
            Span::raw("/"),
            Span::styled("n", Style::default().fg(Color::Red)),
        ])
    } else if let Some(dialog) = &app.statement {
        Line::from(vec![
            Span::raw(format!(" Starting {} | Ending balance: ", dialog.starting_text())),
            Span::styled(format!("{}_", dialog.ending_entry()), Style::default().fg(Color::Yellow)),
            Span::raw("  (Enter accept, Esc cancel)"),
        ])
    } else if let Some(message) = &app.message {
        Line::from(Span::styled(format!(" {}", message), Style::default().fg(Color::Red)))
    } else {
        let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Yellow));
        Line::from(vec![
            Span::raw(" "),
            key("Space"),
            Span::raw(" Tick | "),
            key("Tab"),
            Span::raw(" List | "),
            key("s"),
            Span::raw(" Sort | "),
            key("e"),
            Span::raw(" Statement | "),
            key("d"),
            Span::raw(" Delete | "),
            key("f"),
            Span::raw(" Finish | "),
            Span::styled("q", Style::default().fg(Color::Red)),
            Span::raw(" Cancel"),
        ])
    };

    let status_bar = Paragraph::new(vec![line])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::White)));
    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}
