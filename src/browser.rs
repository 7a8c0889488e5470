use std::collections::HashSet;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Constraint, Layout},
    text::{Line, Span},
    widgets::{Cell, Paragraph, Row, Table, TableState},
    DefaultTerminal, Frame,
};
use rusqlite::Connection;

use crate::error::{Result, TxError};
use crate::fmt::{format_date, money_fr};
use crate::models::Transaction;
use crate::queues::{list_queue, Queue};
use crate::tui::{
    self, ACTIVE_TAB_STYLE, CHECKED_STYLE, FOOTER_STYLE, HEADER_STYLE, SELECTED_STYLE,
    WARNING_STYLE,
};
use crate::workflow;

const PAGE_SIZE: usize = 20;

pub enum BrowseAction {
    Continue,
    Close,
    Save,
    Refresh,
}

#[derive(Default)]
struct QueueTab {
    rows: Vec<Transaction>,
    checked: HashSet<String>,
    offset: usize,
    selected: usize,
}

impl QueueTab {
    fn set_rows(&mut self, rows: Vec<Transaction>) {
        let ids: HashSet<&str> = rows.iter().map(|t| t.transaction_id.as_str()).collect();
        self.checked.retain(|id| ids.contains(id.as_str()));
        self.rows = rows;
        if self.offset >= self.rows.len() {
            self.offset = 0;
            self.selected = 0;
        }
        if self.offset + self.selected >= self.rows.len() {
            self.selected = 0;
        }
    }

    fn cursor(&self) -> usize {
        self.offset + self.selected
    }

    /// Checked ids in queue order.
    fn checked_ids(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter(|t| self.checked.contains(&t.transaction_id))
            .map(|t| t.transaction_id.clone())
            .collect()
    }
}

pub struct QueueBrowser {
    active: Queue,
    tabs: [QueueTab; 3],
    visible_count: usize,
    status_message: Option<String>,
    table_state: TableState,
}

fn tab_index(queue: Queue) -> usize {
    match queue {
        Queue::Prelevements => 0,
        Queue::Nsf => 1,
        Queue::Exceptions => 2,
    }
}

impl QueueBrowser {
    pub fn new() -> Self {
        Self {
            active: Queue::Prelevements,
            tabs: Default::default(),
            visible_count: PAGE_SIZE,
            status_message: None,
            table_state: TableState::default(),
        }
    }

    pub fn set_rows(&mut self, queue: Queue, rows: Vec<Transaction>) {
        self.tabs[tab_index(queue)].set_rows(rows);
    }

    /// Reload every tab from the database.
    pub fn load(&mut self, conn: &Connection) -> Result<()> {
        for queue in Queue::ALL {
            let rows = list_queue(conn, queue)?;
            self.set_rows(queue, rows);
        }
        Ok(())
    }

    fn tab(&self) -> &QueueTab {
        &self.tabs[tab_index(self.active)]
    }

    fn tab_mut(&mut self) -> &mut QueueTab {
        &mut self.tabs[tab_index(self.active)]
    }

    pub fn run(&mut self, conn: &Connection) -> Result<()> {
        self.load(conn)?;
        tui::run_terminal(|terminal| self.event_loop(terminal, conn))
    }

    fn columns(&self) -> (Vec<&'static str>, Vec<Constraint>) {
        let headers = vec!["", "# Client", "Nom", "Montant", "Transmis Le", "Modifié", "Statut", "Raison"];
        let widths = vec![
            Constraint::Length(3),
            Constraint::Length(10),
            Constraint::Fill(1),
            Constraint::Length(14),
            Constraint::Length(11),
            Constraint::Length(11),
            Constraint::Length(12),
            Constraint::Fill(1),
        ];
        (headers, widths)
    }

    /// Draw the browser into the given frame.
    pub fn draw_frame(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let areas = Layout::vertical([
            Constraint::Length(1), // tabs
            Constraint::Fill(1),   // table
            Constraint::Length(1), // status
            Constraint::Length(1), // keys
        ])
        .split(area);

        let mut tab_spans = Vec::new();
        for (i, queue) in Queue::ALL.iter().enumerate() {
            let label = format!(" {} {} ({}) ", i + 1, queue.label(), self.tabs[i].rows.len());
            let style = if *queue == self.active {
                ACTIVE_TAB_STYLE
            } else {
                HEADER_STYLE
            };
            tab_spans.push(Span::styled(label, style));
            tab_spans.push(Span::raw(" "));
        }
        frame.render_widget(Paragraph::new(Line::from(tab_spans)), areas[0]);

        let table_area = areas[1];
        let available = table_area.height.saturating_sub(2) as usize;
        let reason_width = (table_area.width as usize / 4).max(10);

        let tab = &self.tabs[tab_index(self.active)];
        let mut rendered = Vec::new();
        let mut used = 0usize;
        for tx in tab.rows.iter().skip(tab.offset) {
            let reason = tx.transaction_failure_reason.as_deref().unwrap_or("");
            let (wrapped, height) = tui::wrap_text(reason, reason_width);
            if used + height as usize > available && !rendered.is_empty() {
                break;
            }
            let checked = tab.checked.contains(&tx.transaction_id);
            let mark = if checked {
                Cell::from("[x]").style(CHECKED_STYLE)
            } else {
                Cell::from("[ ]")
            };
            rendered.push(
                Row::new(vec![
                    mark,
                    Cell::from(tx.client_ref()),
                    Cell::from(tx.display_name().to_string()),
                    Cell::from(tx.credit_amount.map(money_fr).unwrap_or_default()),
                    Cell::from(format_date(tx.transaction_datetime.as_deref(), "%d-%m-%Y")),
                    Cell::from(format_date(tx.last_modified.as_deref(), "%d-%m-%Y")),
                    Cell::from(tx.transaction_status.clone()),
                    Cell::from(wrapped),
                ])
                .height(height),
            );
            used += height as usize;
        }
        let shown = rendered.len();
        let selected = tab.selected;
        let (offset, total, checked_count) = (tab.offset, tab.rows.len(), tab.checked.len());
        self.visible_count = shown.max(1);

        let (headers, widths) = self.columns();
        self.table_state.select(if shown > 0 { Some(selected) } else { None });
        let table = Table::new(rendered, widths)
            .header(Row::new(headers).style(HEADER_STYLE).bottom_margin(1))
            .column_spacing(1)
            .row_highlight_style(SELECTED_STYLE);
        frame.render_stateful_widget(table, table_area, &mut self.table_state);

        let status = if total == 0 {
            "Aucune transaction".to_string()
        } else {
            format!(
                "Rows {}-{} of {} | {} selected",
                offset + 1,
                (offset + shown).min(total),
                total,
                checked_count
            )
        };
        let status_line = match self.status() {
            Some(msg) => Line::from(vec![
                Span::styled(status, FOOTER_STYLE),
                Span::raw(" | "),
                Span::styled(msg.to_string(), WARNING_STYLE),
            ]),
            None => Line::from(Span::styled(status, FOOTER_STYLE)),
        };
        frame.render_widget(Paragraph::new(status_line), areas[2]);

        frame.render_widget(
            Paragraph::new(
                "Tab/1-3:queue  \u{2191}/\u{2193}:move  space:select  a:all  s:save  r:refresh  n/p:page  q:quit",
            )
            .style(FOOTER_STYLE),
            areas[3],
        );
    }

    /// Handle a key event. Returns a BrowseAction indicating what the caller should do.
    pub fn handle_key_event(&mut self, code: KeyCode) -> BrowseAction {
        self.status_message = None;
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return BrowseAction::Close,
            KeyCode::Tab => self.switch_tab((tab_index(self.active) + 1) % 3),
            KeyCode::BackTab => self.switch_tab((tab_index(self.active) + 2) % 3),
            KeyCode::Char(c @ '1'..='3') => self.switch_tab(c as usize - '1' as usize),
            KeyCode::Down => {
                let visible = self.visible_count;
                let tab = self.tab_mut();
                if tab.cursor() + 1 < tab.rows.len() {
                    if tab.selected + 1 < visible {
                        tab.selected += 1;
                    } else {
                        tab.offset += 1;
                    }
                }
            }
            KeyCode::Up => {
                let tab = self.tab_mut();
                if tab.selected > 0 {
                    tab.selected -= 1;
                } else if tab.offset > 0 {
                    tab.offset -= 1;
                }
            }
            KeyCode::Char('n') | KeyCode::Right | KeyCode::PageDown => self.scroll_down(),
            KeyCode::Char('p') | KeyCode::Left | KeyCode::PageUp => self.scroll_up(),
            KeyCode::Char(' ') => self.toggle_current(),
            KeyCode::Char('a') => self.toggle_all(),
            KeyCode::Char('s') => return BrowseAction::Save,
            KeyCode::Char('r') => return BrowseAction::Refresh,
            _ => {}
        }
        BrowseAction::Continue
    }

    fn event_loop(&mut self, terminal: &mut DefaultTerminal, conn: &Connection) -> Result<()> {
        loop {
            terminal.draw(|frame| self.draw_frame(frame))?;

            if let Event::Key(KeyEvent {
                code,
                modifiers,
                kind,
                ..
            }) = event::read()?
            {
                if kind != KeyEventKind::Press {
                    continue;
                }
                if modifiers.contains(KeyModifiers::CONTROL) && code == KeyCode::Char('c') {
                    break;
                }
                match self.handle_key_event(code) {
                    BrowseAction::Close => break,
                    BrowseAction::Continue => {}
                    BrowseAction::Save => {
                        if let Err(e) = self.save(conn) {
                            self.status_message = Some(format!("Save failed: {e}"));
                        }
                    }
                    BrowseAction::Refresh => match self.load(conn) {
                        Ok(()) => self.status_message = Some("Refreshed".to_string()),
                        Err(e) => self.status_message = Some(format!("Refresh failed: {e}")),
                    },
                }
            }
        }
        Ok(())
    }

    fn switch_tab(&mut self, index: usize) {
        if let Some(queue) = Queue::ALL.get(index) {
            self.active = *queue;
        }
    }

    fn scroll_down(&mut self) {
        let step = self.visible_count;
        let tab = self.tab_mut();
        let new_offset = tab.offset + step;
        if new_offset < tab.rows.len() {
            tab.offset = new_offset;
            tab.selected = 0;
        }
    }

    fn scroll_up(&mut self) {
        let step = self.visible_count;
        let tab = self.tab_mut();
        tab.offset = tab.offset.saturating_sub(step);
        tab.selected = 0;
    }

    fn toggle_current(&mut self) {
        let tab = self.tab_mut();
        let Some(id) = tab.rows.get(tab.cursor()).map(|t| t.transaction_id.clone()) else {
            return;
        };
        if !tab.checked.remove(&id) {
            tab.checked.insert(id);
        }
    }

    fn toggle_all(&mut self) {
        let tab = self.tab_mut();
        if !tab.rows.is_empty() && tab.checked.len() == tab.rows.len() {
            tab.checked.clear();
        } else {
            tab.checked = tab.rows.iter().map(|t| t.transaction_id.clone()).collect();
        }
    }

    pub fn checked_ids(&self) -> Vec<String> {
        self.tab().checked_ids()
    }

    pub fn status(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    /// Process the checked rows of the active tab, then reload every tab.
    pub fn save(&mut self, conn: &Connection) -> Result<()> {
        let ids = self.checked_ids();
        if ids.is_empty() {
            self.status_message = Some("Nothing selected".to_string());
            return Ok(());
        }
        match workflow::process(conn, self.active, &ids) {
            Ok(n) => {
                self.tab_mut().checked.clear();
                self.load(conn)?;
                self.status_message = Some(format!("{n} transaction(s) saved"));
                Ok(())
            }
            Err(TxError::NotDebited(missing)) => {
                self.status_message = Some(format!(
                    "Refused: not debit-processed yet: {}",
                    missing.join(", ")
                ));
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

impl Default for QueueBrowser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;
    use crate::workflow::{get_transaction, upsert_transaction};

    fn make_rows(n: usize) -> Vec<Transaction> {
        (0..n)
            .map(|i| Transaction {
                transaction_id: format!("T{i:02}"),
                transaction_type: "EFT Funding".into(),
                transaction_status: "completed".into(),
                credit_amount: Some(10.0 + i as f64),
                ..Default::default()
            })
            .collect()
    }

    fn browser_with(n: usize) -> QueueBrowser {
        let mut b = QueueBrowser::new();
        b.set_rows(Queue::Prelevements, make_rows(n));
        b
    }

    #[test]
    fn test_scroll_down() {
        let mut browser = browser_with(50);
        browser.scroll_down();
        assert_eq!(browser.tab().offset, PAGE_SIZE);
        browser.scroll_down();
        assert_eq!(browser.tab().offset, PAGE_SIZE * 2);
        browser.scroll_down();
        assert_eq!(browser.tab().offset, PAGE_SIZE * 2);
    }

    #[test]
    fn test_scroll_down_stops_at_end() {
        let mut browser = browser_with(10);
        browser.scroll_down();
        assert_eq!(browser.tab().offset, 0);
    }

    #[test]
    fn test_scroll_up() {
        let mut browser = browser_with(50);
        browser.scroll_down();
        browser.scroll_up();
        assert_eq!(browser.tab().offset, 0);
        browser.scroll_up();
        assert_eq!(browser.tab().offset, 0);
    }

    #[test]
    fn test_tab_switching() {
        let mut browser = browser_with(1);
        browser.handle_key_event(KeyCode::Tab);
        assert_eq!(browser.active, Queue::Nsf);
        browser.handle_key_event(KeyCode::BackTab);
        browser.handle_key_event(KeyCode::BackTab);
        assert_eq!(browser.active, Queue::Exceptions);
        browser.handle_key_event(KeyCode::Char('1'));
        assert_eq!(browser.active, Queue::Prelevements);
    }

    #[test]
    fn test_toggle_and_select_all() {
        let mut browser = browser_with(3);
        browser.handle_key_event(KeyCode::Down);
        browser.handle_key_event(KeyCode::Char(' '));
        assert_eq!(browser.checked_ids(), vec!["T01"]);
        browser.handle_key_event(KeyCode::Char(' '));
        assert!(browser.checked_ids().is_empty());

        browser.handle_key_event(KeyCode::Char('a'));
        assert_eq!(browser.checked_ids(), vec!["T00", "T01", "T02"]);
        browser.handle_key_event(KeyCode::Char('a'));
        assert!(browser.checked_ids().is_empty());
    }

    #[test]
    fn test_selection_is_per_tab() {
        let mut browser = browser_with(2);
        browser.set_rows(Queue::Nsf, make_rows(2));
        browser.handle_key_event(KeyCode::Char('a'));
        browser.handle_key_event(KeyCode::Char('2'));
        assert!(browser.checked_ids().is_empty());
    }

    #[test]
    fn test_down_stops_at_last_row() {
        let mut browser = browser_with(2);
        for _ in 0..5 {
            browser.handle_key_event(KeyCode::Down);
        }
        assert_eq!(browser.tab().cursor(), 1);
    }

    #[test]
    fn test_save_processes_checked_rows() {
        let (_dir, conn) = test_db();
        for t in make_rows(3) {
            upsert_transaction(&conn, &t).unwrap();
        }
        let mut browser = QueueBrowser::new();
        browser.load(&conn).unwrap();
        browser.handle_key_event(KeyCode::Char(' '));
        browser.save(&conn).unwrap();

        assert!(get_transaction(&conn, "T00").unwrap().unwrap().is_prelevement_done);
        assert_eq!(browser.tab().rows.len(), 2);
        assert!(browser.checked_ids().is_empty());
        assert_eq!(browser.status(), Some("1 transaction(s) saved"));
    }

    #[test]
    fn test_save_nothing_selected() {
        let (_dir, conn) = test_db();
        let mut browser = QueueBrowser::new();
        browser.load(&conn).unwrap();
        browser.save(&conn).unwrap();
        assert_eq!(browser.status(), Some("Nothing selected"));
    }

    #[test]
    fn test_nsf_save_refused_when_not_debited() {
        let (_dir, conn) = test_db();
        let mut stale = make_rows(1).remove(0);
        stale.transaction_status = "failed".into();
        upsert_transaction(&conn, &stale).unwrap();

        let mut browser = QueueBrowser::new();
        browser.set_rows(Queue::Nsf, vec![stale]);
        browser.handle_key_event(KeyCode::Char('2'));
        browser.handle_key_event(KeyCode::Char('a'));
        browser.save(&conn).unwrap();

        assert!(browser.status().unwrap().starts_with("Refused"));
        assert!(!get_transaction(&conn, "T00").unwrap().unwrap().is_nsf_done);
    }
}
