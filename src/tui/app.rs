//! Main application logic for the terminal user interface.
//!
//! `App` never keeps its own copy of the truth: it subscribes to the state
//! manager's change notifications, marks itself dirty, and re-reads the
//! visible tasks and counts before the next frame. Every intent (add, rename,
//! toggle, delete, clear, filter) is forwarded to the manager.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Tabs, Wrap},
    Frame, Terminal,
};

use crate::cmd::{checkbox, items_left_label};
use crate::error::TaskError;
use crate::fields::FilterMode;
use crate::manager::TaskStateManager;
use crate::notifier::ObserverId;
use crate::task::{TaskId, TaskRecord};
use crate::tui::{
    colors::{DARK_GREEN, DARK_PURPLE, DIMMED, SLATE},
    enums::AppState,
    input::InputField,
    utils::centered_rect,
};

/// Terminal front end over a shared `TaskStateManager`.
pub struct App {
    manager: Arc<TaskStateManager>,
    observer: ObserverId,
    dirty: Arc<AtomicBool>,
    state: AppState,
    input: InputField,
    task_list_state: TableState,
    visible: Vec<TaskRecord>,
    filter: FilterMode,
    active_count: usize,
    total: usize,
    status_message: String,
}

impl App {
    /// Create the UI and register its change observer.
    pub fn new(manager: Arc<TaskStateManager>) -> Self {
        let dirty = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&dirty);
        let observer = manager.subscribe(move || {
            flag.store(true, Ordering::Release);
            Ok(())
        });

        let mut app = App {
            manager,
            observer,
            dirty,
            state: AppState::Browse,
            input: InputField::new(),
            task_list_state: TableState::default(),
            visible: Vec::new(),
            filter: FilterMode::All,
            active_count: 0,
            total: 0,
            status_message: String::new(),
        };
        app.refresh();
        app
    }

    /// Re-read state from the manager if a change was signalled.
    ///
    /// Keeps the selection on the same task when it is still visible,
    /// otherwise on the same row index.
    fn refresh(&mut self) {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return;
        }
        let old_index = self.task_list_state.selected();
        let old_id = self.selected_task().map(|t| t.id);

        self.visible = self.manager.visible_tasks();
        self.filter = self.manager.current_filter();
        self.active_count = self.manager.active_count();
        self.total = self.manager.task_count();

        let restored = old_id
            .and_then(|id| self.visible.iter().position(|t| t.id == id))
            .or_else(|| {
                if self.visible.is_empty() {
                    None
                } else {
                    Some(old_index.unwrap_or(0).min(self.visible.len() - 1))
                }
            });
        self.task_list_state.select(restored);
    }

    fn selected_task(&self) -> Option<&TaskRecord> {
        self.task_list_state
            .selected()
            .and_then(|idx| self.visible.get(idx))
    }

    fn select_id(&mut self, id: TaskId) {
        if let Some(idx) = self.visible.iter().position(|t| t.id == id) {
            self.task_list_state.select(Some(idx));
        }
    }

    fn set_status_message(&mut self, msg: impl Into<String>) {
        self.status_message = msg.into();
    }

    fn report_error(&mut self, action: &str, err: TaskError) {
        tracing::error!(error = %err, "failed to {action}");
        self.set_status_message(format!("Failed to {action}: {err}"));
    }

    fn accent_color(&self) -> Color {
        match self.filter {
            FilterMode::All => SLATE,
            FilterMode::Active => DARK_GREEN,
            FilterMode::Completed => DARK_PURPLE,
        }
    }

    // Input handling

    /// Handle one key press. Returns true if the application should quit.
    pub async fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return true;
        }
        self.status_message.clear();

        let quit = match self.state {
            AppState::Browse => self.handle_browse_input(key.code).await,
            AppState::AddTask | AppState::EditTask(_) => {
                self.handle_text_input(key.code).await;
                false
            }
            AppState::Help => {
                self.state = AppState::Browse;
                false
            }
        };
        self.refresh();
        quit
    }

    async fn handle_browse_input(&mut self, key: KeyCode) -> bool {
        match key {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('a') | KeyCode::Char('i') => {
                self.input = InputField::new();
                self.input.active = true;
                self.state = AppState::AddTask;
            }
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            KeyCode::Enter | KeyCode::Char(' ') => self.toggle_selected().await,
            KeyCode::Char('e') => self.start_edit(),
            KeyCode::Char('d') | KeyCode::Delete => self.delete_selected().await,
            KeyCode::Char('c') => self.clear_completed().await,
            KeyCode::Tab | KeyCode::Right | KeyCode::Char('l') => {
                self.manager.set_filter(self.filter.next())
            }
            KeyCode::BackTab | KeyCode::Left => self.manager.set_filter(self.filter.previous()),
            KeyCode::Char('1') => self.manager.set_filter(FilterMode::All),
            KeyCode::Char('2') => self.manager.set_filter(FilterMode::Active),
            KeyCode::Char('3') => self.manager.set_filter(FilterMode::Completed),
            KeyCode::Char('h') | KeyCode::Char('?') | KeyCode::F(1) => self.state = AppState::Help,
            _ => {}
        }
        false
    }

    async fn handle_text_input(&mut self, key: KeyCode) {
        match key {
            KeyCode::Esc => {
                self.input = InputField::new();
                self.state = AppState::Browse;
            }
            KeyCode::Enter => self.submit_input().await,
            KeyCode::Char(c) => self.input.handle_char(c),
            KeyCode::Backspace => self.input.handle_backspace(),
            KeyCode::Delete => self.input.handle_delete(),
            KeyCode::Left => self.input.move_cursor_left(),
            KeyCode::Right => self.input.move_cursor_right(),
            KeyCode::Home => self.input.move_home(),
            KeyCode::End => self.input.move_end(),
            _ => {}
        }
    }

    fn move_selection(&mut self, delta: isize) {
        if self.visible.is_empty() {
            self.task_list_state.select(None);
            return;
        }
        let last = self.visible.len() - 1;
        let current = self.task_list_state.selected().unwrap_or(0);
        let next = current.saturating_add_signed(delta).min(last);
        self.task_list_state.select(Some(next));
    }

    fn start_edit(&mut self) {
        let Some(task) = self.selected_task() else {
            self.set_status_message("No task selected");
            return;
        };
        let (id, name) = (task.id, task.name.clone());
        self.input = InputField::with_value(&name);
        self.input.active = true;
        self.state = AppState::EditTask(id);
    }

    // Intents

    async fn submit_input(&mut self) {
        match self.state {
            AppState::AddTask => match self.manager.add_task(&self.input.value).await {
                Ok(Some(task)) => {
                    self.input.clear();
                    self.refresh();
                    self.select_id(task.id);
                    self.set_status_message(format!("Added \"{}\"", task.name));
                }
                // Blank submissions are ignored.
                Ok(None) => {}
                Err(e) => self.report_error("add task", e),
            },
            AppState::EditTask(id) => match self.manager.rename_task(id, &self.input.value).await {
                Ok(true) => {
                    self.input = InputField::new();
                    self.state = AppState::Browse;
                }
                Ok(false) => self.set_status_message("Task name cannot be empty"),
                Err(e) => {
                    self.input = InputField::new();
                    self.state = AppState::Browse;
                    self.report_error("rename task", e);
                }
            },
            AppState::Browse | AppState::Help => {}
        }
    }

    async fn toggle_selected(&mut self) {
        let Some((id, completed)) = self.selected_task().map(|t| (t.id, t.completed)) else {
            return;
        };
        if let Err(e) = self.manager.set_completed(id, !completed).await {
            self.report_error("update task", e);
        }
    }

    async fn delete_selected(&mut self) {
        let Some(id) = self.selected_task().map(|t| t.id) else {
            self.set_status_message("No task selected");
            return;
        };
        match self.manager.delete_task(id).await {
            Ok(()) => self.set_status_message(format!("Deleted task {id}")),
            Err(e) => self.report_error("delete task", e),
        }
    }

    async fn clear_completed(&mut self) {
        match self.manager.clear_completed().await {
            Ok(0) => self.set_status_message("No completed tasks"),
            Ok(n) => self.set_status_message(format!("Cleared {n} completed task(s)")),
            Err(e) => self.report_error("clear completed tasks", e),
        }
    }

    // Rendering

    fn render_header(&self, f: &mut Frame, area: Rect) {
        let header = Paragraph::new(Line::from(vec![
            Span::styled("TODOS", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  "),
            Span::styled(
                "Your task list",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::ITALIC),
            ),
        ]))
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center);
        f.render_widget(header, area);
    }

    fn render_input(&self, f: &mut Frame, area: Rect) {
        let (title, border) = match self.state {
            AppState::AddTask => ("What needs to be done?".to_string(), Style::default().fg(Color::Yellow)),
            AppState::EditTask(id) => (format!("Rename task {id}"), Style::default().fg(Color::Yellow)),
            _ => ("What needs to be done? (press 'a')".to_string(), Style::default()),
        };
        let input = Paragraph::new(self.input.value.as_str())
            .block(Block::default().borders(Borders::ALL).title(title).border_style(border));
        f.render_widget(input, area);

        if self.state.is_text_entry() {
            f.set_cursor_position((area.x + self.input.cursor as u16 + 1, area.y + 1));
        }
    }

    fn render_tabs(&self, f: &mut Frame, area: Rect) {
        let tabs = Tabs::new(FilterMode::ALL.iter().map(|m| m.label()))
            .select(self.filter.index())
            .block(Block::default().borders(Borders::ALL).title("Filter (Tab / 1 2 3)"))
            .highlight_style(
                Style::default()
                    .bg(self.accent_color())
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            );
        f.render_widget(tabs, area);
    }

    fn render_task_list(&mut self, f: &mut Frame, area: Rect) {
        let rows: Vec<Row> = self
            .visible
            .iter()
            .map(|task| {
                let style = if task.completed {
                    Style::default().fg(DIMMED).add_modifier(Modifier::CROSSED_OUT)
                } else {
                    Style::default().fg(Color::White)
                };
                Row::new(vec![
                    Cell::from(checkbox(task.completed)),
                    Cell::from(task.name.as_str()),
                ])
                .style(style)
            })
            .collect();

        let widths = [Constraint::Length(4), Constraint::Min(10)];
        let table = Table::new(rows, widths)
            .block(Block::default().borders(Borders::ALL).title(format!(
                "Tasks ({}/{})",
                self.visible.len(),
                self.total
            )))
            .row_highlight_style(Style::default().bg(Color::Gray).fg(Color::Black))
            .highlight_symbol(">> ");

        f.render_stateful_widget(table, area, &mut self.task_list_state);
    }

    fn render_footer(&self, f: &mut Frame, area: Rect) {
        let footer = Paragraph::new(Line::from(vec![
            Span::styled(
                items_left_label(self.active_count),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw("   "),
            Span::styled("c: Clear completed", Style::default().fg(Color::Gray)),
        ]));
        f.render_widget(footer, area);
    }

    fn render_help(&self, f: &mut Frame, area: Rect) {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let help_text = vec![
            Line::from(Span::styled("Todo Help", bold)),
            Line::from(""),
            Line::from(Span::styled("Task List:", bold)),
            Line::from("  ↑/k, ↓/j     Move selection"),
            Line::from("  a/i          Add tasks"),
            Line::from("  Enter/Space  Toggle completed"),
            Line::from("  e            Rename selected task"),
            Line::from("  d/Del        Delete selected task"),
            Line::from("  c            Clear completed tasks"),
            Line::from("  Tab/Shift+Tab, ←/→, 1/2/3  Switch filter"),
            Line::from("  h/?/F1       Show this help"),
            Line::from("  q/Esc/Ctrl+C Quit"),
            Line::from(""),
            Line::from(Span::styled("Text Input:", bold)),
            Line::from("  Enter        Add / save"),
            Line::from("  Esc          Finish / cancel"),
        ];

        let area = centered_rect(60, 70, area);
        f.render_widget(Clear, area);
        let paragraph = Paragraph::new(help_text)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Help - Press any key to return"),
            )
            .wrap(Wrap { trim: false });
        f.render_widget(paragraph, area);
    }

    fn render_status_bar(&self, f: &mut Frame, area: Rect) {
        let status_text = if !self.status_message.is_empty() {
            self.status_message.clone()
        } else {
            format!("{} | {} view | Press 'h' for help", self.state.label(), self.filter)
        };
        let status = Paragraph::new(status_text)
            .style(Style::default().bg(self.accent_color()).fg(Color::White))
            .alignment(Alignment::Left);
        f.render_widget(status, area);
    }

    fn render(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // header
                Constraint::Length(3), // input
                Constraint::Length(3), // filter tabs
                Constraint::Min(3),    // tasks
                Constraint::Length(1), // items left
                Constraint::Length(1), // status bar
            ])
            .split(f.area());

        self.render_header(f, chunks[0]);
        self.render_input(f, chunks[1]);
        self.render_tabs(f, chunks[2]);
        self.render_task_list(f, chunks[3]);
        self.render_footer(f, chunks[4]);
        self.render_status_bar(f, chunks[5]);

        if self.state == AppState::Help {
            let area = f.area();
            self.render_help(f, area);
        }
    }

    /// Main event loop for the TUI application.
    ///
    /// Handles rendering and input processing until the user exits.
    pub async fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            self.refresh();
            terminal.draw(|f| self.render(f))?;

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press && self.handle_key(key).await {
                        break;
                    }
                }
            }
        }
        Ok(())
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.manager.unsubscribe(self.observer);
    }
}
