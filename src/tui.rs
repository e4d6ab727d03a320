//! Full-screen picker and input prompt.

use std::io::{self, Stdout};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::cursor;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, List, ListItem, ListState, Paragraph};
use ratatui::{Frame, Terminal};

use crate::host::{InputBox, PickItem, Picker};

type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;

#[derive(Debug, PartialEq, Eq)]
enum KeyOutcome<T> {
    Continue,
    Accept(T),
    Cancel,
}

fn init_terminal() -> Result<TuiTerminal> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("failed to create terminal")
}

fn restore_terminal(terminal: &mut TuiTerminal) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, cursor::Show)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")
}

/// Draw and feed key presses to `on_key` until it accepts or cancels. The
/// terminal is restored on every exit path.
fn run_loop<T>(
    mut draw: impl FnMut(&mut Frame),
    mut on_key: impl FnMut(KeyEvent) -> KeyOutcome<T>,
) -> Result<Option<T>> {
    let mut terminal = init_terminal()?;
    let result = (|| -> Result<Option<T>> {
        loop {
            terminal.draw(&mut draw)?;
            if !event::poll(Duration::from_millis(100))? {
                continue;
            }
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match on_key(key) {
                KeyOutcome::Continue => {}
                KeyOutcome::Accept(value) => return Ok(Some(value)),
                KeyOutcome::Cancel => return Ok(None),
            }
        }
    })();
    let restored = restore_terminal(&mut terminal);
    let value = result?;
    restored?;
    Ok(value)
}

fn is_ctrl(key: &KeyEvent, c: char) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char(c)
}

// ---------------------------------------------------------------------------
// Picker
// ---------------------------------------------------------------------------

struct PickerState<'a> {
    items: &'a [PickItem],
    matcher: SkimMatcherV2,
    query: String,
    /// Indices into `items` currently shown.
    visible: Vec<usize>,
    /// Position in `visible`; always a command when set.
    selected: Option<usize>,
}

impl<'a> PickerState<'a> {
    fn new(items: &'a [PickItem]) -> Self {
        let mut state = Self {
            items,
            matcher: SkimMatcherV2::default(),
            query: String::new(),
            visible: Vec::new(),
            selected: None,
        };
        state.refilter();
        state
    }

    /// With a query, keep matching commands and the separator heading each
    /// section that still has a match.
    fn refilter(&mut self) {
        let query = self.query.trim();
        self.visible = if query.is_empty() {
            (0..self.items.len()).collect()
        } else {
            let mut visible = Vec::new();
            let mut heading = None;
            for (index, item) in self.items.iter().enumerate() {
                match item {
                    PickItem::Separator { .. } => heading = Some(index),
                    PickItem::Command { label, .. } => {
                        if self.matcher.fuzzy_match(label, query).is_some() {
                            visible.extend(heading.take());
                            visible.push(index);
                        }
                    }
                }
            }
            visible
        };
        self.selected = self.next_command(None, true);
    }

    fn is_command_at(&self, position: usize) -> bool {
        self.visible
            .get(position)
            .and_then(|&index| self.items.get(index))
            .is_some_and(|item| !item.is_separator())
    }

    /// Next command position after (or before) `from`; `None` starts at the edge.
    fn next_command(&self, from: Option<usize>, forward: bool) -> Option<usize> {
        if forward {
            let start = from.map_or(0, |p| p + 1);
            (start..self.visible.len()).find(|&p| self.is_command_at(p))
        } else {
            let end = from.unwrap_or(self.visible.len());
            (0..end).rev().find(|&p| self.is_command_at(p))
        }
    }

    fn step(&mut self, forward: bool) {
        if let Some(next) = self.next_command(self.selected, forward) {
            self.selected = Some(next);
        }
    }

    fn selected_index(&self) -> Option<usize> {
        self.selected.and_then(|p| self.visible.get(p).copied())
    }

    fn on_key(&mut self, key: KeyEvent) -> KeyOutcome<usize> {
        if key.code == KeyCode::Esc || is_ctrl(&key, 'c') {
            return KeyOutcome::Cancel;
        }
        if is_ctrl(&key, 'p') {
            self.step(false);
            return KeyOutcome::Continue;
        }
        if is_ctrl(&key, 'n') {
            self.step(true);
            return KeyOutcome::Continue;
        }
        match key.code {
            KeyCode::Enter => {
                if let Some(index) = self.selected_index() {
                    return KeyOutcome::Accept(index);
                }
            }
            KeyCode::Up => self.step(false),
            KeyCode::Down => self.step(true),
            KeyCode::Backspace => {
                self.query.pop();
                self.refilter();
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.query.push(c);
                self.refilter();
            }
            _ => {}
        }
        KeyOutcome::Continue
    }
}

fn draw_picker(frame: &mut Frame, state: &PickerState<'_>, placeholder: &str) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(1), Constraint::Length(1)])
        .split(frame.area());

    let search = if state.query.is_empty() {
        Paragraph::new(Span::styled(placeholder, Style::default().fg(Color::DarkGray)))
    } else {
        Paragraph::new(state.query.as_str())
    };
    frame.render_widget(
        search.block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(Color::Rgb(88, 150, 201))),
        ),
        chunks[0],
    );
    frame.set_cursor_position((
        chunks[0].x.saturating_add(1 + state.query.chars().count() as u16),
        chunks[0].y + 1,
    ));

    let items: Vec<ListItem<'_>> = state
        .visible
        .iter()
        .filter_map(|&index| state.items.get(index))
        .map(|item| match item {
            PickItem::Separator { label } => ListItem::new(Line::from(Span::styled(
                label.as_str(),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::BOLD),
            ))),
            PickItem::Command { label, .. } => {
                ListItem::new(Line::from(Span::styled(format!("  {label}"), Style::default().fg(Color::White))))
            }
        })
        .collect();

    let mut list_state = ListState::default();
    list_state.select(state.selected);
    let list = List::new(items)
        .highlight_style(
            Style::default()
                .bg(Color::Rgb(42, 88, 116))
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▸ ");
    frame.render_stateful_widget(list, chunks[1], &mut list_state);

    frame.render_widget(
        Paragraph::new("  Enter run  Esc cancel  ↑/↓ move").style(Style::default().fg(Color::DarkGray)),
        chunks[2],
    );
}

/// Fuzzy-filtering list picker.
#[derive(Debug, Default)]
pub struct TuiPicker;

impl Picker for TuiPicker {
    fn pick(&mut self, items: &[PickItem], placeholder: &str) -> Result<Option<usize>, String> {
        let state = std::cell::RefCell::new(PickerState::new(items));
        run_loop(
            |frame| draw_picker(frame, &state.borrow(), placeholder),
            |key| state.borrow_mut().on_key(key),
        )
        .map_err(|e| format!("Command picker failed: {e:#}"))
    }
}

// ---------------------------------------------------------------------------
// Input box
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct InputState {
    text: String,
}

impl InputState {
    fn on_key(&mut self, key: KeyEvent) -> KeyOutcome<String> {
        if key.code == KeyCode::Esc || is_ctrl(&key, 'c') {
            return KeyOutcome::Cancel;
        }
        if is_ctrl(&key, 'u') {
            self.text.clear();
            return KeyOutcome::Continue;
        }
        match key.code {
            KeyCode::Enter => return KeyOutcome::Accept(std::mem::take(&mut self.text)),
            KeyCode::Backspace => {
                self.text.pop();
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => self.text.push(c),
            _ => {}
        }
        KeyOutcome::Continue
    }
}

fn centered_box(percent_x: u16, height: u16, rect: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Fill(1), Constraint::Length(height), Constraint::Fill(1)])
        .split(rect);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

fn draw_input(frame: &mut Frame, state: &InputState, prompt: &str, placeholder: &str) {
    let area = centered_box(70, 3, frame.area());
    frame.render_widget(Clear, area);

    let body = if state.text.is_empty() {
        Paragraph::new(Span::styled(placeholder, Style::default().fg(Color::DarkGray)))
    } else {
        Paragraph::new(format!("> {}", state.text))
    };
    frame.render_widget(
        body.block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .title(prompt)
                .style(Style::default().bg(Color::Black)),
        ),
        area,
    );

    let typed = if state.text.is_empty() { 0 } else { 2 + state.text.chars().count() as u16 };
    frame.set_cursor_position((area.x.saturating_add(1 + typed), area.y + 1));
}

/// Single-line text prompt. Enter accepts (possibly empty), Esc cancels.
#[derive(Debug, Default)]
pub struct TuiInputBox;

impl InputBox for TuiInputBox {
    fn prompt(&mut self, prompt: &str, placeholder: &str) -> Result<Option<String>, String> {
        let state = std::cell::RefCell::new(InputState::default());
        run_loop(
            |frame| draw_input(frame, &state.borrow(), prompt, placeholder),
            |key| state.borrow_mut().on_key(key),
        )
        .map_err(|e| format!("Argument prompt failed: {e:#}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn typed(state: &mut PickerState<'_>, text: &str) {
        for c in text.chars() {
            assert_eq!(state.on_key(key(KeyCode::Char(c))), KeyOutcome::Continue);
        }
    }

    fn sep(label: &str) -> PickItem {
        PickItem::Separator { label: format!("── {label} ──") }
    }

    fn cmd(label: &str, group: &str) -> PickItem {
        PickItem::Command { label: label.to_string(), group: group.to_string() }
    }

    fn items() -> Vec<PickItem> {
        vec![
            sep("RECENT"),
            cmd("migrate", "recent"),
            sep("AUTH"),
            cmd("changepassword", "auth"),
            cmd("createsuperuser", "auth"),
            sep("DJANGO"),
            cmd("check", "django"),
            cmd("makemigrations", "django"),
            cmd("migrate", "django"),
        ]
    }

    #[test]
    fn initial_selection_skips_leading_separator() {
        let items = items();
        let state = PickerState::new(&items);
        assert_eq!(state.visible.len(), items.len());
        assert_eq!(state.selected_index(), Some(1));
    }

    #[test]
    fn navigation_skips_separators_and_stops_at_edges() {
        let items = items();
        let mut state = PickerState::new(&items);
        state.on_key(key(KeyCode::Down));
        assert_eq!(state.selected_index(), Some(3));
        state.on_key(key(KeyCode::Up));
        state.on_key(key(KeyCode::Up));
        assert_eq!(state.selected_index(), Some(1));
        for _ in 0..20 {
            state.on_key(ctrl('n'));
        }
        assert_eq!(state.selected_index(), Some(8));
    }

    #[test]
    fn query_keeps_headings_of_matching_sections() {
        let items = items();
        let mut state = PickerState::new(&items);
        typed(&mut state, "migr");
        let labels: Vec<&str> = state.visible.iter().map(|&i| items[i].label()).collect();
        assert_eq!(
            labels,
            vec!["── RECENT ──", "migrate", "── DJANGO ──", "makemigrations", "migrate"]
        );
        assert_eq!(state.selected_index(), Some(1));
    }

    #[test]
    fn backspace_widens_the_filter() {
        let items = items();
        let mut state = PickerState::new(&items);
        typed(&mut state, "chq");
        assert!(state.selected_index().is_none());
        state.on_key(key(KeyCode::Backspace));
        assert_eq!(state.selected_index(), Some(3));
    }

    #[test]
    fn enter_accepts_original_index() {
        let items = items();
        let mut state = PickerState::new(&items);
        typed(&mut state, "check");
        assert_eq!(state.on_key(key(KeyCode::Enter)), KeyOutcome::Accept(6));
    }

    #[test]
    fn enter_without_match_does_nothing() {
        let items = items();
        let mut state = PickerState::new(&items);
        typed(&mut state, "zzzz");
        assert_eq!(state.on_key(key(KeyCode::Enter)), KeyOutcome::Continue);
    }

    #[test]
    fn escape_and_ctrl_c_cancel() {
        let items = items();
        let mut state = PickerState::new(&items);
        assert_eq!(state.on_key(key(KeyCode::Esc)), KeyOutcome::Cancel);
        assert_eq!(state.on_key(ctrl('c')), KeyOutcome::Cancel);
    }

    #[test]
    fn empty_list_has_no_selection() {
        let items = vec![sep("RECENT")];
        let mut state = PickerState::new(&items);
        assert_eq!(state.selected, None);
        assert_eq!(state.on_key(key(KeyCode::Enter)), KeyOutcome::Continue);
    }

    #[test]
    fn input_accepts_empty_text() {
        let mut input = InputState::default();
        assert_eq!(input.on_key(key(KeyCode::Enter)), KeyOutcome::Accept(String::new()));
    }

    #[test]
    fn input_edits_and_accepts() {
        let mut input = InputState::default();
        for c in "--planx".chars() {
            input.on_key(key(KeyCode::Char(c)));
        }
        input.on_key(key(KeyCode::Backspace));
        assert_eq!(input.on_key(key(KeyCode::Enter)), KeyOutcome::Accept("--plan".to_string()));
    }

    #[test]
    fn input_ctrl_u_clears_and_escape_cancels() {
        let mut input = InputState::default();
        input.on_key(key(KeyCode::Char('x')));
        input.on_key(ctrl('u'));
        assert!(input.text.is_empty());
        assert_eq!(input.on_key(key(KeyCode::Esc)), KeyOutcome::Cancel);
    }

    #[test]
    fn centered_box_has_requested_height() {
        let area = centered_box(70, 3, Rect::new(0, 0, 100, 40));
        assert_eq!(area.height, 3);
        assert_eq!(area.width, 70);
    }
}
