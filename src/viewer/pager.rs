//! Ratatui pager implementing [`DocumentViewer`].

use std::collections::HashMap;
use std::io::{self, Stdout};
use std::path::Path;
use std::time::Duration;

use crossterm::event::{self, Event, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Frame;
use ratatui::Terminal;
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Constraint, Layout};
use ratatui::style::{Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::Paragraph;
use unicode_width::UnicodeWidthChar;

use crate::error::ViewerError;
use crate::viewer::keys::{BUILTIN_KEYS, Builtin, KeyBinding};
use crate::viewer::{Action, Document, DocumentViewer, General, RunOutcome, ViewerFactory};

/// How long the loop waits for input before re-reading the document.
const TICK: Duration = Duration::from_millis(100);

const TAB_WIDTH: usize = 4;

/// Opens documents from disk and shows them in a [`Pager`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PagerFactory;

impl ViewerFactory for PagerFactory {
    fn open_document(&self, path: &Path) -> Result<Document, ViewerError> {
        Document::open(path)
    }

    fn create(&self, document: Document) -> Result<Box<dyn DocumentViewer>, ViewerError> {
        Ok(Box::new(Pager::new(document)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Binding {
    Builtin(Builtin),
    Action(Action),
}

impl Binding {
    fn name(&self) -> &'static str {
        match self {
            Binding::Builtin(b) => b.name(),
            Binding::Action(a) => a.name(),
        }
    }
}

/// Full-screen pager. The terminal is taken on the first [`run`] and given
/// back on [`close`] (or drop).
///
/// [`run`]: DocumentViewer::run
/// [`close`]: DocumentViewer::close
pub struct Pager {
    document: Document,
    general: General,
    bindings: HashMap<KeyBinding, Binding>,
    /// First visible line of the document.
    top: usize,
    body_width: usize,
    body_height: usize,
    terminal: Option<Terminal<CrosstermBackend<Stdout>>>,
    guard: Option<TerminalGuard>,
}

impl Pager {
    pub fn new(document: Document) -> Self {
        let bindings = BUILTIN_KEYS
            .iter()
            .flat_map(|(builtin, keys)| {
                keys.iter().filter_map(move |key| {
                    key.parse::<KeyBinding>()
                        .ok()
                        .map(|binding| (binding, Binding::Builtin(*builtin)))
                })
            })
            .collect();

        Self {
            document,
            general: General::default(),
            bindings,
            top: 0,
            body_width: 80,
            body_height: 24,
            terminal: None,
            guard: None,
        }
    }

    pub fn general(&self) -> General {
        self.general
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Apply a key press. Returns `Some` when [`run`](DocumentViewer::run)
    /// should hand control back.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<RunOutcome> {
        let binding = *self.bindings.get(&KeyBinding::from(key))?;
        match binding {
            Binding::Action(action) => Some(RunOutcome::Action(action)),
            Binding::Builtin(Builtin::Quit) => Some(RunOutcome::Quit),
            Binding::Builtin(builtin) => {
                self.apply(builtin);
                None
            }
        }
    }

    fn apply(&mut self, builtin: Builtin) {
        let page = self.body_height.max(1);
        match builtin {
            Builtin::Quit => {}
            Builtin::LineUp => self.scroll_up(1),
            Builtin::PageUp => self.scroll_up(page),
            Builtin::LineDown => self.scroll_down(1),
            Builtin::PageDown => self.scroll_down(page),
            Builtin::Top => {
                self.general.follow_mode = false;
                self.top = 0;
            }
            Builtin::Bottom => {
                self.general.follow_mode = true;
                self.top = self.bottom_top();
            }
            Builtin::ToggleFollow => {
                self.general.follow_mode = !self.general.follow_mode;
                if self.general.follow_mode {
                    self.top = self.bottom_top();
                }
            }
            Builtin::ToggleWrap => self.general.wrap_mode = !self.general.wrap_mode,
        }
    }

    fn scroll_up(&mut self, lines: usize) {
        self.general.follow_mode = false;
        self.top = self.top.saturating_sub(lines);
    }

    fn scroll_down(&mut self, lines: usize) {
        self.top = (self.top + lines).min(self.bottom_top());
    }

    /// Screen rows line `index` occupies at the current width.
    fn rows_for(&self, index: usize) -> usize {
        if !self.general.wrap_mode {
            return 1;
        }
        self.document
            .line(index)
            .map(|line| layout_line(&line, self.body_width, true).len())
            .unwrap_or(1)
    }

    /// The `top` that puts the last line at the bottom of the screen.
    fn bottom_top(&self) -> usize {
        let count = self.document.line_count();
        let mut rows = 0;
        let mut top = count;
        while top > 0 {
            let needed = self.rows_for(top - 1);
            if rows + needed > self.body_height {
                break;
            }
            rows += needed;
            top -= 1;
        }
        // a single line taller than the screen still gets shown
        if top == count && count > 0 { count - 1 } else { top }
    }

    /// Draw the document and status bar.
    pub fn render(&mut self, frame: &mut Frame) {
        let [body, status] =
            Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).areas(frame.area());
        self.body_width = usize::from(body.width).max(1);
        self.body_height = usize::from(body.height).max(1);

        if self.general.follow_mode {
            self.top = self.bottom_top();
        } else {
            self.top = self.top.min(self.bottom_top());
        }

        let mut rows: Vec<Line> = Vec::with_capacity(self.body_height);
        let mut index = self.top;
        while rows.len() < self.body_height {
            let Some(line) = self.document.line(index) else {
                break;
            };
            for row in layout_line(&line, self.body_width, self.general.wrap_mode) {
                if rows.len() == self.body_height {
                    break;
                }
                rows.push(Line::raw(row));
            }
            index += 1;
        }
        frame.render_widget(Paragraph::new(rows), body);

        let count = self.document.line_count();
        let last = index.min(count);
        let mut flags = Vec::new();
        if self.general.follow_mode {
            flags.push("follow");
        }
        if self.general.wrap_mode {
            flags.push("wrap");
        }
        let text = format!(
            " {} | {}-{}/{} | {} ",
            self.document.caption,
            if count == 0 { 0 } else { self.top + 1 },
            last,
            count,
            flags.join(" "),
        );
        frame.render_widget(
            Paragraph::new(Line::raw(text))
                .style(Style::default().add_modifier(Modifier::REVERSED)),
            status,
        );
    }

    fn enter(&mut self) -> Result<(), ViewerError> {
        let guard = TerminalGuard::enter()?;
        let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
        terminal.clear()?;
        terminal.hide_cursor()?;
        self.guard = Some(guard);
        self.terminal = Some(terminal);
        Ok(())
    }

    fn draw(&mut self) -> Result<(), ViewerError> {
        let Some(mut terminal) = self.terminal.take() else {
            return Ok(());
        };
        let result = self.draw_on(&mut terminal);
        self.terminal = Some(terminal);
        result
    }

    /// Draw one frame on `terminal`.
    fn draw_on<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), ViewerError> {
        terminal.draw(|frame| self.render(frame)).map(|_| ())?;
        Ok(())
    }
}

impl DocumentViewer for Pager {
    fn replace_document(&mut self, document: Document) {
        self.document = document;
        self.top = 0;
    }

    fn caption(&self) -> &str {
        &self.document.caption
    }

    fn set_general(&mut self, general: General) {
        self.general = general;
    }

    fn set_key_handler(&mut self, action: Action, keys: &[&str]) -> Result<(), ViewerError> {
        let mut parsed = Vec::with_capacity(keys.len());
        for key in keys {
            let binding: KeyBinding = key.parse()?;
            if let Some(existing) = self.bindings.get(&binding)
                && *existing != Binding::Action(action)
            {
                return Err(ViewerError::KeyInUse {
                    key: key.to_string(),
                    bound: existing.name().to_string(),
                });
            }
            parsed.push(binding);
        }
        for binding in parsed {
            self.bindings.insert(binding, Binding::Action(action));
        }
        Ok(())
    }

    fn run(&mut self) -> Result<RunOutcome, ViewerError> {
        if self.terminal.is_none() {
            self.enter()?;
        }

        loop {
            if let Err(e) = self.document.refresh() {
                tracing::warn!("Failed to read {}: {}", self.document.path().display(), e);
            }
            self.draw()?;

            if event::poll(TICK)?
                && let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
                && let Some(outcome) = self.handle_key(key)
            {
                return Ok(outcome);
            }
        }
    }

    fn close(&mut self) {
        if let Some(mut terminal) = self.terminal.take() {
            let _ = terminal.show_cursor();
        }
        self.guard.take();
    }
}

impl Drop for Pager {
    fn drop(&mut self) {
        self.close();
    }
}

struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(e);
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

/// Split one document line into screen rows.
///
/// Tabs expand to spaces and other control characters are dropped so raw
/// container output cannot move the cursor. Without wrapping the line is
/// cut at `width`.
fn layout_line(line: &str, width: usize, wrap: bool) -> Vec<String> {
    let width = width.max(1);
    let mut rows = Vec::new();
    let mut row = String::new();
    let mut used = 0;

    for c in line.chars() {
        let (text, w) = match c {
            '\t' => {
                let pad = TAB_WIDTH - (used % TAB_WIDTH);
                (" ".repeat(pad), pad)
            }
            c if c.is_control() => continue,
            c => (c.to_string(), c.width().unwrap_or(0)),
        };
        if used > 0 && used + w > width {
            if !wrap {
                break;
            }
            rows.push(std::mem::take(&mut row));
            used = 0;
        }
        row.push_str(&text);
        used += w;
    }
    rows.push(row);
    rows
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use crossterm::event::{KeyCode, KeyEventState, KeyModifiers};
    use pretty_assertions::assert_eq;
    use ratatui::backend::TestBackend;

    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::empty(),
        }
    }

    fn pager_with(lines: &[&str]) -> (Pager, tempfile::NamedTempFile) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        let mut document = PagerFactory.open_document(file.path()).unwrap();
        document.caption = "web".to_string();
        document.refresh().unwrap();
        (Pager::new(document), file)
    }

    fn screen(pager: &mut Pager, width: u16, height: u16) -> Vec<String> {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|frame| pager.render(frame)).unwrap();
        let buffer = terminal.backend().buffer();
        (0..height)
            .map(|y| {
                (0..width)
                    .map(|x| buffer[(x, y)].symbol())
                    .collect::<String>()
                    .trim_end()
                    .to_string()
            })
            .collect()
    }

    #[test]
    fn test_renders_lines_and_caption() {
        let (mut pager, _file) = pager_with(&["alpha", "beta"]);
        let rows = screen(&mut pager, 30, 4);

        assert_eq!(rows[0], "alpha");
        assert_eq!(rows[1], "beta");
        assert_eq!(rows[2], "");
        assert!(rows[3].contains("web"), "status bar: {}", rows[3]);
        assert!(rows[3].contains("1-2/2"), "status bar: {}", rows[3]);
    }

    #[test]
    fn test_draw_on_renders_repeatedly() {
        let (mut pager, _file) = pager_with(&["alpha"]);
        let mut terminal = Terminal::new(TestBackend::new(20, 3)).unwrap();

        pager.draw_on(&mut terminal).unwrap();
        pager.draw_on(&mut terminal).unwrap();

        assert_eq!(terminal.backend().buffer()[(0, 0)].symbol(), "a");
        assert!(pager.draw().is_ok(), "no terminal taken yet");
    }

    #[test]
    fn test_follow_mode_shows_the_end() {
        let lines: Vec<String> = (1..=10).map(|i| format!("line {i}")).collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let (mut pager, _file) = pager_with(&refs);
        pager.set_general(General {
            follow_mode: true,
            wrap_mode: false,
        });

        let rows = screen(&mut pager, 20, 4);
        assert_eq!(&rows[..3], &["line 8", "line 9", "line 10"]);
    }

    #[test]
    fn test_follow_mode_tracks_growth() {
        let (mut pager, mut file) = pager_with(&["one", "two", "three"]);
        pager.set_general(General {
            follow_mode: true,
            wrap_mode: true,
        });
        screen(&mut pager, 20, 3);

        writeln!(file, "four").unwrap();
        pager.document.refresh().unwrap();
        let rows = screen(&mut pager, 20, 3);
        assert_eq!(&rows[..2], &["three", "four"]);
    }

    #[test]
    fn test_wrap_mode_wraps_long_lines() {
        let (mut pager, _file) = pager_with(&["abcdefghij", "xy"]);
        pager.set_general(General {
            follow_mode: false,
            wrap_mode: true,
        });
        let rows = screen(&mut pager, 4, 5);
        assert_eq!(&rows[..4], &["abcd", "efgh", "ij", "xy"]);

        pager.set_general(General::default());
        let rows = screen(&mut pager, 4, 5);
        assert_eq!(&rows[..2], &["abcd", "xy"]);
    }

    #[test]
    fn test_bound_action_is_returned() {
        let (mut pager, _file) = pager_with(&["x"]);
        pager.set_key_handler(Action::AllLogs, &["ctrl+y"]).unwrap();
        pager.set_key_handler(Action::PrevContainer, &["left"]).unwrap();

        assert_eq!(
            pager.handle_key(key(KeyCode::Char('y'), KeyModifiers::CONTROL)),
            Some(RunOutcome::Action(Action::AllLogs))
        );
        assert_eq!(
            pager.handle_key(key(KeyCode::Left, KeyModifiers::NONE)),
            Some(RunOutcome::Action(Action::PrevContainer))
        );
        assert_eq!(pager.handle_key(key(KeyCode::Char('y'), KeyModifiers::NONE)), None);
    }

    #[test]
    fn test_quit_keys() {
        let (mut pager, _file) = pager_with(&["x"]);
        assert_eq!(
            pager.handle_key(key(KeyCode::Char('q'), KeyModifiers::NONE)),
            Some(RunOutcome::Quit)
        );
        assert_eq!(
            pager.handle_key(key(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(RunOutcome::Quit)
        );
    }

    #[test]
    fn test_key_conflicts_are_rejected() {
        let (mut pager, _file) = pager_with(&["x"]);
        pager.set_key_handler(Action::SystemReport, &["s"]).unwrap();

        let err = pager.set_key_handler(Action::AllLogs, &["s"]).unwrap_err();
        assert!(matches!(err, ViewerError::KeyInUse { ref bound, .. } if bound == "systemReport"));

        let err = pager.set_key_handler(Action::AllLogs, &["q"]).unwrap_err();
        assert!(matches!(err, ViewerError::KeyInUse { ref bound, .. } if bound == "quit"));

        let err = pager.set_key_handler(Action::AllLogs, &["hyper+q"]).unwrap_err();
        assert!(matches!(err, ViewerError::InvalidKey { .. }));

        // rebinding the same action is fine
        pager.set_key_handler(Action::SystemReport, &["s"]).unwrap();
    }

    #[test]
    fn test_scrolling_up_leaves_follow_mode() {
        let lines: Vec<String> = (1..=10).map(|i| format!("line {i}")).collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let (mut pager, _file) = pager_with(&refs);
        pager.set_general(General {
            follow_mode: true,
            wrap_mode: false,
        });
        screen(&mut pager, 20, 4);

        pager.handle_key(key(KeyCode::Up, KeyModifiers::NONE));
        assert!(!pager.general().follow_mode);
        let rows = screen(&mut pager, 20, 4);
        assert_eq!(rows[0], "line 7");

        pager.handle_key(key(KeyCode::Char('G'), KeyModifiers::SHIFT));
        assert!(pager.general().follow_mode);
        let rows = screen(&mut pager, 20, 4);
        assert_eq!(rows[0], "line 8");

        pager.handle_key(key(KeyCode::Char('g'), KeyModifiers::NONE));
        let rows = screen(&mut pager, 20, 4);
        assert_eq!(rows[0], "line 1");
    }

    #[test]
    fn test_replace_document_resets_position() {
        let (mut pager, _file) = pager_with(&["a", "b", "c", "d", "e"]);
        screen(&mut pager, 10, 3);
        pager.handle_key(key(KeyCode::Down, KeyModifiers::NONE));
        pager.handle_key(key(KeyCode::Down, KeyModifiers::NONE));

        let (other, _other_file) = pager_with(&["z"]);
        let mut document = Document::open(other.document().path()).unwrap();
        document.caption = "db".to_string();
        pager.replace_document(document);

        assert_eq!(pager.caption(), "db");
        assert_eq!(pager.top, 0);
    }

    #[test]
    fn test_layout_line_strips_control_chars() {
        assert_eq!(layout_line("a\tb", 20, false), vec!["a   b"]);
        assert_eq!(layout_line("a\x1b[31mred", 20, false), vec!["a[31mred"]);
        assert_eq!(layout_line("", 20, true), vec![""]);
    }
}
