use crate::conversation::ResultSnapshot;
use crate::plot::PlotView;
use crate::runner::{AppCommand, AppEvent};
use crate::transcript::{Speaker, TranscriptEntry};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style, Stylize};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use std::cell::Cell;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

const SPINNER: [&str; 4] = ["◐", "◓", "◑", "◒"];

pub struct App {
    pub transcript: Vec<TranscriptEntry>,
    pub input: String,
    pub cursor_g: usize,
    /// Text sent to the runner and not yet confirmed by a transcript update.
    pub pending: Option<String>,

    pub results: ResultSnapshot,
    pub plot: PlotView,

    pub tx: UnboundedSender<AppCommand>,
    pub rx: UnboundedReceiver<AppEvent>,

    pub is_running: bool,
    pub spinner_phase: usize,
    pub last_spinner_tick: Instant,
    pub spinner_status: String,

    pub scroll_offset: usize,
    pub auto_scroll: bool,
    /// Wrapped row count and visible height of the chat pane, as last drawn.
    chat_rows: Cell<usize>,
    chat_height: Cell<usize>,
}

impl App {
    pub fn new(tx: UnboundedSender<AppCommand>, rx: UnboundedReceiver<AppEvent>) -> Self {
        Self {
            transcript: Vec::new(),
            input: String::new(),
            cursor_g: 0,
            pending: None,
            results: ResultSnapshot::default(),
            plot: PlotView::Loading,
            tx,
            rx,
            is_running: false,
            spinner_phase: 0,
            last_spinner_tick: Instant::now(),
            spinner_status: String::new(),
            scroll_offset: 0,
            auto_scroll: true,
            chat_rows: Cell::new(0),
            chat_height: Cell::new(0),
        }
    }

    pub fn tick_spinner(&mut self) {
        if self.is_running && self.last_spinner_tick.elapsed() >= Duration::from_millis(120) {
            self.spinner_phase = (self.spinner_phase + 1) % SPINNER.len();
            self.last_spinner_tick = Instant::now();
        }
    }

    /// Returns true when the user asked to quit.
    pub fn on_event(&mut self, ev: crossterm::event::Event) -> bool {
        use crossterm::event::{Event, KeyCode, KeyEventKind, KeyModifiers};
        match ev {
            Event::Key(k) => {
                if k.kind != KeyEventKind::Press {
                    return false;
                }
                if k.modifiers.contains(KeyModifiers::CONTROL) {
                    match k.code {
                        KeyCode::Char('c') => return true,
                        KeyCode::Char('r') => self.refresh_plot(),
                        _ => {}
                    }
                    return false;
                }
                match k.code {
                    KeyCode::Esc => return true,
                    KeyCode::Enter => self.submit(),
                    KeyCode::Char(c) => self.insert_char(c),
                    KeyCode::Backspace => self.backspace(),
                    KeyCode::Delete => self.delete(),
                    KeyCode::Left => self.left(),
                    KeyCode::Right => self.right(),
                    KeyCode::Home => self.cursor_g = 0,
                    KeyCode::End => self.cursor_g = self.input.graphemes(true).count(),
                    KeyCode::Up => {
                        if self.auto_scroll {
                            self.scroll_offset = self.max_scroll();
                        }
                        self.scroll_offset = self.scroll_offset.saturating_sub(1);
                        self.auto_scroll = false;
                    }
                    KeyCode::Down => {
                        if self.scroll_offset < self.max_scroll() {
                            self.scroll_offset += 1;
                        } else {
                            self.auto_scroll = true;
                        }
                    }
                    _ => {}
                }
            }
            Event::Paste(s) => {
                // Single-line input field.
                for c in s.chars().filter(|c| !c.is_control()) {
                    self.insert_char(c);
                }
            }
            _ => {}
        }
        false
    }

    pub fn poll_async(&mut self) {
        while let Ok(ev) = self.rx.try_recv() {
            self.apply(ev);
        }
    }

    pub fn apply(&mut self, ev: AppEvent) {
        match ev {
            AppEvent::Busy(status) => {
                self.is_running = true;
                self.spinner_phase = 0;
                self.spinner_status = status;
            }
            AppEvent::Idle => {
                self.is_running = false;
                self.spinner_status.clear();
                self.pending = None;
            }
            AppEvent::Transcript(entries) => {
                self.transcript = entries;
                self.pending = None;
            }
            AppEvent::Results(snapshot) => self.results = snapshot,
            AppEvent::Plot(view) => self.plot = view,
            AppEvent::SubmitFailed(text) => {
                if self.input.is_empty() {
                    self.cursor_g = text.graphemes(true).count();
                    self.input = text;
                }
                self.pending = None;
            }
        }
    }

    fn refresh_plot(&mut self) {
        if !self.is_running && self.tx.send(AppCommand::RefreshPlot).is_ok() {
            self.is_running = true;
        }
    }

    /// Largest scroll offset that still fills the chat pane.
    fn max_scroll(&self) -> usize {
        self.chat_rows.get().saturating_sub(self.chat_height.get())
    }

    fn left(&mut self) {
        if self.cursor_g > 0 {
            self.cursor_g -= 1;
        }
    }
    fn right(&mut self) {
        let n = self.input.graphemes(true).count();
        if self.cursor_g < n {
            self.cursor_g += 1;
        }
    }
    fn insert_char(&mut self, c: char) {
        let bi = byte_idx_for_g(&self.input, self.cursor_g);
        self.input.insert(bi, c);
        self.right();
    }
    fn backspace(&mut self) {
        if self.cursor_g == 0 {
            return;
        }
        let l = byte_idx_for_g(&self.input, self.cursor_g - 1);
        let r = byte_idx_for_g(&self.input, self.cursor_g);
        self.input.replace_range(l..r, "");
        self.left();
    }
    fn delete(&mut self) {
        let l = byte_idx_for_g(&self.input, self.cursor_g);
        let r = byte_idx_for_g(&self.input, self.cursor_g + 1);
        self.input.replace_range(l..r, "");
    }

    /// Sends the input to the runner. Blank input and input typed while a
    /// request is in flight stay in the box.
    pub fn submit(&mut self) {
        if self.is_running || self.input.trim().is_empty() {
            return;
        }

        let line = std::mem::take(&mut self.input);
        self.cursor_g = 0;
        if self.tx.send(AppCommand::Submit(line.clone())).is_ok() {
            self.is_running = true;
            self.pending = Some(line);
        } else {
            self.cursor_g = line.graphemes(true).count();
            self.input = line;
        }
    }

    pub fn render(&self, f: &mut Frame) {
        let [nav_area, body_area, footer_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(8),
            Constraint::Length(1),
        ])
        .areas(f.area());

        f.render_widget(
            Paragraph::new(" Mental Health")
                .style(Style::default().bg(Color::DarkGray).fg(Color::White).bold()),
            nav_area,
        );

        let [chat_area, side_area] =
            Layout::horizontal([Constraint::Percentage(40), Constraint::Percentage(60)])
                .areas(body_area);
        self.render_chat(f, chat_area);

        let [results_area, plot_area] =
            Layout::vertical([Constraint::Min(8), Constraint::Length(5)]).areas(side_area);
        self.render_results(f, results_area);
        self.render_plot(f, plot_area);

        f.render_widget(
            Paragraph::new("© 2024 My Application. All rights reserved.")
                .alignment(Alignment::Center)
                .style(Style::default().bg(Color::DarkGray).fg(Color::White)),
            footer_area,
        );
    }

    fn render_chat(&self, f: &mut Frame, area: Rect) {
        let [messages_area, input_area] =
            Layout::vertical([Constraint::Min(1), Constraint::Length(3)]).areas(area);

        let mut lines: Vec<Line> = Vec::new();
        for entry in &self.transcript {
            lines.push(match entry.speaker {
                Speaker::Bot => Line::from(Span::styled(
                    entry.text.clone(),
                    Style::default().fg(Color::LightBlue),
                ))
                .alignment(Alignment::Left),
                Speaker::User => Line::from(Span::styled(
                    entry.text.clone(),
                    Style::default().fg(Color::White).bold(),
                ))
                .alignment(Alignment::Right),
            });
        }
        if let Some(pending) = &self.pending {
            lines.push(
                Line::from(Span::styled(
                    pending.clone(),
                    Style::default().fg(Color::Gray).add_modifier(Modifier::DIM),
                ))
                .alignment(Alignment::Right),
            );
        }

        // Scrolling counts rendered rows, so measure the text after wrapping.
        let inner_width = messages_area.width.saturating_sub(2);
        let visible = messages_area.height.saturating_sub(2) as usize;
        let rows = Paragraph::new(lines.clone())
            .wrap(Wrap { trim: false })
            .line_count(inner_width);
        self.chat_rows.set(rows);
        self.chat_height.set(visible);
        let offset = if self.auto_scroll {
            self.max_scroll()
        } else {
            self.scroll_offset.min(self.max_scroll())
        };

        let para = Paragraph::new(Text::from(lines))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Chat")
                    .title_style(Style::default().fg(Color::Blue).bold()),
            )
            .wrap(Wrap { trim: false })
            .scroll((offset as u16, 0));
        f.render_widget(para, messages_area);

        let title = if self.is_running {
            format!("{} {}", SPINNER[self.spinner_phase], self.spinner_status)
        } else {
            "Type a message... (Enter=send, Ctrl+R=reload plot, Esc=quit)".to_string()
        };
        let input = Paragraph::new(self.input.as_str())
            .style(Style::default().fg(Color::Yellow))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(title)
                    .title_style(Style::default().fg(Color::Green).bold()),
            );
        f.render_widget(input, input_area);

        let col = (cursor_column(&self.input, self.cursor_g) as u16)
            .min(input_area.width.saturating_sub(3));
        f.set_cursor_position(Position::new(input_area.x + 1 + col, input_area.y + 1));
    }

    fn render_results(&self, f: &mut Frame, area: Rect) {
        let [top, bottom] =
            Layout::vertical([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(area);
        let [polarity, concern] =
            Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(top);
        let [category, intensity] =
            Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)])
                .areas(bottom);

        let cells = [
            ("Polarity", &self.results.polarity, Color::Blue, polarity),
            ("Concern", &self.results.concern, Color::Green, concern),
            ("Category", &self.results.category, Color::Red, category),
            ("Intensity", &self.results.intensity, Color::Yellow, intensity),
        ];
        for (title, value, color, cell) in cells {
            let inner_height = cell.height.saturating_sub(2);
            let mut text = vec![Line::default(); (inner_height / 2) as usize];
            text.push(Line::from(value.as_str()).bold());
            let para = Paragraph::new(text)
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true })
                .style(Style::default().fg(color))
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title(title)
                        .title_alignment(Alignment::Center)
                        .border_style(Style::default().fg(color)),
                );
            f.render_widget(para, cell);
        }
    }

    fn render_plot(&self, f: &mut Frame, area: Rect) {
        let mut lines = match &self.plot {
            PlotView::Loading => vec![Line::from("Loading plot...").italic()],
            PlotView::Ready {
                path,
                bytes,
                fetched_at,
            } => vec![
                Line::from(vec![Span::raw("Image: "), Span::raw(path.display().to_string()).bold()]),
                Line::from(format!(
                    "{} KB, fetched {}",
                    bytes.div_ceil(1024),
                    fetched_at.format("%H:%M:%S")
                )),
            ],
        };
        if let Some(recorded_at) = &self.results.recorded_at {
            lines.push(Line::from(format!("Last analysis recorded {recorded_at}")).dim());
        }

        let para = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
            Block::default()
                .borders(Borders::ALL)
                .title("Category vs Intensity")
                .title_style(Style::default().fg(Color::Magenta).bold()),
        );
        f.render_widget(para, area);
    }
}

fn grapheme_boundaries(s: &str) -> Vec<usize> {
    let mut idxs: Vec<usize> = s.grapheme_indices(true).map(|(i, _)| i).collect();
    idxs.push(s.len());
    idxs
}

fn byte_idx_for_g(s: &str, g: usize) -> usize {
    let v = grapheme_boundaries(s);
    *v.get(g).unwrap_or(&s.len())
}

/// Terminal columns taken by the first `g` graphemes of `s`.
fn cursor_column(s: &str, g: usize) -> usize {
    s[..byte_idx_for_g(s, g)].width()
}
