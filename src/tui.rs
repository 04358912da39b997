//! Terminal chat view: a scrolling transcript pane above a one-line input.

use std::io::{self, Stdout};

use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use futures_util::StreamExt;
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Constraint, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::chat::{ChatEvent, ChatSession, ChatState};
use crate::error::ChordError;
use crate::platform::{Message, Platform, PlatformError};
use crate::transcript::{Post, Transcript};

const INPUT_HINT: &str = " Enter send | Esc quit | PgUp/PgDn scroll | End bottom ";

#[derive(Debug, PartialEq, Eq)]
pub enum ViewAction {
    None,
    Submit(String),
    Quit,
}

pub struct ChatView {
    title: String,
    input: String,
    /// Lines between the bottom of the transcript and the bottom of the pane.
    scroll: usize,
    page: usize,
}

impl ChatView {
    pub fn new(title: String) -> Self {
        Self {
            title,
            input: String::new(),
            scroll: 0,
            page: 1,
        }
    }

    /// Enter always clears the input line, whatever happens to the text.
    pub fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
        let control = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => ViewAction::Quit,
            KeyCode::Char('c') if control => ViewAction::Quit,
            KeyCode::Enter => {
                self.scroll = 0;
                ViewAction::Submit(std::mem::take(&mut self.input))
            }
            KeyCode::Backspace => {
                self.input.pop();
                ViewAction::None
            }
            KeyCode::PageUp => {
                self.scroll = self.scroll.saturating_add(self.page);
                ViewAction::None
            }
            KeyCode::PageDown => {
                self.scroll = self.scroll.saturating_sub(self.page);
                ViewAction::None
            }
            KeyCode::End => {
                self.scroll = 0;
                ViewAction::None
            }
            KeyCode::Char(ch) if !control && !key.modifiers.contains(KeyModifiers::ALT) => {
                self.input.push(ch);
                ViewAction::None
            }
            _ => ViewAction::None,
        }
    }

    pub fn render(&mut self, frame: &mut Frame, transcript: &Transcript) {
        let [history_area, input_area] =
            Layout::vertical([Constraint::Min(3), Constraint::Length(3)]).areas(frame.area());

        let lines: Vec<Line<'static>> = transcript.posts().iter().flat_map(post_lines).collect();
        let history = Paragraph::new(lines).wrap(Wrap { trim: false });

        // Scrolling counts rendered rows, so wrapped bodies take their full height.
        let rows = history.line_count(history_area.width.saturating_sub(2));
        let height = usize::from(history_area.height.saturating_sub(2));
        self.page = height.max(1);
        let max_scroll = rows.saturating_sub(height);
        self.scroll = self.scroll.min(max_scroll);
        let top = u16::try_from(max_scroll - self.scroll).unwrap_or(u16::MAX);

        let history = history
            .block(Block::bordered().title(format!(" {} ", self.title)))
            .scroll((top, 0));
        frame.render_widget(history, history_area);

        let input = Paragraph::new(self.input.as_str()).block(Block::bordered().title_bottom(INPUT_HINT));
        frame.render_widget(input, input_area);

        let typed = u16::try_from(Span::raw(self.input.as_str()).width()).unwrap_or(u16::MAX);
        let right_edge = input_area.x + input_area.width.saturating_sub(2);
        let cursor_x = (input_area.x + 1).saturating_add(typed).min(right_edge);
        frame.set_cursor_position((cursor_x, input_area.y + 1));
    }
}

fn post_lines(post: &Post) -> Vec<Line<'static>> {
    let prefix = format!("{} <{}> ", post.time, post.author);
    let indent = " ".repeat(Span::raw(prefix.as_str()).width());
    let mut lines = Vec::new();
    for (index, text) in post.body.split('\n').enumerate() {
        if index == 0 {
            lines.push(Line::from(vec![
                Span::styled(post.time.clone(), Style::default().fg(Color::DarkGray)),
                Span::raw(" "),
                Span::styled(
                    format!("<{}>", post.author),
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                ),
                Span::raw(" "),
                Span::raw(text.to_string()),
            ]));
        } else {
            lines.push(Line::from(format!("{indent}{text}")));
        }
    }
    lines
}

struct TerminalGuard {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        enable_raw_mode()?;
        let setup = execute!(io::stdout(), EnterAlternateScreen)
            .and_then(|_| Terminal::new(CrosstermBackend::new(io::stdout())));
        match setup {
            Ok(terminal) => Ok(Self { terminal }),
            Err(error) => {
                let _ = execute!(io::stdout(), LeaveAlternateScreen);
                let _ = disable_raw_mode();
                Err(error)
            }
        }
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

/// Runs the chat view until the user quits, a signal arrives or a fatal
/// error occurs. All session mutation happens on this loop.
pub async fn run<P: Platform>(
    chat: &mut ChatSession<'_, P>,
    inbound: &mut mpsc::UnboundedReceiver<Message>,
    title: String,
) -> Result<(), ChordError> {
    let mut guard = TerminalGuard::enter()?;
    let mut view = ChatView::new(title);
    let result = event_loop(&mut guard.terminal, &mut view, chat, inbound).await;
    chat.close();
    drop(guard);
    result
}

async fn event_loop<B: Backend, P: Platform>(
    terminal: &mut Terminal<B>,
    view: &mut ChatView,
    chat: &mut ChatSession<'_, P>,
    inbound: &mut mpsc::UnboundedReceiver<Message>,
) -> Result<(), ChordError> {
    let mut keys = EventStream::new();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    while chat.state() == ChatState::Live {
        terminal.draw(|frame| view.render(frame, chat.transcript()))?;

        tokio::select! {
            _ = &mut shutdown => {
                info!("received shutdown signal");
                return Ok(());
            }
            message = inbound.recv() => {
                let message = message.ok_or(ChordError::Platform {
                    context: "gateway",
                    source: PlatformError::Closed,
                })?;
                let applied = chat.apply(ChatEvent::Inbound(message)).await?;
                debug!(?applied, cursor = ?chat.cursor(), "inbound message");
            }
            event = keys.next() => match event {
                Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                    match view.handle_key(key) {
                        ViewAction::Quit => return Ok(()),
                        ViewAction::Submit(text) => {
                            chat.apply(ChatEvent::Submit(text)).await?;
                        }
                        ViewAction::None => {}
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(error)) => return Err(error.into()),
                None => return Ok(()),
            },
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    let interrupt = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => {}
        _ = terminate => {}
    }
}
