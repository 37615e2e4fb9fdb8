use std::io::stdout;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use ratatui::DefaultTerminal;
use tracing::{debug, warn};

use crate::app::{App, Message, Model, ToastLevel, effects, input, update};
use crate::watcher::DocumentWatcher;

/// Poll interval while renders are outstanding, so deliveries show promptly.
const RENDER_POLL: Duration = Duration::from_millis(50);
const IDLE_POLL: Duration = Duration::from_millis(250);

impl App {
    /// Open the initial document, then run the terminal until quit.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, the terminal cannot be
    /// initialized, or the event loop hits an I/O failure.
    pub fn run(self) -> Result<()> {
        let Self {
            mut session,
            file_path,
            watch_enabled,
            style,
            config_global_path,
            config_local_path,
        } = self;

        if let Some(path) = &file_path {
            session
                .open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
        }

        let mut terminal = ratatui::try_init()
            .context("Failed to initialize terminal; flint requires an interactive terminal")?;
        let size = terminal.size()?;

        let mut model = Model::new(session, (size.width, size.height));
        model.style = style;
        model.watch_enabled = watch_enabled;
        model.config_global_path = config_global_path;
        model.config_local_path = config_local_path;
        model.relayout();

        let watcher = if watch_enabled {
            match effects::make_watcher(model.session.document().path()) {
                Ok(watcher) => Some(watcher),
                Err(err) => {
                    model.watch_enabled = false;
                    warn!(%err, "file watcher unavailable");
                    model.show_toast(ToastLevel::Warning, format!("Watch unavailable: {err}"));
                    None
                }
            }
        } else {
            None
        };

        let result = execute!(stdout(), EnableMouseCapture)
            .context("Failed to enable mouse capture")
            .and_then(|()| event_loop(&mut terminal, model, watcher));

        let _ = execute!(stdout(), DisableMouseCapture);
        ratatui::restore();
        result
    }
}

fn dispatch(model: Model, watcher: &mut Option<DocumentWatcher>, msg: Message) -> Model {
    debug!(?msg, "message");
    let side_msg = msg.clone();
    let mut model = update(model, msg);
    effects::handle_message_side_effects(&mut model, watcher, &side_msg);
    model
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    mut model: Model,
    mut watcher: Option<DocumentWatcher>,
) -> Result<()> {
    let mut needs_render = true;

    loop {
        if model.expire_toast(Instant::now()) {
            needs_render = true;
        }

        if model.session.pump() > 0 {
            model = dispatch(model, &mut watcher, Message::RendersProgressed);
            needs_render = true;
        }

        if model.watch_enabled
            && watcher
                .as_mut()
                .is_some_and(DocumentWatcher::take_change_ready)
        {
            model = dispatch(model, &mut watcher, Message::FileChanged);
            needs_render = true;
        }

        let poll = if needs_render {
            Duration::ZERO
        } else if model.session.pending_renders() > 0 {
            RENDER_POLL
        } else {
            IDLE_POLL
        };
        if event::poll(poll)? {
            if let Some(msg) = input::handle_event(&event::read()?, &model) {
                model = dispatch(model, &mut watcher, msg);
                needs_render = true;
            }
            // Coalesce key repeat bursts into a single render.
            while event::poll(Duration::ZERO)? {
                if let Some(msg) = input::handle_event(&event::read()?, &model) {
                    model = dispatch(model, &mut watcher, msg);
                    needs_render = true;
                }
            }
        }

        if needs_render {
            terminal.draw(|frame| crate::ui::render(&model, frame))?;
            needs_render = false;
        }

        if model.should_quit {
            break;
        }
    }
    Ok(())
}
