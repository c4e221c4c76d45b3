//! Interactive console transport.
//!
//! Launch with `wallcount-bot console` (or as part of `serve`). Lines are
//! handled as chat messages from chat 0. Tab completes command names.

use rustyline::completion::{Completer, Pair};
use rustyline::config::CompletionType;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{
    Cmd, ConditionalEventHandler, Config, Editor, Event, EventContext, EventHandler,
    ExternalPrinter, Helper, KeyEvent, RepeatCount,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;

use crate::commands::{CommandHandler, Notification, Reply, COMMANDS};

/// Chat id used for everything typed into the console.
pub const CONSOLE_CHAT_ID: i64 = 0;

const CONSOLE_COMMANDS: &[(&str, &str)] = &[
    ("/clear", "Clear the screen"),
    ("/exit", "Quit the console"),
];

fn all_commands() -> impl Iterator<Item = &'static (&'static str, &'static str)> {
    COMMANDS.iter().chain(CONSOLE_COMMANDS)
}

struct ConsoleHelper;

impl Completer for ConsoleHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let matches = matching_commands(&line[..pos])
            .into_iter()
            .map(|(cmd, desc)| Pair {
                display: format!("{cmd:<12} {desc}"),
                replacement: format!("{cmd} "),
            })
            .collect();
        Ok((0, matches))
    }
}

impl Hinter for ConsoleHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if pos < line.len() || !line.starts_with('/') {
            return None;
        }
        matching_commands(line)
            .into_iter()
            .map(|(cmd, _)| cmd)
            .find(|cmd| *cmd != line)
            .map(|cmd| cmd[line.len()..].to_string())
    }
}

impl Highlighter for ConsoleHelper {}
impl Validator for ConsoleHelper {}
impl Helper for ConsoleHelper {}

struct TabCompleteOrAcceptHint;

impl ConditionalEventHandler for TabCompleteOrAcceptHint {
    fn handle(
        &self,
        _evt: &Event,
        _n: RepeatCount,
        _positive: bool,
        ctx: &EventContext<'_>,
    ) -> Option<Cmd> {
        if ctx.has_hint() {
            Some(Cmd::CompleteHint)
        } else {
            Some(Cmd::Complete)
        }
    }
}

/// Commands whose name starts with `input`.
fn matching_commands(input: &str) -> Vec<(&'static str, &'static str)> {
    all_commands()
        .filter(|(cmd, _)| cmd.starts_with(input))
        .copied()
        .collect()
}

/// Text printed for a reply.
fn render(reply: &Reply) -> String {
    match reply {
        Reply::Text(text) => text
            .lines()
            .map(|l| format!("  {l}"))
            .collect::<Vec<_>>()
            .join("\n"),
        Reply::Reaction(reaction) => format!("  {}", reaction.emoji()),
    }
}

fn render_notification(note: &Notification) -> String {
    format!("  \x1b[33m\u{1F514}\x1b[0m {}", note.text)
}

/// Run the console until `/exit`, Ctrl+C or EOF.
///
/// Blocking; call from `spawn_blocking`. Sets `shutdown` on the way out.
pub fn run(
    handler: CommandHandler,
    mut notifications: UnboundedReceiver<Notification>,
    shutdown: watch::Sender<bool>,
) -> anyhow::Result<()> {
    eprintln!();
    eprintln!(
        "  \x1b[32m\u{25c9}\x1b[0m \x1b[1mwallcount-bot v{}\x1b[0m \x1b[90mclimbers on the wall\x1b[0m",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!();
    eprintln!(
        "    Type \x1b[36m/help\x1b[0m for commands, \x1b[90mTab\x1b[0m to complete, \x1b[90m/exit\x1b[0m to quit."
    );
    eprintln!();

    let config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .completion_type(CompletionType::List)
        .build();

    let mut rl: Editor<ConsoleHelper, rustyline::history::DefaultHistory> =
        Editor::with_config(config)?;
    rl.set_helper(Some(ConsoleHelper));
    rl.bind_sequence(
        KeyEvent::from('\t'),
        EventHandler::Conditional(Box::new(TabCompleteOrAcceptHint)),
    );

    // Notifications land while the prompt is active.
    match rl.create_external_printer() {
        Ok(mut printer) => {
            std::thread::spawn(move || {
                while let Some(note) = notifications.blocking_recv() {
                    if printer.print(render_notification(&note)).is_err() {
                        break;
                    }
                }
            });
        }
        Err(e) => {
            tracing::debug!("no external printer ({e}), notifications go to stderr");
            std::thread::spawn(move || {
                while let Some(note) = notifications.blocking_recv() {
                    eprintln!("{}", render_notification(&note));
                }
            });
        }
    }

    let hist_path = dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".wallcount")
        .join("console_history");
    if hist_path.exists() {
        let _ = rl.load_history(&hist_path);
    }

    let prompt = " \x1b[36mwall>\x1b[0m ";

    loop {
        match rl.readline(prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                match line {
                    "/exit" | "/quit" => {
                        eprintln!("  Bye.");
                        break;
                    }
                    "/clear" => {
                        eprint!("\x1b[2J\x1b[H");
                        continue;
                    }
                    _ => {}
                }

                match handler.handle(CONSOLE_CHAT_ID, line) {
                    Ok(Some(reply)) => eprintln!("{}", render(&reply)),
                    Ok(None) => {}
                    Err(e) => eprintln!("  Error: {e}"),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                eprintln!("  Bye.");
                break;
            }
            Err(err) => {
                eprintln!("  Error: {err}");
                break;
            }
        }
    }

    if let Some(parent) = hist_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = rl.save_history(&hist_path);

    shutdown.send_replace(true);
    Ok(())
}
