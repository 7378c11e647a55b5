use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info};

use crate::config::{self, ConfigError};
use crate::dispatcher::{DispatchError, Handled, UnavailableRuntime};
use crate::launcher::{Choice, Chooser, Launcher, ServiceError};
use crate::logging;
use crate::model::HandlerCandidate;
use crate::resolver::Selection;
use crate::shell_opener::SystemShell;
use crate::store::{Store, StoreError};
use crate::transport;

pub const USAGE: &str = "usage: handoff-core [--config <path>] (--json | <input...>)";

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("service error: {0}")]
    Service(#[from] ServiceError),
    #[error("{0}")]
    Dispatch(#[from] DispatchError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Service one raw input and exit.
    Open(String),
    /// Read JSON transport requests from stdin, one per line.
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeOptions {
    pub config_path: Option<PathBuf>,
    pub mode: RunMode,
}

pub fn parse_cli_args(args: &[String]) -> Result<RuntimeOptions, String> {
    let mut config_path = None;
    let mut json = false;
    let mut words = Vec::new();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter
                    .next()
                    .ok_or_else(|| "--config requires a path".to_string())?;
                config_path = Some(PathBuf::from(path));
            }
            "--json" => json = true,
            "--" => {
                words.extend(iter.by_ref().cloned());
            }
            flag if flag.starts_with("--") && words.is_empty() => {
                return Err(format!("unknown flag '{flag}'"));
            }
            _ => words.push(arg.clone()),
        }
    }

    let mode = match (json, words.is_empty()) {
        (true, true) => RunMode::Json,
        (true, false) => return Err("--json takes no input arguments".to_string()),
        (false, true) => return Err("missing input".to_string()),
        (false, false) => RunMode::Open(words.join(" ")),
    };

    Ok(RuntimeOptions { config_path, mode })
}

pub async fn run_with_options(options: RuntimeOptions) -> Result<(), RuntimeError> {
    let config = config::load(options.config_path.as_deref())?;
    if !config.config_path.exists() {
        config::save(&config)?;
    }
    if let Err(error) = logging::init(&config.log_dir) {
        eprintln!("[handoff-core] file logging disabled: {error}");
    }
    info!(
        config_path = %config.config_path.display(),
        database_path = %config.database_path.display(),
        "startup"
    );

    let store = Store::open_from_config(&config)?;
    let chooser: Arc<dyn Chooser> = match options.mode {
        RunMode::Open(_) => Arc::new(TerminalChooser),
        RunMode::Json => Arc::new(DeclineChooser),
    };
    let launcher = Launcher::new(
        &config,
        store,
        Arc::new(UnavailableRuntime),
        Arc::new(SystemShell),
        chooser,
    )?;

    let result = match options.mode {
        RunMode::Open(raw) => open_once(&launcher, &raw).await,
        RunMode::Json => serve_json(&launcher).await,
    };

    if let Err(error) = launcher.close() {
        error!(%error, "failed to close store");
    }
    result
}

async fn open_once(launcher: &Launcher, raw: &str) -> Result<(), RuntimeError> {
    match launcher.open(raw).await {
        Ok(handled) => {
            info!(?handled, "request handled");
            println!("{}", describe(&handled));
            Ok(())
        }
        Err(error) => {
            error!(input = raw, %error, "request failed");
            Err(error.into())
        }
    }
}

async fn serve_json(launcher: &Launcher) -> Result<(), RuntimeError> {
    loop {
        let line = tokio::task::spawn_blocking(read_stdin_line)
            .await
            .map_err(|error| std::io::Error::other(error.to_string()))??;
        let Some(line) = line else {
            return Ok(());
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = transport::handle_json(launcher, &line).await;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{response}")?;
        stdout.flush()?;
    }
}

fn read_stdin_line() -> std::io::Result<Option<String>> {
    let mut line = String::new();
    let read = std::io::stdin().lock().read_line(&mut line)?;
    Ok((read > 0).then_some(line))
}

fn describe(handled: &Handled) -> String {
    match handled {
        Handled::Plugin { owner, entry } => format!("handled by {owner} ({entry:?})"),
        Handled::Shortcut { name, path } => format!("opened shortcut {name} ({})", path.display()),
        Handled::Shell { target } => format!("handed to shell: {target}"),
    }
}

/// Prompts on stderr and reads the answer from stdin. A trailing `!` on the
/// number remembers the choice.
pub struct TerminalChooser;

#[async_trait]
impl Chooser for TerminalChooser {
    async fn choose(&self, selection: &Selection) -> Option<Choice> {
        let options = chooser_options(selection);
        let mut prompt = format!("Choose a handler for {}:\n", selection.routing_key);
        for (index, candidate) in options.iter().enumerate() {
            let marker = if index < selection.new_candidates.len() { " (new)" } else { "" };
            let label = if candidate.description.is_empty() {
                candidate.owner.to_string()
            } else {
                format!("{} [{}]", candidate.description, candidate.owner)
            };
            prompt.push_str(&format!("  {}) {label}{marker}\n", index + 1));
        }
        prompt.push_str("number (append ! to remember), empty to cancel: ");
        eprint!("{prompt}");

        let answer = tokio::task::spawn_blocking(read_stdin_line)
            .await
            .ok()?
            .ok()??;
        let (index, remember) = parse_choice(&answer, options.len())?;
        options
            .into_iter()
            .nth(index)
            .map(|candidate| Choice { candidate, remember })
    }
}

/// Used when no one is at the terminal; presentation layers choose through
/// the transport instead.
pub struct DeclineChooser;

#[async_trait]
impl Chooser for DeclineChooser {
    async fn choose(&self, _selection: &Selection) -> Option<Choice> {
        None
    }
}

/// New candidates first, then existing ones, then the system default.
pub fn chooser_options(selection: &Selection) -> Vec<HandlerCandidate> {
    selection
        .new_candidates
        .iter()
        .chain(&selection.existing_candidates)
        .cloned()
        .chain(std::iter::once(HandlerCandidate::system(&selection.routing_key)))
        .collect()
}

/// Parses a 1-based answer; returns the 0-based index and the remember flag.
pub fn parse_choice(answer: &str, count: usize) -> Option<(usize, bool)> {
    let answer = answer.trim();
    let (number, remember) = match answer.strip_suffix('!') {
        Some(number) => (number.trim(), true),
        None => (answer, false),
    };
    let index = number.parse::<usize>().ok()?;
    (1..=count).contains(&index).then_some((index - 1, remember))
}

#[cfg(test)]
mod tests {
    use super::{parse_choice, parse_cli_args, RunMode};

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn joins_input_words_into_one_raw_input() {
        let options = parse_cli_args(&args(&["run(\"a\",", "b)"])).unwrap();
        assert_eq!(options.mode, RunMode::Open("run(\"a\", b)".to_string()));
        assert!(options.config_path.is_none());
    }

    #[test]
    fn reads_config_flag_and_json_mode() {
        let options = parse_cli_args(&args(&["--config", "/tmp/h.toml", "--json"])).unwrap();
        assert_eq!(options.mode, RunMode::Json);
        assert_eq!(options.config_path.unwrap().to_str(), Some("/tmp/h.toml"));
    }

    #[test]
    fn rejects_missing_input_and_unknown_flags() {
        assert!(parse_cli_args(&[]).is_err());
        assert!(parse_cli_args(&args(&["--bogus"])).is_err());
        assert!(parse_cli_args(&args(&["--json", "text"])).is_err());
        assert!(parse_cli_args(&args(&["--config"])).is_err());
    }

    #[test]
    fn input_after_double_dash_may_look_like_a_flag() {
        let options = parse_cli_args(&args(&["--", "--weird"])).unwrap();
        assert_eq!(options.mode, RunMode::Open("--weird".to_string()));
    }

    #[test]
    fn parses_numbered_answers_with_remember_suffix() {
        assert_eq!(parse_choice("2\n", 3), Some((1, false)));
        assert_eq!(parse_choice(" 1! ", 3), Some((0, true)));
        assert_eq!(parse_choice("", 3), None);
        assert_eq!(parse_choice("4", 3), None);
        assert_eq!(parse_choice("0", 3), None);
    }
}
