//! The interactive lookup shell.
//!
//! By default we use `rustyline` for line editing and tab completion.
//! A minimal stdin-based fallback exists behind `--no-default-features`.

use anyhow::{anyhow, Result};
use colored::Colorize;
#[cfg(not(feature = "repl-rustyline"))]
use std::io::{self, Write};

use tfstate_backend::ApiError;

use crate::session::{GetError, LookupSession};

pub fn run(session: LookupSession) -> Result<()> {
    #[cfg(feature = "repl-rustyline")]
    {
        return run_rustyline(session);
    }
    #[cfg(not(feature = "repl-rustyline"))]
    {
        return run_simple(session);
    }
}

#[cfg(not(feature = "repl-rustyline"))]
fn run_simple(mut session: LookupSession) -> Result<()> {
    println!("{}", "TFE state explorer".green().bold());
    println!("Commands: load <env> | get <path> | quit\n");

    let stdin = io::stdin();
    loop {
        print!(">>> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let tokens = split_command_line(line);
        match dispatch_line(&mut session, &tokens) {
            Ok(ReplControl::Continue) => {}
            Ok(ReplControl::Exit) => break,
            Err(e) => eprintln!("{} {e}", "error:".red().bold()),
        }
    }

    Ok(())
}

#[cfg(feature = "repl-rustyline")]
fn run_rustyline(mut session: LookupSession) -> Result<()> {
    use rustyline::error::ReadlineError;
    use rustyline::Editor;

    println!("{}", "TFE state explorer".green().bold());
    println!("Tab-completion enabled. Commands: load <env> | get <path> | quit\n");

    let completions = std::sync::Arc::new(std::sync::RwLock::new(CompletionData::default()));
    refresh_completion_data(&completions, &session);

    let helper = ReplLineHelper::new(completions.clone());
    let mut rl: Editor<ReplLineHelper, rustyline::history::DefaultHistory> =
        Editor::new().map_err(|e| anyhow!("failed to init rustyline: {e}"))?;
    rl.set_helper(Some(helper));

    loop {
        // Keep completions fresh after `load` swaps the key set.
        refresh_completion_data(&completions, &session);

        let line = match rl.readline(">>> ") {
            Ok(l) => l,
            Err(ReadlineError::Eof) => break,
            Err(ReadlineError::Interrupted) => continue,
            Err(e) => return Err(anyhow!("readline error: {e}")),
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        rl.add_history_entry(line)
            .map_err(|e| anyhow!("failed to record history: {e}"))?;

        let tokens = split_command_line(line);
        match dispatch_line(&mut session, &tokens) {
            Ok(ReplControl::Continue) => {}
            Ok(ReplControl::Exit) => break,
            Err(e) => eprintln!("{} {e}", "error:".red().bold()),
        }
    }

    Ok(())
}

#[derive(Debug)]
enum ReplControl {
    Continue,
    Exit,
}

fn dispatch_line(session: &mut LookupSession, tokens: &[String]) -> Result<ReplControl> {
    if tokens.is_empty() {
        return Ok(ReplControl::Continue);
    }

    let cmd = tokens[0].as_str();
    let args = &tokens[1..];

    match cmd {
        "quit" | "exit" => {
            println!("Bye!");
            Ok(ReplControl::Exit)
        }
        "load" => {
            let name = one_arg(args, "must pass an environment to load")?;
            cmd_load(session, name)?;
            Ok(ReplControl::Continue)
        }
        "get" => {
            let path = one_arg(args, "must pass an argument to get")?;
            cmd_get(session, path)?;
            Ok(ReplControl::Continue)
        }
        _ => Err(anyhow!("unrecognized command '{cmd}'")),
    }
}

fn one_arg<'a>(args: &'a [String], message: &'static str) -> Result<&'a str> {
    match args {
        [value] => Ok(value.as_str()),
        _ => Err(anyhow!(message)),
    }
}

fn cmd_load(session: &mut LookupSession, name: &str) -> Result<()> {
    match session.load(name) {
        Ok(()) => {
            println!("loaded env {name}");
            Ok(())
        }
        Err(ApiError::UnknownEnvironment { .. }) => Err(anyhow!("environment not found")),
        Err(e) => Err(anyhow!("failed to load env {name}: {e}")),
    }
}

fn cmd_get(session: &LookupSession, path: &str) -> Result<()> {
    match session.get(path) {
        Ok(entry) => {
            println!("{}", entry.value);
            Ok(())
        }
        Err(GetError::NotLoaded) => Err(anyhow!("must load environment first")),
        Err(GetError::NotFound) => Err(anyhow!("value not found for path")),
    }
}

fn split_command_line(line: &str) -> Vec<String> {
    line.split_whitespace().map(|s| s.to_string()).collect()
}

// =============================================================================
// Tab completion (rustyline)
// =============================================================================

#[cfg(feature = "repl-rustyline")]
const COMMANDS: &[(&str, &str)] = &[
    ("get", "Get value for terraform path"),
    ("load", "Load a terraform environment"),
    ("quit", "Quit this program"),
];

#[cfg(feature = "repl-rustyline")]
#[derive(Default, Debug, Clone)]
struct CompletionData {
    environments: Vec<String>,
    keys: Vec<String>,
}

#[cfg(feature = "repl-rustyline")]
fn refresh_completion_data(
    data: &std::sync::Arc<std::sync::RwLock<CompletionData>>,
    session: &LookupSession,
) {
    let mut completion_data = data.write().expect("completion lock poisoned");
    completion_data.environments = session.environment_names();
    completion_data.keys = session.completion_keys().to_vec();
}

#[cfg(feature = "repl-rustyline")]
fn pairs_from_prefix(items: &[String], prefix: &str) -> Vec<rustyline::completion::Pair> {
    let mut pairs = Vec::new();
    for item in items {
        if item.starts_with(prefix) {
            pairs.push(rustyline::completion::Pair {
                display: item.clone(),
                replacement: item.clone(),
            });
        }
    }
    pairs
}

#[cfg(feature = "repl-rustyline")]
fn complete_line(
    data: &CompletionData,
    line: &str,
    pos: usize,
) -> (usize, Vec<rustyline::completion::Pair>) {
    // Nothing before the cursor means nothing to offer.
    if line[..pos].is_empty() {
        return (0, Vec::new());
    }

    // Whitespace can be wider than one byte, so step past it by char width.
    let start = line[..pos]
        .char_indices()
        .rev()
        .find(|&(_, c)| c.is_whitespace())
        .map(|(i, c)| i + c.len_utf8())
        .unwrap_or(0);
    let word = &line[start..pos];
    let prefix_line = &line[..start];
    let tokens: Vec<&str> = prefix_line.split_whitespace().collect();

    // Completing the first token => command completion.
    if tokens.is_empty() {
        let mut pairs = Vec::new();
        for (verb, description) in COMMANDS {
            if verb.starts_with(word) {
                pairs.push(rustyline::completion::Pair {
                    display: format!("{verb:<6}{description}"),
                    replacement: (*verb).to_string(),
                });
            }
        }
        return (start, pairs);
    }

    match tokens[0] {
        "get" => (start, pairs_from_prefix(&data.keys, word)),
        "load" => (start, pairs_from_prefix(&data.environments, word)),
        _ => (start, Vec::new()),
    }
}

#[cfg(feature = "repl-rustyline")]
struct ReplLineHelper {
    data: std::sync::Arc<std::sync::RwLock<CompletionData>>,
}

#[cfg(feature = "repl-rustyline")]
impl ReplLineHelper {
    fn new(data: std::sync::Arc<std::sync::RwLock<CompletionData>>) -> Self {
        Self { data }
    }
}

#[cfg(feature = "repl-rustyline")]
impl rustyline::Helper for ReplLineHelper {}

#[cfg(feature = "repl-rustyline")]
impl rustyline::highlight::Highlighter for ReplLineHelper {}

#[cfg(feature = "repl-rustyline")]
impl rustyline::hint::Hinter for ReplLineHelper {
    type Hint = String;
    fn hint(&self, _line: &str, _pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        None
    }
}

#[cfg(feature = "repl-rustyline")]
impl rustyline::validate::Validator for ReplLineHelper {}

#[cfg(feature = "repl-rustyline")]
impl rustyline::completion::Completer for ReplLineHelper {
    type Candidate = rustyline::completion::Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Self::Candidate>)> {
        let data = self.data.read().expect("completion lock poisoned");
        Ok(complete_line(&data, line, pos))
    }
}
