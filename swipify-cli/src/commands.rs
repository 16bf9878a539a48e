use std::path::PathBuf;

use swipify_common::{CollectionRole, Decision};
use swipify_core::TrackFilter;

/// One line of user input.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Build { filter: TrackFilter, shuffle: bool },
    Decide(Decision),
    Undo,
    /// Rebuild around the current head's artists
    Artist,
    Stats,
    Size,
    Export(PathBuf),
    Rename { role: CollectionRole, name: String },
    /// Drop the queue, ledger and undo history
    Reset,
    WhoAmI,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  build [--no-shuffle] [text=..] [artist=..] [year=..]   rebuild the queue
  k | r | p | f | s     keep, remove, file primary, file secondary, skip
  u                     undo the last decision
  artist                queue only the current artist
  name p|f <name>       rename the primary or secondary collection
  stats | size          progress, library size
  export <path>         write decisions as CSV
  reset                 forget this session and start over
  whoami                show the signed-in account
  quit";

/// Parse a line. Blank input is `Ok(None)`.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    let Some((word, rest)) = split_word(line) else {
        return Ok(None);
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "k" | "keep" => Command::Decide(Decision::Keep),
        "r" | "remove" => Command::Decide(Decision::Remove),
        "p" | "primary" => Command::Decide(Decision::FilePrimary),
        "f" | "fav" | "secondary" => Command::Decide(Decision::FileSecondary),
        "s" | "skip" => Command::Decide(Decision::Skip),
        "u" | "undo" => Command::Undo,
        "artist" => Command::Artist,
        "stats" => Command::Stats,
        "size" => Command::Size,
        "build" => parse_build(rest)?,
        "export" => {
            if rest.is_empty() {
                return Err("usage: export <path>".to_string());
            }
            Command::Export(PathBuf::from(rest))
        }
        "name" => parse_rename(rest)?,
        "reset" => Command::Reset,
        "whoami" => Command::WhoAmI,
        "h" | "help" | "?" => Command::Help,
        "q" | "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command '{other}', try 'help'")),
    };
    Ok(Some(command))
}

fn split_word(s: &str) -> Option<(&str, &str)> {
    if s.is_empty() {
        return None;
    }
    Some(match s.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (s, ""),
    })
}

/// `key=value` options; values run until the next `key=` so they may contain
/// spaces, e.g. `artist=daft punk year=2001`.
fn parse_build(args: &str) -> Result<Command, String> {
    let mut shuffle = true;
    let (mut text, mut artist, mut year) = (None, None, None);
    let mut current: Option<(&str, String)> = None;

    let mut finish = |current: Option<(&str, String)>| -> Result<(), String> {
        if let Some((key, value)) = current {
            match key {
                "text" => text = Some(value),
                "artist" => artist = Some(value),
                "year" => year = Some(value),
                other => return Err(format!("unknown build option '{other}'")),
            }
        }
        Ok(())
    };

    for token in args.split_whitespace() {
        if token == "--no-shuffle" {
            shuffle = false;
        } else if let Some((key, value)) = token.split_once('=') {
            finish(current.take())?;
            current = Some((key, value.to_string()));
        } else if let Some((_, value)) = current.as_mut() {
            value.push(' ');
            value.push_str(token);
        } else {
            return Err(format!("unexpected '{token}', expected key=value"));
        }
    }
    finish(current)?;

    Ok(Command::Build {
        filter: TrackFilter::new(text, artist, year),
        shuffle,
    })
}

fn parse_rename(args: &str) -> Result<Command, String> {
    let usage = || "usage: name p|f <collection name>".to_string();
    let (which, name) = split_word(args).ok_or_else(usage)?;
    let role = match which {
        "p" | "primary" => CollectionRole::Primary,
        "f" | "secondary" => CollectionRole::Secondary,
        _ => return Err(usage()),
    };
    if name.is_empty() {
        return Err(usage());
    }
    Ok(Command::Rename {
        role,
        name: name.to_string(),
    })
}
