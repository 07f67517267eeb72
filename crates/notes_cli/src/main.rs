//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to drive `notes_core` end to end.
//! - Keep output deterministic for quick local sanity checks.
//!
//! The database comes from `NOTES_DB_PATH`; logs go to `NOTES_LOG_DIR` when set.

use clap::{Parser, Subcommand};
use notes_core::{
    default_log_level, init_logging, Note, NoteId, NoteStore, StoreConfig, Subscription,
};
use std::process::ExitCode;

const LOG_DIR_ENV: &str = "NOTES_LOG_DIR";
const LOG_LEVEL_ENV: &str = "NOTES_LOG_LEVEL";

#[derive(Parser, Debug)]
#[command(name = "notes_cli")]
#[command(about = "Drive a note store from the command line")]
#[command(version)]
struct Cli {
    /// Mutation to apply before printing the collection (defaults to `list`).
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Print every note in insertion order
    List,
    /// Add a note; the words are joined with single spaces
    Add { text: Vec<String> },
    /// Replace the title of an existing note
    Edit { id: NoteId, text: Vec<String> },
    /// Delete a note by id
    Delete { id: NoteId },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli.command.unwrap_or(Command::List)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("notes_cli error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<(), String> {
    init_logging_from_env()?;

    let config = StoreConfig::from_env().map_err(|err| err.to_string())?;
    let store = NoteStore::open(&config).map_err(|err| err.to_string())?;
    let mut subscription = store.subscribe().map_err(|err| err.to_string())?;

    match command {
        Command::List => {}
        Command::Add { text } => {
            match store.insert(text.join(" ")).wait().map_err(|err| err.to_string())? {
                Some(note) => println!("added id={}", note.id),
                None => println!("skipped blank note"),
            }
        }
        Command::Edit { id, text } => {
            store
                .update(&Note::new(id, text.join(" ")))
                .wait()
                .map_err(|err| err.to_string())?;
            println!("edited id={id}");
        }
        Command::Delete { id } => {
            store
                .delete(&Note::new(id, String::new()))
                .wait()
                .map_err(|err| err.to_string())?;
            println!("deleted id={id}");
        }
    }

    drain(&mut subscription);
    print_notes(&subscription);
    store.close().map_err(|err| err.to_string())
}

fn init_logging_from_env() -> Result<(), String> {
    let Ok(log_dir) = std::env::var(LOG_DIR_ENV) else {
        return Ok(());
    };
    let level = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| default_log_level().to_string());
    init_logging(&level, &log_dir).map_err(|err| err.to_string())
}

fn drain(subscription: &mut Subscription) {
    while subscription.try_recv().is_some() {}
}

fn print_notes(subscription: &Subscription) {
    let notes = subscription.snapshot();
    println!("notes count={}", notes.len());
    for note in notes.iter() {
        println!("{}\t{}", note.id, note.title);
    }
}
