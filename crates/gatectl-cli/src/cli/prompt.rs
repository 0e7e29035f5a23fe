//! Line prompts for interactive login.
//!
//! Passwords typed at a terminal are read in raw mode so nothing is echoed.
//! Piped stdin falls back to plain line reads.

use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use gatectl_core::interrupt::InterruptedError;

/// Reads one line, showing `prompt` on stderr when stdin is a terminal.
pub fn prompt_line(prompt: &str) -> Result<String> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        eprint!("{prompt}");
        io::stderr().flush()?;
    }
    read_line(&mut stdin.lock())
}

/// Reads a password without echoing it.
pub fn prompt_password(prompt: &str) -> Result<String> {
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        return read_line(&mut stdin.lock());
    }

    eprint!("{prompt}");
    io::stderr().flush()?;

    let password = {
        let _raw = RawMode::enable()?;
        read_hidden()
    };
    eprintln!();
    password
}

fn read_line(reader: &mut impl BufRead) -> Result<String> {
    let mut line = String::new();
    reader.read_line(&mut line).context("read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn read_hidden() -> Result<String> {
    let mut input = HiddenInput::default();
    loop {
        let Event::Key(key) = event::read().context("read key")? else {
            continue;
        };
        match input.apply(key) {
            KeyOutcome::Pending => {}
            KeyOutcome::Submit => return Ok(input.into_inner()),
            KeyOutcome::Cancel => return Err(InterruptedError.into()),
        }
    }
}

/// Restores cooked mode on drop, including on early return.
struct RawMode;

impl RawMode {
    fn enable() -> Result<Self> {
        enable_raw_mode().context("Failed to enable raw mode")?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            tracing::warn!(error = %e, "failed to restore terminal mode");
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum KeyOutcome {
    Pending,
    Submit,
    Cancel,
}

/// Password buffer fed by raw key events.
#[derive(Default)]
struct HiddenInput {
    buf: String,
}

impl HiddenInput {
    fn apply(&mut self, key: KeyEvent) -> KeyOutcome {
        if key.kind == KeyEventKind::Release {
            return KeyOutcome::Pending;
        }

        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Enter => return KeyOutcome::Submit,
            KeyCode::Esc => return KeyOutcome::Cancel,
            KeyCode::Char('c' | 'd') if ctrl => return KeyOutcome::Cancel,
            KeyCode::Char('u') if ctrl => self.buf.clear(),
            KeyCode::Char(c) if !ctrl => self.buf.push(c),
            KeyCode::Backspace => {
                self.buf.pop();
            }
            _ => {}
        }
        KeyOutcome::Pending
    }

    fn into_inner(self) -> String {
        self.buf
    }
}
