//! Terminal prompts and the pre-handoff terminal reset.
//!
//! Prompt libraries can leave the terminal in raw mode or with the cursor
//! hidden. `reset_terminal` puts stdin back into cooked mode unconditionally
//! and is safe to call any number of times.

use std::io::IsTerminal as _;

use anyhow::{Context, Result};
use dialoguer::Select;
#[cfg(unix)]
use nix::sys::termios::{InputFlags, LocalFlags, OutputFlags};
use spawn_common::SpawnRecord;

use crate::application::ports::TerminalUi;
use crate::domain::DuplicateChoice;

/// The termios flag groups touched by the reset.
#[cfg(unix)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineDiscipline {
    pub input: InputFlags,
    pub output: OutputFlags,
    pub local: LocalFlags,
}

#[cfg(unix)]
impl LineDiscipline {
    /// Canonical line editing, echo, signals and CR/NL translation on;
    /// every other bit left as it was.
    #[must_use]
    pub fn sane(self) -> Self {
        Self {
            input: self.input | InputFlags::ICRNL | InputFlags::BRKINT,
            output: self.output | OutputFlags::OPOST | OutputFlags::ONLCR,
            local: self.local
                | LocalFlags::ICANON
                | LocalFlags::ECHO
                | LocalFlags::ECHOE
                | LocalFlags::ECHOK
                | LocalFlags::ISIG
                | LocalFlags::IEXTEN,
        }
    }
}

/// Restore stdin's line discipline and show the cursor.
pub fn reset_terminal() {
    #[cfg(unix)]
    restore_line_discipline();
    let _ = console::Term::stdout().show_cursor();
    let _ = console::Term::stderr().show_cursor();
}

#[cfg(unix)]
fn restore_line_discipline() {
    use nix::sys::termios::{SetArg, tcgetattr, tcsetattr};

    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        return;
    }
    let mut termios = match tcgetattr(&stdin) {
        Ok(t) => t,
        Err(err) => {
            tracing::debug!(error = %err, "tcgetattr failed; skipping terminal reset");
            return;
        }
    };
    let sane = LineDiscipline {
        input: termios.input_flags,
        output: termios.output_flags,
        local: termios.local_flags,
    }
    .sane();
    termios.input_flags = sane.input;
    termios.output_flags = sane.output;
    termios.local_flags = sane.local;
    if let Err(err) = tcsetattr(&stdin, SetArg::TCSANOW, &termios) {
        tracing::debug!(error = %err, "tcsetattr failed during terminal reset");
    }
}

/// `dialoguer`-backed prompts.
pub struct DialoguerUi {
    non_interactive: bool,
}

impl DialoguerUi {
    /// With `non_interactive` (`--yes`, `SPAWN_YES`, `CI`) every prompt
    /// takes its default without asking.
    #[must_use]
    pub fn new(non_interactive: bool) -> Self {
        Self { non_interactive }
    }
}

impl TerminalUi for DialoguerUi {
    fn choose_duplicate(&self, record: &SpawnRecord, can_reuse: bool) -> Result<DuplicateChoice> {
        if self.non_interactive || !std::io::stdin().is_terminal() {
            return Ok(DuplicateChoice::SpawnNew);
        }

        let name = record.name.as_deref().unwrap_or("unnamed");
        let mut items = Vec::new();
        let mut choices = Vec::new();
        if let (true, Some(conn)) = (can_reuse, &record.connection) {
            items.push(format!("Reconnect to '{name}' ({}@{})", conn.user, conn.ip));
            choices.push(DuplicateChoice::Reuse);
        }
        items.push("Spawn a new server with the same name".to_string());
        choices.push(DuplicateChoice::SpawnNew);
        items.push("Cancel".to_string());
        choices.push(DuplicateChoice::Cancel);

        let idx = Select::new()
            .with_prompt(format!(
                "'{name}' ({} on {}) is already running since {}",
                record.agent,
                record.cloud,
                record.timestamp.format("%Y-%m-%d %H:%M UTC")
            ))
            .items(&items)
            .default(0)
            .interact()
            .context("duplicate selection")?;
        Ok(choices.get(idx).copied().unwrap_or(DuplicateChoice::Cancel))
    }

    fn reset(&self) {
        reset_terminal();
    }
}
