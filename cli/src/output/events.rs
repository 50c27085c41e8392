//! Headless run display: a spinner whose message follows the agent's events.

use std::sync::{Mutex, OnceLock};

use indicatif::ProgressBar;

use crate::application::ports::AgentEventSink;
use crate::domain::AgentEvent;
use crate::output::{OutputContext, progress};

/// Renders [`AgentEvent`]s on a spinner when stdout is a TTY, or as plain
/// lines otherwise. The spinner starts with the first event so it does not
/// fight with the progress lines printed before the script runs.
pub struct EventSpinner<'a> {
    ctx: &'a OutputContext,
    initial: String,
    bar: OnceLock<ProgressBar>,
    last: Mutex<Option<String>>,
}

impl<'a> EventSpinner<'a> {
    #[must_use]
    pub fn new(ctx: &'a OutputContext, initial: &str) -> Self {
        Self {
            ctx,
            initial: initial.to_string(),
            bar: OnceLock::new(),
            last: Mutex::new(None),
        }
    }

    fn bar(&self) -> Option<&ProgressBar> {
        self.ctx
            .show_progress()
            .then(|| self.bar.get_or_init(|| progress::spinner(&self.initial)))
    }
}

impl AgentEventSink for EventSpinner<'_> {
    fn event(&self, event: &AgentEvent) {
        let summary = event.summary();
        match self.bar() {
            Some(bar) => bar.set_message(summary.clone()),
            None => self.ctx.info(&summary),
        }
        if let Ok(mut last) = self.last.lock() {
            *last = Some(summary);
        }
    }

    fn passthrough(&self, line: &str) {
        match self.bar() {
            Some(bar) => bar.println(line),
            None if !self.ctx.quiet => println!("{line}"),
            None => {}
        }
    }

    fn finish(&self) {
        let Some(bar) = self.bar.get() else { return };
        bar.finish_and_clear();
        if let Some(summary) = self.last.lock().ok().and_then(|l| l.clone()) {
            self.ctx.info(&format!("last event: {summary}"));
        }
    }
}
