// PSPP - a program for statistical analysis.
// Copyright (C) 2025 Free Software Foundation, Inc.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later
// version.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <http://www.gnu.org/licenses/>.

//! The process-wide diagnostic bus.
//!
//! Every lexer, command, and file-format reader or writer that wants to
//! report a problem builds a [Diagnostic] and hands it to [MessageBus::emit].
//! The bus is the only place that knows about per-severity quotas, about the
//! currently installed [Handler], and about how to keep a misbehaving handler
//! (one that itself emits messages) from recursing forever.
//!
//! A [MessageBus] is ordinary session state: it is owned by a [Session],
//! never reached through a global. `SET MXERRS` and `SET MXWARNS` update the
//! quotas in [Settings]; `disable`/`enable` nest like a guard, so
//! `bus.disable(); ...; ` composes correctly even when called from several
//! stack frames at once via the returned [DisableGuard].

use std::cell::{Cell, RefCell};

use enum_map::EnumMap;

use crate::message::{Category, Diagnostic, Location, Severity};
use crate::settings::Settings;

/// Maximum depth of handler self-recursion before the bus gives up on the
/// configured handler entirely and falls back to writing directly to stderr.
const MAX_RECURSION: usize = 4;

/// A message handler: receives ownership of each [Diagnostic] that survives
/// quota checks.  A handler is allowed to call [MessageBus::emit] itself
/// (for instance, to report that it failed to write a message to a log
/// file), but doing so is recursion, which the bus bounds and eventually
/// downgrades to a one-line stderr report.
pub type Handler = Box<dyn FnMut(Diagnostic)>;

/// Per-severity counts and latches tracked by a [MessageBus].
#[derive(Copy, Clone, Default)]
struct Counts {
    seen: EnumMap<Severity, usize>,
    too_many_errors: bool,
    too_many_notes: bool,
}

/// The diagnostic bus.  Not [Sync] or [Send] by design: PSPP's core pipeline
/// is single-threaded (see the concurrency model), so interior mutability via
/// [Cell]/[RefCell] is simpler and cheaper than locking.
pub struct MessageBus {
    handler: RefCell<Option<Handler>>,
    disabled: Cell<usize>,
    depth: Cell<usize>,
    counts: Cell<Counts>,
    warnings_off: Cell<bool>,
}

impl Default for MessageBus {
    fn default() -> Self {
        Self {
            handler: RefCell::new(None),
            disabled: Cell::new(0),
            depth: Cell::new(0),
            counts: Cell::new(Counts::default()),
            warnings_off: Cell::new(false),
        }
    }
}

impl MessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `handler` as the destination for future messages, replacing
    /// any previous handler.  Passing no handler reverts to writing messages
    /// directly to stderr.
    pub fn set_handler(&self, handler: Handler) {
        *self.handler.borrow_mut() = Some(handler);
    }

    pub fn clear_handler(&self) {
        *self.handler.borrow_mut() = None;
    }

    /// Suppresses delivery of new messages until the returned guard is
    /// dropped.  Nests: two overlapping guards require both to be dropped
    /// before messages flow again.
    pub fn disable(&self) -> DisableGuard<'_> {
        self.disabled.set(self.disabled.get() + 1);
        DisableGuard(self)
    }

    fn enable(&self) {
        self.disabled.set(self.disabled.get() - 1);
    }

    pub fn set_warnings_off(&self, off: bool) {
        self.warnings_off.set(off);
    }

    /// True once `SET MXERRS` has been exceeded; the syntax loop should poll
    /// this between commands and stop reading further syntax when it is set.
    pub fn ui_too_many_errors(&self) -> bool {
        self.counts.get().too_many_errors
    }

    pub fn ui_too_many_notes(&self) -> bool {
        self.counts.get().too_many_notes
    }

    pub fn error_count(&self) -> usize {
        self.counts.get().seen[Severity::Error]
    }

    pub fn warning_count(&self) -> usize {
        self.counts.get().seen[Severity::Warning]
    }

    /// Submits `diagnostic` to the bus.  Applies the disable counter, the
    /// warnings-off flag, the per-severity quota in `max`, and the handler
    /// recursion guard, in that order, then hands surviving messages to the
    /// installed handler (or stderr, if none is installed).
    pub fn emit(&self, max: &EnumMap<Severity, usize>, diagnostic: Diagnostic) {
        if self.disabled.get() > 0 {
            return;
        }

        let depth = self.depth.get();
        if depth > 0 {
            // The handler (or a nested emit from deeper in the stack) is
            // recursing.  Render directly to stderr rather than trusting the
            // handler or the quota machinery, which are exactly what might be
            // broken right now.
            if depth < MAX_RECURSION {
                self.depth.set(depth + 1);
                eprintln!("{diagnostic}");
                self.depth.set(depth);
            }
            // At or beyond the bound, drop the message on the floor: a
            // handler that recurses this deep is not going to be fixed by
            // printing more.
            return;
        }

        if diagnostic.severity == Severity::Warning && self.warnings_off.get() {
            return;
        }

        let mut counts = self.counts.get();
        counts.seen[diagnostic.severity] += 1;
        let count = counts.seen[diagnostic.severity];
        let limit = max[diagnostic.severity];
        let exceeded = limit > 0 && count > limit;
        self.counts.set(counts);

        if exceeded {
            if diagnostic.severity == Severity::Error && !counts.too_many_errors {
                let mut counts = self.counts.get();
                counts.too_many_errors = true;
                self.counts.set(counts);
                self.deliver(limit_note("Errors", count, limit, true));
            } else if diagnostic.severity == Severity::Note && !counts.too_many_notes {
                let mut counts = self.counts.get();
                counts.too_many_notes = true;
                self.counts.set(counts);
                self.deliver(limit_note("Notes", count, limit, false));
            }
            return;
        }

        self.depth.set(1);
        self.deliver(diagnostic);
        self.depth.set(0);
    }

    fn deliver(&self, diagnostic: Diagnostic) {
        match self.handler.borrow_mut().take() {
            Some(mut handler) => {
                handler(diagnostic);
                // Put the handler back unless `set_handler` installed a
                // different one while it was running.
                let mut slot = self.handler.borrow_mut();
                if slot.is_none() {
                    *slot = Some(handler);
                }
            }
            None => eprintln!("{diagnostic}"),
        }
    }
}

fn limit_note(kind: &str, count: usize, limit: usize, halt: bool) -> Diagnostic {
    let text = if halt {
        format!("{kind} ({count}) exceed limit ({limit}). Syntax processing will be halted.")
    } else {
        format!("{kind} ({count}) exceed limit ({limit}).")
    };
    Diagnostic {
        severity: Severity::Note,
        category: Category::General,
        location: Location::default(),
        source: Vec::new(),
        stack: Vec::new(),
        command_name: None,
        text,
    }
}

/// RAII guard returned by [MessageBus::disable]; re-enables the bus when
/// dropped.
pub struct DisableGuard<'a>(&'a MessageBus);

impl Drop for DisableGuard<'_> {
    fn drop(&mut self) {
        self.0.enable();
    }
}

/// Process-wide (per run) context: the settings in force and the diagnostic
/// bus they feed.  Bundling these into one value, rather than reaching for
/// statics, is what lets two independent syntax runs (for instance, two
/// files converted concurrently by an embedder) coexist without interfering
/// with each other's error counts.
pub struct Session {
    pub settings: Settings,
    pub messages: MessageBus,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            settings: Settings::default(),
            messages: MessageBus::new(),
        }
    }
}

impl Session {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            messages: MessageBus::new(),
        }
    }

    pub fn emit(&self, diagnostic: Diagnostic) {
        self.messages.emit(&self.settings.max_messages, diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, rc::Rc};

    fn msg(severity: Severity, text: &str) -> Diagnostic {
        Diagnostic {
            severity,
            category: Category::General,
            location: Location::default(),
            source: Vec::new(),
            stack: Vec::new(),
            command_name: None,
            text: text.to_string(),
        }
    }

    #[test]
    fn delivers_to_handler() {
        let bus = MessageBus::new();
        let received = Rc::new(RefCell::new(Vec::new()));
        let sink = received.clone();
        bus.set_handler(Box::new(move |d| sink.borrow_mut().push(d.text)));

        let max = EnumMap::from_fn(|_| 0);
        bus.emit(&max, msg(Severity::Error, "oops"));
        assert_eq!(received.borrow().as_slice(), ["oops"]);
    }

    #[test]
    fn disable_suppresses_delivery() {
        let bus = MessageBus::new();
        let received = Rc::new(RefCell::new(Vec::new()));
        let sink = received.clone();
        bus.set_handler(Box::new(move |d| sink.borrow_mut().push(d.text)));

        let max = EnumMap::from_fn(|_| 0);
        {
            let _a = bus.disable();
            let _b = bus.disable();
            bus.emit(&max, msg(Severity::Error, "hidden"));
        }
        assert!(received.borrow().is_empty());
        bus.emit(&max, msg(Severity::Error, "visible"));
        assert_eq!(received.borrow().as_slice(), ["visible"]);
    }

    #[test]
    fn quota_emits_single_note_and_sets_latch() {
        let bus = MessageBus::new();
        let received = Rc::new(RefCell::new(Vec::new()));
        let sink = received.clone();
        bus.set_handler(Box::new(move |d| sink.borrow_mut().push(d.text)));

        let mut max = EnumMap::from_fn(|_| 0);
        max[Severity::Error] = 2;
        for _ in 0..5 {
            bus.emit(&max, msg(Severity::Error, "err"));
        }
        assert!(bus.ui_too_many_errors());
        let texts = received.borrow();
        assert_eq!(texts.len(), 3); // two real errors, one limit note
        assert_eq!(texts[0], "err");
        assert_eq!(texts[1], "err");
        assert_eq!(
            texts[2],
            "Errors (3) exceed limit (2). Syntax processing will be halted."
        );
    }

    #[test]
    fn warnings_off_drops_warnings_only() {
        let bus = MessageBus::new();
        let received = Rc::new(RefCell::new(Vec::new()));
        let sink = received.clone();
        bus.set_handler(Box::new(move |d| sink.borrow_mut().push(d.text)));
        bus.set_warnings_off(true);

        let max = EnumMap::from_fn(|_| 0);
        bus.emit(&max, msg(Severity::Warning, "warn"));
        bus.emit(&max, msg(Severity::Error, "err"));
        assert_eq!(received.borrow().as_slice(), ["err"]);
    }

    #[test]
    fn recursive_emit_falls_back_to_stderr_without_looping() {
        let bus = Rc::new(MessageBus::new());
        let max = EnumMap::from_fn(|_| 0);
        let inner = bus.clone();
        // A handler that recurses a bounded number of times must not hang or
        // overflow the stack; emit() just stops calling it past the bound.
        bus.set_handler(Box::new(move |d| {
            if d.text == "recurse" {
                let max = EnumMap::from_fn(|_| 0);
                inner.emit(&max, msg(Severity::Error, "recurse"));
            }
        }));
        bus.emit(&max, msg(Severity::Error, "recurse"));
    }
}
