//! Key-sequence state machine.
//!
//! Consumes discrete events (keystrokes, timer expirations, mode changes)
//! against a compiled binding table and returns side effects for the host to
//! perform: command dispatches, status updates, timer schedules. The engine
//! itself never blocks and never talks to the outside world directly.
//!
//! Timers use a generation counter: every fresh event invalidates pending
//! callbacks, so a late-firing timer can never corrupt state set by a
//! subsequent keystroke.

use std::time::Duration;

use crate::config::EngineConfig;
use crate::expr::{Context, EvalError, Value};
use crate::preset::Mode;

use super::status::{accessible_label, project, StatusUpdate, SymbolTable};
use super::table::{CompiledBinding, CompiledBindingTable, Lookup};
use super::types::{format_sequence, Keystroke};

/// Mutable runtime record: what has been typed but not yet resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyState {
    /// Chords typed so far, not yet resolved
    pub prefix: Vec<Keystroke>,
    /// Accumulated repeat count; absent means 1 at dispatch
    pub count: Option<u32>,
    /// Current active mode
    pub mode: String,
}

impl KeyState {
    fn new(mode: String) -> Self {
        Self {
            prefix: Vec::new(),
            count: None,
            mode,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.prefix.is_empty() && self.count.is_none()
    }

    fn clear(&mut self) {
        self.prefix.clear();
        self.count = None;
    }
}

/// Observable machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    AccumulatingCount,
    AccumulatingPrefix,
    AwaitingTimeout,
}

/// An input event delivered to the engine. Events are processed one at a
/// time; no two are ever in flight concurrently.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Key(Keystroke),
    /// Explicit cancel (e.g. an interrupt key handled by the host)
    Cancel,
    SetMode(String),
    /// The ambiguity timer scheduled with this generation elapsed
    TimeoutElapsed(u64),
    /// The status-clear timer scheduled with this generation elapsed
    StatusClearElapsed(u64),
    ConfigChanged(EngineConfig),
}

/// A resolved command invocation, computed args already evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub command: String,
    pub args: serde_json::Value,
    /// The repeat count in effect (1 when no count was typed)
    pub count: u32,
}

/// Owned summary of a table lookup.
enum Resolved {
    Miss,
    Pending,
    Hit(Vec<CompiledBinding>),
    Ambiguous(usize),
}

/// Side effects the host must perform after an event.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Invoke the command dispatcher exactly once; fire and forget
    Dispatch(Invocation),
    UpdateStatus(StatusUpdate),
    /// Schedule `TimeoutElapsed(generation)` after `delay`
    ScheduleTimeout { generation: u64, delay: Duration },
    /// Schedule `StatusClearElapsed(generation)` after `delay`
    ScheduleStatusClear { generation: u64, delay: Duration },
    /// A typed sequence matched nothing; observable but non-fatal
    NoBinding { sequence: Vec<Keystroke> },
    /// A guard or computed argument failed to evaluate; nothing dispatched
    EvalFailed(EvalError),
}

/// The key-sequence engine: compiled table + mutable [`KeyState`].
///
/// One engine per editor instance; all runtime state lives here rather than
/// in module-level globals so instances never cross-contaminate.
#[derive(Debug, Clone)]
pub struct KeymapEngine {
    table: CompiledBindingTable,
    config: EngineConfig,
    symbols: SymbolTable,
    state: KeyState,
    machine: EngineState,
    generation: u64,
    pending_timeout: Option<u64>,
    pending_clear: Option<u64>,
    /// Host-supplied context values visible to guards and computed args
    host_context: Vec<(String, Value)>,
}

impl KeymapEngine {
    pub fn new(table: CompiledBindingTable) -> Self {
        Self::with_config(table, EngineConfig::default())
    }

    pub fn with_config(table: CompiledBindingTable, config: EngineConfig) -> Self {
        let mode = table.default_mode().to_string();
        Self {
            table,
            config,
            symbols: SymbolTable::default(),
            state: KeyState::new(mode),
            machine: EngineState::Idle,
            generation: 0,
            pending_timeout: None,
            pending_clear: None,
            host_context: Vec::new(),
        }
    }

    pub fn set_symbols(&mut self, symbols: SymbolTable) {
        self.symbols = symbols;
    }

    /// Expose a host value (e.g. an `editor` object) to expressions.
    pub fn set_host_value(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        self.host_context.retain(|(n, _)| *n != name);
        self.host_context.push((name, value));
    }

    pub fn state(&self) -> &KeyState {
        &self.state
    }

    pub fn machine_state(&self) -> EngineState {
        self.machine
    }

    pub fn table(&self) -> &CompiledBindingTable {
        &self.table
    }

    /// Current status projection; pure, callable at any time.
    pub fn status(&self) -> StatusUpdate {
        StatusUpdate {
            text: project(&self.state, &self.symbols),
            label: accessible_label(&self.state),
        }
    }

    /// Process one event and return the effects the host must perform.
    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::TimeoutElapsed(generation) => self.on_timeout(generation),
            Event::StatusClearElapsed(generation) => self.on_status_clear(generation),
            Event::Key(stroke) => {
                self.fresh_event();
                self.on_key(stroke)
            }
            Event::Cancel => {
                self.fresh_event();
                self.reset();
                vec![self.status_effect()]
            }
            Event::SetMode(mode) => {
                self.fresh_event();
                if self.table.mode(&mode).is_none() {
                    tracing::warn!("Switching to undeclared mode {:?}", mode);
                }
                self.state.mode = mode;
                self.reset();
                vec![self.status_effect()]
            }
            Event::ConfigChanged(config) => {
                self.fresh_event();
                self.config = config;
                Vec::new()
            }
        }
    }

    /// Bump the generation and invalidate any pending deferred callbacks.
    fn fresh_event(&mut self) {
        self.generation += 1;
        self.pending_timeout = None;
        self.pending_clear = None;
    }

    fn reset(&mut self) {
        self.state.clear();
        self.machine = EngineState::Idle;
        self.pending_timeout = None;
    }

    fn mode_config(&self) -> Mode {
        self.table
            .mode(&self.state.mode)
            .cloned()
            .unwrap_or_else(|| Mode::named(&self.state.mode))
    }

    fn status_effect(&self) -> Effect {
        Effect::UpdateStatus(self.status())
    }

    fn on_key(&mut self, stroke: Keystroke) -> Vec<Effect> {
        // Digits accumulate a count while no prefix is pending
        if self.state.prefix.is_empty() {
            if let Some(digit) = stroke.as_digit() {
                let mode = self.mode_config();
                if mode.counts {
                    let starts_count =
                        self.state.count.is_some() || digit != 0 || mode.zero_starts_count;
                    if starts_count {
                        let count = self.state.count.unwrap_or(0);
                        self.state.count =
                            Some(count.saturating_mul(10).saturating_add(digit));
                        self.machine = EngineState::AccumulatingCount;
                        return vec![self.status_effect()];
                    }
                    // A bare 0 under zero_starts_count = false falls through
                    // to chord lookup
                }
            }
        }

        self.state.prefix.push(stroke);
        self.machine = EngineState::AccumulatingPrefix;

        let lookup = match self.table.lookup(&self.state.mode, &self.state.prefix) {
            Lookup::None => Resolved::Miss,
            Lookup::Prefix => Resolved::Pending,
            Lookup::Exact(candidates) => Resolved::Hit(candidates.to_vec()),
            Lookup::ExactAndPrefix(candidates) => Resolved::Ambiguous(candidates.len()),
        };

        match lookup {
            Resolved::Miss => {
                let sequence = std::mem::take(&mut self.state.prefix);
                tracing::debug!(
                    "No binding for {:?} in mode {:?}",
                    format_sequence(&sequence),
                    self.state.mode
                );
                self.reset();
                vec![Effect::NoBinding { sequence }, self.status_effect()]
            }
            Resolved::Pending => vec![self.status_effect()],
            Resolved::Hit(candidates) => self.dispatch(&candidates),
            Resolved::Ambiguous(count) => {
                // Shorter binding is held back until the timer decides
                self.machine = EngineState::AwaitingTimeout;
                self.pending_timeout = Some(self.generation);
                tracing::debug!(
                    "Ambiguous sequence {:?}, awaiting timeout ({} candidates)",
                    format_sequence(&self.state.prefix),
                    count
                );
                vec![
                    Effect::ScheduleTimeout {
                        generation: self.generation,
                        delay: self.config.timeout(),
                    },
                    self.status_effect(),
                ]
            }
        }
    }

    fn on_timeout(&mut self, generation: u64) -> Vec<Effect> {
        if self.pending_timeout != Some(generation) {
            tracing::trace!("Ignoring stale timeout (generation {})", generation);
            return Vec::new();
        }
        self.pending_timeout = None;
        self.generation += 1;

        let candidates = match self.table.lookup(&self.state.mode, &self.state.prefix) {
            Lookup::Exact(c) | Lookup::ExactAndPrefix(c) => Some(c.to_vec()),
            _ => None,
        };
        match candidates {
            Some(candidates) => self.dispatch(&candidates),
            None => {
                self.reset();
                vec![self.status_effect()]
            }
        }
    }

    fn on_status_clear(&mut self, generation: u64) -> Vec<Effect> {
        if self.pending_clear != Some(generation) {
            return Vec::new();
        }
        self.pending_clear = None;
        vec![Effect::UpdateStatus(StatusUpdate::default())]
    }

    /// Dispatch context: count, mode and typed prefix, plus host values.
    fn dispatch_context(&self, count: u32) -> Context {
        let mut ctx = Context::new();
        ctx.set("count", count);
        ctx.set("mode", self.state.mode.as_str());
        ctx.set("prefix", format_sequence(&self.state.prefix));
        for (name, value) in &self.host_context {
            ctx.set(name.clone(), value.clone());
        }
        ctx
    }

    fn dispatch(&mut self, candidates: &[CompiledBinding]) -> Vec<Effect> {
        let count = self.state.count.unwrap_or(1).max(1);
        let ctx = self.dispatch_context(count);

        // Guarded candidates come first in table order; first passing guard wins
        let mut chosen = None;
        for candidate in candidates {
            match &candidate.guard {
                None => {
                    chosen = Some(candidate);
                    break;
                }
                Some(guard) => match guard.check(&ctx) {
                    Ok(true) => {
                        chosen = Some(candidate);
                        break;
                    }
                    Ok(false) => continue,
                    Err(e) => {
                        tracing::warn!("Guard evaluation failed: {}", e);
                        self.reset();
                        return vec![Effect::EvalFailed(e), self.status_effect()];
                    }
                },
            }
        }

        let Some(binding) = chosen else {
            let sequence = self.state.prefix.clone();
            self.reset();
            return vec![Effect::NoBinding { sequence }, self.status_effect()];
        };

        let args = match binding.args.resolve(&ctx) {
            Ok(args) => args,
            Err(e) => {
                tracing::warn!("Computed argument evaluation failed: {}", e);
                self.reset();
                return vec![Effect::EvalFailed(e), self.status_effect()];
            }
        };

        let invocation = Invocation {
            command: binding.command.clone(),
            args,
            count,
        };
        tracing::debug!(
            "Dispatching {:?} for {:?} (count {})",
            invocation.command,
            format_sequence(&self.state.prefix),
            count
        );

        // Show the completed sequence briefly, then clear
        let completed = self.status();
        self.reset();
        self.pending_clear = Some(self.generation);

        vec![
            Effect::Dispatch(invocation),
            Effect::UpdateStatus(completed),
            Effect::ScheduleStatusClear {
                generation: self.generation,
                delay: self.config.status_clear(),
            },
        ]
    }
}
