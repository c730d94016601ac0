//! Event handlers: the bridge between parse trees and domain objects.
//!
//! An [`EventHandler`] maps event names of the form `<rule>_pre_event` and
//! `<rule>_post_event` to callbacks. Each parse creates a fresh state value
//! (a [`ParseState`]), walks the tree, and hands every event to the
//! callbacks registered for it. Events nobody registered for are ignored.

use crate::grammar::{Grammar, GrammarError};
use crate::tree::{TreeNode, Visit};
use rustc_hash::FxHashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Errors raised by callbacks while the tree is walked.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    #[error("{0}")]
    Invalid(String),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("handler produced no result")]
    NoResult,
}

impl HandlerError {
    pub fn invalid(message: impl Into<String>) -> Self {
        HandlerError::Invalid(message.into())
    }
}

/// Per-parse state built up by the callbacks.
pub trait ParseState: Default {
    type Output;

    /// The finished result, `None` if the walk never produced one.
    fn finish(self) -> Option<Self::Output>;
}

/// Callback invoked for one event.
pub type Callback<S> = Box<dyn Fn(&mut S, &TreeNode) -> Result<(), HandlerError> + Send + Sync>;

/// What to log while events are dispatched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DebugMode {
    #[default]
    Off,
    /// Only events with a registered callback.
    Registered,
    /// Every event, annotated with whether a callback is registered.
    All,
}

/// A fidelity level that can only be lowered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fidelity<L> {
    level: L,
}

impl<L: Ord + Copy> Fidelity<L> {
    pub fn new(level: L) -> Self {
        Fidelity { level }
    }

    pub fn level(&self) -> L {
        self.level
    }

    /// Lower the level to `level` if that is below the current one.
    /// Returns whether anything changed.
    pub fn narrow(&mut self, level: L) -> bool {
        if level < self.level {
            self.level = level;
            true
        } else {
            false
        }
    }
}

impl<L: Ord + Copy + Default> Default for Fidelity<L> {
    fn default() -> Self {
        Fidelity::new(L::default())
    }
}

/// Registry of event callbacks for one state type.
pub struct EventHandler<S> {
    callbacks: FxHashMap<String, Callback<S>>,
    debug: DebugMode,
}

impl<S> Default for EventHandler<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for EventHandler<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandler")
            .field("events", &self.events())
            .field("debug", &self.debug)
            .finish()
    }
}

impl<S> EventHandler<S> {
    pub fn new() -> Self {
        EventHandler {
            callbacks: FxHashMap::default(),
            debug: DebugMode::Off,
        }
    }

    /// Register a callback for an event name. A later registration for the
    /// same name replaces the earlier one.
    pub fn register<F>(&mut self, event: impl Into<String>, callback: F)
    where
        F: Fn(&mut S, &TreeNode) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.callbacks.insert(event.into(), Box::new(callback));
    }

    pub fn on<F>(mut self, event: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&mut S, &TreeNode) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.register(event, callback);
        self
    }

    /// Register for `<rule>_pre_event`.
    pub fn on_pre<F>(self, rule: &str, callback: F) -> Self
    where
        F: Fn(&mut S, &TreeNode) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.on(format!("{}_pre_event", rule), callback)
    }

    /// Register for `<rule>_post_event`.
    pub fn on_post<F>(self, rule: &str, callback: F) -> Self
    where
        F: Fn(&mut S, &TreeNode) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.on(format!("{}_post_event", rule), callback)
    }

    pub fn set_debug(&mut self, debug: DebugMode) {
        self.debug = debug;
    }

    pub fn debug(&self) -> DebugMode {
        self.debug
    }

    /// Registered event names, sorted.
    pub fn events(&self) -> Vec<&str> {
        let mut events: Vec<&str> = self.callbacks.keys().map(String::as_str).collect();
        events.sort_unstable();
        events
    }

    pub fn is_registered(&self, event: &str) -> bool {
        self.callbacks.contains_key(event)
    }

    /// Check every registered event against the rules of `grammar`.
    pub fn sanity_check(&self, grammar: &Grammar) -> Result<(), GrammarError> {
        grammar.check_events(self.events())
    }

    /// Run the callback registered for `event`, if any.
    pub fn handle_event(
        &self,
        event: &str,
        state: &mut S,
        node: &TreeNode,
    ) -> Result<(), HandlerError> {
        let callback = self.callbacks.get(event);
        match self.debug {
            DebugMode::All => {
                debug!(event, registered = callback.is_some(), text = %node.text(), "event")
            }
            DebugMode::Registered if callback.is_some() => {
                debug!(event, text = %node.text(), "event")
            }
            _ => {}
        }
        match callback {
            Some(callback) => callback(state, node),
            None => Ok(()),
        }
    }

    /// Walk `tree` and dispatch the pre and post events of every firing node.
    pub fn dispatch(
        &self,
        grammar: &Grammar,
        tree: &TreeNode,
        state: &mut S,
    ) -> Result<(), HandlerError> {
        tree.walk(|visit: Visit, node| match grammar.event_name(node.rule, visit) {
            Some(event) => self.handle_event(event, state, node),
            None => Ok(()),
        })
    }
}

/// Parse the text under `node` as a number.
pub fn node_number<T: FromStr>(node: &TreeNode) -> Result<T, HandlerError> {
    let text = node.text();
    text.parse().map_err(|_| HandlerError::InvalidNumber(text))
}
