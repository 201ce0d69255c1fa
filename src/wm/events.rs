//! Events Module
//!
//! Listener-based event dispatch. Listeners are keyed by event kind (or any
//! kind) with optional window and root filters. Ordinary listeners stay
//! registered; one-shot listeners are dropped when they fire.
//!
//! Interactive operations (drag, menus) open a modal scope: while it is
//! active only listeners registered in that scope are serviced, and closing
//! it removes them all.

use tracing::debug;

use crate::wm::adapter::{Event, EventKind, Window};

/// Which dispatch scope a listener belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Main,
    Modal,
}

#[derive(Debug, Clone)]
pub struct Listener<H> {
    /// `None` matches every kind
    pub kind: Option<EventKind>,
    pub window: Option<Window>,
    pub root: Option<Window>,
    pub handler: H,
    pub once: bool,
    pub scope: Scope,
}

impl<H> Listener<H> {
    fn matches(&self, event: &Event) -> bool {
        self.kind.is_none_or(|kind| kind == event.kind())
            && self.window.is_none_or(|w| event.window() == Some(w))
            && self.root.is_none_or(|r| event.root() == Some(r))
    }
}

/// Event router
#[derive(Debug)]
pub struct Dispatcher<H> {
    listeners: Vec<Listener<H>>,

    /// Registrations made during a dispatch pass
    pending: Vec<Listener<H>>,

    dispatching: bool,
    modal: bool,
}

impl<H> Default for Dispatcher<H> {
    fn default() -> Self {
        Self {
            listeners: Vec::new(),
            pending: Vec::new(),
            dispatching: false,
            modal: false,
        }
    }
}

impl<H: Clone> Dispatcher<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a persistent listener in the main scope
    pub fn register(
        &mut self,
        kind: Option<EventKind>,
        window: Option<Window>,
        root: Option<Window>,
        handler: H,
    ) {
        self.add(kind, window, root, handler, false, Scope::Main)
    }

    /// Register a listener in the modal scope
    pub fn register_modal(
        &mut self,
        kind: Option<EventKind>,
        window: Option<Window>,
        handler: H,
        once: bool,
    ) {
        assert!(self.modal, "modal listener registered outside a modal scope");
        self.add(kind, window, None, handler, once, Scope::Modal)
    }

    fn add(
        &mut self,
        kind: Option<EventKind>,
        window: Option<Window>,
        root: Option<Window>,
        handler: H,
        once: bool,
        scope: Scope,
    ) {
        let listener = Listener {
            kind,
            window,
            root,
            handler,
            once,
            scope,
        };
        if self.dispatching {
            self.pending.push(listener);
        } else {
            self.listeners.push(listener);
        }
    }

    /// Open the modal scope; main listeners are suspended until it ends
    pub fn begin_modal(&mut self) {
        assert!(!self.modal, "nested modal scope");
        debug!("Entering modal dispatch");
        self.modal = true;
    }

    /// Close the modal scope and drop its listeners
    pub fn end_modal(&mut self) {
        if !self.modal {
            return;
        }
        debug!("Leaving modal dispatch");
        self.modal = false;
        self.listeners.retain(|l| l.scope == Scope::Main);
        self.pending.retain(|l| l.scope == Scope::Main);
    }

    pub fn is_modal(&self) -> bool {
        self.modal
    }

    /// Start a dispatch pass: collect the handlers for an event in
    /// registration order, dropping one-shot listeners that matched.
    ///
    /// Registrations made before `finish` only see later events.
    pub fn begin(&mut self, event: &Event) -> Vec<H> {
        assert!(!self.dispatching, "dispatch pass started twice");
        self.dispatching = true;

        let scope = if self.modal { Scope::Modal } else { Scope::Main };
        let mut handlers = Vec::new();
        self.listeners.retain(|l| {
            if l.scope != scope || !l.matches(event) {
                return true;
            }
            handlers.push(l.handler.clone());
            !l.once
        });
        handlers
    }

    /// End a dispatch pass and activate listeners registered during it
    pub fn finish(&mut self) {
        self.dispatching = false;
        self.listeners.append(&mut self.pending);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.listeners.len() + self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::Point;
    use crate::wm::adapter::PointerEvent;

    fn motion(window: Window) -> Event {
        Event::MotionNotify(PointerEvent {
            window,
            root: 1,
            child: None,
            root_position: Point::new(0, 0),
            button: 0,
            state: 0,
            time: 0,
        })
    }

    #[test]
    fn matches_kind_window_and_wildcard_in_order() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(None, None, None, "any");
        dispatcher.register(Some(EventKind::MotionNotify), Some(5), None, "on-5");
        dispatcher.register(Some(EventKind::MotionNotify), Some(6), None, "on-6");
        dispatcher.register(Some(EventKind::KeyPress), None, None, "keys");

        let handlers = dispatcher.begin(&motion(5));
        dispatcher.finish();
        assert_eq!(handlers, vec!["any", "on-5"]);
    }

    #[test]
    fn root_filter_requires_matching_root() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(Some(EventKind::MotionNotify), None, Some(1), "root-1");
        dispatcher.register(Some(EventKind::MotionNotify), None, Some(9), "root-9");
        let handlers = dispatcher.begin(&motion(5));
        dispatcher.finish();
        assert_eq!(handlers, vec!["root-1"]);
    }

    #[test]
    fn listeners_persist_across_events() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(Some(EventKind::MotionNotify), None, None, "m");
        for _ in 0..3 {
            assert_eq!(dispatcher.begin(&motion(1)), vec!["m"]);
            dispatcher.finish();
        }
    }

    #[test]
    fn registration_during_dispatch_waits_for_next_pass() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(Some(EventKind::MotionNotify), None, None, "first");

        let handlers = dispatcher.begin(&motion(1));
        assert_eq!(handlers, vec!["first"]);
        dispatcher.register(Some(EventKind::MotionNotify), None, None, "second");
        dispatcher.finish();

        assert_eq!(dispatcher.begin(&motion(1)), vec!["first", "second"]);
        dispatcher.finish();
    }

    #[test]
    fn modal_scope_suspends_main_listeners() {
        let mut dispatcher = Dispatcher::new();
        dispatcher.register(Some(EventKind::MotionNotify), None, None, "main");

        dispatcher.begin_modal();
        dispatcher.register_modal(Some(EventKind::MotionNotify), None, "drag", false);
        dispatcher.register_modal(Some(EventKind::MotionNotify), None, "once", true);
        assert_eq!(dispatcher.begin(&motion(1)), vec!["drag", "once"]);
        dispatcher.finish();
        assert_eq!(dispatcher.begin(&motion(1)), vec!["drag"]);
        dispatcher.finish();

        dispatcher.end_modal();
        assert_eq!(dispatcher.begin(&motion(1)), vec!["main"]);
        dispatcher.finish();
        assert_eq!(dispatcher.len(), 1);
    }
}
