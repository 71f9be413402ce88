//! Event-dispatch nesting tracker
//!
//! Work postponed while an event is being dispatched runs once the dispatch
//! depth unwinds back to the loop level the work was queued at. Nested event
//! loops (modal dialogs, shutdown work run from inside a handler) push a new
//! loop level so postponed work never runs inside a deeper loop than the one
//! that queued it.
//!
//! The tracker is strictly single-threaded and shared through `Rc`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::debug;

use crate::collaborators::Window;

/// Deferred unit of work
pub type PostponedCall = Box<dyn FnOnce()>;

struct Postponed {
    loop_level: usize,
    callable: PostponedCall,
}

#[derive(Default)]
struct DelayedActivation {
    paused: bool,
    window: Option<Rc<dyn Window>>,
}

/// Tracks dispatch depth against nested-loop depth
#[derive(Default)]
pub struct NestingTracker {
    event_level: Cell<usize>,
    loop_level: Cell<usize>,
    previous_loop_levels: RefCell<Vec<usize>>,
    postponed: RefCell<Vec<Postponed>>,
    delayed: RefCell<DelayedActivation>,
}

impl NestingTracker {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Current dispatch depth
    pub fn event_level(&self) -> usize {
        self.event_level.get()
    }

    /// Current nested-loop depth
    pub fn loop_level(&self) -> usize {
        self.loop_level.get()
    }

    /// Number of callables waiting to run
    pub fn postponed_count(&self) -> usize {
        self.postponed.borrow().len()
    }

    /// Whether an event is being dispatched right now
    pub fn in_dispatch(&self) -> bool {
        self.event_level.get() > 0
    }

    /// Record entry into a nested event loop
    pub fn enter_nested_loop(&self) {
        let event_level = self.event_level.get();
        let loop_level = self.loop_level.get();
        if event_level > loop_level {
            self.previous_loop_levels.borrow_mut().push(loop_level);
            self.loop_level.set(event_level);
        }
    }

    /// Start dispatching one event
    ///
    /// A dispatch deeper than the current loop level is an implicit nested
    /// loop entry.
    pub fn begin_dispatch(&self) {
        let event_level = self.event_level.get() + 1;
        self.event_level.set(event_level);
        self.enter_nested_loop();
    }

    /// Finish dispatching one event and run work queued for the level below
    pub fn end_dispatch(&self) {
        let event_level = self.event_level.get();
        assert!(event_level > 0, "end_dispatch without matching begin_dispatch");

        let loop_level = self.loop_level.get();
        if event_level == loop_level {
            let previous = self.previous_loop_levels.borrow_mut().pop();
            match previous {
                Some(level) => self.loop_level.set(level),
                None => panic!("end_dispatch at loop depth {} with empty loop history", loop_level),
            }
        }

        let process_till_level = event_level - 1;
        self.process_postponed(process_till_level);
        self.event_level.set(process_till_level);
    }

    /// Queue `callable` until the current loop level unwinds
    pub fn postpone(&self, callable: PostponedCall) {
        let event_level = self.event_level.get();
        let loop_level = self.loop_level.get();
        assert!(
            event_level >= loop_level,
            "dispatch depth {} below loop depth {}",
            event_level,
            loop_level
        );

        // The loop at this level is the one running the current dispatch,
        // so the work belongs to the loop below it
        if event_level == loop_level {
            let previous = self.previous_loop_levels.borrow_mut().pop();
            let previous = match previous {
                Some(level) => level,
                None => panic!("postpone at loop depth {} with empty loop history", loop_level),
            };
            if let Some(last) = self.postponed.borrow().last() {
                assert!(
                    last.loop_level < loop_level,
                    "postponed call at level {} not below loop depth {}",
                    last.loop_level,
                    loop_level
                );
            }
            self.loop_level.set(previous);
        }

        self.postponed.borrow_mut().push(Postponed {
            loop_level: self.loop_level.get(),
            callable,
        });
    }

    /// Run `callable` after the current dispatch, or now when idle
    pub fn postpone_or_run(&self, callable: PostponedCall) {
        if self.in_dispatch() {
            self.postpone(callable);
        } else {
            callable();
        }
    }

    fn process_postponed(&self, level: usize) {
        loop {
            let next = {
                let mut postponed = self.postponed.borrow_mut();
                match postponed.last() {
                    Some(last) if last.loop_level == level => postponed.pop(),
                    _ => None,
                }
            };
            match next {
                Some(call) => (call.callable)(),
                None => break,
            }
        }
    }

    /// Bracket one event dispatch; the dispatch ends when the guard drops
    pub fn dispatch(&self) -> DispatchGuard<'_> {
        self.begin_dispatch();
        DispatchGuard { tracker: self }
    }

    /// Run `f` as a nested event loop
    pub fn run_nested<R>(&self, f: impl FnOnce() -> R) -> R {
        self.enter_nested_loop();
        let _dispatch = self.dispatch();
        f()
    }

    /// Activate `window` once the current dispatch unwinds
    ///
    /// Requests arriving before the activation runs replace the pending
    /// window instead of queueing another activation.
    pub fn activate_window_delayed(self: &Rc<Self>, window: Rc<dyn Window>) {
        {
            let mut delayed = self.delayed.borrow_mut();
            if delayed.paused {
                debug!("window activation paused, ignoring request");
                return;
            }
            if delayed.window.replace(window).is_some() {
                return;
            }
        }

        let tracker = Rc::downgrade(self);
        self.postpone_or_run(Box::new(move || {
            let Some(tracker) = tracker.upgrade() else {
                return;
            };
            let window = tracker.delayed.borrow_mut().window.take();
            match window {
                Some(window) if !window.is_hidden() => window.activate(),
                Some(_) => debug!("skipping activation of hidden window"),
                None => {}
            }
        }));
    }

    /// Drop any pending activation and ignore new ones until resumed
    pub fn pause_delayed_activations(&self) {
        let mut delayed = self.delayed.borrow_mut();
        delayed.window = None;
        delayed.paused = true;
    }

    pub fn resume_delayed_activations(&self) {
        self.delayed.borrow_mut().paused = false;
    }
}

/// Ends a dispatch on drop
pub struct DispatchGuard<'a> {
    tracker: &'a NestingTracker,
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.tracker.end_dispatch();
    }
}
