use std::collections::HashMap;

use crate::value::Value;

pub type Frame = HashMap<String, Value>;

/// Stack of binding frames. Frame 0 holds the external data model; every
/// conditional body, loop iteration and macro call runs in its own frame.
#[derive(Debug, Clone)]
pub struct ScopeStack {
    frames: Vec<Frame>,
}

impl ScopeStack {
    pub fn new(globals: Frame) -> Self {
        Self {
            frames: vec![globals],
        }
    }

    /// Innermost binding for `name`, searching from the top frame down.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    /// Binds into the top frame, shadowing any outer binding.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.into(), value);
        }
    }

    pub fn push(&mut self) {
        self.frames.push(Frame::new());
    }

    /// Removes the top frame. The global frame is never popped.
    pub fn pop(&mut self) -> Option<Frame> {
        if self.frames.len() > 1 {
            self.frames.pop()
        } else {
            None
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Runs `f` inside a fresh frame that is popped whatever `f` returns.
    pub fn scoped<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.push();
        let result = f(self);
        self.pop();
        result
    }

    pub fn into_globals(mut self) -> Frame {
        self.frames.truncate(1);
        self.frames.pop().unwrap_or_default()
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new(Frame::new())
    }
}
