//! Reactive state shared with every view.

pub mod session;
