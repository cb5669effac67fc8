//! Route handlers, grouped by area

pub mod logs;
pub mod pages;
pub mod posts;
pub mod session;
pub mod stacks;
