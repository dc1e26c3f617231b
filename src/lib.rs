pub mod api;

pub mod extract;

pub mod pager;

pub mod sheet;

mod export;
pub use export::*;

pub mod logger;
