pub mod eval;
pub mod events;
pub mod poll;
pub mod status;
pub mod stream;
