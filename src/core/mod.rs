pub mod span;

pub use self::span::{Detail, Loc};
