pub mod grid;
pub mod models;
pub mod pools;
pub mod scores;
pub mod winners;

pub use grid::GridStore;
pub use pools::PoolStore;
pub use scores::{FreezeOutcome, ScoreStore};
pub use winners::{InsertOutcome, NewWinner, WinnerStore};
