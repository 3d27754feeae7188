pub mod liquidity_event;
pub mod pool;
pub mod position;

// Re-export for easier access
pub use liquidity_event::LiquidityEvent;
pub use pool::{PoolSnapshot, find_pool};
pub use position::{LiquidityPosition, normalize_shares};
