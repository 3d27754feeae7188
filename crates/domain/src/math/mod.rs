pub mod constant_product;

pub use constant_product::{
    FEE_BASIS, exchange_rate, quote_optimal_paired_amount, quote_swap_output,
};
