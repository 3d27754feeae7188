use crate::token::{DEFAULT_DECIMALS, TokenAmount};
use crate::value_objects::Amount;
use primitive_types::{U256, U512};
use rust_decimal::Decimal;

/// Fees are expressed in parts per ten thousand.
pub const FEE_BASIS: u32 = 10_000;

/// Calculates the output amount for a given input amount in a constant product pool (x * y = k).
///
/// formula: dy = y * dx * (B - fee) / (x * B + dx * (B - fee)), with B = 10000
///
/// The division truncates exactly as the contract's integer arithmetic does,
/// so the result may under-quote by one unit but never over-quotes. It is
/// exact for every `U256` input: the output is always below `reserve_out`.
/// Degenerate input (zero amount, zero reserve, zero fee or a fee at or above
/// the basis) yields zero.
pub fn quote_swap_output(
    amount_in: TokenAmount,
    reserve_in: TokenAmount,
    reserve_out: TokenAmount,
    fee_bps: u32,
) -> TokenAmount {
    if amount_in.is_zero() || reserve_in.is_zero() || reserve_out.is_zero() {
        return TokenAmount::zero();
    }
    if fee_bps == 0 || fee_bps >= FEE_BASIS {
        return TokenAmount::zero();
    }

    // Both terms stay below 2^271, far from the 512-bit limit.
    let amount_in_with_fee = amount_in.0.full_mul(U256::from(FEE_BASIS - fee_bps));
    let denominator = reserve_in.0.full_mul(U256::from(FEE_BASIS)) + amount_in_with_fee;

    narrow(mul_div(U512::from(reserve_out.0), amount_in_with_fee, denominator))
}

/// Amount of the other side that keeps the pool ratio unchanged.
///
/// `paired = amount * reserve_other / reserve_self`, truncated. `None` while
/// the pool has no reserves on either side (first deposit sets the price).
pub fn quote_optimal_paired_amount(
    amount: TokenAmount,
    reserve_self: TokenAmount,
    reserve_other: TokenAmount,
) -> Option<TokenAmount> {
    if reserve_self.is_zero() || reserve_other.is_zero() {
        return None;
    }

    let paired = amount.0.full_mul(reserve_other.0) / U512::from(reserve_self.0);
    U256::try_from(paired).ok().map(TokenAmount)
}

/// Units of output received per unit of input, for display only.
pub fn exchange_rate(amount_in: TokenAmount, amount_out: TokenAmount) -> Option<Decimal> {
    let amount_in = Amount::from_token_amount(amount_in, DEFAULT_DECIMALS).to_decimal()?;
    let amount_out = Amount::from_token_amount(amount_out, DEFAULT_DECIMALS).to_decimal()?;
    if amount_in.is_zero() {
        return None;
    }
    amount_out.checked_div(amount_in).map(|rate| rate.round_dp(6))
}

/// `floor(x * y / z)` without forming the full product.
///
/// Requires `z < 2^510` and a result that fits in 512 bits. Shift-and-subtract
/// keeps the running remainder below `z`, so no intermediate exceeds `2z`.
fn mul_div(x: U512, y: U512, z: U512) -> U512 {
    let x_rem = x % z;
    let mut low = U512::zero();
    let mut rem = U512::zero();
    for bit in (0..y.bits()).rev() {
        low = low + low;
        rem = rem + rem;
        if rem >= z {
            rem -= z;
            low += U512::one();
        }
        if y.bit(bit) {
            rem += x_rem;
            if rem >= z {
                rem -= z;
                low += U512::one();
            }
        }
    }
    (x / z) * y + low
}

fn narrow(value: U512) -> TokenAmount {
    U256::try_from(value).map(TokenAmount).unwrap_or_default()
}
