//! Position sizing for a single all-in limit entry.

use rust_decimal::Decimal;

/// Largest multiple of `qty_step` affordable with `wallet_balance` at `price`.
///
/// `floor(wallet_balance / price / qty_step) * qty_step` in exact decimal
/// arithmetic. Returns zero when not even one step fits, and for non-positive
/// inputs instead of dividing by zero. The result never costs more than
/// `wallet_balance`.
pub fn compute_quantity(wallet_balance: Decimal, price: Decimal, qty_step: Decimal) -> Decimal {
    if wallet_balance <= Decimal::ZERO || price <= Decimal::ZERO || qty_step <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let Some(step_cost) = price.checked_mul(qty_step) else {
        return Decimal::ZERO;
    };
    let Some(mut steps) = wallet_balance.checked_div(step_cost).map(|s| s.floor()) else {
        return Decimal::ZERO;
    };

    // division rounds at 28 significant digits and may round up across a step
    while steps > Decimal::ZERO && steps * step_cost > wallet_balance {
        steps -= Decimal::ONE;
    }

    steps * qty_step
}
