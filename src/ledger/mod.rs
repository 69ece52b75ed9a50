//! Ledgers that guard the contended balances: company credit and product stock.
//!
//! Functions here take a `&Connection` that is expected to be inside the
//! caller's transaction. Each balance is written with a guarded
//! compare-and-swap update, so a lost race surfaces as the same error the
//! up-front check would have produced.

pub mod credit;
pub mod inventory;
