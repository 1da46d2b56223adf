//! Cross-crate flows over a shared ledger.

mod concurrency;
mod ledger;
mod node;
mod ordering;
mod scenarios;
