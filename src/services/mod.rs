pub mod alerts;
pub mod deploy;
pub mod email;
pub mod orders;
pub mod payments;
pub mod stores;
pub mod webhook_ledger;
