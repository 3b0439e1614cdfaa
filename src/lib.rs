//! Client for the self-employed tax service (lknpd.nalog.ru).
//!
//! A [`Session`] logs in once, keeps the access token fresh through the
//! refresh flow and wraps every request in a bounded retry on transient
//! server failures. Business calls live in [`account`] and [`income`].

pub mod account;
pub mod clock;
pub mod config;
pub mod device;
pub mod error;
pub mod http;
pub mod income;
pub mod session;

pub use config::SessionConfig;
pub use error::{Error, Result};
pub use income::{Income, IncomeReceipt, ServiceLine};
pub use session::{Credential, CredentialState, Session};
