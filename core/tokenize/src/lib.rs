//! Tokenization algorithm engine.
//!
//! Three interchangeable strategies share the [`TokenizationAlgorithm`]
//! contract:
//! - [`SimpleTokenizer`]: random 16-digit tokens, unlinkable
//! - [`CofTokenizer`]: deterministic per card, merchant and contract
//! - [`FpeTokenizer`]: PAN-length, Luhn-valid, deterministic per card and merchant
//!
//! Strategies are stateless apart from the injected process secret.

pub mod algorithm;
pub mod cof;
pub mod context;
pub mod fpe;
pub mod luhn;
pub mod registry;
pub mod simple;
pub mod token;

pub use algorithm::TokenizationAlgorithm;
pub use cof::CofTokenizer;
pub use context::TokenizationContext;
pub use fpe::FpeTokenizer;
pub use registry::AlgorithmRegistry;
pub use simple::SimpleTokenizer;
pub use token::{AlgorithmType, Token};
