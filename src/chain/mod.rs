//! Header chains and the scanner that resolves them.

pub mod header;
pub mod scanner;
pub mod view;

pub use header::{HeaderChain, HeaderEntry};
pub use scanner::{DEFAULT_MAX_CHAIN_DEPTH, HeaderScanner};
pub use view::HeaderView;
