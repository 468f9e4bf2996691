//! Re-imports for convenience
#[doc(no_inline)]
pub use crate::compress::{CompressionReport, Compressor};
#[doc(no_inline)]
pub use crate::config::SessionConfig;
#[doc(no_inline)]
pub use crate::dist::*;
#[doc(no_inline)]
pub use crate::result::KdeError;
#[doc(no_inline)]
pub use crate::session::Session;
#[doc(no_inline)]
pub use crate::traits::*;
#[doc(no_inline)]
pub use crate::update::Sample;
