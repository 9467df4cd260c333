//! Service layer for business logic
//!
//! Services hold the lockout rules; storage details stay behind the
//! repository traits.

pub mod lockout;

pub use lockout::LockoutService;
