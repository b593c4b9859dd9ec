//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (route lookup)
//!     → matcher.rs (trie walk, placeholder capture)
//!     → Return: matched RouteEntry + params, or no match
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → Parse methods and downstream base URLs
//!     → Insert templates into segment trie
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (segment trie only)
//! - Deterministic: same input always matches same route
//! - Most specific template wins; declaration order breaks ties

pub mod matcher;
pub mod router;

pub use router::{RouteEntry, RouteMatch, RouteTable};
