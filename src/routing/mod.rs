//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (route lookup)
//!     → matcher.rs (template match, capture path params)
//!     → Return: endpoint id + params, or NoMatch
//!
//! Route Compilation (at startup):
//!     ServiceConfig[].methods[].http
//!     → Compile templates
//!     → Sort by specificity
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Deterministic: same input always matches same route

pub mod matcher;
pub mod router;

pub use matcher::PathTemplate;
pub use router::{RouteMatch, RouteTable};
