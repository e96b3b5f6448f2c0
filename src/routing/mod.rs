//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → router.rs (scan routes in order)
//!     → matcher.rs (evaluate path patterns)
//!     → rewrite.rs (outbound path, if the route rewrites)
//!     → Return: RouteMatch or NoRouteMatched
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → Parse patterns and rewrites
//!     → Bind breakers by name, build retry policies
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Deterministic: same input always matches same route
//! - First match wins (configuration order, no specificity ranking)

pub mod matcher;
pub mod rewrite;
pub mod router;

pub use matcher::{PathPattern, PatternError};
pub use rewrite::RewriteRule;
pub use router::{service_name, Route, RouteBreaker, RouteError, RouteMatch, RouteTable};
