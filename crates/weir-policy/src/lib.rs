//! Route authorization policies for the Weir server.
//!
//! A [`Policy`] answers one question: given a request path and an optional
//! authenticated [`Principal`], is the request permitted? Rules are three
//! lists of shell-style glob patterns (`allow`, `protect`, `superuser`)
//! compiled once at startup; evaluation is a pure function with no I/O, so a
//! policy can be shared freely across request handlers without
//! synchronization.
//!
//! Denial is data, not an error: [`Policy::evaluate`] returns a
//! [`Decision`] carrying a caller-supplied violation reason, and the
//! dispatcher decides how to surface it (401, redirect to login, ...).
//!
//! ```
//! use weir_policy::{Anonymous, Policy, RuleSet};
//!
//! let open: &[&str] = &[];
//! let rules = RuleSet::new(open, &["*"], &["*/admin/*"]).unwrap();
//! let policy = Policy::new(rules, "unauthorized");
//!
//! let decision = policy.evaluate::<Anonymous>(Some("/flows"), None);
//! assert!(!decision.is_permit());
//! ```

mod error;
mod resolver;
mod rules;
mod store;

pub use error::RuleError;
pub use resolver::{Anonymous, Decision, Denial, Policy, Principal};
pub use rules::{RuleSet, RuleSetConfig};
pub use store::PolicyStore;
