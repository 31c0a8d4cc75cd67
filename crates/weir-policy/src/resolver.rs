//! The policy resolver.

use crate::rules::RuleSet;

/// The authenticated identity attached to a request.
///
/// `is_active` is part of the trait so policies can be extended to consult
/// it, but the current algorithm intentionally does not: authenticated
/// callers are only ever checked against the `superuser` rules, never
/// `allow`/`protect`. That asymmetry is carried over from the behavior this
/// resolver replaces.
pub trait Principal {
    fn is_active(&self) -> bool;
    fn is_superuser(&self) -> bool;
}

/// Stand-in principal type for call sites that only ever pass `None`.
///
/// `evaluate` is generic over the principal, so anonymous-only callers need
/// a type to name: `policy.evaluate::<Anonymous>(path, None)`.
#[derive(Debug, Clone, Copy)]
pub enum Anonymous {}

impl Principal for Anonymous {
    fn is_active(&self) -> bool {
        match *self {}
    }

    fn is_superuser(&self) -> bool {
        match *self {}
    }
}

/// Outcome of a policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision<R> {
    /// The request may proceed.
    Permit,
    /// The request must be refused; the dispatcher translates the denial
    /// into a transport-level response.
    Deny(Denial<R>),
}

impl<R> Decision<R> {
    pub fn is_permit(&self) -> bool {
        matches!(self, Decision::Permit)
    }
}

/// Why a request was refused.
///
/// `Violation` carries the reason value configured on the policy, opaque to
/// this crate. `MalformedRequest` is independent of rule evaluation: no
/// path could be determined for the request at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial<R> {
    MalformedRequest,
    Violation(R),
}

/// An immutable rule set paired with the violation reason handed back on
/// deny.
///
/// Stateless across requests: evaluation is a pure function of
/// (path, principal, rules), safe to call concurrently without locking.
#[derive(Debug, Clone)]
pub struct Policy<R> {
    rules: RuleSet,
    violation: R,
}

impl<R: Clone> Policy<R> {
    pub fn new(rules: RuleSet, violation: R) -> Self {
        Self { rules, violation }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Decide whether a request may proceed.
    ///
    /// Precedence, in order:
    /// 1. no usable path: deny as malformed;
    /// 2. anonymous caller on an `allow` path: permit, even if the path is
    ///    also protected or superuser-restricted;
    /// 3. anonymous caller on a `protect` or `superuser` path: deny;
    /// 4. anonymous caller anywhere else: permit (default-allow);
    /// 5. authenticated non-superuser on a `superuser` path: deny;
    /// 6. any other authenticated caller: permit.
    pub fn evaluate<P: Principal>(
        &self,
        path: Option<&str>,
        principal: Option<&P>,
    ) -> Decision<R> {
        let Some(path) = path.filter(|p| !p.is_empty()) else {
            return Decision::Deny(Denial::MalformedRequest);
        };

        let is_superuser_path = self.rules.requires_superuser(path);

        match principal {
            None => {
                if self.rules.allows(path) {
                    return Decision::Permit;
                }
                if self.rules.protects(path) || is_superuser_path {
                    return Decision::Deny(Denial::Violation(self.violation.clone()));
                }
                Decision::Permit
            }
            Some(principal) => {
                if is_superuser_path && !principal.is_superuser() {
                    return Decision::Deny(Denial::Violation(self.violation.clone()));
                }
                Decision::Permit
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RuleSet;

    const NONE: &[&str] = &[];

    struct Caller {
        active: bool,
        superuser: bool,
    }

    impl Principal for Caller {
        fn is_active(&self) -> bool {
            self.active
        }

        fn is_superuser(&self) -> bool {
            self.superuser
        }
    }

    fn user() -> Caller {
        Caller {
            active: true,
            superuser: false,
        }
    }

    fn superuser() -> Caller {
        Caller {
            active: true,
            superuser: true,
        }
    }

    fn policy(rules: RuleSet) -> Policy<&'static str> {
        Policy::new(rules, "violation")
    }

    #[test]
    fn test_allow_overrides_protect_and_superuser_for_anonymous() {
        let rules = RuleSet::new(&["/status", "*/admin/*"], &["*"], &["*/admin/*"]).unwrap();
        let policy = policy(rules);

        assert!(policy.evaluate::<Anonymous>(Some("/status"), None).is_permit());
        // Allowance wins even on superuser-pathed routes.
        assert!(
            policy
                .evaluate::<Anonymous>(Some("/api/admin/users"), None)
                .is_permit()
        );
    }

    #[test]
    fn test_anonymous_denied_iff_protected_or_superuser() {
        let rules = RuleSet::new(NONE, &["/flows/*"], &["*/admin/*"]).unwrap();
        let policy = policy(rules);

        assert_eq!(
            policy.evaluate::<Anonymous>(Some("/flows/run"), None),
            Decision::Deny(Denial::Violation("violation"))
        );
        assert_eq!(
            policy.evaluate::<Anonymous>(Some("/x/admin/y"), None),
            Decision::Deny(Denial::Violation("violation"))
        );
        // Matching none of the three sets: default-allow.
        assert!(policy.evaluate::<Anonymous>(Some("/health"), None).is_permit());
    }

    #[test]
    fn test_authenticated_denied_iff_superuser_path() {
        let rules = RuleSet::new(&["/open"], &["*"], &["*/admin/*"]).unwrap();
        let policy = policy(rules);

        // allow/protect are never consulted for authenticated callers.
        assert!(policy.evaluate(Some("/flows/run"), Some(&user())).is_permit());
        assert_eq!(
            policy.evaluate(Some("/api/admin/users"), Some(&user())),
            Decision::Deny(Denial::Violation("violation"))
        );
    }

    #[test]
    fn test_superuser_always_permitted() {
        let rules = RuleSet::new(NONE, &["*"], &["*"]).unwrap();
        let policy = policy(rules);

        for path in ["/", "/api/admin/users", "/anything/at/all"] {
            assert!(policy.evaluate(Some(path), Some(&superuser())).is_permit());
        }
    }

    #[test]
    fn test_empty_rule_sets_are_open() {
        let policy = policy(RuleSet::empty());

        assert!(policy.evaluate::<Anonymous>(Some("/any/path"), None).is_permit());
        assert!(policy.evaluate(Some("/any/path"), Some(&user())).is_permit());
    }

    #[test]
    fn test_missing_path_is_malformed() {
        let rules = RuleSet::new(&["*"], NONE, NONE).unwrap();
        let policy = policy(rules);

        // Independent of rules: even a fully-allowing set denies without a path.
        assert_eq!(
            policy.evaluate::<Anonymous>(None, None),
            Decision::Deny(Denial::MalformedRequest)
        );
        assert_eq!(
            policy.evaluate::<Anonymous>(Some(""), None),
            Decision::Deny(Denial::MalformedRequest)
        );
        assert_eq!(
            policy.evaluate(None, Some(&superuser())),
            Decision::Deny(Denial::MalformedRequest)
        );
    }

    #[test]
    fn test_inactive_principal_still_counts_as_present() {
        let rules = RuleSet::new(NONE, &["*"], &["*/admin/*"]).unwrap();
        let policy = policy(rules);
        let inactive = Caller {
            active: false,
            superuser: false,
        };

        // Present-but-inactive principals bypass protect: the carried-over
        // asymmetry. Callers that want the stricter reading must withhold
        // the principal instead.
        assert!(policy.evaluate(Some("/flows/run"), Some(&inactive)).is_permit());
    }

    #[test]
    fn test_reference_scenario() {
        let rules = RuleSet::new(NONE, &["*"], &["*/admin/*"]).unwrap();
        let policy = policy(rules);

        assert!(!policy.evaluate::<Anonymous>(Some("/status"), None).is_permit());
        assert!(
            !policy
                .evaluate::<Anonymous>(Some("/admin/users"), None)
                .is_permit()
        );
        assert!(policy.evaluate(Some("/status"), Some(&user())).is_permit());
        assert!(!policy.evaluate(Some("/admin/users"), Some(&user())).is_permit());
        assert!(
            policy
                .evaluate(Some("/admin/users"), Some(&superuser()))
                .is_permit()
        );
    }
}
