//! Access decisions for sessions.
//!
//! `decide` is a pure function of (requester, session, supplied code); the
//! audit write it may request lives in the store so the decision logic can
//! be unit-tested without a database. Denial is an ordinary outcome, never
//! an error — only a structurally broken session record raises.

use serde::Serialize;

use crate::domain::{Requester, Session, SessionStatus, Visibility};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AccessReason {
    Owner,
    Admin,
    SessionEnded,
    Public,
    AccessCode,
    NoMatch,
}

impl AccessReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessReason::Owner => "owner",
            AccessReason::Admin => "admin",
            AccessReason::SessionEnded => "ended",
            AccessReason::Public => "public",
            AccessReason::AccessCode => "access_code",
            AccessReason::NoMatch => "no_match",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub granted: bool,
    pub reason: AccessReason,
    /// Only code-gated checks (grant or deny) are audited; owner, admin and
    /// public traffic would flood the attempt log.
    pub should_log: bool,
}

impl Decision {
    fn granted(reason: AccessReason, should_log: bool) -> Self {
        Self {
            granted: true,
            reason,
            should_log,
        }
    }

    fn denied(reason: AccessReason, should_log: bool) -> Self {
        Self {
            granted: false,
            reason,
            should_log,
        }
    }
}

/// Decide whether `requester` may view `session`, in fixed precedence:
/// owner, admin, ended-private denial, public, exact access-code match,
/// deny. Code comparison is case-sensitive; any normalization is the
/// producer's job.
pub fn decide(
    requester: &Requester,
    session: &Session,
    supplied_code: Option<&str>,
) -> Result<Decision> {
    if session.owner.is_empty() {
        return Err(Error::MalformedRecord(format!(
            "session {} has no owner",
            session.id
        )));
    }

    if let Requester::User { id, admin } = requester {
        if *id == session.owner {
            return Ok(Decision::granted(AccessReason::Owner, false));
        }
        if *admin {
            return Ok(Decision::granted(AccessReason::Admin, false));
        }
    }

    if session.visibility == Visibility::Private && session.status == SessionStatus::Ended {
        return Ok(Decision::denied(AccessReason::SessionEnded, false));
    }

    if session.visibility == Visibility::Public {
        return Ok(Decision::granted(AccessReason::Public, false));
    }

    if let (Some(configured), Some(supplied)) = (session.access_code.as_deref(), supplied_code) {
        if configured == supplied {
            return Ok(Decision::granted(AccessReason::AccessCode, true));
        }
    }

    Ok(Decision::denied(AccessReason::NoMatch, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SessionCounters, WatermarkSettings};

    fn make_session(visibility: Visibility, access_code: Option<&str>) -> Session {
        Session {
            id: 1,
            owner: "u1".to_string(),
            name: "Wedding shoot".to_string(),
            visibility,
            access_code: access_code.map(str::to_string),
            status: SessionStatus::Active,
            review_mode: false,
            watermark: WatermarkSettings::default(),
            counters: SessionCounters::default(),
            view_count: 0,
            unique_viewers: 0,
            created_at: 0,
        }
    }

    #[test]
    fn test_owner_always_granted_without_logging() {
        let session = make_session(Visibility::Private, None);
        let d = decide(&Requester::user("u1"), &session, None).unwrap();
        assert!(d.granted);
        assert_eq!(d.reason, AccessReason::Owner);
        assert!(!d.should_log);
    }

    #[test]
    fn test_admin_granted_without_logging() {
        let session = make_session(Visibility::Private, None);
        let d = decide(&Requester::admin("moderator"), &session, None).unwrap();
        assert!(d.granted);
        assert_eq!(d.reason, AccessReason::Admin);
        assert!(!d.should_log);
    }

    #[test]
    fn test_owner_outranks_ended_denial() {
        let mut session = make_session(Visibility::Private, Some("CODE"));
        session.status = SessionStatus::Ended;
        let d = decide(&Requester::user("u1"), &session, None).unwrap();
        assert!(d.granted);
        assert_eq!(d.reason, AccessReason::Owner);
    }

    #[test]
    fn test_ended_private_denies_even_with_valid_code() {
        let mut session = make_session(Visibility::Private, Some("CODE"));
        session.status = SessionStatus::Ended;
        let d = decide(&Requester::Anonymous, &session, Some("CODE")).unwrap();
        assert!(!d.granted);
        assert_eq!(d.reason, AccessReason::SessionEnded);
        assert!(!d.should_log);
    }

    #[test]
    fn test_public_session_open_to_anonymous_regardless_of_code() {
        let session = make_session(Visibility::Public, None);
        for code in [None, Some("anything")] {
            let d = decide(&Requester::Anonymous, &session, code).unwrap();
            assert!(d.granted);
            assert_eq!(d.reason, AccessReason::Public);
            assert!(!d.should_log);
        }
    }

    #[test]
    fn test_access_code_is_case_sensitive() {
        let session = make_session(Visibility::Private, Some("WEDDING2024"));

        let wrong = decide(&Requester::Anonymous, &session, Some("wedding2024")).unwrap();
        assert!(!wrong.granted);
        assert_eq!(wrong.reason, AccessReason::NoMatch);
        assert!(wrong.should_log);

        let right = decide(&Requester::Anonymous, &session, Some("WEDDING2024")).unwrap();
        assert!(right.granted);
        assert_eq!(right.reason, AccessReason::AccessCode);
        assert!(right.should_log);
    }

    #[test]
    fn test_private_without_code_unreachable_except_owner_admin() {
        let session = make_session(Visibility::Private, None);

        let anon = decide(&Requester::Anonymous, &session, None).unwrap();
        assert!(!anon.granted);

        let guesser = decide(&Requester::user("stranger"), &session, Some("guess")).unwrap();
        assert!(!guesser.granted);

        assert!(decide(&Requester::user("u1"), &session, None).unwrap().granted);
        assert!(decide(&Requester::admin("a"), &session, None).unwrap().granted);
    }

    #[test]
    fn test_decision_is_deterministic() {
        let session = make_session(Visibility::Private, Some("S3CRET"));
        let a = decide(&Requester::Anonymous, &session, Some("nope")).unwrap();
        let b = decide(&Requester::Anonymous, &session, Some("nope")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_missing_owner_is_a_hard_error() {
        let mut session = make_session(Visibility::Public, None);
        session.owner = String::new();
        let err = decide(&Requester::Anonymous, &session, None).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord(_)));
    }
}
