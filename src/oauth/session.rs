//! # Session State Machine (C7)
//!
//! Inlined here rather than split into its own crate, matching `spec.md`
//! §9's preference against unnecessary dynamic dispatch: the transitions
//! are a handful of pure functions over [`Session`], each enforcing the
//! one-way diagram in `spec.md` §4.5.
//!
//! ```text
//! pending ──authorize────────> awaiting_presentation
//! awaiting_presentation ──direct_post──> code_issued
//! awaiting_presentation ──cancel───────> error
//! code_issued ──token──────────────────> token_issued
//! token_issued ──userinfo──────────────> token_issued    (no change)
//! (any) ──expires_at reached───────────> expired
//! ```

use chrono::{DateTime, Utc};

use super::error::Error;
use super::types::{Session, Status};
use crate::invalid_grant;

/// Check `session` against its own expiry and the state machine before any
/// mutating operation proceeds.
///
/// # Errors
///
/// Returns [`Error::SessionExpired`] if `now` is past `expires_at`, or
/// [`Error::InvalidGrant`] if `session.status` is not one of `allowed`.
pub fn require_status(session: &Session, now: DateTime<Utc>, allowed: &[Status]) -> Result<(), Error> {
    if session.is_expired(now) {
        return Err(Error::SessionExpired(format!("session {} expired", session.id)));
    }
    if session.status.is_terminal() || !allowed.contains(&session.status) {
        return Err(invalid_grant!(
            "session {} is in status {:?}, expected one of {allowed:?}",
            session.id,
            session.status
        ));
    }
    Ok(())
}

/// `pending ──authorize──> awaiting_presentation`, invoked once the request
/// object has been handed to the wallet.
pub fn start_presentation(session: &mut Session, now: DateTime<Utc>) -> Result<(), Error> {
    require_status(session, now, &[Status::Pending])?;
    session.status = Status::AwaitingPresentation;
    Ok(())
}

/// `awaiting_presentation ──direct_post──> code_issued`.
pub fn issue_code(session: &mut Session, now: DateTime<Utc>) -> Result<(), Error> {
    require_status(session, now, &[Status::Pending, Status::AwaitingPresentation])?;
    session.status = Status::CodeIssued;
    Ok(())
}

/// `awaiting_presentation ──cancel──> error`, or any non-terminal status
/// that fails verification.
pub fn fail(session: &mut Session, now: DateTime<Utc>) {
    if !session.status.is_terminal() {
        let _ = now;
        session.status = Status::Error;
    }
}

/// `code_issued ──token──> token_issued`.
pub fn issue_tokens(session: &mut Session, now: DateTime<Utc>) -> Result<(), Error> {
    require_status(session, now, &[Status::CodeIssued])?;
    session.status = Status::TokenIssued;
    Ok(())
}

/// Mark an expired session so future reads see its terminal status without
/// waiting on the sweeper.
pub fn expire_if_due(session: &mut Session, now: DateTime<Utc>) -> bool {
    if !session.status.is_terminal() && session.is_expired(now) {
        session.status = Status::Expired;
        true
    } else {
        false
    }
}
