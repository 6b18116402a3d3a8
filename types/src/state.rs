//! Queue status bits and the named states derived from them.
//!
//! A record's status is a bit set. Only the combinations listed in
//! [`Status`] are valid; anything else is reported as an invalid state by
//! the stores.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, Not};
use std::str::FromStr;

use crate::TypesError;

/// Raw status bits of a queue record.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusBits(u32);

impl StatusBits {
    pub const EMPTY: Self = Self(0);
    /// Ready to be dispatched.
    pub const QUEUED: Self = Self(1 << 0);
    /// Held by a dispatcher between `send_start` and `send_end`.
    pub const RESERVED: Self = Self(1 << 1);
    /// Handed to the network.
    pub const IN_NETWORK: Self = Self(1 << 3);
    /// Dispatcher was unreachable; will be offered again.
    pub const DEFERRED: Self = Self(1 << 4);
    /// Send rejected by the node.
    pub const LOCAL_ERROR: Self = Self(1 << 8);
    /// Included on chain with an execution error.
    pub const NETWORK_ERROR: Self = Self(1 << 9);
    /// Terminal.
    pub const FINAL: Self = Self(1 << 12);

    pub const ALL: Self = Self(
        Self::QUEUED.0
            | Self::RESERVED.0
            | Self::IN_NETWORK.0
            | Self::DEFERRED.0
            | Self::LOCAL_ERROR.0
            | Self::NETWORK_ERROR.0
            | Self::FINAL.0,
    );

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(&self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn is_final(&self) -> bool {
        self.contains(Self::FINAL)
    }

    pub fn is_reserved(&self) -> bool {
        self.contains(Self::RESERVED)
    }

    pub fn is_error(&self) -> bool {
        self.intersects(Self::LOCAL_ERROR | Self::NETWORK_ERROR)
    }

    /// The named state for these bits, or `None` for an invalid combination.
    pub fn status(&self) -> Option<Status> {
        Status::ALL.iter().copied().find(|s| s.bits() == *self)
    }
}

impl BitOr for StatusBits {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitAnd for StatusBits {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for StatusBits {
    type Output = Self;

    /// Complement within [`StatusBits::ALL`].
    fn not(self) -> Self {
        Self(!self.0 & Self::ALL.0)
    }
}

impl fmt::Debug for StatusBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status() {
            Some(s) => write!(f, "StatusBits({s}, {:#x})", self.0),
            None => write!(f, "StatusBits(invalid, {:#x})", self.0),
        }
    }
}

/// Named queue states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Stored but not yet enqueued.
    Pending,
    /// Waiting for a dispatcher.
    Queued,
    /// Dispatch in progress.
    Reserved,
    /// Sent; waiting to be observed in a block.
    InNetwork,
    /// Send postponed because the node was unreachable.
    Deferred,
    /// Send rejected by the node.
    SendFailed,
    /// Included on chain and succeeded.
    Success,
    /// Included on chain and failed.
    Reverted,
}

impl Status {
    pub const ALL: [Status; 8] = [
        Status::Pending,
        Status::Queued,
        Status::Reserved,
        Status::InNetwork,
        Status::Deferred,
        Status::SendFailed,
        Status::Success,
        Status::Reverted,
    ];

    pub fn bits(&self) -> StatusBits {
        match self {
            Self::Pending => StatusBits::EMPTY,
            Self::Queued => StatusBits::QUEUED,
            Self::Reserved => StatusBits::IN_NETWORK | StatusBits::RESERVED,
            Self::InNetwork => StatusBits::IN_NETWORK,
            Self::Deferred => StatusBits::DEFERRED,
            Self::SendFailed => StatusBits::FINAL | StatusBits::LOCAL_ERROR,
            Self::Success => StatusBits::FINAL,
            Self::Reverted => StatusBits::FINAL | StatusBits::NETWORK_ERROR,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Reserved => "reserved",
            Self::InNetwork => "in_network",
            Self::Deferred => "deferred",
            Self::SendFailed => "send_failed",
            Self::Success => "success",
            Self::Reverted => "reverted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.bits().is_final()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .iter()
            .copied()
            .find(|st| st.as_str() == s.to_lowercase().replace('-', "_"))
            .ok_or_else(|| TypesError::UnknownStatus(s.to_string()))
    }
}

/// Selects records by their status bits.
///
/// A record matches when it carries every bit in `all`, none of the bits in
/// `none`, and, if `any` is non-empty, at least one bit of `any`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct StateFilter {
    pub all: StatusBits,
    pub none: StatusBits,
    pub any: StatusBits,
}

impl StateFilter {
    /// The `by_state(state, not_state)` filter.
    pub fn by_state(state: StatusBits, not_state: StatusBits) -> Self {
        Self {
            all: state,
            none: not_state,
            any: StatusBits::EMPTY,
        }
    }

    /// Matches exactly the bits of one named state.
    pub fn exact(status: Status) -> Self {
        Self::by_state(status.bits(), !status.bits())
    }

    pub fn with_any(mut self, any: StatusBits) -> Self {
        self.any = any;
        self
    }

    /// Stored but not yet sent: `Pending` or `Queued`.
    pub fn pending() -> Self {
        Self::by_state(StatusBits::EMPTY, !StatusBits::QUEUED)
    }

    /// Ready for dispatch: queued or deferred, nothing in flight or final.
    pub fn upcoming() -> Self {
        Self::by_state(
            StatusBits::EMPTY,
            StatusBits::RESERVED | StatusBits::IN_NETWORK | StatusBits::FINAL,
        )
        .with_any(StatusBits::QUEUED | StatusBits::DEFERRED)
    }

    pub fn deferred() -> Self {
        Self::by_state(StatusBits::DEFERRED, StatusBits::FINAL)
    }

    /// Terminal records carrying an error bit.
    pub fn failed() -> Self {
        Self::by_state(StatusBits::FINAL, StatusBits::EMPTY)
            .with_any(StatusBits::LOCAL_ERROR | StatusBits::NETWORK_ERROR)
    }

    /// Handed to the network and not yet final, reserved ones included.
    pub fn in_flight() -> Self {
        Self::by_state(StatusBits::IN_NETWORK, StatusBits::FINAL)
    }

    pub fn matches(&self, bits: StatusBits) -> bool {
        bits.contains(self.all)
            && !bits.intersects(self.none)
            && (self.any.is_empty() || bits.intersects(self.any))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_named_state_round_trips() {
        for status in Status::ALL {
            assert_eq!(status.bits().status(), Some(status));
        }
    }

    #[test]
    fn unknown_combination_is_invalid() {
        let bits = StatusBits::QUEUED | StatusBits::FINAL;
        assert_eq!(bits.status(), None);
    }

    #[test]
    fn upcoming_selects_queued_and_deferred_only() {
        let f = StateFilter::upcoming();
        assert!(f.matches(Status::Queued.bits()));
        assert!(f.matches(Status::Deferred.bits()));
        assert!(!f.matches(Status::Pending.bits()));
        assert!(!f.matches(Status::Reserved.bits()));
        assert!(!f.matches(Status::InNetwork.bits()));
        assert!(!f.matches(Status::Success.bits()));
    }

    #[test]
    fn failed_selects_error_terminals() {
        let f = StateFilter::failed();
        assert!(f.matches(Status::SendFailed.bits()));
        assert!(f.matches(Status::Reverted.bits()));
        assert!(!f.matches(Status::Success.bits()));
        assert!(!f.matches(Status::Deferred.bits()));
    }

    #[test]
    fn pending_covers_pending_and_queued() {
        let f = StateFilter::pending();
        assert!(f.matches(Status::Pending.bits()));
        assert!(f.matches(Status::Queued.bits()));
        assert!(!f.matches(Status::Deferred.bits()));
        assert!(!f.matches(Status::InNetwork.bits()));
    }

    #[test]
    fn in_flight_includes_reserved() {
        let f = StateFilter::in_flight();
        assert!(f.matches(Status::Reserved.bits()));
        assert!(f.matches(Status::InNetwork.bits()));
        assert!(!f.matches(Status::SendFailed.bits()));
    }

    #[test]
    fn status_names_parse() {
        assert_eq!("in-network".parse::<Status>().unwrap(), Status::InNetwork);
        assert_eq!("SEND_FAILED".parse::<Status>().unwrap(), Status::SendFailed);
        assert!("sideways".parse::<Status>().is_err());
    }
}
