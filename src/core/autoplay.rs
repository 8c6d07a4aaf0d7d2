//! Autoplay negotiation policy: what to do when `play()` is rejected.

use crate::error::{PlayError, PlayErrorKind};
use crate::platform::PlatformProfile;

/// Recovery plan for a rejected play attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoplayPlan {
    /// Force mute and retry exactly once; a second failure is reported, not fatal
    MutedRetry,
    /// Attach a user-gesture surface that re-attempts play.
    /// `notify_blocked`: report `{NotAllowed, step: Muted}` first so the host can prompt.
    ClickToPlay { notify_blocked: bool },
}

pub fn negotiate(platform: &PlatformProfile, error: &PlayError) -> AutoplayPlan {
    if platform.requires_muted_fallback() {
        return AutoplayPlan::MutedRetry;
    }
    AutoplayPlan::ClickToPlay {
        notify_blocked: error.kind == PlayErrorKind::NotAllowed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safari_mac_retries_muted() {
        let platform = PlatformProfile { safari: true, mac: true, ..Default::default() };
        assert_eq!(negotiate(&platform, &PlayError::not_allowed()), AutoplayPlan::MutedRetry);
        let abort = PlayError::new(PlayErrorKind::Abort, "interrupted");
        assert_eq!(negotiate(&platform, &abort), AutoplayPlan::MutedRetry);
    }

    #[test]
    fn test_policy_block_notifies_host() {
        let plan = negotiate(&PlatformProfile::default(), &PlayError::not_allowed());
        assert_eq!(plan, AutoplayPlan::ClickToPlay { notify_blocked: true });
    }

    #[test]
    fn test_other_rejection_only_installs_click_to_play() {
        let err = PlayError::new(PlayErrorKind::NotSupported, "no decoder");
        let plan = negotiate(&PlatformProfile::default(), &err);
        assert_eq!(plan, AutoplayPlan::ClickToPlay { notify_blocked: false });
    }
}
