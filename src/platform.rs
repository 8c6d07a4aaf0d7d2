//! Platform quirks consumed by the playback core
//!
//! Detection (user agent sniffing, codec probing) belongs to the host; the
//! core only reads the resulting flags and derives its workarounds from them.

use serde::{Deserialize, Serialize};

/// Host platform flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformProfile {
    pub safari: bool,
    pub mac: bool,
    pub ios: bool,
    pub android: bool,
    /// WeChat in-app browser
    pub weixin: bool,
    pub baidu: bool,
    pub quark: bool,
    pub uc: bool,
    /// Media element can decode the alternate (HEVC) codec variant
    pub supports_hevc: bool,
}

impl PlatformProfile {
    /// Desktop Safari loops forever on a rejected unmuted play; force mute and retry once
    pub fn requires_muted_fallback(&self) -> bool {
        self.safari && self.mac
    }

    /// Browsers whose object URLs cannot be played back reliably
    pub fn has_broken_object_urls(&self) -> bool {
        self.baidu || self.quark || self.uc
    }

    /// In-app WebViews that hang the metadata wait when the element is unsubscribed
    pub fn freezes_on_metadata_wait(&self) -> bool {
        self.weixin && self.ios
    }

    /// Media element must survive teardown (reused by the WebView)
    pub fn keeps_media_element(&self) -> bool {
        self.weixin
    }

    /// Needs the "standard renderer" attribute for inline playback
    pub fn needs_standard_renderer(&self) -> bool {
        self.quark || self.uc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_has_no_workarounds() {
        let p = PlatformProfile::default();
        assert!(!p.requires_muted_fallback());
        assert!(!p.has_broken_object_urls());
        assert!(!p.freezes_on_metadata_wait());
        assert!(!p.keeps_media_element());
    }

    #[test]
    fn test_muted_fallback_needs_safari_on_mac() {
        let safari_ios = PlatformProfile { safari: true, ios: true, ..Default::default() };
        assert!(!safari_ios.requires_muted_fallback());
        let safari_mac = PlatformProfile { safari: true, mac: true, ..Default::default() };
        assert!(safari_mac.requires_muted_fallback());
    }

    #[test]
    fn test_object_url_workaround_browsers() {
        for p in [
            PlatformProfile { baidu: true, ..Default::default() },
            PlatformProfile { quark: true, ..Default::default() },
            PlatformProfile { uc: true, ..Default::default() },
        ] {
            assert!(p.has_broken_object_urls());
        }
    }
}
