//! The sabotage catalog and active-sabotage bookkeeping.
//!
//! A lobby has at most one active sabotage. Critical sabotages carry a
//! countdown; if nobody fixes them in time the deceivers win. The race
//! between a fix request and the countdown firing is settled by a
//! generation number: each activation bumps the lobby's sabotage
//! generation, and the expiry timer may only complete the game if the
//! generation it was scheduled for is still the active one.

use std::time::{Duration, Instant};

use greenroom_protocol::{SabotageInfo, SabotageKind};

/// Static policy for one sabotage kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SabotageSpec {
    pub kind: SabotageKind,
    pub critical: bool,
    /// Countdown until the deceivers win. `None` for non-critical kinds.
    pub countdown: Option<Duration>,
}

impl SabotageSpec {
    /// Looks up the policy for a sabotage kind.
    pub fn of(kind: SabotageKind) -> Self {
        match kind {
            SabotageKind::ConfuseLanguage => Self {
                kind,
                critical: false,
                countdown: None,
            },
            SabotageKind::EgyptianDarkness => Self {
                kind,
                critical: true,
                countdown: Some(Duration::from_secs(90)),
            },
            SabotageKind::Famine => Self {
                kind,
                critical: true,
                countdown: Some(Duration::from_secs(60)),
            },
        }
    }
}

/// A sabotage currently in effect in a lobby.
#[derive(Debug, Clone)]
pub struct ActiveSabotage {
    pub kind: SabotageKind,
    pub critical: bool,
    pub activated_at: Instant,
    /// When the countdown fires. `None` for non-critical sabotages, which
    /// persist until fixed.
    pub expires_at: Option<Instant>,
    /// The activation this belongs to. An expiry timer carrying a stale
    /// generation lost the race to a fix and must do nothing.
    pub generation: u64,
}

impl ActiveSabotage {
    pub fn new(spec: SabotageSpec, generation: u64) -> Self {
        let now = Instant::now();
        Self {
            kind: spec.kind,
            critical: spec.critical,
            activated_at: now,
            expires_at: spec.countdown.map(|d| now + d),
            generation,
        }
    }

    /// Whole seconds until the countdown fires, rounded up so the client
    /// never shows 0 while the sabotage is still fixable.
    pub fn expires_in_secs(&self) -> Option<u64> {
        self.expires_at.map(|at| {
            let remaining = at.saturating_duration_since(Instant::now());
            remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)
        })
    }

    /// The wire representation carried inside lobby snapshots.
    pub fn info(&self) -> SabotageInfo {
        SabotageInfo {
            kind: self.kind,
            critical: self.critical,
            expires_in_secs: self.expires_in_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_confuse_language_is_non_critical() {
        let spec = SabotageSpec::of(SabotageKind::ConfuseLanguage);
        assert!(!spec.critical);
        assert!(spec.countdown.is_none());
    }

    #[test]
    fn test_catalog_egyptian_darkness_is_critical_90s() {
        let spec = SabotageSpec::of(SabotageKind::EgyptianDarkness);
        assert!(spec.critical);
        assert_eq!(spec.countdown, Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_catalog_famine_is_critical_60s() {
        let spec = SabotageSpec::of(SabotageKind::Famine);
        assert!(spec.critical);
        assert_eq!(spec.countdown, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_active_non_critical_never_expires() {
        let active = ActiveSabotage::new(
            SabotageSpec::of(SabotageKind::ConfuseLanguage),
            1,
        );
        assert!(active.expires_at.is_none());
        assert!(active.expires_in_secs().is_none());
        assert!(active.info().expires_in_secs.is_none());
    }

    #[test]
    fn test_active_critical_reports_rounded_up_remaining() {
        let active =
            ActiveSabotage::new(SabotageSpec::of(SabotageKind::Famine), 1);
        let secs = active.expires_in_secs().expect("critical has countdown");
        assert!(secs >= 59 && secs <= 60, "got {secs}");
    }

    #[test]
    fn test_info_carries_kind_and_criticality() {
        let active = ActiveSabotage::new(
            SabotageSpec::of(SabotageKind::EgyptianDarkness),
            3,
        );
        let info = active.info();
        assert_eq!(info.kind, SabotageKind::EgyptianDarkness);
        assert!(info.critical);
    }
}
