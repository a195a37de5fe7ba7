//! Decides whether startup may be interrupted by the notification
//! permission prompt.

use anyhow::Result;
use chrono::Utc;
use tracing::debug;

use spotlog_store::Store;

/// Minimum elapsed time before the prompt may be shown again: 3 days.
pub const PROMPT_COOLDOWN_SECS: i64 = 259_200;

#[derive(Clone)]
pub struct PermissionGate {
    store: Store,
}

impl PermissionGate {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn should_prompt(&self) -> Result<bool> {
        self.should_prompt_at(Utc::now().timestamp())
    }

    /// Cooldown boundary is inclusive: exactly at three days elapsed the
    /// prompt is allowed again.
    pub fn should_prompt_at(&self, now_unix: i64) -> Result<bool> {
        if self.store.perms_accepted()? {
            return Ok(false);
        }
        if self.store.perms_denied()? {
            return Ok(false);
        }
        if let Some(last) = self.store.last_perm_request()? {
            if now_unix - last < PROMPT_COOLDOWN_SECS {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// The user dismissed the prompt without deciding: stamp the cooldown
    /// only.
    pub fn record_skipped(&self) -> Result<()> {
        self.record_skipped_at(Utc::now().timestamp())
    }

    pub fn record_skipped_at(&self, now_unix: i64) -> Result<()> {
        debug!("permission prompt skipped");
        self.store.set_last_perm_request(now_unix)
    }

    /// A real decision: denial is sticky, the prompt never comes back.
    pub fn record_decision(&self, accepted: bool) -> Result<()> {
        debug!(accepted, "permission decision recorded");
        self.store.set_perms_accepted(accepted)?;
        if !accepted {
            self.store.set_perms_denied(true)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn gate() -> (PermissionGate, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        (PermissionGate::new(store), dir)
    }

    #[test]
    fn prompts_when_no_history_exists() {
        let (gate, _dir) = gate();
        assert!(gate.should_prompt_at(1_000_000).unwrap());
    }

    #[test]
    fn cooldown_suppresses_until_exactly_three_days() {
        let (gate, _dir) = gate();
        let shown_at = 1_000_000;
        gate.record_skipped_at(shown_at).unwrap();

        assert!(!gate.should_prompt_at(shown_at).unwrap());
        assert!(!gate.should_prompt_at(shown_at + 1).unwrap());
        assert!(!gate
            .should_prompt_at(shown_at + PROMPT_COOLDOWN_SECS - 1)
            .unwrap());
        assert!(gate
            .should_prompt_at(shown_at + PROMPT_COOLDOWN_SECS)
            .unwrap());
        assert!(gate
            .should_prompt_at(shown_at + PROMPT_COOLDOWN_SECS + 1)
            .unwrap());
    }

    #[test]
    fn acceptance_stops_prompting() {
        let (gate, _dir) = gate();
        gate.record_decision(true).unwrap();
        assert!(!gate.should_prompt_at(i64::MAX / 2).unwrap());
    }

    #[test]
    fn denial_is_sticky_forever() {
        let (gate, _dir) = gate();
        gate.record_decision(false).unwrap();
        assert!(!gate.should_prompt_at(0).unwrap());
        assert!(!gate.should_prompt_at(i64::MAX / 2).unwrap());
    }

    #[test]
    fn skip_does_not_touch_decision_flags() {
        let (gate, _dir) = gate();
        gate.record_skipped_at(500).unwrap();
        // After the cooldown the prompt returns; a skip is not a denial.
        assert!(gate.should_prompt_at(500 + PROMPT_COOLDOWN_SECS).unwrap());
    }
}
