use chrono::{NaiveDate, NaiveDateTime, Timelike};

use crate::config::GestureConfig;

/// Power command the gesture asks the gateway to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureAction {
    PowerOn,
    PowerOff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GesturePhase {
    Idle,
    Counting,
    Cooldown,
}

impl GesturePhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Counting => "COUNTING",
            Self::Cooldown => "COOLDOWN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MuteOutcome {
    /// Arrived inside the cooldown after a power-off; nothing changed.
    Ignored { cooldown_remaining_ms: u64 },
    Counted {
        /// Counter was cleared by the daily reset before this press.
        daily_reset: bool,
        /// Counter value after this press, before any power-off wrap.
        counter: u32,
        actions: Vec<GestureAction>,
    },
}

/// Turns repeated mute presses into power on/off.
///
/// The first press from idle powers on, the press that reaches the hold
/// trigger powers off and starts a cooldown during which mute is ignored.
/// With local time available the counter is cleared once per day at the reset
/// hour so a half-finished gesture does not carry over.
#[derive(Debug, Clone, Default)]
pub struct MuteGesture {
    counter: u32,
    last_reset_date: Option<NaiveDate>,
    last_poweroff_ms: Option<u64>,
}

impl MuteGesture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn last_reset_date(&self) -> Option<NaiveDate> {
        self.last_reset_date
    }

    pub fn cooldown_remaining_ms(&self, now_ms: u64, config: &GestureConfig) -> u64 {
        match self.last_poweroff_ms {
            Some(poweroff_ms) => {
                let elapsed = now_ms.saturating_sub(poweroff_ms);
                config.cooldown_ms.saturating_sub(elapsed)
            }
            None => 0,
        }
    }

    pub fn phase(&self, now_ms: u64, config: &GestureConfig) -> GesturePhase {
        if self.cooldown_remaining_ms(now_ms, config) > 0 {
            GesturePhase::Cooldown
        } else if self.counter == 0 {
            GesturePhase::Idle
        } else {
            GesturePhase::Counting
        }
    }

    pub fn on_mute(
        &mut self,
        now_ms: u64,
        local_now: Option<NaiveDateTime>,
        config: &GestureConfig,
    ) -> MuteOutcome {
        let cooldown_remaining_ms = self.cooldown_remaining_ms(now_ms, config);
        if cooldown_remaining_ms > 0 {
            return MuteOutcome::Ignored {
                cooldown_remaining_ms,
            };
        }

        let daily_reset = local_now
            .map(|local| self.apply_daily_reset(local, config.reset_hour))
            .unwrap_or(false);

        let mut actions = Vec::new();
        if self.counter == 0 {
            actions.push(GestureAction::PowerOn);
        }

        self.counter += 1;
        let counter = self.counter;

        if self.counter >= config.hold_trigger.max(1) {
            actions.push(GestureAction::PowerOff);
            self.counter = 0;
            self.last_poweroff_ms = Some(now_ms);
        }

        MuteOutcome::Counted {
            daily_reset,
            counter,
            actions,
        }
    }

    fn apply_daily_reset(&mut self, local: NaiveDateTime, reset_hour: u32) -> bool {
        let today = local.date();
        if self.last_reset_date != Some(today) && local.hour() >= reset_hour {
            self.counter = 0;
            self.last_reset_date = Some(today);
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn actions(outcome: MuteOutcome) -> Vec<GestureAction> {
        match outcome {
            MuteOutcome::Counted { actions, .. } => actions,
            MuteOutcome::Ignored { .. } => panic!("mute unexpectedly ignored"),
        }
    }

    #[test]
    fn three_presses_power_on_then_off() {
        let config = GestureConfig::default();
        let mut gesture = MuteGesture::new();
        assert_eq!(gesture.phase(0, &config), GesturePhase::Idle);

        assert_eq!(
            actions(gesture.on_mute(20_000, None, &config)),
            vec![GestureAction::PowerOn]
        );
        assert_eq!(gesture.phase(20_000, &config), GesturePhase::Counting);
        assert!(actions(gesture.on_mute(21_000, None, &config)).is_empty());
        assert_eq!(
            actions(gesture.on_mute(22_000, None, &config)),
            vec![GestureAction::PowerOff]
        );

        assert_eq!(gesture.counter(), 0);
        assert_eq!(gesture.phase(22_000, &config), GesturePhase::Cooldown);
    }

    #[test]
    fn first_press_after_boot_is_not_in_cooldown() {
        let config = GestureConfig::default();
        let mut gesture = MuteGesture::new();
        assert_eq!(
            actions(gesture.on_mute(5, None, &config)),
            vec![GestureAction::PowerOn]
        );
    }

    #[test]
    fn mute_inside_cooldown_is_ignored() {
        let config = GestureConfig::default();
        let mut gesture = MuteGesture::new();
        for now in [0, 100, 200] {
            gesture.on_mute(now, None, &config);
        }

        let outcome = gesture.on_mute(10_199, None, &config);
        assert_eq!(
            outcome,
            MuteOutcome::Ignored {
                cooldown_remaining_ms: 1
            }
        );
        assert_eq!(gesture.counter(), 0);

        assert_eq!(
            actions(gesture.on_mute(10_200, None, &config)),
            vec![GestureAction::PowerOn]
        );
        assert_eq!(gesture.counter(), 1);
    }

    #[test]
    fn daily_reset_clears_stale_counter() {
        let config = GestureConfig::default();
        let mut gesture = MuteGesture::new();

        gesture.on_mute(0, Some(at(1, 22)), &config);
        assert_eq!(gesture.last_reset_date(), Some(at(1, 22).date()));
        gesture.on_mute(1_000, Some(at(1, 23)), &config);
        assert_eq!(gesture.counter(), 2);

        let outcome = gesture.on_mute(2_000, Some(at(2, 6)), &config);
        assert_eq!(
            outcome,
            MuteOutcome::Counted {
                daily_reset: true,
                counter: 1,
                actions: vec![GestureAction::PowerOn],
            }
        );
        assert_eq!(gesture.last_reset_date(), Some(at(2, 6).date()));
    }

    #[test]
    fn no_daily_reset_before_reset_hour() {
        let config = GestureConfig::default();
        let mut gesture = MuteGesture::new();

        gesture.on_mute(0, Some(at(1, 22)), &config);
        gesture.on_mute(1_000, Some(at(1, 23)), &config);

        let outcome = gesture.on_mute(2_000, Some(at(2, 4)), &config);
        assert_eq!(
            outcome,
            MuteOutcome::Counted {
                daily_reset: false,
                counter: 3,
                actions: vec![GestureAction::PowerOff],
            }
        );
    }

    #[test]
    fn daily_reset_happens_once_per_day() {
        let config = GestureConfig::default();
        let mut gesture = MuteGesture::new();

        let first = gesture.on_mute(0, Some(at(2, 6)), &config);
        assert!(matches!(
            first,
            MuteOutcome::Counted {
                daily_reset: true,
                ..
            }
        ));

        let second = gesture.on_mute(1_000, Some(at(2, 7)), &config);
        assert!(matches!(
            second,
            MuteOutcome::Counted {
                daily_reset: false,
                counter: 2,
                ..
            }
        ));
    }

    #[test]
    fn hold_trigger_of_one_toggles_in_a_single_press() {
        let config = GestureConfig {
            hold_trigger: 1,
            ..GestureConfig::default()
        };
        let mut gesture = MuteGesture::new();
        assert_eq!(
            actions(gesture.on_mute(0, None, &config)),
            vec![GestureAction::PowerOn, GestureAction::PowerOff]
        );
        assert_eq!(gesture.counter(), 0);
    }
}
