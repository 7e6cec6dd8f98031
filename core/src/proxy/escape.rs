//! Double-ESC detection.
//!
//! A pure state machine over the stdin byte stream. The reactor feeds it one
//! byte at a time plus a monotonic clock, and arms a timer at whatever
//! [`EscapeDetector::deadline`] reports. No I/O happens here, which keeps the
//! timing behavior testable without sleeping.
//!
//! A single ESC is held back for up to 300ms: if nothing follows it is
//! forwarded to the shell, so lone ESC presses (and ESC-prefixed sequences
//! like arrow keys, which arrive in the same read) behave normally. A second
//! ESC opens a 200ms shortcut window: a bound key expands to its prompt,
//! silence toggles AI mode with no prompt, and anything else forwards the
//! whole run of bytes untouched.

use crate::config::ShortcutBinding;
use std::time::{Duration, Instant};

const ESC: u8 = 0x1b;
const ESC_WINDOW: Duration = Duration::from_millis(300);
const SHORTCUT_WINDOW: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq)]
pub enum EscapeAction {
    /// Bytes to pass through to the PTY.
    Forward(Vec<u8>),
    /// Toggle into AI mode, optionally with a shortcut-expanded prompt.
    EnterAi { prompt: Option<String> },
}

#[derive(Debug, Clone, Copy)]
enum State {
    Idle,
    EscPending { deadline: Instant },
    ShortcutWindow { deadline: Instant },
}

pub struct EscapeDetector {
    state: State,
    bindings: Vec<ShortcutBinding>,
}

impl EscapeDetector {
    pub fn new(bindings: Vec<ShortcutBinding>) -> Self {
        EscapeDetector {
            state: State::Idle,
            bindings,
        }
    }

    /// The instant the reactor should next call [`on_timeout`], if any.
    ///
    /// [`on_timeout`]: EscapeDetector::on_timeout
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            State::Idle => None,
            State::EscPending { deadline } | State::ShortcutWindow { deadline } => Some(deadline),
        }
    }

    /// Process one input byte.
    pub fn on_byte(&mut self, byte: u8, now: Instant) -> Vec<EscapeAction> {
        match self.state {
            State::Idle => {
                if byte == ESC {
                    self.state = State::EscPending {
                        deadline: now + ESC_WINDOW,
                    };
                    Vec::new()
                } else {
                    vec![EscapeAction::Forward(vec![byte])]
                }
            }
            State::EscPending { deadline } => {
                if now >= deadline {
                    // Timer lost the race with this byte: release the held
                    // ESC, then handle the byte from scratch.
                    self.state = State::Idle;
                    let mut actions = vec![EscapeAction::Forward(vec![ESC])];
                    actions.extend(self.on_byte(byte, now));
                    return actions;
                }
                if byte == ESC {
                    self.state = State::ShortcutWindow {
                        deadline: now + SHORTCUT_WINDOW,
                    };
                    Vec::new()
                } else {
                    // ESC followed by another byte is a normal escape
                    // sequence (arrows, alt-chords). Forward it intact.
                    self.state = State::Idle;
                    vec![EscapeAction::Forward(vec![ESC, byte])]
                }
            }
            State::ShortcutWindow { deadline } => {
                self.state = State::Idle;
                if now >= deadline {
                    // The toggle already happened at the deadline; the late
                    // byte belongs to whatever mode comes next and the
                    // reactor re-routes it there.
                    let mut actions = vec![EscapeAction::EnterAi { prompt: None }];
                    actions.extend(self.on_byte(byte, now));
                    return actions;
                }
                if let Some(binding) = self.bindings.iter().find(|b| b.key == byte) {
                    vec![EscapeAction::EnterAi {
                        prompt: Some(binding.prompt.clone()),
                    }]
                } else {
                    vec![EscapeAction::Forward(vec![ESC, ESC, byte])]
                }
            }
        }
    }

    /// The armed deadline fired.
    pub fn on_timeout(&mut self, _now: Instant) -> Option<EscapeAction> {
        match self.state {
            State::Idle => None,
            State::EscPending { .. } => {
                self.state = State::Idle;
                Some(EscapeAction::Forward(vec![ESC]))
            }
            State::ShortcutWindow { .. } => {
                self.state = State::Idle;
                Some(EscapeAction::EnterAi { prompt: None })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_shortcuts;

    fn detector() -> EscapeDetector {
        EscapeDetector::new(default_shortcuts())
    }

    #[test]
    fn test_plain_bytes_forward_immediately() {
        let mut d = detector();
        let now = Instant::now();
        assert_eq!(
            d.on_byte(b'l', now),
            vec![EscapeAction::Forward(vec![b'l'])]
        );
        assert_eq!(
            d.on_byte(b's', now),
            vec![EscapeAction::Forward(vec![b's'])]
        );
    }

    #[test]
    fn test_lone_esc_forwarded_on_timeout() {
        let mut d = detector();
        let now = Instant::now();
        assert!(d.on_byte(ESC, now).is_empty());
        assert!(d.deadline().is_some());
        assert_eq!(
            d.on_timeout(now + ESC_WINDOW),
            Some(EscapeAction::Forward(vec![ESC]))
        );
        assert!(d.deadline().is_none());
    }

    #[test]
    fn test_arrow_key_sequence_passes_through() {
        let mut d = detector();
        let now = Instant::now();
        assert!(d.on_byte(ESC, now).is_empty());
        assert_eq!(
            d.on_byte(b'[', now + Duration::from_millis(1)),
            vec![EscapeAction::Forward(vec![ESC, b'['])]
        );
        assert_eq!(
            d.on_byte(b'A', now + Duration::from_millis(2)),
            vec![EscapeAction::Forward(vec![b'A'])]
        );
    }

    #[test]
    fn test_double_esc_then_silence_toggles() {
        let mut d = detector();
        let now = Instant::now();
        assert!(d.on_byte(ESC, now).is_empty());
        assert!(d.on_byte(ESC, now + Duration::from_millis(50)).is_empty());
        assert_eq!(
            d.on_timeout(now + Duration::from_millis(250)),
            Some(EscapeAction::EnterAi { prompt: None })
        );
    }

    #[test]
    fn test_shortcut_key_expands_to_prompt() {
        let mut d = detector();
        let now = Instant::now();
        d.on_byte(ESC, now);
        d.on_byte(ESC, now + Duration::from_millis(10));
        let actions = d.on_byte(b'f', now + Duration::from_millis(20));
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            EscapeAction::EnterAi {
                prompt: Some(prompt),
            } => assert!(prompt.contains("fix")),
            other => panic!("unexpected action: {:?}", other),
        }
    }

    #[test]
    fn test_unbound_key_in_window_forwards_everything() {
        let mut d = detector();
        let now = Instant::now();
        d.on_byte(ESC, now);
        d.on_byte(ESC, now + Duration::from_millis(10));
        assert_eq!(
            d.on_byte(b'z', now + Duration::from_millis(20)),
            vec![EscapeAction::Forward(vec![ESC, ESC, b'z'])]
        );
    }

    #[test]
    fn test_slow_second_esc_starts_new_window() {
        let mut d = detector();
        let now = Instant::now();
        d.on_byte(ESC, now);
        // First window already expired when the second ESC arrives.
        let actions = d.on_byte(ESC, now + Duration::from_millis(400));
        assert_eq!(actions, vec![EscapeAction::Forward(vec![ESC])]);
        // The second ESC opened a fresh pending window.
        assert!(d.deadline().is_some());
        assert_eq!(
            d.on_timeout(now + Duration::from_millis(700)),
            Some(EscapeAction::Forward(vec![ESC]))
        );
    }

    #[test]
    fn test_timeout_in_idle_is_noop() {
        let mut d = detector();
        assert_eq!(d.on_timeout(Instant::now()), None);
    }
}
