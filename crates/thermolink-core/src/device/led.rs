//! Indicator LED driven by a PWM channel.
//!
//! [`Led::tick`] must be called at [`TICK_RATE_HZ`]. Between actions the
//! LED glows at a dim idle level; `blink` flashes it bright for one tick and
//! `strobe` alternates bright and off for a short run. Requests made while
//! an action is still running are dropped.

use embedded_hal::pwm::SetDutyCycle;
use log::{info, warn};

pub const TICK_RATE_HZ: u32 = 10;

/// Number of ticks a strobe lasts.
const STROBE_TICKS: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    BlinkBegin,
    BlinkEnd,
    /// Ticks left in the strobe
    Strobe(u8),
}

pub struct Led<P> {
    pwm: P,
    state: State,
}

impl<P: SetDutyCycle> Led<P> {
    pub fn new(pwm: P) -> Self {
        let mut led = Self {
            pwm,
            state: State::Idle,
        };
        led.set_normal();
        led
    }

    /// Flashes the LED bright for one tick.
    pub fn blink(&mut self) {
        if self.state == State::Idle {
            info!("LED blink");
            self.state = State::BlinkBegin;
        }
    }

    /// Flashes the LED on and off for one second.
    pub fn strobe(&mut self) {
        if self.state == State::Idle {
            info!("LED strobe");
            self.state = State::Strobe(STROBE_TICKS);
        }
    }

    pub fn is_busy(&self) -> bool {
        self.state != State::Idle
    }

    /// Advances the state machine by one tick.
    pub fn tick(&mut self) {
        match self.state {
            State::Idle => self.set_normal(),
            State::BlinkBegin => {
                self.set_bright();
                self.state = State::BlinkEnd;
            }
            State::BlinkEnd => {
                self.set_normal();
                self.state = State::Idle;
            }
            State::Strobe(0) => {
                self.set_normal();
                self.state = State::Idle;
            }
            State::Strobe(remaining) => {
                if remaining % 2 == 0 {
                    self.set_bright();
                } else {
                    self.set_off();
                }
                self.state = State::Strobe(remaining - 1);
            }
        }
    }

    pub fn release(self) -> P {
        self.pwm
    }

    fn set_normal(&mut self) {
        // One eighth of full scale
        self.apply(self.pwm.max_duty_cycle() / 8);
    }

    fn set_bright(&mut self) {
        self.apply(self.pwm.max_duty_cycle());
    }

    fn set_off(&mut self) {
        self.apply(0);
    }

    fn apply(&mut self, duty: u16) {
        if let Err(e) = self.pwm.set_duty_cycle(duty) {
            warn!("LED duty cycle update failed: {:?}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPwm;

    const NORMAL: u16 = MockPwm::MAX_DUTY / 8;
    const BRIGHT: u16 = MockPwm::MAX_DUTY;

    #[test]
    fn test_idle_is_dim() {
        let mut led = Led::new(MockPwm::default());
        led.tick();
        assert_eq!(led.release().history, [NORMAL, NORMAL]);
    }

    #[test]
    fn test_blink_lasts_one_tick() {
        let mut led = Led::new(MockPwm::default());
        led.blink();
        assert!(led.is_busy());
        led.tick();
        led.tick();
        assert!(!led.is_busy());
        led.tick();
        assert_eq!(led.release().history, [NORMAL, BRIGHT, NORMAL, NORMAL]);
    }

    #[test]
    fn test_requests_while_busy_are_dropped() {
        let mut led = Led::new(MockPwm::default());
        led.blink();
        led.strobe();
        led.blink();
        led.tick();
        led.tick();
        assert!(!led.is_busy());
        assert_eq!(led.release().history.iter().filter(|&&duty| duty == BRIGHT).count(), 1);
    }

    #[test]
    fn test_strobe_alternates_then_idles() {
        let mut led = Led::new(MockPwm::default());
        led.strobe();
        for _ in 0..=STROBE_TICKS {
            led.tick();
        }
        assert!(!led.is_busy());

        let pwm = led.release();
        assert_eq!(&pwm.history[1..5], &[BRIGHT, 0, BRIGHT, 0]);
        assert_eq!(pwm.history.iter().filter(|&&duty| duty == BRIGHT).count(), 5);
        assert_eq!(pwm.duty(), Some(NORMAL));
    }
}
