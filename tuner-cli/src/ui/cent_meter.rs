//! # Cent Meter
//!
//! Text rendering of the tuning needle: a fixed-width bar spanning -50 to +50
//! cents with the needle at the current deviation.

/// Maximum cent deviation range for the meter display.
const METER_RANGE: f32 = 50.0;

/// Characters between the two ends of the bar.
const METER_WIDTH: usize = 41;

/// How close a needle has to be to count as on target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Green,
    Yellow,
    Red,
}

impl Zone {
    pub fn from_cents(cents: f32) -> Self {
        if cents.abs() < 5.0 {
            Zone::Green
        } else if cents.abs() < 20.0 {
            Zone::Yellow
        } else {
            Zone::Red
        }
    }

    fn ansi_color(self) -> &'static str {
        match self {
            Zone::Green => "\x1b[32m",
            Zone::Yellow => "\x1b[33m",
            Zone::Red => "\x1b[31m",
        }
    }
}

pub struct CentMeter {
    /// Current cent deviation (None if no pitch detected)
    cents: Option<f32>,
}

impl CentMeter {
    pub fn new(cents: Option<f32>) -> Self {
        Self { cents }
    }

    /// Needle column inside the bar, or `None` without a pitch.
    pub fn needle_position(&self) -> Option<usize> {
        self.cents.map(|c| {
            let clamped_cents = c.clamp(-METER_RANGE, METER_RANGE);
            let fraction = (clamped_cents + METER_RANGE) / (2.0 * METER_RANGE);
            (fraction * (METER_WIDTH - 1) as f32).round() as usize
        })
    }

    /// Plain bar, e.g. `[-----|----+-----]`, without color codes.
    pub fn render_plain(&self) -> String {
        let center = METER_WIDTH / 2;
        let needle = self.needle_position();
        let bar: String = (0..METER_WIDTH)
            .map(|i| {
                if Some(i) == needle {
                    '|'
                } else if i == center {
                    '+'
                } else {
                    '-'
                }
            })
            .collect();
        format!("[{bar}]")
    }

    /// Bar with the needle colored by its zone.
    pub fn render(&self) -> String {
        match self.cents {
            Some(c) => {
                let plain = self.render_plain();
                let color = Zone::from_cents(c).ansi_color();
                plain.replacen('|', &format!("{color}|\x1b[0m"), 1)
            }
            None => self.render_plain(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needle_sits_in_the_middle_when_in_tune() {
        let meter = CentMeter::new(Some(0.0));
        assert_eq!(meter.needle_position(), Some(METER_WIDTH / 2));
        assert_eq!(meter.render_plain().matches('|').count(), 1);
        assert!(!meter.render_plain().contains('+'));
    }

    #[test]
    fn needle_is_clamped_to_the_ends() {
        assert_eq!(CentMeter::new(Some(-80.0)).needle_position(), Some(0));
        assert_eq!(CentMeter::new(Some(300.0)).needle_position(), Some(METER_WIDTH - 1));
    }

    #[test]
    fn no_pitch_draws_an_empty_bar() {
        let bar = CentMeter::new(None).render();
        assert!(!bar.contains('|'));
        assert_eq!(bar.len(), METER_WIDTH + 2);
    }

    #[test]
    fn zones() {
        assert_eq!(Zone::from_cents(-3.0), Zone::Green);
        assert_eq!(Zone::from_cents(12.0), Zone::Yellow);
        assert_eq!(Zone::from_cents(-45.0), Zone::Red);
    }
}
