use rodio::Source;
use std::f32::consts::PI;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44100;

/// Synthesized alarm: a few sine pulses, each with an exponential decay.
/// Finite, mono.
pub struct Chime {
    frequency: f32,
    overtone: f32,
    decay: f32,
    pulse_samples: usize,
    gap_samples: usize,
    pulses: usize,
    num_sample: usize,
}

impl Chime {
    fn new(
        frequency: f32,
        overtone: f32,
        decay: f32,
        pulse: Duration,
        gap: Duration,
        pulses: usize,
    ) -> Self {
        Self {
            frequency,
            overtone,
            decay,
            pulse_samples: samples_in(pulse),
            gap_samples: samples_in(gap),
            pulses,
            num_sample: 0,
        }
    }

    /// Three short, bright beeps.
    pub fn alarm() -> Self {
        Self::new(
            880.0,
            0.0,
            6.0,
            Duration::from_millis(180),
            Duration::from_millis(120),
            3,
        )
    }

    /// One long ring with a fifth on top.
    pub fn bell() -> Self {
        Self::new(
            660.0,
            990.0,
            2.5,
            Duration::from_millis(1400),
            Duration::ZERO,
            1,
        )
    }

    /// Two soft tones.
    pub fn soft() -> Self {
        Self::new(
            523.25,
            784.0,
            4.0,
            Duration::from_millis(500),
            Duration::from_millis(150),
            2,
        )
    }

    pub fn builtin(sound_id: &str) -> Option<Self> {
        match sound_id {
            "alarm1" | "alarm" => Some(Self::alarm()),
            "bell" => Some(Self::bell()),
            "chime" => Some(Self::soft()),
            _ => None,
        }
    }

    fn period(&self) -> usize {
        self.pulse_samples + self.gap_samples
    }

    fn len(&self) -> usize {
        // No trailing gap after the last pulse.
        self.period() * self.pulses - self.gap_samples
    }
}

fn samples_in(duration: Duration) -> usize {
    (duration.as_secs_f64() * f64::from(SAMPLE_RATE)).round() as usize
}

impl Iterator for Chime {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pulses == 0 || self.num_sample >= self.len() {
            return None;
        }

        let offset = self.num_sample % self.period();
        self.num_sample += 1;

        if offset >= self.pulse_samples {
            return Some(0.0);
        }

        let t = offset as f32 / SAMPLE_RATE as f32;
        let envelope = (-self.decay * t).exp();
        let mut sample = (2.0 * PI * self.frequency * t).sin();
        if self.overtone > 0.0 {
            sample = 0.7 * sample + 0.3 * (2.0 * PI * self.overtone * t).sin();
        }

        Some(sample * envelope * 0.4)
    }
}

impl Source for Chime {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.len().saturating_sub(self.num_sample))
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f64(
            self.len() as f64 / f64::from(SAMPLE_RATE),
        ))
    }
}
