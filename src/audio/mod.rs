use std::io::{self, Write};

const SHAKE_FREQUENCIES: [f32; 4] = [200.0, 250.0, 300.0, 350.0];
const TONE_DURATION: f32 = 0.1;
const TONE_ATTACK: f32 = 0.01;
const TONE_PEAK: f32 = 0.1;
const TONE_TAIL: f32 = 0.01;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cue {
    Shake,
    /// Strong sensor shakes.
    LoudShake,
}

/// One sine tone with a linear attack and exponential release.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tone {
    pub frequency_hz: f32,
    pub start_s: f32,
    pub duration_s: f32,
    pub attack_s: f32,
    pub peak_gain: f32,
    pub tail_gain: f32,
}

impl Cue {
    /// Staggered rising tones, each starting halfway through the previous one.
    pub fn tones(self) -> Vec<Tone> {
        let peak = match self {
            Cue::Shake => TONE_PEAK,
            Cue::LoudShake => TONE_PEAK * 2.0,
        };
        SHAKE_FREQUENCIES
            .iter()
            .enumerate()
            .map(|(i, &frequency_hz)| Tone {
                frequency_hz,
                start_s: i as f32 * TONE_DURATION * 0.5,
                duration_s: TONE_DURATION,
                attack_s: TONE_ATTACK,
                peak_gain: peak,
                tail_gain: TONE_TAIL,
            })
            .collect()
    }
}

/// The synthesizer side. Playback failures are the implementor's problem;
/// the engine never waits on a cue.
pub trait SoundCue {
    fn play(&mut self, cue: Cue);
}

/// Terminal stand-in for a synthesizer: logs the tone plan and optionally
/// rings the bell.
#[derive(Debug, Default)]
pub struct TerminalChime {
    bell: bool,
    played: usize,
}

impl TerminalChime {
    pub fn new(bell: bool) -> Self {
        Self { bell, played: 0 }
    }

    #[cfg(test)]
    pub fn played(&self) -> usize {
        self.played
    }
}

impl SoundCue for TerminalChime {
    fn play(&mut self, cue: Cue) {
        self.played += 1;
        let tones = cue.tones();
        log::debug!(
            "cue #{} {:?}: {} tones, {:.2}s",
            self.played,
            cue,
            tones.len(),
            tones.last().map_or(0.0, |t| t.start_s + t.duration_s)
        );
        if self.bell {
            let mut stdout = io::stdout();
            if let Err(err) = stdout.write_all(b"\x07").and_then(|_| stdout.flush()) {
                log::warn!("bell failed: {err}");
            }
        }
    }
}
