use super::alphabet::pattern_for;
use super::timing::TimingParameters;

/// A keyed element placed on the playback timeline, in seconds from the
/// start of the message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyedTone {
    pub offset: f64,
    pub duration: f64,
}

/// Timeline of tones for one message. Gaps are implicit in the offsets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MorseSchedule {
    pub tones: Vec<KeyedTone>,
    /// End of the last tone
    pub duration: f64,
}

impl MorseSchedule {
    /// Lay out `text` against `timing`. Text is uppercased, characters with
    /// no Morse pattern are skipped and whitespace separates words.
    pub fn build(text: &str, timing: &TimingParameters) -> Self {
        let mut tones = Vec::new();
        let mut cursor = 0.0_f64;
        let mut pending_gap: Option<f64> = None;

        for word in text.split_whitespace() {
            let mut word_started = false;
            for ch in word.chars() {
                let Some(pattern) = pattern_for(ch) else {
                    continue;
                };

                if let Some(gap) = pending_gap.take() {
                    cursor += gap;
                } else if word_started {
                    cursor += timing.inter_char_gap;
                }

                for (idx, element) in pattern.chars().enumerate() {
                    if idx > 0 {
                        cursor += timing.intra_char_gap;
                    }
                    let duration = if element == '-' { timing.dash } else { timing.dot };
                    tones.push(KeyedTone {
                        offset: cursor,
                        duration,
                    });
                    cursor += duration;
                }
                word_started = true;
            }

            // Only words that produced a tone earn a word gap before the next one
            if word_started {
                pending_gap = Some(timing.inter_word_gap);
            }
        }

        Self {
            tones,
            duration: cursor,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tones.is_empty()
    }
}
