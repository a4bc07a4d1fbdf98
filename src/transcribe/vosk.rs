use std::path::Path;

use vosk::{CompleteResult, DecodingState, LogLevel, Model, Recognizer};

use super::{RecognizerFactory, SpeechRecognizer, TimedWord};
use crate::errors::{ArchiveError, Result};

/// Offline recognizer backed by a Vosk/Kaldi model directory.
pub struct VoskFactory {
    model: Model,
}

impl VoskFactory {
    pub fn load(model_dir: &Path) -> Result<Self> {
        vosk::set_log_level(LogLevel::Error);
        let model = Model::new(model_dir.to_string_lossy()).ok_or_else(|| {
            ArchiveError::Transcription(format!("could not load model from {}", model_dir.display()))
        })?;
        Ok(Self { model })
    }
}

impl RecognizerFactory for VoskFactory {
    fn create(&self, sample_rate: u32) -> Result<Box<dyn SpeechRecognizer>> {
        let mut recognizer = Recognizer::new(&self.model, sample_rate as f32)
            .ok_or_else(|| ArchiveError::Transcription("could not create recognizer".to_string()))?;
        recognizer.set_words(true);
        Ok(Box::new(VoskRecognizer { recognizer }))
    }
}

struct VoskRecognizer {
    recognizer: Recognizer,
}

fn words_of(result: CompleteResult<'_>) -> Vec<TimedWord> {
    result
        .single()
        .map(|single| {
            single
                .result
                .iter()
                .map(|w| TimedWord {
                    word: w.word.to_string(),
                    start: f64::from(w.start),
                    end: f64::from(w.end),
                })
                .collect()
        })
        .unwrap_or_default()
}

impl SpeechRecognizer for VoskRecognizer {
    fn accept(&mut self, samples: &[i16]) -> Result<bool> {
        match self.recognizer.accept_waveform(samples) {
            Ok(DecodingState::Finalized) => Ok(true),
            Ok(_) => Ok(false),
            Err(e) => Err(ArchiveError::Transcription(format!("{:?}", e))),
        }
    }

    fn result(&mut self) -> Vec<TimedWord> {
        words_of(self.recognizer.result())
    }

    fn final_result(&mut self) -> Vec<TimedWord> {
        words_of(self.recognizer.final_result())
    }
}
