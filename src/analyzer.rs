use crate::config::AudioConfig;
use crate::file_reader::DecodedAudio;
use spectrum_analyzer::scaling::divide_by_N;
use spectrum_analyzer::windows::hann_window;
use spectrum_analyzer::{FrequencyLimit, samples_fft_to_spectrum};

const RMS_FULL_SCALE: f32 = 128.0;

pub fn intensity_from_bins(bins: &[u8]) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }
    let sum: f32 = bins.iter().map(|&b| (b as f32) * (b as f32)).sum();
    let rms = (sum / bins.len() as f32).sqrt();
    (rms / RMS_FULL_SCALE).clamp(0.0, 1.0)
}

pub struct Analyzer {
    fft_size: usize,
    smoothing: f32,
    min_db: f32,
    max_db: f32,
    smoothed: Vec<f32>,
    window: Vec<f32>,
    bins: Vec<u8>,
}

impl Analyzer {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            fft_size: config.fft_size,
            smoothing: config.smoothing,
            min_db: config.min_decibels,
            max_db: config.max_decibels,
            smoothed: Vec::new(),
            window: vec![0.0; config.fft_size],
            bins: Vec::new(),
        }
    }

    pub fn clear(&mut self) {
        self.smoothed.clear();
        self.bins.clear();
    }

    pub fn bins(&self) -> &[u8] {
        &self.bins
    }

    pub fn analyze(&mut self, audio: &DecodedAudio, elapsed: f64) -> f32 {
        let end = audio.frame_at(elapsed);
        let start = end as isize - self.fft_size as isize;
        for (i, slot) in self.window.iter_mut().enumerate() {
            let frame = start + i as isize;
            *slot = if frame < 0 { 0.0 } else { audio.mono(frame as usize) };
        }
        self.analyze_window(audio.sample_rate())
    }

    // Analyse raw mono samples; `samples.len()` must equal the FFT size.
    pub fn analyze_samples(&mut self, samples: &[f32], sample_rate: u32) -> f32 {
        let n = self.fft_size.min(samples.len());
        self.window.iter_mut().for_each(|s| *s = 0.0);
        self.window[..n].copy_from_slice(&samples[..n]);
        self.analyze_window(sample_rate)
    }

    fn analyze_window(&mut self, sample_rate: u32) -> f32 {
        let windowed = hann_window(&self.window);
        let spectrum = match samples_fft_to_spectrum(
            &windowed,
            sample_rate,
            FrequencyLimit::All,
            Some(&divide_by_N),
        ) {
            Ok(spectrum) => spectrum,
            Err(err) => {
                tracing::warn!("spectrum analysis failed: {err:?}");
                self.bins.clear();
                return 0.0;
            }
        };

        let data = spectrum.data();
        if self.smoothed.len() != data.len() {
            self.smoothed = vec![0.0; data.len()];
        }
        let tau = self.smoothing;
        let db_range = self.max_db - self.min_db;
        self.bins.clear();
        for (slot, (_, magnitude)) in self.smoothed.iter_mut().zip(data.iter()) {
            *slot = tau * *slot + (1.0 - tau) * magnitude.val().abs();
            let byte = if *slot > 0.0 {
                let db = 20.0 * slot.log10();
                (255.0 * (db - self.min_db) / db_range).clamp(0.0, 255.0)
            } else {
                0.0
            };
            self.bins.push(byte as u8);
        }
        intensity_from_bins(&self.bins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intensity_bounds() {
        assert_eq!(intensity_from_bins(&[]), 0.0);
        assert_eq!(intensity_from_bins(&[0; 64]), 0.0);
        assert_eq!(intensity_from_bins(&[255; 64]), 1.0);
        assert_eq!(intensity_from_bins(&[64; 64]), 0.5);
    }

    #[test]
    fn silence_is_quiet() {
        let mut analyzer = Analyzer::new(&AudioConfig::default());
        let audio = DecodedAudio::from_samples(vec![0.0; 44100], 44100, 1).unwrap();
        assert_eq!(analyzer.analyze(&audio, 0.5), 0.0);
        assert!(analyzer.bins().iter().all(|&b| b == 0));
    }

    #[test]
    fn noise_is_loud_after_smoothing_settles() {
        let mut rng = fastrand::Rng::with_seed(7);
        let noise: Vec<f32> = (0..2048).map(|_| rng.f32() - 0.5).collect();
        let mut analyzer = Analyzer::new(&AudioConfig::default());
        let mut intensity = 0.0;
        for _ in 0..20 {
            intensity = analyzer.analyze_samples(&noise, 44100);
        }
        assert!(intensity > 0.8, "intensity {intensity}");
        assert!(intensity <= 1.0);
    }

    #[test]
    fn window_before_track_start_is_zero_padded() {
        let mut analyzer = Analyzer::new(&AudioConfig::default());
        let audio = DecodedAudio::from_samples(vec![0.0; 100], 44100, 1).unwrap();
        // Only 100 frames exist; the rest of the window is padding.
        assert_eq!(analyzer.analyze(&audio, 1.0), 0.0);
    }
}
