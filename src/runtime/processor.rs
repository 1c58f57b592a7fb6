use std::fs;
use std::path::Path;

use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::{Array3, Array4, ArrayView2, Axis};
use serde::Deserialize;

use super::vocab::{BpeVocab, CharVocab, WordPieceVocab};
use super::{Decoded, HeadLogits, PixelBatch, TextProcessor};
use crate::error::RecognitionError;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ImageSize {
    pub height: u32,
    pub width: u32,
}

/// The subset of `preprocessor_config.json` the MGP-STR image processor honours.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PreprocessorConfig {
    pub do_resize: bool,
    pub size: ImageSize,
    pub do_rescale: bool,
    pub rescale_factor: f32,
    pub do_normalize: bool,
    pub image_mean: [f32; 3],
    pub image_std: [f32; 3],
}

impl Default for PreprocessorConfig {
    fn default() -> Self {
        Self {
            do_resize: true,
            size: ImageSize {
                height: 32,
                width: 128,
            },
            do_rescale: true,
            rescale_factor: 1.0 / 255.0,
            do_normalize: true,
            image_mean: [0.5; 3],
            image_std: [0.5; 3],
        }
    }
}

impl PreprocessorConfig {
    pub fn from_file(path: &Path) -> Result<Self, RecognitionError> {
        let data = fs::read_to_string(path)
            .map_err(|e| RecognitionError::Preprocess(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&data)
            .map_err(|e| RecognitionError::Preprocess(format!("{}: {e}", path.display())))
    }
}

/// Image processor and three-head decoder for MGP-STR.
#[derive(Debug, Clone)]
pub struct MgpstrProcessor {
    config: PreprocessorConfig,
    char_vocab: CharVocab,
    bpe_vocab: Option<BpeVocab>,
    wp_vocab: Option<WordPieceVocab>,
}

impl MgpstrProcessor {
    pub fn new(
        config: PreprocessorConfig,
        char_vocab: CharVocab,
        bpe_vocab: Option<BpeVocab>,
        wp_vocab: Option<WordPieceVocab>,
    ) -> Self {
        Self {
            config,
            char_vocab,
            bpe_vocab,
            wp_vocab,
        }
    }
}

impl TextProcessor for MgpstrProcessor {
    fn preprocess(&self, image: &DynamicImage) -> Result<PixelBatch, RecognitionError> {
        let cfg = &self.config;
        if image.width() == 0 || image.height() == 0 {
            return Err(RecognitionError::Preprocess("image is empty".into()));
        }

        let rgb = if cfg.do_resize {
            image
                .resize_exact(cfg.size.width, cfg.size.height, FilterType::CatmullRom)
                .to_rgb8()
        } else {
            image.to_rgb8()
        };
        let (width, height) = rgb.dimensions();

        let scale = if cfg.do_rescale { cfg.rescale_factor } else { 1.0 };
        let mut input = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
        for (x, y, pixel) in rgb.enumerate_pixels() {
            for c in 0..3 {
                let mut value = pixel.0[c] as f32 * scale;
                if cfg.do_normalize {
                    value = (value - cfg.image_mean[c]) / cfg.image_std[c];
                }
                input[[0, c, y as usize, x as usize]] = value;
            }
        }
        Ok(PixelBatch(input))
    }

    fn batch_decode(&self, logits: &HeadLogits) -> Result<Vec<Decoded>, RecognitionError> {
        let char_heads = decode_head(&logits.char, self.char_vocab.eos(), |ids| {
            self.char_vocab.decode(ids)
        })?;

        let bpe_heads = match (&logits.bpe, &self.bpe_vocab) {
            (Some(l), Some(vocab)) => Some(decode_head(l, vocab.eos(), |ids| vocab.decode(ids))?),
            _ => None,
        };
        let wp_heads = match (&logits.wp, &self.wp_vocab) {
            (Some(l), Some(vocab)) => Some(decode_head(l, vocab.eos(), |ids| vocab.decode(ids))?),
            _ => None,
        };

        let mut decoded = Vec::with_capacity(char_heads.len());
        for (i, best) in char_heads.into_iter().enumerate() {
            let mut best = best;
            for other in [&bpe_heads, &wp_heads].into_iter().flatten() {
                if let Some(candidate) = other.get(i) {
                    if candidate.score > best.score {
                        best = candidate.clone();
                    }
                }
            }
            log::debug!("Batch item {i}: '{}' (score {:.3})", best.text, best.score);
            decoded.push(best);
        }
        Ok(decoded)
    }
}

/// Greedy decode of one head: skip the start step, stop at `eos`, score by the
/// product of the per-step max probabilities (eos step included). A head that
/// never reaches `eos` scores 0.
fn decode_head<F>(
    logits: &Array3<f32>,
    eos: usize,
    decode: F,
) -> Result<Vec<Decoded>, RecognitionError>
where
    F: Fn(&[usize]) -> String,
{
    if logits.shape()[2] == 0 {
        return Err(RecognitionError::Decode("logits have an empty vocabulary axis".into()));
    }

    let mut out = Vec::with_capacity(logits.shape()[0]);
    for item in logits.axis_iter(Axis(0)) {
        let (ids, probs, terminated) = greedy_steps(item, eos);
        let score = if terminated { probs.iter().product() } else { 0.0 };
        out.push(Decoded {
            text: decode(&ids),
            score,
        });
    }
    Ok(out)
}

/// Ids before `eos`, the probabilities up to and including it, and whether `eos` was seen.
fn greedy_steps(item: ArrayView2<'_, f32>, eos: usize) -> (Vec<usize>, Vec<f32>, bool) {
    let mut ids = Vec::new();
    let mut probs = Vec::new();
    for step in item.axis_iter(Axis(0)).skip(1) {
        let (index, prob) = max_softmax(step.iter().copied());
        probs.push(prob);
        if index == eos {
            return (ids, probs, true);
        }
        ids.push(index);
    }
    (ids, probs, false)
}

/// Index and softmax probability of the largest logit.
fn max_softmax(values: impl Iterator<Item = f32> + Clone) -> (usize, f32) {
    let (index, max) = values
        .clone()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, v)| if v > best.1 { (i, v) } else { best });
    let denom: f32 = values.map(|v| (v - max).exp()).sum();
    (index, 1.0 / denom)
}
