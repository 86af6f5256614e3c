//! Autoregressive decoding strategies over a next-token logits function.
//!
//! The step function receives the full token prefix (start token included)
//! and returns logits for the next position.

use candle_core::{Device, Tensor};
use candle_transformers::generation::{LogitsProcessor, Sampling};

use crate::models::{GenerationParams, SamplingParams};

/// Fixed so that repeated requests with the same image agree.
const SAMPLING_SEED: u64 = 299_792_458;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SpecialTokens {
    pub start: u32,
    pub eos: u32,
}

/// Tokens to push through the decoder for one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Feed<'a> {
    /// The KV cache must be cleared before feeding.
    pub reset: bool,
    pub start_pos: usize,
    pub tokens: &'a [u32],
}

/// Tracks the prefix already held in a decoder's KV cache.
///
/// A prefix that extends the cached one feeds only its new tokens, so greedy
/// and sampled decoding cost one position per step. Any other prefix (a
/// diverging beam) starts over from an empty cache.
#[derive(Debug, Default)]
pub(crate) struct PrefixCache {
    cached: Vec<u32>,
}

impl PrefixCache {
    pub fn advance<'a>(&mut self, prefix: &'a [u32]) -> Feed<'a> {
        let extends = !self.cached.is_empty()
            && prefix.len() > self.cached.len()
            && prefix.starts_with(&self.cached);

        let feed = if extends {
            Feed {
                reset: false,
                start_pos: self.cached.len(),
                tokens: &prefix[self.cached.len()..],
            }
        } else {
            Feed {
                reset: true,
                start_pos: 0,
                tokens: prefix,
            }
        };
        self.cached.clear();
        self.cached.extend_from_slice(prefix);
        feed
    }
}

/// Runs the strategy `params` selects and returns the generated ids without
/// the start and end tokens.
pub(crate) fn decode<F>(
    step: F,
    tokens: SpecialTokens,
    params: &GenerationParams,
) -> candle_core::Result<Vec<u32>>
where
    F: FnMut(&[u32]) -> candle_core::Result<Vec<f32>>,
{
    let max_length = params.max_length.max(1);
    if let Some(sampling) = params.sampling {
        sample(step, tokens, max_length, sampling)
    } else if params.num_beams <= 1 {
        greedy(step, tokens, max_length)
    } else {
        beam_search(
            step,
            tokens,
            max_length,
            params.num_beams,
            params.early_stopping,
        )
    }
}

pub(crate) fn greedy<F>(
    step: F,
    tokens: SpecialTokens,
    max_length: usize,
) -> candle_core::Result<Vec<u32>>
where
    F: FnMut(&[u32]) -> candle_core::Result<Vec<f32>>,
{
    sequential(step, tokens, max_length, |logits| Ok(argmax(&logits)))
}

pub(crate) fn sample<F>(
    step: F,
    tokens: SpecialTokens,
    max_length: usize,
    params: SamplingParams,
) -> candle_core::Result<Vec<u32>>
where
    F: FnMut(&[u32]) -> candle_core::Result<Vec<f32>>,
{
    let mut processor = LogitsProcessor::from_sampling(
        SAMPLING_SEED,
        Sampling::TopKThenTopP {
            k: params.top_k.max(1),
            p: params.top_p,
            temperature: params.temperature,
        },
    );
    sequential(step, tokens, max_length, |logits| {
        let len = logits.len();
        let logits = Tensor::from_vec(logits, len, &Device::Cpu)?;
        processor.sample(&logits)
    })
}

fn sequential<F, P>(
    mut step: F,
    tokens: SpecialTokens,
    max_length: usize,
    mut pick: P,
) -> candle_core::Result<Vec<u32>>
where
    F: FnMut(&[u32]) -> candle_core::Result<Vec<f32>>,
    P: FnMut(Vec<f32>) -> candle_core::Result<u32>,
{
    let mut sequence = vec![tokens.start];
    while sequence.len() < max_length {
        let next = pick(step(&sequence)?)?;
        if next == tokens.eos {
            break;
        }
        sequence.push(next);
    }
    Ok(sequence.split_off(1))
}

#[derive(Debug, Clone)]
struct Hypothesis {
    tokens: Vec<u32>,
    log_prob: f32,
}

impl Hypothesis {
    /// Log-probability per generated token.
    fn normalized_score(&self) -> f32 {
        let generated = self.tokens.len().saturating_sub(1).max(1);
        self.log_prob / generated as f32
    }
}

pub(crate) fn beam_search<F>(
    mut step: F,
    tokens: SpecialTokens,
    max_length: usize,
    num_beams: usize,
    early_stopping: bool,
) -> candle_core::Result<Vec<u32>>
where
    F: FnMut(&[u32]) -> candle_core::Result<Vec<f32>>,
{
    let mut beams = vec![Hypothesis {
        tokens: vec![tokens.start],
        log_prob: 0.0,
    }];
    let mut finished: Vec<Hypothesis> = Vec::new();

    while !beams.is_empty() {
        if beams[0].tokens.len() >= max_length {
            finished.append(&mut beams);
            break;
        }

        let mut candidates = Vec::with_capacity(beams.len() * num_beams * 2);
        for beam in &beams {
            let log_probs = log_softmax(&step(&beam.tokens)?);
            // Twice the width so eos candidates do not starve live beams.
            for (token, log_prob) in top_k(&log_probs, num_beams * 2) {
                let mut extended = beam.tokens.clone();
                extended.push(token);
                candidates.push(Hypothesis {
                    tokens: extended,
                    log_prob: beam.log_prob + log_prob,
                });
            }
        }
        candidates.sort_by(|a, b| b.log_prob.total_cmp(&a.log_prob));

        let mut next = Vec::with_capacity(num_beams);
        for (rank, candidate) in candidates.into_iter().enumerate() {
            if candidate.tokens.last() == Some(&tokens.eos) {
                if rank < num_beams {
                    finished.push(candidate);
                }
            } else {
                next.push(candidate);
            }
            if next.len() == num_beams {
                break;
            }
        }
        beams = next;

        if early_stopping && finished.len() >= num_beams {
            break;
        }
    }

    let best = finished
        .into_iter()
        .max_by(|a, b| a.normalized_score().total_cmp(&b.normalized_score()));

    Ok(best
        .map(|hypothesis| strip_special(hypothesis.tokens, tokens))
        .unwrap_or_default())
}

fn strip_special(mut sequence: Vec<u32>, tokens: SpecialTokens) -> Vec<u32> {
    if sequence.last() == Some(&tokens.eos) {
        sequence.pop();
    }
    if sequence.first() == Some(&tokens.start) {
        sequence.remove(0);
    }
    sequence
}

fn argmax(logits: &[f32]) -> u32 {
    logits
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(i, _)| i as u32)
        .unwrap_or_default()
}

fn log_softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let sum: f32 = logits.iter().map(|x| (x - max).exp()).sum();
    let log_sum = sum.ln();
    logits.iter().map(|x| x - max - log_sum).collect()
}

/// The `k` best entries, best first.
fn top_k(values: &[f32], k: usize) -> Vec<(u32, f32)> {
    let k = k.min(values.len());
    if k == 0 {
        return Vec::new();
    }
    let mut indices: Vec<usize> = (0..values.len()).collect();
    indices.select_nth_unstable_by(k - 1, |&a, &b| values[b].total_cmp(&values[a]));
    indices.truncate(k);
    indices.sort_by(|&a, &b| values[b].total_cmp(&values[a]));
    indices
        .into_iter()
        .map(|i| (i as u32, values[i]))
        .collect()
}
