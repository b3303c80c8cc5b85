use serde::Serialize;

/// Empirical 95% interval over `scores`: the sorted values at indices
/// `floor(0.025 * n)` and `floor(0.975 * n)`, no interpolation.
pub fn percentile_interval_95(scores: &[f64]) -> Option<(f64, f64)> {
    if scores.is_empty() {
        return None;
    }

    let mut sorted = scores.to_vec();
    sorted.sort_by(|left, right| left.total_cmp(right));

    let count = sorted.len();
    let last = count - 1;
    let low_index = ((count as f64) * 0.025).floor() as usize;
    let high_index = ((count as f64) * 0.975).floor() as usize;

    Some((sorted[low_index.min(last)], sorted[high_index.min(last)]))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub win: usize,
    pub lose: usize,
    pub tie: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WinRates {
    pub win: f64,
    pub lose: f64,
    pub tie: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Lose,
    Tie,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Win => "win",
            Self::Lose => "lose",
            Self::Tie => "tie",
        }
    }
}

impl Tally {
    /// Records one trial from model2's point of view.
    pub fn record(&mut self, model1_score: f64, model2_score: f64) -> Outcome {
        if model2_score > model1_score {
            self.win += 1;
            Outcome::Win
        } else if model2_score < model1_score {
            self.lose += 1;
            Outcome::Lose
        } else {
            self.tie += 1;
            Outcome::Tie
        }
    }

    pub fn total(&self) -> usize {
        self.win + self.lose + self.tie
    }

    pub fn rates(&self) -> WinRates {
        let total = self.total();
        if total == 0 {
            return WinRates {
                win: 0.0,
                lose: 0.0,
                tie: 0.0,
            };
        }

        let total = total as f64;
        WinRates {
            win: self.win as f64 / total,
            lose: self.lose as f64 / total,
            tie: self.tie as f64 / total,
        }
    }
}
