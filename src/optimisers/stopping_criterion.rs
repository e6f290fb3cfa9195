use std::num::NonZeroUsize;

/// Decides when the round driver stops, based on the log-likelihood after each
/// completed round.
#[derive(Debug, Clone)]
pub enum StoppingCriterion {
    /// Stop after a fixed number of rounds.
    FixedIter(NonZeroUsize),
    /// Stop once `rounds` consecutive rounds each improved the log-likelihood
    /// by no more than `epsilon`.
    Stagnation { epsilon: f64, rounds: NonZeroUsize },
    /// Stop as soon as any of the criteria says so.
    Any(Vec<StoppingCriterion>),
    /// Called with the number of completed rounds and the improvement of the
    /// last one, returns true to stop.
    Custom(fn(usize, f64) -> bool),
}

impl Default for StoppingCriterion {
    fn default() -> Self {
        StoppingCriterion::Stagnation {
            epsilon: 1e-3,
            rounds: NonZeroUsize::MIN,
        }
    }
}

impl StoppingCriterion {
    /// `history` holds the initial log-likelihood followed by the
    /// log-likelihood after every completed round.
    pub fn should_stop(&self, history: &[f64]) -> bool {
        let completed = history.len().saturating_sub(1);
        match self {
            StoppingCriterion::FixedIter(n) => completed >= n.get(),
            StoppingCriterion::Stagnation { epsilon, rounds } => {
                completed >= rounds.get()
                    && history
                        .windows(2)
                        .rev()
                        .take(rounds.get())
                        .all(|w| w[1] - w[0] <= *epsilon)
            }
            StoppingCriterion::Any(criteria) => criteria.iter().any(|c| c.should_stop(history)),
            StoppingCriterion::Custom(f) => match history {
                [.., prev, last] => f(completed, last - prev),
                _ => f(completed, f64::INFINITY),
            },
        }
    }
}
