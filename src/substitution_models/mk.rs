use std::fmt::Display;

use anyhow::{bail, ensure};

use crate::substitution_models::{make_freqs, reversible_q, FreqVector, QMatrix, QMatrixMaker, SubstMatrix};
use crate::Result;

/// Equal-input model on `n` states: all exchangeabilities are 1 and only the
/// equilibrium frequencies vary. With uniform frequencies this is the Mk
/// model for discrete characters.
#[derive(Clone, Debug, PartialEq)]
pub struct Mk {
    freqs: FreqVector,
    q: SubstMatrix,
}

impl Mk {
    pub fn with_states(n: usize) -> Result<Self> {
        if !(2..u8::MAX as usize).contains(&n) {
            bail!("Mk needs between 2 and {} states, got {}.", u8::MAX - 1, n);
        }
        Self::create(&vec![1.0 / n as f64; n], &[])
    }
}

impl QMatrixMaker for Mk {
    /// The number of states is taken from the frequencies.
    fn create(freqs: &[f64], params: &[f64]) -> Result<Self> {
        if freqs.len() < 2 {
            bail!("Mk needs the frequencies of at least two states to know the state count.");
        }
        ensure!(params.is_empty(), "Mk has no free parameters, got {:?}.", params);
        let freqs = make_freqs(freqs, freqs.len())?;
        let q = Self::make_q(&freqs);
        Ok(Mk { freqs, q })
    }
}

impl Mk {
    fn make_q(freqs: &FreqVector) -> SubstMatrix {
        let n = freqs.len();
        reversible_q(freqs, &vec![1.0; n * (n - 1) / 2])
    }
}

impl QMatrix for Mk {
    fn n(&self) -> usize {
        self.freqs.len()
    }

    fn q(&self) -> &SubstMatrix {
        &self.q
    }

    fn freqs(&self) -> &FreqVector {
        &self.freqs
    }

    fn fixed_freqs(&self) -> bool {
        false
    }

    fn set_freqs(&mut self, freqs: FreqVector) -> Result<()> {
        let freqs = make_freqs(freqs.as_slice(), self.n())?;
        self.q = Self::make_q(&freqs);
        self.freqs = freqs;
        Ok(())
    }

    fn params(&self) -> &[f64] {
        &[]
    }

    fn set_param(&mut self, param: usize, _value: f64) -> Result<()> {
        bail!("Mk has no parameter {}.", param)
    }
}

impl Display for Mk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Mk{} pi={:?}", self.n(), self.freqs.as_slice())
    }
}
