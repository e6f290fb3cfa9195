use std::fmt::{Debug, Display};
use std::marker::PhantomData;

use anyhow::ensure;
use log::warn;

use crate::substitution_models::{
    clamp_param, make_freqs, reversible_q, FreqVector, QMatrix, QMatrixMaker, SubstMatrix,
};
use crate::Result;

pub const DNA_N: usize = 4;

/// Exchangeability parametrisation of a nucleotide model.
///
/// Exchangeabilities are given for the upper triangle in TCAG order:
/// `[TC, TA, TG, CA, CG, AG]`.
pub trait DNARates: Clone + Debug + PartialEq {
    const NAME: &'static str;
    const PARAM_NAMES: &'static [&'static str];
    const DEFAULTS: &'static [f64];
    const FIXED_FREQS: bool;
    fn exchangeabilities(params: &[f64]) -> [f64; 6];
}

#[derive(Clone, Debug, PartialEq)]
pub struct JC69Rates;
#[derive(Clone, Debug, PartialEq)]
pub struct K80Rates;
#[derive(Clone, Debug, PartialEq)]
pub struct HKYRates;
#[derive(Clone, Debug, PartialEq)]
pub struct TN93Rates;
#[derive(Clone, Debug, PartialEq)]
pub struct GTRRates;

impl DNARates for JC69Rates {
    const NAME: &'static str = "JC69";
    const PARAM_NAMES: &'static [&'static str] = &[];
    const DEFAULTS: &'static [f64] = &[];
    const FIXED_FREQS: bool = true;
    fn exchangeabilities(_: &[f64]) -> [f64; 6] {
        [1.0; 6]
    }
}

impl DNARates for K80Rates {
    const NAME: &'static str = "K80";
    const PARAM_NAMES: &'static [&'static str] = &["kappa"];
    const DEFAULTS: &'static [f64] = &[2.0];
    const FIXED_FREQS: bool = true;
    fn exchangeabilities(params: &[f64]) -> [f64; 6] {
        let k = params[0];
        [k, 1.0, 1.0, 1.0, 1.0, k]
    }
}

impl DNARates for HKYRates {
    const NAME: &'static str = "HKY";
    const PARAM_NAMES: &'static [&'static str] = &["kappa"];
    const DEFAULTS: &'static [f64] = &[2.0];
    const FIXED_FREQS: bool = false;
    fn exchangeabilities(params: &[f64]) -> [f64; 6] {
        K80Rates::exchangeabilities(params)
    }
}

impl DNARates for TN93Rates {
    const NAME: &'static str = "TN93";
    const PARAM_NAMES: &'static [&'static str] = &["kappa_pyrimidines", "kappa_purines"];
    const DEFAULTS: &'static [f64] = &[2.0, 2.0];
    const FIXED_FREQS: bool = false;
    fn exchangeabilities(params: &[f64]) -> [f64; 6] {
        [params[0], 1.0, 1.0, 1.0, 1.0, params[1]]
    }
}

impl DNARates for GTRRates {
    const NAME: &'static str = "GTR";
    const PARAM_NAMES: &'static [&'static str] = &["r_tc", "r_ta", "r_tg", "r_ca", "r_cg"];
    const DEFAULTS: &'static [f64] = &[1.0; 5];
    const FIXED_FREQS: bool = false;
    fn exchangeabilities(params: &[f64]) -> [f64; 6] {
        [params[0], params[1], params[2], params[3], params[4], 1.0]
    }
}

/// Nucleotide rate matrix with the parametrisation given by `R`.
#[derive(Clone, Debug, PartialEq)]
pub struct DNAModel<R: DNARates> {
    freqs: FreqVector,
    params: Vec<f64>,
    q: SubstMatrix,
    _rates: PhantomData<R>,
}

pub type JC69 = DNAModel<JC69Rates>;
pub type K80 = DNAModel<K80Rates>;
pub type HKY = DNAModel<HKYRates>;
pub type TN93 = DNAModel<TN93Rates>;
pub type GTR = DNAModel<GTRRates>;

impl<R: DNARates> DNAModel<R> {
    fn update_q(&mut self) {
        self.q = reversible_q(&self.freqs, &R::exchangeabilities(&self.params));
    }

    /// Relative exchangeabilities in `[TC, TA, TG, CA, CG, AG]` order.
    pub fn exchangeabilities(&self) -> [f64; 6] {
        R::exchangeabilities(&self.params)
    }

    /// An empty slice gives the defaults. GTR also accepts all six rates,
    /// rescaled so that `r_ag` is 1.
    fn parse_params(params: &[f64]) -> Result<Vec<f64>> {
        let expected = R::DEFAULTS.len();
        if params.is_empty() {
            return Ok(R::DEFAULTS.to_vec());
        }
        if expected == 5 && params.len() == 6 {
            ensure!(params[5] > 0.0, "GTR rate r_ag must be positive, got {}.", params[5]);
            return Ok(params[..5].iter().map(|r| r / params[5]).collect());
        }
        ensure!(
            params.len() == expected,
            "{} expects {} parameter(s) {:?}, got {}.",
            R::NAME,
            expected,
            R::PARAM_NAMES,
            params.len()
        );
        Ok(params.to_vec())
    }
}

impl<R: DNARates> QMatrixMaker for DNAModel<R> {
    fn create(freqs: &[f64], params: &[f64]) -> Result<Self> {
        let freqs = if R::FIXED_FREQS {
            if !freqs.is_empty() {
                warn!("{} has fixed equal frequencies, ignoring {:?}.", R::NAME, freqs);
            }
            make_freqs(&[], DNA_N)?
        } else {
            make_freqs(freqs, DNA_N)?
        };
        let mut model = DNAModel {
            freqs,
            params: Vec::new(),
            q: SubstMatrix::zeros(DNA_N, DNA_N),
            _rates: PhantomData,
        };
        let bounds = (0..R::DEFAULTS.len())
            .map(|i| model.param_bounds(i))
            .collect::<Vec<_>>();
        model.params = Self::parse_params(params)?
            .into_iter()
            .zip(bounds)
            .zip(R::PARAM_NAMES)
            .map(|((p, b), name)| clamp_param(p, b, name))
            .collect();
        model.update_q();
        Ok(model)
    }
}

impl<R: DNARates> QMatrix for DNAModel<R> {
    fn n(&self) -> usize {
        DNA_N
    }

    fn q(&self) -> &SubstMatrix {
        &self.q
    }

    fn freqs(&self) -> &FreqVector {
        &self.freqs
    }

    fn fixed_freqs(&self) -> bool {
        R::FIXED_FREQS
    }

    fn set_freqs(&mut self, freqs: FreqVector) -> Result<()> {
        ensure!(!R::FIXED_FREQS, "{} has fixed equal frequencies.", R::NAME);
        self.freqs = make_freqs(freqs.as_slice(), DNA_N)?;
        self.update_q();
        Ok(())
    }

    fn params(&self) -> &[f64] {
        &self.params
    }

    fn set_param(&mut self, param: usize, value: f64) -> Result<()> {
        ensure!(param < self.params.len(), "{} has no parameter {}.", R::NAME, param);
        self.params[param] = clamp_param(value, self.param_bounds(param), R::PARAM_NAMES[param]);
        self.update_q();
        Ok(())
    }
}

impl<R: DNARates> Display for DNAModel<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", R::NAME)?;
        if !self.params.is_empty() {
            write!(f, " {:?}", self.params)?;
        }
        if !R::FIXED_FREQS {
            write!(f, " pi={:?}", self.freqs.as_slice())?;
        }
        Ok(())
    }
}
