use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Deserialize};

use crate::error::{ModelError, Result};
use crate::loss::angular::AngularSoftmax;
use crate::loss::head::LossHead;
use crate::loss::modified::ModifiedSoftmax;
use crate::loss::original::OriginalSoftmax;
use crate::params::ParamStore;

/// Selects the loss head placed on top of the embeddings.
///
/// - `Original` (code 0) — softmax cross-entropy on raw logits.
/// - `Modified` (code 1) — class-weight columns normalized to unit length.
/// - `Angular`  (code 2) — normalized weights plus the angular margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossType {
    #[default]
    Original,
    Modified,
    Angular,
}

impl LossType {
    pub const ALL: [LossType; 3] = [LossType::Original, LossType::Modified, LossType::Angular];

    pub fn code(self) -> u8 {
        match self {
            LossType::Original => 0,
            LossType::Modified => 1,
            LossType::Angular => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LossType::Original => "original",
            LossType::Modified => "modified",
            LossType::Angular => "angular",
        }
    }

    /// Builds the head, reading its class weights from `store`.
    /// `lambda` only affects the angular head.
    pub fn build(
        self,
        store: &mut ParamStore,
        embedding_dim: usize,
        num_classes: usize,
        lambda: f64,
    ) -> Result<Box<dyn LossHead>> {
        Ok(match self {
            LossType::Original => Box::new(OriginalSoftmax::new(store, embedding_dim, num_classes)?),
            LossType::Modified => Box::new(ModifiedSoftmax::new(store, embedding_dim, num_classes)?),
            LossType::Angular => Box::new(AngularSoftmax::new(store, embedding_dim, num_classes, lambda)?),
        })
    }
}

impl TryFrom<i64> for LossType {
    type Error = ModelError;

    fn try_from(code: i64) -> Result<Self> {
        match code {
            0 => Ok(LossType::Original),
            1 => Ok(LossType::Modified),
            2 => Ok(LossType::Angular),
            other => Err(ModelError::InvalidLossType(other)),
        }
    }
}

impl TryFrom<u8> for LossType {
    type Error = ModelError;

    fn try_from(code: u8) -> Result<Self> {
        LossType::try_from(i64::from(code))
    }
}

impl FromStr for LossType {
    type Err = ModelError;

    /// Accepts the names and the integer codes.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(code) = s.parse::<i64>() {
            return LossType::try_from(code);
        }
        LossType::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ModelError::UnknownLossType(s.to_string()))
    }
}

impl fmt::Display for LossType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
