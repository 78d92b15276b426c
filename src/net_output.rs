//! Leftover output of one recipe for one item, after downstream consumption

/// Where a recipe's leftover output of an item goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputClass {
    TargetOutput,
    ByProduct,
    FullyConsumed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetOutput {
    pub leftover: f64,
    pub class: OutputClass,
    /// Amount consumed beyond gross production, when that exceeds tolerance
    pub overdrawn: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetOutputOptions {
    /// Leftover at or below this fraction of gross counts as zero
    pub leftover_threshold: f64,
    /// Relative slack before consumption beyond production is reported
    pub conservation_tolerance: f64,
}

impl Default for NetOutputOptions {
    fn default() -> Self {
        Self {
            leftover_threshold: 0.01,
            conservation_tolerance: 1e-3,
        }
    }
}

/// Classify what remains of `gross` after `consumed` went downstream.
///
/// Evaluated per producing recipe: the same item can be a target output from
/// one recipe and fully consumed from another.
pub fn resolve(gross: f64, consumed: f64, is_target: bool, options: &NetOutputOptions) -> NetOutput {
    let gross = if gross.is_finite() { gross.max(0.0) } else { 0.0 };
    let consumed = if consumed.is_finite() { consumed.max(0.0) } else { 0.0 };

    let excess = consumed - gross;
    let overdrawn = (excess > gross * options.conservation_tolerance && excess > 0.0).then_some(excess);

    let leftover = (gross - consumed).max(0.0);
    if leftover <= gross * options.leftover_threshold || leftover == 0.0 {
        return NetOutput {
            leftover: 0.0,
            class: OutputClass::FullyConsumed,
            overdrawn,
        };
    }

    NetOutput {
        leftover,
        class: if is_target {
            OutputClass::TargetOutput
        } else {
            OutputClass::ByProduct
        },
        overdrawn,
    }
}
