//! Watch/confirmed stability signal shared by the regime and BTC-state outputs

use crate::domain::Stability;

/// Compare this cycle's label with the prior cycle's.
///
/// Confirmed needs a complete input set and an unchanged label. The first
/// cycle (no prior) is always watch.
pub fn stability<S: PartialEq>(
    current: S,
    prior: Option<S>,
    missing_field_count: usize,
) -> Stability {
    if missing_field_count > 0 {
        return Stability::Watch;
    }

    match prior {
        Some(prior) if prior == current => Stability::Confirmed,
        _ => Stability::Watch,
    }
}
