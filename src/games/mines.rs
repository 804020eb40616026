//! Mines: grid reveal against hidden mine placement
//!
//! M mines are placed uniformly on a 25-cell grid when the round opens,
//! derived only from the VRF output. The placement never looks at player
//! history or streaks. After k safe reveals the multiplier is
//! (25 - M) / (25 - M - k); it is undefined at k = 25 - M, so the last
//! safe cell cannot be revealed and the round must cash out.

use super::{mul_div, Amount, BP_PER_X};
use crate::errors::{EngineError, EngineResult};
use crate::rng::Draw;

pub const GRID_CELLS: u8 = 25;
pub const MIN_MINES: u8 = 1;
pub const MAX_MINES: u8 = 24;

pub fn validate(mines: u8) -> EngineResult<()> {
    if !(MIN_MINES..=MAX_MINES).contains(&mines) {
        return Err(EngineError::Validation(format!(
            "mine count must be in [{}, {}], got {}",
            MIN_MINES, MAX_MINES, mines
        )));
    }
    Ok(())
}

/// Number of non-mine cells for a given mine count.
pub fn safe_cells(mines: u8) -> u8 {
    GRID_CELLS - mines
}

/// Highest reveal count a round can reach before it must cash out.
pub fn max_reveals(mines: u8) -> u8 {
    safe_cells(mines) - 1
}

/// Uniform mine placement from the draw: a k-subset of the 25 cells.
pub fn place_mines(draw: &Draw, mines: u8) -> EngineResult<Vec<u8>> {
    validate(mines)?;

    let mut rng = draw.rng();
    let mut cells: Vec<u8> = rand::seq::index::sample(&mut rng, GRID_CELLS as usize, mines as usize)
        .into_iter()
        .map(|i| i as u8)
        .collect();
    cells.sort_unstable();
    Ok(cells)
}

/// Running multiplier after `revealed` safe reveals, in basis points.
pub fn multiplier_bp(mines: u8, revealed: u8) -> EngineResult<u64> {
    validate(mines)?;
    let safe = safe_cells(mines) as u64;
    let remaining = safe
        .checked_sub(revealed as u64)
        .filter(|r| *r > 0)
        .ok_or_else(|| {
            EngineError::Validation(format!(
                "multiplier undefined at {} reveals with {} mines",
                revealed, mines
            ))
        })?;
    Ok(safe * BP_PER_X / remaining)
}

/// Cash-out payout after `revealed` safe reveals, exact integer math.
pub fn payout(stake: Amount, mines: u8, revealed: u8) -> EngineResult<Amount> {
    validate(mines)?;
    let safe = safe_cells(mines) as u64;
    let remaining = safe
        .checked_sub(revealed as u64)
        .filter(|r| *r > 0)
        .ok_or_else(|| {
            EngineError::Validation(format!(
                "payout undefined at {} reveals with {} mines",
                revealed, mines
            ))
        })?;
    Ok(mul_div(stake, safe, remaining))
}
