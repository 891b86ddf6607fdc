//! Occupancy descriptors
//!
//! A descriptor is a string of cell markers: `■` or `1` for an occupied cell,
//! `□` or `0` for a free one. Every other character is dropped before the
//! lane length is computed.

use super::types::{FREE_CELL, FREE_DIGIT, OCCUPIED_CELL, OCCUPIED_DIGIT};

/// Parse a descriptor into one flag per cell, `true` meaning occupied
pub fn parse_descriptor(descriptor: &str) -> Vec<bool> {
    descriptor
        .chars()
        .filter_map(|c| match c {
            OCCUPIED_CELL | OCCUPIED_DIGIT => Some(true),
            FREE_CELL | FREE_DIGIT => Some(false),
            _ => None,
        })
        .collect()
}

/// Render cell flags using the pictographic alphabet
pub fn render_cells(cells: impl IntoIterator<Item = bool>) -> String {
    cells
        .into_iter()
        .map(|occupied| if occupied { OCCUPIED_CELL } else { FREE_CELL })
        .collect()
}
