//! Deterministic port and color assignment for fleet instances.
//!
//! Every instance gets a port derived from the base port, its instance index
//! within the process type and the type's position in the formation:
//! `port = base + j + k * 100`. Colors cycle through [`PALETTE`] using the
//! same two indices, so neighbouring instances are visually distinct.

use crate::error::FleetError;

/// Lowest port a worker process may be assigned.
pub const MIN_BASE_PORT: u16 = 1024;

/// Ports reserved per process type.
const PORTS_PER_TYPE: u32 = 100;

/// Display color for an instance's console prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Cyan,
    Yellow,
    Green,
    Magenta,
    Blue,
    Red,
    BrightCyan,
    BrightYellow,
    BrightGreen,
    BrightMagenta,
    BrightBlue,
}

impl Color {
    /// SGR foreground code for this color.
    pub fn ansi_code(self) -> &'static str {
        match self {
            Color::Cyan => "36",
            Color::Yellow => "33",
            Color::Green => "32",
            Color::Magenta => "35",
            Color::Blue => "34",
            Color::Red => "31",
            Color::BrightCyan => "96",
            Color::BrightYellow => "93",
            Color::BrightGreen => "92",
            Color::BrightMagenta => "95",
            Color::BrightBlue => "94",
        }
    }
}

/// Palette the allocator cycles through.
pub const PALETTE: [Color; 11] = [
    Color::Cyan,
    Color::Yellow,
    Color::Green,
    Color::Magenta,
    Color::Blue,
    Color::Red,
    Color::BrightCyan,
    Color::BrightYellow,
    Color::BrightGreen,
    Color::BrightMagenta,
    Color::BrightBlue,
];

/// Port and color handed to one instance.
///
/// `port` is not clamped: a high base port with many types can exceed 65535.
/// The value is still exported as-is; callers check [`Assignment::port_in_range`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub port: u32,
    pub color: Color,
}

impl Assignment {
    pub fn port_in_range(&self) -> bool {
        self.port <= u32::from(u16::MAX)
    }
}

/// Rejects base ports in the privileged range.
pub fn validate_base_port(base_port: u16) -> Result<(), FleetError> {
    if base_port < MIN_BASE_PORT {
        return Err(FleetError::PrivilegedPort { port: base_port });
    }
    Ok(())
}

/// Computes the assignment for type index `k` and instance index `j` (both 0-based).
pub fn assign(type_index: usize, instance_index: usize, base_port: u16) -> Assignment {
    assign_with(&PALETTE, type_index, instance_index, base_port)
}

/// Same as [`assign`], against an explicit palette. An empty palette is not allowed.
pub fn assign_with(
    palette: &[Color],
    type_index: usize,
    instance_index: usize,
    base_port: u16,
) -> Assignment {
    let port = u32::from(base_port) + instance_index as u32 + type_index as u32 * PORTS_PER_TYPE;
    let color = palette[(instance_index + type_index) % palette.len()];
    Assignment { port, color }
}
