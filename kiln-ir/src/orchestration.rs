//! Switches shared by the stages of a build.

use bitflags::bitflags;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Flags: u32 {
        const REMOVE_OVERLAPS = 0b0000_0000_0001;
        const KEEP_DIRECTION = 0b0000_0000_0010;
        const FLATTEN_COMPONENTS = 0b0000_0000_0100;
        const AUTO_USE_MY_METRICS = 0b0000_0000_1000;
        const DROP_IMPLIED_ONCURVES = 0b0000_0001_0000;
        /// Stop at the first glyph that can't meet the curve tolerance
        const FAIL_FAST = 0b0000_0010_0000;
        const PRODUCTION_NAMES = 0b0000_0100_0000;
        /// Drop glyphs that aren't exported
        const SUBSET = 0b0000_1000_0000;
        const CHECK_COMPATIBILITY = 0b0001_0000_0000;
        const OPTIMIZE_GVAR = 0b0010_0000_0000;
        const GENERATE_GDEF = 0b0100_0000_0000;
        const ROUND_INSTANCES = 0b1000_0000_0000;
        const ALLOW_EXTRAPOLATION = 0b0001_0000_0000_0000;
    }
}

impl Default for Flags {
    /// Match fontmake defaults
    fn default() -> Self {
        Self::REMOVE_OVERLAPS
            | Self::AUTO_USE_MY_METRICS
            | Self::PRODUCTION_NAMES
            | Self::SUBSET
            | Self::OPTIMIZE_GVAR
            | Self::GENERATE_GDEF
    }
}
