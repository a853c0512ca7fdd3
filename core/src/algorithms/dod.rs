use super::PassSpec;

pub struct DoDWipe;

impl DoDWipe {
    /// DoD 5220.22-M standard pass 1 pattern (all zeros)
    pub const PASS_1_PATTERN: u8 = 0x00;

    /// DoD 5220.22-M standard pass 2 pattern (all ones)
    pub const PASS_2_PATTERN: u8 = 0xFF;

    /// DoD 5220.22-M requires exactly 3 passes
    pub const PASS_COUNT: usize = 3;

    /// Zeros, then ones, then random data. The order is part of the standard.
    pub fn passes() -> Vec<PassSpec> {
        vec![PassSpec::Zero, PassSpec::One, PassSpec::Random]
    }
}
