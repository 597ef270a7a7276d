//! Sort configuration. A single immutable value built once by the CLI and
//! threaded by reference into every comparator and directory-processing
//! call — see the design note about avoiding process-wide option state.

/// Directory-grouping precedence (§4.6 rule 1 of the non-positional options).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupOrder {
    DirsFirst,
    FilesFirst,
    Mixed,
}

/// Final order function applied after grouping, modification-time, prefix
/// strip and case folding have all run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderFunction {
    Natural,
    Ascii,
    Locale,
}

#[derive(Debug, Clone)]
pub struct SortOptions {
    pub order: GroupOrder,
    pub order_function: OrderFunction,
    pub reverse: bool,
    pub ignore_case: bool,
    pub modification_time: bool,
    pub ignore_prefixes: Vec<String>,
    pub random: bool,
    pub list_only: bool,
    pub force: bool,
    /// Deterministic seed for the Fisher-Yates permutation in random mode
    /// (S5); unused otherwise.
    pub random_seed: u64,
}

impl Default for SortOptions {
    fn default() -> Self {
        Self {
            order: GroupOrder::DirsFirst,
            order_function: OrderFunction::Ascii,
            reverse: false,
            ignore_case: false,
            modification_time: false,
            ignore_prefixes: Vec::new(),
            random: false,
            list_only: false,
            force: false,
            random_seed: 0,
        }
    }
}

impl SortOptions {
    /// `+1` for normal order, `-1` for `--reverse`, matching the source's
    /// `OPT_REVERSE` multiplier convention.
    pub fn reverse_multiplier(&self) -> i32 {
        if self.reverse {
            -1
        } else {
            1
        }
    }
}
