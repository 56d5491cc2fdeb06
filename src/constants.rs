//! Application constants for the MAPCO2 processor
//!
//! This module contains the recognized line prefixes, sentinel values,
//! layout sizes and output naming used throughout the parser.

// =============================================================================
// Frame and Block Prefixes
// =============================================================================

/// Mode tags that open a CO2 frame (first four characters of the header line)
pub const DEFAULT_MODE_TAGS: &[&str] = &["NORM", "FAST", "DEPL", "POSO", "RECV", "STSF"];

/// Line that marks a retransmitted duplicate frame
pub const DEFAULT_REPEAT_MARKER: &str = "REPEAT";

/// Prefixes opening a legacy SAMI-pH block
pub const PH_LEGACY_PREFIXES: &[&str] = &["Sami", "PH"];

/// Prefix opening a SeaFET pH block
pub const PH_SEAFET_PREFIX: &str = "Seaf";

/// Prefix opening an SBE16 CTD block
pub const CTD_PREFIX: &str = "SBE1";

/// Terminator of a summary CTD block (compared case-insensitively)
pub const CTD_TERMINATOR: &str = "end sbe16";

/// Delimiter opening a flash section
pub const FLASH_DELIMITER: &str = "*****";

/// Delimiter payload naming a flash Met section
pub const FLASH_MET_SECTION: &str = "Met";

/// Delimiter payload naming a flash SBE16 section
pub const FLASH_CTD_SECTION: &str = "SBE16";

/// Delimiter splitting the two sub-measurements of a pH payload
pub const PH_SPLIT_DELIMITER: &str = "^0A";

// =============================================================================
// Flash Cycle Sub-blocks
// =============================================================================

/// Flash sub-block tags, compared case-insensitively
pub mod flash_blocks {
    pub const LICOR: &str = "licor";
    pub const OXYGEN: &str = "o2";
    pub const HUMIDITY: &str = "rh";
    pub const HUMIDITY_TEMP: &str = "rht";

    /// Number of values on a Licor sample line
    pub const LICOR_FIELDS: usize = 5;
}

// =============================================================================
// Sentinels and Layouts
// =============================================================================

/// Numeric value that legacy inputs use to mark a missing reading
pub const DEFAULT_SENTINEL: f64 = -999.0;

/// GPS date/time tokens that mean "no fix acquired"
pub const NO_FIX_DATES: &[&str] = &["00/00/0000", "0000/00/00", "00/00/00", "0000-00-00"];
pub const NO_FIX_TIMES: &[&str] = &["00:00:00", "00:00"];

/// Firmware version reported when the header omits it
pub const DEFAULT_FIRMWARE: &str = "0.0";

/// Number of header tokens when firmware is present
pub const HEADER_TOKENS: usize = 8;

/// Engineering line token counts
pub const ENGR_TOKENS: usize = 18;
pub const ENGR_TOKENS_WITH_SPAN2: usize = 19;

/// Number of positions in the engineering meteorological tuple
pub const ENGR_MET_FIELDS: usize = 13;

/// Number of numeric tokens in a summary CO2 cycle line
pub const CYCLE_TOKENS: usize = 17;

/// Number of cycles in a complete summary frame
pub const SUMMARY_CYCLES: usize = 10;

/// CTD packed-vector lengths
pub mod ctd_lengths {
    pub const BASE: usize = 43;
    pub const BASE_BATTERY: usize = 45;
    pub const EXTENDED: usize = 53;
    pub const EXTENDED_BATTERY: usize = 55;
}

/// Divisor applied to integer auxiliary fields
pub const AUX_SCALE: f64 = 100.0;

/// Frame key rounding window in minutes
pub const FRAME_KEY_WINDOW_MINUTES: u32 = 30;

/// Frame key timestamp format
pub const FRAME_KEY_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Unit-clock and check-time date/time formats
pub const UNIT_DATETIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

// =============================================================================
// Output Naming
// =============================================================================

/// Row set names, also used as Parquet file stems
pub mod row_sets {
    pub const HEADER: &str = "header";
    pub const GPS: &str = "gps";
    pub const ENGINEERING: &str = "engineering";
    pub const CYCLES: &str = "co2_cycles";
    pub const CTD: &str = "aux_ctd";
    pub const PH: &str = "aux_ph";
    pub const MET: &str = "aux_met";
    pub const SIDE_LOG: &str = "side_log";
}

/// Get the Parquet filename for a row set
pub fn get_output_filename(row_set: &str) -> String {
    format!("{}.parquet", row_set)
}

/// Check whether a line starts with one of the given prefixes
pub fn has_prefix(line: &str, prefixes: &[&str]) -> bool {
    prefixes.iter().any(|prefix| line.starts_with(prefix))
}
