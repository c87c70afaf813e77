//! Object group and variation definitions
//!
//! DNP3 data objects are identified by group and variation numbers. Groups
//! identify the type of data (binary input, analog input, and so on);
//! variations identify the concrete encoding.

/// Object group numbers used by this driver.
pub mod group {
    pub const BINARY_INPUT: u8 = 1;
    pub const BINARY_INPUT_EVENT: u8 = 2;
    pub const DOUBLE_BIT_BINARY_INPUT: u8 = 3;
    pub const DOUBLE_BIT_BINARY_INPUT_EVENT: u8 = 4;
    pub const BINARY_OUTPUT: u8 = 10;
    pub const BINARY_OUTPUT_EVENT: u8 = 11;
    pub const CONTROL_RELAY_OUTPUT_BLOCK: u8 = 12;
    pub const BINARY_OUTPUT_COMMAND_EVENT: u8 = 13;
    pub const COUNTER: u8 = 20;
    pub const FROZEN_COUNTER: u8 = 21;
    pub const COUNTER_EVENT: u8 = 22;
    pub const FROZEN_COUNTER_EVENT: u8 = 23;
    pub const ANALOG_INPUT: u8 = 30;
    pub const FROZEN_ANALOG_INPUT: u8 = 31;
    pub const ANALOG_INPUT_EVENT: u8 = 32;
    pub const ANALOG_OUTPUT_STATUS: u8 = 40;
    pub const ANALOG_OUTPUT_BLOCK: u8 = 41;
    pub const ANALOG_OUTPUT_EVENT: u8 = 42;
    pub const TIME_AND_DATE: u8 = 50;
    pub const CLASS_OBJECTS: u8 = 60;
}

/// Class object variations (group 60).
pub mod class_variation {
    pub const CLASS_0: u8 = 1;
    pub const CLASS_1: u8 = 2;
    pub const CLASS_2: u8 = 3;
    pub const CLASS_3: u8 = 4;
}

/// Fixed per-object size in bytes for a group/variation pair.
///
/// Returns `None` for bit-packed or otherwise variable encodings
/// (g1v1/g3v1/g10v1) and for pairs outside the catalog.
pub fn object_size(group: u8, variation: u8) -> Option<usize> {
    let size = match (group, variation) {
        // Binary input
        (1, 1) => return None, // packed, 1 bit per point
        (1, 2) => 1,

        // Binary input event
        (2, 1) => 1,
        (2, 2) => 7, // flag + 48-bit absolute time
        (2, 3) => 3, // flag + 16-bit relative time

        // Double-bit binary input
        (3, 1) => return None, // packed, 2 bits per point
        (3, 2) => 1,
        (4, 1) => 1,
        (4, 2) => 7,
        (4, 3) => 3,

        // Binary output
        (10, 1) => return None, // packed
        (10, 2) => 1,
        (11, 1) => 1,
        (11, 2) => 7,

        // Control relay output block
        (12, 1) => 11, // code(1) + count(1) + on(4) + off(4) + status(1)

        // Binary output command event
        (13, 1) => 12,
        (13, 2) => 18,

        // Counter
        (20, 1) => 5,
        (20, 2) => 3,
        (20, 3) => 5,
        (20, 4) => 3,
        (20, 5) => 4,
        (20, 6) => 2,
        (20, 7) => 4,
        (20, 8) => 2,

        // Frozen counter
        (21, 1) => 5,
        (21, 2) => 3,
        (21, 5) => 4,
        (21, 6) => 2,
        (21, 9) => 11,
        (21, 10) => 9,

        // Counter event
        (22, 1) => 5,
        (22, 2) => 3,
        (22, 5) => 11,
        (22, 6) => 9,

        // Frozen counter event
        (23, 1) => 5,
        (23, 2) => 3,
        (23, 5) => 11,
        (23, 6) => 9,

        // Analog input
        (30, 1) => 5,
        (30, 2) => 3,
        (30, 3) => 4,
        (30, 4) => 2,
        (30, 5) => 5,
        (30, 6) => 9,

        // Frozen analog input
        (31, 1) => 5,
        (31, 2) => 3,
        (31, 3) => 11,
        (31, 4) => 9,
        (31, 5) => 4,
        (31, 6) => 2,
        (31, 7) => 5,
        (31, 8) => 9,

        // Analog input event
        (32, 1) => 5,
        (32, 2) => 3,
        (32, 3) => 11,
        (32, 4) => 9,
        (32, 5) => 5,
        (32, 6) => 9,
        (32, 7) => 11,
        (32, 8) => 15,

        // Analog output status
        (40, 1) => 5,
        (40, 2) => 3,
        (40, 3) => 5,
        (40, 4) => 9,

        // Analog output block
        (41, 1) => 5,
        (41, 2) => 3,
        (41, 3) => 5,
        (41, 4) => 9,

        // Analog output event
        (42, 1) => 5,
        (42, 2) => 3,
        (42, 3) => 11,
        (42, 4) => 9,
        (42, 5) => 5,
        (42, 6) => 9,
        (42, 7) => 11,
        (42, 8) => 15,

        // Time and date
        (50, 1) => 6,
        (50, 4) => 6,

        // Class objects carry no data
        (60, 1..=4) => 0,

        _ => return None,
    };
    Some(size)
}

/// True for variations encoded as one bit per point.
pub fn is_bit_packed(group: u8, variation: u8) -> bool {
    matches!((group, variation), (1, 1) | (10, 1))
}

/// Human-readable name for a group number.
pub fn group_name(group: u8) -> &'static str {
    match group {
        1 => "Binary Input",
        2 => "Binary Input Event",
        3 => "Double-bit Binary Input",
        4 => "Double-bit Binary Input Event",
        10 => "Binary Output",
        11 => "Binary Output Event",
        12 => "Control Relay Output Block",
        13 => "Binary Output Command Event",
        20 => "Counter",
        21 => "Frozen Counter",
        22 => "Counter Event",
        23 => "Frozen Counter Event",
        30 => "Analog Input",
        31 => "Frozen Analog Input",
        32 => "Analog Input Event",
        40 => "Analog Output Status",
        41 => "Analog Output Block",
        42 => "Analog Output Event",
        50 => "Time and Date",
        60 => "Class Objects",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_sizes() {
        assert_eq!(object_size(12, 1), Some(11));
        assert_eq!(object_size(30, 1), Some(5));
        assert_eq!(object_size(30, 6), Some(9));
        assert_eq!(object_size(20, 6), Some(2));
        assert_eq!(object_size(41, 4), Some(9));
        assert_eq!(object_size(60, 1), Some(0));
        assert_eq!(object_size(1, 1), None);
        assert_eq!(object_size(99, 1), None);
    }

    #[test]
    fn test_bit_packed() {
        assert!(is_bit_packed(1, 1));
        assert!(is_bit_packed(10, 1));
        assert!(!is_bit_packed(1, 2));
        assert!(!is_bit_packed(30, 1));
    }

    #[test]
    fn test_group_names() {
        assert_eq!(group_name(12), "Control Relay Output Block");
        assert_eq!(group_name(200), "Unknown");
    }
}
