use folje_fixtures::DMX_CHANNELS;

pub const SACN_PORT: u16 = 5568;
pub const MIN_UNIVERSE: u16 = 1;
pub const MAX_UNIVERSE: u16 = 63999;
pub const DEFAULT_PRIORITY: u8 = 100;

/// Longest source name that still leaves the name field null-terminated.
pub const MAX_SOURCE_NAME_BYTES: usize = 63;

pub const NULL_START_CODE: u8 = 0x00;

/// One universe worth of channel data ready to be sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DmxFrame {
    pub universe: u16,
    pub data: [u8; DMX_CHANNELS],
}

impl DmxFrame {
    /// Start code followed by the channel values, the slot layout the sender expects.
    pub fn slots(&self) -> [u8; DMX_CHANNELS + 1] {
        let mut slots = [0u8; DMX_CHANNELS + 1];
        slots[0] = NULL_START_CODE;
        slots[1..].copy_from_slice(&self.data);
        slots
    }
}

pub fn is_valid_universe(universe: u16) -> bool {
    (MIN_UNIVERSE..=MAX_UNIVERSE).contains(&universe)
}

/// Cuts `name` to fit the source-name field without splitting a character.
pub fn source_name(name: &str) -> &str {
    if name.len() <= MAX_SOURCE_NAME_BYTES {
        return name;
    }
    let mut end = MAX_SOURCE_NAME_BYTES;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_lead_with_start_code() {
        let mut data = [0u8; DMX_CHANNELS];
        data[0] = 0x12;
        data[511] = 0xEE;
        let slots = DmxFrame { universe: 1, data }.slots();

        assert_eq!(slots.len(), 513);
        assert_eq!(slots[0], NULL_START_CODE);
        assert_eq!(slots[1], 0x12);
        assert_eq!(slots[512], 0xEE);
    }

    #[test]
    fn test_universe_range() {
        assert!(!is_valid_universe(0));
        assert!(is_valid_universe(1));
        assert!(is_valid_universe(63999));
        assert!(!is_valid_universe(64000));
    }

    #[test]
    fn test_long_source_name_is_cut() {
        assert_eq!(source_name("Folje"), "Folje");
        assert_eq!(source_name(&"x".repeat(100)).len(), 63);

        // 'ø' is two bytes; byte 63 falls inside the last one.
        let name = format!("{}ø", "x".repeat(62));
        assert_eq!(source_name(&name), "x".repeat(62));
    }
}
