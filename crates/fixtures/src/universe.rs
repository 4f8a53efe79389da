use thiserror::Error;

/// Number of channel slots in one DMX universe.
pub const DMX_CHANNELS: usize = 512;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FixtureError {
    #[error("channel address {0} is outside the universe (0-511)")]
    AddressOutOfRange(i32),
}

/// Channel data for one universe, indexed from 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UniverseBuffer {
    data: [u8; DMX_CHANNELS],
}

impl Default for UniverseBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl UniverseBuffer {
    pub fn new() -> Self {
        UniverseBuffer {
            data: [0; DMX_CHANNELS],
        }
    }

    pub fn set(&mut self, address: i32, value: u8) -> Result<(), FixtureError> {
        let index = channel_index(address).ok_or(FixtureError::AddressOutOfRange(address))?;
        self.data[index] = value;
        Ok(())
    }

    pub fn get(&self, address: i32) -> Option<u8> {
        channel_index(address).map(|index| self.data[index])
    }

    pub fn data(&self) -> &[u8; DMX_CHANNELS] {
        &self.data
    }
}

fn channel_index(address: i32) -> Option<usize> {
    usize::try_from(address)
        .ok()
        .filter(|index| *index < DMX_CHANNELS)
}
