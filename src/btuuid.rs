//! `Uuid` extensions for Bluetooth UUIDs

use uuid::Uuid;

/// This is the Bluetooth Base UUID. It is used with 16-bit and 32-bit UUIDs
/// [defined](https://www.bluetooth.com/specifications/assigned-numbers/) by the Bluetooth SIG.
pub const BLUETOOTH_BASE_UUID: u128 = 0x00000000_0000_1000_8000_00805f9b34fb;

/// Const function to create a 16-bit Bluetooth UUID
pub const fn bluetooth_uuid_from_u16(uuid: u16) -> Uuid {
    Uuid::from_u128(((uuid as u128) << 96) | BLUETOOTH_BASE_UUID)
}

/// Const function to create a 32-bit Bluetooth UUID
pub const fn bluetooth_uuid_from_u32(uuid: u32) -> Uuid {
    Uuid::from_u128(((uuid as u128) << 96) | BLUETOOTH_BASE_UUID)
}

/// Extension trait for [uuid::Uuid] with helper methods for dealing with Bluetooth 16-bit and 32-bit UUIDs
pub trait BluetoothUuidExt: private::Sealed + Sized {
    /// Creates a 16-bit Bluetooth UUID
    fn from_u16(uuid: u16) -> Self;

    /// Creates a 32-bit Bluetooth UUID
    fn from_u32(uuid: u32) -> Self;

    /// Creates a UUID from its over-the-air representation, which is little-endian.
    ///
    /// Returns `None` if `bytes.len()` is not one of 2, 4, or 16.
    fn from_le_bluetooth_bytes(bytes: &[u8]) -> Option<Self>;

    /// Returns `true` if self is a valid 16-bit Bluetooth UUID
    fn is_u16_uuid(&self) -> bool;

    /// Returns `true` if self is a valid 32-bit Bluetooth UUID
    fn is_u32_uuid(&self) -> bool;

    /// Tries to convert self into a 16-bit Bluetooth UUID
    fn try_to_u16(&self) -> Option<u16>;

    /// Tries to convert self into a 32-bit Bluetooth UUID
    fn try_to_u32(&self) -> Option<u32>;

    /// Returns the shortest over-the-air (little-endian) representation of the UUID: 2, 4 or 16 octets.
    fn to_le_bluetooth_bytes(&self) -> Vec<u8>;
}

impl BluetoothUuidExt for Uuid {
    fn from_u16(uuid: u16) -> Self {
        bluetooth_uuid_from_u16(uuid)
    }

    fn from_u32(uuid: u32) -> Self {
        bluetooth_uuid_from_u32(uuid)
    }

    fn from_le_bluetooth_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes.len() {
            2 => Some(Self::from_u16(u16::from_le_bytes([bytes[0], bytes[1]]))),
            4 => Some(Self::from_u32(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))),
            16 => {
                let mut be = [0u8; 16];
                be.copy_from_slice(bytes);
                be.reverse();
                Some(Self::from_bytes(be))
            }
            _ => None,
        }
    }

    fn is_u16_uuid(&self) -> bool {
        let u = self.as_u128();
        (u & ((1 << 96) - 1)) == BLUETOOTH_BASE_UUID && (((u >> 96) as u32) & 0xffff0000) == 0
    }

    fn is_u32_uuid(&self) -> bool {
        let u = self.as_u128();
        (u & ((1 << 96) - 1)) == BLUETOOTH_BASE_UUID
    }

    fn try_to_u16(&self) -> Option<u16> {
        let u = self.as_u128();
        self.is_u16_uuid().then(|| (u >> 96) as u16)
    }

    fn try_to_u32(&self) -> Option<u32> {
        let u = self.as_u128();
        self.is_u32_uuid().then(|| (u >> 96) as u32)
    }

    fn to_le_bluetooth_bytes(&self) -> Vec<u8> {
        if let Some(short) = self.try_to_u16() {
            short.to_le_bytes().to_vec()
        } else if let Some(short) = self.try_to_u32() {
            short.to_le_bytes().to_vec()
        } else {
            let mut bytes = *self.as_bytes();
            bytes.reverse();
            bytes.to_vec()
        }
    }
}

mod private {
    use uuid::Uuid;

    pub trait Sealed {}

    impl Sealed for Uuid {}
}

/// Service UUIDs used by URI beacons
pub mod services {
    use uuid::Uuid;

    use super::bluetooth_uuid_from_u16;

    /// The 16-bit UUID under which URI beacons advertise their service data
    pub const URI_BEACON: Uuid = bluetooth_uuid_from_u16(0xFED8);

    /// The first generation configuration service, where the whole advertisement is split over two characteristics
    pub const URI_BEACON_CONFIG_V1: Uuid = Uuid::from_u128(0xb35d7da6_eed4_4d59_8f89_f6573edea967);

    /// The second generation configuration service, with one characteristic per field
    pub const URI_BEACON_CONFIG_V2: Uuid = Uuid::from_u128(0xee0c2080_8786_40ba_ab96_99b91ac981d8);
}

/// Characteristic UUIDs of the URI beacon configuration services
pub mod characteristics {
    use uuid::Uuid;

    /// V1: first 20 bytes of the advertisement
    pub const V1_DATA_ONE: Uuid = Uuid::from_u128(0xb35d7da7_eed4_4d59_8f89_f6573edea967);
    /// V1: remaining bytes of the advertisement
    pub const V1_DATA_TWO: Uuid = Uuid::from_u128(0xb35d7da8_eed4_4d59_8f89_f6573edea967);
    /// V1: total advertisement length as a single SINT8
    pub const V1_DATA_LENGTH: Uuid = Uuid::from_u128(0xb35d7da9_eed4_4d59_8f89_f6573edea967);

    /// V2: lock state (one byte, non-zero when locked)
    pub const V2_LOCK_STATE: Uuid = Uuid::from_u128(0xee0c2081_8786_40ba_ab96_99b91ac981d8);
    /// V2: lock with a 16-byte key
    pub const V2_LOCK: Uuid = Uuid::from_u128(0xee0c2082_8786_40ba_ab96_99b91ac981d8);
    /// V2: unlock with a 16-byte key
    pub const V2_UNLOCK: Uuid = Uuid::from_u128(0xee0c2083_8786_40ba_ab96_99b91ac981d8);
    /// V2: encoded URI
    pub const V2_URI_DATA: Uuid = Uuid::from_u128(0xee0c2084_8786_40ba_ab96_99b91ac981d8);
    /// V2: advertised flags byte
    pub const V2_FLAGS: Uuid = Uuid::from_u128(0xee0c2085_8786_40ba_ab96_99b91ac981d8);
    /// V2: advertised TX power for each of the four TX power modes
    pub const V2_ADVERTISED_TX_POWER_LEVELS: Uuid = Uuid::from_u128(0xee0c2086_8786_40ba_ab96_99b91ac981d8);
    /// V2: current TX power mode, an index into the advertised levels
    pub const V2_TX_POWER_MODE: Uuid = Uuid::from_u128(0xee0c2087_8786_40ba_ab96_99b91ac981d8);
    /// V2: advertising period in milliseconds (UINT16 little-endian)
    pub const V2_BEACON_PERIOD: Uuid = Uuid::from_u128(0xee0c2088_8786_40ba_ab96_99b91ac981d8);
    /// V2: writing any value restores the factory configuration
    pub const V2_RESET: Uuid = Uuid::from_u128(0xee0c2089_8786_40ba_ab96_99b91ac981d8);
}
