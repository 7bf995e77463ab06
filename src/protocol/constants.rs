//! # Bridge Protocol Constants
//!
//! UUIDs, well-known variable hashes and size limits shared with the
//! bridge firmware. These must match the firmware bit-for-bit.

use std::fmt;
use uuid::Uuid;

/// Dashboard GATT service
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x4fafc201_1fb5_459e_8fcc_c5c9c331914b);

/// Button mask characteristic (write without response)
pub const CHAR_BUTTON_UUID: Uuid = Uuid::from_u128(0xbeb5483e_36e1_4688_b7f5_ea07361b26a8);

/// Variable data characteristic (notify)
pub const CHAR_VAR_DATA_UUID: Uuid = Uuid::from_u128(0xbeb5483e_36e1_4688_b7f5_ea07361b26a9);

/// Variable request characteristic (write without response)
pub const CHAR_VAR_REQUEST_UUID: Uuid = Uuid::from_u128(0xbeb5483e_36e1_4688_b7f5_ea07361b26aa);

/// GPS data characteristic (write without response)
pub const CHAR_GPS_DATA_UUID: Uuid = Uuid::from_u128(0xbeb5483e_36e1_4688_b7f5_ea07361b26ab);

/// Packed hours | minutes | seconds | day-of-month
pub const VAR_HASH_GPS_HMSD_PACKED: i32 = 703958849;
/// Packed month | year | fix quality | satellites
pub const VAR_HASH_GPS_MYQSAT_PACKED: i32 = -1519914092;
pub const VAR_HASH_GPS_ACCURACY: i32 = -1489698215;
pub const VAR_HASH_GPS_ALTITUDE: i32 = -2100224086;
pub const VAR_HASH_GPS_COURSE: i32 = 1842893663;
pub const VAR_HASH_GPS_LATITUDE: i32 = 1524934922;
pub const VAR_HASH_GPS_LONGITUDE: i32 = -809214087;
pub const VAR_HASH_GPS_SPEED: i32 = -1486968225;

/// Button mask payload size
pub const BUTTON_PAYLOAD_LEN: usize = 2;

/// One hash in a variable request
pub const VAR_REQUEST_ENTRY_LEN: usize = 4;

/// One `[hash][value]` record in a variable notification or GPS write
pub const VAR_RECORD_LEN: usize = 8;

/// ATT header bytes subtracted from the MTU to get the usable write length
pub const ATT_HEADER_LEN: usize = 3;

/// ATT MTU before any negotiation
pub const DEFAULT_ATT_MTU: u16 = 23;

/// Largest ATT MTU the app requests and the firmware accepts
pub const MAX_ATT_MTU: u16 = 517;

/// Firmware limit on hashes handled per request (`MAX_BATCH_VARS`)
pub const MAX_BATCH_VARS: usize = 16;

/// Logical BLE channel, one per characteristic of the dashboard service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    /// Button mask writes
    Button,
    /// Variable sample notifications
    VariableData,
    /// Variable hash requests
    VariableRequest,
    /// GPS (and arbitrary variable) writes
    GpsData,
}

impl Channel {
    /// Every channel of the dashboard service
    pub const ALL: [Channel; 4] = [
        Channel::Button,
        Channel::VariableData,
        Channel::VariableRequest,
        Channel::GpsData,
    ];

    /// Characteristic UUID for this channel
    pub fn uuid(self) -> Uuid {
        match self {
            Channel::Button => CHAR_BUTTON_UUID,
            Channel::VariableData => CHAR_VAR_DATA_UUID,
            Channel::VariableRequest => CHAR_VAR_REQUEST_UUID,
            Channel::GpsData => CHAR_GPS_DATA_UUID,
        }
    }

    /// Map a characteristic UUID back to its channel
    pub fn from_uuid(uuid: Uuid) -> Option<Self> {
        Self::ALL.into_iter().find(|channel| channel.uuid() == uuid)
    }

    /// Whether the app writes to this channel (the rest are notify-only)
    pub fn is_writable(self) -> bool {
        !matches!(self, Channel::VariableData)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Channel::Button => "button",
            Channel::VariableData => "variable-data",
            Channel::VariableRequest => "variable-request",
            Channel::GpsData => "gps-data",
        };
        f.write_str(name)
    }
}
