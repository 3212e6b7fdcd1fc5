use serde::{Deserialize, Serialize};

/// Number of object slots a touch report can address
pub const MAX_CONTACTS: usize = 10;

/// A single contact from a decoded touch report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// Slot the firmware assigned to this contact (0-9 when valid)
    pub object_index: i64,

    /// Measured X position
    pub x_meas: f64,

    /// Measured Y position
    pub y_meas: f64,

    /// Contact strength, when reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,

    /// Object classification (finger, glove, stylus...), when reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<i64>,
}

impl Contact {
    pub fn new(object_index: i64, x_meas: f64, y_meas: f64) -> Self {
        Self {
            object_index,
            x_meas,
            y_meas,
            z: None,
            classification: None,
        }
    }

    /// Slot index if it is addressable by the tracker
    pub fn slot(&self) -> Option<usize> {
        usize::try_from(self.object_index)
            .ok()
            .filter(|&slot| slot < MAX_CONTACTS)
    }
}

/// Decoded touch report for one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TouchReport {
    /// Contacts in report order. Missing `pos` means no contacts.
    #[serde(default)]
    pub pos: Vec<Contact>,

    /// Any other fields the firmware reported (gestures, timestamps...)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TouchReport {
    pub fn new(pos: Vec<Contact>) -> Self {
        Self {
            pos,
            extra: serde_json::Map::new(),
        }
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos.is_empty()
    }
}
