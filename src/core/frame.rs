use serde::{Deserialize, Deserializer, Serialize};

use crate::core::TouchReport;

/// Raw capacitive image for one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdcFrame {
    /// Image rows (one value per sensor node)
    #[serde(default)]
    pub image: Vec<Vec<f64>>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AdcFrame {
    pub fn new(image: Vec<Vec<f64>>) -> Self {
        Self {
            image,
            extra: serde_json::Map::new(),
        }
    }

    /// Image dimensions as (rows, columns of the widest row)
    pub fn dimensions(&self) -> (usize, usize) {
        let cols = self.image.iter().map(Vec::len).max().unwrap_or(0);
        (self.image.len(), cols)
    }

    /// Min, max and mean over all nodes, `None` for an empty image
    pub fn stats(&self) -> Option<ImageStats> {
        let mut values = self.image.iter().flatten().copied();
        let first = values.next()?;

        let mut stats = ImageStats {
            min: first,
            max: first,
            mean: 0.0,
        };
        let mut sum = first;
        let mut count = 1usize;
        for value in values {
            stats.min = stats.min.min(value);
            stats.max = stats.max.max(value);
            sum += value;
            count += 1;
        }
        stats.mean = sum / count as f64;
        Some(stats)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// One recorded frame: the ADC snapshot and the touch report decoded from it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureFrame {
    #[serde(rename = "frame", deserialize_with = "tagged_payload")]
    pub adc: AdcFrame,

    #[serde(deserialize_with = "tagged_payload")]
    pub report: TouchReport,
}

/// Captures store payloads either bare or as a `[kind, data]` pair
#[derive(Deserialize)]
#[serde(untagged)]
enum Tagged<T> {
    Pair(String, T),
    Bare(T),
}

fn tagged_payload<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match Tagged::deserialize(deserializer)? {
        Tagged::Pair(_, data) => data,
        Tagged::Bare(data) => data,
    })
}
