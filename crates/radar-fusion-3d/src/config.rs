use serde::Deserialize;

use crate::fusion::Color;

/// A radar channel to fuse and the color it is displayed with.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RadarChannel {
    /// The sensor channel name, e.g. `RADAR_FRONT`.
    pub channel: String,
    /// The display color of the channel.
    pub color: Color,
}

impl RadarChannel {
    /// Create a new radar channel.
    pub fn new(channel: impl Into<String>, color: Color) -> Self {
        Self {
            channel: channel.into(),
            color,
        }
    }
}

/// Which sensors to fuse and which cameras to project onto.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Radar channels in fusion order.
    pub radars: Vec<RadarChannel>,
    /// The channel whose ego pose defines the reference frame.
    pub reference_channel: String,
    /// Camera channels in projection order.
    pub cameras: Vec<String>,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            radars: vec![
                RadarChannel::new("RADAR_FRONT", Color::BLUE),
                RadarChannel::new("RADAR_FRONT_LEFT", Color::GREEN),
                RadarChannel::new("RADAR_FRONT_RIGHT", Color::CYAN),
                RadarChannel::new("RADAR_BACK_LEFT", Color::ORANGE),
                RadarChannel::new("RADAR_BACK_RIGHT", Color::RED),
            ],
            reference_channel: "RADAR_FRONT".to_string(),
            cameras: [
                "CAM_FRONT_LEFT",
                "CAM_FRONT",
                "CAM_FRONT_RIGHT",
                "CAM_BACK_LEFT",
                "CAM_BACK",
                "CAM_BACK_RIGHT",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rig() {
        let config = FusionConfig::default();
        assert_eq!(config.radars.len(), 5);
        assert_eq!(config.cameras.len(), 6);
        assert_eq!(config.reference_channel, "RADAR_FRONT");
        assert_eq!(config.radars[4].color, Color::RED);
    }

    #[test]
    fn test_deserialize_partial() -> Result<(), serde_json::Error> {
        let config: FusionConfig = serde_json::from_str(
            r#"{
                "radars": [
                    {"channel": "RADAR_FRONT", "color": "blue"},
                    {"channel": "RADAR_BACK_LEFT", "color": [255, 128, 0]}
                ],
                "reference_channel": "RADAR_BACK_LEFT"
            }"#,
        )?;
        assert_eq!(config.radars.len(), 2);
        assert_eq!(config.radars[0].color, Color::BLUE);
        assert_eq!(config.radars[1].color, Color::new(255, 128, 0));
        assert_eq!(config.reference_channel, "RADAR_BACK_LEFT");
        // cameras fall back to the default rig
        assert_eq!(config.cameras.len(), 6);
        Ok(())
    }

    #[test]
    fn test_unknown_color_name() {
        let res = serde_json::from_str::<RadarChannel>(
            r#"{"channel": "RADAR_FRONT", "color": "mauve"}"#,
        );
        assert!(res.is_err());
    }
}
