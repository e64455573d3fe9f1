//! Guessing what kind of device sits behind an endpoint.
//!
//! Classification is a lookup in [`RULES`], a priority-ordered table.
//! The first rule with any matching predicate decides the category,
//! and nothing after it is evaluated.
//! An endpoint matching no rule is [`DeviceCategory::Generic`].

use tracing::trace;

use crate::device::{DataFormat, DeviceCategory, DeviceDescriptor, RawEndpoint};

/// A predicate over the metadata of an endpoint.
#[derive(Debug, Clone, Copy)]
pub enum Matcher {
    /// The vendor id matches exactly, and so does one of the product ids.
    /// An empty product id list accepts any product of the vendor.
    UsbId {
        /// USB vendor id.
        vid: u16,

        /// Accepted USB product ids.
        pids: &'static [u16],
    },

    /// Case-insensitive substring of either the description or the manufacturer.
    /// Must be given in lowercase.
    Keyword(&'static str),
}

impl Matcher {
    /// Check the predicate against an endpoint.
    pub fn matches(&self, raw: &RawEndpoint) -> bool {
        match *self {
            Matcher::UsbId { vid, pids } => match (raw.vid, raw.pid) {
                (Some(v), Some(p)) => v == vid && (pids.is_empty() || pids.contains(&p)),
                (Some(v), None) => v == vid && pids.is_empty(),
                _ => false,
            },
            Matcher::Keyword(keyword) => [&raw.description, &raw.manufacturer]
                .into_iter()
                .flatten()
                .any(|text| text.to_lowercase().contains(keyword)),
        }
    }
}

/// A category and the predicates which lead to it.
#[derive(Debug)]
pub struct Rule {
    /// The category assigned on a match.
    pub category: DeviceCategory,

    /// Any of these matching is a match for the rule.
    pub matchers: &'static [Matcher],
}

/// Classification rules, highest priority first.
///
/// USB ids are checked before any keyword, board names before sensor and GPS
/// names, and the generic "USB serial" wording last.
pub const RULES: &[Rule] = &[
    Rule {
        category: DeviceCategory::UsbBridge,
        matchers: &[
            // Silicon Labs CP210x
            Matcher::UsbId {
                vid: 0x10C4,
                pids: &[0xEA60, 0xEA70, 0xEA71, 0xEA63],
            },
            // WCH CH340/CH341
            Matcher::UsbId {
                vid: 0x1A86,
                pids: &[0x7523, 0x7522, 0x5523, 0x55D4],
            },
            // FTDI
            Matcher::UsbId {
                vid: 0x0403,
                pids: &[0x6001, 0x6010, 0x6011, 0x6014, 0x6015],
            },
            // Prolific PL2303
            Matcher::UsbId {
                vid: 0x067B,
                pids: &[0x2303, 0x23A3, 0x23C3, 0x23D3],
            },
        ],
    },
    Rule {
        category: DeviceCategory::Microcontroller,
        matchers: &[
            // Arduino
            Matcher::UsbId { vid: 0x2341, pids: &[] },
            Matcher::UsbId { vid: 0x2A03, pids: &[] },
            // Espressif native USB
            Matcher::UsbId { vid: 0x303A, pids: &[] },
            // Raspberry Pi (Pico)
            Matcher::UsbId { vid: 0x2E8A, pids: &[] },
        ],
    },
    Rule {
        category: DeviceCategory::Microcontroller,
        matchers: &[
            Matcher::Keyword("arduino"),
            Matcher::Keyword("adafruit"),
            Matcher::Keyword("espressif"),
            Matcher::Keyword("esp32"),
            Matcher::Keyword("lilygo"),
            Matcher::Keyword("raspberry pi"),
            Matcher::Keyword("teensy"),
            Matcher::Keyword("stm32"),
        ],
    },
    Rule {
        category: DeviceCategory::Sensor,
        matchers: &[
            Matcher::Keyword("sensor"),
            Matcher::Keyword("temp"),
            Matcher::Keyword("humidity"),
            Matcher::Keyword("pressure"),
        ],
    },
    Rule {
        category: DeviceCategory::Gps,
        matchers: &[
            Matcher::Keyword("gps"),
            Matcher::Keyword("gnss"),
            Matcher::Keyword("navigation"),
            Matcher::Keyword("u-blox"),
        ],
    },
    Rule {
        category: DeviceCategory::UsbBridge,
        matchers: &[
            Matcher::Keyword("usb to uart"),
            Matcher::Keyword("usb-to-uart"),
            Matcher::Keyword("usb serial"),
            Matcher::Keyword("usb-serial"),
            Matcher::Keyword("uart"),
            Matcher::Keyword("cp210"),
            Matcher::Keyword("ch340"),
            Matcher::Keyword("ftdi"),
            Matcher::Keyword("pl2303"),
        ],
    },
];

/// Find the category of an endpoint.
pub fn category_of(raw: &RawEndpoint) -> DeviceCategory {
    RULES
        .iter()
        .find(|rule| rule.matchers.iter().any(|matcher| matcher.matches(raw)))
        .map(|rule| rule.category)
        .unwrap_or(DeviceCategory::Generic)
}

/// The baud rate to use for a category when the caller does not pick one.
pub const fn recommended_baudrate(category: DeviceCategory) -> u32 {
    match category {
        DeviceCategory::Microcontroller | DeviceCategory::UsbBridge => 115_200,
        DeviceCategory::Sensor | DeviceCategory::Gps | DeviceCategory::Generic => 9_600,
    }
}

/// The formats a category is expected to produce.
pub fn supported_formats(category: DeviceCategory) -> Vec<DataFormat> {
    match category {
        DeviceCategory::Generic | DeviceCategory::UsbBridge => DataFormat::ALL.to_vec(),
        DeviceCategory::Microcontroller | DeviceCategory::Sensor | DeviceCategory::Gps => {
            vec![DataFormat::Json, DataFormat::Text, DataFormat::Csv]
        }
    }
}

/// Turn a raw endpoint into a descriptor.
pub fn classify(raw: &RawEndpoint, is_mock: bool) -> DeviceDescriptor {
    let category = category_of(raw);
    trace!(path = %raw.path, %category, "Classified");

    DeviceDescriptor {
        device: raw.path.clone(),
        description: raw
            .description
            .clone()
            .unwrap_or_else(|| "Unknown Device".into()),
        manufacturer: raw.manufacturer.clone(),
        vid: raw.vid,
        pid: raw.pid,
        serial_number: raw.serial_number.clone(),
        location: raw.location.clone(),
        hwid: raw.hwid(),
        is_connected: false,
        device_type: category,
        recommended_baudrate: recommended_baudrate(category),
        supported_formats: supported_formats(category),
        is_mock,
    }
}

/// Lower is preferred when auto-connecting.
fn priority(category: DeviceCategory) -> u8 {
    match category {
        DeviceCategory::Microcontroller => 0,
        DeviceCategory::UsbBridge => 1,
        DeviceCategory::Sensor => 2,
        DeviceCategory::Gps => 3,
        DeviceCategory::Generic => 4,
    }
}

/// Pick the device to auto-connect to.
///
/// Prefers categories in the order microcontroller, usb-bridge, sensor, gps, generic.
/// Ties go to whichever was listed first.
pub fn select_best(catalog: &[DeviceDescriptor]) -> Option<&DeviceDescriptor> {
    // `min_by_key` returns the first of several equal minimums.
    catalog
        .iter()
        .min_by_key(|descriptor| priority(descriptor.device_type))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn raw(path: &str, description: &str, manufacturer: Option<&str>) -> RawEndpoint {
        RawEndpoint {
            path: path.into(),
            description: Some(description.into()),
            manufacturer: manufacturer.map(Into::into),
            ..Default::default()
        }
    }

    fn usb(path: &str, description: &str, vid: u16, pid: u16) -> RawEndpoint {
        RawEndpoint {
            vid: Some(vid),
            pid: Some(pid),
            ..raw(path, description, None)
        }
    }

    #[test]
    fn usb_ids_win_over_keywords() {
        // The description mentions Arduino, but the chip is a known bridge.
        let endpoint = usb("/dev/ttyUSB0", "Arduino clone", 0x1A86, 0x7523);

        assert_eq!(category_of(&endpoint), DeviceCategory::UsbBridge);
    }

    #[test]
    fn unknown_product_of_known_bridge_vendor_is_not_an_id_match() {
        let endpoint = usb("/dev/ttyUSB0", "Thing", 0x10C4, 0x0001);

        assert_eq!(category_of(&endpoint), DeviceCategory::Generic);
    }

    #[test]
    fn any_product_of_board_vendors() {
        let endpoint = usb("/dev/ttyACM0", "Some board", 0x2341, 0x0043);

        assert_eq!(category_of(&endpoint), DeviceCategory::Microcontroller);
    }

    #[test]
    fn board_keywords_are_case_insensitive() {
        assert_eq!(
            category_of(&raw("/dev/ttyACM0", "Whatever", Some("Espressif Systems"))),
            DeviceCategory::Microcontroller
        );
        assert_eq!(
            category_of(&raw("/dev/ttyACM1", "ARDUINO UNO", None)),
            DeviceCategory::Microcontroller
        );
    }

    #[test]
    fn board_keywords_win_over_sensor_keywords() {
        let endpoint = raw("/dev/ttyACM0", "Arduino temperature logger", None);

        assert_eq!(category_of(&endpoint), DeviceCategory::Microcontroller);
    }

    #[test]
    fn sensors_and_gps() {
        assert_eq!(
            category_of(&raw("/dev/ttyUSB3", "Humidity probe", None)),
            DeviceCategory::Sensor
        );
        assert_eq!(
            category_of(&raw("/dev/ttyUSB4", "u-blox GNSS receiver", None)),
            DeviceCategory::Gps
        );
    }

    #[test]
    fn usb_serial_wording_is_a_bridge() {
        assert_eq!(
            category_of(&raw("COM4", "USB Serial Device", None)),
            DeviceCategory::UsbBridge
        );
    }

    #[test]
    fn nothing_matches_is_generic() {
        let endpoint = RawEndpoint {
            path: "/dev/ttyS0".into(),
            ..Default::default()
        };
        let descriptor = classify(&endpoint, false);

        assert_eq!(descriptor.device_type, DeviceCategory::Generic);
        assert_eq!(descriptor.description, "Unknown Device");
        assert_eq!(descriptor.recommended_baudrate, 9_600);
        assert_eq!(descriptor.supported_formats, DataFormat::ALL.to_vec());
    }

    #[test]
    fn baud_rate_always_follows_the_category() {
        let endpoints = vec![
            usb("/dev/ttyUSB0", "CP2102", 0x10C4, 0xEA60),
            usb("/dev/ttyACM0", "Pico", 0x2E8A, 0x000A),
            raw("/dev/ttyACM1", "LilyGO T-Display", None),
            raw("/dev/ttyUSB1", "Pressure sensor", None),
            raw("/dev/ttyUSB2", "GPS puck", None),
            raw("/dev/ttyUSB3", "FTDI thing", None),
            raw("/dev/ttyS0", "ttyS0", None),
        ];

        for endpoint in &endpoints {
            let descriptor = classify(endpoint, false);
            assert_eq!(
                descriptor.recommended_baudrate,
                recommended_baudrate(descriptor.device_type),
                "{descriptor}"
            );
        }
    }

    #[test]
    fn select_best_follows_category_priority() {
        let catalog = vec![
            classify(&raw("/dev/ttyUSB0", "GPS", None), false),
            classify(&raw("/dev/ttyUSB1", "Sensor", None), false),
            classify(&usb("/dev/ttyUSB2", "CP2102", 0x10C4, 0xEA60), false),
            classify(&raw("/dev/ttyACM0", "Arduino Uno", None), false),
        ];

        let best = select_best(&catalog).unwrap();
        assert_eq!(best.device, "/dev/ttyACM0");
    }

    #[test]
    fn select_best_is_stable_within_a_category() {
        let catalog = vec![
            classify(&raw("/dev/ttyS0", "thing", None), false),
            classify(&raw("/dev/ttyUSB1", "Sensor A", None), false),
            classify(&raw("/dev/ttyUSB0", "Sensor B", None), false),
        ];

        let best = select_best(&catalog).unwrap();
        assert_eq!(best.device, "/dev/ttyUSB1");
    }

    #[test]
    fn select_best_on_nothing() {
        assert!(select_best(&[]).is_none());
    }
}
