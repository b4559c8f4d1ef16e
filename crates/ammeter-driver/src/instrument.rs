//! The closed set of supported instrument families.

use ammeter_core::DaqError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix of an instrument-side rejection.
pub const ERROR_PREFIX: &str = "ERROR:";

/// Reply sent by an emulator for a command it does not understand.
pub const UNSUPPORTED_REPLY: &str = "ERROR: Unsupported command";

/// Instrument family.
///
/// Declaration order is the fixed sampling order within a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmmeterKind {
    /// Greenlee clamp meter.
    Greenlee,
    /// ENTES panel meter.
    Entes,
    /// CIRCUTOR power analyser.
    Circutor,
}

impl AmmeterKind {
    /// All kinds in sampling order.
    pub const ALL: [AmmeterKind; 3] = [
        AmmeterKind::Greenlee,
        AmmeterKind::Entes,
        AmmeterKind::Circutor,
    ];

    /// Lowercase name, also used as the default instrument id.
    pub fn as_str(&self) -> &'static str {
        match self {
            AmmeterKind::Greenlee => "greenlee",
            AmmeterKind::Entes => "entes",
            AmmeterKind::Circutor => "circutor",
        }
    }

    /// Port the emulator listens on by default.
    pub fn default_port(&self) -> u16 {
        match self {
            AmmeterKind::Greenlee => 5000,
            AmmeterKind::Entes => 5001,
            AmmeterKind::Circutor => 5002,
        }
    }

    /// Command that requests one current reading.
    pub fn canonical_command(&self) -> &'static str {
        match self {
            AmmeterKind::Greenlee => "MEASURE_GREENLEE -get_measurement",
            AmmeterKind::Entes => "MEASURE_ENTES -get_data",
            AmmeterKind::Circutor => "MEASURE_CIRCUTOR -get_measurement",
        }
    }

    /// Every command an instrument of this kind answers, canonical first.
    pub fn accepted_commands(&self) -> &'static [&'static str] {
        match self {
            AmmeterKind::Greenlee => &["MEASURE_GREENLEE -get_measurement", "MEASURE_GREENLEE"],
            AmmeterKind::Entes => &["MEASURE_ENTES -get_data", "MEASURE_ENTES"],
            AmmeterKind::Circutor => &[
                "MEASURE_CIRCUTOR -get_measurement",
                "MEASURE_CIRCUTOR",
                "MEASURE_CIRCUTOR -get_measurement -current",
            ],
        }
    }

    /// Whether `command` is understood by this kind.
    pub fn accepts(&self, command: &str) -> bool {
        self.accepted_commands().contains(&command.trim())
    }
}

impl fmt::Display for AmmeterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AmmeterKind {
    type Err = DaqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "greenlee" => Ok(AmmeterKind::Greenlee),
            "entes" => Ok(AmmeterKind::Entes),
            "circutor" => Ok(AmmeterKind::Circutor),
            other => Err(DaqError::Configuration(format!(
                "unknown ammeter kind '{}' (expected greenlee, entes or circutor)",
                other
            ))),
        }
    }
}

/// Parse a raw instrument reply into a current in amperes.
///
/// Returns `None` for everything that is not a usable reading: an empty
/// reply, an `ERROR:` rejection, a non-numeric token or a non-finite number.
pub fn parse_reply(raw: &[u8]) -> Option<f64> {
    let text = String::from_utf8_lossy(raw);
    let text = text.trim();
    if text.is_empty() || text.starts_with(ERROR_PREFIX) {
        return None;
    }
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampling_order() {
        let mut kinds = vec![AmmeterKind::Circutor, AmmeterKind::Greenlee, AmmeterKind::Entes];
        kinds.sort();
        assert_eq!(kinds, AmmeterKind::ALL.to_vec());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(AmmeterKind::Greenlee.default_port(), 5000);
        assert_eq!(AmmeterKind::Entes.default_port(), 5001);
        assert_eq!(AmmeterKind::Circutor.default_port(), 5002);
        for kind in AmmeterKind::ALL {
            assert_eq!(kind.accepted_commands()[0], kind.canonical_command());
            assert!(kind.accepts(kind.canonical_command()));
        }
    }

    #[test]
    fn test_legacy_aliases() {
        assert!(AmmeterKind::Circutor.accepts("MEASURE_CIRCUTOR"));
        assert!(AmmeterKind::Circutor.accepts("MEASURE_CIRCUTOR -get_measurement -current"));
        assert!(!AmmeterKind::Circutor.accepts("MEASURE_ENTES -get_data"));
    }

    #[test]
    fn test_from_str() {
        assert_eq!("Entes".parse::<AmmeterKind>().unwrap(), AmmeterKind::Entes);
        assert!("fluke".parse::<AmmeterKind>().is_err());
    }

    #[test]
    fn test_parse_reply() {
        assert_eq!(parse_reply(b"0.0421"), Some(0.0421));
        assert_eq!(parse_reply(b"  1.5e-3\n"), Some(1.5e-3));
        assert_eq!(parse_reply(b"-2"), Some(-2.0));
        assert_eq!(parse_reply(b""), None);
        assert_eq!(parse_reply(b"   "), None);
        assert_eq!(parse_reply(UNSUPPORTED_REPLY.as_bytes()), None);
        assert_eq!(parse_reply(b"12.3 A"), None);
        assert_eq!(parse_reply(b"NaN"), None);
        assert_eq!(parse_reply(b"inf"), None);
        assert_eq!(parse_reply(&[0xff, 0xfe]), None);
    }
}
