//! Fixed reference content used for drills: Q-codes, abbreviations,
//! prosigns and callsign prefixes.

use serde::Serialize;

use super::alphabet::{is_encodable, CURRICULUM, MORSE_TABLE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    QCode,
    #[serde(rename = "abbr")]
    Abbreviation,
    Prosign,
    Callsign,
}

/// One entry of a reference table. Only `code` takes part in filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReferenceEntry {
    pub kind: ReferenceKind,
    pub code: &'static str,
    pub description: Option<&'static str>,
}

const fn entry(kind: ReferenceKind, code: &'static str, description: &'static str) -> ReferenceEntry {
    ReferenceEntry {
        kind,
        code,
        description: Some(description),
    }
}

const fn prefix(code: &'static str) -> ReferenceEntry {
    ReferenceEntry {
        kind: ReferenceKind::Callsign,
        code,
        description: None,
    }
}

use ReferenceKind::{Abbreviation, Prosign, QCode};

pub const Q_CODES: &[ReferenceEntry] = &[
    entry(QCode, "QRL", "Is the frequency in use?"),
    entry(QCode, "QRM", "Interference from other stations"),
    entry(QCode, "QRN", "Static or atmospheric noise"),
    entry(QCode, "QRO", "Increase power"),
    entry(QCode, "QRP", "Decrease power / low power"),
    entry(QCode, "QRQ", "Send faster"),
    entry(QCode, "QRS", "Send more slowly"),
    entry(QCode, "QRT", "Stop sending"),
    entry(QCode, "QRU", "Nothing more for you"),
    entry(QCode, "QRV", "I am ready"),
    entry(QCode, "QRX", "Stand by"),
    entry(QCode, "QRZ", "Who is calling me?"),
    entry(QCode, "QSB", "Your signals are fading"),
    entry(QCode, "QSK", "Break-in operation"),
    entry(QCode, "QSL", "I acknowledge receipt"),
    entry(QCode, "QSO", "A contact"),
    entry(QCode, "QSY", "Change frequency"),
    entry(QCode, "QTH", "My location is"),
    entry(QCode, "QTR", "Correct time"),
];

pub const ABBREVIATIONS: &[ReferenceEntry] = &[
    entry(Abbreviation, "CQ", "Calling any station"),
    entry(Abbreviation, "DE", "From / this is"),
    entry(Abbreviation, "ES", "And"),
    entry(Abbreviation, "FB", "Fine business, excellent"),
    entry(Abbreviation, "GM", "Good morning"),
    entry(Abbreviation, "GA", "Good afternoon"),
    entry(Abbreviation, "GE", "Good evening"),
    entry(Abbreviation, "GN", "Good night"),
    entry(Abbreviation, "HR", "Here"),
    entry(Abbreviation, "HW", "How copy?"),
    entry(Abbreviation, "OM", "Old man, fellow operator"),
    entry(Abbreviation, "OP", "Operator"),
    entry(Abbreviation, "PSE", "Please"),
    entry(Abbreviation, "RST", "Readability, strength, tone report"),
    entry(Abbreviation, "TNX", "Thanks"),
    entry(Abbreviation, "TU", "Thank you"),
    entry(Abbreviation, "UR", "Your / you are"),
    entry(Abbreviation, "WX", "Weather"),
    entry(Abbreviation, "73", "Best regards"),
    entry(Abbreviation, "88", "Love and kisses"),
    entry(Abbreviation, "AGN", "Again"),
    entry(Abbreviation, "ANT", "Antenna"),
    entry(Abbreviation, "CUL", "See you later"),
    entry(Abbreviation, "NR", "Number"),
    entry(Abbreviation, "RIG", "Station equipment"),
    entry(Abbreviation, "SRI", "Sorry"),
    entry(Abbreviation, "5NN", "Contest signal report 599"),
];

/// Prosigns are keyed as their component letters.
pub const PROSIGNS: &[ReferenceEntry] = &[
    entry(Prosign, "AR", "End of message"),
    entry(Prosign, "SK", "End of contact"),
    entry(Prosign, "BT", "Break, new paragraph"),
    entry(Prosign, "KN", "Go ahead, named station only"),
    entry(Prosign, "AS", "Wait"),
    entry(Prosign, "BK", "Break"),
    entry(Prosign, "CL", "Closing station"),
    entry(Prosign, "SN", "Understood"),
];

pub const CALLSIGN_PREFIXES: &[ReferenceEntry] = &[
    prefix("K"),
    prefix("W"),
    prefix("N"),
    prefix("AA"),
    prefix("KA"),
    prefix("VE"),
    prefix("VA"),
    prefix("G"),
    prefix("M"),
    prefix("F"),
    prefix("DL"),
    prefix("I"),
    prefix("EA"),
    prefix("JA"),
    prefix("VK"),
    prefix("ZL"),
    prefix("PY"),
    prefix("LU"),
    prefix("OH"),
    prefix("SM"),
    prefix("PA"),
    prefix("ON"),
    prefix("OK"),
    prefix("SP"),
    prefix("UA"),
];

/// Check that every reference table is keyable. A failure here is a
/// programming error and aborts startup.
pub fn validate_tables() -> Result<(), String> {
    for ch in CURRICULUM {
        if !is_encodable(ch) {
            return Err(format!("curriculum character {:?} has no Morse pattern", ch));
        }
    }

    for (ch, pattern) in MORSE_TABLE {
        if pattern.is_empty() || !pattern.chars().all(|p| p == '.' || p == '-') {
            return Err(format!("invalid Morse pattern {:?} for {:?}", pattern, ch));
        }
    }

    for table in [Q_CODES, ABBREVIATIONS, PROSIGNS, CALLSIGN_PREFIXES] {
        for entry in table {
            if entry.code.is_empty() || !entry.code.chars().all(is_encodable) {
                return Err(format!("reference entry {:?} is not keyable", entry.code));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_validate() {
        assert_eq!(validate_tables(), Ok(()));
    }

    #[test]
    fn test_q_codes_start_with_q() {
        assert!(Q_CODES.iter().all(|e| e.code.starts_with('Q') && e.code.len() == 3));
    }

    #[test]
    fn test_entry_serializes_as_tagged_variant() {
        let json = serde_json::to_value(ABBREVIATIONS[0]).unwrap();
        assert_eq!(json["kind"], "abbr");
        assert_eq!(json["code"], "CQ");
    }
}
