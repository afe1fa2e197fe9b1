//! DBC file parser
//!
//! Parses Vector DBC files into dictionary entries keyed the same way JSON
//! dictionaries are: the decimal message ID, flag bits included.

use crate::signals::database::{ByteOrder, MessageSpec, SignalSpec};
use crate::types::{Result, TelemetryError};
use std::collections::BTreeMap;
use std::path::Path;

/// Parse a DBC file and return `(decimal id, message)` entries
pub fn parse_dbc_file(path: &Path) -> Result<Vec<(String, MessageSpec)>> {
    log::info!("Parsing DBC file: {:?}", path);

    let bytes = std::fs::read(path).map_err(|e| {
        TelemetryError::DbcParseError(format!("Failed to read file {:?}: {}", path, e))
    })?;

    // Fall back to Latin-1 (compatible with Windows-1252) for non-UTF-8 files
    let dbc_content = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            log::warn!("DBC file is not UTF-8, trying Latin-1 encoding");
            e.into_bytes().iter().map(|&b| b as char).collect()
        }
    };

    let dbc = can_dbc::DBC::from_slice(dbc_content.as_bytes()).map_err(|e| {
        TelemetryError::DbcParseError(format!("Failed to parse DBC file {:?}: {:?}", path, e))
    })?;

    let messages: Vec<(String, MessageSpec)> = dbc
        .messages()
        .iter()
        .map(|dbc_msg| (dbc_msg.message_id().0.to_string(), convert_message(dbc_msg)))
        .collect();

    log::info!("Parsed {} messages from {:?}", messages.len(), path);

    Ok(messages)
}

fn convert_message(dbc_msg: &can_dbc::Message) -> MessageSpec {
    let mut signals = BTreeMap::new();

    for dbc_sig in dbc_msg.signals() {
        // Multiplexed payload layouts have no flat representation
        if matches!(
            dbc_sig.multiplexer_indicator(),
            can_dbc::MultiplexIndicator::MultiplexedSignal(_)
        ) {
            log::debug!(
                "Skipping multiplexed signal '{}' in message '{}'",
                dbc_sig.name(),
                dbc_msg.message_name()
            );
            continue;
        }

        let signal = convert_signal(dbc_sig);
        signals.insert(signal.name.clone(), signal);
    }

    MessageSpec {
        name: dbc_msg.message_name().to_string(),
        dlc: (*dbc_msg.message_size()).min(u8::MAX as u64) as u8,
        signals,
    }
}

fn convert_signal(dbc_sig: &can_dbc::Signal) -> SignalSpec {
    let byte_order = match *dbc_sig.byte_order() {
        can_dbc::ByteOrder::LittleEndian => ByteOrder::LittleEndian,
        can_dbc::ByteOrder::BigEndian => ByteOrder::BigEndian,
    };

    SignalSpec {
        name: dbc_sig.name().to_string(),
        start_bit: *dbc_sig.start_bit() as u16,
        length: *dbc_sig.signal_size() as u16,
        byte_order,
        signed: matches!(*dbc_sig.value_type(), can_dbc::ValueType::Signed),
        scale: *dbc_sig.factor(),
        offset: *dbc_sig.offset(),
        min: *dbc_sig.min(),
        max: *dbc_sig.max(),
        unit: dbc_sig.unit().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::normalize;
    use crate::signals::database::Dictionary;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_dbc(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_parse_simple_dbc() {
        let dbc_content = r#"
VERSION ""

NS_ :
    NS_DESC_
    CM_
    BA_DEF_
    BA_
    VAL_
    CAT_DEF_
    CAT_
    FILTER
    BA_DEF_DEF_
    EV_DATA_
    ENVVAR_DATA_
    SGTYPE_
    SGTYPE_VAL_
    BA_DEF_SGTYPE_
    BA_SGTYPE_
    SIG_TYPE_REF_
    VAL_TABLE_
    SIG_GROUP_
    SIG_VALTYPE_
    SIGTYPE_VALTYPE_
    BO_TX_BU_
    BA_DEF_REL_
    BA_REL_
    BA_SGTYPE_REL_
    SG_MUL_VAL_

BS_:

BU_: ECU1 ECU2

BO_ 291 EngineData: 8 ECU1
 SG_ EngineSpeed : 0|16@1+ (1,0) [0|8000] "rpm" ECU2
 SG_ EngineTemp : 16|8@1- (1,-40) [-40|215] "C" ECU2

BO_ 512 BatteryStatus: 8 ECU1
 SG_ BatteryVoltage : 7|16@0+ (0.01,0) [0|16] "V" ECU2
"#;

        let temp_file = write_dbc(dbc_content);
        let messages = parse_dbc_file(temp_file.path()).unwrap();

        assert_eq!(messages.len(), 2);

        let (key, msg1) = &messages[0];
        assert_eq!(key, "291");
        assert_eq!(msg1.name, "EngineData");
        assert_eq!(msg1.dlc, 8);
        assert_eq!(msg1.signals.len(), 2);

        let speed = &msg1.signals["EngineSpeed"];
        assert_eq!(speed.start_bit, 0);
        assert_eq!(speed.length, 16);
        assert_eq!(speed.byte_order, ByteOrder::LittleEndian);
        assert_eq!(speed.unit, "rpm");

        let temp = &msg1.signals["EngineTemp"];
        assert!(temp.signed);
        assert_eq!(temp.offset, -40.0);

        let volts = &messages[1].1.signals["BatteryVoltage"];
        assert_eq!(volts.byte_order, ByteOrder::BigEndian);
        assert_eq!(volts.scale, 0.01);

        // Keys land in the same ID space as bus traffic
        let dict = Dictionary::from_entries(messages);
        assert!(dict.get(&normalize("123", true)).is_some());
        assert!(dict.get(&normalize("200", true)).is_some());
    }

    #[test]
    fn test_multiplexed_signals_skipped() {
        let dbc_content = r#"
VERSION ""

NS_ :

BS_:

BU_: ECU1

BO_ 512 MultiplexedMsg: 8 ECU1
 SG_ Mode M : 0|8@1+ (1,0) [0|3] "" ECU1
 SG_ SignalA m0 : 8|16@1+ (1,0) [0|100] "%" ECU1
 SG_ SignalB m1 : 8|16@1+ (0.1,0) [0|1000] "mV" ECU1
"#;

        let temp_file = write_dbc(dbc_content);
        let messages = parse_dbc_file(temp_file.path()).unwrap();

        assert_eq!(messages.len(), 1);
        let msg = &messages[0].1;
        assert_eq!(msg.signals.len(), 1);
        assert!(msg.signals.contains_key("Mode"));
    }

    #[test]
    fn test_missing_file_is_dbc_error() {
        let result = parse_dbc_file(Path::new("/nonexistent/file.dbc"));
        assert!(matches!(result, Err(TelemetryError::DbcParseError(_))));
    }
}
