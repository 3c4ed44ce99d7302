//! Server and client messages.

use galendary_core::{ColumnInfo, OkStatus, StatementError, Value};

use super::reader::{PacketReader, ProtocolError};
use super::writer::PacketWriter;
use super::{capabilities, charset, column_flags, column_type};

/// Header byte of an OK packet.
pub const OK_HEADER: u8 = 0x00;
/// Header byte of an auth-more-data packet.
pub const AUTH_MORE_DATA_HEADER: u8 = 0x01;
/// Header byte of a LOCAL INFILE request.
pub const LOCAL_INFILE_HEADER: u8 = 0xfb;
/// Header byte of an EOF packet, or of an auth switch request during login.
pub const EOF_HEADER: u8 = 0xfe;
/// Header byte of an ERR packet.
pub const ERR_HEADER: u8 = 0xff;

/// Initial handshake (protocol version 10) sent by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub protocol_version: u8,
    pub server_version: String,
    pub connection_id: u32,
    /// Auth plugin data (the scramble seed), both parts joined, without the
    /// trailing NUL.
    pub auth_data: Vec<u8>,
    pub capabilities: u32,
    pub charset: u8,
    pub status: u16,
    pub auth_plugin: String,
}

impl Handshake {
    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut r = PacketReader::new(payload);
        let protocol_version = r.read_u8()?;
        if protocol_version != 10 {
            return Err(ProtocolError::Unexpected(format!(
                "unsupported handshake protocol version {}",
                protocol_version
            )));
        }
        let server_version = String::from_utf8_lossy(r.read_null_str()?).into_owned();
        let connection_id = r.read_u32_le()?;
        let mut auth_data = r.read_bytes(8)?.to_vec();
        r.skip(1)?;
        let mut caps = u32::from(r.read_u16_le()?);

        let mut charset = 0;
        let mut status = 0;
        let mut auth_plugin = String::new();
        if !r.is_empty() {
            charset = r.read_u8()?;
            status = r.read_u16_le()?;
            caps |= u32::from(r.read_u16_le()?) << 16;
            let auth_len = r.read_u8()?;
            r.skip(10)?;
            if caps & capabilities::CLIENT_SECURE_CONNECTION != 0 {
                let part2_len = usize::from(auth_len).saturating_sub(8).max(13);
                let part2 = r.read_bytes(part2_len.min(r.remaining()))?;
                let part2 = part2.strip_suffix(&[0]).unwrap_or(part2);
                auth_data.extend_from_slice(part2);
            }
            if caps & capabilities::CLIENT_PLUGIN_AUTH != 0 {
                auth_plugin = String::from_utf8_lossy(r.read_null_str()?).into_owned();
            }
        }

        Ok(Self {
            protocol_version,
            server_version,
            connection_id,
            auth_data,
            capabilities: caps,
            charset,
            status,
            auth_plugin,
        })
    }
}

/// Client reply to the initial handshake.
#[derive(Debug, Clone)]
pub struct HandshakeResponse<'a> {
    pub capabilities: u32,
    pub max_packet_size: u32,
    pub charset: u8,
    pub user: &'a str,
    pub auth_response: &'a [u8],
    pub database: Option<&'a str>,
    pub auth_plugin: &'a str,
}

impl HandshakeResponse<'_> {
    pub fn encode(&self) -> PacketWriter {
        let mut w = PacketWriter::with_capacity(64 + self.user.len() + self.auth_response.len());
        w.write_u32_le(self.capabilities);
        w.write_u32_le(self.max_packet_size);
        w.write_u8(self.charset);
        w.write_zeros(23);
        w.write_null_str(self.user.as_bytes());
        if self.capabilities & capabilities::CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA != 0 {
            w.write_lenenc_bytes(self.auth_response);
        } else {
            w.write_u8(self.auth_response.len() as u8);
            w.write_bytes(self.auth_response);
        }
        if self.capabilities & capabilities::CLIENT_CONNECT_WITH_DB != 0 {
            w.write_null_str(self.database.unwrap_or_default().as_bytes());
        }
        if self.capabilities & capabilities::CLIENT_PLUGIN_AUTH != 0 {
            w.write_null_str(self.auth_plugin.as_bytes());
        }
        w
    }
}

/// Parse an OK packet (header byte included).
pub fn parse_ok(payload: &[u8]) -> Result<OkStatus, ProtocolError> {
    let mut r = PacketReader::new(payload);
    let header = r.read_u8()?;
    if header != OK_HEADER && header != EOF_HEADER {
        return Err(ProtocolError::Unexpected(format!(
            "expected OK packet, got header 0x{:02x}",
            header
        )));
    }
    let affected_rows = r.read_lenenc_u64()?;
    let insert_id = r.read_lenenc_u64()?;
    let server_status = r.read_u16_le()?;
    let warning_count = r.read_u16_le()?;
    let message = String::from_utf8_lossy(r.read_rest()).into_owned();
    let changed_rows = OkStatus::parse_changed_rows(&message).unwrap_or(0);
    Ok(OkStatus {
        affected_rows,
        changed_rows,
        insert_id,
        server_status,
        warning_count,
        message,
    })
}

/// Parse an ERR packet (header byte included).
pub fn parse_err(payload: &[u8]) -> Result<StatementError, ProtocolError> {
    let mut r = PacketReader::new(payload);
    if r.read_u8()? != ERR_HEADER {
        return Err(ProtocolError::Unexpected("expected ERR packet".to_string()));
    }
    let code = r.read_u16_le()?;
    let sql_state = if r.peek_u8() == Some(b'#') {
        r.skip(1)?;
        String::from_utf8_lossy(r.read_bytes(5)?).into_owned()
    } else {
        "HY000".to_string()
    };
    let message = String::from_utf8_lossy(r.read_rest()).into_owned();
    Ok(StatementError {
        code,
        sql_state,
        message,
    })
}

/// An EOF packet: header `0xFE` and shorter than 9 bytes.
pub fn is_eof(payload: &[u8]) -> bool {
    payload.first() == Some(&EOF_HEADER) && payload.len() < 9
}

/// Server status from an EOF packet.
pub fn eof_status(payload: &[u8]) -> Result<u16, ProtocolError> {
    let mut r = PacketReader::new(payload);
    r.skip(1)?;
    if r.remaining() < 4 {
        return Ok(0);
    }
    let _warnings = r.read_u16_le()?;
    r.read_u16_le()
}

/// Column definition (protocol 41).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub table: String,
    pub name: String,
    pub charset: u16,
    pub column_length: u32,
    pub column_type: u8,
    pub flags: u16,
    pub decimals: u8,
}

impl ColumnDefinition {
    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut r = PacketReader::new(payload);
        let _catalog = r.read_lenenc_string()?;
        let _schema = r.read_lenenc_string()?;
        let table = r.read_lenenc_string()?;
        let _org_table = r.read_lenenc_string()?;
        let name = r.read_lenenc_string()?;
        let _org_name = r.read_lenenc_string()?;
        let _fixed_len = r.read_lenenc_u64()?;
        let charset = r.read_u16_le()?;
        let column_length = r.read_u32_le()?;
        let column_type = r.read_u8()?;
        let flags = r.read_u16_le()?;
        let decimals = r.read_u8()?;
        Ok(Self {
            table,
            name,
            charset,
            column_length,
            column_type,
            flags,
            decimals,
        })
    }

    pub fn to_column_info(&self) -> ColumnInfo {
        ColumnInfo {
            name: self.name.clone(),
            table: self.table.clone(),
            column_type: self.column_type,
            flags: self.flags,
        }
    }

    fn is_binary(&self) -> bool {
        self.charset == charset::BINARY
    }

    fn is_unsigned(&self) -> bool {
        self.flags & column_flags::UNSIGNED != 0
    }
}

/// Decode one text-protocol row.
pub fn parse_text_row(
    payload: &[u8],
    columns: &[ColumnDefinition],
) -> Result<Vec<Value>, ProtocolError> {
    let mut r = PacketReader::new(payload);
    columns
        .iter()
        .map(|col| match r.read_lenenc_bytes()? {
            None => Ok(Value::Null),
            Some(bytes) => Ok(decode_text_value(col, bytes)),
        })
        .collect()
}

/// Convert a text-protocol cell to the narrowest fitting [`Value`].
///
/// Integers become numbers, floating point becomes `Double`, `DECIMAL` and
/// temporal types stay text, and binary-charset strings become bytes.
pub fn decode_text_value(col: &ColumnDefinition, bytes: &[u8]) -> Value {
    let text = || String::from_utf8_lossy(bytes).into_owned();
    match col.column_type {
        column_type::TINY
        | column_type::SHORT
        | column_type::LONG
        | column_type::INT24
        | column_type::LONGLONG
        | column_type::YEAR => {
            let s = text();
            if col.is_unsigned() {
                s.parse::<u64>().map_or(Value::Text(s), Value::from)
            } else {
                s.parse::<i64>().map_or(Value::Text(s), Value::Int)
            }
        }
        column_type::FLOAT | column_type::DOUBLE => {
            let s = text();
            s.parse::<f64>().map_or(Value::Text(s), Value::Double)
        }
        column_type::NULL => Value::Null,
        column_type::BIT => Value::Bytes(bytes.to_vec()),
        column_type::TINY_BLOB
        | column_type::MEDIUM_BLOB
        | column_type::LONG_BLOB
        | column_type::BLOB
        | column_type::VAR_STRING
        | column_type::STRING
        | column_type::VARCHAR
            if col.is_binary() =>
        {
            Value::Bytes(bytes.to_vec())
        }
        _ => Value::Text(text()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(column_type: u8, flags: u16, charset: u16) -> ColumnDefinition {
        ColumnDefinition {
            table: "users".to_string(),
            name: "c".to_string(),
            charset,
            column_length: 11,
            column_type,
            flags,
            decimals: 0,
        }
    }

    #[test]
    fn test_parse_handshake() {
        let mut p = vec![10];
        p.extend_from_slice(b"8.0.36\0");
        p.extend_from_slice(&42u32.to_le_bytes());
        p.extend_from_slice(b"abcdefgh");
        p.push(0);
        let caps = capabilities::DEFAULT_CLIENT_FLAGS;
        p.extend_from_slice(&(caps as u16).to_le_bytes());
        p.push(255);
        p.extend_from_slice(&2u16.to_le_bytes());
        p.extend_from_slice(&((caps >> 16) as u16).to_le_bytes());
        p.push(21);
        p.extend_from_slice(&[0; 10]);
        p.extend_from_slice(b"ijklmnopqrst\0");
        p.extend_from_slice(b"caching_sha2_password\0");

        let hs = Handshake::parse(&p).unwrap();
        assert_eq!(hs.server_version, "8.0.36");
        assert_eq!(hs.connection_id, 42);
        assert_eq!(hs.auth_data, b"abcdefghijklmnopqrst");
        assert_eq!(hs.capabilities, caps);
        assert_eq!(hs.auth_plugin, "caching_sha2_password");
    }

    #[test]
    fn test_parse_ok_with_changed_rows() {
        let mut p = vec![0x00, 0x01, 0x00];
        p.extend_from_slice(&2u16.to_le_bytes());
        p.extend_from_slice(&0u16.to_le_bytes());
        p.extend_from_slice(b"Rows matched: 1  Changed: 1  Warnings: 0");
        let ok = parse_ok(&p).unwrap();
        assert_eq!(ok.affected_rows, 1);
        assert_eq!(ok.changed_rows, 1);
        assert_eq!(ok.server_status, 2);
    }

    #[test]
    fn test_parse_err() {
        let mut p = vec![0xff];
        p.extend_from_slice(&1062u16.to_le_bytes());
        p.extend_from_slice(b"#23000Duplicate entry 'jeff' for key 'username'");
        let err = parse_err(&p).unwrap();
        assert_eq!(err.code, 1062);
        assert_eq!(err.sql_state, "23000");
        assert_eq!(err.message, "Duplicate entry 'jeff' for key 'username'");
    }

    #[test]
    fn test_eof_detection() {
        assert!(is_eof(&[0xfe, 0, 0, 0x22, 0]));
        assert!(!is_eof(&[0xfe, 0, 0, 0, 0, 0, 0, 0, 0, 0]));
        assert!(!is_eof(&[0x00]));
        assert_eq!(eof_status(&[0xfe, 0, 0, 0x0a, 0]).unwrap(), 0x0a);
    }

    #[test]
    fn test_column_definition_roundtrip_fields() {
        let mut w = PacketWriter::new();
        for s in ["def", "galendary", "users", "users", "c", "c"] {
            w.write_lenenc_bytes(s.as_bytes());
        }
        w.write_lenenc_int(0x0c);
        w.write_u16_le(63);
        w.write_u32_le(21);
        w.write_u8(column_type::LONGLONG);
        w.write_u16_le(column_flags::NOT_NULL | column_flags::BINARY);
        w.write_u8(0);
        w.write_u16_le(0);
        let def = ColumnDefinition::parse(w.payload()).unwrap();
        assert_eq!(def.name, "c");
        assert_eq!(def.table, "users");
        assert_eq!(def.column_type, column_type::LONGLONG);
    }

    #[test]
    fn test_decode_values() {
        let int = column(column_type::LONGLONG, 0, 63);
        assert_eq!(decode_text_value(&int, b"-7"), Value::Int(-7));

        let uint = column(column_type::LONGLONG, column_flags::UNSIGNED, 63);
        assert_eq!(
            decode_text_value(&uint, b"18446744073709551615"),
            Value::UInt(u64::MAX)
        );

        let text = column(column_type::VAR_STRING, 0, 45);
        assert_eq!(decode_text_value(&text, b"jeff"), Value::from("jeff"));

        let blob = column(column_type::BLOB, column_flags::BINARY, 63);
        assert_eq!(decode_text_value(&blob, b"\x01\x02"), Value::Bytes(vec![1, 2]));

        let decimal = column(column_type::NEWDECIMAL, 0, 63);
        assert_eq!(decode_text_value(&decimal, b"1.50"), Value::from("1.50"));

        let tiny = column(column_type::TINY, 0, 63);
        assert_eq!(decode_text_value(&tiny, b"1"), Value::Int(1));
    }

    #[test]
    fn test_parse_text_row_with_null() {
        let cols = vec![
            column(column_type::LONG, 0, 63),
            column(column_type::VAR_STRING, 0, 45),
        ];
        let payload = [0x02, b'4', b'5', 0xfb];
        let row = parse_text_row(&payload, &cols).unwrap();
        assert_eq!(row, vec![Value::Int(45), Value::Null]);
    }
}
