//! SmartAPI v2 stream wire codec
//!
//! Incoming frames are binary, little-endian. In LTP subscription mode a
//! frame is 51 bytes: mode (1), exchange type (1), token as null-padded
//! ASCII (25), sequence number (8), exchange timestamp (8), last traded
//! price (8, in hundredths of a rupee). Outgoing control messages are JSON
//! text.

use crate::feed::router::RawTick;
use byteorder::{ByteOrder, LittleEndian};
use serde_json::json;

const LTP_FRAME_LEN: usize = 51;

const TOKEN_OFFSET: usize = 2;
const TOKEN_LEN: usize = 25;
const PRICE_OFFSET: usize = 43;

/// NSE capital market segment on the feed
const EXCHANGE_TYPE_NSE_CM: u8 = 1;

/// LTP subscription mode
const MODE_LTP: u8 = 1;

/// Parse one LTP-mode frame. Returns `None` for undersized frames or
/// unreadable tokens; the caller drops those silently.
pub fn parse_ltp_frame(data: &[u8]) -> Option<RawTick> {
    if data.len() < LTP_FRAME_LEN {
        return None;
    }

    let token_bytes = &data[TOKEN_OFFSET..TOKEN_OFFSET + TOKEN_LEN];
    let end = token_bytes
        .iter()
        .position(|b| *b == 0)
        .unwrap_or(TOKEN_LEN);
    let token = std::str::from_utf8(&token_bytes[..end]).ok()?.to_string();

    let scaled_price = LittleEndian::read_i64(&data[PRICE_OFFSET..PRICE_OFFSET + 8]);

    Some(RawTick {
        token: (!token.is_empty()).then_some(token),
        scaled_price: Some(scaled_price),
    })
}

/// Build the JSON subscribe message for a set of NSE tokens.
pub fn subscribe_message(correlation_id: &str, tokens: &[String]) -> String {
    json!({
        "correlationID": correlation_id,
        "action": 1,
        "params": {
            "mode": MODE_LTP,
            "tokenList": [{
                "exchangeType": EXCHANGE_TYPE_NSE_CM,
                "tokens": tokens,
            }],
        },
    })
    .to_string()
}

/// Heartbeat payload; the server answers with `pong`.
pub const PING: &str = "ping";
