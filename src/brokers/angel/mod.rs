//! Angel One SmartAPI adapter

#![allow(non_snake_case)]

use crate::brokers::types::{Candle, CandleRequest};
use crate::brokers::{QuoteClient, SessionCredentials};
use crate::error::{AppError, Result};
use crate::state::Instrument;
use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const BASE_URL: &str = "https://apiconnect.angelone.in";

/// Raw candle row as returned by getCandleData:
/// `[timestamp, open, high, low, close, volume]`
type CandleRow = (String, f64, f64, f64, f64, f64);

/// Angel One quote client.
///
/// Holds the session credentials behind a lock so the fetch worker and the
/// session refresher can share one client. Secure calls fail with an auth
/// error until `login` has succeeded.
pub struct AngelClient {
    client: Client,
    api_key: String,
    client_id: String,
    session: RwLock<Option<SessionCredentials>>,
}

impl AngelClient {
    pub fn new(api_key: &str, client_id: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to create HTTP client"),
            api_key: api_key.to_string(),
            client_id: client_id.to_string(),
            session: RwLock::new(None),
        }
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Current session credentials, if logged in.
    pub fn credentials(&self) -> Option<SessionCredentials> {
        self.session.read().clone()
    }

    fn session(&self) -> Result<SessionCredentials> {
        self.session
            .read()
            .clone()
            .ok_or_else(|| AppError::Auth("not logged in".to_string()))
    }

    fn get_headers(&self, auth_token: Option<&str>) -> reqwest::header::HeaderMap {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Content-Type", "application/json".parse().unwrap());
        headers.insert("Accept", "application/json".parse().unwrap());
        headers.insert("X-UserType", "USER".parse().unwrap());
        headers.insert("X-SourceID", "WEB".parse().unwrap());
        headers.insert("X-ClientLocalIP", "127.0.0.1".parse().unwrap());
        headers.insert("X-ClientPublicIP", "127.0.0.1".parse().unwrap());
        headers.insert("X-MACAddress", "00:00:00:00:00:00".parse().unwrap());
        headers.insert("X-PrivateKey", self.api_key.parse().unwrap());

        if let Some(token) = auth_token {
            headers.insert(
                "Authorization",
                format!("Bearer {}", token).parse().unwrap(),
            );
        }

        headers
    }

    /// Authenticate with client password and a current TOTP code.
    pub async fn login(&self, password: &str, totp: &str) -> Result<()> {
        if password.is_empty() {
            return Err(AppError::Validation("password is required".to_string()));
        }
        if totp.is_empty() {
            return Err(AppError::Validation("TOTP code is required".to_string()));
        }

        #[derive(Serialize)]
        struct LoginRequest {
            clientcode: String,
            password: String,
            totp: String,
        }

        #[derive(Deserialize)]
        struct LoginResponse {
            status: bool,
            message: String,
            data: Option<LoginData>,
        }

        #[derive(Deserialize)]
        struct LoginData {
            jwtToken: String,
            refreshToken: String,
            feedToken: String,
        }

        let request = LoginRequest {
            clientcode: self.client_id.clone(),
            password: password.to_string(),
            totp: totp.to_string(),
        };

        let response = self
            .client
            .post(format!(
                "{}/rest/auth/angelbroking/user/v1/loginByPassword",
                BASE_URL
            ))
            .headers(self.get_headers(None))
            .json(&request)
            .send()
            .await?;

        let result: LoginResponse = response.json().await?;

        if !result.status {
            return Err(AppError::Auth(result.message));
        }

        let data = result
            .data
            .ok_or_else(|| AppError::Auth("No data in login response".to_string()))?;

        *self.session.write() = Some(SessionCredentials {
            jwt_token: data.jwtToken,
            feed_token: data.feedToken,
            refresh_token: data.refreshToken,
        });

        Ok(())
    }

    /// Exchange the refresh token for a fresh credential set.
    pub async fn renew_session(&self) -> Result<()> {
        let session = self.session()?;

        #[derive(Serialize)]
        struct RenewRequest {
            refreshToken: String,
        }

        #[derive(Deserialize)]
        struct RenewResponse {
            status: bool,
            message: String,
            data: Option<RenewData>,
        }

        #[derive(Deserialize)]
        struct RenewData {
            jwtToken: String,
            refreshToken: String,
            feedToken: String,
        }

        let request = RenewRequest {
            refreshToken: session.refresh_token,
        };

        let response = self
            .client
            .post(format!(
                "{}/rest/auth/angelbroking/jwt/v1/generateTokens",
                BASE_URL
            ))
            .headers(self.get_headers(Some(&session.jwt_token)))
            .json(&request)
            .send()
            .await?;

        let result: RenewResponse = response.json().await?;

        if !result.status {
            return Err(AppError::Auth(result.message));
        }

        let data = result
            .data
            .ok_or_else(|| AppError::Auth("No data in renew response".to_string()))?;

        *self.session.write() = Some(SessionCredentials {
            jwt_token: data.jwtToken,
            feed_token: data.feedToken,
            refresh_token: data.refreshToken,
        });

        Ok(())
    }
}

#[async_trait]
impl QuoteClient for AngelClient {
    async fn fetch_last_price(&self, instrument: &Instrument) -> Result<f64> {
        let session = self.session()?;

        #[derive(Serialize)]
        struct LtpRequest {
            exchange: String,
            tradingsymbol: String,
            symboltoken: String,
        }

        #[derive(Deserialize)]
        struct LtpResponse {
            status: bool,
            message: String,
            data: Option<LtpData>,
        }

        #[derive(Deserialize)]
        struct LtpData {
            ltp: f64,
        }

        let request = LtpRequest {
            exchange: instrument.exchange.as_str().to_string(),
            tradingsymbol: instrument.symbol.clone(),
            symboltoken: instrument.token.clone(),
        };

        let response = self
            .client
            .post(format!(
                "{}/rest/secure/angelbroking/order/v1/getLtpData",
                BASE_URL
            ))
            .headers(self.get_headers(Some(&session.jwt_token)))
            .json(&request)
            .send()
            .await?;

        let result: LtpResponse = response.json().await?;

        if !result.status {
            return Err(AppError::Broker(result.message));
        }

        result
            .data
            .map(|d| d.ltp)
            .ok_or_else(|| AppError::Broker("No data in LTP response".to_string()))
    }

    async fn fetch_candles(&self, request: &CandleRequest) -> Result<Vec<Candle>> {
        let session = self.session()?;

        #[derive(Serialize)]
        struct HistoricRequest {
            exchange: String,
            symboltoken: String,
            interval: String,
            fromdate: String,
            todate: String,
        }

        #[derive(Deserialize)]
        struct HistoricResponse {
            status: bool,
            message: String,
            data: Option<Vec<CandleRow>>,
        }

        let body = HistoricRequest {
            exchange: request.exchange.as_str().to_string(),
            symboltoken: request.token.clone(),
            interval: request.interval.as_str().to_string(),
            fromdate: request.from_date.clone(),
            todate: request.to_date.clone(),
        };

        let response = self
            .client
            .post(format!(
                "{}/rest/secure/angelbroking/historical/v1/getCandleData",
                BASE_URL
            ))
            .headers(self.get_headers(Some(&session.jwt_token)))
            .json(&body)
            .send()
            .await?;

        let result: HistoricResponse = response.json().await?;

        if !result.status {
            return Err(AppError::Broker(result.message));
        }

        parse_candles(result.data.unwrap_or_default())
    }
}

/// Convert raw candle rows into typed bars. Timestamps arrive as
/// `2024-08-19T00:00:00+05:30`; only the date part matters here.
fn parse_candles(rows: Vec<CandleRow>) -> Result<Vec<Candle>> {
    rows.into_iter()
        .map(|(ts, open, high, low, close, volume)| {
            let date_part = ts.split('T').next().unwrap_or(&ts);
            let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|e| {
                AppError::Serialization(<serde_json::Error as serde::de::Error>::custom(
                    format!("bad candle timestamp {:?}: {}", ts, e),
                ))
            })?;
            Ok(Candle {
                date,
                open,
                high,
                low,
                close,
                volume: volume as i64,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_candles_rows() {
        let rows = vec![
            (
                "2024-08-12T00:00:00+05:30".to_string(),
                100.0,
                110.0,
                95.0,
                105.5,
                123456.0,
            ),
            (
                "2024-08-19T00:00:00+05:30".to_string(),
                105.5,
                112.0,
                101.0,
                108.0,
                654321.0,
            ),
        ];

        let candles = parse_candles(rows).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(
            candles[0].date,
            NaiveDate::from_ymd_opt(2024, 8, 12).unwrap()
        );
        assert_eq!(candles[0].close, 105.5);
        assert_eq!(candles[1].volume, 654321);
    }

    #[test]
    fn test_parse_candles_bad_timestamp_is_transient() {
        let rows = vec![("garbage".to_string(), 1.0, 1.0, 1.0, 1.0, 0.0)];
        let err = parse_candles(rows).unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_quote_calls_require_session() {
        let client = AngelClient::new("key", "C123");
        assert!(client.credentials().is_none());
        assert!(matches!(client.session(), Err(AppError::Auth(_))));
    }
}
